//! Persisted per-device status
//!
//! In memory the status is a sum type: outage timestamps only exist while a
//! device is offline. On the wire (and in the store) it keeps the flat
//! `{state, alertTs, firstDownTs}` object with `null` state for never-seen
//! devices and `0` for absent timestamps.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Current status of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "StoredStatus", from = "StoredStatus")]
pub enum NodeStatus {
    /// Never observed, or stored without a state
    #[default]
    Unknown,

    /// Reachable; no outage episode open
    Online,

    /// Inside an outage episode
    Offline {
        /// Epoch ms when the episode began (0 if lost)
        first_down_at: i64,
        /// Epoch ms of the last alert sent for the episode
        last_alert_at: i64,
    },
}

impl NodeStatus {
    /// Status for an outage episode opening at `now_ms` with its first alert
    pub fn outage_started(now_ms: i64) -> Self {
        NodeStatus::Offline {
            first_down_at: now_ms,
            last_alert_at: now_ms,
        }
    }

    pub fn state(&self) -> Option<NodeState> {
        match self {
            NodeStatus::Unknown => None,
            NodeStatus::Online => Some(NodeState::Online),
            NodeStatus::Offline { .. } => Some(NodeState::Offline),
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, NodeStatus::Offline { .. })
    }

    /// Epoch ms of the last alert, 0 when not in an outage
    pub fn alert_ts(&self) -> i64 {
        match self {
            NodeStatus::Offline { last_alert_at, .. } => *last_alert_at,
            _ => 0,
        }
    }

    /// Epoch ms the outage began, 0 when not in an outage
    pub fn first_down_ts(&self) -> i64 {
        match self {
            NodeStatus::Offline { first_down_at, .. } => *first_down_at,
            _ => 0,
        }
    }
}

/// Wire name of a known state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    Online,
    Offline,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Online => "ONLINE",
            NodeState::Offline => "OFFLINE",
        }
    }
}

/// Flat JSON form of [`NodeStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredStatus {
    #[serde(default)]
    pub state: Option<NodeState>,

    #[serde(default, deserialize_with = "zero_if_null")]
    pub alert_ts: i64,

    #[serde(default, deserialize_with = "zero_if_null")]
    pub first_down_ts: i64,
}

fn zero_if_null<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(0))
}

impl From<NodeStatus> for StoredStatus {
    fn from(status: NodeStatus) -> Self {
        StoredStatus {
            state: status.state(),
            alert_ts: status.alert_ts(),
            first_down_ts: status.first_down_ts(),
        }
    }
}

impl From<StoredStatus> for NodeStatus {
    fn from(stored: StoredStatus) -> Self {
        match stored.state {
            None => NodeStatus::Unknown,
            // Stray timestamps on an online record carry no meaning
            Some(NodeState::Online) => NodeStatus::Online,
            Some(NodeState::Offline) => NodeStatus::Offline {
                first_down_at: stored.first_down_ts,
                last_alert_at: stored.alert_ts,
            },
        }
    }
}

/// ISO-8601 rendering of an epoch-ms timestamp; `None` for 0 (absent)
pub fn timestamp_display(ms: i64) -> Option<String> {
    if ms == 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_offline() {
        let status = NodeStatus::Offline {
            first_down_at: 1000,
            last_alert_at: 2000,
        };
        assert_eq!(
            serde_json::to_value(status).unwrap(),
            json!({"state": "OFFLINE", "alertTs": 2000, "firstDownTs": 1000})
        );
    }

    #[test]
    fn test_serialize_online_and_unknown() {
        assert_eq!(
            serde_json::to_value(NodeStatus::Online).unwrap(),
            json!({"state": "ONLINE", "alertTs": 0, "firstDownTs": 0})
        );
        assert_eq!(
            serde_json::to_value(NodeStatus::Unknown).unwrap(),
            json!({"state": null, "alertTs": 0, "firstDownTs": 0})
        );
    }

    #[test]
    fn test_deserialize_tolerates_missing_and_null_fields() {
        let status: NodeStatus = serde_json::from_str(r#"{"state":"OFFLINE","alertTs":null}"#).unwrap();
        assert_eq!(
            status,
            NodeStatus::Offline {
                first_down_at: 0,
                last_alert_at: 0
            }
        );

        let status: NodeStatus = serde_json::from_str("{}").unwrap();
        assert_eq!(status, NodeStatus::Unknown);
    }

    #[test]
    fn test_online_drops_stray_timestamps() {
        let status: NodeStatus =
            serde_json::from_str(r#"{"state":"ONLINE","alertTs":5,"firstDownTs":4}"#).unwrap();
        assert_eq!(status, NodeStatus::Online);
        assert_eq!(status.alert_ts(), 0);
    }

    #[test]
    fn test_unknown_state_is_rejected() {
        let result: Result<NodeStatus, _> = serde_json::from_str(r#"{"state":"DEGRADED"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_timestamp_display() {
        assert_eq!(timestamp_display(0), None);
        assert_eq!(
            timestamp_display(1_700_000_000_000).as_deref(),
            Some("2023-11-14T22:13:20.000Z")
        );
    }
}
