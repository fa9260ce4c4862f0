//! Status query endpoint contracts

use serde::{Deserialize, Serialize};
use tailnet_watch_core::{timestamp_display, NodeState, StatusEntry};

/// `GET /` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub data: Vec<NodeStatusView>,
}

/// One device's persisted status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatusView {
    pub node_id: String,
    pub short_name: String,
    pub status: StatusView,
}

/// Status with timestamps rendered as ISO-8601, `null` when absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub state: Option<NodeState>,
    pub alert_ts: Option<String>,
    pub first_down_ts: Option<String>,
}

impl From<&StatusEntry> for NodeStatusView {
    fn from(entry: &StatusEntry) -> Self {
        Self {
            node_id: entry.key.node_id.clone(),
            short_name: entry.key.short_name.clone(),
            status: StatusView {
                state: entry.status.state(),
                alert_ts: timestamp_display(entry.status.alert_ts()),
                first_down_ts: timestamp_display(entry.status.first_down_ts()),
            },
        }
    }
}

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub agent_id: String,
    pub agent_version: String,
}

/// API error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tailnet_watch_core::{NodeKey, NodeStatus};

    #[test]
    fn test_offline_view() {
        let entry = StatusEntry {
            key: NodeKey::new("n1", "nas"),
            status: NodeStatus::Offline {
                first_down_at: 1_700_000_000_000,
                last_alert_at: 1_700_000_060_000,
            },
        };

        assert_eq!(
            serde_json::to_value(NodeStatusView::from(&entry)).unwrap(),
            json!({
                "nodeId": "n1",
                "shortName": "nas",
                "status": {
                    "state": "OFFLINE",
                    "alertTs": "2023-11-14T22:14:20.000Z",
                    "firstDownTs": "2023-11-14T22:13:20.000Z"
                }
            })
        );
    }

    #[test]
    fn test_online_view_has_null_timestamps() {
        let entry = StatusEntry {
            key: NodeKey::new("n1", "nas"),
            status: NodeStatus::Online,
        };

        let value = serde_json::to_value(NodeStatusView::from(&entry)).unwrap();
        assert_eq!(
            value["status"],
            json!({"state": "ONLINE", "alertTs": null, "firstDownTs": null})
        );
    }
}
