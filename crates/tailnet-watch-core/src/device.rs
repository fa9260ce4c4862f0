//! Devices and per-cycle observations
//!
//! A [`Device`] is what the liveness source reports. A [`DeviceObservation`]
//! adds the liveness verdict computed for the current cycle. Neither is
//! persisted; only the [`NodeStatus`](crate::NodeStatus) stored under the
//! device's [`NodeKey`] survives a cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::classify::classify;
use crate::store::{StoreError, NODE_KEY_PREFIX};

/// A device reported by the liveness source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Stable device identifier
    pub node_id: String,

    /// Display name (usually the fully qualified MagicDNS name)
    pub name: String,

    /// First DNS label of `name`
    pub short_name: String,

    /// ACL tags carried by the device
    pub tags: Vec<String>,

    /// Last time the control plane heard from the device
    pub last_seen: DateTime<Utc>,
}

impl Device {
    /// Create a device, deriving the short name from `name`
    pub fn new(
        node_id: impl Into<String>,
        name: impl Into<String>,
        tags: Vec<String>,
        last_seen: DateTime<Utc>,
    ) -> Self {
        let name = name.into();
        Self {
            node_id: node_id.into(),
            short_name: short_name_of(&name),
            name,
            tags,
            last_seen,
        }
    }

    /// Store key for this device's status record
    pub fn key(&self) -> NodeKey {
        NodeKey::new(&self.node_id, &self.short_name)
    }
}

/// First DNS label of a device name (`nas.tail1234.ts.net` -> `nas`)
pub fn short_name_of(name: &str) -> String {
    name.split('.').next().unwrap_or(name).to_string()
}

/// A device together with the liveness verdict for the current cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceObservation {
    pub device: Device,
    pub online: bool,
    pub minutes_since_contact: i64,
}

impl DeviceObservation {
    /// Classify `device` against `offline_threshold_minutes` at `now`
    pub fn observe(device: Device, now: DateTime<Utc>, offline_threshold_minutes: u64) -> Self {
        let liveness = classify(device.last_seen, now, offline_threshold_minutes);
        Self {
            device,
            online: liveness.online,
            minutes_since_contact: liveness.minutes_since_contact,
        }
    }

    pub fn key(&self) -> NodeKey {
        self.device.key()
    }
}

/// Composite store key: `node:<nodeId>:<shortName>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub node_id: String,
    pub short_name: String,
}

impl NodeKey {
    pub fn new(node_id: impl Into<String>, short_name: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            short_name: short_name.into(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", NODE_KEY_PREFIX, self.node_id, self.short_name)
    }
}

impl FromStr for NodeKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(NODE_KEY_PREFIX)
            .ok_or_else(|| StoreError::InvalidKey(s.to_string()))?;

        // Node ids never contain ':'; short names might
        match rest.split_once(':') {
            Some((node_id, short_name)) if !node_id.is_empty() => {
                Ok(NodeKey::new(node_id, short_name))
            }
            _ => Err(StoreError::InvalidKey(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_short_name_derivation() {
        assert_eq!(short_name_of("nas.tail1234.ts.net"), "nas");
        assert_eq!(short_name_of("laptop"), "laptop");
        assert_eq!(short_name_of(""), "");
    }

    #[test]
    fn test_node_key_format() {
        let device = Device::new("nX1", "pi.tail.ts.net", vec![], Utc::now());
        assert_eq!(device.key().to_string(), "node:nX1:pi");
    }

    #[test]
    fn test_node_key_parse() {
        let key: NodeKey = "node:nX1:pi".parse().unwrap();
        assert_eq!(key, NodeKey::new("nX1", "pi"));

        let key: NodeKey = "node:nX1:odd:name".parse().unwrap();
        assert_eq!(key.short_name, "odd:name");

        let key: NodeKey = "node:nX1:".parse().unwrap();
        assert_eq!(key.short_name, "");
    }

    #[test]
    fn test_node_key_parse_rejects_foreign_keys() {
        assert!("tailscale_oauth_token".parse::<NodeKey>().is_err());
        assert!("node:".parse::<NodeKey>().is_err());
        assert!("node::pi".parse::<NodeKey>().is_err());
        assert!("node:nX1".parse::<NodeKey>().is_err());
    }

    #[test]
    fn test_observe_classifies() {
        let now = Utc::now();
        let stale = Device::new("n1", "a", vec![], now - Duration::minutes(12));
        let fresh = Device::new("n2", "b", vec![], now - Duration::seconds(30));

        let stale = DeviceObservation::observe(stale, now, 10);
        let fresh = DeviceObservation::observe(fresh, now, 10);

        assert!(!stale.online);
        assert_eq!(stale.minutes_since_contact, 12);
        assert!(fresh.online);
        assert_eq!(fresh.minutes_since_contact, 1);
    }
}
