//! Tailscale device list and OAuth token contracts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tailnet_watch_core::Device;

/// `GET /api/v2/tailnet/{tailnet}/devices` response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceList {
    #[serde(default)]
    pub devices: Vec<DeviceDescriptor>,
}

/// One device as reported by the Tailscale API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// Stable node identifier
    pub node_id: String,

    /// MagicDNS name, e.g. `nas.tail1234.ts.net`
    pub name: String,

    #[serde(default)]
    pub hostname: String,

    /// Last contact with the control plane (ISO-8601)
    pub last_seen: DateTime<Utc>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<DeviceDescriptor> for Device {
    fn from(d: DeviceDescriptor) -> Self {
        // Devices without a MagicDNS name still carry a hostname
        let name = if d.name.is_empty() { d.hostname } else { d.name };
        Device::new(d.node_id, name, d.tags, d.last_seen)
    }
}

/// `POST /api/v2/oauth/token` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokenResponse {
    pub access_token: String,

    /// Lifetime in seconds
    pub expires_in: u64,

    #[serde(default)]
    pub token_type: Option<String>,
}

/// Access token as cached in the key-value store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedToken {
    pub access_token: String,

    /// Epoch ms
    pub expires_at: i64,
}
