//! Tailnet Watch Agent Contracts
//!
//! Wire types exchanged with the Tailscale API, the Telegram Bot API and
//! clients of the status query endpoint.

mod devices;
mod status;
mod telegram;

pub use devices::*;
pub use status::*;
pub use telegram::*;

/// Agent identifier
pub const AGENT_ID: &str = "tailnet-watch-agent";

/// Agent version (from Cargo.toml)
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");
