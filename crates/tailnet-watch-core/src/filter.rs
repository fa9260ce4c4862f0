//! Tag-based fleet filter

use std::collections::BTreeSet;
use std::fmt;

use crate::device::Device;

/// Set of required tags; a device is monitored when it carries any of them.
/// An empty filter monitors every device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    tags: BTreeSet<String>,
}

impl TagFilter {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Self { tags }
    }

    /// Parse a comma-separated list such as `tag:server, tag:critical`
    pub fn parse(csv: &str) -> Self {
        Self::new(csv.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Whether a device with `device_tags` is monitored
    pub fn matches(&self, device_tags: &[String]) -> bool {
        self.tags.is_empty() || device_tags.iter().any(|t| self.tags.contains(t))
    }

    /// Keep only monitored devices
    pub fn apply(&self, devices: Vec<Device>) -> Vec<Device> {
        devices.into_iter().filter(|d| self.matches(&d.tags)).collect()
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.tags().collect();
        write!(f, "{}", tags.join(","))
    }
}
