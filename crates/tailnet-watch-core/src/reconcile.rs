//! Status reconciliation
//!
//! Decides, for one device and one cycle, whether a transition happened,
//! which alert to emit, and which record to persist.
//!
//! | Prior   | Observed | Alert     | Record written                   |
//! |---------|----------|-----------|----------------------------------|
//! | Unknown | online   | none      | `Online`                         |
//! | Unknown | offline  | down      | `Offline { now, now }`           |
//! | Online  | online   | none      | nothing                          |
//! | Online  | offline  | down      | `Offline { now, now }`           |
//! | Offline | offline  | none      | nothing (reminder not yet due)   |
//! | Offline | offline  | reminder  | `Offline { first_down_at, now }` |
//! | Offline | online   | recovered | `Online`                         |
//!
//! The reminder clock runs from the last alert, not from the start of the
//! outage: reminders repeat every interval after the previous one. Outage
//! durations in alerts are always measured from `first_down_at`.

use crate::device::DeviceObservation;
use crate::status::NodeStatus;
use crate::MS_PER_MINUTE;

/// Notification the engine wants delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertIntent {
    /// Outage episode opened
    Down { minutes_since_contact: i64 },
    /// Outage still open and the reminder interval elapsed
    Reminder { down_for_ms: i64 },
    /// Outage episode closed
    Recovered { down_for_ms: i64 },
}

impl AlertIntent {
    /// Metric/log label
    pub fn kind(&self) -> &'static str {
        match self {
            AlertIntent::Down { .. } => "down",
            AlertIntent::Reminder { .. } => "reminder",
            AlertIntent::Recovered { .. } => "recovered",
        }
    }
}

/// Outcome of one reconciliation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub alert: Option<AlertIntent>,
    /// Record after this step; equal to the prior when nothing happened
    pub record: NodeStatus,
    /// Whether `record` must be written to the store
    pub persist: bool,
}

impl Reconciliation {
    fn write(record: NodeStatus, alert: Option<AlertIntent>) -> Self {
        Self {
            alert,
            record,
            persist: true,
        }
    }

    fn unchanged(record: NodeStatus) -> Self {
        Self {
            alert: None,
            record,
            persist: false,
        }
    }
}

/// Run the transition decision for one observation.
///
/// `now_ms` is epoch milliseconds. The function is pure: notification
/// delivery and the store write are left to the caller, and they are
/// independent of each other.
pub fn reconcile(
    observation: &DeviceObservation,
    prior: NodeStatus,
    now_ms: i64,
    reminder_interval_minutes: u64,
) -> Reconciliation {
    let reminder_interval_ms = i64::try_from(reminder_interval_minutes)
        .unwrap_or(i64::MAX)
        .saturating_mul(MS_PER_MINUTE);

    match (prior, observation.online) {
        (NodeStatus::Unknown, true) => Reconciliation::write(NodeStatus::Online, None),

        (NodeStatus::Online, true) => Reconciliation::unchanged(prior),

        (NodeStatus::Unknown | NodeStatus::Online, false) => Reconciliation::write(
            NodeStatus::outage_started(now_ms),
            Some(AlertIntent::Down {
                minutes_since_contact: observation.minutes_since_contact,
            }),
        ),

        (
            NodeStatus::Offline {
                first_down_at,
                last_alert_at,
            },
            false,
        ) => {
            if now_ms.saturating_sub(last_alert_at) < reminder_interval_ms {
                return Reconciliation::unchanged(prior);
            }
            let since = outage_start(first_down_at, now_ms);
            Reconciliation::write(
                NodeStatus::Offline {
                    first_down_at: since,
                    last_alert_at: now_ms,
                },
                Some(AlertIntent::Reminder {
                    down_for_ms: now_ms - since,
                }),
            )
        }

        (NodeStatus::Offline { first_down_at, .. }, true) => Reconciliation::write(
            NodeStatus::Online,
            Some(AlertIntent::Recovered {
                down_for_ms: now_ms - outage_start(first_down_at, now_ms),
            }),
        ),
    }
}

/// Outage start, falling back to `now_ms` when the record lost it or it lies
/// in the future
fn outage_start(first_down_at: i64, now_ms: i64) -> i64 {
    if first_down_at <= 0 || first_down_at > now_ms {
        now_ms
    } else {
        first_down_at
    }
}
