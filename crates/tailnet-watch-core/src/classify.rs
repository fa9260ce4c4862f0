//! Liveness classification

use chrono::{DateTime, Utc};

use crate::MS_PER_MINUTE;

/// Online/offline verdict for one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    pub online: bool,
    /// Elapsed time since last contact, rounded to the nearest minute
    pub minutes_since_contact: i64,
}

/// Classify a last-contact timestamp against an offline threshold.
///
/// A device is online while the elapsed time is at most `threshold_minutes`;
/// the boundary itself counts as online. The comparison uses the exact
/// elapsed time, rounding only applies to `minutes_since_contact`. Contact
/// timestamps in the future count as zero elapsed time.
pub fn classify(last_seen: DateTime<Utc>, now: DateTime<Utc>, threshold_minutes: u64) -> Liveness {
    let elapsed_ms = (now - last_seen).num_milliseconds().max(0);
    let threshold_ms = i64::try_from(threshold_minutes)
        .unwrap_or(i64::MAX)
        .saturating_mul(MS_PER_MINUTE);

    Liveness {
        online: elapsed_ms <= threshold_ms,
        minutes_since_contact: (elapsed_ms as f64 / MS_PER_MINUTE as f64).round() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn at(now: DateTime<Utc>, elapsed_ms: i64) -> DateTime<Utc> {
        now - Duration::milliseconds(elapsed_ms)
    }

    #[test]
    fn test_boundary_is_online() {
        let now = Utc::now();
        let liveness = classify(at(now, 5 * MS_PER_MINUTE), now, 5);
        assert!(liveness.online);
        assert_eq!(liveness.minutes_since_contact, 5);
    }

    #[test]
    fn test_one_ms_past_boundary_is_offline() {
        let now = Utc::now();
        let liveness = classify(at(now, 5 * MS_PER_MINUTE + 1), now, 5);
        assert!(!liveness.online);
        // Rounded for display only
        assert_eq!(liveness.minutes_since_contact, 5);
    }

    #[test]
    fn test_rounding_does_not_affect_verdict() {
        let now = Utc::now();
        // 4.6 minutes rounds to 5 but is still under a 5 minute threshold
        let liveness = classify(at(now, 276_000), now, 5);
        assert!(liveness.online);
        assert_eq!(liveness.minutes_since_contact, 5);

        // 5.4 minutes rounds to 5 but is over the threshold
        let liveness = classify(at(now, 324_000), now, 5);
        assert!(!liveness.online);
        assert_eq!(liveness.minutes_since_contact, 5);
    }

    #[test]
    fn test_future_contact_is_online() {
        let now = Utc::now();
        let liveness = classify(now + Duration::minutes(3), now, 0);
        assert!(liveness.online);
        assert_eq!(liveness.minutes_since_contact, 0);
    }

    proptest! {
        #[test]
        fn prop_online_iff_within_threshold(
            elapsed_ms in 0i64..(30 * 24 * 60 * MS_PER_MINUTE),
            threshold in 0u64..10_000,
        ) {
            let now = Utc::now();
            let liveness = classify(at(now, elapsed_ms), now, threshold);
            prop_assert_eq!(liveness.online, elapsed_ms <= threshold as i64 * MS_PER_MINUTE);
        }

        #[test]
        fn prop_minutes_are_rounded(elapsed_ms in 0i64..(30 * 24 * 60 * MS_PER_MINUTE)) {
            let now = Utc::now();
            let liveness = classify(at(now, elapsed_ms), now, 5);
            let exact = elapsed_ms as f64 / MS_PER_MINUTE as f64;
            prop_assert!((liveness.minutes_since_contact as f64 - exact).abs() <= 0.5);
        }
    }
}
