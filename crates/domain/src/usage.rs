//! Usage reports relayed to the backend after each visit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// UTC timestamp used for visit boundaries.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// One completed visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    /// When motion started.
    pub started_at: Timestamp,
    /// When motion ended.
    pub ended_at: Timestamp,
    /// Paper rolls counted by the sensor, if it answered.
    pub rolls: Option<u32>,
    /// Push subscription the backend should notify, if one is registered.
    pub subscription: Option<serde_json::Value>,
}

impl UsageReport {
    /// Length of the visit; zero if the clock went backwards.
    #[must_use]
    pub fn duration(&self) -> std::time::Duration {
        (self.ended_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Decode a roll count notified as 1–4 big-endian bytes.
///
/// Returns `None` for an empty or over-long payload.
#[must_use]
pub fn decode_roll_count(payload: &[u8]) -> Option<u32> {
    if payload.is_empty() || payload.len() > 4 {
        return None;
    }
    Some(
        payload
            .iter()
            .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        assert!(ts >= before);
    }

    #[test]
    fn should_compute_visit_duration() {
        let started_at = now();
        let report = UsageReport {
            started_at,
            ended_at: started_at + TimeDelta::seconds(95),
            rolls: Some(2),
            subscription: None,
        };
        assert_eq!(report.duration(), std::time::Duration::from_secs(95));
    }

    #[test]
    fn should_clamp_negative_duration_to_zero() {
        let ended_at = now();
        let report = UsageReport {
            started_at: ended_at + TimeDelta::seconds(5),
            ended_at,
            rolls: None,
            subscription: None,
        };
        assert_eq!(report.duration(), std::time::Duration::ZERO);
    }

    #[test]
    fn should_decode_single_byte_roll_count() {
        assert_eq!(decode_roll_count(&[3]), Some(3));
    }

    #[test]
    fn should_decode_four_byte_roll_count() {
        assert_eq!(decode_roll_count(&[0, 0, 1, 2]), Some(258));
    }

    #[test]
    fn should_reject_empty_or_long_roll_count() {
        assert_eq!(decode_roll_count(&[]), None);
        assert_eq!(decode_roll_count(&[0, 0, 0, 0, 1]), None);
    }
}
