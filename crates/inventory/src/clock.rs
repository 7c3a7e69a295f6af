//! Ledger timestamps.
//!
//! Every timestamp is cut to microseconds, the finest precision the remote
//! engine stores, so a value returned by a write equals the value read back
//! from any engine.

use chrono::{DateTime, SubsecRound, Utc};

/// Sub-second digits kept on ledger timestamps.
pub const TIMESTAMP_PRECISION: u16 = 6;

/// The current time at ledger precision.
pub fn now() -> DateTime<Utc> {
    truncate(Utc::now())
}

pub fn truncate(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(TIMESTAMP_PRECISION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn now_has_no_sub_microsecond_digits() {
        assert_eq!(now().nanosecond() % 1_000, 0);
    }

    #[test]
    fn truncation_drops_nanoseconds_only() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(310_957_953);

        let cut = truncate(at);

        assert_eq!(cut.nanosecond(), 310_957_000);
        assert_eq!(cut.timestamp(), at.timestamp());
        assert_eq!(truncate(cut), cut);
    }
}
