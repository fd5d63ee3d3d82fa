use chrono::NaiveDateTime;

/// Outcome of the per-worker check-and-set on `last_punch_at`.
///
/// The actual reservation is a conditional UPDATE in the store (see
/// `AttendanceStore::reserve_punch`) so that two near-simultaneous punches
/// for the same worker cannot both pass; what lives here is the pure
/// arithmetic shared by the store and its callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownCheck {
    Reserved,
    CoolingDown { remaining_seconds: i64 },
}

/// Seconds left before the worker may punch again, rounded up for the
/// client countdown. Zero means the interval has elapsed.
pub fn remaining_seconds(
    last_punch: Option<NaiveDateTime>,
    now: NaiveDateTime,
    min_interval_seconds: i64,
) -> i64 {
    let Some(last) = last_punch else {
        return 0;
    };
    let elapsed = now - last;
    let remaining_ms = min_interval_seconds * 1000 - elapsed.num_milliseconds();
    if remaining_ms <= 0 {
        0
    } else {
        // round up so the client never retries a second too early
        (remaining_ms + 999) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(secs: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(secs as i64)
    }

    #[test]
    fn no_prior_punch_is_free() {
        assert_eq!(remaining_seconds(None, at(0), 60), 0);
    }

    #[test]
    fn within_interval_counts_down() {
        assert_eq!(remaining_seconds(Some(at(0)), at(10), 60), 50);
        assert_eq!(remaining_seconds(Some(at(0)), at(59), 60), 1);
    }

    #[test]
    fn elapsed_interval_is_free() {
        assert_eq!(remaining_seconds(Some(at(0)), at(60), 60), 0);
        assert_eq!(remaining_seconds(Some(at(0)), at(3600), 60), 0);
    }

    #[test]
    fn sub_second_remainder_rounds_up() {
        let last = at(0);
        let now = last + chrono::Duration::milliseconds(59_500);
        assert_eq!(remaining_seconds(Some(last), now, 60), 1);
    }
}
