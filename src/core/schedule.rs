const SECONDS_IN_HOUR: i64 = 3600;

/// Decides whether a walk is due.
///
/// A walk runs when forced, or once `interval_hours` have elapsed since `last_check`
/// (both timestamps are unix seconds).
pub fn should_run(now: i64, last_check: i64, interval_hours: u64, forced: bool) -> bool {
    if forced {
        return true;
    }
    let interval = i64::try_from(interval_hours)
        .unwrap_or(i64::MAX)
        .saturating_mul(SECONDS_IN_HOUR);
    now >= last_check.saturating_add(interval)
}
