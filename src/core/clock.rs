use chrono::{DateTime, Duration, Utc};

/// Source of the current time for services and background jobs
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Whole days elapsed from `earlier` to `later`, floored.
///
/// Returns 0 when `later` is not after `earlier`.
pub fn whole_days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> u32 {
    let elapsed = later - earlier;
    if elapsed <= Duration::zero() {
        return 0;
    }
    u32::try_from(elapsed.num_days()).unwrap_or(u32::MAX)
}
