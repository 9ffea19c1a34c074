use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// 时钟抽象，便于测试中推进时间
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动推进的时钟
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now = *now + by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// 当前时刻所在的本地日期，作为计数器的时间桶
pub fn local_bucket(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Local).date_naive()
}

/// 下一个本地午夜的时刻
pub fn next_local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = local_bucket(now) + Duration::days(1);
    let midnight = tomorrow
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| Local.from_local_datetime(&naive).earliest());
    match midnight {
        Some(midnight) => midnight.with_timezone(&Utc),
        // Midnight skipped by a DST jump; the day still ends one day after today's start.
        None => now + Duration::days(1),
    }
}

/// 距离下一个本地午夜的时长
pub fn duration_to_midnight(now: DateTime<Utc>) -> Duration {
    next_local_midnight(now) - now
}

/// yyyyMMdd 格式的日期键
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y%m%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_to_midnight_is_within_a_day() {
        let now = Utc::now();
        let remaining = duration_to_midnight(now);
        assert!(remaining > Duration::zero());
        assert!(remaining <= Duration::hours(25));
    }

    #[test]
    fn test_next_midnight_starts_a_new_bucket() {
        let now = Utc::now();
        let midnight = next_local_midnight(now);
        assert_eq!(local_bucket(midnight), local_bucket(now) + Duration::days(1));
        assert_eq!(
            local_bucket(midnight - Duration::seconds(1)),
            local_bucket(now)
        );
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), start + Duration::minutes(5));
    }

    #[test]
    fn test_parse_date_key() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(parse_date_key("20240309"), Some(date));
        assert_eq!(parse_date_key("2024-03-09"), None);
    }
}
