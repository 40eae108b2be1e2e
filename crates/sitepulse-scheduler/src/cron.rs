//! Cron-style trigger expressions — a deliberately small subset.
//!
//! Format: "MIN HOUR DOM MON DOW" (5 fields, no seconds).
//! Each field is either `*` or a single non-negative integer — no ranges,
//! lists, or step values. Day-of-week (0=Sunday) takes precedence over
//! day-of-month, and the month field is accepted but never consulted.
//! Anything malformed degrades to a run at the top of the next hour.

use chrono::{DateTime, Datelike, Duration, Months, Timelike, Utc};

/// One parsed trigger field: wildcard or a single value.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Any,
    Value(u32),
}

impl Field {
    fn parse(s: &str) -> Option<Field> {
        if s == "*" {
            return Some(Field::Any);
        }
        s.parse::<u32>().ok().map(Field::Value)
    }

    fn value(self) -> Option<u32> {
        match self {
            Field::Any => None,
            Field::Value(v) => Some(v),
        }
    }

    fn or_zero(self) -> u32 {
        self.value().unwrap_or(0)
    }
}

/// Compute the next run at or after `now` for a 5-field trigger expression.
///
/// Never fails: a malformed expression or an unrepresentable instant falls
/// back to [`default_next_run`] with a logged warning.
pub fn next_run(trigger: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    match compute(trigger, now) {
        Some(next) if next.timestamp() > 0 => next,
        _ => {
            tracing::warn!("⚠️ Invalid trigger '{trigger}', defaulting to top of next hour");
            default_next_run(now)
        }
    }
}

/// Fallback next run: one hour ahead, minutes and seconds zeroed.
pub fn default_next_run(now: DateTime<Utc>) -> DateTime<Utc> {
    let next = now + Duration::hours(1);
    next.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(next)
}

/// Field-by-field mutation of a working instant seeded from `now`.
/// `None` means the expression or the resulting instant is invalid.
fn compute(trigger: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = trigger.split_whitespace().collect();
    if parts.len() != 5 {
        return None;
    }
    let minute = Field::parse(parts[0])?;
    let hour = Field::parse(parts[1])?;
    let day_of_month = Field::parse(parts[2])?;
    // Month is validated but never consulted below. Known gap, kept as-is.
    let _month = Field::parse(parts[3])?;
    let day_of_week = Field::parse(parts[4])?;

    let mut next = now.with_second(0)?.with_nanosecond(0)?;

    if let Some(m) = minute.value() {
        next = next.with_minute(m)?;
        if next <= now {
            next += Duration::hours(1);
        }
    }

    if let Some(h) = hour.value() {
        next = next.with_hour(h)?.with_minute(minute.or_zero())?;
        if next <= now {
            next += Duration::days(1);
        }
    }

    if let Some(d) = day_of_week.value() {
        // 0=Sunday..6=Saturday. This branch has the last word on hour and
        // minute, whatever the earlier steps computed.
        let current = next.weekday().num_days_from_sunday();
        let mut offset = (d % 7 + 7 - current) % 7;
        next = next.with_hour(hour.or_zero())?.with_minute(minute.or_zero())?;
        if offset == 0 && next <= now {
            // Today's slot already passed: next week, not today.
            offset = 7;
        }
        next += Duration::days(i64::from(offset));
    } else if let Some(d) = day_of_month.value() {
        // Only consulted when day-of-week is a wildcard.
        next = next
            .with_day(d)?
            .with_hour(hour.or_zero())?
            .with_minute(minute.or_zero())?;
        if next <= now {
            next = next.checked_add_months(Months::new(1))?.with_day(d)?;
        }
    }

    Some(next)
}
