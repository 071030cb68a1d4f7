//! Date parsing for `date`-typed fields.
//!
//! Everything is interpreted in UTC. Relative expressions are resolved
//! against a caller-supplied `now` so results are reproducible.

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Interpret a Unix timestamp in seconds.
pub fn from_timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
}

/// Parse an absolute or relative date.
///
/// Absolute: RFC 3339, `YYYY-MM-DD[( |T)HH:MM[:SS]]`, `YYYY/MM/DD`, `@<unix>`.
/// Relative: `now`, `today`, `midnight`, `noon`, `yesterday`, `tomorrow`,
/// `+N unit`, `-N unit`, `N unit ago`, `last unit`, `next unit`.
pub fn parse_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    parse_absolute(text).or_else(|| parse_relative(text, now))
}

fn parse_absolute(text: &str) -> Option<DateTime<Utc>> {
    if let Some(secs) = text.strip_prefix('@') {
        return from_timestamp(secs.parse().ok()?);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.and_utc());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date.and_time(NaiveTime::MIN).and_utc());
        }
    }

    None
}

fn parse_relative(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();

    match words.as_slice() {
        ["now"] => Some(now),
        ["today"] | ["midnight"] => Some(midnight),
        ["noon"] => midnight.checked_add_signed(TimeDelta::try_hours(12)?),
        ["yesterday"] => midnight.checked_sub_signed(TimeDelta::try_days(1)?),
        ["tomorrow"] => midnight.checked_add_signed(TimeDelta::try_days(1)?),
        ["last", unit] => shift(now, -1, unit),
        ["next", unit] => shift(now, 1, unit),
        [amount, unit, "ago"] => shift(now, amount.parse::<i64>().ok()?.checked_neg()?, unit),
        [amount, unit] if amount.starts_with(['+', '-']) => {
            shift(now, amount.parse::<i64>().ok()?, unit)
        }
        _ => None,
    }
}

/// Move `now` by `amount` units. Months and years are calendar-aware.
fn shift(now: DateTime<Utc>, amount: i64, unit: &str) -> Option<DateTime<Utc>> {
    let unit = unit.strip_suffix('s').unwrap_or(unit);

    let delta = match unit {
        "sec" | "second" => TimeDelta::try_seconds(amount)?,
        "min" | "minute" => TimeDelta::try_minutes(amount)?,
        "hour" => TimeDelta::try_hours(amount)?,
        "day" => TimeDelta::try_days(amount)?,
        "week" => TimeDelta::try_weeks(amount)?,
        "fortnight" => TimeDelta::try_weeks(amount.checked_mul(2)?)?,
        "month" => return shift_months(now, amount),
        "year" => return shift_months(now, amount.checked_mul(12)?),
        _ => return None,
    };

    now.checked_add_signed(delta)
}

fn shift_months(now: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let count = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        now.checked_add_months(count)
    } else {
        now.checked_sub_months(count)
    }
}
