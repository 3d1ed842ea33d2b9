//! Cron normalization, due-check, and duration parsing helpers.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month day-of-week`.
/// Rule authors usually write standard 5-field cron.
pub(crate) fn normalize_cron(cron_5field: &str) -> String {
    let trimmed = cron_5field.trim();
    let field_count = trimmed.split_whitespace().count();
    if field_count == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Check if a cron schedule ticked in `(last_run, now]`.
///
/// Without `last_run`, any tick within the past day counts.
pub(crate) fn is_cron_due(
    schedule: &Schedule,
    now: DateTime<Utc>,
    last_run: Option<DateTime<Utc>>,
) -> bool {
    let check_from = last_run.unwrap_or(now - chrono::Duration::days(1));
    match schedule.after(&check_from).next() {
        Some(next) => next <= now,
        None => false,
    }
}

/// Parse a duration string into a [`Duration`].
///
/// Accepts compact components `Xd`, `Xh`, `Xm`, `Xs` ("2h30m", "1d12h",
/// "90s"), a bare number of seconds ("120"), and ISO-8601 durations with
/// day, week and time components ("PT15M", "P1DT2H", "P2W").
/// Returns `None` if the string is empty, unparseable or overflows.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(iso) = s.strip_prefix('P').or_else(|| s.strip_prefix('p')) {
        return parse_iso_duration(iso);
    }

    let mut total_secs: u64 = 0;
    let mut num_buf = String::new();
    let mut found_unit = false;

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
        } else {
            let n: u64 = num_buf.parse().ok()?;
            num_buf.clear();
            let unit = unit_secs(ch.to_ascii_lowercase(), false)?;
            total_secs = total_secs.checked_add(n.checked_mul(unit)?)?;
            found_unit = true;
        }
    }

    // Trailing digits after a unit ("30m15") are ambiguous.
    if !num_buf.is_empty() {
        if found_unit {
            return None;
        }
        total_secs = total_secs.checked_add(num_buf.parse::<u64>().ok()?)?;
    }

    Some(Duration::from_secs(total_secs))
}

fn parse_iso_duration(body: &str) -> Option<Duration> {
    let (date, time) = match body.split_once(['T', 't']) {
        Some((date, time)) => {
            if time.is_empty() {
                return None;
            }
            (date, Some(time))
        }
        None => (body, None),
    };
    if date.is_empty() && time.is_none() {
        return None;
    }

    let mut total_secs = sum_components(date, false)?;
    if let Some(time) = time {
        total_secs = total_secs.checked_add(sum_components(time, true)?)?;
    }
    Some(Duration::from_secs(total_secs))
}

fn sum_components(part: &str, time: bool) -> Option<u64> {
    let mut total = 0u64;
    let mut num_buf = String::new();
    for ch in part.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
        } else {
            let n: u64 = num_buf.parse().ok()?;
            num_buf.clear();
            let unit = unit_secs(ch.to_ascii_lowercase(), !time)?;
            total = total.checked_add(n.checked_mul(unit)?)?;
        }
    }
    if num_buf.is_empty() {
        Some(total)
    } else {
        None
    }
}

/// Seconds per unit. In an ISO date part `m` would mean months, which has
/// no fixed length, so only `d` and `w` are accepted there.
fn unit_secs(unit: char, iso_date: bool) -> Option<u64> {
    match (unit, iso_date) {
        ('w', true) => Some(7 * 86_400),
        ('d', _) => Some(86_400),
        ('h', false) => Some(3_600),
        ('m', false) => Some(60),
        ('s', false) => Some(1),
        _ => None,
    }
}

/// A parsed timer expression.
#[derive(Debug, Clone)]
pub enum TimerSchedule {
    /// Due once the interval has elapsed since the last firing.
    Interval(Duration),
    /// Due when a cron tick falls after the last firing.
    Cron(Box<Schedule>),
}

impl TimerSchedule {
    /// Expressions with five or more whitespace-separated fields are cron;
    /// anything else must be a positive duration.
    pub fn parse(expr: &str) -> Result<Self, String> {
        let trimmed = expr.trim();
        if trimmed.split_whitespace().count() >= 5 {
            return Schedule::from_str(&normalize_cron(trimmed))
                .map(|s| TimerSchedule::Cron(Box::new(s)))
                .map_err(|e| e.to_string());
        }
        match parse_duration(trimmed) {
            Some(d) if d.is_zero() => Err("duration must be positive".to_string()),
            Some(d) if chrono::Duration::from_std(d).is_err() => {
                Err("duration out of range".to_string())
            }
            Some(d) => Ok(TimerSchedule::Interval(d)),
            None => Err("neither a duration nor a cron expression".to_string()),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>, last: DateTime<Utc>) -> bool {
        match self {
            TimerSchedule::Interval(interval) => {
                let elapsed = now.signed_duration_since(last);
                chrono::Duration::from_std(*interval).is_ok_and(|d| elapsed >= d)
            }
            TimerSchedule::Cron(schedule) => is_cron_due(schedule, now, Some(last)),
        }
    }
}
