//! Tests for the scheduler module.

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use cron::Schedule;

    use crate::scheduler::cron::{is_cron_due, normalize_cron, parse_duration};
    use crate::scheduler::{TimerSchedule, TimerScheduler};

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    // -- normalize_cron ----------------------------------------------------

    #[test]
    fn normalize_cron_5_to_6_fields() {
        assert_eq!(normalize_cron("*/15 * * * *"), "0 */15 * * * *");
        assert_eq!(normalize_cron("0 6 * * 1-5"), "0 0 6 * * 1-5");
    }

    #[test]
    fn normalize_cron_already_6_fields() {
        assert_eq!(normalize_cron("0 */15 * * * *"), "0 */15 * * * *");
    }

    #[test]
    fn normalize_cron_trims_whitespace() {
        assert_eq!(normalize_cron("  */5 * * * *  "), "0 */5 * * * *");
    }

    // -- parse_duration ----------------------------------------------------

    #[test]
    fn parse_duration_compact_units() {
        assert_eq!(parse_duration("30m"), Some(Duration::from_secs(30 * 60)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3_600)));
        assert_eq!(parse_duration("90s"), Some(Duration::from_secs(90)));
        assert_eq!(
            parse_duration("1d2h30m15s"),
            Some(Duration::from_secs(86_400 + 7_200 + 1_800 + 15))
        );
    }

    #[test]
    fn parse_duration_bare_number_as_seconds() {
        assert_eq!(parse_duration("120"), Some(Duration::from_secs(120)));
    }

    #[test]
    fn parse_duration_iso() {
        assert_eq!(parse_duration("PT15M"), Some(Duration::from_secs(900)));
        assert_eq!(
            parse_duration("P1DT2H"),
            Some(Duration::from_secs(86_400 + 7_200))
        );
        assert_eq!(parse_duration("P2W"), Some(Duration::from_secs(14 * 86_400)));
        assert_eq!(parse_duration("pt1h30m"), Some(Duration::from_secs(5_400)));
    }

    #[test]
    fn parse_duration_invalid_returns_none() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("  "), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("30m15"), None);
        assert_eq!(parse_duration("P1M"), None);
        assert_eq!(parse_duration("PT"), None);
        assert_eq!(parse_duration("P"), None);
    }

    #[test]
    fn parse_duration_overflow_returns_none() {
        assert_eq!(parse_duration("999999999999999999d"), None);
        assert_eq!(parse_duration("18446744073709551615s1s"), None);
        assert_eq!(parse_duration("P999999999999999999W"), None);
        assert_eq!(parse_duration("PT18446744073709551615S1S"), None);
        assert_eq!(parse_duration("99999999999999999999"), None);
    }

    #[test]
    fn timer_schedule_rejects_unrepresentable_interval() {
        assert!(TimerSchedule::parse("999999999999999999d").is_err());
        // Fits in u64 seconds but not in a chrono duration.
        assert!(TimerSchedule::parse("18446744073709551615s").is_err());
        assert!(TimerSchedule::parse("300000000h").is_ok());
    }

    // -- TimerSchedule -----------------------------------------------------

    #[test]
    fn timer_schedule_parses_both_forms() {
        assert!(matches!(
            TimerSchedule::parse("1h"),
            Ok(TimerSchedule::Interval(d)) if d == Duration::from_secs(3_600)
        ));
        assert!(matches!(
            TimerSchedule::parse("*/5 * * * *"),
            Ok(TimerSchedule::Cron(_))
        ));
        assert!(TimerSchedule::parse("0s").is_err());
        assert!(TimerSchedule::parse("soon").is_err());
        assert!(TimerSchedule::parse("99 99 99 99 99").is_err());
    }

    #[test]
    fn interval_due_after_elapsed() {
        let schedule = TimerSchedule::parse("10m").unwrap();
        let t0 = at("2026-01-15T10:00:00Z");
        assert!(!schedule.is_due(t0 + chrono::Duration::minutes(9), t0));
        assert!(schedule.is_due(t0 + chrono::Duration::minutes(10), t0));
    }

    #[test]
    fn cron_due_after_tick() {
        let schedule = TimerSchedule::parse("*/5 * * * *").unwrap();
        let last = at("2026-01-15T10:00:01Z");
        assert!(!schedule.is_due(last + chrono::Duration::minutes(2), last));
        assert!(schedule.is_due(last + chrono::Duration::minutes(5), last));
    }

    #[test]
    fn is_cron_due_never_run_before() {
        let schedule = Schedule::from_str("0 * * * * *").unwrap();
        assert!(is_cron_due(&schedule, Utc::now(), None));
    }

    #[test]
    fn is_cron_due_just_ran() {
        let schedule = Schedule::from_str("0 * * * * *").unwrap();
        let now = Utc::now();
        assert!(!is_cron_due(&schedule, now, Some(now)));
    }

    // -- TimerScheduler ----------------------------------------------------

    #[test]
    fn scheduler_due_and_record() {
        let mut sched = TimerScheduler::new();
        let t0 = at("2026-01-15T10:00:00Z");
        sched.register("rs/r1", "0", "1h", TimerSchedule::parse("1h").unwrap(), t0);
        assert_eq!(sched.len(), 1);

        let later = t0 + chrono::Duration::hours(1);
        assert!(!sched.is_due("rs/r1", "0", t0));
        assert!(sched.is_due("rs/r1", "0", later));
        assert_eq!(sched.due_timers(later), vec![("rs/r1", "0")]);

        sched.record_fired("rs/r1", "0", later);
        assert!(!sched.is_due("rs/r1", "0", later));
        assert_eq!(sched.get("rs/r1", "0").unwrap().last_fired, later);
    }

    #[test]
    fn scheduler_reregister_same_expression_keeps_window() {
        let mut sched = TimerScheduler::new();
        let t0 = at("2026-01-15T10:00:00Z");
        sched.register("r", "t", "1h", TimerSchedule::parse("1h").unwrap(), t0);
        let t1 = t0 + chrono::Duration::minutes(30);
        sched.register("r", "t", "1h", TimerSchedule::parse("1h").unwrap(), t1);
        assert_eq!(sched.get("r", "t").unwrap().last_fired, t0);

        sched.register("r", "t", "2h", TimerSchedule::parse("2h").unwrap(), t1);
        assert_eq!(sched.get("r", "t").unwrap().last_fired, t1);
    }

    #[test]
    fn scheduler_unknown_and_removed() {
        let mut sched = TimerScheduler::new();
        let now = Utc::now();
        assert!(!sched.is_due("missing", "0", now));
        sched.record_fired("missing", "0", now);

        sched.register("a", "0", "1m", TimerSchedule::parse("1m").unwrap(), now);
        sched.register("b", "0", "1m", TimerSchedule::parse("1m").unwrap(), now);
        sched.remove_rule("a");
        assert_eq!(sched.len(), 1);
        assert!(sched.get("a", "0").is_none());
        assert!(!sched.is_empty());
    }
}
