// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Trigger kinds for the job catalogue (§4.7) and their `next_run`
//! computation relative to a reference instant.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Timelike, Utc, Weekday};

#[derive(Debug, Clone, Copy)]
pub enum Trigger {
    IntervalMinutes(i64),
    CronDaily { hour: u32, minute: u32 },
    CronWeekly { weekday: Weekday, hour: u32, minute: u32 },
}

impl Trigger {
    pub fn next_run(self, after: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::IntervalMinutes(n) => after + Duration::minutes(n),
            Self::CronDaily { hour, minute } => next_daily(after, hour, minute),
            Self::CronWeekly { weekday, hour, minute } => next_weekly(after, weekday, hour, minute),
        }
    }
}

fn next_daily(after: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    let today = Utc.from_utc_datetime(&after.date_naive().and_time(time));
    if today > after { today } else { today + Duration::days(1) }
}

fn next_weekly(after: DateTime<Utc>, weekday: Weekday, hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    let mut candidate = Utc.from_utc_datetime(&after.date_naive().and_time(time));
    loop {
        if candidate.weekday() == weekday && candidate > after {
            return candidate;
        }
        candidate += Duration::days(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_advances_by_fixed_minutes() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap();
        let next = Trigger::IntervalMinutes(5).next_run(now);
        assert_eq!(next, now + Duration::minutes(5));
    }

    #[test]
    fn daily_trigger_rolls_to_tomorrow_once_past() {
        let after = Utc.with_ymd_and_hms(2025, 6, 15, 3, 0, 0).unwrap();
        let next = Trigger::CronDaily { hour: 2, minute: 30 }.next_run(after);
        assert_eq!(next.date_naive(), after.date_naive() + Duration::days(1));
        assert_eq!(next.hour(), 2);
        assert_eq!(next.minute(), 30);
    }

    #[test]
    fn daily_trigger_stays_today_if_still_ahead() {
        let after = Utc.with_ymd_and_hms(2025, 6, 15, 1, 0, 0).unwrap();
        let next = Trigger::CronDaily { hour: 2, minute: 30 }.next_run(after);
        assert_eq!(next.date_naive(), after.date_naive());
    }

    #[test]
    fn weekly_trigger_lands_on_requested_weekday() {
        let after = Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap(); // a Sunday
        let next = Trigger::CronWeekly { weekday: Weekday::Sun, hour: 2, minute: 0 }.next_run(after);
        assert_eq!(next.weekday(), Weekday::Sun);
        assert!(next > after);
    }
}
