use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};

use crate::config::Settings;

/// School-hours window used to split activity into school time and
/// non-school time (evenings, weekends, holidays).
#[derive(Debug, Clone, Copy)]
pub struct SchoolHours {
    pub start_minutes: u32,
    pub end_minutes: u32,
    pub utc_offset_hours: i64,
}

impl SchoolHours {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            start_minutes: settings.school_start_minutes,
            end_minutes: settings.school_end_minutes,
            utc_offset_hours: settings.school_utc_offset_hours,
        }
    }

    fn to_local(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        at + Duration::hours(self.utc_offset_hours)
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        self.to_local(at).date_naive()
    }

    pub fn local_weekday_and_hour(&self, at: DateTime<Utc>) -> (u32, u32) {
        let local = self.to_local(at);
        (local.weekday().num_days_from_monday(), local.hour())
    }

    pub fn is_school_time(&self, at: DateTime<Utc>, holidays: &HashSet<NaiveDate>) -> bool {
        let local = self.to_local(at);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        if holidays.contains(&local.date_naive()) {
            return false;
        }
        let minutes = local.hour() * 60 + local.minute();
        minutes >= self.start_minutes && minutes < self.end_minutes
    }
}
