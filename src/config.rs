use anyhow::{ensure, Context};

/// Application settings read from the environment, with defaults matching
/// the deployment this dashboard was built for.
#[derive(Debug, Clone)]
pub struct Settings {
    pub subject_categories: Vec<String>,
    pub sync_batch_size: usize,
    pub sync_timeout_secs: u64,
    pub school_start_minutes: u32,
    pub school_end_minutes: u32,
    pub school_utc_offset_hours: i64,
    pub max_session_secs: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            subject_categories: [
                "math",
                "english",
                "science",
                "social_studies",
                "language",
                "other",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            sync_batch_size: 500,
            sync_timeout_secs: 30,
            school_start_minutes: 9 * 60,
            school_end_minutes: 16 * 60,
            school_utc_offset_hours: 9,
            max_session_secs: 5400,
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut settings = Settings::default();

        if let Ok(raw) = std::env::var("COURSE_SUBJECT_CATEGORIES") {
            settings.subject_categories = raw
                .split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect();
        }
        if let Ok(raw) = std::env::var("SYNC_BATCH_SIZE") {
            settings.sync_batch_size = raw
                .parse()
                .context("SYNC_BATCH_SIZE must be a positive integer")?;
        }
        if let Ok(raw) = std::env::var("SYNC_TIMEOUT_SECS") {
            settings.sync_timeout_secs = raw
                .parse()
                .context("SYNC_TIMEOUT_SECS must be a positive integer")?;
        }
        if let Ok(raw) = std::env::var("SCHOOL_START_TIME") {
            settings.school_start_minutes = parse_school_time(&raw)?;
        }
        if let Ok(raw) = std::env::var("SCHOOL_END_TIME") {
            settings.school_end_minutes = parse_school_time(&raw)?;
        }
        if let Ok(raw) = std::env::var("SCHOOL_UTC_OFFSET_HOURS") {
            settings.school_utc_offset_hours = raw
                .parse()
                .context("SCHOOL_UTC_OFFSET_HOURS must be an integer")?;
        }
        if let Ok(raw) = std::env::var("MAX_SESSION_DURATION") {
            settings.max_session_secs = raw
                .parse()
                .context("MAX_SESSION_DURATION must be a number of seconds")?;
        }

        ensure!(
            settings.school_start_minutes < settings.school_end_minutes,
            "school start time must be before school end time"
        );

        Ok(settings)
    }
}

/// Parse an "HH:MM" school-hours boundary into minutes from midnight.
pub fn parse_school_time(raw: &str) -> anyhow::Result<u32> {
    let (hours, minutes) = raw
        .split_once(':')
        .with_context(|| format!("school time must be HH:MM, got {raw:?}"))?;
    let hours: u32 = hours
        .parse()
        .with_context(|| format!("invalid hour in school time {raw:?}"))?;
    let minutes: u32 = minutes
        .parse()
        .with_context(|| format!("invalid minute in school time {raw:?}"))?;
    ensure!(hours < 24 && minutes < 60, "school time out of range: {raw}");
    Ok(hours * 60 + minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_school_times() {
        assert_eq!(parse_school_time("09:00").unwrap(), 540);
        assert_eq!(parse_school_time("16:30").unwrap(), 990);
        assert_eq!(parse_school_time("0:05").unwrap(), 5);
    }

    #[test]
    fn rejects_malformed_school_times() {
        assert!(parse_school_time("nine").is_err());
        assert!(parse_school_time("25:00").is_err());
        assert!(parse_school_time("09:75").is_err());
        assert!(parse_school_time("0900").is_err());
    }

    #[test]
    fn defaults_cover_a_school_day() {
        let settings = Settings::default();
        assert_eq!(settings.school_start_minutes, 540);
        assert_eq!(settings.school_end_minutes, 960);
        assert_eq!(settings.max_session_secs, 5400);
        assert!(settings.subject_categories.contains(&"math".to_string()));
    }
}
