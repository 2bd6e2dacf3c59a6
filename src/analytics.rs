use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::calendar;
use crate::config::Settings;
use crate::db::{self, StudentName};
use crate::engagement::{EngagementBand, EngagementThresholds};
use crate::models::{
    DailyActivity, DailyCount, DashboardSummary, EnrollmentStatus, SchoolTimeDay,
    StudentHighlight,
};
use crate::schooltime::SchoolHours;

pub const DAILY_USERS_WINDOW: u32 = 30;
pub const DAILY_ACTIVITY_WINDOW: u32 = 31;
pub const WEEKLY_WINDOW: u32 = 7;
pub const HIGHLIGHT_LIMIT: usize = 10;
pub const DISTRIBUTION_BINS: usize = 20;

fn window_start(today: NaiveDate, window: u32) -> DateTime<Utc> {
    (today - Duration::days(i64::from(window) - 1))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

pub async fn summary_counts(pool: &PgPool) -> anyhow::Result<DashboardSummary> {
    Ok(DashboardSummary {
        students: db::count_students(pool).await?,
        visible_courses: db::count_visible_courses(pool).await?,
        active_students: db::count_active_students(pool).await?,
    })
}

pub async fn daily_active_users(pool: &PgPool, window: u32) -> anyhow::Result<Vec<DailyCount>> {
    let today = Utc::now().date_naive();
    let rows = db::daily_active_users(pool, window_start(today, window)).await?;
    Ok(calendar::fill_daily_counts(&rows, window, today)
        .into_iter()
        .map(|(date, value)| DailyCount { date, value })
        .collect())
}

pub async fn daily_activities(pool: &PgPool, window: u32) -> anyhow::Result<Vec<DailyActivity>> {
    let today = Utc::now().date_naive();
    let rows = db::daily_operation_counts(pool, window_start(today, window)).await?;
    Ok(build_daily_activities(&rows, window, today))
}

/// Reshape (date, operation, count) rows into one record per calendar day,
/// zero-filling every operation observed in the window.
pub fn build_daily_activities(
    rows: &[(NaiveDate, String, i64)],
    window: u32,
    today: NaiveDate,
) -> Vec<DailyActivity> {
    let operations: BTreeSet<String> = rows.iter().map(|(_, op, _)| op.clone()).collect();
    let zero: BTreeMap<String, i64> = operations.iter().map(|op| (op.clone(), 0)).collect();

    let mut per_day: BTreeMap<NaiveDate, BTreeMap<String, i64>> = BTreeMap::new();
    for (date, operation, count) in rows {
        per_day
            .entry(*date)
            .or_insert_with(|| zero.clone())
            .insert(operation.clone(), *count);
    }

    calendar::fill_daily_records(per_day, window, zero, today)
        .into_iter()
        .map(|(date, operations)| DailyActivity {
            date,
            total_activities: operations.values().sum(),
            operations,
        })
        .collect()
}

pub async fn most_active_students(
    pool: &PgPool,
    window: u32,
    limit: usize,
) -> anyhow::Result<Vec<StudentHighlight>> {
    let since = window_start(Utc::now().date_naive(), window);
    let counts = db::activity_counts_by_user(pool, since).await?;
    let enrolled = db::enrolled_user_ids(pool).await?;
    let roster = db::student_names(pool).await?;
    Ok(rank_students(&counts, &enrolled, &roster, limit))
}

/// Rank everyone seen in the window plus the enrolled roster, so silent
/// enrolled students surface as absent at the tail of the list.
pub fn rank_students(
    counts: &HashMap<i64, i64>,
    enrolled: &HashSet<i64>,
    roster: &HashMap<i64, StudentName>,
    limit: usize,
) -> Vec<StudentHighlight> {
    let mut candidates: BTreeSet<i64> = counts.keys().copied().collect();
    candidates.extend(enrolled.iter().copied());

    let mut highlights: Vec<StudentHighlight> = candidates
        .into_iter()
        .map(|user_id| {
            let total_activities = counts.get(&user_id).copied().unwrap_or(0);
            let status = enrollment_status(
                roster.contains_key(&user_id),
                enrolled.contains(&user_id),
                total_activities,
            );
            let (username, name) = display_name(user_id, roster.get(&user_id));
            StudentHighlight {
                user_id,
                username,
                name,
                total_activities,
                status,
            }
        })
        .collect();

    highlights.sort_by(|a, b| {
        b.total_activities
            .cmp(&a.total_activities)
            .then(a.user_id.cmp(&b.user_id))
    });
    highlights.truncate(limit);
    highlights
}

pub fn enrollment_status(
    in_roster: bool,
    enrolled: bool,
    activity_count: i64,
) -> EnrollmentStatus {
    match (enrolled, activity_count > 0) {
        (true, true) => EnrollmentStatus::Active,
        (true, false) => EnrollmentStatus::Absent,
        (false, true) => {
            if in_roster {
                EnrollmentStatus::ActiveNotEnrolled
            } else {
                EnrollmentStatus::Unknown
            }
        }
        (false, false) => EnrollmentStatus::Unknown,
    }
}

fn display_name(user_id: i64, entry: Option<&StudentName>) -> (String, String) {
    match entry {
        Some(student) => {
            let full = format!("{} {}", student.firstname, student.lastname);
            let name = if full.trim().is_empty() {
                student.username.clone()
            } else {
                full.trim().to_string()
            };
            (student.username.clone(), name)
        }
        None => (user_id.to_string(), user_id.to_string()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatmapCell {
    pub weekday: u32,
    pub hour: u32,
    pub activities: i64,
    pub students: i64,
    pub ratio: f64,
    pub band: EngagementBand,
}

#[derive(Debug, Clone, Serialize)]
pub struct HourlyHeatmap {
    pub cells: Vec<HeatmapCell>,
    pub thresholds: EngagementThresholds,
}

pub async fn hourly_heatmap(
    pool: &PgPool,
    settings: &Settings,
    window: u32,
) -> anyhow::Result<HourlyHeatmap> {
    let hours = SchoolHours::from_settings(settings);
    let since = window_start(Utc::now().date_naive(), window);
    let events = db::event_timestamps(pool, since).await?;
    let (cells, thresholds) = build_heatmap(&events, &hours);
    Ok(HourlyHeatmap { cells, thresholds })
}

/// Bucket events into a full 7x24 weekday/hour grid in local time and band
/// each cell by its activities-per-student ratio. Thresholds come from the
/// populated cells only.
pub fn build_heatmap(
    events: &[(i64, DateTime<Utc>)],
    hours: &SchoolHours,
) -> (Vec<HeatmapCell>, EngagementThresholds) {
    let mut buckets: BTreeMap<(u32, u32), (i64, HashSet<i64>)> = BTreeMap::new();
    for (user_id, at) in events {
        let key = hours.local_weekday_and_hour(*at);
        let entry = buckets.entry(key).or_default();
        entry.0 += 1;
        entry.1.insert(*user_id);
    }

    let samples: Vec<(i64, i64)> = buckets
        .values()
        .map(|(count, users)| (*count, users.len() as i64))
        .collect();
    let thresholds = EngagementThresholds::from_samples(&samples);

    let mut cells = Vec::with_capacity(7 * 24);
    for weekday in 0..7u32 {
        for hour in 0..24u32 {
            let (activities, students) = buckets
                .get(&(weekday, hour))
                .map(|(count, users)| (*count, users.len() as i64))
                .unwrap_or((0, 0));
            let ratio = if students > 0 {
                activities as f64 / students as f64
            } else {
                0.0
            };
            let band = if activities > 0 && students > 0 {
                thresholds.classify(ratio)
            } else {
                EngagementBand::Minimal
            };
            cells.push(HeatmapCell {
                weekday,
                hour,
                activities,
                students,
                ratio,
                band,
            });
        }
    }

    (cells, thresholds)
}

pub async fn school_time_split(
    pool: &PgPool,
    settings: &Settings,
    window: u32,
) -> anyhow::Result<Vec<SchoolTimeDay>> {
    let hours = SchoolHours::from_settings(settings);
    let today = hours.local_date(Utc::now());
    let since = window_start(today, window) - Duration::hours(hours.utc_offset_hours);
    let events = db::event_timestamps(pool, since).await?;
    let holidays = db::holidays(pool).await?;
    Ok(build_school_split(&events, &holidays, &hours, window, today))
}

pub fn build_school_split(
    events: &[(i64, DateTime<Utc>)],
    holidays: &HashSet<NaiveDate>,
    hours: &SchoolHours,
    window: u32,
    today: NaiveDate,
) -> Vec<SchoolTimeDay> {
    let mut per_day: HashMap<NaiveDate, (i64, i64)> = HashMap::new();
    for (_, at) in events {
        let entry = per_day.entry(hours.local_date(*at)).or_default();
        if hours.is_school_time(*at, holidays) {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    calendar::fill_daily_records(per_day, window, (0, 0), today)
        .into_iter()
        .map(|(date, (school, non_school))| SchoolTimeDay {
            date,
            school,
            non_school,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramBin {
    pub bin_start: f64,
    pub bin_end: f64,
    pub frequency: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributionStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurvePoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeSpentDistribution {
    pub statistics: DistributionStats,
    pub bins: Vec<HistogramBin>,
    pub normal_curve: Vec<CurvePoint>,
}

pub async fn time_spent_distribution(
    pool: &PgPool,
    settings: &Settings,
    window: u32,
) -> anyhow::Result<TimeSpentDistribution> {
    let since = window_start(Utc::now().date_naive(), window);
    let events = db::event_timestamps(pool, since).await?;
    let hours = per_student_hours(&events, settings.max_session_secs);
    Ok(build_distribution(&hours, DISTRIBUTION_BINS))
}

/// Total active hours per student, stitching consecutive events into
/// sessions. Gaps longer than `max_gap_secs` start a new session and do not
/// count; a lone event contributes nothing.
pub fn per_student_hours(events: &[(i64, DateTime<Utc>)], max_gap_secs: i64) -> Vec<f64> {
    let mut by_user: HashMap<i64, Vec<DateTime<Utc>>> = HashMap::new();
    for (user_id, at) in events {
        by_user.entry(*user_id).or_default().push(*at);
    }

    let mut hours: Vec<f64> = by_user
        .into_values()
        .map(|mut stamps| {
            stamps.sort();
            session_hours(&stamps, max_gap_secs)
        })
        .collect();
    hours.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    hours
}

pub fn session_hours(sorted: &[DateTime<Utc>], max_gap_secs: i64) -> f64 {
    let mut total_secs = 0i64;
    for pair in sorted.windows(2) {
        let gap = (pair[1] - pair[0]).num_seconds();
        if gap <= max_gap_secs {
            total_secs += gap;
        }
    }
    total_secs as f64 / 3600.0
}

pub fn build_distribution(hours: &[f64], bin_count: usize) -> TimeSpentDistribution {
    if hours.is_empty() || bin_count == 0 {
        return TimeSpentDistribution {
            statistics: DistributionStats {
                count: 0,
                mean: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
            },
            bins: Vec::new(),
            normal_curve: Vec::new(),
        };
    }

    let count = hours.len();
    let mean = hours.iter().sum::<f64>() / count as f64;
    let variance = hours.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    let std_dev = variance.sqrt();
    let min = hours.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = hours.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let width = if max > min {
        (max - min) / bin_count as f64
    } else {
        1.0
    };

    let mut frequencies = vec![0usize; bin_count];
    for value in hours {
        let index = (((value - min) / width).floor() as usize).min(bin_count - 1);
        frequencies[index] += 1;
    }

    let bins = frequencies
        .iter()
        .enumerate()
        .map(|(i, frequency)| HistogramBin {
            bin_start: min + i as f64 * width,
            bin_end: min + (i + 1) as f64 * width,
            frequency: *frequency,
        })
        .collect();

    let normal_curve = if std_dev > 0.0 {
        (0..bin_count)
            .map(|i| {
                let x = min + (i as f64 + 0.5) * width;
                let exponent = -((x - mean).powi(2)) / (2.0 * variance);
                let density = exponent.exp() / (std_dev * (2.0 * std::f64::consts::PI).sqrt());
                CurvePoint {
                    x,
                    y: density * count as f64 * width,
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    TimeSpentDistribution {
        statistics: DistributionStats {
            count,
            mean,
            std_dev,
            min,
            max,
        },
        bins,
        normal_curve,
    }
}
