use serde_json::{json, Value};

use crate::analytics::{HourlyHeatmap, TimeSpentDistribution};
use crate::engagement::EngagementBand;
use crate::models::{
    DailyActivity, DailyCount, DashboardSummary, EnrollmentStatus, SchoolTimeDay,
    StudentHighlight,
};

pub const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

pub fn band_color(band: EngagementBand) -> &'static str {
    match band {
        EngagementBand::High => "#d63031",
        EngagementBand::Moderate => "#e17055",
        EngagementBand::Light => "#fdcb6e",
        EngagementBand::Brief => "#74b9ff",
        EngagementBand::Minimal => "#dfe6e9",
    }
}

pub fn status_color(status: EnrollmentStatus) -> &'static str {
    match status {
        EnrollmentStatus::Active => "#00b894",
        EnrollmentStatus::Absent => "#d63031",
        EnrollmentStatus::ActiveNotEnrolled => "#fdcb6e",
        EnrollmentStatus::Unknown => "#b2bec3",
    }
}

/// Placeholder payload rendered in place of a chart whose data failed to
/// load, so the rest of the page stays usable.
pub fn error_placeholder(chart: &str) -> Value {
    json!({
        "chart": chart,
        "error": "error loading chart",
        "series": [],
    })
}

pub fn summary_payload(summary: &DashboardSummary) -> Value {
    json!({
        "chart": "summary",
        "students": summary.students,
        "visible_courses": summary.visible_courses,
        "active_students": summary.active_students,
    })
}

pub fn daily_users_chart(points: &[DailyCount]) -> Value {
    json!({
        "chart": "daily-active-users",
        "type": "area",
        "categories": points.iter().map(|p| p.date.to_string()).collect::<Vec<_>>(),
        "series": [{
            "name": "Active users",
            "data": points.iter().map(|p| p.value).collect::<Vec<_>>(),
        }],
    })
}

/// Stacked series, one per operation observed in the window, plus the
/// total as its own line.
pub fn daily_activities_chart(days: &[DailyActivity]) -> Value {
    let categories: Vec<String> = days.iter().map(|d| d.date.to_string()).collect();
    let operations: Vec<&String> = days
        .first()
        .map(|d| d.operations.keys().collect())
        .unwrap_or_default();

    let mut series: Vec<Value> = operations
        .iter()
        .map(|operation| {
            json!({
                "name": operation,
                "type": "column",
                "data": days
                    .iter()
                    .map(|d| d.operations.get(*operation).copied().unwrap_or(0))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    series.push(json!({
        "name": "Total",
        "type": "line",
        "data": days.iter().map(|d| d.total_activities).collect::<Vec<_>>(),
    }));

    json!({
        "chart": "daily-activities",
        "stacked": true,
        "categories": categories,
        "series": series,
    })
}

pub fn student_highlights_chart(students: &[StudentHighlight]) -> Value {
    json!({
        "chart": "most-active-students",
        "type": "bar",
        "categories": students.iter().map(|s| s.name.clone()).collect::<Vec<_>>(),
        "series": [{
            "name": "Activities",
            "data": students.iter().map(|s| s.total_activities).collect::<Vec<_>>(),
        }],
        "colors": students
            .iter()
            .map(|s| status_color(s.status))
            .collect::<Vec<_>>(),
        "students": students,
    })
}

pub fn heatmap_chart(heatmap: &HourlyHeatmap) -> Value {
    let series: Vec<Value> = (0..7u32)
        .map(|weekday| {
            let data: Vec<Value> = heatmap
                .cells
                .iter()
                .filter(|cell| cell.weekday == weekday)
                .map(|cell| {
                    json!({
                        "x": format!("{:02}:00", cell.hour),
                        "y": cell.activities,
                        "students": cell.students,
                        "ratio": cell.ratio,
                        "band": cell.band.label(),
                        "color": band_color(cell.band),
                    })
                })
                .collect();
            json!({
                "name": WEEKDAY_LABELS[weekday as usize],
                "data": data,
            })
        })
        .collect();

    json!({
        "chart": "hourly-heatmap",
        "type": "heatmap",
        "series": series,
        "thresholds": heatmap.thresholds,
    })
}

pub fn school_time_chart(days: &[SchoolTimeDay]) -> Value {
    json!({
        "chart": "school-time",
        "stacked": true,
        "categories": days.iter().map(|d| d.date.to_string()).collect::<Vec<_>>(),
        "series": [
            {
                "name": "School time",
                "data": days.iter().map(|d| d.school).collect::<Vec<_>>(),
            },
            {
                "name": "Out of school",
                "data": days.iter().map(|d| d.non_school).collect::<Vec<_>>(),
            },
        ],
    })
}

pub fn time_spent_chart(distribution: &TimeSpentDistribution) -> Value {
    json!({
        "chart": "time-spent",
        "statistics": distribution.statistics,
        "series": [
            {
                "name": "Students",
                "type": "column",
                "data": distribution
                    .bins
                    .iter()
                    .map(|bin| json!({
                        "x": format!("{:.1}-{:.1}h", bin.bin_start, bin.bin_end),
                        "y": bin.frequency,
                    }))
                    .collect::<Vec<_>>(),
            },
            {
                "name": "Normal curve",
                "type": "line",
                "data": distribution
                    .normal_curve
                    .iter()
                    .map(|point| json!({"x": point.x, "y": point.y}))
                    .collect::<Vec<_>>(),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn placeholder_names_the_broken_chart() {
        let payload = error_placeholder("daily-activities");
        assert_eq!(payload["chart"], "daily-activities");
        assert_eq!(payload["error"], "error loading chart");
        assert!(payload["series"].as_array().unwrap().is_empty());
    }

    #[test]
    fn daily_users_chart_keeps_dates_and_values_aligned() {
        let points = vec![
            DailyCount { date: day(9), value: 3 },
            DailyCount { date: day(10), value: 5 },
        ];
        let payload = daily_users_chart(&points);
        assert_eq!(payload["categories"][1], "2026-03-10");
        assert_eq!(payload["series"][0]["data"][1], 5);
    }

    #[test]
    fn daily_activities_chart_emits_one_series_per_operation_plus_total() {
        let mut operations = BTreeMap::new();
        operations.insert("OPEN".to_string(), 4_i64);
        operations.insert("NEXT".to_string(), 1_i64);
        let days = vec![crate::models::DailyActivity {
            date: day(10),
            total_activities: 5,
            operations,
        }];
        let payload = daily_activities_chart(&days);
        let series = payload["series"].as_array().unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series[2]["name"], "Total");
        assert_eq!(series[2]["data"][0], 5);
    }

    #[test]
    fn highlight_colors_follow_status() {
        use crate::models::{EnrollmentStatus, StudentHighlight};
        let students = vec![
            StudentHighlight {
                user_id: 1,
                username: "a".to_string(),
                name: "A".to_string(),
                total_activities: 9,
                status: EnrollmentStatus::Active,
            },
            StudentHighlight {
                user_id: 2,
                username: "b".to_string(),
                name: "B".to_string(),
                total_activities: 0,
                status: EnrollmentStatus::Absent,
            },
        ];
        let payload = student_highlights_chart(&students);
        assert_eq!(payload["colors"][0], "#00b894");
        assert_eq!(payload["colors"][1], "#d63031");
    }

    #[test]
    fn heatmap_chart_has_one_series_per_weekday() {
        let heatmap = crate::analytics::build_heatmap(&[], &crate::schooltime::SchoolHours {
            start_minutes: 540,
            end_minutes: 960,
            utc_offset_hours: 9,
        });
        let payload = heatmap_chart(&crate::analytics::HourlyHeatmap {
            cells: heatmap.0,
            thresholds: heatmap.1,
        });
        let series = payload["series"].as_array().unwrap();
        assert_eq!(series.len(), 7);
        assert_eq!(series[0]["data"].as_array().unwrap().len(), 24);
        assert_eq!(series[0]["name"], "Mon");
    }
}
