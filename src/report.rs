use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{
    DailyActivity, DailyCount, DashboardSummary, EnrollmentStatus, SchoolTimeDay,
    StudentHighlight,
};

fn status_label(status: EnrollmentStatus) -> &'static str {
    match status {
        EnrollmentStatus::Active => "active",
        EnrollmentStatus::Absent => "absent",
        EnrollmentStatus::ActiveNotEnrolled => "active, not enrolled",
        EnrollmentStatus::Unknown => "unknown",
    }
}

pub fn build_report(
    days: u32,
    today: NaiveDate,
    summary: &DashboardSummary,
    weekly: &[DailyCount],
    daily: &[DailyActivity],
    students: &[StudentHighlight],
    split: &[SchoolTimeDay],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# LMS Activity Report");
    let _ = writeln!(output, "Generated on {} (last {} days)", today, days);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Totals");
    let _ = writeln!(output, "- Students: {}", summary.students);
    let _ = writeln!(output, "- Visible courses: {}", summary.visible_courses);
    let _ = writeln!(output, "- Students with activity: {}", summary.active_students);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Active Users, Last 7 Days");

    if weekly.iter().all(|point| point.value == 0) {
        let _ = writeln!(output, "No active users in the last week.");
    } else {
        for point in weekly {
            let _ = writeln!(output, "- {}: {} active users", point.date, point.value);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Activity");

    let active_days: Vec<&DailyActivity> =
        daily.iter().filter(|d| d.total_activities > 0).collect();
    if active_days.is_empty() {
        let _ = writeln!(output, "No activity recorded for this window.");
    } else {
        for record in active_days.iter().rev().take(10) {
            let _ = writeln!(
                output,
                "- {}: {} activities across {} operation types",
                record.date,
                record.total_activities,
                record.operations.values().filter(|count| **count > 0).count()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Active Students");

    if students.is_empty() {
        let _ = writeln!(output, "No students with activity in this window.");
    } else {
        for student in students.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}) {} activities [{}]",
                student.name,
                student.username,
                student.total_activities,
                status_label(student.status)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## School vs Out-of-school");

    let school: i64 = split.iter().map(|d| d.school).sum();
    let non_school: i64 = split.iter().map(|d| d.non_school).sum();
    if school + non_school == 0 {
        let _ = writeln!(output, "No activity recorded for this window.");
    } else {
        let _ = writeln!(output, "- During school hours: {} activities", school);
        let _ = writeln!(output, "- Outside school hours: {} activities", non_school);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn summary() -> DashboardSummary {
        DashboardSummary {
            students: 4,
            visible_courses: 2,
            active_students: 3,
        }
    }

    #[test]
    fn report_includes_every_section() {
        let report = build_report(
            30,
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            &summary(),
            &[],
            &[],
            &[],
            &[],
        );
        assert!(report.contains("# LMS Activity Report"));
        assert!(report.contains("## Totals"));
        assert!(report.contains("## Active Users, Last 7 Days"));
        assert!(report.contains("## Daily Activity"));
        assert!(report.contains("## Most Active Students"));
        assert!(report.contains("## School vs Out-of-school"));
    }

    #[test]
    fn empty_windows_render_fallback_lines() {
        let report = build_report(
            7,
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            &summary(),
            &[],
            &[],
            &[],
            &[],
        );
        assert!(report.contains("No active users in the last week."));
        assert!(report.contains("No activity recorded for this window."));
        assert!(report.contains("No students with activity in this window."));
    }

    #[test]
    fn student_lines_carry_status_labels() {
        let students = vec![StudentHighlight {
            user_id: 1,
            username: "s.tanaka".to_string(),
            name: "Sora Tanaka".to_string(),
            total_activities: 12,
            status: EnrollmentStatus::Active,
        }];
        let mut operations = BTreeMap::new();
        operations.insert("OPEN".to_string(), 12_i64);
        let daily = vec![DailyActivity {
            date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            total_activities: 12,
            operations,
        }];
        let split = vec![SchoolTimeDay {
            date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            school: 8,
            non_school: 4,
        }];
        let weekly = vec![DailyCount {
            date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            value: 3,
        }];
        let report = build_report(
            7,
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            &summary(),
            &weekly,
            &daily,
            &students,
            &split,
        );
        assert!(report.contains("- 2026-03-10: 3 active users"));
        assert!(report.contains("Sora Tanaka (s.tanaka) 12 activities [active]"));
        assert!(report.contains("- During school hours: 8 activities"));
        assert!(report.contains("- 2026-03-10: 12 activities across 1 operation types"));
    }
}
