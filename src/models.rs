use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A course row in the local mirror table.
#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub course_id: i64,
    pub course_name: String,
    pub parent_category_id: i64,
    pub parent_category_name: String,
    pub child_category_id: i64,
    pub child_category_name: String,
    pub course_sortorder: i64,
    pub course_visible: bool,
    pub course_startdate: Option<DateTime<Utc>>,
    pub course_enddate: Option<DateTime<Utc>>,
    pub course_created: DateTime<Utc>,
    pub subject_category: Option<String>,
    pub last_synced: DateTime<Utc>,
}

impl Course {
    /// The fields owned by the Moodle source, used for change detection.
    pub fn mirrored(&self) -> CourseFields {
        CourseFields {
            course_id: self.course_id,
            course_name: self.course_name.clone(),
            parent_category_id: self.parent_category_id,
            parent_category_name: self.parent_category_name.clone(),
            child_category_id: self.child_category_id,
            child_category_name: self.child_category_name.clone(),
            course_sortorder: self.course_sortorder,
            course_visible: self.course_visible,
            course_startdate: self.course_startdate,
            course_enddate: self.course_enddate,
            course_created: self.course_created,
        }
    }

    pub fn is_active(&self) -> bool {
        if !self.course_visible {
            return false;
        }
        let now = Utc::now();
        if let Some(start) = self.course_startdate {
            if start > now {
                return false;
            }
        }
        if let Some(end) = self.course_enddate {
            if end < now {
                return false;
            }
        }
        true
    }

    pub fn full_category_path(&self) -> String {
        format!(
            "{} > {}",
            self.parent_category_name, self.child_category_name
        )
    }
}

/// The mirrored subset of course fields as they arrive from the source.
/// `subject_category` and `last_synced` are locally owned and excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseFields {
    pub course_id: i64,
    pub course_name: String,
    pub parent_category_id: i64,
    pub parent_category_name: String,
    pub child_category_id: i64,
    pub child_category_name: String,
    pub course_sortorder: i64,
    pub course_visible: bool,
    pub course_startdate: Option<DateTime<Utc>>,
    pub course_enddate: Option<DateTime<Utc>>,
    pub course_created: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub errors: usize,
}

impl SyncReport {
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.unchanged
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Absent,
    ActiveNotEnrolled,
    Unknown,
}

/// Per-student aggregate used to rank and color the student charts.
#[derive(Debug, Clone, Serialize)]
pub struct StudentHighlight {
    pub user_id: i64,
    pub username: String,
    pub name: String,
    pub total_activities: i64,
    pub status: EnrollmentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub total_activities: i64,
    pub operations: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchoolTimeDay {
    pub date: NaiveDate,
    pub school: i64,
    pub non_school: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub students: i64,
    pub visible_courses: i64,
    pub active_students: i64,
}
