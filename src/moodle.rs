use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

use crate::models::CourseFields;

const COURSE_QUERY: &str = "\
    SELECT \
        parent_cat.id AS parent_category_id, \
        parent_cat.name AS parent_category_name, \
        child_cat.id AS child_category_id, \
        child_cat.name AS child_category_name, \
        course.id AS course_id, \
        course.fullname AS course_name, \
        course.sortorder AS course_sortorder, \
        course.visible AS course_visible, \
        course.startdate AS course_startdate, \
        course.enddate AS course_enddate, \
        course.timecreated AS course_created \
    FROM mdl_course_categories parent_cat \
    JOIN mdl_course_categories child_cat ON child_cat.parent = parent_cat.id \
    LEFT JOIN mdl_course course ON course.category = child_cat.id \
    WHERE parent_cat.parent = 0";

/// Raw course row as it comes back from the source join. The LEFT JOIN on
/// the course table means every course-side field can be NULL.
#[derive(Debug, Clone, Default)]
pub struct RawCourseRow {
    pub parent_category_id: Option<i64>,
    pub parent_category_name: Option<String>,
    pub child_category_id: Option<i64>,
    pub child_category_name: Option<String>,
    pub course_id: Option<i64>,
    pub course_name: Option<String>,
    pub course_sortorder: Option<i64>,
    pub course_visible: Option<bool>,
    pub course_startdate: Option<i64>,
    pub course_enddate: Option<i64>,
    pub course_created: Option<i64>,
}

impl RawCourseRow {
    /// Convert a source row into mirrored course fields. Returns `None` for
    /// incomplete rows (NULL join fields), which are skipped rather than
    /// treated as errors.
    pub fn into_fields(self, fetched_at: DateTime<Utc>) -> Option<CourseFields> {
        let (
            Some(course_id),
            Some(course_name),
            Some(parent_category_id),
            Some(parent_category_name),
            Some(child_category_id),
            Some(child_category_name),
        ) = (
            self.course_id,
            self.course_name,
            self.parent_category_id,
            self.parent_category_name,
            self.child_category_id,
            self.child_category_name,
        )
        else {
            tracing::debug!("skipping incomplete source row with null join fields");
            return None;
        };

        Some(CourseFields {
            course_id,
            course_name,
            parent_category_id,
            parent_category_name,
            child_category_id,
            child_category_name,
            course_sortorder: self.course_sortorder.unwrap_or(0),
            course_visible: self.course_visible.unwrap_or(true),
            course_startdate: optional_timestamp(self.course_startdate, course_id, "startdate"),
            course_enddate: optional_timestamp(self.course_enddate, course_id, "enddate"),
            course_created: optional_timestamp(self.course_created, course_id, "timecreated")
                .unwrap_or(fetched_at),
        })
    }
}

/// Convert a Unix-epoch column to a timestamp. A value of 0 means unset in
/// Moodle; an out-of-range value is logged and treated as unset.
fn optional_timestamp(epoch: Option<i64>, course_id: i64, field: &str) -> Option<DateTime<Utc>> {
    match epoch {
        None | Some(0) => None,
        Some(secs) => match DateTime::from_timestamp(secs, 0) {
            Some(parsed) => Some(parsed),
            None => {
                tracing::warn!(course_id, field, secs, "unparsable epoch timestamp, skipping field");
                None
            }
        },
    }
}

/// Fetch candidate courses from the Moodle database, joined across the
/// two-level category tree, optionally filtered to a single course.
pub async fn fetch_courses(
    pool: &MySqlPool,
    course_id: Option<i64>,
) -> anyhow::Result<Vec<CourseFields>> {
    let mut query = String::from(COURSE_QUERY);
    if course_id.is_some() {
        query.push_str(" AND course.id = ?");
    }
    query.push_str(" ORDER BY parent_cat.sortorder, child_cat.sortorder, course.sortorder");

    let mut statement = sqlx::query(&query);
    if let Some(id) = course_id {
        statement = statement.bind(id);
    }

    let rows = statement.fetch_all(pool).await?;
    let fetched_at = Utc::now();

    let mut courses = Vec::new();
    for row in rows {
        if let Some(fields) = raw_row(&row)?.into_fields(fetched_at) {
            courses.push(fields);
        }
    }
    Ok(courses)
}

fn raw_row(row: &MySqlRow) -> anyhow::Result<RawCourseRow> {
    Ok(RawCourseRow {
        parent_category_id: row.try_get("parent_category_id")?,
        parent_category_name: row.try_get("parent_category_name")?,
        child_category_id: row.try_get("child_category_id")?,
        child_category_name: row.try_get("child_category_name")?,
        course_id: row.try_get("course_id")?,
        course_name: row.try_get("course_name")?,
        course_sortorder: row.try_get("course_sortorder")?,
        course_visible: row.try_get("course_visible")?,
        course_startdate: row.try_get("course_startdate")?,
        course_enddate: row.try_get("course_enddate")?,
        course_created: row.try_get("course_created")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_row() -> RawCourseRow {
        RawCourseRow {
            parent_category_id: Some(1),
            parent_category_name: Some("Mathematics".to_string()),
            child_category_id: Some(11),
            child_category_name: Some("Algebra".to_string()),
            course_id: Some(123),
            course_name: Some("Algebra I".to_string()),
            course_sortorder: Some(10001),
            course_visible: Some(true),
            course_startdate: Some(1_700_000_000),
            course_enddate: Some(0),
            course_created: Some(1_690_000_000),
        }
    }

    #[test]
    fn complete_rows_convert_to_course_fields() {
        let fetched_at = Utc::now();
        let fields = complete_row().into_fields(fetched_at).unwrap();
        assert_eq!(fields.course_id, 123);
        assert_eq!(fields.parent_category_name, "Mathematics");
        assert_eq!(
            fields.course_startdate,
            DateTime::from_timestamp(1_700_000_000, 0)
        );
        assert_eq!(fields.course_enddate, None);
        assert_eq!(
            fields.course_created,
            DateTime::from_timestamp(1_690_000_000, 0).unwrap()
        );
    }

    #[test]
    fn null_course_rows_are_skipped() {
        let mut row = complete_row();
        row.course_id = None;
        row.course_name = None;
        assert!(row.into_fields(Utc::now()).is_none());
    }

    #[test]
    fn null_category_rows_are_skipped() {
        let mut row = complete_row();
        row.child_category_name = None;
        assert!(row.into_fields(Utc::now()).is_none());
    }

    #[test]
    fn zero_epochs_mean_unset_dates() {
        let mut row = complete_row();
        row.course_startdate = Some(0);
        row.course_enddate = None;
        let fields = row.into_fields(Utc::now()).unwrap();
        assert_eq!(fields.course_startdate, None);
        assert_eq!(fields.course_enddate, None);
    }

    #[test]
    fn invalid_creation_epoch_falls_back_to_fetch_time() {
        let fetched_at = Utc::now();
        let mut row = complete_row();
        row.course_created = Some(i64::MAX);
        let fields = row.into_fields(fetched_at).unwrap();
        assert_eq!(fields.course_created, fetched_at);
    }

    #[test]
    fn invalid_start_epoch_is_dropped_not_fatal() {
        let mut row = complete_row();
        row.course_startdate = Some(i64::MIN);
        let fields = row.into_fields(Utc::now()).unwrap();
        assert_eq!(fields.course_startdate, None);
    }
}
