use anyhow::Result;
use sqlx::PgPool;

use crate::db;
use crate::models::{Course, CourseFields, SyncReport};

#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    Create,
    Update { changed: Vec<&'static str> },
    Skip,
}

/// Decide what a source row means for the local mirror. A missing local row
/// is created; a present row is updated only when a mirrored field differs.
pub fn plan(existing: Option<&Course>, incoming: &CourseFields) -> SyncAction {
    match existing {
        None => SyncAction::Create,
        Some(course) => {
            let changed = changed_fields(&course.mirrored(), incoming);
            if changed.is_empty() {
                SyncAction::Skip
            } else {
                SyncAction::Update { changed }
            }
        }
    }
}

pub fn changed_fields(current: &CourseFields, incoming: &CourseFields) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if current.course_name != incoming.course_name {
        changed.push("course_name");
    }
    if current.parent_category_id != incoming.parent_category_id {
        changed.push("parent_category_id");
    }
    if current.parent_category_name != incoming.parent_category_name {
        changed.push("parent_category_name");
    }
    if current.child_category_id != incoming.child_category_id {
        changed.push("child_category_id");
    }
    if current.child_category_name != incoming.child_category_name {
        changed.push("child_category_name");
    }
    if current.course_sortorder != incoming.course_sortorder {
        changed.push("course_sortorder");
    }
    if current.course_visible != incoming.course_visible {
        changed.push("course_visible");
    }
    if current.course_startdate != incoming.course_startdate {
        changed.push("course_startdate");
    }
    if current.course_enddate != incoming.course_enddate {
        changed.push("course_enddate");
    }
    if current.course_created != incoming.course_created {
        changed.push("course_created");
    }
    changed
}

/// Reconcile the fetched source rows against the local mirror. Each course
/// is processed in its own transaction; a failure on one course is logged
/// and counted, never fatal to the batch.
pub async fn sync_courses(
    pool: &PgPool,
    courses: Vec<CourseFields>,
    dry_run: bool,
    batch_size: usize,
) -> SyncReport {
    let mut report = SyncReport::default();

    for (index, incoming) in courses.into_iter().enumerate() {
        if index > 0 && index % batch_size.max(1) == 0 {
            tracing::info!(processed = index, "sync checkpoint");
        }

        let course_id = incoming.course_id;
        match sync_one(pool, &incoming, dry_run).await {
            Ok(SyncAction::Create) => {
                report.created += 1;
                tracing::debug!(course_id, "created course");
            }
            Ok(SyncAction::Update { changed }) => {
                report.updated += 1;
                tracing::debug!(course_id, changed = changed.join(", "), "updated course");
            }
            Ok(SyncAction::Skip) => {
                report.unchanged += 1;
                tracing::debug!(course_id, "no changes for course");
            }
            Err(err) => {
                report.errors += 1;
                tracing::error!(course_id, error = %err, "failed to sync course");
            }
        }
    }

    report
}

async fn sync_one(pool: &PgPool, incoming: &CourseFields, dry_run: bool) -> Result<SyncAction> {
    let existing = db::get_course(pool, incoming.course_id).await?;
    let action = plan(existing.as_ref(), incoming);

    if dry_run {
        return Ok(action);
    }

    match &action {
        SyncAction::Create => {
            let mut tx = pool.begin().await?;
            db::insert_course(&mut tx, incoming).await?;
            tx.commit().await?;
        }
        SyncAction::Update { .. } => {
            let mut tx = pool.begin().await?;
            db::update_course(&mut tx, incoming).await?;
            tx.commit().await?;
        }
        SyncAction::Skip => {}
    }

    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn incoming() -> CourseFields {
        CourseFields {
            course_id: 123,
            course_name: "Algebra I".to_string(),
            parent_category_id: 1,
            parent_category_name: "Mathematics".to_string(),
            child_category_id: 11,
            child_category_name: "Algebra".to_string(),
            course_sortorder: 10001,
            course_visible: true,
            course_startdate: None,
            course_enddate: None,
            course_created: Utc::now(),
        }
    }

    fn existing(fields: &CourseFields) -> Course {
        Course {
            course_id: fields.course_id,
            course_name: fields.course_name.clone(),
            parent_category_id: fields.parent_category_id,
            parent_category_name: fields.parent_category_name.clone(),
            child_category_id: fields.child_category_id,
            child_category_name: fields.child_category_name.clone(),
            course_sortorder: fields.course_sortorder,
            course_visible: fields.course_visible,
            course_startdate: fields.course_startdate,
            course_enddate: fields.course_enddate,
            course_created: fields.course_created,
            subject_category: Some("math".to_string()),
            last_synced: Utc::now() - Duration::days(1),
        }
    }

    #[test]
    fn missing_local_row_is_created() {
        assert_eq!(plan(None, &incoming()), SyncAction::Create);
    }

    #[test]
    fn identical_rows_are_skipped() {
        let fields = incoming();
        let course = existing(&fields);
        assert_eq!(plan(Some(&course), &fields), SyncAction::Skip);
    }

    #[test]
    fn any_changed_field_triggers_an_update() {
        let mut fields = incoming();
        let course = existing(&fields);
        fields.course_name = "Algebra II".to_string();
        assert_eq!(
            plan(Some(&course), &fields),
            SyncAction::Update {
                changed: vec!["course_name"]
            }
        );
    }

    #[test]
    fn all_changed_fields_are_reported() {
        let mut fields = incoming();
        let course = existing(&fields);
        fields.course_visible = false;
        fields.course_sortorder = 2;
        fields.course_enddate = Some(Utc::now());
        let changed = changed_fields(&course.mirrored(), &fields);
        assert_eq!(
            changed,
            vec!["course_sortorder", "course_visible", "course_enddate"]
        );
    }

    #[test]
    fn local_classification_never_counts_as_a_change() {
        let fields = incoming();
        let mut course = existing(&fields);
        course.subject_category = None;
        assert_eq!(plan(Some(&course), &fields), SyncAction::Skip);
    }
}
