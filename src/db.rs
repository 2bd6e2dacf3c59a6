use std::collections::{HashMap, HashSet};

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::models::{Course, CourseFields};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        (2001_i64, "s.tanaka", "Sora", "Tanaka"),
        (2002, "m.watanabe", "Mio", "Watanabe"),
        (2003, "r.kobayashi", "Ren", "Kobayashi"),
        (2004, "y.ishida", "Yui", "Ishida"),
    ];

    for (user_id, username, firstname, lastname) in students {
        sqlx::query(
            r#"
            INSERT INTO moodle_insight.students (user_id, username, firstname, lastname)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET username = EXCLUDED.username,
                firstname = EXCLUDED.firstname,
                lastname = EXCLUDED.lastname
            "#,
        )
        .bind(user_id)
        .bind(username)
        .bind(firstname)
        .bind(lastname)
        .execute(pool)
        .await?;
    }

    let courses = vec![
        (
            301_i64,
            "Algebra I",
            1_i64,
            "Mathematics",
            11_i64,
            "Algebra",
        ),
        (
            302,
            "Reading Comprehension",
            2,
            "English",
            21,
            "Reading",
        ),
    ];

    for (course_id, name, parent_id, parent_name, child_id, child_name) in courses {
        sqlx::query(
            r#"
            INSERT INTO moodle_insight.courses
            (course_id, course_name, parent_category_id, parent_category_name,
             child_category_id, child_category_name, course_sortorder,
             course_visible, course_created, last_synced)
            VALUES ($1, $2, $3, $4, $5, $6, 0, TRUE, now(), now())
            ON CONFLICT (course_id) DO NOTHING
            "#,
        )
        .bind(course_id)
        .bind(name)
        .bind(parent_id)
        .bind(parent_name)
        .bind(child_id)
        .bind(child_name)
        .execute(pool)
        .await?;
    }

    // 2003 is enrolled with no activity (absent), 2004 is active without an
    // enrollment, and 2999 below has activity without a roster row.
    let enrollments = vec![(2001_i64, 301_i64), (2002, 301), (2002, 302), (2003, 302)];
    for (user_id, course_id) in enrollments {
        sqlx::query(
            r#"
            INSERT INTO moodle_insight.enrollments (user_id, course_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, course_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .execute(pool)
        .await?;
    }

    let holidays = vec![
        (NaiveDate::from_ymd_opt(2026, 1, 1).context("invalid date")?, "New Year's Day"),
        (NaiveDate::from_ymd_opt(2026, 2, 11).context("invalid date")?, "National Foundation Day"),
        (NaiveDate::from_ymd_opt(2026, 5, 5).context("invalid date")?, "Children's Day"),
    ];
    for (date, name) in holidays {
        sqlx::query(
            r#"
            INSERT INTO moodle_insight.holidays (date, name)
            VALUES ($1, $2)
            ON CONFLICT (date) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(date)
        .bind(name)
        .execute(pool)
        .await?;
    }

    // (user_id, course_id, operation, days ago, hour UTC)
    let events: Vec<(i64, Option<i64>, &str, i64, i64)> = vec![
        (2001, Some(301), "OPEN", 0, 1),
        (2001, Some(301), "NEXT", 0, 1),
        (2001, Some(301), "ADD_MARKER", 0, 2),
        (2001, Some(301), "OPEN", 1, 3),
        (2001, Some(301), "ADD_HW_MEMO", 1, 3),
        (2001, Some(301), "OPEN", 2, 10),
        (2002, Some(301), "OPEN", 0, 2),
        (2002, Some(302), "NEXT", 1, 5),
        (2002, Some(302), "OPEN", 3, 4),
        (2004, Some(302), "OPEN", 0, 6),
        (2004, Some(302), "NEXT", 2, 6),
        (2999, None, "OPEN", 1, 11),
    ];

    for (index, (user_id, course_id, operation, days_ago, hour)) in events.into_iter().enumerate() {
        let occurred_at = Utc::now() - Duration::days(days_ago) - Duration::hours(hour);
        sqlx::query(
            r#"
            INSERT INTO moodle_insight.activity_events
            (id, user_id, course_id, operation_name, occurred_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(course_id)
        .bind(operation)
        .bind(occurred_at)
        .bind(format!("seed-{index:03}"))
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn get_course(pool: &PgPool, course_id: i64) -> anyhow::Result<Option<Course>> {
    let row = sqlx::query(
        "SELECT course_id, course_name, parent_category_id, parent_category_name, \
         child_category_id, child_category_name, course_sortorder, course_visible, \
         course_startdate, course_enddate, course_created, subject_category, last_synced \
         FROM moodle_insight.courses WHERE course_id = $1",
    )
    .bind(course_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| course_from_row(&row)))
}

fn course_from_row(row: &PgRow) -> Course {
    Course {
        course_id: row.get("course_id"),
        course_name: row.get("course_name"),
        parent_category_id: row.get("parent_category_id"),
        parent_category_name: row.get("parent_category_name"),
        child_category_id: row.get("child_category_id"),
        child_category_name: row.get("child_category_name"),
        course_sortorder: row.get("course_sortorder"),
        course_visible: row.get("course_visible"),
        course_startdate: row.get("course_startdate"),
        course_enddate: row.get("course_enddate"),
        course_created: row.get("course_created"),
        subject_category: row.get("subject_category"),
        last_synced: row.get("last_synced"),
    }
}

pub async fn set_subject_category(
    pool: &PgPool,
    course_id: i64,
    subject: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "UPDATE moodle_insight.courses SET subject_category = $2 WHERE course_id = $1",
    )
    .bind(course_id)
    .bind(subject)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_visible_courses(pool: &PgPool) -> anyhow::Result<Vec<Course>> {
    let rows = sqlx::query(
        "SELECT course_id, course_name, parent_category_id, parent_category_name, \
         child_category_id, child_category_name, course_sortorder, course_visible, \
         course_startdate, course_enddate, course_created, subject_category, last_synced \
         FROM moodle_insight.courses WHERE course_visible \
         ORDER BY parent_category_name, child_category_name, course_sortorder",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(course_from_row).collect())
}

pub async fn insert_course(
    tx: &mut Transaction<'_, Postgres>,
    fields: &CourseFields,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO moodle_insight.courses
        (course_id, course_name, parent_category_id, parent_category_name,
         child_category_id, child_category_name, course_sortorder, course_visible,
         course_startdate, course_enddate, course_created, last_synced)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now())
        "#,
    )
    .bind(fields.course_id)
    .bind(&fields.course_name)
    .bind(fields.parent_category_id)
    .bind(&fields.parent_category_name)
    .bind(fields.child_category_id)
    .bind(&fields.child_category_name)
    .bind(fields.course_sortorder)
    .bind(fields.course_visible)
    .bind(fields.course_startdate)
    .bind(fields.course_enddate)
    .bind(fields.course_created)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn update_course(
    tx: &mut Transaction<'_, Postgres>,
    fields: &CourseFields,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE moodle_insight.courses
        SET course_name = $2,
            parent_category_id = $3,
            parent_category_name = $4,
            child_category_id = $5,
            child_category_name = $6,
            course_sortorder = $7,
            course_visible = $8,
            course_startdate = $9,
            course_enddate = $10,
            course_created = $11,
            last_synced = now()
        WHERE course_id = $1
        "#,
    )
    .bind(fields.course_id)
    .bind(&fields.course_name)
    .bind(fields.parent_category_id)
    .bind(&fields.parent_category_name)
    .bind(fields.child_category_id)
    .bind(&fields.child_category_name)
    .bind(fields.course_sortorder)
    .bind(fields.course_visible)
    .bind(fields.course_startdate)
    .bind(fields.course_enddate)
    .bind(fields.course_created)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn import_activity_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        user_id: i64,
        username: Option<String>,
        course_id: Option<i64>,
        operation_name: String,
        occurred_at: DateTime<Utc>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;

        if let Some(username) = &row.username {
            sqlx::query(
                r#"
                INSERT INTO moodle_insight.students (user_id, username)
                VALUES ($1, $2)
                ON CONFLICT (user_id) DO UPDATE SET username = EXCLUDED.username
                "#,
            )
            .bind(row.user_id)
            .bind(username)
            .execute(pool)
            .await?;
        }

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO moodle_insight.activity_events
            (id, user_id, course_id, operation_name, occurred_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.user_id)
        .bind(row.course_id)
        .bind(&row.operation_name)
        .bind(row.occurred_at)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn import_holidays_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        date: NaiveDate,
        name: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        sqlx::query(
            r#"
            INSERT INTO moodle_insight.holidays (date, name)
            VALUES ($1, $2)
            ON CONFLICT (date) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(row.date)
        .bind(&row.name)
        .execute(pool)
        .await?;
        imported += 1;
    }

    Ok(imported)
}

pub async fn count_students(pool: &PgPool) -> anyhow::Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM moodle_insight.students")
        .fetch_one(pool)
        .await?;
    Ok(row.get("total"))
}

pub async fn count_visible_courses(pool: &PgPool) -> anyhow::Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total FROM moodle_insight.courses WHERE course_visible",
    )
    .fetch_one(pool)
    .await?;
    Ok(row.get("total"))
}

pub async fn count_active_students(pool: &PgPool) -> anyhow::Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(DISTINCT user_id) AS total FROM moodle_insight.activity_events",
    )
    .fetch_one(pool)
    .await?;
    Ok(row.get("total"))
}

pub async fn daily_active_users(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> anyhow::Result<Vec<(NaiveDate, i64)>> {
    let rows = sqlx::query(
        "SELECT occurred_at::date AS day, COUNT(DISTINCT user_id) AS total \
         FROM moodle_insight.activity_events \
         WHERE occurred_at >= $1 \
         GROUP BY day ORDER BY day ASC",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get("day"), row.get("total")))
        .collect())
}

pub async fn daily_operation_counts(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> anyhow::Result<Vec<(NaiveDate, String, i64)>> {
    let rows = sqlx::query(
        "SELECT occurred_at::date AS day, operation_name, COUNT(*) AS total \
         FROM moodle_insight.activity_events \
         WHERE occurred_at >= $1 \
         GROUP BY day, operation_name ORDER BY day ASC, operation_name",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get("day"), row.get("operation_name"), row.get("total")))
        .collect())
}

pub async fn activity_counts_by_user(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> anyhow::Result<HashMap<i64, i64>> {
    let rows = sqlx::query(
        "SELECT user_id, COUNT(*) AS total \
         FROM moodle_insight.activity_events \
         WHERE occurred_at >= $1 \
         GROUP BY user_id",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get("user_id"), row.get("total")))
        .collect())
}

#[derive(Debug, Clone)]
pub struct StudentName {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
}

pub async fn student_names(pool: &PgPool) -> anyhow::Result<HashMap<i64, StudentName>> {
    let rows = sqlx::query(
        "SELECT user_id, username, firstname, lastname FROM moodle_insight.students",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            (
                row.get("user_id"),
                StudentName {
                    username: row.get("username"),
                    firstname: row.get("firstname"),
                    lastname: row.get("lastname"),
                },
            )
        })
        .collect())
}

pub async fn enrolled_user_ids(pool: &PgPool) -> anyhow::Result<HashSet<i64>> {
    let rows = sqlx::query("SELECT DISTINCT user_id FROM moodle_insight.enrollments")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|row| row.get("user_id")).collect())
}

pub async fn event_timestamps(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> anyhow::Result<Vec<(i64, DateTime<Utc>)>> {
    let rows = sqlx::query(
        "SELECT user_id, occurred_at \
         FROM moodle_insight.activity_events \
         WHERE occurred_at >= $1 \
         ORDER BY user_id, occurred_at",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get("user_id"), row.get("occurred_at")))
        .collect())
}

pub async fn holidays(pool: &PgPool) -> anyhow::Result<HashSet<NaiveDate>> {
    let rows = sqlx::query("SELECT date FROM moodle_insight.holidays")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|row| row.get("date")).collect())
}
