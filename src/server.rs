use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::analytics;
use crate::charts;
use crate::config::Settings;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Settings,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub days: Option<u32>,
}

impl WindowQuery {
    fn days_or(&self, default: u32) -> u32 {
        self.days.unwrap_or(default).clamp(1, 366)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/courses", get(courses))
        .route("/api/dashboard", get(dashboard))
        .route("/api/dashboard/summary", get(summary))
        .route("/api/dashboard/daily-active-users", get(daily_active_users))
        .route("/api/dashboard/daily-activities", get(daily_activities))
        .route("/api/dashboard/most-active-students", get(most_active_students))
        .route("/api/dashboard/hourly-heatmap", get(hourly_heatmap))
        .route("/api/dashboard/school-time", get(school_time))
        .route("/api/dashboard/time-spent", get(time_spent))
        .with_state(state)
}

pub async fn serve(state: AppState, address: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = address
        .parse()
        .with_context(|| format!("invalid listen address {address:?}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "dashboard listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// A failed aggregate becomes a placeholder payload instead of failing the
/// request, so one broken chart never breaks the page.
fn chart_payload(chart: &str, result: anyhow::Result<Value>) -> Value {
    match result {
        Ok(payload) => payload,
        Err(err) => {
            tracing::error!(chart, error = %err, "failed to build chart payload");
            charts::error_placeholder(chart)
        }
    }
}

async fn summary_payload(state: &AppState) -> anyhow::Result<Value> {
    Ok(charts::summary_payload(
        &analytics::summary_counts(&state.pool).await?,
    ))
}

async fn daily_users_payload(state: &AppState, window: u32) -> anyhow::Result<Value> {
    Ok(charts::daily_users_chart(
        &analytics::daily_active_users(&state.pool, window).await?,
    ))
}

async fn daily_activities_payload(state: &AppState, window: u32) -> anyhow::Result<Value> {
    Ok(charts::daily_activities_chart(
        &analytics::daily_activities(&state.pool, window).await?,
    ))
}

async fn highlights_payload(state: &AppState, window: u32) -> anyhow::Result<Value> {
    Ok(charts::student_highlights_chart(
        &analytics::most_active_students(&state.pool, window, analytics::HIGHLIGHT_LIMIT).await?,
    ))
}

async fn heatmap_payload(state: &AppState, window: u32) -> anyhow::Result<Value> {
    Ok(charts::heatmap_chart(
        &analytics::hourly_heatmap(&state.pool, &state.settings, window).await?,
    ))
}

async fn school_time_payload(state: &AppState, window: u32) -> anyhow::Result<Value> {
    Ok(charts::school_time_chart(
        &analytics::school_time_split(&state.pool, &state.settings, window).await?,
    ))
}

async fn time_spent_payload(state: &AppState, window: u32) -> anyhow::Result<Value> {
    Ok(charts::time_spent_chart(
        &analytics::time_spent_distribution(&state.pool, &state.settings, window).await?,
    ))
}

async fn courses_payload(state: &AppState) -> anyhow::Result<Value> {
    let courses = crate::db::list_visible_courses(&state.pool).await?;
    let rows: Vec<Value> = courses
        .iter()
        .map(|course| {
            json!({
                "course_id": course.course_id,
                "course_name": course.course_name,
                "category_path": course.full_category_path(),
                "subject_category": course.subject_category,
                "course_startdate": course.course_startdate,
                "course_enddate": course.course_enddate,
                "is_active": course.is_active(),
                "last_synced": course.last_synced,
            })
        })
        .collect();
    Ok(json!({ "courses": rows }))
}

async fn courses(State(state): State<AppState>) -> Json<Value> {
    Json(chart_payload("courses", courses_payload(&state).await))
}

async fn summary(State(state): State<AppState>) -> Json<Value> {
    Json(chart_payload("summary", summary_payload(&state).await))
}

async fn daily_active_users(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Json<Value> {
    let window = query.days_or(analytics::DAILY_USERS_WINDOW);
    Json(chart_payload(
        "daily-active-users",
        daily_users_payload(&state, window).await,
    ))
}

async fn daily_activities(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Json<Value> {
    let window = query.days_or(analytics::DAILY_ACTIVITY_WINDOW);
    Json(chart_payload(
        "daily-activities",
        daily_activities_payload(&state, window).await,
    ))
}

async fn most_active_students(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Json<Value> {
    let window = query.days_or(analytics::DAILY_USERS_WINDOW);
    Json(chart_payload(
        "most-active-students",
        highlights_payload(&state, window).await,
    ))
}

async fn hourly_heatmap(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Json<Value> {
    let window = query.days_or(analytics::DAILY_USERS_WINDOW);
    Json(chart_payload(
        "hourly-heatmap",
        heatmap_payload(&state, window).await,
    ))
}

async fn school_time(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Json<Value> {
    let window = query.days_or(analytics::DAILY_USERS_WINDOW);
    Json(chart_payload(
        "school-time",
        school_time_payload(&state, window).await,
    ))
}

async fn time_spent(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Json<Value> {
    let window = query.days_or(analytics::DAILY_USERS_WINDOW);
    Json(chart_payload(
        "time-spent",
        time_spent_payload(&state, window).await,
    ))
}

/// The whole dashboard in one payload, degrading chart by chart.
async fn dashboard(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "summary": chart_payload("summary", summary_payload(&state).await),
        "daily_active_users": chart_payload(
            "daily-active-users",
            daily_users_payload(&state, analytics::DAILY_USERS_WINDOW).await,
        ),
        "daily_activities": chart_payload(
            "daily-activities",
            daily_activities_payload(&state, analytics::DAILY_ACTIVITY_WINDOW).await,
        ),
        "most_active_students": chart_payload(
            "most-active-students",
            highlights_payload(&state, analytics::DAILY_USERS_WINDOW).await,
        ),
        "hourly_heatmap": chart_payload(
            "hourly-heatmap",
            heatmap_payload(&state, analytics::DAILY_USERS_WINDOW).await,
        ),
        "school_time": chart_payload(
            "school-time",
            school_time_payload(&state, analytics::DAILY_USERS_WINDOW).await,
        ),
        "time_spent": chart_payload(
            "time-spent",
            time_spent_payload(&state, analytics::DAILY_USERS_WINDOW).await,
        ),
    }))
}
