use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;

mod analytics;
mod calendar;
mod charts;
mod config;
mod db;
mod engagement;
mod models;
mod moodle;
mod report;
mod schooltime;
mod server;
mod sync;

use config::Settings;

#[derive(Parser)]
#[command(name = "moodle-insight")]
#[command(about = "LMS activity dashboard and Moodle course sync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the local database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Reconcile the local course mirror with the Moodle source
    Sync {
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        course_id: Option<i64>,
        #[arg(long)]
        verbose: bool,
    },
    /// Assign a locally-owned subject category to a mirrored course
    Categorize {
        #[arg(long)]
        course_id: i64,
        #[arg(long)]
        subject: String,
    },
    /// Import activity events from a CSV file
    ImportActivity {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import school holidays from a CSV file
    ImportHolidays {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Generate a markdown activity report
    Report {
        #[arg(long, default_value_t = 30)]
        days: u32,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Serve the dashboard JSON API
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000")]
        address: String,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "moodle_insight=debug"
    } else {
        "moodle_insight=info"
    };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_owned());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let verbose = matches!(cli.command, Commands::Sync { verbose: true, .. });
    init_tracing(verbose);

    let settings = Settings::from_env()?;
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the local Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Sync {
            dry_run,
            course_id,
            verbose: _,
        } => {
            let moodle_url = std::env::var("MOODLE_DATABASE_URL")
                .context("MOODLE_DATABASE_URL must be set to the read-only Moodle database")?;
            let moodle_pool = MySqlPoolOptions::new()
                .max_connections(2)
                .acquire_timeout(Duration::from_secs(settings.sync_timeout_secs))
                .connect(&moodle_url)
                .await
                .context("failed to connect to the Moodle database")?;

            tracing::info!(dry_run, ?course_id, "starting Moodle course sync");

            let courses = moodle::fetch_courses(&moodle_pool, course_id).await?;
            if courses.is_empty() {
                println!("No courses found in the Moodle database.");
                return Ok(());
            }
            println!("Found {} courses to process.", courses.len());

            let report = sync::sync_courses(&pool, courses, dry_run, settings.sync_batch_size).await;

            if dry_run {
                println!("DRY RUN - no changes were made.");
            }
            println!("Created: {} courses", report.created);
            println!("Updated: {} courses", report.updated);
            println!("Unchanged: {} courses", report.unchanged);
            if report.errors > 0 {
                println!("Errors: {} courses", report.errors);
            }
            println!("Total processed: {} courses", report.processed());
        }
        Commands::Categorize { course_id, subject } => {
            anyhow::ensure!(
                settings.subject_categories.contains(&subject),
                "unknown subject category {subject:?}, expected one of: {}",
                settings.subject_categories.join(", ")
            );
            if db::set_subject_category(&pool, course_id, &subject).await? {
                println!("Course {course_id} categorized as {subject}.");
            } else {
                println!("No course with id {course_id} in the local mirror.");
            }
        }
        Commands::ImportActivity { csv } => {
            let inserted = db::import_activity_csv(&pool, &csv).await?;
            println!("Inserted {inserted} activity events from {}.", csv.display());
        }
        Commands::ImportHolidays { csv } => {
            let imported = db::import_holidays_csv(&pool, &csv).await?;
            println!("Imported {imported} holidays from {}.", csv.display());
        }
        Commands::Report { days, out } => {
            let summary = analytics::summary_counts(&pool).await?;
            let weekly = analytics::daily_active_users(&pool, analytics::WEEKLY_WINDOW).await?;
            let daily = analytics::daily_activities(&pool, days).await?;
            let students =
                analytics::most_active_students(&pool, days, analytics::HIGHLIGHT_LIMIT).await?;
            let split = analytics::school_time_split(&pool, &settings, days).await?;
            let report = report::build_report(
                days,
                Utc::now().date_naive(),
                &summary,
                &weekly,
                &daily,
                &students,
                &split,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Serve { address } => {
            server::serve(server::AppState { pool, settings }, &address).await?;
        }
    }

    Ok(())
}
