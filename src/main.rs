use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod aggregate;
mod db;
mod models;
mod performance;
mod report;
mod tool_analysis;
mod weakness;

use crate::models::Period;

#[derive(Parser)]
#[command(name = "observation-insights")]
#[command(about = "Classroom observation analytics for teacher evaluations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import observations from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Cross-teacher weakness and strength breakdown per dimension
    DimensionWeakness {
        #[arg(long)]
        start_date: Option<NaiveDate>,
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long)]
        evaluation_tool_id: Option<Uuid>,
    },
    /// Compare every teacher observed with one evaluation tool
    ToolAnalysis {
        #[arg(long)]
        evaluation_tool_id: Uuid,
        #[arg(long)]
        start_date: Option<NaiveDate>,
        #[arg(long)]
        end_date: Option<NaiveDate>,
    },
    /// Track one teacher's scores, dimensions and trend over time
    TeacherPerformance {
        #[arg(long)]
        teacher_id: Uuid,
        #[arg(long)]
        start_date: Option<NaiveDate>,
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long)]
        evaluation_tool_id: Option<Uuid>,
    },
    /// Generate a markdown report over a window of observations
    Report {
        #[arg(long)]
        start_date: Option<NaiveDate>,
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long)]
        evaluation_tool_id: Option<Uuid>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn check_window(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> anyhow::Result<()> {
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            anyhow::bail!("--end-date must not precede --start-date");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

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
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} observations from {}.", csv.display());
        }
        Commands::DimensionWeakness {
            start_date,
            end_date,
            evaluation_tool_id,
        } => {
            check_window(start_date, end_date)?;
            let filter = db::ObservationFilter {
                start_date,
                end_date,
                evaluation_tool_id,
                teacher_id: None,
            };
            let observations = db::fetch_observations(&pool, &filter).await?;
            info!(count = observations.len(), "analyzing dimension weakness");

            let reports = weakness::analyze_dimension_weakness(&observations);
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Commands::ToolAnalysis {
            evaluation_tool_id,
            start_date,
            end_date,
        } => {
            check_window(start_date, end_date)?;
            let tool = db::fetch_tool(&pool, evaluation_tool_id).await?;
            let filter = db::ObservationFilter {
                start_date,
                end_date,
                evaluation_tool_id: Some(evaluation_tool_id),
                teacher_id: None,
            };
            let observations = db::fetch_observations(&pool, &filter).await?;
            info!(tool = %tool.name, count = observations.len(), "analyzing tool");

            let period = Period {
                start_date,
                end_date,
            };
            let report = tool_analysis::analyze_tool(&tool, period, &observations);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::TeacherPerformance {
            teacher_id,
            start_date,
            end_date,
            evaluation_tool_id,
        } => {
            check_window(start_date, end_date)?;
            let teacher = db::fetch_teacher(&pool, teacher_id).await?;
            let filter = db::ObservationFilter {
                start_date,
                end_date,
                evaluation_tool_id,
                teacher_id: Some(teacher_id),
            };
            let observations = db::fetch_observations(&pool, &filter).await?;
            info!(
                teacher = %teacher.full_name(),
                count = observations.len(),
                "analyzing teacher performance"
            );

            let period = Period {
                start_date,
                end_date,
            };
            let report = performance::analyze_teacher_performance(
                &teacher,
                period,
                evaluation_tool_id,
                &observations,
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Report {
            start_date,
            end_date,
            evaluation_tool_id,
            out,
        } => {
            check_window(start_date, end_date)?;
            let filter = db::ObservationFilter {
                start_date,
                end_date,
                evaluation_tool_id,
                teacher_id: None,
            };
            let observations = db::fetch_observations(&pool, &filter).await?;

            let period = Period {
                start_date,
                end_date,
            };
            let report = report::build_report(&period, &observations);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
