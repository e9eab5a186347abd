use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use trawler_client::HttpFetcher;
use trawler_core::manager::JobManager;
use trawler_core::memory::{InMemoryDataStore, InMemoryJobStore};
use trawler_core::traits::{DataStore, JobStore, RecordQuery};
use trawler_core::{CreateJobRequest, JobStatus};
use trawler_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "trawler", version, about = "Declarative web scraping jobs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job definition from a file and print the extracted records
    Run {
        /// Path to a JSON job definition (name, target_urls, scraping_rules, ...)
        #[arg(short, long)]
        job: PathBuf,

        /// Persist the job and its records to PostgreSQL (requires DATABASE_URL)
        #[arg(long, default_value_t = false)]
        save: bool,
    },

    /// List persisted jobs
    Jobs {
        /// Filter by status (pending, running, completed, failed, cancelled)
        #[arg(short, long)]
        status: Option<String>,

        /// Number of results to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// List persisted records for a job
    Records {
        /// Job id to filter by
        #[arg(short, long)]
        job_id: Uuid,

        /// Number of results to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show aggregate job and record counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trawler=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { job, save } => {
            let request = load_job_file(&job)?;
            if save {
                let db = connect_db().await?;
                cmd_run(request, db.job_store(), db.data_store()).await?;
            } else {
                cmd_run(request, InMemoryJobStore::new(), InMemoryDataStore::new()).await?;
            }
        }
        Commands::Jobs { status, limit } => {
            let status = status
                .map(|s| s.parse::<JobStatus>().map_err(|e| anyhow::anyhow!(e)))
                .transpose()?;
            cmd_jobs(status, limit).await?;
        }
        Commands::Records { job_id, limit } => {
            cmd_records(job_id, limit).await?;
        }
        Commands::Stats => {
            cmd_stats().await?;
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and run migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env()
        .context("DATABASE_URL not set. Required for --save and query commands.")?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

fn load_job_file(path: &PathBuf) -> Result<CreateJobRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file: {}", path.display()))?;
    serde_json::from_str(&raw).context("Invalid JSON in job file")
}

/// Create and execute one job to completion, printing its records.
async fn cmd_run<J, D>(request: CreateJobRequest, jobs: J, data: D) -> Result<()>
where
    J: JobStore + 'static,
    D: DataStore + 'static,
{
    let fetcher = HttpFetcher::new().map_err(|e| anyhow::anyhow!(e))?;
    let manager = JobManager::new(fetcher, jobs, data);

    let job = manager
        .create_job(request)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(job_id = %job.id, pages = job.total_pages, "executing job");

    let handle = manager
        .execute_job(job.id)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    handle.wait().await;

    let finished = manager.get_job(job.id).await.map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(
        status = %finished.status,
        scraped = finished.pages_scraped,
        total = finished.total_pages,
        "job finished"
    );
    if let Some(error) = &finished.error_message {
        tracing::error!(%error, "job error");
    }

    let (records, _) = manager
        .records(&RecordQuery::for_job(job.id))
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    let payloads: Vec<&serde_json::Value> = records.iter().map(|r| &r.data).collect();
    println!("{}", serde_json::to_string_pretty(&payloads)?);

    Ok(())
}

async fn cmd_jobs(status: Option<JobStatus>, limit: usize) -> Result<()> {
    let db = connect_db().await?;
    let jobs = db
        .job_store()
        .list(status, limit, 0)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if jobs.is_empty() {
        println!("No jobs found");
        return Ok(());
    }

    for job in &jobs {
        println!(
            "  [{}] {} — {} ({}/{} pages, {:.0}%)",
            job.status,
            job.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            job.id,
            job.pages_scraped,
            job.total_pages,
            job.progress * 100.0,
        );
    }

    println!("\nTotal: {} jobs", jobs.len());
    Ok(())
}

async fn cmd_records(job_id: Uuid, limit: usize) -> Result<()> {
    let db = connect_db().await?;
    let query = RecordQuery {
        job_id: Some(job_id),
        limit,
        ..RecordQuery::default()
    };
    let records = db
        .data_store()
        .query(&query)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if records.is_empty() {
        println!("No records found for job {job_id}");
        return Ok(());
    }

    let data: Vec<&serde_json::Value> = records.iter().map(|r| &r.data).collect();
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

async fn cmd_stats() -> Result<()> {
    let db = connect_db().await?;
    let jobs = db.job_store();

    for status in [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ] {
        let count = jobs
            .count(Some(status))
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        println!("  {status}: {count}");
    }

    let records = db
        .data_store()
        .count(&RecordQuery::default())
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    println!("  records: {records}");

    Ok(())
}
