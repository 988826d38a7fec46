// src/main.rs
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scribe_schedule_core::api::{router, ApiState};
use scribe_schedule_core::config::{AppConfig, ScheduleRules};
use scribe_schedule_core::roster::Roster;
use scribe_schedule_core::scheduling_service::{SchedulingService, SubmitOutcome, UpdateOutcome};
use scribe_schedule_core::session::{DraftBatch, SessionEntry, SessionUpdate};
use scribe_schedule_core::submission_store::CsvSubmissionStore;
use scribe_schedule_core::time_utils::ReportMonth;

#[derive(Parser)]
#[command(name = "scribe-schedule")]
#[command(about = "Medical scribe session scheduling: validation, submissions and monthly reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enter sessions as drafts and print the readiness verdict
    Check(BatchArgs),
    /// Enter sessions as drafts and store them if the batch is ready
    Submit(BatchArgs),
    /// List stored submissions
    List {
        #[arg(long)]
        doctor: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Edit a stored submission
    Update {
        submission_id: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        scribe: Option<String>,
        #[arg(long)]
        patient: Option<u32>,
    },
    /// Delete a stored submission
    Delete { submission_id: String },
    /// Sessions and hours for one doctor and day
    DaySummary {
        #[arg(long)]
        doctor: String,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Monthly analytics, e.g. `--month 2025-07`
    Analytics {
        #[arg(long)]
        month: String,
        #[arg(long)]
        doctor: Option<String>,
    },
    /// Write one monthly report CSV per doctor
    Export {
        #[arg(long)]
        month: String,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Submissions file statistics
    Stats,
    /// Run the HTTP API
    Serve,
}

#[derive(clap::Args)]
struct BatchArgs {
    #[arg(long)]
    doctor: String,
    #[arg(long)]
    date: NaiveDate,
    /// Allow entry on a weekend day
    #[arg(long)]
    weekend_override: bool,
    /// `HH:MM-HH:MM,Scribe,Patient`, repeatable
    #[arg(long = "session", value_parser = parse_session_arg)]
    sessions: Vec<SessionEntry>,
}

fn parse_session_arg(raw: &str) -> Result<SessionEntry, String> {
    let mut parts = raw.splitn(3, ',');
    let times = parts.next().unwrap_or_default();
    let scribe = parts.next().ok_or("expected HH:MM-HH:MM,Scribe,Patient")?;
    let patient = parts.next().ok_or("expected HH:MM-HH:MM,Scribe,Patient")?;
    let (start, end) = times
        .split_once('-')
        .ok_or_else(|| format!("expected a time range like 09:00-12:00, got '{}'", times))?;
    Ok(SessionEntry {
        date: None,
        ..SessionEntry::new("", start.trim(), end.trim(), scribe.trim(), patient.trim())
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn fill_batch(
    service: &SchedulingService<CsvSubmissionStore>,
    args: BatchArgs,
) -> Result<(DraftBatch, Vec<String>)> {
    let mut batch = DraftBatch::new(&args.doctor, args.date).with_weekend_override(args.weekend_override);
    let mut refused = Vec::new();
    for (index, entry) in args.sessions.into_iter().enumerate() {
        let admission = service.add_draft(&mut batch, entry)?;
        for error in admission.errors {
            refused.push(format!("Session {}: {}", index + 1, error));
        }
    }
    Ok((batch, refused))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let app_config = AppConfig::from_env().context("Failed to load application settings")?;
    init_tracing(&app_config.log_level);
    let rules = ScheduleRules::from_env().context("Failed to load scheduling rules")?;
    info!("Scheduling rules loaded: {:?}", rules);

    let store = CsvSubmissionStore::open(&app_config.submissions_file)
        .with_context(|| format!("Failed to open {:?}", app_config.submissions_file))?;
    let roster = Roster::load_csv(&app_config.doctors_file)?;
    let mut service = SchedulingService::new(store.clone(), rules, roster);

    match cli.command {
        Commands::Check(args) => {
            let (batch, refused) = fill_batch(&service, args)?;
            for message in &refused {
                warn!("{}", message);
            }
            let readiness = service.assess(&batch, Local::now().date_naive())?;
            print_json(&readiness)?;
            if !refused.is_empty() {
                bail!("{} session(s) were refused on entry", refused.len());
            }
        }
        Commands::Submit(args) => {
            let doctor = service
                .roster()
                .find(&args.doctor)
                .cloned()
                .with_context(|| format!("Doctor {} is not in {:?}", args.doctor, app_config.doctors_file))?;
            let (mut batch, refused) = fill_batch(&service, args)?;
            if !refused.is_empty() {
                for message in &refused {
                    println!("{}", message);
                }
                bail!("{} session(s) were refused on entry; nothing was submitted", refused.len());
            }
            let outcome = service.submit(&mut batch, &doctor, &app_config.submitted_by, Local::now().naive_local());
            print_json(&outcome)?;
            match outcome {
                SubmitOutcome::Submitted { .. } => {}
                SubmitOutcome::Rejected { .. } => bail!("Submission rejected"),
                SubmitOutcome::StoreFailed { message } => bail!("Submission failed: {}", message),
            }
        }
        Commands::List { doctor, date } => {
            print_json(&service.load_submissions(doctor.as_deref(), date)?)?;
        }
        Commands::Update {
            submission_id,
            start,
            end,
            scribe,
            patient,
        } => {
            let update = SessionUpdate {
                start_time: start,
                end_time: end,
                scribe_name: scribe,
                patient_number: patient,
            };
            if update.is_empty() {
                bail!("Nothing to update; pass at least one of --start, --end, --scribe, --patient");
            }
            let outcome = service.update_session(&submission_id, &update, Local::now().naive_local())?;
            print_json(&outcome)?;
            match outcome {
                UpdateOutcome::Updated { .. } => {}
                UpdateOutcome::NotFound => bail!("Submission {} not found", submission_id),
                UpdateOutcome::Rejected { .. } => bail!("Update rejected"),
            }
        }
        Commands::Delete { submission_id } => {
            if !service.delete_session(&submission_id)? {
                bail!("Submission {} not found", submission_id);
            }
            println!("Deleted {}", submission_id);
        }
        Commands::DaySummary { doctor, date } => {
            print_json(&service.day_summary(&doctor, date)?)?;
        }
        Commands::Analytics { month, doctor } => {
            let month = ReportMonth::parse(&month)?;
            print_json(&service.month_analytics(month, doctor.as_deref())?)?;
        }
        Commands::Export { month, dir } => {
            let month = ReportMonth::parse(&month)?;
            let dir = dir.unwrap_or_else(|| app_config.reports_dir.clone());
            for path in service.export_reports(month, &dir)? {
                println!("{}", path.display());
            }
        }
        Commands::Stats => {
            print_json(&store.stats()?)?;
        }
        Commands::Serve => {
            let addr = app_config.server_addr();
            let app = router(ApiState::new(service, &app_config.submitted_by));
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("Listening on http://{}", addr);
            axum::serve(listener, app).await.context("HTTP server failed")?;
        }
    }

    Ok(())
}
