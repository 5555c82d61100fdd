// src/cli.rs
use crate::agent::{AgentSettings, ApplyAgent};
use crate::ai::AiClient;
use crate::answers::{AnswerResolver, AnswerStore};
use crate::config::AppConfig;
use crate::ledger::{ApplicationLedger, TIMESTAMP_FORMAT};
use crate::resume::{self, PlainTextExtractor};
use crate::search::{SearchLoop, SearchSettings};
use crate::session::snapshot::SnapshotSession;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "autoapply")]
#[command(about = "Autonomous Easy Apply agent")]
pub struct Cli {
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the search-and-apply loop against saved page snapshots
    Run {
        /// Directory of *.html page snapshots plus an optional routes.csv
        #[arg(long)]
        snapshots: PathBuf,
    },
    /// Inspect or import stored question answers
    Answers {
        #[command(subcommand)]
        command: AnswersCommand,
    },
    /// Inspect the application ledger
    Ledger {
        #[command(subcommand)]
        command: LedgerCommand,
    },
}

#[derive(Subcommand)]
pub enum AnswersCommand {
    /// List stored answers
    List,
    /// Import Question,Answer rows from a CSV file
    Import { csv_file: PathBuf },
}

#[derive(Subcommand)]
pub enum LedgerCommand {
    /// Print every recorded attempt
    Show,
    /// Print job ids inside the dedupe window
    Recent,
}

pub async fn handle(cli: Cli) -> Result<()> {
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Command::Run { snapshots } => run(&config, &snapshots).await,
        Command::Answers { command } => handle_answers(&config, command),
        Command::Ledger { command } => handle_ledger(&config, command),
    }
}

async fn run(config: &AppConfig, snapshots: &Path) -> Result<()> {
    let driver = Arc::new(SnapshotSession::from_dir(snapshots)?);

    let store = AnswerStore::open(&config.files.answers_path, config.tuning.fuzzy_threshold)?;
    let mut resolver =
        AnswerResolver::new(store, config.salary.clone(), config.phone_number.clone());

    if config.ai_enabled() {
        if let Some(ai) = config.ai.as_ref() {
            let api_key = ai.api_key.clone().unwrap_or_default();
            let client = AiClient::new(ai.base_url.clone(), api_key, ai.model.clone())?;
            resolver = resolver.with_backend(Arc::new(client));
        }
    }
    match resume::load_resume_text(&config.uploads.resume, &PlainTextExtractor) {
        Ok(text) => resolver = resolver.with_resume_text(text),
        Err(e) => warn!("resume text unavailable, AI answering disabled: {}", e),
    }

    let ledger = ApplicationLedger::new(&config.files.ledger_path);
    let agent = ApplyAgent::new(
        driver.clone(),
        resolver,
        ledger,
        AgentSettings {
            step_budget: config.tuning.step_budget,
            think_time: Duration::from_millis(config.tuning.think_time_ms),
            resume_path: config.uploads.resume.clone(),
            cover_letter_path: config.uploads.cover_letter.clone(),
        },
    );

    let mut search = SearchLoop::new(
        driver,
        agent,
        SearchSettings {
            budget_per_pair: Duration::from_secs(config.tuning.search_budget_minutes * 60),
            max_combinations: config.tuning.max_combinations,
            dedupe_window_hours: config.tuning.dedupe_window_hours,
            company_blacklist: config.company_blacklist.clone(),
            title_blacklist: config.title_blacklist.clone(),
            experience_levels: config.experience_levels.clone(),
        },
    );

    let stats = search
        .start_apply(&config.positions, &config.locations)
        .await?;
    info!("applications submitted this run: {}", stats.submitted);
    Ok(())
}

fn handle_answers(config: &AppConfig, command: AnswersCommand) -> Result<()> {
    let mut store = AnswerStore::open(&config.files.answers_path, config.tuning.fuzzy_threshold)?;

    match command {
        AnswersCommand::List => {
            if store.is_empty() {
                info!("no stored answers");
            } else {
                info!("{} stored answers:", store.len());
                for entry in store.entries() {
                    info!("  {} -> {}", entry.question, entry.answer);
                }
            }
        }

        AnswersCommand::Import { csv_file } => {
            if !csv_file.exists() {
                anyhow::bail!("CSV file not found: {}", csv_file.display());
            }

            let content = std::fs::read_to_string(&csv_file)?;
            let mut reader = csv::Reader::from_reader(content.as_bytes());

            let mut imported = 0;
            let mut skipped = 0;
            for result in reader.records() {
                match result {
                    Ok(record) if record.len() >= 2 => {
                        let question = record.get(0).unwrap_or("").trim();
                        let answer = record.get(1).unwrap_or("").trim();
                        if question.is_empty() || answer.is_empty() {
                            skipped += 1;
                            continue;
                        }
                        store.upsert(question, answer);
                        imported += 1;
                    }
                    Ok(_) => skipped += 1,
                    Err(e) => {
                        warn!("CSV parsing error: {}", e);
                        skipped += 1;
                    }
                }
            }
            info!("import completed: {} imported, {} skipped", imported, skipped);
        }
    }
    Ok(())
}

fn handle_ledger(config: &AppConfig, command: LedgerCommand) -> Result<()> {
    let ledger = ApplicationLedger::new(&config.files.ledger_path);

    match command {
        LedgerCommand::Show => {
            let rows = ledger.load_all()?;
            if rows.is_empty() {
                info!("no recorded attempts");
                return Ok(());
            }
            info!(
                "{:<20} {:<12} {:<30} {:<20} {:<10} {:<6}",
                "Timestamp", "Job id", "Title", "Company", "Attempted", "Result"
            );
            for row in rows {
                info!(
                    "{:<20} {:<12} {:<30} {:<20} {:<10} {:<6}",
                    row.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    row.job_id,
                    row.job_title,
                    row.company,
                    row.attempted,
                    row.result
                );
            }
        }

        LedgerCommand::Recent => {
            let recent = ledger.recent_job_ids(config.tuning.dedupe_window_hours)?;
            info!(
                "{} job ids inside the {}h dedupe window",
                recent.len(),
                config.tuning.dedupe_window_hours
            );
            for job_id in recent {
                info!("  {}", job_id);
            }
        }
    }
    Ok(())
}
