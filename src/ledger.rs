// src/ledger.rs
//! Append-only record of every application attempt.
//!
//! Headerless CSV, one row per attempt:
//! `timestamp, job_id, job_title, company, attempted, result`.
//! The file is the durable artifact a human reviews after a run, and
//! the source of the recent-application dedupe set at startup.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct ApplicationRecord {
    pub timestamp: NaiveDateTime,
    pub job_id: String,
    pub job_title: String,
    pub company: String,
    pub attempted: bool,
    pub result: bool,
}

impl ApplicationRecord {
    pub fn now(job_id: &str, job_title: &str, company: &str, attempted: bool, result: bool) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            job_id: job_id.to_string(),
            job_title: job_title.to_string(),
            company: company.to_string(),
            attempted,
            result,
        }
    }
}

pub struct ApplicationLedger {
    path: PathBuf,
}

impl ApplicationLedger {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Append one record. The file is never rewritten.
    pub fn append(&self, record: &ApplicationRecord) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open ledger: {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record([
            record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            record.job_id.clone(),
            record.job_title.clone(),
            record.company.clone(),
            record.attempted.to_string(),
            record.result.to_string(),
        ])?;
        writer.flush().context("Failed to flush ledger")?;
        Ok(())
    }

    /// All parseable rows. Damaged rows are skipped with a warning; an
    /// audit log being partially readable beats losing the whole run.
    pub fn load_all(&self) -> Result<Vec<ApplicationRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open ledger: {}", self.path.display()))?;

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!("skipping unreadable ledger row {}: {}", index + 1, e);
                    continue;
                }
            };
            match parse_row(&row) {
                Some(record) => records.push(record),
                None => warn!("skipping malformed ledger row {}", index + 1),
            }
        }
        Ok(records)
    }

    /// Job ids attempted within the trailing `window_hours`. Jobs in this
    /// set must not be re-dispatched in the current run.
    pub fn recent_job_ids(&self, window_hours: i64) -> Result<HashSet<String>> {
        let cutoff = Local::now().naive_local() - chrono::Duration::hours(window_hours);
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|record| record.timestamp >= cutoff)
            .map(|record| record.job_id)
            .collect())
    }
}

fn parse_row(row: &csv::StringRecord) -> Option<ApplicationRecord> {
    if row.len() < 6 {
        return None;
    }
    let timestamp = NaiveDateTime::parse_from_str(row.get(0)?, TIMESTAMP_FORMAT).ok()?;
    Some(ApplicationRecord {
        timestamp,
        job_id: row.get(1)?.to_string(),
        job_title: row.get(2)?.to_string(),
        company: row.get(3)?.to_string(),
        attempted: row.get(4)? == "true",
        result: row.get(5)? == "true",
    })
}
