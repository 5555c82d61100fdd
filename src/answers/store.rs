// src/answers/store.rs
//! Durable mapping from normalized question text to an answer.
//!
//! Persisted as a quoted, headered CSV (`Question,Answer`). Upserts go
//! through a fuzzy match against existing keys so trivially reworded
//! questions collapse into one row instead of accumulating duplicates.

use crate::utils::{char_set_similarity, contains_either, normalize_question};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const QUESTION_HEADER: &str = "Question";
const ANSWER_HEADER: &str = "Answer";

#[derive(Debug, Clone)]
pub struct StoredAnswer {
    pub question: String,
    pub answer: String,
}

pub struct AnswerStore {
    path: PathBuf,
    entries: Vec<StoredAnswer>,
    fuzzy_threshold: f64,
}

impl AnswerStore {
    /// Open the store at `path`, creating an empty one if the file does
    /// not exist. An unreadable file is moved aside to a timestamped
    /// backup and the store starts empty rather than failing the run.
    pub fn open(path: &Path, fuzzy_threshold: f64) -> Result<Self> {
        let mut store = Self {
            path: path.to_path_buf(),
            entries: Vec::new(),
            fuzzy_threshold,
        };

        if path.exists() {
            match store.load() {
                Ok(count) => {
                    info!("answer store loaded: {} entries from {}", count, path.display());
                }
                Err(e) => {
                    warn!(
                        "answer store at {} is unreadable ({}); backing it up and starting empty",
                        path.display(),
                        e
                    );
                    store.backup_corrupted()?;
                    store.entries.clear();
                }
            }
        }
        Ok(store)
    }

    fn load(&mut self) -> Result<usize> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let headers = reader.headers().context("Failed to read header row")?.clone();
        if headers.get(0) != Some(QUESTION_HEADER) || headers.get(1) != Some(ANSWER_HEADER) {
            anyhow::bail!("unexpected header row: {:?}", headers);
        }

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record.context("Malformed answer row")?;
            if record.len() < 2 {
                anyhow::bail!("answer row has {} fields, expected 2", record.len());
            }
            entries.push(StoredAnswer {
                question: normalize_question(&record[0]),
                answer: record[1].to_string(),
            });
        }
        self.entries = entries;
        Ok(self.entries.len())
    }

    fn backup_corrupted(&self) -> Result<()> {
        let backup_name = format!(
            "qa_backup_{}.csv",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let backup_path = self.path.with_file_name(&backup_name);
        std::fs::rename(&self.path, &backup_path).with_context(|| {
            format!(
                "Failed to move corrupted store to {}",
                backup_path.display()
            )
        })?;
        info!("corrupted answer store moved to {}", backup_path.display());
        Ok(())
    }

    /// Exact lookup against the normalized key.
    pub fn get(&self, question: &str) -> Option<&str> {
        let key = normalize_question(question);
        self.entries
            .iter()
            .find(|entry| entry.question == key)
            .map(|entry| entry.answer.as_str())
    }

    /// Overwrite an exact match, else a fuzzy match (keeping its key),
    /// else append. Persistence and read-back validation failures are
    /// logged, never fatal.
    pub fn upsert(&mut self, question: &str, answer: &str) {
        let key = normalize_question(question);

        let position = self
            .entries
            .iter()
            .position(|entry| entry.question == key)
            .or_else(|| {
                self.entries.iter().position(|entry| {
                    char_set_similarity(&entry.question, &key) >= self.fuzzy_threshold
                        || contains_either(&entry.question, &key)
                })
            });

        match position {
            // The matched entry keeps its key; only the answer moves.
            Some(index) => self.entries[index].answer = answer.to_string(),
            None => self.entries.push(StoredAnswer {
                question: key,
                answer: answer.to_string(),
            }),
        }

        if let Err(e) = self.persist() {
            warn!("failed to persist answer store: {}", e);
            return;
        }
        if let Err(e) = self.validate() {
            warn!("answer store failed read-back validation: {}", e);
        }
    }

    fn persist(&self) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;

        writer.write_record([QUESTION_HEADER, ANSWER_HEADER])?;
        for entry in &self.entries {
            writer.write_record([&entry.question, &entry.answer])?;
        }
        writer.flush().context("Failed to flush answer store")?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut count = 0;
        for record in reader.records() {
            record.context("Unreadable row after write")?;
            count += 1;
        }
        if count != self.entries.len() {
            anyhow::bail!("read back {} rows, expected {}", count, self.entries.len());
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[StoredAnswer] {
        &self.entries
    }
}
