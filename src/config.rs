// src/config.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything a run needs, loaded from `config.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub credentials: Credentials,
    pub phone_number: String,
    /// Target salary, as the literal string typed into forms.
    pub salary: String,
    pub positions: Vec<String>,
    pub locations: Vec<String>,
    #[serde(default)]
    pub company_blacklist: Vec<String>,
    #[serde(default)]
    pub title_blacklist: Vec<String>,
    /// LinkedIn experience-level filter codes (1 = internship .. 6 = executive).
    #[serde(default)]
    pub experience_levels: Vec<u8>,
    pub uploads: Uploads,
    #[serde(default)]
    pub ai: Option<AiSettings>,
    #[serde(default)]
    pub files: FileSettings,
    #[serde(default)]
    pub tuning: Tuning,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Files pushed into upload affordances, keyed by logical name.
#[derive(Debug, Clone, Deserialize)]
pub struct Uploads {
    pub resume: PathBuf,
    #[serde(default)]
    pub cover_letter: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiSettings {
    /// Falls back to the AUTOAPPLY_AI_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileSettings {
    #[serde(default = "default_answers_path")]
    pub answers_path: PathBuf,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            answers_path: default_answers_path(),
            ledger_path: default_ledger_path(),
        }
    }
}

fn default_answers_path() -> PathBuf {
    PathBuf::from("qa.csv")
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("output.csv")
}

/// Knobs with reference defaults. All of them bound work; none of them
/// are errors to exhaust.
#[derive(Debug, Clone, Deserialize)]
pub struct Tuning {
    #[serde(default = "default_step_budget")]
    pub step_budget: u32,
    #[serde(default = "default_dedupe_window_hours")]
    pub dedupe_window_hours: i64,
    #[serde(default = "default_search_budget_minutes")]
    pub search_budget_minutes: u64,
    #[serde(default = "default_max_combinations")]
    pub max_combinations: usize,
    /// Similarity above which two question keys are treated as the same
    /// entry. Heuristic; raise it if distinct questions start merging.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_think_time_ms")]
    pub think_time_ms: u64,
}

fn default_step_budget() -> u32 {
    5
}

fn default_dedupe_window_hours() -> i64 {
    48
}

fn default_search_budget_minutes() -> u64 {
    60
}

fn default_max_combinations() -> usize {
    500
}

fn default_fuzzy_threshold() -> f64 {
    0.9
}

fn default_think_time_ms() -> u64 {
    1500
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            step_budget: default_step_budget(),
            dedupe_window_hours: default_dedupe_window_hours(),
            search_budget_minutes: default_search_budget_minutes(),
            max_combinations: default_max_combinations(),
            fuzzy_threshold: default_fuzzy_threshold(),
            think_time_ms: default_think_time_ms(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "{} not found. The agent cannot start without configuration.",
                path.display()
            );
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config: AppConfig =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

        if let Some(ai) = config.ai.as_mut() {
            if ai.api_key.is_none() {
                ai.api_key = std::env::var("AUTOAPPLY_AI_KEY").ok();
            }
        }

        config.validate()?;
        info!(
            "configuration loaded: {} positions x {} locations, AI {}",
            config.positions.len(),
            config.locations.len(),
            if config.ai_enabled() { "enabled" } else { "disabled" }
        );
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.positions.is_empty() {
            anyhow::bail!("config must list at least one position");
        }
        if self.locations.is_empty() {
            anyhow::bail!("config must list at least one location");
        }
        if !(0.0..=1.0).contains(&self.tuning.fuzzy_threshold) {
            anyhow::bail!("tuning.fuzzy_threshold must be within 0.0..=1.0");
        }
        if self.tuning.step_budget == 0 {
            anyhow::bail!("tuning.step_budget must be at least 1");
        }
        Ok(())
    }

    /// AI answering is only live with both a credential and a base URL.
    pub fn ai_enabled(&self) -> bool {
        self.ai
            .as_ref()
            .map(|ai| ai.api_key.as_deref().is_some_and(|k| !k.is_empty()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
credentials:
  email: me@example.com
  password: hunter2
phone_number: "5551234567"
salary: "95000"
positions: ["Rust Engineer"]
locations: ["Remote"]
uploads:
  resume: resume.pdf
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.tuning.step_budget, 5);
        assert_eq!(config.tuning.dedupe_window_hours, 48);
        assert_eq!(config.tuning.max_combinations, 500);
        assert_eq!(config.files.answers_path, PathBuf::from("qa.csv"));
        assert!(!config.ai_enabled());
        assert!(config.uploads.cover_letter.is_none());
    }

    #[test]
    fn empty_positions_are_rejected() {
        let yaml = MINIMAL.replace("positions: [\"Rust Engineer\"]", "positions: []");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, yaml).unwrap();
        assert!(AppConfig::load(&path).is_err());
    }
}
