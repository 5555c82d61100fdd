// src/search.rs
//! Search loop: shuffled (position, location) pairs, paginated results,
//! blacklist and dedupe filtering, one apply attempt per candidate.

use crate::agent::ApplyAgent;
use crate::selectors::{self, chain};
use crate::session::{find_first, SessionDriver};
use crate::utils::{contains_any, urlencode};
use anyhow::Result;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const SEARCH_URL: &str = "https://www.linkedin.com/jobs/search/";
const PAGE_SIZE: u32 = 25;

pub struct SearchSettings {
    pub budget_per_pair: Duration,
    pub max_combinations: usize,
    pub dedupe_window_hours: i64,
    pub company_blacklist: Vec<String>,
    pub title_blacklist: Vec<String>,
    pub experience_levels: Vec<u8>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SearchStats {
    pub pairs_visited: usize,
    pub candidates_seen: usize,
    pub candidates_skipped: usize,
    pub attempts: usize,
    pub submitted: usize,
}

pub struct SearchLoop {
    driver: Arc<dyn SessionDriver>,
    agent: ApplyAgent,
    settings: SearchSettings,
}

impl SearchLoop {
    pub fn new(driver: Arc<dyn SessionDriver>, agent: ApplyAgent, settings: SearchSettings) -> Self {
        Self {
            driver,
            agent,
            settings,
        }
    }

    /// Visit every (position, location) pair in random order and feed
    /// each surviving candidate to the apply agent.
    pub async fn start_apply(
        &mut self,
        positions: &[String],
        locations: &[String],
    ) -> Result<SearchStats> {
        let mut pairs = Vec::new();
        for position in positions {
            for location in locations {
                pairs.push((position.clone(), location.clone()));
            }
        }
        // Pairs are visited in random order, never a fixed scan pattern.
        pairs.shuffle(&mut rand::thread_rng());
        pairs.truncate(self.settings.max_combinations);

        // Job ids attempted within the dedupe window are never
        // re-dispatched in this run.
        let mut dispatched = self
            .agent
            .ledger()
            .recent_job_ids(self.settings.dedupe_window_hours)?;
        info!(
            "{} job ids inside the dedupe window will be skipped",
            dispatched.len()
        );

        let mut stats = SearchStats::default();
        for (position, location) in &pairs {
            stats.pairs_visited += 1;
            self.run_pair(position, location, &mut dispatched, &mut stats)
                .await?;
        }

        info!(
            "run finished: {} pairs, {} candidates, {} skipped, {} attempts, {} submitted",
            stats.pairs_visited,
            stats.candidates_seen,
            stats.candidates_skipped,
            stats.attempts,
            stats.submitted
        );
        Ok(stats)
    }

    async fn run_pair(
        &mut self,
        position: &str,
        location: &str,
        dispatched: &mut HashSet<String>,
        stats: &mut SearchStats,
    ) -> Result<()> {
        let deadline = Instant::now() + self.settings.budget_per_pair;
        let mut offset = 0u32;
        info!("searching '{}' in '{}'", position, location);

        loop {
            if Instant::now() >= deadline {
                info!("search budget exhausted for '{}' in '{}'", position, location);
                break;
            }

            let url = self.search_url(position, location, offset);
            if let Err(e) = self.driver.navigate(&url).await {
                if !e.is_transient() {
                    return Err(e.into());
                }
                debug!("results ended for '{}' in '{}': {}", position, location, e);
                break;
            }

            let candidates = self.collect_candidates().await?;
            if candidates.is_empty() {
                break;
            }

            for (job_id, label) in candidates {
                stats.candidates_seen += 1;

                if label.contains(selectors::APPLIED_CARD_MARKER) {
                    debug!("skipping {}: already applied", job_id);
                    stats.candidates_skipped += 1;
                    continue;
                }
                if contains_any(&label, &self.settings.title_blacklist)
                    || contains_any(&label, &self.settings.company_blacklist)
                {
                    debug!("skipping {}: blacklisted", job_id);
                    stats.candidates_skipped += 1;
                    continue;
                }
                if dispatched.contains(&job_id) {
                    debug!("skipping {}: inside dedupe window", job_id);
                    stats.candidates_skipped += 1;
                    continue;
                }

                dispatched.insert(job_id.clone());
                stats.attempts += 1;
                if self.agent.apply_to_job(&job_id).await? {
                    stats.submitted += 1;
                }
            }

            offset += PAGE_SIZE;
        }
        Ok(())
    }

    /// Candidate (job id, card label) pairs on the current result page.
    /// Collected up front so navigating into a job cannot stale them.
    async fn collect_candidates(&self) -> Result<Vec<(String, String)>> {
        let cards = find_first(self.driver.as_ref(), &chain(selectors::JOB_CARDS)).await?;
        let mut candidates = Vec::new();

        for card in cards {
            let mut job_id = None;
            for attr in selectors::JOB_ID_ATTRS {
                match self.driver.attribute(&card, attr).await {
                    Ok(Some(value)) if !value.is_empty() => {
                        job_id = Some(value);
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) if e.is_transient() => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            let Some(job_id) = job_id else {
                continue;
            };

            let label = match self.driver.element_text(&card).await {
                Ok(text) => text,
                Err(e) if e.is_transient() => String::new(),
                Err(e) => return Err(e.into()),
            };
            candidates.push((job_id, label));
        }
        Ok(candidates)
    }

    fn search_url(&self, position: &str, location: &str, offset: u32) -> String {
        let mut url = format!(
            "{SEARCH_URL}?keywords={}&location={}&start={}",
            urlencode(position),
            urlencode(location),
            offset
        );
        if !self.settings.experience_levels.is_empty() {
            let codes: Vec<String> = self
                .settings
                .experience_levels
                .iter()
                .map(|code| code.to_string())
                .collect();
            url.push_str("&f_E=");
            url.push_str(&codes.join(","));
        }
        url
    }

    pub fn agent(&self) -> &ApplyAgent {
        &self.agent
    }
}
