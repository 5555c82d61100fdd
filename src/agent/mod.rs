// src/agent/mod.rs
//! Per-job application agent.
//!
//! One call to [`ApplyAgent::apply_to_job`] takes a job id through
//! opening the posting, Easy Apply detection, the bounded step loop,
//! and exactly one ledger record, whatever the outcome. Transient UI
//! failures degrade the current step to a no-op; only a dead session
//! aborts the run.

pub mod form;

use crate::answers::AnswerResolver;
use crate::ledger::{ApplicationLedger, ApplicationRecord};
use crate::selectors::{self, chain};
use crate::session::{find_first, find_first_with_text, ElementHandle, SessionDriver};
use crate::utils::normalize_question;
use anyhow::Result;
use self::form::{decide, ApplicationFormState, Gate, StepObservation};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const JOB_VIEW_URL: &str = "https://www.linkedin.com/jobs/view/";
const CLICKABLE_TIMEOUT: Duration = Duration::from_secs(10);
/// Short pause giving a human the chance to fill in what no resolver
/// layer could answer. The run continues either way.
const MANUAL_INPUT_PAUSE: Duration = Duration::from_secs(5);

/// Terminal outcome of one apply attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Submitted,
    NoEasyApply,
    AlreadyApplied,
    Blocked,
    StepBudgetExceeded,
    SessionLost,
    NavigationFailed,
}

impl ApplyOutcome {
    pub fn applied(self) -> bool {
        matches!(self, ApplyOutcome::Submitted)
    }

    /// Whether the form flow was actually entered.
    pub fn attempted(self) -> bool {
        matches!(
            self,
            ApplyOutcome::Submitted
                | ApplyOutcome::Blocked
                | ApplyOutcome::StepBudgetExceeded
                | ApplyOutcome::SessionLost
        )
    }

    pub fn reason(self) -> &'static str {
        match self {
            ApplyOutcome::Submitted => "application submitted",
            ApplyOutcome::NoEasyApply => "no Easy Apply affordance",
            ApplyOutcome::AlreadyApplied => "already applied",
            ApplyOutcome::Blocked => "no actionable element for two consecutive steps",
            ApplyOutcome::StepBudgetExceeded => "step budget exhausted",
            ApplyOutcome::SessionLost => "session lost mid-application",
            ApplyOutcome::NavigationFailed => "could not open job view",
        }
    }
}

pub struct AgentSettings {
    pub step_budget: u32,
    pub think_time: Duration,
    pub resume_path: PathBuf,
    pub cover_letter_path: Option<PathBuf>,
}

pub struct ApplyAgent {
    driver: Arc<dyn SessionDriver>,
    resolver: AnswerResolver,
    ledger: ApplicationLedger,
    settings: AgentSettings,
}

impl ApplyAgent {
    pub fn new(
        driver: Arc<dyn SessionDriver>,
        resolver: AnswerResolver,
        ledger: ApplicationLedger,
        settings: AgentSettings,
    ) -> Self {
        Self {
            driver,
            resolver,
            ledger,
            settings,
        }
    }

    /// Process one job end to end. Returns whether an application was
    /// submitted; exactly one ledger record is written either way.
    pub async fn apply_to_job(&mut self, job_id: &str) -> Result<bool> {
        let url = format!("{JOB_VIEW_URL}{job_id}");

        if let Err(e) = self.driver.navigate(&url).await {
            if !e.is_transient() {
                self.record(job_id, "", "", ApplyOutcome::NavigationFailed)?;
                return Err(anyhow::anyhow!("session lost while opening job {job_id}: {e}"));
            }
            warn!("could not open job {}: {}", job_id, e);
            self.record(job_id, "", "", ApplyOutcome::NavigationFailed)?;
            return Ok(false);
        }
        tokio::time::sleep(self.settings.think_time).await;

        let job_title = self.first_text(selectors::JOB_TITLE).await;
        let company = self.first_text(selectors::JOB_COMPANY).await;

        let outcome = match self.detect_and_apply().await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.record(job_id, &job_title, &company, ApplyOutcome::SessionLost)?;
                return Err(e);
            }
        };

        info!(
            "job {} ({} at {}): {}",
            job_id,
            if job_title.is_empty() { "?" } else { &job_title },
            if company.is_empty() { "?" } else { &company },
            outcome.reason()
        );
        self.record(job_id, &job_title, &company, outcome)?;
        Ok(outcome.applied())
    }

    /// Detect the Easy Apply affordance and, if present, run the form.
    async fn detect_and_apply(&mut self) -> Result<ApplyOutcome> {
        let button = find_first_with_text(
            self.driver.as_ref(),
            &chain(selectors::EASY_APPLY_BUTTONS),
            selectors::EASY_APPLY_MARKER,
        )
        .await?;

        let Some(button) = button else {
            let markup = match self.driver.page_markup().await {
                Ok(markup) => markup,
                Err(e) if e.is_transient() => String::new(),
                Err(e) => return Err(e.into()),
            };
            if markup.contains(selectors::ALREADY_APPLIED_MARKER) {
                return Ok(ApplyOutcome::AlreadyApplied);
            }
            // Common and normal: external application or closed posting.
            return Ok(ApplyOutcome::NoEasyApply);
        };

        if !self.click(&button).await? {
            warn!("could not open the application form");
            return Ok(ApplyOutcome::Blocked);
        }

        self.send_resume().await
    }

    /// The inner step loop. Bounded by the step budget so a malformed
    /// or adversarial form can never spin forever.
    async fn send_resume(&mut self) -> Result<ApplyOutcome> {
        let mut state = ApplicationFormState::new();

        while state.step_index < self.settings.step_budget {
            tokio::time::sleep(self.settings.think_time).await;

            let observation = self.observe_step().await?;
            let plan = decide(&state, &observation);
            debug!("step {}: {:?}", state.step_index, plan);

            state.current_questions = observation.questions.iter().cloned().collect();

            if plan.upload_resume {
                let path = self.settings.resume_path.clone();
                if self.upload(selectors::RESUME_UPLOAD_INPUTS, &path).await? {
                    state.resume_uploaded = true;
                }
            }
            if plan.upload_cover_letter {
                if let Some(path) = self.settings.cover_letter_path.clone() {
                    if self.upload(selectors::COVER_LETTER_INPUTS, &path).await? {
                        state.cover_letter_uploaded = true;
                    }
                }
            }

            match plan.gate {
                Gate::Submit => {
                    if self.click_submit().await? {
                        state.submitted = true;
                        return Ok(ApplyOutcome::Submitted);
                    }
                    state.idle_steps = 0;
                }
                Gate::Answer(questions) => {
                    self.fill_questions(&mut state, &questions).await?;
                    // Advancing right after answering is the common case;
                    // a missing button here is caught next iteration.
                    self.click_advance().await?;
                    state.idle_steps = 0;
                }
                Gate::Advance => {
                    self.click_advance().await?;
                    state.idle_steps = 0;
                }
                Gate::Nothing => {
                    state.idle_steps += 1;
                    if state.idle_steps >= 2 {
                        return Ok(ApplyOutcome::Blocked);
                    }
                }
            }

            state.step_index += 1;
        }

        Ok(ApplyOutcome::StepBudgetExceeded)
    }

    async fn observe_step(&self) -> Result<StepObservation> {
        let driver = self.driver.as_ref();

        let resume_upload = !find_first(driver, &chain(selectors::RESUME_UPLOAD_INPUTS))
            .await?
            .is_empty();
        let cover_letter_upload = self.settings.cover_letter_path.is_some()
            && !find_first(driver, &chain(selectors::COVER_LETTER_INPUTS))
                .await?
                .is_empty();
        let submit = find_first_with_text(
            driver,
            &chain(selectors::SUBMIT_BUTTONS),
            selectors::SUBMIT_TEXT,
        )
        .await?
        .is_some();
        let advance = self.find_advance().await?.is_some();
        let questions = self.visible_questions().await?;

        Ok(StepObservation {
            resume_upload,
            cover_letter_upload,
            submit,
            questions,
            advance,
        })
    }

    async fn visible_questions(&self) -> Result<Vec<String>> {
        let mut questions = Vec::new();
        let blocks = find_first(self.driver.as_ref(), &chain(selectors::QUESTION_BLOCKS)).await?;
        for element in blocks {
            match self.driver.element_text(&element).await {
                Ok(text) => {
                    let text = normalize_question(&text);
                    if !text.is_empty() {
                        questions.push(text);
                    }
                }
                Err(e) if e.is_transient() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(questions)
    }

    /// Resolve and fill each question, then remember it for this job so
    /// an unanswerable question reappearing cannot loop the resolver.
    async fn fill_questions(
        &mut self,
        state: &mut ApplicationFormState,
        questions: &[String],
    ) -> Result<()> {
        let inputs = find_first(self.driver.as_ref(), &chain(selectors::QUESTION_INPUTS)).await?;

        for (index, question) in questions.iter().enumerate() {
            let resolved = self.resolver.resolve(question).await;
            if resolved.needs_human() {
                info!("question needs human input, pausing briefly: {}", question);
                tokio::time::sleep(MANUAL_INPUT_PAUSE).await;
            } else if let Some(input) = inputs.get(index) {
                match self.driver.send_keys(input, &resolved.answer).await {
                    Ok(()) => debug!("answered '{}' with '{}'", question, resolved.answer),
                    Err(e) if e.is_transient() => {
                        warn!("could not fill answer for '{}': {}", question, e);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            state.previously_answered.insert(question.clone());
        }
        Ok(())
    }

    async fn find_advance(&self) -> Result<Option<ElementHandle>> {
        for text in selectors::ADVANCE_TEXTS {
            let button = find_first_with_text(
                self.driver.as_ref(),
                &chain(selectors::ADVANCE_BUTTONS),
                text,
            )
            .await?;
            if button.is_some() {
                return Ok(button);
            }
        }
        Ok(None)
    }

    async fn click_submit(&self) -> Result<bool> {
        let button = find_first_with_text(
            self.driver.as_ref(),
            &chain(selectors::SUBMIT_BUTTONS),
            selectors::SUBMIT_TEXT,
        )
        .await?;
        match button {
            Some(button) => self.click(&button).await,
            None => Ok(false),
        }
    }

    async fn click_advance(&self) -> Result<bool> {
        match self.find_advance().await? {
            Some(button) => self.click(&button).await,
            None => Ok(false),
        }
    }

    /// Click with a bounded clickable wait. Transient failures are
    /// skipped (the loop continues); only fatal errors propagate.
    async fn click(&self, element: &ElementHandle) -> Result<bool> {
        if let Err(e) = self
            .driver
            .wait_until_clickable(element, CLICKABLE_TIMEOUT)
            .await
        {
            if !e.is_transient() {
                return Err(e.into());
            }
            warn!("element never became clickable: {}", e);
            return Ok(false);
        }
        match self.driver.click(element).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_transient() => {
                warn!("click failed, skipping step action: {}", e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upload(&self, selector_chain: &[&str], path: &Path) -> Result<bool> {
        let found = find_first(self.driver.as_ref(), &chain(selector_chain)).await?;
        let Some(input) = found.into_iter().next() else {
            return Ok(false);
        };
        match self.driver.upload_file(&input, path).await {
            Ok(()) => {
                info!("uploaded {}", path.display());
                Ok(true)
            }
            Err(e) if e.is_transient() => {
                warn!("upload failed, skipping: {}", e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// First non-empty text across a selector chain.
    async fn first_text(&self, selector_chain: &[&str]) -> String {
        let found = match find_first(self.driver.as_ref(), &chain(selector_chain)).await {
            Ok(found) => found,
            Err(_) => return String::new(),
        };
        for element in found {
            if let Ok(text) = self.driver.element_text(&element).await {
                let text = text.trim().to_string();
                if !text.is_empty() {
                    return text;
                }
            }
        }
        String::new()
    }

    fn record(
        &self,
        job_id: &str,
        job_title: &str,
        company: &str,
        outcome: ApplyOutcome,
    ) -> Result<()> {
        let record = ApplicationRecord::now(
            job_id,
            job_title,
            company,
            outcome.attempted(),
            outcome.applied(),
        );
        self.ledger.append(&record)
    }

    pub fn resolver(&self) -> &AnswerResolver {
        &self.resolver
    }

    pub fn ledger(&self) -> &ApplicationLedger {
        &self.ledger
    }
}
