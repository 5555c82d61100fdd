// src/answers/resolver.rs
//! Layered question resolution: stored answer, then AI, then keyword
//! rules, then a needs-human sentinel. The batch run never blocks on a
//! question; the worst case is a sentinel answer a human reviews later.

use super::rules::{self, RuleContext, USER_PROVIDED};
use super::store::AnswerStore;
use crate::ai::CompletionBackend;
use crate::utils::normalize_question;
use std::sync::Arc;
use tracing::{debug, info, warn};

const ANSWER_SYSTEM_PROMPT: &str = "You are filling in a job application form on behalf of the \
    candidate whose resume follows. Reply with only the literal answer value - no explanation. \
    For yes/no questions reply Yes or No. For numeric questions reply with a single number.";
const ANSWER_MAX_TOKENS: u32 = 50;
const ANSWER_TEMPERATURE: f32 = 0.1;

/// Which layer produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Stored,
    Ai,
    Rule,
    User,
}

#[derive(Debug, Clone)]
pub struct ResolvedAnswer {
    pub answer: String,
    pub provenance: Provenance,
}

impl ResolvedAnswer {
    /// A sentinel resolution needs human follow-up after the run.
    pub fn needs_human(&self) -> bool {
        self.provenance == Provenance::User
    }
}

pub struct AnswerResolver {
    store: AnswerStore,
    backend: Option<Arc<dyn CompletionBackend>>,
    resume_text: Option<String>,
    salary: String,
    phone_number: String,
}

impl AnswerResolver {
    pub fn new(store: AnswerStore, salary: String, phone_number: String) -> Self {
        Self {
            store,
            backend: None,
            resume_text: None,
            salary,
            phone_number,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_resume_text(mut self, resume_text: String) -> Self {
        self.resume_text = Some(resume_text);
        self
    }

    /// Resolve a question to an answer. Every resolution except a pure
    /// stored hit is persisted before returning.
    pub async fn resolve(&mut self, question: &str) -> ResolvedAnswer {
        let normalized = normalize_question(question);

        if let Some(answer) = self.store.get(&normalized) {
            // A stored sentinel means no layer could answer last time;
            // fall through and try again rather than reusing it.
            if answer != USER_PROVIDED {
                debug!("stored answer hit for: {}", normalized);
                return ResolvedAnswer {
                    answer: answer.to_string(),
                    provenance: Provenance::Stored,
                };
            }
        }

        if let Some(answer) = self.resolve_via_backend(&normalized).await {
            self.store.upsert(&normalized, &answer);
            return ResolvedAnswer {
                answer,
                provenance: Provenance::Ai,
            };
        }

        let ctx = RuleContext {
            salary: &self.salary,
            phone_number: &self.phone_number,
        };
        if let Some(answer) = rules::match_rule(&normalized, &ctx) {
            debug!("rule answer for '{}': {}", normalized, answer);
            self.store.upsert(&normalized, &answer);
            return ResolvedAnswer {
                answer,
                provenance: Provenance::Rule,
            };
        }

        info!("no layer could answer '{}', marking for follow-up", normalized);
        self.store.upsert(&normalized, USER_PROVIDED);
        ResolvedAnswer {
            answer: USER_PROVIDED.to_string(),
            provenance: Provenance::User,
        }
    }

    async fn resolve_via_backend(&self, question: &str) -> Option<String> {
        let backend = self.backend.as_ref()?;
        let resume = self.resume_text.as_deref()?;

        // Self-identification questions are always answered by opting
        // out, never by the model.
        if rules::is_self_identification(question) {
            return None;
        }

        let user_prompt = format!("Resume:\n{resume}\n\nQuestion: {question}");
        match backend
            .complete(
                ANSWER_SYSTEM_PROMPT,
                &user_prompt,
                ANSWER_MAX_TOKENS,
                ANSWER_TEMPERATURE,
            )
            .await
        {
            Ok(answer) => Some(answer),
            Err(e) => {
                warn!("AI backend failed for '{}', falling back to rules: {}", question, e);
                None
            }
        }
    }

    pub fn store(&self) -> &AnswerStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::BackendError;
    use async_trait::async_trait;

    struct FixedBackend(&'static str);

    #[async_trait]
    impl CompletionBackend for FixedBackend {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<String, BackendError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl CompletionBackend for FailingBackend {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<String, BackendError> {
            Err(BackendError::Malformed("boom".to_string()))
        }
    }

    fn resolver(dir: &tempfile::TempDir) -> AnswerResolver {
        let store = AnswerStore::open(&dir.path().join("qa.csv"), 0.9).unwrap();
        AnswerResolver::new(store, "95000".to_string(), "5551234567".to_string())
    }

    #[tokio::test]
    async fn rule_layer_answers_when_nothing_else_can() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = resolver(&dir);

        let resolved = resolver.resolve("Are you a US citizen?").await;
        assert_eq!(resolved.answer, "Yes");
        assert_eq!(resolved.provenance, Provenance::Rule);
        // Rule resolutions are persisted.
        assert_eq!(resolver.store().get("Are you a US citizen?"), Some("Yes"));
    }

    #[tokio::test]
    async fn how_many_precedence_survives_the_layering() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = resolver(&dir);

        let resolved = resolver
            .resolve("How many years of Python experience do you have?")
            .await;
        assert_eq!(resolved.answer, "1");
        assert_eq!(resolved.provenance, Provenance::Rule);
    }

    #[tokio::test]
    async fn stored_answers_win_over_rules() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = resolver(&dir);

        resolver.resolve("Are you a US citizen?").await;
        let again = resolver.resolve("Are you a US citizen?").await;
        assert_eq!(again.provenance, Provenance::Stored);
        assert_eq!(again.answer, "Yes");
    }

    #[tokio::test]
    async fn sentinel_answers_are_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = resolver(&dir);

        let first = resolver.resolve("Describe your ideal team.").await;
        assert!(first.needs_human());

        // The sentinel is stored but never served as a stored hit.
        let second = resolver.resolve("Describe your ideal team.").await;
        assert_eq!(second.provenance, Provenance::User);
    }

    #[tokio::test]
    async fn backend_answers_when_resume_is_available() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = resolver(&dir)
            .with_backend(Arc::new(FixedBackend("3")))
            .with_resume_text("Rust engineer, three years of systems work.".to_string());

        let resolved = resolver.resolve("Years of Rust?").await;
        assert_eq!(resolved.answer, "3");
        assert_eq!(resolved.provenance, Provenance::Ai);
        assert_eq!(resolver.store().get("Years of Rust?"), Some("3"));
    }

    #[tokio::test]
    async fn backend_failure_falls_through_to_rules() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = resolver(&dir)
            .with_backend(Arc::new(FailingBackend))
            .with_resume_text("Rust engineer.".to_string());

        let resolved = resolver.resolve("Are you a US citizen?").await;
        assert_eq!(resolved.answer, "Yes");
        assert_eq!(resolved.provenance, Provenance::Rule);
    }

    #[tokio::test]
    async fn self_identification_skips_the_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = resolver(&dir)
            .with_backend(Arc::new(FixedBackend("should not be used")))
            .with_resume_text("Rust engineer.".to_string());

        let resolved = resolver.resolve("What is your gender?").await;
        assert_eq!(resolved.answer, rules::DECLINE_TO_ANSWER);
        assert_eq!(resolved.provenance, Provenance::Rule);
    }
}
