// tests/apply_flow.rs
//! End-to-end runs of the search loop and apply agent against scripted
//! page snapshots.

use apply_agent::agent::{AgentSettings, ApplyAgent, ApplyOutcome};
use apply_agent::answers::{AnswerResolver, AnswerStore};
use apply_agent::ledger::{ApplicationLedger, ApplicationRecord};
use apply_agent::search::{SearchLoop, SearchSettings};
use apply_agent::session::snapshot::{DriverAction, SnapshotSession};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn agent_for(session: Arc<SnapshotSession>, dir: &tempfile::TempDir) -> ApplyAgent {
    let store = AnswerStore::open(&dir.path().join("qa.csv"), 0.9).unwrap();
    let resolver = AnswerResolver::new(store, "95000".to_string(), "5551234567".to_string());
    let ledger = ApplicationLedger::new(&dir.path().join("output.csv"));
    ApplyAgent::new(
        session,
        resolver,
        ledger,
        AgentSettings {
            step_budget: 5,
            think_time: Duration::from_millis(0),
            resume_path: PathBuf::from("resume.pdf"),
            cover_letter_path: None,
        },
    )
}

fn easy_apply_job_pages(session: &SnapshotSession) {
    session.insert_page(
        "12345",
        r#"
        <h1 class="top-card-layout__title">Rust Engineer</h1>
        <span class="jobs-unified-top-card__company-name">Acme Corp</span>
        <button class="jobs-apply-button" data-goto="12345_step1">Easy Apply</button>
        "#,
    );
    session.insert_page(
        "12345_step1",
        r#"
        <div class="jobs-easy-apply-content">
          <input type="file" id="jobs-document-upload-resume">
          <button aria-label="Continue to next step" data-goto="12345_step2">Next</button>
        </div>
        "#,
    );
    session.insert_page(
        "12345_step2",
        r#"
        <div class="jobs-easy-apply-form-section__grouping">How many years of Python experience do you have?</div>
        <input type="text" id="answer-0">
        <button aria-label="Review your application" data-goto="12345_review">Review</button>
        "#,
    );
    session.insert_page(
        "12345_review",
        r#"
        <footer>
          <button aria-label="Submit application" data-goto="12345_done">Submit application</button>
        </footer>
        "#,
    );
    session.insert_page("12345_done", "<p>Application submitted</p>");
}

#[tokio::test]
async fn full_application_flow_submits_and_records() {
    let session = Arc::new(SnapshotSession::new());
    easy_apply_job_pages(&session);

    let dir = tempfile::tempdir().unwrap();
    let mut agent = agent_for(session.clone(), &dir);

    let applied = agent.apply_to_job("12345").await.unwrap();
    assert!(applied);

    // The resume went in and the question was answered with the rule value.
    let actions = session.actions();
    assert!(actions.iter().any(|action| matches!(
        action,
        DriverAction::Upload { path, .. } if path == &PathBuf::from("resume.pdf")
    )));
    assert!(actions.iter().any(|action| matches!(
        action,
        DriverAction::SendKeys { text, .. } if text == "1"
    )));

    // Exactly one ledger row, attempted and successful.
    let rows = agent.ledger().load_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].job_id, "12345");
    assert_eq!(rows[0].job_title, "Rust Engineer");
    assert_eq!(rows[0].company, "Acme Corp");
    assert!(rows[0].attempted);
    assert!(rows[0].result);

    // The resolved answer was persisted for future runs.
    assert_eq!(
        agent
            .resolver()
            .store()
            .get("How many years of Python experience do you have?"),
        Some("1")
    );
}

#[tokio::test]
async fn a_form_that_never_submits_exhausts_the_step_budget() {
    let session = Arc::new(SnapshotSession::new());
    session.insert_page(
        "22222",
        r#"<button class="jobs-apply-button" data-goto="22222_a">Easy Apply</button>"#,
    );
    // Two steps that bounce between each other forever.
    session.insert_page(
        "22222_a",
        r#"<button aria-label="Continue to next step" data-goto="22222_b">Next</button>"#,
    );
    session.insert_page(
        "22222_b",
        r#"<button aria-label="Continue to next step" data-goto="22222_a">Next</button>"#,
    );

    let dir = tempfile::tempdir().unwrap();
    let mut agent = agent_for(session.clone(), &dir);

    let applied = agent.apply_to_job("22222").await.unwrap();
    assert!(!applied);

    let rows = agent.ledger().load_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].attempted);
    assert!(!rows[0].result);
}

#[tokio::test]
async fn a_dead_end_form_blocks_after_two_idle_steps() {
    let session = Arc::new(SnapshotSession::new());
    session.insert_page(
        "33333",
        r#"<button class="jobs-apply-button" data-goto="33333_form">Easy Apply</button>"#,
    );
    session.insert_page("33333_form", "<p>Nothing to interact with here.</p>");

    let dir = tempfile::tempdir().unwrap();
    let mut agent = agent_for(session.clone(), &dir);

    let applied = agent.apply_to_job("33333").await.unwrap();
    assert!(!applied);

    let rows = agent.ledger().load_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].attempted);
    assert!(!rows[0].result);
}

#[tokio::test]
async fn missing_easy_apply_and_already_applied_are_normal_outcomes() {
    let session = Arc::new(SnapshotSession::new());
    session.insert_page(
        "44444",
        r#"<h1 class="top-card-layout__title">External Role</h1><button>Apply</button>"#,
    );
    session.insert_page(
        "55555",
        r#"<h1 class="top-card-layout__title">Old Role</h1><div>Application submitted</div>"#,
    );

    let dir = tempfile::tempdir().unwrap();
    let mut agent = agent_for(session.clone(), &dir);

    assert!(!agent.apply_to_job("44444").await.unwrap());
    assert!(!agent.apply_to_job("55555").await.unwrap());

    // One row per attempt, neither marked attempted.
    let rows = agent.ledger().load_all().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| !row.attempted && !row.result));
}

#[tokio::test]
async fn search_loop_filters_and_dedupes_before_dispatch() {
    let session = Arc::new(SnapshotSession::new());
    easy_apply_job_pages(&session);
    session.insert_page(
        "search_page",
        r#"
        <ul>
          <li data-occludable-job-id="12345">Rust Engineer - Acme Corp</li>
          <li data-occludable-job-id="77777">Senior Rust - Applied 3 days ago</li>
          <li data-occludable-job-id="88888">Rust Dev - Shady Recruiting</li>
          <li data-occludable-job-id="99999">Rust Engineer - DedupeMe Inc</li>
        </ul>
        "#,
    );
    session.route("start=0", "search_page");

    let dir = tempfile::tempdir().unwrap();

    // 99999 was attempted an hour ago; the dedupe window must keep it out.
    let ledger = ApplicationLedger::new(&dir.path().join("output.csv"));
    ledger
        .append(&ApplicationRecord::now(
            "99999",
            "Rust Engineer",
            "DedupeMe Inc",
            true,
            false,
        ))
        .unwrap();

    let agent = agent_for(session.clone(), &dir);
    let mut search = SearchLoop::new(
        session.clone(),
        agent,
        SearchSettings {
            budget_per_pair: Duration::from_secs(30),
            max_combinations: 500,
            dedupe_window_hours: 48,
            company_blacklist: vec!["Shady Recruiting".to_string()],
            title_blacklist: vec![],
            experience_levels: vec![],
        },
    );

    let stats = search
        .start_apply(
            &["Rust Engineer".to_string()],
            &["Remote".to_string()],
        )
        .await
        .unwrap();

    assert_eq!(stats.pairs_visited, 1);
    assert_eq!(stats.candidates_seen, 4);
    assert_eq!(stats.candidates_skipped, 3);
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.submitted, 1);

    // Only 12345 was dispatched; the ledger grew by exactly one row.
    let rows = search.agent().ledger().load_all().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].job_id, "12345");
    assert!(rows[1].result);
}

#[test]
fn outcome_flags_line_up_with_the_ledger_columns() {
    assert!(ApplyOutcome::Submitted.applied());
    assert!(ApplyOutcome::Submitted.attempted());
    assert!(!ApplyOutcome::NoEasyApply.attempted());
    assert!(!ApplyOutcome::AlreadyApplied.attempted());
    assert!(ApplyOutcome::Blocked.attempted());
    assert!(!ApplyOutcome::Blocked.applied());
    assert!(ApplyOutcome::StepBudgetExceeded.attempted());
}
