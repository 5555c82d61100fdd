// src/selectors.rs
//! Locator fallback chains for the LinkedIn application flow.
//!
//! LinkedIn renders the same affordance under different class names
//! depending on surface and rollout, so every lookup is a prioritized
//! chain tried in order; the first selector with matches wins.

use crate::session::Locator;

/// Visible text marking the in-page application affordance.
pub const EASY_APPLY_MARKER: &str = "Easy Apply";

/// Page-content marker shown once an application has gone through.
pub const ALREADY_APPLIED_MARKER: &str = "Application submitted";

/// Marker on a search-result card for a job already applied to.
pub const APPLIED_CARD_MARKER: &str = "Applied";

pub const EASY_APPLY_BUTTONS: &[&str] = &[
    "button.jobs-apply-button",
    ".jobs-apply-button--top-card button",
    ".jobs-s-apply button",
    "button",
];

pub const JOB_TITLE: &[&str] = &[
    "h1.top-card-layout__title",
    ".job-details-jobs-unified-top-card__job-title",
    ".jobs-unified-top-card__job-title",
    "h1",
];

pub const JOB_COMPANY: &[&str] = &[
    ".job-details-jobs-unified-top-card__company-name",
    ".jobs-unified-top-card__company-name",
    "a[data-test-id='job-poster-name']",
];

pub const RESUME_UPLOAD_INPUTS: &[&str] = &[
    "input[type='file'][id*='resume']",
    "input[type='file'][name*='resume']",
    "input[type='file'][id*='jobs-document-upload']",
];

pub const COVER_LETTER_INPUTS: &[&str] = &[
    "input[type='file'][id*='cover']",
    "input[type='file'][name*='cover']",
];

pub const SUBMIT_BUTTONS: &[&str] = &[
    "button[aria-label='Submit application']",
    "button[data-control-name='submit_unify']",
    "footer button",
    "button",
];

/// Text the submit gate must carry, filtered after the chain resolves.
pub const SUBMIT_TEXT: &str = "Submit";

pub const ADVANCE_BUTTONS: &[&str] = &[
    "button[aria-label='Continue to next step']",
    "button[aria-label='Review your application']",
    "button[data-control-name='continue_unify']",
    "footer button",
];

/// Accepted visible texts for a step-advance button.
pub const ADVANCE_TEXTS: &[&str] = &["Next", "Review", "Continue"];

pub const QUESTION_BLOCKS: &[&str] = &[
    ".jobs-easy-apply-form-section__grouping",
    ".fb-dash-form-element",
    "div[data-test-form-element]",
];

pub const QUESTION_INPUTS: &[&str] = &[
    ".jobs-easy-apply-content input[type='text']",
    ".jobs-easy-apply-content textarea",
    "input[type='text']",
    "textarea",
];

pub const JOB_CARDS: &[&str] = &[
    "li[data-occludable-job-id]",
    "div[data-job-id]",
    "li.jobs-search-results__list-item",
];

/// Attributes a search-result card may carry its job id under.
pub const JOB_ID_ATTRS: &[&str] = &["data-occludable-job-id", "data-job-id"];

/// Materialize a selector chain as CSS locators.
pub fn chain(selectors: &[&str]) -> Vec<Locator> {
    selectors.iter().map(|s| Locator::css(*s)).collect()
}
