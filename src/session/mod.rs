// src/session/mod.rs
//! Abstraction over the authenticated browser session.
//!
//! The agent never touches a concrete automation binding; everything it
//! needs from the page goes through [`SessionDriver`]. Locators are
//! `(strategy, selector)` pairs tried against the live DOM, and fallback
//! chains are resolved with [`find_first`].

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub mod snapshot;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no element matched {0}")]
    NoSuchElement(String),
    #[error("element reference went stale")]
    StaleElement,
    #[error("click was intercepted by another element")]
    ClickIntercepted,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("session is unusable: {0}")]
    Fatal(String),
}

impl SessionError {
    /// Transient failures degrade the current step to a no-op; only
    /// `Fatal` aborts the run.
    pub fn is_transient(&self) -> bool {
        !matches!(self, SessionError::Fatal(_))
    }
}

/// How a selector string is interpreted by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Css,
    TagName,
}

/// A `(strategy, selector)` pair resolved against the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub strategy: Strategy,
    pub selector: String,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::Css,
            selector: selector.into(),
        }
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::TagName,
            selector: name.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.strategy {
            Strategy::Css => write!(f, "css:{}", self.selector),
            Strategy::TagName => write!(f, "tag:{}", self.selector),
        }
    }
}

/// Opaque handle to an element the driver has located.
///
/// Handles are only valid for the page they were found on; interacting
/// with one after a navigation yields [`SessionError::StaleElement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    id: u64,
}

impl ElementHandle {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// The capabilities the agent consumes from the browser session.
#[async_trait]
pub trait SessionDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), SessionError>;

    /// All elements matching the locator. An empty result set is not an
    /// error; `NoSuchElement` is reserved for dead handles.
    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, SessionError>;

    async fn element_text(&self, element: &ElementHandle) -> Result<String, SessionError>;

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, SessionError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), SessionError>;

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), SessionError>;

    async fn upload_file(&self, element: &ElementHandle, path: &Path)
        -> Result<(), SessionError>;

    async fn wait_until_clickable(
        &self,
        element: &ElementHandle,
        timeout: Duration,
    ) -> Result<(), SessionError>;

    /// Raw markup of the current page, for marker-string checks.
    async fn page_markup(&self) -> Result<String, SessionError>;
}

/// Try each locator in order, returning the first non-empty result set.
///
/// Transient lookup failures fall through to the next locator in the
/// chain; an empty vec means the whole chain came up dry.
pub async fn find_first(
    driver: &dyn SessionDriver,
    locators: &[Locator],
) -> Result<Vec<ElementHandle>, SessionError> {
    for locator in locators {
        match driver.find_all(locator).await {
            Ok(found) if !found.is_empty() => return Ok(found),
            Ok(_) => continue,
            Err(e) if e.is_transient() => {
                debug!("locator {} failed transiently: {}", locator, e);
                continue;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(Vec::new())
}

/// First element across the whole chain whose visible text contains
/// `needle` (case-insensitive). Unlike [`find_first`], later locators
/// are still scanned when an earlier one matched elements without the
/// wanted text.
pub async fn find_first_with_text(
    driver: &dyn SessionDriver,
    locators: &[Locator],
    needle: &str,
) -> Result<Option<ElementHandle>, SessionError> {
    let needle = needle.to_lowercase();
    for locator in locators {
        let found = match driver.find_all(locator).await {
            Ok(found) => found,
            Err(e) if e.is_transient() => {
                debug!("locator {} failed transiently: {}", locator, e);
                continue;
            }
            Err(e) => return Err(e),
        };
        for element in found {
            match driver.element_text(&element).await {
                Ok(text) if text.to_lowercase().contains(&needle) => return Ok(Some(element)),
                Ok(_) => continue,
                Err(e) if e.is_transient() => continue,
                Err(e) => return Err(e),
            }
        }
    }
    Ok(None)
}
