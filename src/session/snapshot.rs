// src/session/snapshot.rs
//! Session driver backed by saved page snapshots.
//!
//! Pages are plain HTML documents keyed by name. Navigation is resolved
//! through substring routes, and an element may declare the page a click
//! moves to via its `data-goto` attribute. This is what the `run`
//! subcommand replays and what the test suite drives the agent with; a
//! live WebDriver binding would implement [`SessionDriver`] the same way.

use super::{ElementHandle, Locator, SessionDriver, SessionError, Strategy};
use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attribute a snapshot element uses to declare its click target.
const GOTO_ATTR: &str = "data-goto";

/// Side effects the driver has performed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverAction {
    Click { page: String, selector: String },
    SendKeys { page: String, selector: String, text: String },
    Upload { page: String, selector: String, path: PathBuf },
}

struct ResolvedElement {
    page: String,
    epoch: u64,
    selector: String,
    index: usize,
}

struct Inner {
    pages: HashMap<String, String>,
    routes: Vec<(String, String)>,
    current: Option<String>,
    epoch: u64,
    next_id: u64,
    handles: HashMap<u64, ResolvedElement>,
    actions: Vec<DriverAction>,
}

pub struct SnapshotSession {
    inner: Mutex<Inner>,
}

impl SnapshotSession {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                pages: HashMap::new(),
                routes: Vec::new(),
                current: None,
                epoch: 0,
                next_id: 1,
                handles: HashMap::new(),
                actions: Vec::new(),
            }),
        }
    }

    /// Load every `*.html` file in `dir` as a page named after its stem,
    /// plus an optional `routes.csv` of `url-substring,page` rows.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let session = Self::new();
        {
            let mut inner = session.inner.lock().unwrap_or_else(|e| e.into_inner());
            let entries = std::fs::read_dir(dir)
                .with_context(|| format!("Failed to read snapshot directory: {}", dir.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("html") {
                    continue;
                }
                let name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                let html = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
                debug!("loaded snapshot page '{}'", name);
                inner.pages.insert(name, html);
            }
            if inner.pages.is_empty() {
                anyhow::bail!("No .html snapshots found in {}", dir.display());
            }

            let routes_path = dir.join("routes.csv");
            if routes_path.exists() {
                let mut reader = csv::ReaderBuilder::new()
                    .has_headers(false)
                    .from_path(&routes_path)
                    .with_context(|| format!("Failed to read {}", routes_path.display()))?;
                for record in reader.records() {
                    let record = record.context("Malformed routes.csv row")?;
                    if record.len() >= 2 {
                        inner
                            .routes
                            .push((record[0].to_string(), record[1].to_string()));
                    }
                }
            }
            info!(
                "snapshot session ready: {} pages, {} routes",
                inner.pages.len(),
                inner.routes.len()
            );
        }
        Ok(session)
    }

    pub fn insert_page(&self, name: &str, html: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pages.insert(name.to_string(), html.to_string());
    }

    pub fn route(&self, url_substring: &str, page: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .routes
            .push((url_substring.to_string(), page.to_string()));
    }

    pub fn set_current(&self, page: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.current = Some(page.to_string());
        inner.epoch += 1;
    }

    /// Everything the driver has been asked to do so far.
    pub fn actions(&self) -> Vec<DriverAction> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.actions.clone()
    }

    pub fn current_page(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.current.clone()
    }
}

impl Default for SnapshotSession {
    fn default() -> Self {
        Self::new()
    }
}

fn css_of(locator: &Locator) -> &str {
    match locator.strategy {
        Strategy::Css | Strategy::TagName => &locator.selector,
    }
}

/// Run `f` on the `index`-th match of `css` in `html`.
fn with_nth<R>(
    html: &str,
    css: &str,
    index: usize,
    f: impl FnOnce(scraper::ElementRef<'_>) -> R,
) -> Option<R> {
    let selector = match Selector::parse(css) {
        Ok(s) => s,
        Err(_) => {
            warn!("unparseable selector skipped: {}", css);
            return None;
        }
    };
    let document = Html::parse_document(html);
    document.select(&selector).nth(index).map(f)
}

fn count_matches(html: &str, css: &str) -> usize {
    let selector = match Selector::parse(css) {
        Ok(s) => s,
        Err(_) => {
            warn!("unparseable selector skipped: {}", css);
            return 0;
        }
    };
    let document = Html::parse_document(html);
    document.select(&selector).count()
}

impl Inner {
    fn current_html(&self) -> Result<(&str, &str), SessionError> {
        let page = self
            .current
            .as_deref()
            .ok_or_else(|| SessionError::Fatal("no page loaded".to_string()))?;
        let html = self
            .pages
            .get(page)
            .ok_or_else(|| SessionError::Fatal(format!("unknown page '{page}'")))?;
        Ok((page, html))
    }

    /// Validate a handle against the current page and epoch.
    fn checked(&self, element: &ElementHandle) -> Result<&ResolvedElement, SessionError> {
        let resolved = self
            .handles
            .get(&element.id())
            .ok_or(SessionError::StaleElement)?;
        if resolved.epoch != self.epoch || self.current.as_deref() != Some(resolved.page.as_str())
        {
            return Err(SessionError::StaleElement);
        }
        Ok(resolved)
    }
}

#[async_trait]
impl SessionDriver for SnapshotSession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        // Longest matching route wins; page names double as routes so a
        // job id in the URL finds its snapshot without explicit wiring.
        let mut best: Option<(usize, String)> = None;
        for (pattern, page) in &inner.routes {
            if url.contains(pattern.as_str()) && best.as_ref().map_or(true, |(l, _)| pattern.len() > *l)
            {
                best = Some((pattern.len(), page.clone()));
            }
        }
        if best.is_none() {
            for name in inner.pages.keys() {
                if url.contains(name.as_str()) && best.as_ref().map_or(true, |(l, _)| name.len() > *l)
                {
                    best = Some((name.len(), name.clone()));
                }
            }
        }

        match best {
            Some((_, page)) => {
                debug!("navigate {} -> page '{}'", url, page);
                inner.current = Some(page);
                inner.epoch += 1;
                Ok(())
            }
            None => Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "no snapshot route matches".to_string(),
            }),
        }
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, SessionError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let (page, html) = {
            let (page, html) = inner.current_html()?;
            (page.to_string(), html.to_string())
        };

        let css = css_of(locator).to_string();
        let count = count_matches(&html, &css);
        let epoch = inner.epoch;

        let mut found = Vec::with_capacity(count);
        for index in 0..count {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.handles.insert(
                id,
                ResolvedElement {
                    page: page.clone(),
                    epoch,
                    selector: css.clone(),
                    index,
                },
            );
            found.push(ElementHandle::new(id));
        }
        Ok(found)
    }

    async fn element_text(&self, element: &ElementHandle) -> Result<String, SessionError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let resolved = inner.checked(element)?;
        let (_, html) = inner.current_html()?;
        with_nth(html, &resolved.selector, resolved.index, |el| {
            el.text().collect::<Vec<_>>().join(" ").trim().to_string()
        })
        .ok_or_else(|| SessionError::NoSuchElement(resolved.selector.clone()))
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let resolved = inner.checked(element)?;
        let (_, html) = inner.current_html()?;
        with_nth(html, &resolved.selector, resolved.index, |el| {
            el.value().attr(name).map(|v| v.to_string())
        })
        .ok_or_else(|| SessionError::NoSuchElement(resolved.selector.clone()))
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let (page, selector, index) = {
            let resolved = inner.checked(element)?;
            (
                resolved.page.clone(),
                resolved.selector.clone(),
                resolved.index,
            )
        };
        let (_, html) = inner.current_html()?;
        let goto = with_nth(html, &selector, index, |el| {
            el.value().attr(GOTO_ATTR).map(|v| v.to_string())
        })
        .ok_or_else(|| SessionError::NoSuchElement(selector.clone()))?;

        inner.actions.push(DriverAction::Click {
            page: page.clone(),
            selector: selector.clone(),
        });

        if let Some(target) = goto {
            if inner.pages.contains_key(&target) {
                debug!("click on {} -> page '{}'", selector, target);
                inner.current = Some(target);
                inner.epoch += 1;
            } else {
                warn!("click target page '{}' is not a known snapshot", target);
            }
        }
        Ok(())
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let (page, selector) = {
            let resolved = inner.checked(element)?;
            (resolved.page.clone(), resolved.selector.clone())
        };
        inner.actions.push(DriverAction::SendKeys {
            page,
            selector,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn upload_file(
        &self,
        element: &ElementHandle,
        path: &Path,
    ) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let (page, selector) = {
            let resolved = inner.checked(element)?;
            (resolved.page.clone(), resolved.selector.clone())
        };
        inner.actions.push(DriverAction::Upload {
            page,
            selector,
            path: path.to_path_buf(),
        });
        Ok(())
    }

    async fn wait_until_clickable(
        &self,
        element: &ElementHandle,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.checked(element) {
            Ok(_) => Ok(()),
            Err(_) => Err(SessionError::Timeout(timeout)),
        }
    }

    async fn page_markup(&self) -> Result<String, SessionError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let (_, html) = inner.current_html()?;
        Ok(html.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(pages: &[(&str, &str)]) -> SnapshotSession {
        let session = SnapshotSession::new();
        for (name, html) in pages {
            session.insert_page(name, html);
        }
        session
    }

    #[tokio::test]
    async fn navigate_routes_by_page_name_substring() {
        let session = session_with(&[("12345", "<h1>Job</h1>")]);
        session
            .navigate("https://www.linkedin.com/jobs/view/12345")
            .await
            .unwrap();
        assert_eq!(session.current_page().as_deref(), Some("12345"));
    }

    #[tokio::test]
    async fn unrouted_navigation_is_an_error() {
        let session = session_with(&[("a", "<p></p>")]);
        let err = session.navigate("https://example.com/zzz").await.unwrap_err();
        assert!(matches!(err, SessionError::Navigation { .. }));
    }

    #[tokio::test]
    async fn click_follows_data_goto() {
        let session = session_with(&[
            ("one", r#"<button class="go" data-goto="two">Next</button>"#),
            ("two", "<p>done</p>"),
        ]);
        session.set_current("one");
        let buttons = session.find_all(&Locator::css("button.go")).await.unwrap();
        assert_eq!(buttons.len(), 1);
        session.click(&buttons[0]).await.unwrap();
        assert_eq!(session.current_page().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn handles_go_stale_after_navigation() {
        let session = session_with(&[
            ("one", r#"<button data-goto="two">Next</button>"#),
            ("two", "<p>done</p>"),
        ]);
        session.set_current("one");
        let buttons = session.find_all(&Locator::tag("button")).await.unwrap();
        session.click(&buttons[0]).await.unwrap();
        let err = session.element_text(&buttons[0]).await.unwrap_err();
        assert!(matches!(err, SessionError::StaleElement));
    }

    #[tokio::test]
    async fn element_text_joins_nested_nodes() {
        let session = session_with(&[("p", "<div class='q'><span>Are you</span> <span>legal?</span></div>")]);
        session.set_current("p");
        let found = session.find_all(&Locator::css("div.q")).await.unwrap();
        let text = session.element_text(&found[0]).await.unwrap();
        assert_eq!(text, "Are you legal?");
    }
}
