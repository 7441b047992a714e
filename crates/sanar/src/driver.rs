//! Browser Session - abstract browser automation trait
//!
//! Everything in Sanar talks to the page through [`BrowserSession`], so the
//! resolver, navigator and proxy run unchanged against the CDP-backed
//! [`crate::browser::CdpSession`] or the in-memory [`crate::mock::MockSession`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  BrowserSession (async trait)                                    │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────┐         ┌──────────────────────┐       │
//! │  │  CdpSession          │         │  MockSession         │       │
//! │  │  chromiumoxide page  │         │  in-memory DOM table │       │
//! │  │  (feature "browser") │         │  (unit tests)        │       │
//! │  └──────────────────────┘         └──────────────────────┘       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::action::HealableAction;
use crate::locator::Locator;
use crate::result::SanarResult;
use crate::wait::LoadState;

/// A single page under automation.
///
/// All operations take `&self`: one page is driven by one cooperative
/// control flow, and implementations serialize access internally.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate and wait for `wait_until`
    async fn goto(&self, url: &str, wait_until: LoadState, timeout_ms: u64) -> SanarResult<()>;

    /// Wait for a load state on the current document
    async fn wait_for_load_state(&self, state: LoadState, timeout_ms: u64) -> SanarResult<()>;

    /// Number of elements a locator currently matches
    async fn count(&self, locator: &Locator) -> SanarResult<usize>;

    /// Perform an element action on the first match, auto-waiting up to
    /// `timeout_ms` for the locator to resolve
    async fn perform(
        &self,
        locator: &Locator,
        action: &HealableAction,
        timeout_ms: u64,
    ) -> SanarResult<()>;

    /// Evaluate a JavaScript expression in the page and return its JSON value
    async fn evaluate(&self, script: &str) -> SanarResult<serde_json::Value>;

    /// Replace the document with static HTML (no script execution guarantees)
    async fn set_content(&self, html: &str) -> SanarResult<()>;

    /// Current document URL
    async fn current_url(&self) -> SanarResult<String>;

    /// Whether the page has been closed
    async fn is_closed(&self) -> bool;

    /// Close the page and release the browser process
    async fn close(&self) -> SanarResult<()>;
}

#[async_trait]
impl<S: BrowserSession + ?Sized> BrowserSession for Arc<S> {
    async fn goto(&self, url: &str, wait_until: LoadState, timeout_ms: u64) -> SanarResult<()> {
        (**self).goto(url, wait_until, timeout_ms).await
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout_ms: u64) -> SanarResult<()> {
        (**self).wait_for_load_state(state, timeout_ms).await
    }

    async fn count(&self, locator: &Locator) -> SanarResult<usize> {
        (**self).count(locator).await
    }

    async fn perform(
        &self,
        locator: &Locator,
        action: &HealableAction,
        timeout_ms: u64,
    ) -> SanarResult<()> {
        (**self).perform(locator, action, timeout_ms).await
    }

    async fn evaluate(&self, script: &str) -> SanarResult<serde_json::Value> {
        (**self).evaluate(script).await
    }

    async fn set_content(&self, html: &str) -> SanarResult<()> {
        (**self).set_content(html).await
    }

    async fn current_url(&self) -> SanarResult<String> {
        (**self).current_url().await
    }

    async fn is_closed(&self) -> bool {
        (**self).is_closed().await
    }

    async fn close(&self) -> SanarResult<()> {
        (**self).close().await
    }
}

/// Plain HTTP fetcher used by degraded-mode navigation
#[async_trait]
pub trait HtmlFetcher: Send + Sync {
    /// Fetch the raw HTML body of `url`
    async fn fetch(&self, url: &str, timeout_ms: u64) -> SanarResult<String>;
}

/// [`HtmlFetcher`] backed by reqwest
#[cfg(feature = "browser")]
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "browser")]
impl HttpFetcher {
    /// Create a fetcher with a default client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl HtmlFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout_ms: u64) -> SanarResult<String> {
        let to_err = |e: reqwest::Error| crate::result::SanarError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };
        let resp = self
            .client
            .get(url)
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(to_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(crate::result::SanarError::Navigation {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }
        resp.text().await.map_err(to_err)
    }
}
