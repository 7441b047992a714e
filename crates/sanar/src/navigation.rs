//! Navigation resilience layer.
//!
//! Each attempt walks the wait-strategy chain `[preferred, load,
//! domcontentloaded, networkidle]`; the first strategy that completes
//! wins. When every strategy fails on every attempt the page is loaded in
//! degraded mode from a plain HTTP fetch so static DOM extraction can still
//! run. Only if that fails too does the last navigation error surface.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::driver::{BrowserSession, HtmlFetcher};
use crate::result::{SanarError, SanarResult};
use crate::wait::{LoadState, DEFAULT_NAVIGATION_TIMEOUT_MS};

/// Default number of extra attempts after the first
pub const DEFAULT_NAVIGATION_RETRIES: u32 = 2;

/// Navigation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigateOptions {
    /// Timeout per strategy, in milliseconds
    pub timeout_ms: u64,
    /// Strategy tried first on every attempt
    pub wait_until: LoadState,
    /// Extra attempts after the first
    pub retries: u32,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            wait_until: LoadState::Load,
            retries: DEFAULT_NAVIGATION_RETRIES,
        }
    }
}

impl NavigateOptions {
    /// Set the per-strategy timeout
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the preferred strategy
    #[must_use]
    pub const fn with_wait_until(mut self, state: LoadState) -> Self {
        self.wait_until = state;
        self
    }

    /// Set the retry count
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// How a navigation completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// A live browser load succeeded
    Live {
        /// Winning wait strategy
        strategy: LoadState,
        /// Zero-based attempt index
        attempt: u32,
    },
    /// Static HTML was loaded without script execution
    Degraded,
}

impl NavigationOutcome {
    /// Whether the page is running live
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }
}

impl fmt::Display for NavigationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live { strategy, attempt } => write!(f, "live ({strategy}, attempt {attempt})"),
            Self::Degraded => f.write_str("degraded"),
        }
    }
}

/// Multi-strategy navigator with optional degraded-mode fetcher
#[derive(Clone, Default)]
pub struct Navigator {
    options: NavigateOptions,
    fetcher: Option<Arc<dyn HtmlFetcher>>,
}

impl fmt::Debug for Navigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigator")
            .field("options", &self.options)
            .field("degraded_mode", &self.fetcher.is_some())
            .finish()
    }
}

impl Navigator {
    /// Navigator without degraded mode
    #[must_use]
    pub fn new(options: NavigateOptions) -> Self {
        Self {
            options,
            fetcher: None,
        }
    }

    /// Enable degraded mode through `fetcher`
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn HtmlFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Options in use
    #[must_use]
    pub const fn options(&self) -> &NavigateOptions {
        &self.options
    }

    /// Navigate with the configured options
    pub async fn navigate<S: BrowserSession + ?Sized>(
        &self,
        session: &S,
        url: &str,
    ) -> SanarResult<NavigationOutcome> {
        self.navigate_with(session, url, self.options).await
    }

    /// Navigate with explicit options
    pub async fn navigate_with<S: BrowserSession + ?Sized>(
        &self,
        session: &S,
        url: &str,
        options: NavigateOptions,
    ) -> SanarResult<NavigationOutcome> {
        let chain = LoadState::fallback_chain(options.wait_until);
        let mut last_error = None;
        for attempt in 0..=options.retries {
            for &strategy in &chain {
                match session.goto(url, strategy, options.timeout_ms).await {
                    Ok(()) => {
                        info!(url, %strategy, attempt, "Navigation succeeded");
                        return Ok(NavigationOutcome::Live { strategy, attempt });
                    }
                    Err(e) => {
                        debug!(url, %strategy, attempt, error = %e, "Navigation strategy failed");
                        last_error = Some(e);
                    }
                }
            }
        }
        let last_error = last_error.unwrap_or_else(|| SanarError::Navigation {
            url: url.to_string(),
            message: "no navigation attempted".to_string(),
        });

        let Some(fetcher) = &self.fetcher else {
            warn!(url, error = %last_error, "Navigation failed and degraded mode is unavailable");
            return Err(last_error);
        };
        warn!(url, error = %last_error, "All wait strategies failed, entering degraded mode");
        let html = match fetcher.fetch(url, options.timeout_ms).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url, error = %e, "Degraded fetch failed");
                return Err(last_error);
            }
        };
        if let Err(e) = session.set_content(&html).await {
            warn!(url, error = %e, "Could not load fetched HTML into the page");
            return Err(last_error);
        }
        info!(url, bytes = html.len(), "Page loaded in degraded mode");
        Ok(NavigationOutcome::Degraded)
    }
}
