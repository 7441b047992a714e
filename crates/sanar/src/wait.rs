//! Wait mechanisms: page load states and bounded polling.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::locator::DEFAULT_POLL_INTERVAL_MS;
use crate::result::{SanarError, SanarResult};

/// Default timeout for navigation (30 seconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Network idle threshold (500ms without new requests)
pub const NETWORK_IDLE_THRESHOLD_MS: u64 = 500;

/// Upper bound on the post-click network-idle wait
pub const POST_CLICK_IDLE_CAP_MS: u64 = 3_000;

/// Page load states (Playwright parity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoadState {
    /// Wait for the `load` event to fire
    #[default]
    #[serde(rename = "load")]
    Load,
    /// Wait for `DOMContentLoaded`
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    /// Wait for the network to be idle (no requests for 500ms)
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

impl LoadState {
    /// Playwright-style name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "domcontentloaded",
            Self::NetworkIdle => "networkidle",
        }
    }

    /// Navigation fallback chain: the preferred state first, then the
    /// fixed order `load`, `domcontentloaded`, `networkidle`, without repeats.
    #[must_use]
    pub fn fallback_chain(preferred: Self) -> Vec<Self> {
        let mut chain = vec![preferred];
        for state in [Self::Load, Self::DomContentLoaded, Self::NetworkIdle] {
            if !chain.contains(&state) {
                chain.push(state);
            }
        }
        chain
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadState {
    type Err = SanarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "load" => Ok(Self::Load),
            "domcontentloaded" => Ok(Self::DomContentLoaded),
            "networkidle" => Ok(Self::NetworkIdle),
            other => Err(SanarError::config(format!("unknown load state '{other}'"))),
        }
    }
}

/// Poll `check` until it yields `Some`, or fail with [`SanarError::Timeout`].
pub async fn poll_until<T, F, Fut>(timeout_ms: u64, mut check: F) -> SanarResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SanarResult<Option<T>>>,
{
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if let Some(value) = check().await? {
            return Ok(value);
        }
        if Instant::now() >= deadline {
            return Err(SanarError::Timeout { ms: timeout_ms });
        }
        tokio::time::sleep(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fallback_chain_dedups_preferred() {
        assert_eq!(
            LoadState::fallback_chain(LoadState::Load),
            vec![LoadState::Load, LoadState::DomContentLoaded, LoadState::NetworkIdle]
        );
        assert_eq!(
            LoadState::fallback_chain(LoadState::NetworkIdle),
            vec![LoadState::NetworkIdle, LoadState::Load, LoadState::DomContentLoaded]
        );
    }

    #[test]
    fn test_parse_and_display() {
        let state: LoadState = "DOMContentLoaded".parse().unwrap();
        assert_eq!(state, LoadState::DomContentLoaded);
        assert_eq!(state.to_string(), "domcontentloaded");
        assert!("commit".parse::<LoadState>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&LoadState::NetworkIdle).unwrap();
        assert_eq!(json, "\"networkidle\"");
    }

    #[tokio::test]
    async fn test_poll_until_succeeds_after_retries() {
        let calls = AtomicUsize::new(0);
        let value = poll_until(1_000, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(if n >= 2 { Some(n) } else { None }) }
        })
        .await
        .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_poll_until_times_out() {
        let result: SanarResult<()> = poll_until(60, || async { Ok(None) }).await;
        assert!(matches!(result, Err(SanarError::Timeout { ms: 60 })));
    }
}
