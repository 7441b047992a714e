//! Browser control over the Chrome `DevTools` Protocol.
//!
//! When compiled with the `browser` feature, [`CdpSession`] implements
//! [`crate::driver::BrowserSession`] on top of chromiumoxide. Element lookup
//! goes through the in-page resolver in [`crate::locator::LOCATOR_PRELUDE`],
//! so a CDP page and the mock agree on what a locator matches. Pointer
//! actions are dispatched as real mouse input; value actions are applied by
//! script followed by `input`/`change` events.

use crate::action::HealableAction;
use crate::locator::{js_string, Locator, LOCATOR_PRELUDE};
use crate::wait::LoadState;

/// Browser configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Remote debugging port (0 = auto-assign)
    pub debug_port: u16,
    /// User agent string
    pub user_agent: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            chromium_path: None,
            debug_port: 0,
            user_agent: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Set the remote debugging port
    #[must_use]
    pub const fn with_debug_port(mut self, port: u16) -> Self {
        self.debug_port = port;
        self
    }

    /// Set user agent
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Expression that is true once the document reached `state`.
///
/// `networkidle` is approximated by `complete` here; the quiet-period check
/// lives in the session, which samples [`RESOURCE_COUNT_SCRIPT`].
#[must_use]
pub fn ready_state_script(state: LoadState) -> &'static str {
    match state {
        LoadState::DomContentLoaded => {
            "document.readyState === 'interactive' || document.readyState === 'complete'"
        }
        LoadState::Load | LoadState::NetworkIdle => "document.readyState === 'complete'",
    }
}

/// Number of resource entries recorded so far
pub const RESOURCE_COUNT_SCRIPT: &str = "performance.getEntriesByType('resource').length";

/// In-page script performing `action` on the first match of `locator`.
///
/// Evaluates to `{ ok, error?, x?, y? }`. Pointer actions only scroll the
/// element into view and report its centre; the caller dispatches the input.
#[must_use]
pub fn action_script(locator: &Locator, action: &HealableAction) -> String {
    let body = match action {
        HealableAction::Click | HealableAction::Hover => "if (el.disabled) return { ok: false, error: 'element is disabled' };
  el.scrollIntoView({ block: 'center', inline: 'center' });
  const r = el.getBoundingClientRect();
  return { ok: true, x: r.left + r.width / 2, y: r.top + r.height / 2 };"
            .to_string(),
        HealableAction::Fill(value) => format!(
            "const fillable = el.tagName === 'TEXTAREA' || el.isContentEditable
    || (el.tagName === 'INPUT' && !['checkbox', 'radio', 'submit', 'button', 'reset', 'image', 'hidden'].includes((el.type || '').toLowerCase()));
  if (!fillable) return {{ ok: false, error: 'element is not fillable' }};
  if (el.disabled || el.readOnly) return {{ ok: false, error: 'element is not editable' }};
  el.focus();
  if (el.isContentEditable) el.textContent = {v}; else el.value = {v};
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return {{ ok: true }};",
            v = js_string(value)
        ),
        HealableAction::Check => "const t = (el.type || '').toLowerCase();
  if (el.tagName !== 'INPUT' || (t !== 'checkbox' && t !== 'radio')) return { ok: false, error: 'element is not a checkbox or radio' };
  if (!el.checked) el.click();
  return el.checked ? { ok: true } : { ok: false, error: 'element did not become checked' };"
            .to_string(),
        HealableAction::SelectOption(value) => format!(
            "if (el.tagName !== 'SELECT') return {{ ok: false, error: 'element is not a select' }};
  const wanted = {v};
  const option = Array.from(el.options).find(o => o.value === wanted || o.label === wanted || o.text.trim() === wanted);
  if (!option) return {{ ok: false, error: 'no option ' + wanted }};
  el.value = option.value;
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return {{ ok: true }};",
            v = js_string(value)
        ),
        HealableAction::Goto(_) => {
            "return { ok: false, error: 'goto is a page action' };".to_string()
        }
    };
    format!(
        "(() => {{ {LOCATOR_PRELUDE}\n  const el = __sanar.resolve({})[0];\n  if (!el) return {{ ok: false, error: 'element detached' }};\n  {body}\n}})()",
        locator.to_spec()
    )
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
mod cdp {
    use super::{action_script, ready_state_script, BrowserConfig, RESOURCE_COUNT_SCRIPT};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
    use chromiumoxide::layout::Point;
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde::Deserialize;
    use tokio::sync::Mutex;
    use tracing::{debug, info};

    use crate::action::HealableAction;
    use crate::driver::BrowserSession;
    use crate::locator::{Locator, DEFAULT_POLL_INTERVAL_MS};
    use crate::result::{SanarError, SanarResult};
    use crate::wait::{poll_until, LoadState, NETWORK_IDLE_THRESHOLD_MS};

    /// Browser instance with real CDP connection
    #[derive(Debug)]
    pub struct Browser {
        config: BrowserConfig,
        inner: Arc<Mutex<CdpBrowser>>,
        handle: tokio::task::JoinHandle<()>,
    }

    impl Browser {
        /// Launch a new browser instance with real CDP
        pub async fn launch(config: BrowserConfig) -> SanarResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.viewport_width, config.viewport_height);

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if config.debug_port != 0 {
                builder = builder.port(config.debug_port);
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            if let Some(ref ua) = config.user_agent {
                builder = builder.arg(format!("--user-agent={ua}"));
            }

            let cdp_config = builder
                .build()
                .map_err(|message| SanarError::BrowserLaunch { message })?;

            let (browser, mut handler) =
                CdpBrowser::launch(cdp_config)
                    .await
                    .map_err(|e| SanarError::BrowserLaunch {
                        message: e.to_string(),
                    })?;

            // Drive the CDP connection until it drops
            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            info!(headless = config.headless, "Browser launched");
            Ok(Self {
                config,
                inner: Arc::new(Mutex::new(browser)),
                handle,
            })
        }

        /// Open a blank page as a session that leaves the browser running
        /// when closed
        pub async fn new_session(&self) -> SanarResult<CdpSession> {
            let browser = self.inner.lock().await;
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| SanarError::page(e.to_string()))?;
            Ok(CdpSession {
                page,
                closed: AtomicBool::new(false),
                owner: None,
            })
        }

        /// Get the browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        /// Close the browser and stop the connection handler
        pub async fn close(&self) -> SanarResult<()> {
            let mut browser = self.inner.lock().await;
            let closed = browser
                .close()
                .await
                .map(|_| ())
                .map_err(|e| SanarError::page(e.to_string()));
            self.handle.abort();
            closed
        }
    }

    /// Result of [`action_script`]
    #[derive(Debug, Deserialize)]
    struct ScriptOutcome {
        ok: bool,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
    }

    /// [`BrowserSession`] over one chromiumoxide page
    #[derive(Debug)]
    pub struct CdpSession {
        page: CdpPage,
        closed: AtomicBool,
        owner: Option<Browser>,
    }

    impl CdpSession {
        /// Launch a dedicated browser; closing the session shuts it down
        pub async fn launch(config: BrowserConfig) -> SanarResult<Self> {
            let browser = Browser::launch(config).await?;
            let mut session = browser.new_session().await?;
            session.owner = Some(browser);
            Ok(session)
        }

        /// Underlying chromiumoxide page
        #[must_use]
        pub const fn page(&self) -> &CdpPage {
            &self.page
        }

        fn ensure_open(&self) -> SanarResult<()> {
            if self.closed.load(Ordering::SeqCst) {
                Err(SanarError::page("page has been closed"))
            } else {
                Ok(())
            }
        }

        async fn eval_bool(&self, script: &str) -> SanarResult<bool> {
            Ok(self.evaluate(script).await?.as_bool().unwrap_or(false))
        }

        async fn resource_count(&self) -> SanarResult<u64> {
            Ok(self.evaluate(RESOURCE_COUNT_SCRIPT).await?.as_u64().unwrap_or(0))
        }

        async fn wait_network_idle(&self, timeout_ms: u64) -> SanarResult<()> {
            let deadline = Instant::now() + Duration::from_millis(timeout_ms);
            let quiet = Duration::from_millis(NETWORK_IDLE_THRESHOLD_MS);
            let mut last = self.resource_count().await?;
            let mut since = Instant::now();
            loop {
                tokio::time::sleep(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)).await;
                let count = self.resource_count().await?;
                if count == last {
                    if since.elapsed() >= quiet {
                        return Ok(());
                    }
                } else {
                    last = count;
                    since = Instant::now();
                }
                if Instant::now() >= deadline {
                    return Err(SanarError::Timeout { ms: timeout_ms });
                }
            }
        }
    }

    #[async_trait]
    impl BrowserSession for CdpSession {
        async fn goto(&self, url: &str, wait_until: LoadState, timeout_ms: u64) -> SanarResult<()> {
            self.ensure_open()?;
            let started = Instant::now();
            let navigate = self.page.execute(NavigateParams::new(url));
            let response = tokio::time::timeout(Duration::from_millis(timeout_ms), navigate)
                .await
                .map_err(|_| SanarError::Timeout { ms: timeout_ms })?
                .map_err(|e| SanarError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            if let Some(message) = response.result.error_text.clone() {
                return Err(SanarError::Navigation {
                    url: url.to_string(),
                    message,
                });
            }
            let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(timeout_ms);
            self.wait_for_load_state(wait_until, timeout_ms.saturating_sub(elapsed).max(1))
                .await?;
            debug!(url, %wait_until, "Navigated");
            Ok(())
        }

        async fn wait_for_load_state(&self, state: LoadState, timeout_ms: u64) -> SanarResult<()> {
            self.ensure_open()?;
            let script = ready_state_script(state);
            let started = Instant::now();
            let this = self;
            poll_until(timeout_ms, move || async move {
                Ok(this.eval_bool(script).await?.then_some(()))
            })
            .await?;
            if state == LoadState::NetworkIdle {
                let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(timeout_ms);
                self.wait_network_idle(timeout_ms.saturating_sub(elapsed).max(1))
                    .await?;
            }
            Ok(())
        }

        async fn count(&self, locator: &Locator) -> SanarResult<usize> {
            self.ensure_open()?;
            let value = self.evaluate(&locator.to_count_query()).await?;
            Ok(value.as_u64().map_or(0, |n| n as usize))
        }

        async fn perform(
            &self,
            locator: &Locator,
            action: &HealableAction,
            timeout_ms: u64,
        ) -> SanarResult<()> {
            if !action.needs_locator() {
                return Err(SanarError::action(action.method(), "not an element action"));
            }
            let this = self;
            poll_until(timeout_ms, move || async move {
                Ok((this.count(locator).await? > 0).then_some(()))
            })
            .await
            .map_err(|e| match e {
                SanarError::Timeout { .. } => SanarError::ElementNotFound {
                    locator: locator.to_string(),
                },
                other => other,
            })?;

            let value = self.evaluate(&action_script(locator, action)).await?;
            let outcome: ScriptOutcome = serde_json::from_value(value)?;
            if !outcome.ok {
                return Err(SanarError::action(
                    action.method(),
                    outcome.error.unwrap_or_else(|| "action rejected".to_string()),
                ));
            }

            let point = Point {
                x: outcome.x,
                y: outcome.y,
            };
            let to_err = |e: chromiumoxide::error::CdpError| {
                SanarError::action(action.method(), e.to_string())
            };
            match action {
                HealableAction::Click => {
                    self.page.click(point).await.map_err(to_err)?;
                }
                HealableAction::Hover => {
                    self.page.move_mouse(point).await.map_err(to_err)?;
                }
                _ => {}
            }
            debug!(locator = %locator, action = action.method(), "Action performed");
            Ok(())
        }

        async fn evaluate(&self, script: &str) -> SanarResult<serde_json::Value> {
            self.ensure_open()?;
            let result = self
                .page
                .evaluate(script)
                .await
                .map_err(|e| SanarError::evaluation(e.to_string()))?;
            Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
        }

        async fn set_content(&self, html: &str) -> SanarResult<()> {
            self.ensure_open()?;
            self.page
                .set_content(html)
                .await
                .map_err(|e| SanarError::page(e.to_string()))?;
            Ok(())
        }

        async fn current_url(&self) -> SanarResult<String> {
            self.ensure_open()?;
            let url = self
                .page
                .url()
                .await
                .map_err(|e| SanarError::page(e.to_string()))?;
            Ok(url.unwrap_or_else(|| "about:blank".to_string()))
        }

        async fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        async fn close(&self) -> SanarResult<()> {
            if self.closed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            let page_closed = self
                .page
                .clone()
                .close()
                .await
                .map_err(|e| SanarError::page(e.to_string()));
            if let Some(browser) = &self.owner {
                browser.close().await?;
            }
            info!("Browser session closed");
            page_closed
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{Browser, CdpSession};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod config_tests {
        use super::*;

        #[test]
        fn test_defaults_and_builders() {
            let config = BrowserConfig::default();
            assert!(config.headless);
            assert!(config.sandbox);
            let config = config
                .with_viewport(800, 600)
                .with_headless(false)
                .with_no_sandbox()
                .with_debug_port(9222)
                .with_chromium_path("/usr/bin/chromium")
                .with_user_agent("sanar");
            assert_eq!((config.viewport_width, config.viewport_height), (800, 600));
            assert!(!config.headless);
            assert!(!config.sandbox);
            assert_eq!(config.debug_port, 9222);
            assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
            assert_eq!(config.user_agent.as_deref(), Some("sanar"));
        }
    }

    mod script_tests {
        use super::*;

        #[test]
        fn test_action_script_resolves_first_match() {
            let script = action_script(&Locator::new("#submit"), &HealableAction::Click);
            assert!(script.starts_with("(() => {"));
            assert!(script.contains("__sanar.resolve("));
            assert!(script.contains("#submit"));
            assert!(script.contains("getBoundingClientRect"));
        }

        #[test]
        fn test_fill_value_is_quoted() {
            let script = action_script(
                &Locator::new("#name"),
                &HealableAction::Fill("O'Brien".into()),
            );
            assert!(script.contains(r"'O\'Brien'"));
            assert!(script.contains("'input'"));
        }

        #[test]
        fn test_select_and_check_bodies() {
            let select = action_script(
                &Locator::new("select"),
                &HealableAction::SelectOption("uk".into()),
            );
            assert!(select.contains("el.options"));
            let check = action_script(&Locator::new("#tos"), &HealableAction::Check);
            assert!(check.contains("checkbox or radio"));
        }

        #[test]
        fn test_ready_state_scripts() {
            assert!(ready_state_script(LoadState::DomContentLoaded).contains("interactive"));
            assert!(!ready_state_script(LoadState::Load).contains("interactive"));
            assert_eq!(
                ready_state_script(LoadState::NetworkIdle),
                ready_state_script(LoadState::Load)
            );
        }
    }
}
