//! Runtime self-healing proxy for directly-authored automation code.
//!
//! [`HealingPage`] and the [`HealingLocator`]s it hands out expose the
//! healable action set. Every action goes through one dispatch path:
//!
//! ```text
//! highlight ─► delegate ─► ok
//!                 │
//!                 └─ error ─► snapshot ─► oracle ─► interpret ─► execute ─► ok
//!                                           │           │           │      (audit + patch)
//!                                           └───────────┴───────────┴─► original error
//! ```
//!
//! Action methods are `#[track_caller]`, so a failure is reported as a
//! [`StepFailure`] whose stack names the test line that issued the call,
//! and that same line is what gets patched after a successful repair.

use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::action::{render_statements, ActionCall, HealableAction};
use crate::audit::{AuditLog, HealedStepLogEntry};
use crate::config::{HealConfig, HighlightConfig};
use crate::dom::{self, DomSnapshot};
use crate::driver::BrowserSession;
use crate::locator::{Dialect, Locator, Selector, TextMatch, LOCATOR_PRELUDE};
use crate::navigation::NavigateOptions;
use crate::patcher::{locate_source, FilePatcher};
use crate::repair::{interpret, HealClient};
use crate::result::{SanarError, SanarResult, StackFrame, StepFailure};

/// Result of a proxied action
pub type StepResult = Result<(), StepFailure>;

/// Script outlining the first match of `locator` for `duration_ms`
fn highlight_script(locator: &Locator, duration_ms: u64) -> String {
    format!(
        "(() => {{ {LOCATOR_PRELUDE}; \
         const el = __sanar.resolve({spec})[0]; \
         if (!el) return false; \
         const outline = el.style.outline, shadow = el.style.boxShadow; \
         el.style.outline = '3px solid #ff4081'; \
         el.style.boxShadow = '0 0 12px #ff4081'; \
         setTimeout(() => {{ el.style.outline = outline; el.style.boxShadow = shadow; }}, {duration_ms}); \
         return true; }})()",
        spec = locator.to_spec()
    )
}

#[derive(Debug, Clone)]
struct Healer {
    client: Option<HealClient>,
    audit: Option<AuditLog>,
    patcher: Option<FilePatcher>,
    action_timeout_ms: u64,
    navigation: NavigateOptions,
    highlight: HighlightConfig,
}

impl Default for Healer {
    fn default() -> Self {
        let config = HealConfig::default();
        Self {
            client: None,
            audit: None,
            patcher: None,
            action_timeout_ms: config.action_timeout_ms,
            navigation: config.navigation,
            highlight: config.highlight,
        }
    }
}

/// A page whose actions heal themselves
pub struct HealingPage<S: ?Sized> {
    session: Arc<S>,
    healer: Arc<Healer>,
}

impl<S: ?Sized> Clone for HealingPage<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            healer: Arc::clone(&self.healer),
        }
    }
}

impl<S: ?Sized> std::fmt::Debug for HealingPage<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealingPage")
            .field("healer", &self.healer)
            .finish_non_exhaustive()
    }
}

impl<S: BrowserSession + ?Sized> HealingPage<S> {
    /// Wrap a shared session. No oracle, audit log or patching until
    /// configured.
    #[must_use]
    pub fn from_arc(session: Arc<S>) -> Self {
        Self {
            session,
            healer: Arc::new(Healer::default()),
        }
    }

    /// Wrap a shared session with everything `config` enables; the oracle
    /// is attached separately with [`Self::with_oracle`]
    #[must_use]
    pub fn from_arc_with_config(session: Arc<S>, config: &HealConfig) -> Self {
        let healer = Healer {
            client: None,
            audit: Some(AuditLog::new(&config.audit_log_path)),
            patcher: config
                .patch_sources
                .then(|| FilePatcher::new(config.page_ident.clone())),
            action_timeout_ms: config.action_timeout_ms,
            navigation: config.navigation,
            highlight: config.highlight,
        };
        Self {
            session,
            healer: Arc::new(healer),
        }
    }

    fn healer_mut(&mut self) -> &mut Healer {
        Arc::make_mut(&mut self.healer)
    }

    /// Repair failures through `client`
    #[must_use]
    pub fn with_oracle(mut self, client: HealClient) -> Self {
        self.healer_mut().client = Some(client);
        self
    }

    /// Record healed steps in `log`
    #[must_use]
    pub fn with_audit_log(mut self, log: AuditLog) -> Self {
        self.healer_mut().audit = Some(log);
        self
    }

    /// Patch source lines after successful repairs
    #[must_use]
    pub fn with_patcher(mut self, patcher: FilePatcher) -> Self {
        self.healer_mut().patcher = Some(patcher);
        self
    }

    /// Never touch source files
    #[must_use]
    pub fn without_patching(mut self) -> Self {
        self.healer_mut().patcher = None;
        self
    }

    /// Set the highlight
    #[must_use]
    pub fn with_highlight(mut self, highlight: HighlightConfig) -> Self {
        self.healer_mut().highlight = highlight;
        self
    }

    /// Disable the highlight
    #[must_use]
    pub fn without_highlight(mut self) -> Self {
        self.healer_mut().highlight.enabled = false;
        self
    }

    /// Set the per-action timeout
    #[must_use]
    pub fn with_action_timeout_ms(mut self, ms: u64) -> Self {
        self.healer_mut().action_timeout_ms = ms;
        self
    }

    /// The wrapped session
    #[must_use]
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Current URL
    pub async fn url(&self) -> SanarResult<String> {
        self.session.current_url().await
    }

    /// Current DOM snapshot
    pub async fn snapshot(&self) -> DomSnapshot {
        dom::extract(&*self.session).await
    }

    fn wrap(&self, locator: Locator) -> HealingLocator<S> {
        HealingLocator {
            page: self.clone(),
            locator,
        }
    }

    /// CSS locator
    #[must_use]
    pub fn locator(&self, css: impl Into<String>) -> HealingLocator<S> {
        self.wrap(Locator::new(css))
    }

    /// Locator by ARIA role
    #[must_use]
    pub fn get_by_role(&self, role: impl Into<String>) -> HealingLocator<S> {
        self.wrap(Locator::from_selector(Selector::role(role)))
    }

    /// Locator by ARIA role and accessible name
    #[must_use]
    pub fn get_by_role_named(
        &self,
        role: impl Into<String>,
        name: impl Into<TextMatch>,
    ) -> HealingLocator<S> {
        self.wrap(Locator::from_selector(Selector::role_named(role, name)))
    }

    /// Locator by associated label text
    #[must_use]
    pub fn get_by_label(&self, text: impl Into<TextMatch>) -> HealingLocator<S> {
        self.wrap(Locator::from_selector(Selector::Label(text.into())))
    }

    /// Locator by visible text
    #[must_use]
    pub fn get_by_text(&self, text: impl Into<TextMatch>) -> HealingLocator<S> {
        self.wrap(Locator::from_selector(Selector::Text(text.into())))
    }

    /// Locator by placeholder
    #[must_use]
    pub fn get_by_placeholder(&self, text: impl Into<TextMatch>) -> HealingLocator<S> {
        self.wrap(Locator::from_selector(Selector::Placeholder(text.into())))
    }

    /// Locator by `data-testid`
    #[must_use]
    pub fn get_by_test_id(&self, id: impl Into<String>) -> HealingLocator<S> {
        self.wrap(Locator::from_selector(Selector::TestId(id.into())))
    }

    /// Navigate
    #[track_caller]
    pub fn goto(&self, url: &str) -> impl Future<Output = StepResult> + Send + '_ {
        let frame = StackFrame::from(Location::caller());
        self.run(ActionCall::goto(url), frame)
    }

    /// Click the first element matching `selector`
    #[track_caller]
    pub fn click(&self, selector: &str) -> impl Future<Output = StepResult> + Send + '_ {
        let frame = StackFrame::from(Location::caller());
        self.run(ActionCall::on(Locator::new(selector), HealableAction::Click), frame)
    }

    /// Fill the first element matching `selector`
    #[track_caller]
    pub fn fill(&self, selector: &str, value: &str) -> impl Future<Output = StepResult> + Send + '_ {
        let frame = StackFrame::from(Location::caller());
        let action = HealableAction::Fill(value.to_string());
        self.run(ActionCall::on(Locator::new(selector), action), frame)
    }

    /// Check the first element matching `selector`
    #[track_caller]
    pub fn check(&self, selector: &str) -> impl Future<Output = StepResult> + Send + '_ {
        let frame = StackFrame::from(Location::caller());
        self.run(ActionCall::on(Locator::new(selector), HealableAction::Check), frame)
    }

    /// Select an option in the first element matching `selector`
    #[track_caller]
    pub fn select_option(
        &self,
        selector: &str,
        value: &str,
    ) -> impl Future<Output = StepResult> + Send + '_ {
        let frame = StackFrame::from(Location::caller());
        let action = HealableAction::SelectOption(value.to_string());
        self.run(ActionCall::on(Locator::new(selector), action), frame)
    }

    /// Hover the first element matching `selector`
    #[track_caller]
    pub fn hover(&self, selector: &str) -> impl Future<Output = StepResult> + Send + '_ {
        let frame = StackFrame::from(Location::caller());
        self.run(ActionCall::on(Locator::new(selector), HealableAction::Hover), frame)
    }

    /// Dispatch `call`, attributing failures and patches to `frame`
    pub async fn run(&self, call: ActionCall, frame: StackFrame) -> StepResult {
        if let Some(locator) = &call.locator {
            self.highlight(locator).await;
        }
        let Err(error) = self.execute(&call).await else {
            return Ok(());
        };
        let step = call.to_string();
        debug!(step = %step, error = %error, "Step failed, attempting repair");
        if self.repair(&step, &error, &frame).await {
            Ok(())
        } else {
            Err(StepFailure::at(error, step, &frame))
        }
    }

    async fn highlight(&self, locator: &Locator) {
        let highlight = self.healer.highlight;
        if !highlight.enabled {
            return;
        }
        match self
            .session
            .evaluate(&highlight_script(locator, highlight.duration_ms))
            .await
        {
            Ok(_) => tokio::time::sleep(Duration::from_millis(highlight.duration_ms)).await,
            Err(e) => debug!(locator = %locator, error = %e, "Highlight skipped"),
        }
    }

    async fn execute(&self, call: &ActionCall) -> SanarResult<()> {
        match (&call.locator, &call.action) {
            (_, HealableAction::Goto(url)) => {
                let nav = self.healer.navigation;
                self.session.goto(url, nav.wait_until, nav.timeout_ms).await
            }
            (Some(locator), action) => {
                self.session
                    .perform(locator, action, self.healer.action_timeout_ms)
                    .await
            }
            (None, action) => Err(SanarError::action(action.method(), "no target element")),
        }
    }

    /// Oracle-driven repair; `true` when the repaired calls all succeeded
    async fn repair(&self, step: &str, error: &SanarError, frame: &StackFrame) -> bool {
        let Some(client) = &self.healer.client else {
            return false;
        };
        let snapshot = dom::extract(&*self.session).await;
        let Some(code) = client.heal(&snapshot, &error.to_string(), step).await else {
            return false;
        };
        let calls = match interpret(&code) {
            Ok(calls) => calls,
            Err(e) => {
                warn!(step, code = %code, error = %e, "Repair rejected");
                return false;
            }
        };
        for call in &calls {
            if let Err(e) = self.execute(call).await {
                warn!(step, repair = %call, error = %e, "Repaired step failed too");
                return false;
            }
        }

        let healed_code = render_statements(&calls, Dialect::Playwright, "page");
        info!(step, healed = %healed_code, "Step healed");
        if let Some(audit) = &self.healer.audit {
            let url = match self.session.current_url().await {
                Ok(url) => url,
                Err(_) => snapshot.url.clone(),
            };
            let entry = HealedStepLogEntry::now(step, error.to_string(), &healed_code, url);
            if let Err(e) = audit.append(&entry) {
                warn!(path = %audit.path().display(), error = %e, "Could not write audit log");
            }
        }
        if let Some(patcher) = &self.healer.patcher {
            self.patch_source(patcher, frame, &calls);
        }
        true
    }

    fn patch_source(&self, patcher: &FilePatcher, frame: &StackFrame, calls: &[ActionCall]) {
        let Some(path) = locate_source(&frame.file) else {
            warn!(file = %frame.file, "Source file not found, not patching");
            return;
        };
        patcher.patch(&path, &frame.to_string(), calls);
    }
}

impl<S: BrowserSession> HealingPage<S> {
    /// Wrap a session. No oracle, audit log or patching until configured.
    #[must_use]
    pub fn new(session: S) -> Self {
        Self::from_arc(Arc::new(session))
    }

    /// Wrap a session with everything `config` enables
    #[must_use]
    pub fn with_config(session: S, config: &HealConfig) -> Self {
        Self::from_arc_with_config(Arc::new(session), config)
    }
}

/// A locator whose actions heal themselves
pub struct HealingLocator<S: ?Sized> {
    page: HealingPage<S>,
    locator: Locator,
}

impl<S: ?Sized> Clone for HealingLocator<S> {
    fn clone(&self) -> Self {
        Self {
            page: self.page.clone(),
            locator: self.locator.clone(),
        }
    }
}

impl<S: ?Sized> std::fmt::Debug for HealingLocator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealingLocator")
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

impl<S: BrowserSession + ?Sized> HealingLocator<S> {
    fn refined(&self, locator: Locator) -> Self {
        Self {
            page: self.page.clone(),
            locator,
        }
    }

    /// The underlying locator
    #[must_use]
    pub const fn as_locator(&self) -> &Locator {
        &self.locator
    }

    /// The n-th match; negative counts from the end
    #[must_use]
    pub fn nth(&self, index: i32) -> Self {
        self.refined(self.locator.clone().nth(index))
    }

    /// The first match
    #[must_use]
    pub fn first(&self) -> Self {
        self.refined(self.locator.clone().first())
    }

    /// The last match
    #[must_use]
    pub fn last(&self) -> Self {
        self.refined(self.locator.clone().last())
    }

    /// Matches containing `text`
    #[must_use]
    pub fn filter_has_text(&self, text: impl Into<TextMatch>) -> Self {
        self.refined(self.locator.clone().filter_has_text(text))
    }

    /// Parent elements of the matches
    #[must_use]
    pub fn parent(&self) -> Self {
        self.refined(self.locator.clone().parent())
    }

    /// Current match count (not healed)
    pub async fn count(&self) -> SanarResult<usize> {
        self.page.session.count(&self.locator).await
    }

    fn act(
        &self,
        action: HealableAction,
        frame: StackFrame,
    ) -> impl Future<Output = StepResult> + Send + '_ {
        self.page
            .run(ActionCall::on(self.locator.clone(), action), frame)
    }

    /// Click
    #[track_caller]
    pub fn click(&self) -> impl Future<Output = StepResult> + Send + '_ {
        self.act(HealableAction::Click, StackFrame::from(Location::caller()))
    }

    /// Fill with `value`
    #[track_caller]
    pub fn fill(&self, value: &str) -> impl Future<Output = StepResult> + Send + '_ {
        let action = HealableAction::Fill(value.to_string());
        self.act(action, StackFrame::from(Location::caller()))
    }

    /// Check
    #[track_caller]
    pub fn check(&self) -> impl Future<Output = StepResult> + Send + '_ {
        self.act(HealableAction::Check, StackFrame::from(Location::caller()))
    }

    /// Select the option with `value` (or label)
    #[track_caller]
    pub fn select_option(&self, value: &str) -> impl Future<Output = StepResult> + Send + '_ {
        let action = HealableAction::SelectOption(value.to_string());
        self.act(action, StackFrame::from(Location::caller()))
    }

    /// Hover
    #[track_caller]
    pub fn hover(&self) -> impl Future<Output = StepResult> + Send + '_ {
        self.act(HealableAction::Hover, StackFrame::from(Location::caller()))
    }
}
