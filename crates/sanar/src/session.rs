//! Page analysis sessions.
//!
//! A [`PageAnalysisSession`] owns one browser session: it navigates once to
//! a base URL, then runs described steps through the [`Resolver`], taking a
//! DOM snapshot after each. The session must be closed explicitly to flush
//! the heal store and release the browser.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::action::ActionKind;
use crate::config::HealConfig;
use crate::dom::{self, DomSnapshot};
use crate::driver::{BrowserSession, HtmlFetcher};
use crate::heal_store::HealStore;
use crate::navigation::{NavigationOutcome, Navigator};
use crate::resolver::Resolver;
use crate::result::{SanarError, SanarResult};

/// A described step: `kind:target[=value]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStep {
    /// Action kind
    pub kind: ActionKind,
    /// Natural-language target, e.g. "username field"
    pub target: String,
    /// Value for fill/select
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl AnalysisStep {
    /// Step without a value
    #[must_use]
    pub fn new(kind: ActionKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            value: None,
        }
    }

    /// Attach a value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl FromStr for AnalysisStep {
    type Err = SanarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s
            .split_once(':')
            .ok_or_else(|| SanarError::config(format!("step '{s}' is not kind:target[=value]")))?;
        let kind: ActionKind = kind.parse()?;
        let (target, value) = match rest.split_once('=') {
            Some((target, value)) => (target, Some(value.to_string())),
            None => (rest, None),
        };
        let target = target.trim();
        if target.is_empty() {
            return Err(SanarError::config(format!("step '{s}' has no target")));
        }
        Ok(Self {
            kind,
            target: target.to_string(),
            value,
        })
    }
}

impl fmt::Display for AnalysisStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.target)?;
        if let Some(value) = &self.value {
            write!(f, "={value}")?;
        }
        Ok(())
    }
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    /// Zero-based position in the session
    pub step_index: usize,
    /// URL after the step
    pub url: String,
    /// Action kind
    pub action: ActionKind,
    /// Target text
    pub target: String,
    /// Whether a locator was found and acted on
    pub resolved: bool,
    /// DOM after the step
    pub snapshot: DomSnapshot,
}

/// One base navigation plus described steps over a single page
pub struct PageAnalysisSession<S: ?Sized> {
    session: Arc<S>,
    navigator: Navigator,
    resolver: Resolver,
    action_timeout_ms: u64,
    outcome: Option<NavigationOutcome>,
    base: Option<DomSnapshot>,
    reports: Vec<StepReport>,
}

impl<S: ?Sized> fmt::Debug for PageAnalysisSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageAnalysisSession")
            .field("navigator", &self.navigator)
            .field("outcome", &self.outcome)
            .field("steps", &self.reports.len())
            .finish_non_exhaustive()
    }
}

impl<S: BrowserSession + ?Sized> PageAnalysisSession<S> {
    /// Session over `session` with explicit collaborators
    #[must_use]
    pub fn new(session: Arc<S>, navigator: Navigator, resolver: Resolver, action_timeout_ms: u64) -> Self {
        Self {
            session,
            navigator,
            resolver,
            action_timeout_ms,
            outcome: None,
            base: None,
            reports: Vec::new(),
        }
    }

    /// Session configured from `config`; the heal store is loaded from the
    /// configured path
    #[must_use]
    pub fn from_config(session: Arc<S>, config: &HealConfig) -> Self {
        let resolver = Resolver::new(HealStore::open(&config.heal_store_path))
            .with_persistence(config.persist_heals);
        Self::new(
            session,
            Navigator::new(config.navigation),
            resolver,
            config.action_timeout_ms,
        )
    }

    /// Enable degraded-mode navigation
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn HtmlFetcher>) -> Self {
        self.navigator = self.navigator.with_fetcher(fetcher);
        self
    }

    /// The browser session
    #[must_use]
    pub fn session(&self) -> &S {
        &self.session
    }

    /// The resolver and its heal store
    #[must_use]
    pub const fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// How the base navigation completed
    #[must_use]
    pub const fn outcome(&self) -> Option<NavigationOutcome> {
        self.outcome
    }

    /// Snapshot taken after the base navigation
    #[must_use]
    pub const fn base_snapshot(&self) -> Option<&DomSnapshot> {
        self.base.as_ref()
    }

    /// Reports of the steps run so far
    #[must_use]
    pub fn reports(&self) -> &[StepReport] {
        &self.reports
    }

    /// Navigate to the base URL and snapshot it
    pub async fn open(&mut self, url: &str) -> SanarResult<&DomSnapshot> {
        let outcome = self.navigator.navigate(&*self.session, url).await?;
        info!(url, %outcome, "Analysis session opened");
        self.outcome = Some(outcome);
        let snapshot = dom::extract(&*self.session).await;
        Ok(self.base.insert(snapshot))
    }

    /// Resolve and act on one described step, then snapshot
    pub async fn step(&mut self, step: &AnalysisStep) -> &StepReport {
        let resolved = self
            .resolver
            .resolve_and_act(
                &*self.session,
                step.kind,
                &step.target,
                step.value.as_deref(),
                self.action_timeout_ms,
            )
            .await;
        if !resolved {
            warn!(step = %step, "Step could not be resolved");
        }
        let snapshot = dom::extract(&*self.session).await;
        let url = match self.session.current_url().await {
            Ok(url) => url,
            Err(_) => snapshot.url.clone(),
        };
        let report = StepReport {
            step_index: self.reports.len(),
            url,
            action: step.kind,
            target: step.target.clone(),
            resolved,
            snapshot,
        };
        self.reports.push(report);
        let last = self.reports.len() - 1;
        &self.reports[last]
    }

    /// Open `url` and run every step in order
    pub async fn run(&mut self, url: &str, steps: &[AnalysisStep]) -> SanarResult<&[StepReport]> {
        self.open(url).await?;
        for step in steps {
            self.step(step).await;
        }
        Ok(&self.reports)
    }

    /// Flush the heal store and close the browser
    pub async fn close(mut self) -> SanarResult<()> {
        if let Err(e) = self.resolver.store_mut().flush() {
            warn!(error = %e, "Heal store flush failed at teardown");
        }
        self.session.close().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::heal_store::HealDescriptor;
    use crate::mock::{MockElement, MockFetcher, MockSession};
    use crate::navigation::NavigateOptions;
    use crate::wait::LoadState;
    use tempfile::TempDir;

    fn login_page() -> MockSession {
        MockSession::new()
            .with_element(MockElement::new("input").id("user").label("Username"))
            .with_element(MockElement::new("input").attr("type", "password").attr("name", "password"))
            .with_element(MockElement::new("button").attr("type", "submit").text("Log in"))
    }

    mod step_parse_tests {
        use super::*;

        #[test]
        fn test_parse_with_value() {
            let step: AnalysisStep = "fill:username field=bob".parse().unwrap();
            assert_eq!(step, AnalysisStep::new(ActionKind::Fill, "username field").with_value("bob"));
            assert_eq!(step.to_string(), "fill:username field=bob");
        }

        #[test]
        fn test_parse_click() {
            let step: AnalysisStep = "click: Log in ".parse().unwrap();
            assert_eq!(step.target, "Log in");
            assert_eq!(step.value, None);
        }

        #[test]
        fn test_parse_errors() {
            assert!("username".parse::<AnalysisStep>().is_err());
            assert!("drag:thing".parse::<AnalysisStep>().is_err());
            assert!("click:  ".parse::<AnalysisStep>().is_err());
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test]
        async fn test_run_reports_each_step() {
            let page = Arc::new(login_page());
            let mut session = PageAnalysisSession::new(
                page.clone(),
                Navigator::new(NavigateOptions::default()),
                Resolver::new(HealStore::in_memory()),
                1000,
            );
            let steps = vec![
                AnalysisStep::new(ActionKind::Fill, "username").with_value("bob"),
                AnalysisStep::new(ActionKind::Fill, "password").with_value("hunter2"),
                AnalysisStep::new(ActionKind::Click, "log in"),
                AnalysisStep::new(ActionKind::Click, "launch rocket"),
            ];
            let reports = session.run("http://app/login", &steps).await.unwrap();
            assert_eq!(reports.len(), 4);
            assert_eq!(
                reports.iter().map(|r| r.resolved).collect::<Vec<_>>(),
                vec![true, true, true, false]
            );
            assert_eq!(reports[2].step_index, 2);
            assert_eq!(reports[0].url, "http://app/login");
            assert_eq!(reports[0].snapshot.elements.len(), 3);
            assert_eq!(session.base_snapshot().unwrap().elements.len(), 3);
            assert_eq!(
                session.outcome(),
                Some(NavigationOutcome::Live {
                    strategy: LoadState::Load,
                    attempt: 0
                })
            );
            assert_eq!(page.value_of(&crate::Locator::new("#user")).as_deref(), Some("bob"));
        }

        #[tokio::test]
        async fn test_degraded_base_navigation() {
            let page = Arc::new(MockSession::new().with_unreachable("http://down/"));
            let fetcher = MockFetcher::new().with_page("http://down/", "<html></html>");
            let config = HealConfig::default()
                .with_navigation(NavigateOptions::default().with_retries(0))
                .with_heal_store_path(TempDir::new().unwrap().path().join("h.json"));
            let mut session = PageAnalysisSession::from_config(page, &config).with_fetcher(Arc::new(fetcher));
            session.open("http://down/").await.unwrap();
            assert_eq!(session.outcome(), Some(NavigationOutcome::Degraded));
        }

        #[tokio::test]
        async fn test_close_flushes_store_and_closes_browser() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("heal.json");
            let page = Arc::new(login_page());
            let config = HealConfig::default().with_heal_store_path(&path);
            let mut session = PageAnalysisSession::from_config(page.clone(), &config);
            session.open("http://app/login").await.unwrap();
            let report = session
                .step(&AnalysisStep::new(ActionKind::Fill, "username").with_value("x"))
                .await;
            assert!(report.resolved);
            session.close().await.unwrap();
            assert!(page.was_called("close"));
            let reloaded = HealStore::open(&path);
            assert!(matches!(
                reloaded.get(ActionKind::Fill, "username"),
                Some(HealDescriptor::Label { .. })
            ));
        }
    }
}
