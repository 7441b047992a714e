//! Sanar: Self-Healing Selector Resolution and Test Repair
//!
//! Sanar (Spanish: "to heal") keeps browser automation running when the page
//! under test drifts. It has two halves that share one browser abstraction:
//!
//! - **Intent resolution**: a step described in plain words ("click the log
//!   in button") is turned into ranked selector candidates, scored against
//!   the live page, executed, and remembered in a heal store.
//! - **Failure repair**: a proxied page intercepts failing actions, asks a
//!   repair oracle for a corrected step, replays it, records the heal in an
//!   audit log and rewrites the failing source line.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      SANAR Architecture                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐             │
//! │   │ Candidate  │───►│ Scorer     │───►│ Resolver   │──► HealStore│
//! │   │ generator  │    │ (count)    │    │ (act)      │             │
//! │   └────────────┘    └────────────┘    └────────────┘             │
//! │                                             │                    │
//! │   ┌────────────┐    ┌────────────┐    ┌─────▼──────┐             │
//! │   │ HealingPage│───►│ HealClient │───►│ Interpreter│──► Patcher  │
//! │   │ (proxy)    │    │ (oracle)   │    │ (replay)   │    AuditLog │
//! │   └────────────┘    └────────────┘    └────────────┘             │
//! │                          │                                       │
//! │                 BrowserSession (CDP │ mock)                      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Element actions and the calls the proxy replays
pub mod action;

/// Healed-step audit log
pub mod audit;

/// Browser control over CDP (`browser` feature for the live session)
pub mod browser;

/// Selector candidate generation from plain-language targets
pub mod candidate;

/// `sanar.yaml` configuration
pub mod config;

/// DOM snapshot extraction
pub mod dom;

/// The browser session seam
pub mod driver;

/// Persistent intent-to-locator memory
pub mod heal_store;

/// Locators, text matching and call-chain rendering
pub mod locator;

/// In-memory browser session for tests
pub mod mock;

/// Navigation with load-state fallback and degraded mode
pub mod navigation;

/// Source rewriting after a successful repair
pub mod patcher;

/// Self-healing page proxy
pub mod proxy;

/// Repair oracle, heal client and repair interpreter
pub mod repair;

/// Intent resolution over the heal store and candidate scoring
pub mod resolver;

/// Error types
pub mod result;

/// Candidate scoring against the live page
pub mod scorer;

/// Page analysis sessions
pub mod session;

/// Load states and polling
pub mod wait;

pub use action::{render_statements, ActionCall, ActionKind, HealableAction};
pub use audit::{AuditLog, HealedStepLogEntry, DEFAULT_AUDIT_LOG_PATH};
pub use browser::BrowserConfig;
#[cfg(feature = "browser")]
pub use browser::{Browser, CdpSession};
pub use candidate::{generate_candidates, CandidateSet, SelectorCandidate, Strategy};
pub use config::{HealConfig, HighlightConfig, OracleConfig, DEFAULT_CONFIG_FILE};
pub use dom::{DomSnapshot, ElementKind, ElementRecord, FormField, EXTRACTION_SCRIPT};
#[cfg(feature = "browser")]
pub use driver::HttpFetcher;
pub use driver::{BrowserSession, HtmlFetcher};
pub use heal_store::{HealDescriptor, HealStore, DEFAULT_HEAL_STORE_PATH};
pub use locator::{Dialect, Locator, Refinement, Selector, TextMatch};
pub use mock::{MockElement, MockFetcher, MockSession};
pub use navigation::{NavigateOptions, NavigationOutcome, Navigator};
pub use patcher::FilePatcher;
pub use proxy::{HealingLocator, HealingPage, StepResult};
#[cfg(feature = "llm")]
pub use repair::LlmOracle;
pub use repair::{interpret, HealClient, ModelConfig, RepairOracle, ScriptedOracle};
pub use resolver::{Resolution, ResolutionSource, Resolver};
pub use result::{SanarError, SanarResult, StackFrame, StepFailure};
pub use scorer::{score_candidates, ScoredCandidate};
pub use session::{AnalysisStep, PageAnalysisSession, StepReport};
pub use wait::LoadState;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod reexport_tests {
        use super::*;

        #[test]
        fn test_error_display() {
            let err = SanarError::Timeout { ms: 5000 };
            assert!(err.to_string().contains("5000"));
        }

        #[test]
        fn test_locator_display_through_root() {
            let locator = Locator::from_selector(Selector::role_named("button", "Submit"));
            assert_eq!(locator.to_string(), "getByRole('button', { name: 'Submit' })");
        }
    }
}
