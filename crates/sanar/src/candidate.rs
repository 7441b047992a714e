//! Selector candidate generation from a textual target.
//!
//! A described step such as `fill "username field"` is turned into two
//! ordered lists of [`SelectorCandidate`]s:
//!
//! 1. **semantic** candidates built from the target's meaningful words
//!    (label lookup, ARIA role + accessible name), tried in order;
//! 2. **heuristic** candidates from a keyword table plus generic
//!    id/name/test-id/text/positional fallbacks, scored against the live
//!    DOM before being tried.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::ActionKind;
use crate::dom::{css_quote, is_css_ident};
use crate::heal_store::HealDescriptor;
use crate::locator::{Locator, Selector, TextMatch};

/// Words that describe the kind of control rather than which one
const GENERIC_WORDS: &[&str] = &[
    "a", "an", "the", "on", "into", "to", "of", "for", "field", "input", "box", "textbox",
    "text", "button", "btn", "link", "dropdown", "select", "menu", "option", "control", "click",
    "enter", "type", "fill", "element",
];

/// How a candidate locates its element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Associated label text
    Label,
    /// ARIA role and accessible name
    Role,
    /// CSS attribute selector
    Css,
    /// Visible text
    Text,
    /// Generic or positional guess
    Generic,
}

impl Strategy {
    /// Rank used by the scorer: label/role > css > text > generic
    #[must_use]
    pub const fn rank(&self) -> i32 {
        match self {
            Self::Label | Self::Role => 40,
            Self::Css => 30,
            Self::Text => 20,
            Self::Generic => 10,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Label => "label",
            Self::Role => "role",
            Self::Css => "css",
            Self::Text => "text",
            Self::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// One proposed locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorCandidate {
    /// Strategy tag
    pub strategy: Strategy,
    /// Compiled locator
    pub locator: Locator,
    /// Higher is preferred
    pub priority: i32,
}

impl SelectorCandidate {
    /// Create a candidate with the strategy's default priority
    #[must_use]
    pub fn new(strategy: Strategy, locator: Locator) -> Self {
        Self {
            strategy,
            priority: strategy.rank(),
            locator,
        }
    }

    fn css(strategy: Strategy, selector: impl Into<String>) -> Self {
        Self::new(strategy, Locator::new(selector))
    }

    /// Compact descriptor for the heal store, if the locator is replayable
    #[must_use]
    pub fn descriptor(&self) -> Option<HealDescriptor> {
        HealDescriptor::from_locator(&self.locator)
    }
}

impl fmt::Display for SelectorCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}] {}", self.strategy, self.priority, self.locator)
    }
}

/// Candidates for one target, split by phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    /// Label/role lookups, tried in order
    pub semantic: Vec<SelectorCandidate>,
    /// Keyword and generic selectors, scored before trying
    pub heuristic: Vec<SelectorCandidate>,
}

impl CandidateSet {
    /// Both phases in generation order
    #[must_use]
    pub fn ordered(&self) -> Vec<SelectorCandidate> {
        self.semantic.iter().chain(&self.heuristic).cloned().collect()
    }

    /// Total number of candidates
    #[must_use]
    pub fn len(&self) -> usize {
        self.semantic.len() + self.heuristic.len()
    }

    /// Whether no candidate was produced
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_heuristic(&mut self, candidate: SelectorCandidate) {
        if !self.heuristic.iter().any(|c| c.locator == candidate.locator) {
            self.heuristic.push(candidate);
        }
    }
}

/// Meaningful words of a target, lower-cased, generic words removed.
///
/// Falls back to all words when every word is generic.
#[must_use]
pub fn core_words(target: &str) -> Vec<String> {
    let words: Vec<String> = target
        .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let core: Vec<String> = words
        .iter()
        .filter(|w| !GENERIC_WORDS.contains(&w.as_str()))
        .cloned()
        .collect();
    if core.is_empty() {
        words
    } else {
        core
    }
}

/// Case-insensitive regex source for the core words, tolerant to spacing
#[must_use]
pub fn name_pattern(target: &str) -> String {
    core_words(target)
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join(r"[\s_-]*")
}

/// Generate the candidates for `target` under `kind`
#[must_use]
pub fn generate_candidates(target: &str, kind: ActionKind) -> CandidateSet {
    let words = core_words(target);
    let mut set = CandidateSet::default();
    if words.is_empty() {
        return set;
    }
    let pattern = name_pattern(target);
    let phrase = words.join(" ");
    set.semantic = semantic_candidates(&pattern, kind);

    let has = |needles: &[&str]| words.iter().any(|w| needles.contains(&w.as_str()));
    let joined = words.concat();

    if (kind == ActionKind::Fill && has(&["username", "email", "user", "login"]))
        || joined.contains("username")
    {
        let username = [
            "#username",
            "[name=\"username\"]",
            "input[autocomplete=\"username\"]",
            "input[placeholder*=\"user\" i]",
        ];
        let email = [
            "#email",
            "[name=\"email\"]",
            "input[type=\"email\"]",
            "input[placeholder*=\"email\" i]",
        ];
        // The field the target names wins ties against its sibling.
        let (first, second) = if has(&["email"]) && !joined.contains("username") {
            (email, username)
        } else {
            (username, email)
        };
        for css in first.into_iter().chain(second) {
            set.push_heuristic(SelectorCandidate::css(Strategy::Css, css));
        }
    }
    if has(&["password", "passwd", "pass"]) {
        for c in [
            SelectorCandidate::css(Strategy::Css, "#password"),
            SelectorCandidate::css(Strategy::Css, "[name=\"password\"]"),
            SelectorCandidate::css(Strategy::Css, "input[type=\"password\"]"),
            SelectorCandidate::css(Strategy::Css, "input[placeholder*=\"password\" i]"),
        ] {
            set.push_heuristic(c);
        }
    }
    if kind == ActionKind::Click && (has(&["submit", "login", "signin", "continue"]) || is_sign_in(&words)) {
        set.push_heuristic(SelectorCandidate::new(
            Strategy::Role,
            Locator::from_selector(Selector::role_named(
                "button",
                TextMatch::pattern_ci(r"submit|log\s*in|sign\s*in|continue"),
            )),
        ));
        set.push_heuristic(SelectorCandidate::css(Strategy::Css, "button[type=\"submit\"]"));
        set.push_heuristic(SelectorCandidate::css(Strategy::Css, "input[type=\"submit\"]"));
    }
    if has(&["search", "query"]) {
        for c in [
            SelectorCandidate::css(Strategy::Css, "input[type=\"search\"]"),
            SelectorCandidate::css(Strategy::Css, "[role=\"searchbox\"]"),
            SelectorCandidate::css(Strategy::Css, "[name=\"q\"]"),
            SelectorCandidate::css(Strategy::Css, "[name=\"search\"]"),
        ] {
            set.push_heuristic(c);
        }
    }

    for c in generic_candidates(&words, &phrase, kind) {
        set.push_heuristic(c);
    }
    set
}

fn is_sign_in(words: &[String]) -> bool {
    words
        .windows(2)
        .any(|w| matches!((w[0].as_str(), w[1].as_str()), ("sign" | "log", "in")))
}

fn semantic_candidates(pattern: &str, kind: ActionKind) -> Vec<SelectorCandidate> {
    let label = || {
        SelectorCandidate::new(
            Strategy::Label,
            Locator::from_selector(Selector::Label(TextMatch::pattern_ci(pattern))),
        )
    };
    let role = |role: &str| {
        SelectorCandidate::new(
            Strategy::Role,
            Locator::from_selector(Selector::role_named(role, TextMatch::pattern_ci(pattern))),
        )
    };
    match kind {
        ActionKind::Fill => vec![label(), role("textbox")],
        ActionKind::Select => vec![label(), role("combobox")],
        ActionKind::Click => vec![role("button"), role("link"), label()],
    }
}

fn generic_candidates(words: &[String], phrase: &str, kind: ActionKind) -> Vec<SelectorCandidate> {
    let slug = words.join("-");
    let compact = words.concat();
    let mut out = Vec::new();
    for key in [&slug, &compact] {
        if is_css_ident(key) {
            out.push(SelectorCandidate::css(Strategy::Generic, format!("#{key}")));
        } else {
            out.push(SelectorCandidate::css(Strategy::Generic, format!("[id={}]", css_quote(key))));
        }
        out.push(SelectorCandidate::css(Strategy::Generic, format!("[name={}]", css_quote(key))));
        out.push(SelectorCandidate::css(
            Strategy::Generic,
            format!("[data-testid={}]", css_quote(key)),
        ));
    }
    match kind {
        ActionKind::Fill => {
            out.push(SelectorCandidate::css(
                Strategy::Css,
                format!("input[placeholder*={} i]", css_quote(phrase)),
            ));
            out.push(SelectorCandidate::css(
                Strategy::Css,
                format!("textarea[placeholder*={} i]", css_quote(phrase)),
            ));
        }
        ActionKind::Click => {
            for tag in ["button", "a", "[role=\"button\"]"] {
                out.push(SelectorCandidate::css(
                    Strategy::Text,
                    format!("{tag}:has-text({})", css_quote(phrase)),
                ));
            }
        }
        ActionKind::Select => {}
    }
    let positional = match kind {
        ActionKind::Fill => "input",
        ActionKind::Select => "select",
        ActionKind::Click => "button",
    };
    out.push(SelectorCandidate::css(
        Strategy::Generic,
        format!("{positional}:nth-child(1)"),
    ));
    out
}
