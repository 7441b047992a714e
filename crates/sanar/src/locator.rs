//! Locator abstraction for element selection.
//!
//! A [`Locator`] is a base [`Selector`] plus an ordered list of chain
//! refinements (`nth`, `first`, `last`, `filter`, `parent`). Locators are
//! pure data: the CDP session turns them into an in-page query through
//! [`Locator::to_query_all`], the mock session matches them against its
//! element table, and [`Locator::render`] turns them back into source
//! code for repair prompts and file patches.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};

use regex::{Regex, RegexBuilder};
use serde_json::{json, Value};

/// Default timeout for auto-waiting (5 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default polling interval for auto-waiting (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

type PatternCache = Mutex<HashMap<(String, bool), Option<Regex>>>;

/// Compile a text pattern once per process; invalid sources stay `None`
fn compiled(source: &str, case_insensitive: bool) -> Option<Regex> {
    static CACHE: OnceLock<PatternCache> = OnceLock::new();
    let mut cache = CACHE
        .get_or_init(PatternCache::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    cache
        .entry((source.to_string(), case_insensitive))
        .or_insert_with(|| {
            RegexBuilder::new(source)
                .case_insensitive(case_insensitive)
                .build()
                .ok()
        })
        .clone()
}

/// How a piece of element text is matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TextMatch {
    /// Case-insensitive substring, whitespace-normalized
    Contains(String),
    /// Exact match after whitespace normalization
    Exact(String),
    /// Regular expression
    Pattern {
        /// Regex source
        source: String,
        /// Compile with the `i` flag
        case_insensitive: bool,
    },
}

impl TextMatch {
    /// Exact text match
    #[must_use]
    pub fn exact(text: impl Into<String>) -> Self {
        Self::Exact(text.into())
    }

    /// Regex match. A leading `(?i)` is folded into the case flag.
    #[must_use]
    pub fn pattern(source: impl Into<String>) -> Self {
        let source = source.into();
        match source.strip_prefix("(?i)") {
            Some(rest) => Self::Pattern {
                source: rest.to_string(),
                case_insensitive: true,
            },
            None => Self::Pattern {
                source,
                case_insensitive: false,
            },
        }
    }

    /// Case-insensitive regex match
    #[must_use]
    pub fn pattern_ci(source: impl Into<String>) -> Self {
        Self::Pattern {
            source: source.into(),
            case_insensitive: true,
        }
    }

    /// Test a piece of text against this matcher
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let text = normalize_whitespace(text);
        match self {
            Self::Contains(needle) => text
                .to_lowercase()
                .contains(&normalize_whitespace(needle).to_lowercase()),
            Self::Exact(expected) => text == normalize_whitespace(expected),
            Self::Pattern {
                source,
                case_insensitive,
            } => compiled(source, *case_insensitive).is_some_and(|re| re.is_match(&text)),
        }
    }

    fn to_spec(&self) -> Value {
        match self {
            Self::Contains(value) => json!({ "kind": "contains", "value": value }),
            Self::Exact(value) => json!({ "kind": "exact", "value": value }),
            Self::Pattern {
                source,
                case_insensitive,
            } => json!({ "kind": "pattern", "source": source, "case_insensitive": case_insensitive }),
        }
    }

    fn render(&self, dialect: Dialect) -> String {
        match (dialect, self) {
            (Dialect::Playwright, Self::Contains(s)) => js_string(s),
            (Dialect::Playwright, Self::Exact(s)) => format!("{}, {{ exact: true }}", js_string(s)),
            (
                Dialect::Playwright,
                Self::Pattern {
                    source,
                    case_insensitive,
                },
            ) => format!("/{}/{}", source, if *case_insensitive { "i" } else { "" }),
            (Dialect::Rust, Self::Contains(s)) => format!("{s:?}"),
            (Dialect::Rust, Self::Exact(s)) => format!("TextMatch::exact({s:?})"),
            (
                Dialect::Rust,
                Self::Pattern {
                    source,
                    case_insensitive,
                },
            ) => {
                let flagged = if *case_insensitive {
                    format!("(?i){source}")
                } else {
                    source.clone()
                };
                format!("TextMatch::pattern({flagged:?})")
            }
        }
    }
}

impl From<&str> for TextMatch {
    fn from(value: &str) -> Self {
        Self::Contains(value.to_string())
    }
}

impl From<String> for TextMatch {
    fn from(value: String) -> Self {
        Self::Contains(value)
    }
}

/// Collapse runs of whitespace and trim
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Base selector for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// CSS selector, with Playwright's `:has-text("...")` suffix allowed
    Css(String),
    /// ARIA role, optionally filtered by accessible name
    Role {
        /// Role name (`button`, `textbox`, ...)
        role: String,
        /// Accessible name matcher
        name: Option<TextMatch>,
    },
    /// Associated `<label>` text or `aria-label`
    Label(TextMatch),
    /// Visible text content
    Text(TextMatch),
    /// `placeholder` attribute
    Placeholder(TextMatch),
    /// `data-testid` attribute
    TestId(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a role selector without a name filter
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
        }
    }

    /// Create a role selector filtered by accessible name
    #[must_use]
    pub fn role_named(role: impl Into<String>, name: impl Into<TextMatch>) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
        }
    }

    fn to_spec(&self) -> Value {
        match self {
            Self::Css(css) => json!({ "type": "css", "value": css }),
            Self::Role { role, name } => json!({
                "type": "role",
                "role": role,
                "name": name.as_ref().map(TextMatch::to_spec),
            }),
            Self::Label(m) => json!({ "type": "label", "value": m.to_spec() }),
            Self::Text(m) => json!({ "type": "text", "value": m.to_spec() }),
            Self::Placeholder(m) => json!({ "type": "placeholder", "value": m.to_spec() }),
            Self::TestId(id) => json!({ "type": "test_id", "value": id }),
        }
    }

    fn render(&self, dialect: Dialect) -> String {
        match dialect {
            Dialect::Playwright => match self {
                Self::Css(css) => format!("locator({})", js_string(css)),
                Self::Role { role, name: None } => format!("getByRole({})", js_string(role)),
                Self::Role {
                    role,
                    name: Some(name),
                } => {
                    let name = match name {
                        TextMatch::Exact(s) => format!("name: {}, exact: true", js_string(s)),
                        other => format!("name: {}", other.render(dialect)),
                    };
                    format!("getByRole({}, {{ {name} }})", js_string(role))
                }
                Self::Label(m) => format!("getByLabel({})", m.render(dialect)),
                Self::Text(m) => format!("getByText({})", m.render(dialect)),
                Self::Placeholder(m) => format!("getByPlaceholder({})", m.render(dialect)),
                Self::TestId(id) => format!("getByTestId({})", js_string(id)),
            },
            Dialect::Rust => match self {
                Self::Css(css) => format!("locator({css:?})"),
                Self::Role { role, name: None } => format!("get_by_role({role:?})"),
                Self::Role {
                    role,
                    name: Some(name),
                } => format!("get_by_role_named({role:?}, {})", name.render(dialect)),
                Self::Label(m) => format!("get_by_label({})", m.render(dialect)),
                Self::Text(m) => format!("get_by_text({})", m.render(dialect)),
                Self::Placeholder(m) => format!("get_by_placeholder({})", m.render(dialect)),
                Self::TestId(id) => format!("get_by_test_id({id:?})"),
            },
        }
    }
}

/// A chained narrowing step applied after the base selector
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Refinement {
    /// Pick the n-th match; negative counts from the end
    Nth(i32),
    /// Pick the first match
    First,
    /// Pick the last match
    Last,
    /// Keep matches whose text satisfies the matcher
    Filter(TextMatch),
    /// Replace every match by its parent element
    Parent,
}

impl Refinement {
    fn to_spec(&self) -> Value {
        match self {
            Self::Nth(n) => json!({ "op": "nth", "index": n }),
            Self::First => json!({ "op": "nth", "index": 0 }),
            Self::Last => json!({ "op": "nth", "index": -1 }),
            Self::Filter(m) => json!({ "op": "filter", "has_text": m.to_spec() }),
            Self::Parent => json!({ "op": "parent" }),
        }
    }

    fn render(&self, dialect: Dialect) -> String {
        match (dialect, self) {
            (_, Self::Nth(n)) => format!("nth({n})"),
            (_, Self::First) => "first()".to_string(),
            (_, Self::Last) => "last()".to_string(),
            (Dialect::Playwright, Self::Filter(TextMatch::Exact(s))) => {
                format!("filter({{ hasText: /^{}$/ }})", regex::escape(s))
            }
            (Dialect::Playwright, Self::Filter(m)) => {
                format!("filter({{ hasText: {} }})", m.render(dialect))
            }
            (Dialect::Rust, Self::Filter(m)) => format!("filter_has_text({})", m.render(dialect)),
            (Dialect::Playwright, Self::Parent) => "locator('..')".to_string(),
            (Dialect::Rust, Self::Parent) => "parent()".to_string(),
        }
    }

    /// Apply this refinement to an ordered match list
    pub fn apply<T: Clone>(&self, matches: Vec<T>) -> Vec<T> {
        let pick = |index: i32, matches: Vec<T>| -> Vec<T> {
            let len = matches.len() as i32;
            let idx = if index < 0 { len + index } else { index };
            if idx >= 0 && idx < len {
                vec![matches[idx as usize].clone()]
            } else {
                Vec::new()
            }
        };
        match self {
            Self::Nth(n) => pick(*n, matches),
            Self::First => pick(0, matches),
            Self::Last => pick(-1, matches),
            // Filter and Parent need element data; callers handle them.
            Self::Filter(_) | Self::Parent => matches,
        }
    }
}

/// Source language a locator or call is rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Playwright JavaScript/TypeScript
    Playwright,
    /// Rust calls against the healing proxy
    Rust,
}

impl Dialect {
    /// Pick the dialect for a script path by extension
    #[must_use]
    pub fn for_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("rs") => Self::Rust,
            _ => Self::Playwright,
        }
    }
}

/// A locator: base selector plus chain refinements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    selector: Selector,
    refinements: Vec<Refinement>,
}

impl Locator {
    /// Create a locator with a CSS selector
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self::from_selector(Selector::Css(selector.into()))
    }

    /// Create a locator from a selector
    #[must_use]
    pub fn from_selector(selector: Selector) -> Self {
        Self {
            selector,
            refinements: Vec::new(),
        }
    }

    /// Get the base selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Get the refinements, in application order
    #[must_use]
    pub fn refinements(&self) -> &[Refinement] {
        &self.refinements
    }

    /// Append a refinement
    #[must_use]
    pub fn refine(mut self, refinement: Refinement) -> Self {
        self.refinements.push(refinement);
        self
    }

    /// Narrow to the n-th match
    #[must_use]
    pub fn nth(self, index: i32) -> Self {
        self.refine(Refinement::Nth(index))
    }

    /// Narrow to the first match
    #[must_use]
    pub fn first(self) -> Self {
        self.refine(Refinement::First)
    }

    /// Narrow to the last match
    #[must_use]
    pub fn last(self) -> Self {
        self.refine(Refinement::Last)
    }

    /// Keep matches containing text
    #[must_use]
    pub fn filter_has_text(self, text: impl Into<TextMatch>) -> Self {
        self.refine(Refinement::Filter(text.into()))
    }

    /// Move to the parent of each match
    #[must_use]
    pub fn parent(self) -> Self {
        self.refine(Refinement::Parent)
    }

    /// JSON description consumed by the in-page resolver
    #[must_use]
    pub fn to_spec(&self) -> Value {
        json!({
            "selector": self.selector.to_spec(),
            "refinements": self.refinements.iter().map(Refinement::to_spec).collect::<Vec<_>>(),
        })
    }

    /// JavaScript expression evaluating to the array of matched elements
    #[must_use]
    pub fn to_query_all(&self) -> String {
        format!("{LOCATOR_PRELUDE}\n__sanar.resolve({})", self.to_spec())
    }

    /// JavaScript expression evaluating to the match count
    #[must_use]
    pub fn to_count_query(&self) -> String {
        format!("(() => {{ {} ; return __sanar.resolve({}).length; }})()", LOCATOR_PRELUDE, self.to_spec())
    }

    /// Render as a call chain (without the receiver), e.g.
    /// `getByRole('button', { name: 'Submit' }).first()`
    #[must_use]
    pub fn render(&self, dialect: Dialect) -> String {
        let mut out = self.selector.render(dialect);
        for refinement in &self.refinements {
            out.push('.');
            out.push_str(&refinement.render(dialect));
        }
        out
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Dialect::Playwright))
    }
}

impl From<Selector> for Locator {
    fn from(selector: Selector) -> Self {
        Self::from_selector(selector)
    }
}

/// Quote a string as a single-quoted JavaScript literal
#[must_use]
pub fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

/// In-page resolver shared by counting, acting and highlighting.
///
/// Defines `__sanar.resolve(spec)`, mirroring the matching rules of
/// [`crate::mock::MockSession`] so both sessions agree on what a locator hits.
pub const LOCATOR_PRELUDE: &str = r#"var __sanar = window.__sanar || (window.__sanar = (() => {
  const norm = s => (s || '').replace(/\s+/g, ' ').trim();
  const textOf = el => norm(el.innerText || el.textContent);
  const matches = (m, value) => {
    if (!m) return true;
    const v = norm(value);
    if (m.kind === 'contains') return v.toLowerCase().includes(norm(m.value).toLowerCase());
    if (m.kind === 'exact') return v === norm(m.value);
    try { return new RegExp(m.source, m.case_insensitive ? 'i' : '').test(v); } catch (e) { return false; }
  };
  const inputRole = el => {
    const t = (el.getAttribute('type') || 'text').toLowerCase();
    if (['submit', 'button', 'reset', 'image'].includes(t)) return 'button';
    if (t === 'checkbox') return 'checkbox';
    if (t === 'radio') return 'radio';
    if (t === 'search') return 'searchbox';
    if (t === 'number') return 'spinbutton';
    if (t === 'hidden') return 'none';
    return 'textbox';
  };
  const roleOf = el => {
    const explicit = el.getAttribute('role');
    if (explicit) return explicit.toLowerCase();
    switch (el.tagName) {
      case 'BUTTON': return 'button';
      case 'A': return el.hasAttribute('href') ? 'link' : 'generic';
      case 'INPUT': return inputRole(el);
      case 'TEXTAREA': return 'textbox';
      case 'SELECT': return 'combobox';
      case 'OPTION': return 'option';
      case 'H1': case 'H2': case 'H3': case 'H4': case 'H5': case 'H6': return 'heading';
      default: return 'generic';
    }
  };
  const labelsOf = el => {
    const out = [];
    if (el.labels) for (const l of el.labels) out.push(textOf(l));
    const aria = el.getAttribute('aria-label');
    if (aria) out.push(aria);
    const by = el.getAttribute('aria-labelledby');
    if (by) for (const id of by.split(/\s+/)) { const n = document.getElementById(id); if (n) out.push(textOf(n)); }
    return out;
  };
  const nameOf = el => {
    const labels = labelsOf(el);
    if (labels.length) return labels[0];
    if (el.tagName === 'INPUT' && inputRole(el) === 'button') return el.value || '';
    return textOf(el) || el.getAttribute('title') || el.getAttribute('placeholder') || '';
  };
  const all = () => Array.from(document.querySelectorAll('*'));
  const css = value => {
    const m = value.match(/^(.*):has-text\((['"])(.*)\2\)$/);
    if (m) return Array.from(document.querySelectorAll(m[1] || '*'))
      .filter(el => matches({ kind: 'contains', value: m[3] }, textOf(el)));
    return Array.from(document.querySelectorAll(value));
  };
  const base = s => {
    switch (s.type) {
      case 'css': return css(s.value);
      case 'role': return all().filter(el => roleOf(el) === s.role && matches(s.name, nameOf(el)));
      case 'label': return all().filter(el => labelsOf(el).some(l => matches(s.value, l)));
      case 'text': return all().filter(el => matches(s.value, textOf(el))
        && !Array.from(el.children).some(c => matches(s.value, textOf(c))));
      case 'placeholder': return all().filter(el => el.hasAttribute('placeholder')
        && matches(s.value, el.getAttribute('placeholder')));
      case 'test_id': return Array.from(document.querySelectorAll('[data-testid="' + CSS.escape(s.value) + '"]'));
      default: return [];
    }
  };
  const refine = (els, r) => {
    switch (r.op) {
      case 'nth': { const i = r.index < 0 ? els.length + r.index : r.index; return els[i] ? [els[i]] : []; }
      case 'filter': return els.filter(el => matches(r.has_text, textOf(el)));
      case 'parent': return Array.from(new Set(els.map(el => el.parentElement).filter(Boolean)));
      default: return els;
    }
  };
  return { resolve: spec => spec.refinements.reduce(refine, base(spec.selector)) };
})());"#;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod text_match_tests {
        use super::*;

        #[test]
        fn test_contains_is_case_insensitive() {
            let m = TextMatch::from("user NAME");
            assert!(m.matches("Your   User Name here"));
            assert!(!m.matches("Your username here"));
            assert!(!m.matches("password"));
        }

        #[test]
        fn test_pattern_compiled_once() {
            let m = TextMatch::pattern_ci(r"log\s*in");
            assert!(m.matches("Log In"));
            assert!(m.matches("LOGIN"));
            let first = compiled(r"log\s*in", true).unwrap();
            let again = compiled(r"log\s*in", true).unwrap();
            assert_eq!(first.as_str(), again.as_str());
            assert!(compiled("(unclosed", false).is_none());
            assert!(!TextMatch::pattern("(unclosed").matches("(unclosed"));
        }

        #[test]
        fn test_exact_normalizes_whitespace() {
            let m = TextMatch::exact("Sign in");
            assert!(m.matches("  Sign\n in "));
            assert!(!m.matches("Sign in now"));
        }

        #[test]
        fn test_pattern_folds_inline_flag() {
            let m = TextMatch::pattern("(?i)^user");
            assert_eq!(
                m,
                TextMatch::Pattern {
                    source: "^user".to_string(),
                    case_insensitive: true
                }
            );
            assert!(m.matches("Username"));
        }

        #[test]
        fn test_invalid_pattern_never_matches() {
            assert!(!TextMatch::pattern("(unclosed").matches("(unclosed"));
        }
    }

    mod refinement_tests {
        use super::*;

        #[test]
        fn test_nth_negative_counts_from_end() {
            assert_eq!(Refinement::Nth(-1).apply(vec![1, 2, 3]), vec![3]);
            assert_eq!(Refinement::Nth(1).apply(vec![1, 2, 3]), vec![2]);
            assert!(Refinement::Nth(5).apply(vec![1, 2, 3]).is_empty());
        }

        #[test]
        fn test_first_last() {
            assert_eq!(Refinement::First.apply(vec!['a', 'b']), vec!['a']);
            assert_eq!(Refinement::Last.apply(vec!['a', 'b']), vec!['b']);
            assert!(Refinement::First.apply(Vec::<char>::new()).is_empty());
        }
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_render_role_playwright() {
            let loc = Locator::from_selector(Selector::role_named("button", "Submit"));
            assert_eq!(
                loc.render(Dialect::Playwright),
                "getByRole('button', { name: 'Submit' })"
            );
        }

        #[test]
        fn test_render_role_rust() {
            let loc = Locator::from_selector(Selector::role_named("button", "Submit")).first();
            assert_eq!(
                loc.render(Dialect::Rust),
                "get_by_role_named(\"button\", \"Submit\").first()"
            );
        }

        #[test]
        fn test_render_chain_playwright() {
            let loc = Locator::new("li")
                .filter_has_text("Item")
                .parent()
                .nth(2);
            assert_eq!(
                loc.render(Dialect::Playwright),
                "locator('li').filter({ hasText: 'Item' }).locator('..').nth(2)"
            );
        }

        #[test]
        fn test_render_label_pattern() {
            let loc = Locator::from_selector(Selector::Label(TextMatch::pattern_ci("user")));
            assert_eq!(loc.render(Dialect::Playwright), "getByLabel(/user/i)");
            assert_eq!(
                loc.render(Dialect::Rust),
                "get_by_label(TextMatch::pattern(\"(?i)user\"))"
            );
        }

        #[test]
        fn test_js_string_escapes_quotes() {
            assert_eq!(js_string("it's"), "'it\\'s'");
        }

        #[test]
        fn test_dialect_for_path() {
            assert_eq!(Dialect::for_path(std::path::Path::new("a/login.rs")), Dialect::Rust);
            assert_eq!(
                Dialect::for_path(std::path::Path::new("a/login.spec.ts")),
                Dialect::Playwright
            );
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn test_count_query_embeds_spec() {
            let q = Locator::new("#username").to_count_query();
            assert!(q.contains("__sanar.resolve"));
            assert!(q.contains("\"#username\""));
            assert!(q.ends_with(".length; })()"));
        }

        #[test]
        fn test_spec_shape() {
            let spec = Locator::from_selector(Selector::TestId("login".into()))
                .last()
                .to_spec();
            assert_eq!(spec["selector"]["type"], "test_id");
            assert_eq!(spec["refinements"][0]["index"], -1);
        }
    }
}
