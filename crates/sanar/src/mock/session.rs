//! In-memory [`BrowserSession`] with a flat element table.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::css::{self, ElementView};
use crate::action::HealableAction;
use crate::dom::{RawElement, RawSnapshot, EXTRACTION_SCRIPT};
use crate::driver::{BrowserSession, HtmlFetcher};
use crate::locator::{Locator, Refinement, Selector};
use crate::result::{SanarError, SanarResult};
use crate::wait::LoadState;

/// An element in the mock document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockElement {
    /// Lower-case tag
    pub tag: String,
    /// Attributes
    pub attributes: BTreeMap<String, String>,
    /// Own text content
    pub text: String,
    /// Text of the associated `<label>`
    pub label: Option<String>,
    /// Index of the parent element in the table
    pub parent: Option<usize>,
    /// Allowed `<select>` option values; empty accepts anything
    pub options: Vec<String>,
    /// Current form value
    pub value: String,
    /// Checkbox/radio state
    pub checked: bool,
}

impl MockElement {
    /// Create an element with a tag
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            ..Self::default()
        }
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Set the `id` attribute
    #[must_use]
    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    /// Set own text content
    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// Associate a `<label>`
    #[must_use]
    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Nest under the element at `index`
    #[must_use]
    pub fn child_of(mut self, index: usize) -> Self {
        self.parent = Some(index);
        self
    }

    /// Restrict `<select>` options
    #[must_use]
    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| (*o).to_string()).collect();
        self
    }

    fn role(&self) -> &str {
        if let Some(role) = self.attributes.get("role") {
            return role;
        }
        match self.tag.as_str() {
            "button" => "button",
            "a" if self.attributes.contains_key("href") => "link",
            "input" => self.input_role(),
            "textarea" => "textbox",
            "select" => "combobox",
            "option" => "option",
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
            _ => "generic",
        }
    }

    fn input_role(&self) -> &'static str {
        let kind = self
            .attributes
            .get("type")
            .map_or_else(|| "text".to_string(), |t| t.to_lowercase());
        match kind.as_str() {
            "submit" | "button" | "reset" | "image" => "button",
            "checkbox" => "checkbox",
            "radio" => "radio",
            "search" => "searchbox",
            "number" => "spinbutton",
            "hidden" => "none",
            _ => "textbox",
        }
    }

    fn labels(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let Some(label) = &self.label {
            out.push(label.as_str());
        }
        if let Some(aria) = self.attributes.get("aria-label") {
            out.push(aria.as_str());
        }
        out
    }

    fn is_fillable(&self) -> bool {
        match self.tag.as_str() {
            "textarea" => true,
            "input" => matches!(self.input_role(), "textbox" | "searchbox" | "spinbutton"),
            _ => self.attributes.contains_key("contenteditable"),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    url: String,
    elements: Vec<MockElement>,
    routes: HashMap<String, Vec<MockElement>>,
    unreachable: HashSet<String>,
    failing_states: HashSet<LoadState>,
    navigation_failures: usize,
    evaluate_error: Option<String>,
    js_results: VecDeque<Value>,
    content: Option<String>,
    history: Vec<String>,
    closed: bool,
}

impl MockState {
    fn full_text(&self, index: usize) -> String {
        let mut parts = vec![self.elements[index].text.clone()];
        for (i, el) in self.elements.iter().enumerate() {
            if el.parent == Some(index) && i != index {
                parts.push(self.full_text(i));
            }
        }
        crate::locator::normalize_whitespace(&parts.join(" "))
    }

    fn nth_child(&self, index: usize) -> usize {
        let parent = self.elements[index].parent;
        self.elements[..index]
            .iter()
            .filter(|el| el.parent == parent)
            .count()
            + 1
    }

    fn accessible_name(&self, index: usize) -> String {
        let el = &self.elements[index];
        if let Some(first) = el.labels().first() {
            return (*first).to_string();
        }
        if el.tag == "input" && el.input_role() == "button" {
            return el.attributes.get("value").cloned().unwrap_or_default();
        }
        let text = self.full_text(index);
        if !text.is_empty() {
            return text;
        }
        el.attributes
            .get("title")
            .or_else(|| el.attributes.get("placeholder"))
            .cloned()
            .unwrap_or_default()
    }

    fn base_matches(&self, selector: &Selector) -> SanarResult<Vec<usize>> {
        let all = 0..self.elements.len();
        let matched = match selector {
            Selector::Css(value) => {
                let list = css::parse_list(value)?;
                all.filter(|&i| {
                    let text = self.full_text(i);
                    let view = ElementView {
                        tag: &self.elements[i].tag,
                        attributes: &self.elements[i].attributes,
                        nth_child: self.nth_child(i),
                        text: &text,
                    };
                    list.iter().any(|s| s.matches(view))
                })
                .collect()
            }
            Selector::Role { role, name } => all
                .filter(|&i| {
                    self.elements[i].role() == role.as_str()
                        && name
                            .as_ref()
                            .map_or(true, |m| m.matches(&self.accessible_name(i)))
                })
                .collect(),
            Selector::Label(m) => all
                .filter(|&i| self.elements[i].labels().iter().any(|l| m.matches(l)))
                .collect(),
            Selector::Text(m) => all
                .filter(|&i| {
                    m.matches(&self.full_text(i))
                        && !self
                            .elements
                            .iter()
                            .enumerate()
                            .any(|(c, el)| el.parent == Some(i) && m.matches(&self.full_text(c)))
                })
                .collect(),
            Selector::Placeholder(m) => all
                .filter(|&i| {
                    self.elements[i]
                        .attributes
                        .get("placeholder")
                        .is_some_and(|p| m.matches(p))
                })
                .collect(),
            Selector::TestId(id) => all
                .filter(|&i| self.elements[i].attributes.get("data-testid") == Some(id))
                .collect(),
        };
        Ok(matched)
    }

    fn resolve(&self, locator: &Locator) -> SanarResult<Vec<usize>> {
        let mut matched = self.base_matches(locator.selector())?;
        for refinement in locator.refinements() {
            matched = match refinement {
                Refinement::Filter(m) => matched
                    .into_iter()
                    .filter(|&i| m.matches(&self.full_text(i)))
                    .collect(),
                Refinement::Parent => {
                    let mut parents = Vec::new();
                    for i in matched {
                        if let Some(p) = self.elements[i].parent {
                            if !parents.contains(&p) {
                                parents.push(p);
                            }
                        }
                    }
                    parents
                }
                other => other.apply(matched),
            };
        }
        Ok(matched)
    }

    fn raw_snapshot(&self) -> RawSnapshot {
        let elements = self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, el)| match el.tag.as_str() {
                "input" | "button" | "select" => true,
                "a" => el.attributes.contains_key("href"),
                _ => false,
            })
            .map(|(i, el)| RawElement {
                tag: el.tag.clone(),
                attributes: el.attributes.clone(),
                text: self.full_text(i),
                nth_child: self.nth_child(i),
                label: el.label.clone(),
            })
            .collect();
        RawSnapshot {
            url: self.url.clone(),
            elements,
        }
    }

    fn ensure_open(&self) -> SanarResult<()> {
        if self.closed {
            Err(SanarError::page("Target page, context or browser has been closed"))
        } else {
            Ok(())
        }
    }
}

/// Mock session for unit tests.
///
/// Resolves locators against an element table using the same matching
/// rules as the in-page resolver, records every call for verification
/// and can inject navigation and evaluation failures.
#[derive(Debug, Default)]
pub struct MockSession {
    state: Mutex<MockState>,
    count_calls: AtomicUsize,
}

impl MockSession {
    /// Create an empty session on `about:blank`
    #[must_use]
    pub fn new() -> Self {
        let session = Self::default();
        session.lock().url = "about:blank".to_string();
        session
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the current URL
    #[must_use]
    pub fn with_url(self, url: &str) -> Self {
        self.lock().url = url.to_string();
        self
    }

    /// Append an element to the current document
    #[must_use]
    pub fn with_element(self, element: MockElement) -> Self {
        self.lock().elements.push(element);
        self
    }

    /// Document served when `url` is navigated to
    #[must_use]
    pub fn with_route(self, url: &str, elements: Vec<MockElement>) -> Self {
        self.lock().routes.insert(url.to_string(), elements);
        self
    }

    /// Every navigation to `url` fails with a network error
    #[must_use]
    pub fn with_unreachable(self, url: &str) -> Self {
        self.lock().unreachable.insert(url.to_string());
        self
    }

    /// Waiting for `state` always times out
    #[must_use]
    pub fn with_failing_load_state(self, state: LoadState) -> Self {
        self.lock().failing_states.insert(state);
        self
    }

    /// The next `n` navigations fail with a network error
    #[must_use]
    pub fn with_navigation_failures(self, n: usize) -> Self {
        self.lock().navigation_failures = n;
        self
    }

    /// Every script evaluation fails
    #[must_use]
    pub fn with_failing_evaluate(self, message: &str) -> Self {
        self.lock().evaluate_error = Some(message.to_string());
        self
    }

    /// Queue a result for the next arbitrary script evaluation
    pub fn push_js_result(&self, value: Value) {
        self.lock().js_results.push_back(value);
    }

    /// Append an element after construction
    pub fn add_element(&self, element: MockElement) {
        self.lock().elements.push(element);
    }

    /// Remove every element matching `locator`
    pub fn remove_matching(&self, locator: &Locator) {
        let mut state = self.lock();
        let Ok(matched) = state.resolve(locator) else {
            return;
        };
        let keep: Vec<MockElement> = state
            .elements
            .iter()
            .enumerate()
            .filter(|(i, _)| !matched.contains(i))
            .map(|(_, el)| el.clone())
            .collect();
        state.elements = keep;
    }

    /// Call history for verification
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Check if a call with this prefix was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.lock().history.iter().any(|c| c.starts_with(prefix))
    }

    /// Number of [`BrowserSession::count`] queries so far
    #[must_use]
    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    /// Reset the count-query counter
    pub fn reset_count_calls(&self) {
        self.count_calls.store(0, Ordering::SeqCst);
    }

    /// Form value of the first element matching `locator`
    #[must_use]
    pub fn value_of(&self, locator: &Locator) -> Option<String> {
        let state = self.lock();
        let first = *state.resolve(locator).ok()?.first()?;
        Some(state.elements[first].value.clone())
    }

    /// Checked state of the first element matching `locator`
    #[must_use]
    pub fn is_checked(&self, locator: &Locator) -> bool {
        let state = self.lock();
        state
            .resolve(locator)
            .ok()
            .and_then(|m| m.first().copied())
            .is_some_and(|i| state.elements[i].checked)
    }

    /// HTML installed through [`BrowserSession::set_content`]
    #[must_use]
    pub fn content(&self) -> Option<String> {
        self.lock().content.clone()
    }

    fn navigate(&self, url: &str, wait_until: LoadState, timeout_ms: u64) -> SanarResult<()> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.history.push(format!("goto:{url}:{wait_until}"));
        if state.navigation_failures > 0 {
            state.navigation_failures -= 1;
            return Err(SanarError::Navigation {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        if state.unreachable.contains(url) {
            return Err(SanarError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        if state.failing_states.contains(&wait_until) {
            return Err(SanarError::Timeout { ms: timeout_ms });
        }
        state.url = url.to_string();
        if let Some(elements) = state.routes.get(url).cloned() {
            state.elements = elements;
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn goto(&self, url: &str, wait_until: LoadState, timeout_ms: u64) -> SanarResult<()> {
        self.navigate(url, wait_until, timeout_ms)
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout_ms: u64) -> SanarResult<()> {
        let mut guard = self.lock();
        guard.ensure_open()?;
        guard.history.push(format!("wait_for_load_state:{state}"));
        if guard.failing_states.contains(&state) {
            return Err(SanarError::Timeout { ms: timeout_ms });
        }
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> SanarResult<usize> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        state.ensure_open()?;
        Ok(state.resolve(locator)?.len())
    }

    async fn perform(
        &self,
        locator: &Locator,
        action: &HealableAction,
        timeout_ms: u64,
    ) -> SanarResult<()> {
        if let HealableAction::Goto(url) = action {
            return self.navigate(url, LoadState::Load, timeout_ms);
        }
        let mut state = self.lock();
        state.ensure_open()?;
        let matched = state.resolve(locator)?;
        let Some(&index) = matched.first() else {
            return Err(SanarError::ElementNotFound {
                locator: locator.to_string(),
            });
        };
        let method = action.method();
        let el = &mut state.elements[index];
        if el.attributes.contains_key("disabled") && !matches!(action, HealableAction::Hover) {
            return Err(SanarError::action(method, "element is disabled"));
        }
        let entry = match action {
            HealableAction::Click | HealableAction::Hover => format!("{method}:{locator}"),
            HealableAction::Fill(value) => {
                if !el.is_fillable() {
                    return Err(SanarError::action(
                        method,
                        "element is not an <input>, <textarea> or [contenteditable] element",
                    ));
                }
                el.value.clone_from(value);
                format!("{method}:{locator}={value}")
            }
            HealableAction::Check => {
                if !matches!(el.input_role(), "checkbox" | "radio") || el.tag != "input" {
                    return Err(SanarError::action(method, "not a checkbox or radio button"));
                }
                el.checked = true;
                format!("{method}:{locator}")
            }
            HealableAction::SelectOption(value) => {
                if el.tag != "select" {
                    return Err(SanarError::action(method, "element is not a <select> element"));
                }
                if !el.options.is_empty() && !el.options.contains(value) {
                    return Err(SanarError::action(method, format!("no option '{value}'")));
                }
                el.value.clone_from(value);
                format!("{method}:{locator}={value}")
            }
            HealableAction::Goto(url) => format!("goto:{url}"),
        };
        state.history.push(entry);
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> SanarResult<Value> {
        let mut state = self.lock();
        state.ensure_open()?;
        if let Some(message) = &state.evaluate_error {
            return Err(SanarError::evaluation(message.clone()));
        }
        if script == EXTRACTION_SCRIPT {
            state.history.push("evaluate:extract".to_string());
            return Ok(serde_json::to_value(state.raw_snapshot())?);
        }
        state.history.push("evaluate".to_string());
        Ok(state.js_results.pop_front().unwrap_or(Value::Null))
    }

    async fn set_content(&self, html: &str) -> SanarResult<()> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.history.push("set_content".to_string());
        state.content = Some(html.to_string());
        Ok(())
    }

    async fn current_url(&self) -> SanarResult<String> {
        let state = self.lock();
        state.ensure_open()?;
        Ok(state.url.clone())
    }

    async fn is_closed(&self) -> bool {
        self.lock().closed
    }

    async fn close(&self) -> SanarResult<()> {
        let mut state = self.lock();
        state.history.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}

/// Fetcher serving canned HTML for degraded-mode tests
#[derive(Debug, Default)]
pub struct MockFetcher {
    pages: Mutex<HashMap<String, String>>,
}

impl MockFetcher {
    /// Create a fetcher with no pages
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`
    #[must_use]
    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), html.to_string());
        self
    }
}

#[async_trait]
impl HtmlFetcher for MockFetcher {
    async fn fetch(&self, url: &str, _timeout_ms: u64) -> SanarResult<String> {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
            .ok_or_else(|| SanarError::Navigation {
                url: url.to_string(),
                message: "HTTP 404".to_string(),
            })
    }
}
