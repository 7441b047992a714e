//! DOM snapshot extraction.
//!
//! Enumerates the interactive elements of the current document (`input`,
//! `button`, `a[href]`, `select`), builds an ordered selector list for each
//! one, and correlates inputs with their `<label>`s. Extraction is
//! best-effort telemetry: failures are reported in [`DomSnapshot::error`]
//! and never raised.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::driver::BrowserSession;

/// Longest visible text kept per element
pub const MAX_TEXT_LEN: usize = 200;

/// Longest text used inside a `:has-text()` selector
const MAX_SELECTOR_TEXT_LEN: usize = 50;

/// In-page script returning `{ url, elements: RawElement[] }`
pub const EXTRACTION_SCRIPT: &str = r#"(() => {
  const norm = s => (s || '').replace(/\s+/g, ' ').trim();
  const labelFor = el => {
    if (el.id) {
      const byFor = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
      if (byFor) return norm(byFor.textContent);
    }
    const wrap = el.closest('label');
    return wrap ? norm(wrap.textContent) : null;
  };
  const nthChild = el => el.parentElement ? Array.prototype.indexOf.call(el.parentElement.children, el) + 1 : 1;
  const elements = Array.from(document.querySelectorAll('input, button, a[href], select')).map(el => ({
    tag: el.tagName.toLowerCase(),
    attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value])),
    text: norm(el.innerText || el.textContent).slice(0, 200),
    nth_child: nthChild(el),
    label: labelFor(el),
  }));
  return { url: location.href, elements };
})()"#;

/// Element as reported by [`EXTRACTION_SCRIPT`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawElement {
    /// Lower-case tag name
    pub tag: String,
    /// All attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Normalized visible text
    #[serde(default)]
    pub text: String,
    /// 1-based position among the parent's children
    #[serde(default = "one")]
    pub nth_child: usize,
    /// Associated `<label>` text
    #[serde(default)]
    pub label: Option<String>,
}

const fn one() -> usize {
    1
}

/// Raw extraction payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSnapshot {
    /// Document URL
    #[serde(default)]
    pub url: String,
    /// Interactive elements, document order
    #[serde(default)]
    pub elements: Vec<RawElement>,
}

/// Interactive element category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// `<input>`
    Input,
    /// `<button>`
    Button,
    /// `<a href>`
    Link,
    /// `<select>`
    Select,
}

impl ElementKind {
    /// Classify a tag; `None` for non-interactive tags
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "input" => Some(Self::Input),
            "button" => Some(Self::Button),
            "a" => Some(Self::Link),
            "select" => Some(Self::Select),
            _ => None,
        }
    }
}

/// One interactive element with its candidate selectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRecord {
    /// Element category
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// Lower-case tag name
    pub tag_name: String,
    /// All attributes
    pub attributes: BTreeMap<String, String>,
    /// Visible text
    pub text: String,
    /// Selectors, most stable first
    pub selectors: Vec<String>,
}

/// An input correlated with its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    /// Associated label text (`for=id` or wrapping label)
    pub label: Option<String>,
    /// `name` attribute
    pub name: Option<String>,
    /// `id` attribute
    pub id: Option<String>,
    /// `placeholder` attribute
    pub placeholder: Option<String>,
    /// `type` attribute (defaults to `text`)
    #[serde(rename = "type")]
    pub input_type: String,
}

/// Result of one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomSnapshot {
    /// Document URL at extraction time
    pub url: String,
    /// Interactive elements
    pub elements: Vec<ElementRecord>,
    /// Inputs correlated with labels
    pub form_fields: Vec<FormField>,
    /// Why extraction produced nothing, if it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DomSnapshot {
    /// Empty snapshot carrying an error
    #[must_use]
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Build records and form fields from a raw payload
    #[must_use]
    pub fn from_raw(raw: RawSnapshot) -> Self {
        let mut elements = Vec::with_capacity(raw.elements.len());
        let mut form_fields = Vec::new();
        for el in &raw.elements {
            let Some(kind) = ElementKind::from_tag(&el.tag) else {
                continue;
            };
            if kind == ElementKind::Link && !el.attributes.contains_key("href") {
                continue;
            }
            if kind == ElementKind::Input {
                form_fields.push(FormField {
                    label: el.label.clone().filter(|l| !l.is_empty()),
                    name: el.attributes.get("name").cloned(),
                    id: el.attributes.get("id").cloned(),
                    placeholder: el.attributes.get("placeholder").cloned(),
                    input_type: el
                        .attributes
                        .get("type")
                        .cloned()
                        .unwrap_or_else(|| "text".to_string()),
                });
            }
            elements.push(ElementRecord {
                kind,
                tag_name: el.tag.clone(),
                attributes: el.attributes.clone(),
                text: truncate(&el.text, MAX_TEXT_LEN),
                selectors: selectors_for(el),
            });
        }
        Self {
            url: raw.url,
            elements,
            form_fields,
            error: None,
        }
    }

    /// Whether extraction failed
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Selector list for one element.
///
/// Order: `data-testid`, `id`, `name`, class list, type-specific attribute,
/// visible text, `nth-child`.
#[must_use]
pub fn selectors_for(el: &RawElement) -> Vec<String> {
    let tag = el.tag.as_str();
    let attr = |name: &str| el.attributes.get(name).map(String::as_str).filter(|v| !v.is_empty());
    let mut out = Vec::new();

    if let Some(test_id) = attr("data-testid") {
        out.push(format!("[data-testid={}]", css_quote(test_id)));
    }
    if let Some(id) = attr("id") {
        if is_css_ident(id) {
            out.push(format!("#{id}"));
        } else {
            out.push(format!("[id={}]", css_quote(id)));
        }
    }
    if let Some(name) = attr("name") {
        out.push(format!("{tag}[name={}]", css_quote(name)));
    }
    if let Some(class) = attr("class") {
        let classes: Vec<&str> = class.split_whitespace().filter(|c| is_css_ident(c)).collect();
        if !classes.is_empty() {
            out.push(format!("{tag}.{}", classes.join(".")));
        }
    }
    let typed = match tag {
        "a" => attr("href").map(|href| ("href", href)),
        "input" | "button" => attr("type").map(|t| ("type", t)),
        _ => None,
    };
    if let Some((name, value)) = typed {
        out.push(format!("{tag}[{name}={}]", css_quote(value)));
    }
    let text = el.text.trim();
    if !text.is_empty() {
        out.push(format!(
            "{tag}:has-text({})",
            css_quote(&truncate(text, MAX_SELECTOR_TEXT_LEN))
        ));
    }
    out.push(format!("{tag}:nth-child({})", el.nth_child.max(1)));
    out
}

/// Extract a snapshot of the current page. Never fails: problems are
/// reported through [`DomSnapshot::error`].
pub async fn extract<S: BrowserSession + ?Sized>(session: &S) -> DomSnapshot {
    if session.is_closed().await {
        return DomSnapshot::failed("", "page is closed");
    }
    let url = session.current_url().await.unwrap_or_default();
    let value = match session.evaluate(EXTRACTION_SCRIPT).await {
        Ok(value) => value,
        Err(e) => {
            warn!(url = %url, error = %e, "DOM extraction failed");
            return DomSnapshot::failed(url, e.to_string());
        }
    };
    match serde_json::from_value::<RawSnapshot>(value) {
        Ok(raw) => {
            let snapshot = DomSnapshot::from_raw(raw);
            debug!(
                url = %snapshot.url,
                elements = snapshot.elements.len(),
                form_fields = snapshot.form_fields.len(),
                "DOM snapshot extracted"
            );
            snapshot
        }
        Err(e) => {
            warn!(url = %url, error = %e, "DOM extraction returned malformed payload");
            DomSnapshot::failed(url, format!("malformed extraction payload: {e}"))
        }
    }
}

/// Double-quote a CSS attribute value
#[must_use]
pub fn css_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Whether `s` can be used unescaped after `#` or `.`
#[must_use]
pub fn is_css_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-' => {}
        _ => return false,
    }
    s != "-" && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
