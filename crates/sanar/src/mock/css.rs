//! Compound CSS selector matching for the in-memory DOM.
//!
//! Supports selector lists of compound selectors: type, `*`, `#id`,
//! `.class`, attribute selectors (`=`, `*=`, `^=`, `$=`, `~=`, optional `i`
//! flag), `:nth-child(n)` and the `:has-text("...")` extension. Combinators
//! are rejected with an evaluation error, as a browser would reject invalid
//! syntax.

use std::collections::BTreeMap;

use crate::locator::TextMatch;
use crate::result::{SanarError, SanarResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Contains,
    Prefix,
    Suffix,
    Word,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatch {
    name: String,
    op: AttrOp,
    value: String,
    case_insensitive: bool,
}

impl AttrMatch {
    fn matches(&self, attrs: &BTreeMap<String, String>) -> bool {
        let Some(actual) = attrs.get(&self.name) else {
            return false;
        };
        let (actual, expected) = if self.case_insensitive {
            (actual.to_lowercase(), self.value.to_lowercase())
        } else {
            (actual.clone(), self.value.clone())
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == expected,
            AttrOp::Contains => !expected.is_empty() && actual.contains(&expected),
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(&expected),
            AttrOp::Word => actual.split_whitespace().any(|w| w == expected),
        }
    }
}

/// One compound selector, e.g. `input.form-control[name="user"]:nth-child(2)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
    nth_child: Option<usize>,
    has_text: Option<String>,
}

/// Element facts needed for matching
#[derive(Debug, Clone, Copy)]
pub struct ElementView<'a> {
    /// Lower-case tag
    pub tag: &'a str,
    /// Attributes
    pub attributes: &'a BTreeMap<String, String>,
    /// 1-based sibling position
    pub nth_child: usize,
    /// Visible text including descendants
    pub text: &'a str,
}

impl CompoundSelector {
    /// Test an element against every simple selector
    #[must_use]
    pub fn matches(&self, el: ElementView<'_>) -> bool {
        if let Some(tag) = &self.tag {
            if tag != el.tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.attributes.get("id") != Some(id) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class = el.attributes.get("class").map(String::as_str).unwrap_or("");
            let have: Vec<&str> = class.split_whitespace().collect();
            if !self.classes.iter().all(|c| have.contains(&c.as_str())) {
                return false;
            }
        }
        if !self.attrs.iter().all(|a| a.matches(el.attributes)) {
            return false;
        }
        if let Some(n) = self.nth_child {
            if n != el.nth_child {
                return false;
            }
        }
        if let Some(text) = &self.has_text {
            if !TextMatch::Contains(text.clone()).matches(el.text) {
                return false;
            }
        }
        true
    }
}

/// Parse a selector list (`a, b`)
///
/// # Errors
///
/// Returns [`SanarError::Evaluation`] for syntax outside the supported subset.
pub fn parse_list(selector: &str) -> SanarResult<Vec<CompoundSelector>> {
    let mut out = Vec::new();
    for part in split_top_level(selector) {
        let part = part.trim();
        if part.is_empty() {
            return Err(invalid(selector, "empty selector"));
        }
        out.push(Parser::new(part).parse().map_err(|m| invalid(selector, &m))?);
    }
    Ok(out)
}

fn invalid(selector: &str, reason: &str) -> SanarError {
    SanarError::evaluation(format!("'{selector}' is not a valid selector: {reason}"))
}

fn split_top_level(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&selector[start..]);
    parts
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn parse(mut self) -> Result<CompoundSelector, String> {
        let mut sel = CompoundSelector::default();
        match self.chars.peek() {
            Some('*') => {
                self.chars.next();
            }
            Some(c) if is_ident_char(*c) => sel.tag = Some(self.ident()?.to_lowercase()),
            _ => {}
        }
        while let Some(c) = self.chars.next() {
            match c {
                '#' => sel.id = Some(self.ident()?),
                '.' => sel.classes.push(self.ident()?),
                '[' => sel.attrs.push(self.attribute()?),
                ':' => self.pseudo(&mut sel)?,
                c if c.is_whitespace() => {
                    self.skip_ws();
                    if self.chars.peek().is_some() {
                        return Err("combinators are not supported".to_string());
                    }
                }
                other => return Err(format!("unexpected '{other}'")),
            }
        }
        Ok(sel)
    }

    fn skip_ws(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn ident(&mut self) -> Result<String, String> {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == '\\' {
                self.chars.next();
                if let Some(escaped) = self.chars.next() {
                    out.push(escaped);
                }
            } else if is_ident_char(c) {
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if out.is_empty() {
            Err("expected identifier".to_string())
        } else {
            Ok(out)
        }
    }

    fn quoted_or_ident(&mut self) -> Result<String, String> {
        match self.chars.peek().copied() {
            Some(q @ ('"' | '\'')) => {
                self.chars.next();
                let mut out = String::new();
                loop {
                    match self.chars.next() {
                        Some('\\') => {
                            if let Some(c) = self.chars.next() {
                                out.push(c);
                            }
                        }
                        Some(c) if c == q => return Ok(out),
                        Some(c) => out.push(c),
                        None => return Err("unterminated string".to_string()),
                    }
                }
            }
            _ => self.ident(),
        }
    }

    fn attribute(&mut self) -> Result<AttrMatch, String> {
        self.skip_ws();
        let name = self.ident()?.to_lowercase();
        self.skip_ws();
        let op = match self.chars.next() {
            Some(']') => {
                return Ok(AttrMatch {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                    case_insensitive: false,
                })
            }
            Some('=') => AttrOp::Equals,
            Some(c @ ('*' | '^' | '$' | '~')) => {
                if self.chars.next() != Some('=') {
                    return Err("expected '=' in attribute operator".to_string());
                }
                match c {
                    '*' => AttrOp::Contains,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    _ => AttrOp::Word,
                }
            }
            _ => return Err("bad attribute selector".to_string()),
        };
        self.skip_ws();
        let value = self.quoted_or_ident()?;
        self.skip_ws();
        let mut case_insensitive = false;
        if matches!(self.chars.peek(), Some('i' | 'I')) {
            self.chars.next();
            case_insensitive = true;
            self.skip_ws();
        }
        if self.chars.next() != Some(']') {
            return Err("unterminated attribute selector".to_string());
        }
        Ok(AttrMatch {
            name,
            op,
            value,
            case_insensitive,
        })
    }

    fn pseudo(&mut self, sel: &mut CompoundSelector) -> Result<(), String> {
        let name = self.ident()?.to_lowercase();
        if self.chars.next() != Some('(') {
            return Err(format!("unsupported pseudo-class ':{name}'"));
        }
        self.skip_ws();
        match name.as_str() {
            "nth-child" => {
                let mut digits = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c.is_ascii_digit() {
                        digits.push(c);
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                sel.nth_child = Some(digits.parse().map_err(|_| "bad nth-child index".to_string())?);
            }
            "has-text" => sel.has_text = Some(self.quoted_or_ident()?),
            other => return Err(format!("unsupported pseudo-class ':{other}'")),
        }
        self.skip_ws();
        if self.chars.next() != Some(')') {
            return Err(format!("unterminated ':{name}('"));
        }
        Ok(())
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn hit(selector: &str, tag: &str, a: &BTreeMap<String, String>, nth: usize, text: &str) -> bool {
        parse_list(selector).unwrap().iter().any(|s| {
            s.matches(ElementView {
                tag,
                attributes: a,
                nth_child: nth,
                text,
            })
        })
    }

    #[test]
    fn test_id_class_and_tag() {
        let a = attrs(&[("id", "username"), ("class", "form-control wide")]);
        assert!(hit("#username", "input", &a, 1, ""));
        assert!(hit("input.form-control", "input", &a, 1, ""));
        assert!(hit("input.wide.form-control", "input", &a, 1, ""));
        assert!(!hit("button#username", "input", &a, 1, ""));
        assert!(!hit(".missing", "input", &a, 1, ""));
    }

    #[test]
    fn test_attribute_operators() {
        let a = attrs(&[("placeholder", "Your Username"), ("type", "text")]);
        assert!(hit("[placeholder]", "input", &a, 1, ""));
        assert!(hit("input[type=\"text\"]", "input", &a, 1, ""));
        assert!(hit("input[type=text]", "input", &a, 1, ""));
        assert!(hit("input[placeholder*=\"user\" i]", "input", &a, 1, ""));
        assert!(!hit("input[placeholder*=\"user\"]", "input", &a, 1, ""));
        assert!(hit("[placeholder^='Your']", "input", &a, 1, ""));
        assert!(hit("[placeholder$=\"name\" i]", "input", &a, 1, ""));
    }

    #[test]
    fn test_has_text_and_nth_child() {
        let a = BTreeMap::new();
        assert!(hit("button:has-text(\"log in\")", "button", &a, 3, "Log In"));
        assert!(hit("button:nth-child(3)", "button", &a, 3, ""));
        assert!(!hit("button:nth-child(2)", "button", &a, 3, ""));
    }

    #[test]
    fn test_selector_list() {
        let a = BTreeMap::new();
        assert!(hit("input, button", "button", &a, 1, ""));
        assert!(hit("*", "div", &a, 1, ""));
    }

    #[test]
    fn test_rejects_combinators_and_garbage() {
        assert!(parse_list("form input").is_err());
        assert!(parse_list("div > a").is_err());
        assert!(parse_list("[unterminated").is_err());
        assert!(parse_list(":hover").is_err());
        assert!(parse_list("a,").is_err());
    }
}
