//! Healable actions.
//!
//! The finite set of operations the resolver, the self-healing proxy and the
//! repair interpreter agree on. Everything that can be healed is expressed
//! as an [`ActionCall`]: an optional [`Locator`] plus a [`HealableAction`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::locator::{js_string, Dialect, Locator};
use crate::result::SanarError;

/// Action kinds accepted by described-step resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Click an element
    Click,
    /// Fill a text control
    Fill,
    /// Select an option in a `<select>`
    Select,
}

impl ActionKind {
    /// Key fragment used by caches and the heal store
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Fill => "fill",
            Self::Select => "select",
        }
    }

    /// Build the concrete action, attaching a value where one is needed
    #[must_use]
    pub fn to_action(self, value: Option<&str>) -> HealableAction {
        let value = value.unwrap_or_default().to_string();
        match self {
            Self::Click => HealableAction::Click,
            Self::Fill => HealableAction::Fill(value),
            Self::Select => HealableAction::SelectOption(value),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = SanarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "click" => Ok(Self::Click),
            "fill" | "type" => Ok(Self::Fill),
            "select" | "selectoption" => Ok(Self::Select),
            other => Err(SanarError::config(format!("unknown action kind '{other}'"))),
        }
    }
}

/// An action the self-healing proxy can intercept and replay
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealableAction {
    /// Click
    Click,
    /// Replace the value of a text control
    Fill(String),
    /// Check a checkbox or radio
    Check,
    /// Select an option by value or label
    SelectOption(String),
    /// Hover the pointer over an element
    Hover,
    /// Navigate the page
    Goto(String),
}

impl HealableAction {
    /// Playwright method name
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Fill(_) => "fill",
            Self::Check => "check",
            Self::SelectOption(_) => "selectOption",
            Self::Hover => "hover",
            Self::Goto(_) => "goto",
        }
    }

    /// Whether the action targets an element
    #[must_use]
    pub const fn needs_locator(&self) -> bool {
        !matches!(self, Self::Goto(_))
    }

    fn rust_method(&self) -> &'static str {
        match self {
            Self::SelectOption(_) => "select_option",
            other => other.method(),
        }
    }

    fn argument(&self) -> Option<&str> {
        match self {
            Self::Fill(v) | Self::SelectOption(v) | Self::Goto(v) => Some(v),
            Self::Click | Self::Check | Self::Hover => None,
        }
    }
}

/// A single concrete call: `receiver[.locator].action(args)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionCall {
    /// Target element; `None` only for page-level actions (`goto`)
    pub locator: Option<Locator>,
    /// What to do
    pub action: HealableAction,
}

impl ActionCall {
    /// Action on a located element
    #[must_use]
    pub fn on(locator: Locator, action: HealableAction) -> Self {
        Self {
            locator: Some(locator),
            action,
        }
    }

    /// Page navigation
    #[must_use]
    pub fn goto(url: impl Into<String>) -> Self {
        Self {
            locator: None,
            action: HealableAction::Goto(url.into()),
        }
    }

    /// Render the call expression, e.g. `page.getByRole('button').click()`
    #[must_use]
    pub fn render(&self, dialect: Dialect, receiver: &str) -> String {
        let mut out = receiver.to_string();
        if let Some(locator) = &self.locator {
            out.push('.');
            out.push_str(&locator.render(dialect));
        }
        let (method, arg) = match dialect {
            Dialect::Playwright => (
                self.action.method(),
                self.action.argument().map(js_string),
            ),
            Dialect::Rust => (
                self.action.rust_method(),
                self.action.argument().map(|a| format!("{a:?}")),
            ),
        };
        out.push('.');
        out.push_str(method);
        out.push('(');
        if let Some(arg) = arg {
            out.push_str(&arg);
        }
        out.push(')');
        out
    }

    /// Render as a full statement: `await ...;` or `....await?;`
    #[must_use]
    pub fn render_statement(&self, dialect: Dialect, receiver: &str) -> String {
        let expr = self.render(dialect, receiver);
        match dialect {
            Dialect::Playwright => format!("await {expr};"),
            Dialect::Rust => format!("{expr}.await?;"),
        }
    }
}

impl fmt::Display for ActionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Dialect::Playwright, "page"))
    }
}

/// Render a sequence of calls, one statement per line
#[must_use]
pub fn render_statements(calls: &[ActionCall], dialect: Dialect, receiver: &str) -> String {
    calls
        .iter()
        .map(|c| c.render_statement(dialect, receiver))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::locator::Selector;

    #[test]
    fn test_action_kind_parse() {
        assert_eq!("Click".parse::<ActionKind>().unwrap(), ActionKind::Click);
        assert_eq!("type".parse::<ActionKind>().unwrap(), ActionKind::Fill);
        assert_eq!("selectOption".parse::<ActionKind>().unwrap(), ActionKind::Select);
        assert!("drag".parse::<ActionKind>().is_err());
    }

    #[test]
    fn test_kind_to_action_carries_value() {
        assert_eq!(
            ActionKind::Fill.to_action(Some("bob")),
            HealableAction::Fill("bob".to_string())
        );
        assert_eq!(ActionKind::Click.to_action(Some("ignored")), HealableAction::Click);
    }

    #[test]
    fn test_render_playwright_statement() {
        let call = ActionCall::on(
            Locator::from_selector(Selector::role_named("button", "Submit")),
            HealableAction::Click,
        );
        assert_eq!(
            call.render_statement(Dialect::Playwright, "page"),
            "await page.getByRole('button', { name: 'Submit' }).click();"
        );
    }

    #[test]
    fn test_render_rust_statement() {
        let call = ActionCall::on(
            Locator::new("#country"),
            HealableAction::SelectOption("NZ".to_string()),
        );
        assert_eq!(
            call.render_statement(Dialect::Rust, "page"),
            "page.locator(\"#country\").select_option(\"NZ\").await?;"
        );
    }

    #[test]
    fn test_render_goto() {
        let call = ActionCall::goto("https://example.com/login");
        assert_eq!(call.to_string(), "page.goto('https://example.com/login')");
        assert!(!call.action.needs_locator());
    }

    #[test]
    fn test_render_statements_joins_lines() {
        let calls = vec![
            ActionCall::on(Locator::new("#u"), HealableAction::Fill("bob".into())),
            ActionCall::on(Locator::new("#go"), HealableAction::Click),
        ];
        let text = render_statements(&calls, Dialect::Playwright, "page");
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("await page.locator('#u').fill('bob');"));
    }
}
