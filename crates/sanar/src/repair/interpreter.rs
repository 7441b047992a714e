//! Constrained interpreter for repair-oracle output.
//!
//! Oracle output is never evaluated. It is parsed into [`ActionCall`]s from
//! one of two accepted forms:
//!
//! * a JSON DSL object (or array of objects):
//!   `{"action":"click","locatorStrategy":"role","role":"button","name":"Submit"}`
//! * a restricted Playwright expression subset, one or more statements of
//!   the form `[await] page.<builder>(...)...<action>(...);`
//!
//! Builders: `getByRole`, `getByText`, `getByLabel`, `getByPlaceholder`,
//! `getByTestId`, `locator`, `nth`, `first`, `last`, `filter`, and
//! `locator('..')` for the parent. Actions: `click`, `fill`, `type`,
//! `check`, `selectOption`, `hover`, plus page-level `goto` and the
//! selector-first page shorthands (`page.click('#id')`).

use serde::Deserialize;

use crate::action::{ActionCall, HealableAction};
use crate::locator::{Locator, Selector, TextMatch};
use crate::result::{SanarError, SanarResult};

/// Parse oracle output into the calls it describes
pub fn interpret(source: &str) -> SanarResult<Vec<ActionCall>> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Err(SanarError::interpreter(0, "empty repair"));
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return interpret_dsl(trimmed);
    }
    let tokens = Lexer::new(source).tokenize()?;
    let statements = Parser::new(&tokens, source.len()).program()?;
    statements.iter().map(lower_statement).collect()
}

// ---------------------------------------------------------------------------
// JSON DSL
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DslStep {
    action: String,
    #[serde(default)]
    locator_strategy: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    selector: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    nth: Option<i32>,
    #[serde(default)]
    exact: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DslProgram {
    One(DslStep),
    Many(Vec<DslStep>),
}

fn interpret_dsl(source: &str) -> SanarResult<Vec<ActionCall>> {
    let program: DslProgram = serde_json::from_str(source)
        .map_err(|e| SanarError::interpreter(0, format!("invalid repair DSL: {e}")))?;
    let steps = match program {
        DslProgram::One(step) => vec![step],
        DslProgram::Many(steps) => steps,
    };
    if steps.is_empty() {
        return Err(SanarError::interpreter(0, "repair DSL has no steps"));
    }
    steps.iter().map(lower_dsl_step).collect()
}

fn lower_dsl_step(step: &DslStep) -> SanarResult<ActionCall> {
    let action = step.action.trim().to_lowercase();
    if action == "goto" || action == "navigate" {
        let url = step
            .url
            .clone()
            .or_else(|| step.value.clone())
            .ok_or_else(|| SanarError::interpreter(0, "goto requires 'url'"))?;
        return Ok(ActionCall::goto(url));
    }
    let missing = |field: &str| SanarError::interpreter(0, format!("'{action}' requires '{field}'"));
    let value = || step.value.clone().ok_or_else(|| missing("value"));
    let action = match action.as_str() {
        "click" => HealableAction::Click,
        "fill" | "type" => HealableAction::Fill(value()?),
        "check" => HealableAction::Check,
        "selectoption" | "select" => HealableAction::SelectOption(value()?),
        "hover" => HealableAction::Hover,
        other => return Err(SanarError::interpreter(0, format!("unsupported action '{other}'"))),
    };

    let text = |exact: Option<bool>| -> SanarResult<TextMatch> {
        let raw = step
            .name
            .clone()
            .or_else(|| step.text.clone())
            .ok_or_else(|| SanarError::interpreter(0, "locator requires 'name'"))?;
        Ok(text_match(raw, exact.unwrap_or(false)))
    };
    let strategy = step
        .locator_strategy
        .as_deref()
        .map(str::to_lowercase)
        .or_else(|| step.selector.as_ref().map(|_| "css".to_string()))
        .or_else(|| step.role.as_ref().map(|_| "role".to_string()))
        .ok_or_else(|| SanarError::interpreter(0, "missing 'locatorStrategy'"))?;
    let selector = match strategy.as_str() {
        "role" => {
            let role = step
                .role
                .clone()
                .ok_or_else(|| SanarError::interpreter(0, "role strategy requires 'role'"))?;
            match step.name.clone() {
                Some(name) => Selector::Role {
                    role,
                    name: Some(text_match(name, step.exact.unwrap_or(false))),
                },
                None => Selector::role(role),
            }
        }
        "label" => Selector::Label(text(step.exact)?),
        "text" => Selector::Text(text(step.exact)?),
        "placeholder" => Selector::Placeholder(text(step.exact)?),
        "testid" | "test_id" | "test-id" => Selector::TestId(
            step.name
                .clone()
                .or_else(|| step.selector.clone())
                .ok_or_else(|| SanarError::interpreter(0, "testid strategy requires 'name'"))?,
        ),
        "css" | "selector" | "locator" => Selector::Css(
            step.selector
                .clone()
                .ok_or_else(|| SanarError::interpreter(0, "css strategy requires 'selector'"))?,
        ),
        other => {
            return Err(SanarError::interpreter(
                0,
                format!("unsupported locatorStrategy '{other}'"),
            ))
        }
    };
    let mut locator = Locator::from_selector(selector);
    if let Some(n) = step.nth {
        locator = locator.nth(n);
    }
    Ok(ActionCall::on(locator, action))
}

fn text_match(text: String, exact: bool) -> TextMatch {
    if exact {
        TextMatch::Exact(text)
    } else {
        TextMatch::Contains(text)
    }
}

// ---------------------------------------------------------------------------
// Playwright expression subset: lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Regex { source: String, flags: String },
    Num(f64),
    Punct(char),
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    tok: Tok,
    offset: usize,
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().collect(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or(self.src.len(), |(i, _)| *i)
    }

    fn regex_allowed(&self) -> bool {
        match self.tokens.last() {
            None => true,
            Some(t) => matches!(t.tok, Tok::Punct('(' | ',' | ':' | '[' | ';')),
        }
    }

    fn tokenize(mut self) -> SanarResult<Vec<Token>> {
        while let Some(c) = self.peek(0) {
            let offset = self.offset();
            match c {
                c if c.is_whitespace() => self.pos += 1,
                '/' if self.peek(1) == Some('/') => {
                    while self.peek(0).is_some_and(|c| c != '\n') {
                        self.pos += 1;
                    }
                }
                '/' if self.peek(1) == Some('*') => {
                    self.pos += 2;
                    loop {
                        match (self.peek(0), self.peek(1)) {
                            (Some('*'), Some('/')) => {
                                self.pos += 2;
                                break;
                            }
                            (Some(_), _) => self.pos += 1,
                            (None, _) => {
                                return Err(SanarError::interpreter(offset, "unterminated comment"))
                            }
                        }
                    }
                }
                '/' if self.regex_allowed() => {
                    let tok = self.regex(offset)?;
                    self.push(tok, offset);
                }
                '\'' | '"' | '`' => {
                    let tok = self.string(c, offset)?;
                    self.push(tok, offset);
                }
                c if c.is_ascii_digit()
                    || (c == '-' && self.peek(1).is_some_and(|d| d.is_ascii_digit())) =>
                {
                    let tok = self.number(offset)?;
                    self.push(tok, offset);
                }
                c if c.is_alphabetic() || c == '_' || c == '$' => {
                    let mut ident = String::new();
                    while let Some(c) = self.peek(0) {
                        if c.is_alphanumeric() || c == '_' || c == '$' {
                            ident.push(c);
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                    self.push(Tok::Ident(ident), offset);
                }
                '.' | '(' | ')' | '{' | '}' | '[' | ']' | ',' | ':' | ';' => {
                    self.pos += 1;
                    self.push(Tok::Punct(c), offset);
                }
                other => {
                    return Err(SanarError::interpreter(
                        offset,
                        format!("unexpected character '{other}'"),
                    ))
                }
            }
        }
        Ok(self.tokens)
    }

    fn push(&mut self, tok: Tok, offset: usize) {
        self.tokens.push(Token { tok, offset });
    }

    fn string(&mut self, quote: char, offset: usize) -> SanarResult<Tok> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek(0) {
                None => return Err(SanarError::interpreter(offset, "unterminated string")),
                Some('\\') => {
                    let escaped = self
                        .peek(1)
                        .ok_or_else(|| SanarError::interpreter(offset, "unterminated string"))?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                    self.pos += 2;
                }
                Some('$') if quote == '`' && self.peek(1) == Some('{') => {
                    return Err(SanarError::interpreter(
                        self.offset(),
                        "template interpolation is not supported",
                    ))
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(Tok::Str(out));
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn regex(&mut self, offset: usize) -> SanarResult<Tok> {
        self.pos += 1;
        let mut source = String::new();
        let mut in_class = false;
        loop {
            match self.peek(0) {
                None | Some('\n') => {
                    return Err(SanarError::interpreter(offset, "unterminated regex literal"))
                }
                Some('\\') => {
                    source.push('\\');
                    if let Some(next) = self.peek(1) {
                        source.push(next);
                    }
                    self.pos += 2;
                }
                Some('/') if !in_class => {
                    self.pos += 1;
                    break;
                }
                Some(c) => {
                    if c == '[' {
                        in_class = true;
                    } else if c == ']' {
                        in_class = false;
                    }
                    source.push(c);
                    self.pos += 1;
                }
            }
        }
        let mut flags = String::new();
        while let Some(c) = self.peek(0).filter(char::is_ascii_alphabetic) {
            flags.push(c);
            self.pos += 1;
        }
        Ok(Tok::Regex { source, flags })
    }

    fn number(&mut self, offset: usize) -> SanarResult<Tok> {
        let mut text = String::new();
        if self.peek(0) == Some('-') {
            text.push('-');
            self.pos += 1;
        }
        while let Some(c) = self.peek(0).filter(|c| c.is_ascii_digit() || *c == '.') {
            text.push(c);
            self.pos += 1;
        }
        text.parse()
            .map(Tok::Num)
            .map_err(|_| SanarError::interpreter(offset, format!("bad number '{text}'")))
    }
}

// ---------------------------------------------------------------------------
// Playwright expression subset: parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Str(String),
    Regex { source: String, flags: String },
    Num(f64),
    Bool(bool),
    Object(Vec<(String, Arg)>),
    Array(Vec<Arg>),
}

impl Arg {
    fn field(&self, key: &str) -> Option<&Arg> {
        match self {
            Self::Object(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Call {
    name: String,
    args: Vec<Arg>,
    offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct Statement {
    calls: Vec<Call>,
    offset: usize,
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], end: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
        }
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |t| t.offset)
    }

    fn error(&self, message: impl Into<String>) -> SanarError {
        SanarError::interpreter(self.offset(), message)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|t| t.tok.clone());
        self.pos += 1;
        tok
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.peek() == Some(&Tok::Punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> SanarResult<()> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
        }
    }

    fn expect_ident(&mut self) -> SanarResult<String> {
        match self.peek() {
            Some(Tok::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    fn program(&mut self) -> SanarResult<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            while self.eat_punct(';') {}
            if self.peek().is_none() {
                break;
            }
            statements.push(self.statement()?);
        }
        if statements.is_empty() {
            return Err(SanarError::interpreter(0, "no statements"));
        }
        Ok(statements)
    }

    fn statement(&mut self) -> SanarResult<Statement> {
        let offset = self.offset();
        if self.peek() == Some(&Tok::Ident("await".to_string())) {
            self.pos += 1;
        }
        match self.peek() {
            Some(Tok::Ident(name)) if name == "page" => self.pos += 1,
            _ => return Err(self.error("expected a call on 'page'")),
        }
        let mut calls = Vec::new();
        while self.eat_punct('.') {
            let call_offset = self.offset();
            let name = self.expect_ident()?;
            self.expect_punct('(')?;
            let args = self.args(')')?;
            calls.push(Call {
                name,
                args,
                offset: call_offset,
            });
        }
        if calls.is_empty() {
            return Err(self.error("expected a call on 'page'"));
        }
        match self.peek() {
            None | Some(Tok::Punct(';') | Tok::Ident(_)) => Ok(Statement { calls, offset }),
            Some(_) => Err(self.error("unexpected token after call chain")),
        }
    }

    fn args(&mut self, close: char) -> SanarResult<Vec<Arg>> {
        let mut args = Vec::new();
        if self.eat_punct(close) {
            return Ok(args);
        }
        loop {
            args.push(self.value()?);
            if self.eat_punct(',') {
                if self.eat_punct(close) {
                    return Ok(args);
                }
                continue;
            }
            self.expect_punct(close)?;
            return Ok(args);
        }
    }

    fn value(&mut self) -> SanarResult<Arg> {
        let offset = self.offset();
        match self.next() {
            Some(Tok::Str(s)) => Ok(Arg::Str(s)),
            Some(Tok::Regex { source, flags }) => Ok(Arg::Regex { source, flags }),
            Some(Tok::Num(n)) => Ok(Arg::Num(n)),
            Some(Tok::Ident(id)) if id == "true" => Ok(Arg::Bool(true)),
            Some(Tok::Ident(id)) if id == "false" => Ok(Arg::Bool(false)),
            Some(Tok::Punct('{')) => self.object(),
            Some(Tok::Punct('[')) => Ok(Arg::Array(self.args(']')?)),
            Some(Tok::Ident(id)) => Err(SanarError::interpreter(
                offset,
                format!("identifier '{id}' is not a literal"),
            )),
            _ => Err(SanarError::interpreter(offset, "expected a literal argument")),
        }
    }

    fn object(&mut self) -> SanarResult<Arg> {
        let mut fields = Vec::new();
        loop {
            if self.eat_punct('}') {
                return Ok(Arg::Object(fields));
            }
            let key = match self.next() {
                Some(Tok::Ident(k) | Tok::Str(k)) => k,
                _ => return Err(self.error("expected object key")),
            };
            self.expect_punct(':')?;
            let value = self.value()?;
            fields.push((key, value));
            if !self.eat_punct(',') {
                self.expect_punct('}')?;
                return Ok(Arg::Object(fields));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Lowering to action calls
// ---------------------------------------------------------------------------

fn lower_statement(stmt: &Statement) -> SanarResult<ActionCall> {
    let Some((last, builders)) = stmt.calls.split_last() else {
        return Err(SanarError::interpreter(stmt.offset, "empty statement"));
    };
    let mut locator: Option<Locator> = None;
    for call in builders {
        locator = Some(apply_builder(locator, call)?);
    }
    match locator {
        Some(locator) => Ok(ActionCall::on(locator, locator_action(last)?)),
        None => page_action(last),
    }
}

fn str_arg(call: &Call, index: usize) -> SanarResult<String> {
    match call.args.get(index) {
        Some(Arg::Str(s)) => Ok(s.clone()),
        _ => Err(SanarError::interpreter(
            call.offset,
            format!("{}() expects a string argument", call.name),
        )),
    }
}

fn text_arg(call: &Call) -> SanarResult<TextMatch> {
    let exact = matches!(
        call.args.get(1).and_then(|o| o.field("exact")),
        Some(Arg::Bool(true))
    );
    text_of(call, call.args.first(), exact)
}

fn text_of(call: &Call, arg: Option<&Arg>, exact: bool) -> SanarResult<TextMatch> {
    match arg {
        Some(Arg::Str(s)) => Ok(text_match(s.clone(), exact)),
        Some(Arg::Regex { source, flags }) => Ok(TextMatch::Pattern {
            source: source.clone(),
            case_insensitive: flags.contains('i'),
        }),
        _ => Err(SanarError::interpreter(
            call.offset,
            format!("{}() expects a string or regex", call.name),
        )),
    }
}

fn apply_builder(current: Option<Locator>, call: &Call) -> SanarResult<Locator> {
    let root = |selector: Selector| -> SanarResult<Locator> {
        if current.is_some() {
            return Err(SanarError::interpreter(
                call.offset,
                format!("nested {}() is not supported", call.name),
            ));
        }
        Ok(Locator::from_selector(selector))
    };
    let chained = || {
        current.clone().ok_or_else(|| {
            SanarError::interpreter(call.offset, format!("{}() needs a locator", call.name))
        })
    };
    match call.name.as_str() {
        "getByRole" => {
            let role = str_arg(call, 0)?;
            let options = call.args.get(1);
            let exact = matches!(options.and_then(|o| o.field("exact")), Some(Arg::Bool(true)));
            let name = match options.and_then(|o| o.field("name")) {
                Some(arg) => Some(text_of(call, Some(arg), exact)?),
                None => None,
            };
            root(Selector::Role { role, name })
        }
        "getByText" => root(Selector::Text(text_arg(call)?)),
        "getByLabel" => root(Selector::Label(text_arg(call)?)),
        "getByPlaceholder" => root(Selector::Placeholder(text_arg(call)?)),
        "getByTestId" => root(Selector::TestId(str_arg(call, 0)?)),
        "locator" => {
            let selector = str_arg(call, 0)?;
            match current.clone() {
                None => Ok(Locator::new(selector)),
                Some(loc) if selector == ".." => Ok(loc.parent()),
                Some(loc) => match loc.selector() {
                    Selector::Css(base) if loc.refinements().is_empty() => {
                        Ok(Locator::new(format!("{base} {selector}")))
                    }
                    _ => Err(SanarError::interpreter(
                        call.offset,
                        "nested locator() is only supported on plain CSS",
                    )),
                },
            }
        }
        "nth" => match call.args.first() {
            Some(Arg::Num(n)) if n.fract() == 0.0 => Ok(chained()?.nth(*n as i32)),
            _ => Err(SanarError::interpreter(call.offset, "nth() expects an integer")),
        },
        "first" => Ok(chained()?.first()),
        "last" => Ok(chained()?.last()),
        "filter" => {
            let options = call.args.first();
            let has_text = options.and_then(|o| o.field("hasText"));
            let m = text_of(call, has_text, false)?;
            Ok(chained()?.filter_has_text(m))
        }
        other => Err(SanarError::interpreter(
            call.offset,
            format!("unsupported call '{other}'"),
        )),
    }
}

fn select_value(call: &Call, arg: Option<&Arg>) -> SanarResult<String> {
    match arg {
        Some(Arg::Str(s)) => Ok(s.clone()),
        Some(obj @ Arg::Object(_)) => match obj.field("value").or_else(|| obj.field("label")) {
            Some(Arg::Str(s)) => Ok(s.clone()),
            _ => Err(SanarError::interpreter(call.offset, "selectOption() needs a value or label")),
        },
        Some(Arg::Array(items)) => select_value(call, items.first()),
        _ => Err(SanarError::interpreter(call.offset, "selectOption() needs a value")),
    }
}

fn action_from(call: &Call, value_index: usize) -> SanarResult<HealableAction> {
    match call.name.as_str() {
        "click" => Ok(HealableAction::Click),
        "fill" | "type" | "pressSequentially" => Ok(HealableAction::Fill(str_arg(call, value_index)?)),
        "check" => Ok(HealableAction::Check),
        "selectOption" => Ok(HealableAction::SelectOption(select_value(
            call,
            call.args.get(value_index),
        )?)),
        "hover" => Ok(HealableAction::Hover),
        other => Err(SanarError::interpreter(
            call.offset,
            format!("unsupported action '{other}'"),
        )),
    }
}

fn locator_action(call: &Call) -> SanarResult<HealableAction> {
    action_from(call, 0)
}

fn page_action(call: &Call) -> SanarResult<ActionCall> {
    if call.name == "goto" {
        return Ok(ActionCall::goto(str_arg(call, 0)?));
    }
    let selector = str_arg(call, 0).map_err(|_| {
        SanarError::interpreter(call.offset, format!("page.{}() needs a selector", call.name))
    })?;
    Ok(ActionCall::on(Locator::new(selector), action_from(call, 1)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn one(source: &str) -> ActionCall {
        let mut calls = interpret(source).unwrap();
        assert_eq!(calls.len(), 1, "{source}");
        calls.remove(0)
    }

    mod playwright_tests {
        use super::*;

        #[test]
        fn test_role_click() {
            let call = one("await page.getByRole('button',{name:'Submit'}).click();");
            assert_eq!(
                call,
                ActionCall::on(
                    Locator::from_selector(Selector::role_named("button", "Submit")),
                    HealableAction::Click
                )
            );
        }

        #[test]
        fn test_exact_name_and_regex() {
            let call = one(r#"page.getByRole("link", { name: "Help", exact: true }).hover()"#);
            assert_eq!(
                call.locator.unwrap().selector(),
                &Selector::role_named("link", TextMatch::exact("Help"))
            );
            let call = one("await page.getByLabel(/user name/i).fill('bob');");
            assert_eq!(
                call.locator.unwrap().selector(),
                &Selector::Label(TextMatch::pattern_ci("user name"))
            );
            assert_eq!(call.action, HealableAction::Fill("bob".into()));
        }

        #[test]
        fn test_chain_refinements() {
            let call = one(
                "await page.locator('li').filter({ hasText: 'Item 2' }).locator('..').first().click();",
            );
            assert_eq!(
                call.locator.unwrap(),
                Locator::new("li").filter_has_text("Item 2").parent().first()
            );
        }

        #[test]
        fn test_nth_and_test_id() {
            let call = one("await page.getByTestId('row').nth(-1).check();");
            assert_eq!(
                call.locator.unwrap(),
                Locator::from_selector(Selector::TestId("row".into())).nth(-1)
            );
            assert_eq!(call.action, HealableAction::Check);
        }

        #[test]
        fn test_page_shorthands() {
            assert_eq!(
                one("await page.click('#submit');"),
                ActionCall::on(Locator::new("#submit"), HealableAction::Click)
            );
            assert_eq!(
                one("await page.fill(\"#user\", `bob`);"),
                ActionCall::on(Locator::new("#user"), HealableAction::Fill("bob".into()))
            );
            assert_eq!(
                one("await page.selectOption('#c', { label: 'Chile' });").action,
                HealableAction::SelectOption("Chile".into())
            );
            assert_eq!(one("await page.goto('/login')"), ActionCall::goto("/login"));
        }

        #[test]
        fn test_nested_css_locator_joins() {
            let call = one("await page.locator('form').locator('button').click();");
            assert_eq!(call.locator.unwrap(), Locator::new("form button"));
        }

        #[test]
        fn test_multiple_statements_and_comments() {
            let calls = interpret(
                "// fixed selectors\nawait page.getByLabel('Email').fill('a@b.c');\n/* then */ await page.getByRole('button', { name: /sign in/i }).click();",
            )
            .unwrap();
            assert_eq!(calls.len(), 2);
            assert_eq!(calls[1].action, HealableAction::Click);
        }

        #[test]
        fn test_statements_without_semicolons() {
            let calls = interpret("await page.click('#a')\nawait page.click('#b')").unwrap();
            assert_eq!(calls.len(), 2);
        }

        #[test]
        fn test_click_options_ignored() {
            let call = one("await page.getByText('Next').click({ force: true, timeout: 500 });");
            assert_eq!(call.action, HealableAction::Click);
        }
    }

    mod rejection_tests {
        use super::*;

        fn rejects(source: &str) {
            assert!(
                matches!(interpret(source), Err(SanarError::Interpreter { .. })),
                "accepted: {source}"
            );
        }

        #[test]
        fn test_rejects_arbitrary_code() {
            rejects("require('child_process').exec('rm -rf /')");
            rejects("await page.evaluate(() => document.body.remove());");
            rejects("const x = 1;");
            rejects("await page.click(selector);");
            rejects("await page.fill(`${user}`, 'x');");
            rejects("await page.getByRole('button').dblclick();");
            rejects("await browser.close();");
        }

        #[test]
        fn test_rejects_malformed() {
            rejects("");
            rejects("   ");
            rejects("await page.click('#a'");
            rejects("await page.getByRole('button' { name: 'x' }).click();");
            rejects("await page.nth(1).click();");
            rejects("await page.getByRole('button').getByText('x').click();");
        }

        #[test]
        fn test_error_offset_points_into_source() {
            let source = "await page.getByRole('button').explode();";
            match interpret(source) {
                Err(SanarError::Interpreter { offset, .. }) => {
                    assert_eq!(&source[offset..offset + 7], "explode");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    mod dsl_tests {
        use super::*;

        #[test]
        fn test_role_object() {
            let call = one(r#"{"action":"click","locatorStrategy":"role","role":"button","name":"Submit"}"#);
            assert_eq!(
                call,
                ActionCall::on(
                    Locator::from_selector(Selector::role_named("button", "Submit")),
                    HealableAction::Click
                )
            );
        }

        #[test]
        fn test_array_of_steps() {
            let calls = interpret(
                r##"[{"action":"fill","locatorStrategy":"label","name":"Email","value":"a@b.c","exact":true},
                    {"action":"click","selector":"#go","nth":0}]"##,
            )
            .unwrap();
            assert_eq!(calls.len(), 2);
            assert_eq!(
                calls[0].locator.as_ref().unwrap().selector(),
                &Selector::Label(TextMatch::exact("Email"))
            );
            assert_eq!(calls[1].locator.as_ref().unwrap(), &Locator::new("#go").nth(0));
        }

        #[test]
        fn test_goto_step() {
            assert_eq!(
                one(r#"{"action":"goto","url":"https://x/login"}"#),
                ActionCall::goto("https://x/login")
            );
        }

        #[test]
        fn test_dsl_rejections() {
            assert!(interpret(r##"{"action":"eval","selector":"#a"}"##).is_err());
            assert!(interpret(r##"{"action":"fill","selector":"#a"}"##).is_err());
            assert!(interpret(r#"{"action":"click"}"#).is_err());
            assert!(interpret(r#"{"action":"click","locatorStrategy":"xpath","selector":"//a"}"#).is_err());
            assert!(interpret("[]").is_err());
            assert!(interpret("{not json").is_err());
        }
    }
}
