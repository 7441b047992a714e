//! Source patcher.
//!
//! Rewrites the failing line of a test script with the healed calls. The
//! line is located from the first stack frame that references the file;
//! the replacement keeps the original indentation and line ending, and
//! every other line stays byte-identical.
//!
//! Patching mutates the consumer's source tree in place. It is a
//! best-effort enhancement: a missing file, a stack without a matching
//! frame, or an out-of-range line is logged and skipped.
//!
//! Only single-line statements are handled. A call spread over several
//! lines is patched at the line the frame names, which may leave the rest
//! of the original statement behind.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use crate::action::ActionCall;
use crate::locator::Dialect;
use crate::result::{SanarError, SanarResult, StackFrame};

/// Receiver identifier used when rendering patches
pub const DEFAULT_RECEIVER: &str = "page";

fn frame_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"((?:[A-Za-z]:)?[^\s():]+):(\d+):(\d+)").ok())
        .as_ref()
}

fn normalized(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn same_file(frame: &Path, target: &Path) -> bool {
    let (frame, target) = (normalized(frame), normalized(target));
    if frame == target || target.ends_with(&frame) || frame.ends_with(&target) {
        return true;
    }
    match (fs::canonicalize(&frame), fs::canonicalize(&target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// First frame in `stack` that references `path`
#[must_use]
pub fn find_frame(stack: &str, path: &Path) -> Option<StackFrame> {
    frame_pattern()?.captures_iter(stack).find_map(|caps| {
        let file = caps.get(1)?.as_str();
        if !same_file(Path::new(file), path) {
            return None;
        }
        Some(StackFrame {
            file: file.to_string(),
            line: caps.get(2)?.as_str().parse().ok()?,
            column: caps.get(3)?.as_str().parse().ok()?,
        })
    })
}

/// Find a caller-reported source path on disk.
///
/// `#[track_caller]` paths are relative to the directory the compiler ran
/// in, which is often a workspace root above the test's working
/// directory; leading components are dropped until the path exists.
#[must_use]
pub fn locate_source(file: &str) -> Option<PathBuf> {
    let path = normalized(Path::new(file));
    if path.is_file() {
        return Some(path);
    }
    if path.is_absolute() {
        return None;
    }
    let parts: Vec<Component<'_>> = path.components().collect();
    (1..parts.len())
        .map(|skip| parts[skip..].iter().collect::<PathBuf>())
        .find(|candidate| candidate.is_file())
}

fn leading_whitespace(line: &str) -> &str {
    let end = line.len() - line.trim_start().len();
    &line[..end]
}

/// Text following the last `.await` of a Rust statement, e.g. `?;`
fn await_terminator(line: &str) -> Option<&str> {
    line.rfind(".await")
        .map(|i| line[i + ".await".len()..].trim_end())
}

/// Replace 1-based `line` of `source` with `replacement` lines.
///
/// Each replacement line receives the original indentation. The original
/// line ending is reused; all other lines are untouched.
pub fn replace_line(source: &str, line: usize, replacement: &[String]) -> SanarResult<String> {
    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    if line == 0 || line > lines.len() {
        return Err(SanarError::patch(format!(
            "line {line} is outside the file ({} lines)",
            lines.len()
        )));
    }
    if replacement.is_empty() {
        return Err(SanarError::patch("nothing to write"));
    }
    let original = lines[line - 1];
    let body = original.trim_end_matches(['\r', '\n']);
    let ending = &original[body.len()..];
    let separator = if ending.is_empty() { "\n" } else { ending };
    let indent = leading_whitespace(body);

    let mut out = String::with_capacity(source.len() + replacement.len() * 32);
    for l in &lines[..line - 1] {
        out.push_str(l);
    }
    for (i, text) in replacement.iter().enumerate() {
        out.push_str(indent);
        out.push_str(text.trim());
        out.push_str(if i + 1 == replacement.len() { ending } else { separator });
    }
    for l in &lines[line..] {
        out.push_str(l);
    }
    Ok(out)
}

/// Rewrites failing lines with healed calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatcher {
    receiver: String,
}

impl Default for FilePatcher {
    fn default() -> Self {
        Self::new(DEFAULT_RECEIVER)
    }
}

impl FilePatcher {
    /// Patcher rendering calls on `receiver`
    #[must_use]
    pub fn new(receiver: impl Into<String>) -> Self {
        Self {
            receiver: receiver.into(),
        }
    }

    /// Receiver identifier
    #[must_use]
    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    /// Replacement statements for `original` in `dialect`.
    ///
    /// Rust statements keep the text the original put after `.await`
    /// (`?;`, `.unwrap();`, ...).
    #[must_use]
    pub fn render(&self, original: &str, healed: &[ActionCall], dialect: Dialect) -> Vec<String> {
        match dialect {
            Dialect::Playwright => healed
                .iter()
                .map(|c| c.render_statement(dialect, &self.receiver))
                .collect(),
            Dialect::Rust => {
                let terminator = await_terminator(original).unwrap_or("?;");
                healed
                    .iter()
                    .map(|c| format!("{}.await{terminator}", c.render(dialect, &self.receiver)))
                    .collect()
            }
        }
    }

    /// Replace 1-based `line` of `path` with `healed`
    pub fn patch_line(&self, path: &Path, line: usize, healed: &[ActionCall]) -> SanarResult<()> {
        let source = fs::read_to_string(path)?;
        let original = source
            .split_inclusive('\n')
            .nth(line.saturating_sub(1))
            .unwrap_or_default();
        let replacement = self.render(original, healed, Dialect::for_path(path));
        let patched = replace_line(&source, line, &replacement)?;
        fs::write(path, patched)?;
        Ok(())
    }

    /// Patch `path` at the first frame of `stack` that references it.
    ///
    /// Returns the frame that was patched; every failure is logged and
    /// reported as `None`.
    pub fn patch(&self, path: &Path, stack: &str, healed: &[ActionCall]) -> Option<StackFrame> {
        let Some(frame) = find_frame(stack, path) else {
            warn!(path = %path.display(), "No stack frame references the file, not patching");
            return None;
        };
        match self.patch_line(path, frame.line as usize, healed) {
            Ok(()) => {
                info!(path = %path.display(), line = frame.line, "Source patched with healed step");
                Some(frame)
            }
            Err(e) => {
                warn!(path = %path.display(), line = frame.line, error = %e, "Source patch skipped");
                None
            }
        }
    }
}
