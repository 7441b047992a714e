//! Log command handler

use sanar::{AuditLog, HealedStepLogEntry};

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::{OutputFormat, Reporter};
use crate::{LogArgs, LogCommand};

/// Execute the log command
pub fn execute_log(config: &CliConfig, args: &LogArgs, reporter: &Reporter) -> CliResult<()> {
    let path = match &args.path {
        Some(path) => path.clone(),
        None => config.heal_config()?.audit_log_path,
    };
    let log = AuditLog::new(path);
    match &args.command {
        LogCommand::Show { limit, format } => {
            let entries = log.read()?;
            reporter.result(&render_entries(tail(&entries, *limit), (*format).into())?);
        }
    }
    Ok(())
}

/// The last `limit` entries, or all of them
#[must_use]
pub fn tail(entries: &[HealedStepLogEntry], limit: Option<usize>) -> &[HealedStepLogEntry] {
    match limit {
        Some(n) if n < entries.len() => &entries[entries.len() - n..],
        _ => entries,
    }
}

/// Render entries as text blocks or a JSON array
pub fn render_entries(entries: &[HealedStepLogEntry], format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(entries)?);
    }
    if entries.is_empty() {
        return Ok("No healed steps recorded".to_string());
    }
    let blocks: Vec<String> = entries
        .iter()
        .map(|e| {
            format!(
                "{} {}\n  step:  {}\n  error: {}\n  fix:   {}",
                e.timestamp.format("%Y-%m-%d %H:%M:%S"),
                e.url,
                e.original_step,
                e.error,
                e.healed_code.replace('\n', "\n         ")
            )
        })
        .collect();
    Ok(blocks.join("\n\n"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(i: usize) -> HealedStepLogEntry {
        HealedStepLogEntry::now(
            format!("page.locator('#old-{i}').click()"),
            "No element found",
            "await page.getByRole('button', { name: 'Submit' }).click();",
            "http://app/checkout",
        )
    }

    #[test]
    fn test_tail() {
        let entries: Vec<_> = (0..5).map(entry).collect();
        assert_eq!(tail(&entries, Some(2)).len(), 2);
        assert!(tail(&entries, Some(2))[0].original_step.contains("#old-3"));
        assert_eq!(tail(&entries, Some(10)).len(), 5);
        assert_eq!(tail(&entries, None).len(), 5);
        assert!(tail(&entries, Some(0)).is_empty());
    }

    #[test]
    fn test_render_text() {
        let text = render_entries(&[entry(1)], OutputFormat::Text).unwrap();
        assert!(text.contains("http://app/checkout"));
        assert!(text.contains("step:  page.locator('#old-1').click()"));
        assert!(text.contains("fix:   await page.getByRole"));
        assert_eq!(
            render_entries(&[], OutputFormat::Text).unwrap(),
            "No healed steps recorded"
        );
    }

    #[test]
    fn test_render_json_uses_camel_case() {
        let json = render_entries(&[entry(1)], OutputFormat::Json).unwrap();
        assert!(json.contains("\"originalStep\""));
        assert!(json.contains("\"healedCode\""));
    }

    #[test]
    fn test_execute_reads_configured_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("healed-steps.json");
        AuditLog::new(&path).append(&entry(1)).unwrap();
        let args = LogArgs {
            path: Some(path),
            command: LogCommand::Show {
                limit: Some(1),
                format: crate::OutputArg::Json,
            },
        };
        execute_log(&CliConfig::new(), &args, &Reporter::new(false, true)).unwrap();
    }
}
