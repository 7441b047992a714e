//! Patch and repair-check command handlers

use sanar::{interpret, ActionCall, Dialect, FilePatcher, StackFrame};
use tracing::debug;

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use crate::{PatchArgs, RepairCheckArgs};

/// Execute the patch command
pub fn execute_patch(config: &CliConfig, args: &PatchArgs, reporter: &Reporter) -> CliResult<()> {
    if args.line == 0 {
        return Err(CliError::invalid_argument("--line is 1-based"));
    }
    if !args.file.is_file() {
        return Err(CliError::not_found(format!(
            "source file {}",
            args.file.display()
        )));
    }
    let calls = interpret(&args.code)?;
    debug!(calls = calls.len(), "Repair accepted");
    let patcher = FilePatcher::new(config.heal_config()?.page_ident);
    let frame = StackFrame {
        file: args.file.display().to_string(),
        line: args.line,
        column: args.column,
    };
    let patched = patcher
        .patch(&args.file, &frame.to_string(), &calls)
        .ok_or_else(|| {
            CliError::invalid_argument(format!(
                "could not patch {}:{}",
                args.file.display(),
                args.line
            ))
        })?;
    reporter.success(&format!(
        "Patched {}:{} with {} statement(s)",
        patched.file,
        patched.line,
        calls.len()
    ));
    Ok(())
}

/// Execute the repair-check command
pub fn execute_repair_check(args: &RepairCheckArgs, reporter: &Reporter) -> CliResult<()> {
    let calls = interpret(&args.code)?;
    let dialect = if args.rust {
        Dialect::Rust
    } else {
        Dialect::Playwright
    };
    reporter.result(&render_calls(&calls, dialect));
    reporter.success(&format!("Accepted {} call(s)", calls.len()));
    Ok(())
}

/// Normalized statements, one per line
#[must_use]
pub fn render_calls(calls: &[ActionCall], dialect: Dialect) -> String {
    sanar::render_statements(calls, dialect, sanar::patcher::DEFAULT_RECEIVER)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn quiet() -> Reporter {
        Reporter::new(false, true)
    }

    fn config_in(dir: &TempDir) -> CliConfig {
        CliConfig::new().with_config_path(dir.path().join("sanar.yaml"))
    }

    mod patch_tests {
        use super::*;

        #[test]
        fn test_patch_typescript_line() {
            let dir = TempDir::new().unwrap();
            let file = dir.path().join("login.spec.ts");
            fs::write(&file, "a\n  await page.click('#old');\nc\n").unwrap();
            let args = PatchArgs {
                file: file.clone(),
                line: 2,
                column: 9,
                code: "await page.getByLabel('Email').fill('a@b.c');".into(),
            };
            execute_patch(&config_in(&dir), &args, &quiet()).unwrap();
            assert_eq!(
                fs::read_to_string(&file).unwrap(),
                "a\n  await page.getByLabel('Email').fill('a@b.c');\nc\n"
            );
        }

        #[test]
        fn test_patch_rust_line_uses_configured_receiver() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("sanar.yaml"), "page_ident: tab\n").unwrap();
            let file = dir.path().join("login.rs");
            fs::write(&file, "    tab.click(\"#old\").await.unwrap();\n").unwrap();
            let args = PatchArgs {
                file: file.clone(),
                line: 1,
                column: 5,
                code: "{\"action\":\"click\",\"locatorStrategy\":\"testid\",\"selector\":\"submit\"}"
                    .into(),
            };
            execute_patch(&config_in(&dir), &args, &quiet()).unwrap();
            assert_eq!(
                fs::read_to_string(&file).unwrap(),
                "    tab.get_by_test_id(\"submit\").click().await.unwrap();\n"
            );
        }

        #[test]
        fn test_patch_rejects_bad_input() {
            let dir = TempDir::new().unwrap();
            let file = dir.path().join("a.spec.ts");
            fs::write(&file, "x\n").unwrap();
            let args = |line, code: &str, file: PathBuf| PatchArgs {
                file,
                line,
                column: 1,
                code: code.into(),
            };
            let config = config_in(&dir);
            assert!(matches!(
                execute_patch(&config, &args(0, "await page.click('#a');", file.clone()), &quiet()),
                Err(CliError::InvalidArgument { .. })
            ));
            assert!(matches!(
                execute_patch(&config, &args(1, "eval('x')", file.clone()), &quiet()),
                Err(CliError::Sanar(_))
            ));
            assert!(matches!(
                execute_patch(
                    &config,
                    &args(1, "await page.click('#a');", dir.path().join("none.ts")),
                    &quiet()
                ),
                Err(CliError::NotFound { .. })
            ));
            assert!(execute_patch(&config, &args(9, "await page.click('#a');", file.clone()), &quiet())
                .is_err());
            assert_eq!(fs::read_to_string(&file).unwrap(), "x\n");
        }
    }

    mod repair_check_tests {
        use super::*;

        #[test]
        fn test_render_normalizes_spacing() {
            let calls = interpret("await page.getByRole('button',{name:'Submit'}).click();").unwrap();
            assert_eq!(
                render_calls(&calls, Dialect::Playwright),
                "await page.getByRole('button', { name: 'Submit' }).click();"
            );
            assert_eq!(
                render_calls(&calls, Dialect::Rust),
                "page.get_by_role_named(\"button\", \"Submit\").click().await?;"
            );
        }

        #[test]
        fn test_repair_check_rejects_code() {
            let args = RepairCheckArgs {
                code: "document.querySelector('#a').click()".into(),
                rust: false,
            };
            assert!(execute_repair_check(&args, &quiet()).is_err());
        }
    }
}
