//! Sanador: command-line interface for Sanar
//!
//! ## Usage
//!
//! ```bash
//! sanador store list                              # Show persisted heals
//! sanador log show -n 5                           # Last five healed steps
//! sanador repair-check "await page.getByLabel('Email').fill('a@b.c');"
//! sanador patch tests/login.spec.ts -l 12 --code "<repair>"
//! sanador analyze http://localhost:3000/login -s "fill:username=bob" -s "click:log in"
//! ```

use clap::Parser;
use sanador::{
    handlers::{execute_analyze, execute_log, execute_patch, execute_repair_check, execute_store},
    Cli, CliConfig, CliResult, ColorChoice, Commands, Reporter, Verbosity,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    // Build configuration from CLI args
    let config = build_config(&cli);
    init_tracing(&config);

    let use_color = config.color.should_color();
    console::set_colors_enabled(use_color);
    console::set_colors_enabled_stderr(use_color);
    let reporter = Reporter::new(use_color, config.verbosity.is_quiet());

    match &cli.command {
        Commands::Analyze(args) => execute_analyze(&config, args, &reporter),
        Commands::Store(args) => execute_store(&config, args, &reporter),
        Commands::Log(args) => execute_log(&config, args, &reporter),
        Commands::Patch(args) => execute_patch(&config, args, &reporter),
        Commands::RepairCheck(args) => execute_repair_check(args, &reporter),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(color)
        .with_log_json(cli.log_json)
        .with_config_path(&cli.config)
}

/// Logs go to stderr so command output on stdout stays parseable
fn init_tracing(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.default_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log_json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("sanador").chain(args.iter().copied()))
    }

    #[test]
    fn test_build_config_verbosity() {
        assert_eq!(
            build_config(&parse(&["store", "list"])).verbosity,
            Verbosity::Normal
        );
        assert_eq!(
            build_config(&parse(&["-vv", "store", "list"])).verbosity,
            Verbosity::Debug
        );
        assert_eq!(
            build_config(&parse(&["-q", "-v", "store", "list"])).verbosity,
            Verbosity::Quiet
        );
    }

    #[test]
    fn test_build_config_paths_and_flags() {
        let config = build_config(&parse(&[
            "--config",
            "ci/sanar.yaml",
            "--log-json",
            "--color",
            "never",
            "log",
            "show",
        ]));
        assert_eq!(config.config_path, std::path::PathBuf::from("ci/sanar.yaml"));
        assert!(config.log_json);
        assert_eq!(config.color, ColorChoice::Never);
    }
}
