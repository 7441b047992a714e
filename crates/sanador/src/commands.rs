//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Sanador: CLI for Sanar - self-healing selectors and test repair
#[derive(Parser, Debug)]
#[command(name = "sanador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Healing configuration file
    #[arg(short, long, default_value = "sanar.yaml", global = true)]
    pub config: PathBuf,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a page and resolve described steps against it
    Analyze(AnalyzeArgs),

    /// Inspect or reset the heal store
    Store(StoreArgs),

    /// Inspect the healed-step audit log
    Log(LogArgs),

    /// Rewrite one source line with a repair
    Patch(PatchArgs),

    /// Check oracle output against the repair grammar
    RepairCheck(RepairCheckArgs),
}

/// Arguments for the analyze command
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Page to open
    pub url: String,

    /// Step to run, as kind:target[=value] (repeatable)
    #[arg(short, long = "step")]
    pub steps: Vec<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the chromium sandbox (containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputArg,
}

/// Arguments for the store command
#[derive(Parser, Debug)]
pub struct StoreArgs {
    /// Heal store file (defaults to the configured path)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Store subcommand
    #[command(subcommand)]
    pub command: StoreCommand,
}

/// Heal store subcommands
#[derive(Subcommand, Debug)]
pub enum StoreCommand {
    /// List every stored heal
    List {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputArg,
    },
    /// Show one heal by key (e.g. "fill|username")
    Show {
        /// Store key
        key: String,
    },
    /// Remove one heal by key
    Remove {
        /// Store key
        key: String,
    },
    /// Remove every heal
    Clear,
}

/// Arguments for the log command
#[derive(Parser, Debug)]
pub struct LogArgs {
    /// Audit log file (defaults to the configured path)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Log subcommand
    #[command(subcommand)]
    pub command: LogCommand,
}

/// Audit log subcommands
#[derive(Subcommand, Debug)]
pub enum LogCommand {
    /// Show the most recent healed steps
    Show {
        /// Maximum number of entries, newest last
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputArg,
    },
}

/// Arguments for the patch command
#[derive(Parser, Debug)]
pub struct PatchArgs {
    /// Source file to rewrite
    pub file: PathBuf,

    /// 1-based line to replace
    #[arg(short, long)]
    pub line: u32,

    /// 1-based column of the failing call
    #[arg(long, default_value = "1")]
    pub column: u32,

    /// Repair code (Playwright statements or JSON)
    #[arg(long)]
    pub code: String,
}

/// Arguments for the repair-check command
#[derive(Parser, Debug)]
pub struct RepairCheckArgs {
    /// Oracle output to check
    pub code: String,

    /// Render accepted calls for Rust sources
    #[arg(long)]
    pub rust: bool,
}

/// Output format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

impl From<OutputArg> for crate::output::OutputFormat {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Text => Self::Text,
            OutputArg::Json => Self::Json,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_analyze_steps() {
            let cli = Cli::try_parse_from([
                "sanador",
                "analyze",
                "http://app/login",
                "--step",
                "fill:username=bob",
                "-s",
                "click:log in",
                "--no-sandbox",
            ])
            .unwrap();
            let Commands::Analyze(args) = cli.command else {
                panic!("expected analyze");
            };
            assert_eq!(args.url, "http://app/login");
            assert_eq!(args.steps, vec!["fill:username=bob", "click:log in"]);
            assert!(args.no_sandbox);
            assert!(!args.headed);
            assert_eq!(args.format, OutputArg::Text);
        }

        #[test]
        fn test_global_flags_after_subcommand() {
            let cli = Cli::try_parse_from([
                "sanador",
                "store",
                "list",
                "-vv",
                "--config",
                "ci.yaml",
                "--log-json",
            ])
            .unwrap();
            assert_eq!(cli.verbose, 2);
            assert!(cli.log_json);
            assert_eq!(cli.config, PathBuf::from("ci.yaml"));
        }

        #[test]
        fn test_patch_requires_line_and_code() {
            assert!(Cli::try_parse_from(["sanador", "patch", "a.spec.ts", "--code", "x"]).is_err());
            let cli = Cli::try_parse_from([
                "sanador", "patch", "a.spec.ts", "--line", "5", "--code", "x",
            ])
            .unwrap();
            let Commands::Patch(args) = cli.command else {
                panic!("expected patch");
            };
            assert_eq!((args.line, args.column), (5, 1));
        }

        #[test]
        fn test_log_limit() {
            let cli = Cli::try_parse_from(["sanador", "log", "show", "-n", "3"]).unwrap();
            let Commands::Log(LogArgs {
                command: LogCommand::Show { limit, .. },
                ..
            }) = cli.command
            else {
                panic!("expected log show");
            };
            assert_eq!(limit, Some(3));
        }
    }
}
