//! Command handlers - extracted from main.rs for testability
//!
//! Each handler module contains:
//! - The execution logic for a CLI command
//! - Pure rendering helpers
//! - Tests against temp files and the mock browser

pub mod analyze;
pub mod log;
pub mod patch;
pub mod store;

pub use analyze::{execute_analyze, parse_steps, render_report, run_analysis, AnalysisReport};
pub use log::{execute_log, render_entries};
pub use patch::{execute_patch, execute_repair_check, render_calls};
pub use store::{execute_store, render_list, render_show, StoreRow};
