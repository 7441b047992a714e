//! Analyze command handler

use std::fmt::Write as _;

use sanar::{AnalysisStep, BrowserSession, PageAnalysisSession, StepReport};
use serde::Serialize;

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, Reporter};
use crate::AnalyzeArgs;

/// Result of one analysis run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Page that was opened
    pub url: String,
    /// How the base navigation completed
    pub navigation: String,
    /// Interactive elements on the base page
    pub base_elements: usize,
    /// One report per step, in order
    pub steps: Vec<StepReport>,
}

impl AnalysisReport {
    /// Steps that could not be resolved
    #[must_use]
    pub fn unresolved(&self) -> usize {
        self.steps.iter().filter(|s| !s.resolved).count()
    }
}

/// Parse `kind:target[=value]` arguments
pub fn parse_steps(raw: &[String]) -> CliResult<Vec<AnalysisStep>> {
    raw.iter()
        .map(|s| {
            s.parse::<AnalysisStep>()
                .map_err(|e| CliError::invalid_argument(format!("--step {s}: {e}")))
        })
        .collect()
}

/// Open `url`, run `steps` and close the session
pub async fn run_analysis<S>(
    mut session: PageAnalysisSession<S>,
    url: &str,
    steps: &[AnalysisStep],
) -> CliResult<AnalysisReport>
where
    S: BrowserSession + ?Sized,
{
    let reports = session.run(url, steps).await.map(<[StepReport]>::to_vec);
    let navigation = session
        .outcome()
        .map_or_else(|| "not navigated".to_string(), |o| o.to_string());
    let base_elements = session.base_snapshot().map_or(0, |s| s.elements.len());
    session.close().await?;
    Ok(AnalysisReport {
        url: url.to_string(),
        navigation,
        base_elements,
        steps: reports?,
    })
}

/// Render a report as text or JSON
pub fn render_report(report: &AnalysisReport, format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(report)?);
    }
    let mut out = format!(
        "{} ({}, {} elements)\n",
        report.url, report.navigation, report.base_elements
    );
    for step in &report.steps {
        let status = if step.resolved { "resolved" } else { "UNRESOLVED" };
        let _ = writeln!(
            out,
            "  [{}] {} {:?}: {status} -> {} ({} elements)",
            step.step_index,
            step.action,
            step.target,
            step.url,
            step.snapshot.elements.len()
        );
    }
    Ok(out)
}

/// Execute the analyze command
#[cfg(feature = "browser")]
pub fn execute_analyze(config: &CliConfig, args: &AnalyzeArgs, reporter: &Reporter) -> CliResult<()> {
    use std::sync::Arc;

    use sanar::{BrowserConfig, CdpSession, HttpFetcher};

    let steps = parse_steps(&args.steps)?;
    let heal_config = config.heal_config()?;
    let mut browser_config = BrowserConfig::default().with_headless(!args.headed);
    if args.no_sandbox {
        browser_config = browser_config.with_no_sandbox();
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(async {
        let page = Arc::new(CdpSession::launch(browser_config).await?);
        let session = PageAnalysisSession::from_config(page, &heal_config)
            .with_fetcher(Arc::new(HttpFetcher::new()));
        run_analysis(session, &args.url, &steps).await
    })?;

    reporter.result(&render_report(&report, args.format.into())?);
    match report.unresolved() {
        0 => reporter.success(&format!("{} step(s) resolved", report.steps.len())),
        n => reporter.warning(&format!("{n} of {} step(s) unresolved", report.steps.len())),
    }
    Ok(())
}

/// Execute the analyze command
#[cfg(not(feature = "browser"))]
pub fn execute_analyze(_config: &CliConfig, args: &AnalyzeArgs, _reporter: &Reporter) -> CliResult<()> {
    parse_steps(&args.steps)?;
    Err(CliError::FeatureDisabled { feature: "browser" })
}
