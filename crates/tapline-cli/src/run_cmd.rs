//! `tapline run` command: run scenarios one after another, each in its own
//! session, with a result log per scenario.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tapline_core::lifecycle::Toolchain;
use tapline_core::report::{ConsoleListener, Statistics, TestLog, TextFileListener};
use tapline_core::scenario::{Scenario, ScenarioRegistry, run_scenario};

use crate::config::TaplineConfig;

/// Outcome of one scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub name: String,
    pub success: bool,
    pub statistics: Statistics,
    pub log_dir: PathBuf,
}

/// Pick the scenarios to run. An empty `names` means all of them, in
/// registry order; unknown names are an error before anything runs.
pub fn select<'r>(registry: &'r ScenarioRegistry, names: &[String]) -> Result<Vec<&'r dyn Scenario>> {
    if names.is_empty() {
        return Ok(registry.iter().collect());
    }

    let unknown: Vec<&str> = names
        .iter()
        .filter(|name| registry.get(name).is_none())
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        bail!(
            "unknown scenario(s): {}\nRun `tapline list` to see the available scenarios.",
            unknown.join(", ")
        );
    }

    Ok(names.iter().filter_map(|name| registry.get(name)).collect())
}

/// Directory for one scenario's text log: `{log_dir}/{timestamp}-{name}`.
pub fn scenario_log_dir(log_dir: &Path, name: &str) -> PathBuf {
    log_dir.join(format!("{}-{name}", Local::now().format("%Y%m%d-%H%M%S")))
}

/// Run `scenarios` in order. Stops starting new scenarios once `cancel`
/// fires; the one in progress always finishes its teardown.
pub async fn run_scenarios(
    scenarios: &[&dyn Scenario],
    config: &TaplineConfig,
    toolchain: Arc<dyn Toolchain>,
    cancel: &CancellationToken,
) -> Result<Vec<ScenarioOutcome>> {
    let mut outcomes = Vec::with_capacity(scenarios.len());

    for scenario in scenarios {
        if cancel.is_cancelled() {
            warn!(remaining = scenarios.len() - outcomes.len(), "run interrupted; skipping remaining scenarios");
            break;
        }

        let log_dir = scenario_log_dir(&config.log_dir, scenario.name());
        let text_log = TextFileListener::create(&log_dir, config.save_attachments)
            .with_context(|| format!("failed to open result log for {}", scenario.name()))?;
        let mut log = TestLog::new(scenario.name())
            .with_verbose(config.verbose)
            .with_listener(ConsoleListener::new())
            .with_listener(text_log);

        let success = run_scenario(*scenario, config.session.clone(), Arc::clone(&toolchain), &mut log).await;
        if let Err(e) = log.close_all() {
            warn!(scenario = scenario.name(), error = %format!("{e:#}"), "failed to close result log");
        }

        info!(scenario = scenario.name(), success, log_dir = %log_dir.display(), "scenario complete");
        outcomes.push(ScenarioOutcome {
            name: scenario.name().to_owned(),
            success,
            statistics: log.statistics(),
            log_dir,
        });
    }

    Ok(outcomes)
}

/// Summary table printed after a run.
pub fn render_summary(outcomes: &[ScenarioOutcome]) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        let s = outcome.statistics;
        out.push_str(&format!(
            "{}  {}  (passes: {}, failures: {}, errors: {}, warnings: {})\n      log: {}\n",
            if outcome.success { "PASS" } else { "FAIL" },
            outcome.name,
            s.passes,
            s.failures,
            s.errors,
            s.warnings,
            outcome.log_dir.display(),
        ));
    }
    let passed = outcomes.iter().filter(|o| o.success).count();
    out.push_str(&format!("\n{passed}/{} scenarios passed.\n", outcomes.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_all_when_no_names() {
        let registry = ScenarioRegistry::builtin();
        let picked = select(&registry, &[]).unwrap();
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn select_keeps_requested_order() {
        let registry = ScenarioRegistry::builtin();
        let names = vec![
            "iphone.sample_sum_sequential".to_owned(),
            "iphone.sample_sum".to_owned(),
        ];
        let picked: Vec<&str> = select(&registry, &names)
            .unwrap()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(picked, vec!["iphone.sample_sum_sequential", "iphone.sample_sum"]);
    }

    #[test]
    fn select_rejects_unknown_names() {
        let registry = ScenarioRegistry::builtin();
        let err = select(&registry, &["ipad.nope".to_owned()]).err().unwrap();
        assert!(err.to_string().contains("ipad.nope"));
    }

    #[test]
    fn log_dir_is_named_after_scenario() {
        let dir = scenario_log_dir(Path::new("/logs"), "iphone.sample_sum");
        assert!(dir.starts_with("/logs"));
        assert!(dir.to_string_lossy().ends_with("-iphone.sample_sum"));
    }

    #[test]
    fn summary_counts_passes() {
        let outcomes = vec![
            ScenarioOutcome {
                name: "a".into(),
                success: true,
                statistics: Statistics { passes: 1, ..Statistics::default() },
                log_dir: PathBuf::from("/logs/a"),
            },
            ScenarioOutcome {
                name: "b".into(),
                success: false,
                statistics: Statistics { failures: 1, ..Statistics::default() },
                log_dir: PathBuf::from("/logs/b"),
            },
        ];
        let summary = render_summary(&outcomes);
        assert!(summary.contains("PASS  a  (passes: 1, failures: 0"));
        assert!(summary.contains("FAIL  b  (passes: 0, failures: 1"));
        assert!(summary.ends_with("1/2 scenarios passed.\n"));
    }
}
