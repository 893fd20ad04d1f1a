// src/cli/handlers/run.rs

use crate::cli::args::RunArgs;
use crate::cli::handlers::commons::{self, CliError};
use crate::constants::{CODE_QUALITY_GROUP, FALLBACK_TEST_GROUPS};
use crate::core::config_resolver::Config;
use crate::system::executor::{self, ExecutionError};
use anyhow::{Result, anyhow};
use colored::Colorize;
use serde_json::Value;
use std::path::Path;

/// What happened to each test group of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GroupReport {
    /// Groups that passed, in run order.
    pub passed: Vec<String>,
    /// The group that stopped the run.
    pub failed: Option<String>,
    /// Groups never started because an earlier group failed.
    pub skipped: Vec<String>,
    /// `code-quality` failed but the run carried on.
    pub quality_failures_ignored: bool,
}

impl GroupReport {
    /// Whether every group that ran passed (ignored quality failures count as passed).
    pub fn succeeded(&self) -> bool {
        self.failed.is_none()
    }
}

/// Main entry point for the `run` command.
pub fn handle(args: &RunArgs) -> Result<()> {
    let config = commons::load_config(Some(&args.config), false)?;
    let root = commons::repo_root()?;

    ensure_tox(&root)?;

    let (groups, ignore_quality_failures) = match &config {
        Some(config) => group_settings(config)?,
        None => {
            let groups: Vec<String> = FALLBACK_TEST_GROUPS.iter().map(|g| g.to_string()).collect();
            log::warn!(
                "As no config was supplied, only the following test groups will be run: {}",
                groups.join(", ")
            );
            (groups, false)
        }
    };

    let report = run_test_groups(&groups, ignore_quality_failures, |group| {
        executor::run_inherited(tox_command(group).as_slice(), &root)
    })?;

    if report.quality_failures_ignored {
        log::warn!("The code-quality group had failures which were ignored.");
    }
    if !report.passed.is_empty() {
        log::info!("These test groups passed: {}", report.passed.join(", "));
    }
    match report.failed {
        Some(group) => {
            if !report.skipped.is_empty() {
                log::warn!(
                    "The following test groups will not run until the current failures are corrected: {}",
                    report.skipped.join(", ")
                );
            }
            Err(CliError::GroupFailed {
                command: tox_command(&group).join(" "),
                group,
            }
            .into())
        }
        None => {
            println!("{}", "All test groups passed.".green());
            Ok(())
        }
    }
}

/// Runs each group in order, stopping at the first failure. A failing
/// `code-quality` group is tolerated when `ignore_quality_failures` is set.
pub fn run_test_groups<F>(
    groups: &[String],
    ignore_quality_failures: bool,
    mut run_group: F,
) -> Result<GroupReport, ExecutionError>
where
    F: FnMut(&str) -> Result<i32, ExecutionError>,
{
    let mut report = GroupReport::default();

    for (position, group) in groups.iter().enumerate() {
        if run_group(group)? == 0 {
            report.passed.push(group.clone());
            continue;
        }

        if ignore_quality_failures && group == CODE_QUALITY_GROUP {
            log::warn!(
                "There were code quality failures, but ignore_quality_failures is set to true in the config."
            );
            report.quality_failures_ignored = true;
            continue;
        }

        log::error!("Failed running {}", group);
        report.failed = Some(group.clone());
        report.skipped = groups.iter().skip(position + 1).cloned().collect();
        break;
    }

    Ok(report)
}

fn group_settings(config: &Config) -> Result<(Vec<String>, bool)> {
    let groups = match config.lookup("test_groups")? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(group) => Ok(group),
                other => Err(anyhow!("test_groups entries must be strings, found {}", other)),
            })
            .collect::<Result<Vec<_>>>()?,
        other => return Err(anyhow!("test_groups must be a list, found {}", other)),
    };
    let ignore = match config.lookup("ignore_quality_failures")? {
        Value::Bool(ignore) => ignore,
        other => return Err(anyhow!("ignore_quality_failures must be true or false, found {}", other)),
    };
    Ok((groups, ignore))
}

fn tox_command(group: &str) -> Vec<String> {
    vec!["tox".to_string(), "-e".to_string(), group.to_string()]
}

/// Installs tox with pip when it is not on `PATH`.
fn ensure_tox(root: &Path) -> Result<()> {
    match executor::run_inherited(&["tox", "--version"], root) {
        Ok(_) => Ok(()),
        Err(ExecutionError::Spawn { .. }) => {
            log::warn!("tox command not found, installing using pip.");
            let code = executor::run_inherited(&["pip", "install", "tox"], root)?;
            if code == 0 {
                Ok(())
            } else {
                Err(anyhow!("Installing tox failed with return code {}", code))
            }
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config_loader;
    use pretty_assertions::assert_eq;

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_all_groups_pass() {
        let mut ran = Vec::new();
        let report = run_test_groups(&groups(&["code-quality", "internal"]), false, |g| {
            ran.push(g.to_string());
            Ok(0)
        })
        .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.passed, groups(&["code-quality", "internal"]));
        assert_eq!(ran, groups(&["code-quality", "internal"]));
    }

    #[test]
    fn test_failure_stops_the_run_and_reports_skipped_groups() {
        let report = run_test_groups(&groups(&["code-quality", "internal", "system"]), false, |g| {
            Ok(if g == "internal" { 1 } else { 0 })
        })
        .unwrap();

        assert_eq!(
            report,
            GroupReport {
                passed: groups(&["code-quality"]),
                failed: Some("internal".to_string()),
                skipped: groups(&["system"]),
                quality_failures_ignored: false,
            }
        );
    }

    #[test]
    fn test_quality_failures_can_be_ignored() {
        let report = run_test_groups(&groups(&["code-quality", "internal"]), true, |g| {
            Ok(if g == CODE_QUALITY_GROUP { 1 } else { 0 })
        })
        .unwrap();

        assert!(report.succeeded());
        assert!(report.quality_failures_ignored);
        assert_eq!(report.passed, groups(&["internal"]));
    }

    #[test]
    fn test_quality_failure_is_fatal_by_default() {
        let report = run_test_groups(&groups(&["code-quality", "internal"]), false, |_| Ok(1)).unwrap();
        assert_eq!(report.failed.as_deref(), Some("code-quality"));
        assert_eq!(report.skipped, groups(&["internal"]));
    }

    #[test]
    fn test_group_settings_from_defaults() {
        let config = config_loader::load_config_with_defaults(None, None).unwrap();
        let (groups_found, ignore) = group_settings(&config).unwrap();
        assert_eq!(groups_found, groups(FALLBACK_TEST_GROUPS));
        assert!(!ignore);
    }

    #[test]
    fn test_group_settings_reject_non_list() {
        let mut config = config_loader::load_config_with_defaults(None, None).unwrap();
        config.update_config_str("c.yaml", "test_groups: internal\n").unwrap();
        assert!(group_settings(&config).is_err());
    }
}
