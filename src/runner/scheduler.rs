//! Fixed-point dependency scheduling.
//!
//! Checks declare the parts of other checks' results they read, keyed by the
//! producing check's name. Each round walks the pending checks in discovery
//! order and runs every check whose inputs can be extracted from the tree as
//! it stands; the check's summary is merged under its name before the next
//! check is considered. A check whose producers have all reported but left
//! out a path it reads gets an ERROR summary instead of waiting forever. A
//! round that runs nothing while checks are still pending means the
//! remaining dependencies can never be satisfied.

use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::check::{Check, Privilege, Summary};
use crate::error::{DiagError, Result};
use crate::shell;
use crate::tree::{ResultTree, Severity};

use super::isolation::{Executor, RunOutcome};

/// Progress events emitted while checks run.
#[derive(Debug)]
pub enum RunProgress<'a> {
    /// A round over the pending checks begins.
    RoundStarting { round: usize, pending: usize },
    /// A check is about to run.
    CheckStarting { name: &'a str },
    /// A check finished (its summary is already merged).
    CheckFinished { name: &'a str, summary: &'a Summary },
    /// A check was dropped without running.
    CheckSkipped { name: &'a str, reason: &'a str },
}

/// Result of driving all checks to completion.
#[derive(Debug)]
pub struct RunReport {
    /// The merged result tree.
    pub tree: ResultTree,
    /// Worst severity in the tree.
    pub severity: Severity,
    /// Completed checks, each holding its summary, in completion order.
    pub completed: Vec<Check>,
    /// Names of checks that were dropped.
    pub skipped: Vec<String>,
    /// Number of scheduling rounds.
    pub rounds: usize,
    /// Total duration.
    pub duration: Duration,
}

/// Drives checks to completion against a shared result tree.
pub struct DependencyRunner {
    pending: Vec<Check>,
    executor: Executor,
    elevated: bool,
}

impl DependencyRunner {
    /// Create a runner for `checks`, in discovery order.
    pub fn new(checks: Vec<Check>, executor: Executor) -> Self {
        Self {
            pending: checks,
            executor,
            elevated: shell::is_elevated(),
        }
    }

    /// Override whether the process counts as elevated.
    pub fn with_elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    /// Run all checks.
    pub fn run(self) -> Result<RunReport> {
        self.run_with_progress(|_| {})
    }

    /// Run all checks with a progress callback.
    pub fn run_with_progress(self, mut on_progress: impl FnMut(RunProgress<'_>)) -> Result<RunReport> {
        let start = Instant::now();
        let Self {
            mut pending,
            executor,
            elevated,
        } = self;

        let mut tree = ResultTree::new();
        let mut completed = Vec::new();
        let mut skipped = Vec::new();
        let mut round = 0;

        while !pending.is_empty() {
            round += 1;
            let before = pending.len();
            debug!("Scheduling round {} with {} pending check(s)", round, before);
            on_progress(RunProgress::RoundStarting {
                round,
                pending: before,
            });

            let mut waiting = Vec::new();
            for mut check in std::mem::take(&mut pending) {
                if let Some(summary) = check.summary() {
                    tree.merge_check(check.name(), summary.to_node());
                    completed.push(check);
                    continue;
                }

                if check.metadata().privilege() == Privilege::Admin && !elevated {
                    warn!(
                        "Skipping '{}': it requires admin rights, run as root to include it",
                        check.name()
                    );
                    on_progress(RunProgress::CheckSkipped {
                        name: check.name(),
                        reason: "requires admin rights",
                    });
                    skipped.push(check.name().to_string());
                    continue;
                }

                let dependencies = check.metadata().dependencies();
                let (inputs, missing) = tree.extract(dependencies);
                let summary = if missing == 0 {
                    on_progress(RunProgress::CheckStarting { name: check.name() });
                    let outcome = executor.execute(&check, &inputs);
                    if let RunOutcome::Failed(message) = &outcome {
                        error!("Check '{}' failed: {}", check.name(), message);
                    }
                    outcome.into_summary(check.name())
                } else if dependencies.keys().all(|name| tree.contains(name)) {
                    let producers: Vec<&str> = dependencies.keys().map(String::as_str).collect();
                    error!(
                        "Check '{}' cannot run: {} path(s) it reads are missing from the results of {}",
                        check.name(),
                        missing,
                        producers.join(", ")
                    );
                    Summary::failed(
                        check.name(),
                        &format!(
                            "Required data is missing from the results of: {}",
                            producers.join(", ")
                        ),
                    )
                } else {
                    debug!("'{}' is waiting on {} dependency path(s)", check.name(), missing);
                    waiting.push(check);
                    continue;
                };

                tree.merge_check(check.name(), summary.to_node());
                on_progress(RunProgress::CheckFinished {
                    name: check.name(),
                    summary: &summary,
                });
                check.set_summary(summary);
                completed.push(check);
            }

            if waiting.len() == before {
                return Err(DiagError::Scheduling {
                    stuck: waiting.iter().map(|c| c.name().to_string()).collect(),
                });
            }
            pending = waiting;
        }

        let severity = tree.validate()?;

        Ok(RunReport {
            tree,
            severity,
            completed,
            skipped,
            rounds: round,
            duration: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{Metadata, MetadataDocument};
    use serde_json::{json, Map, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn check_with<F>(name: &str, data_req: Value, rights: &str, run: F) -> Check
    where
        F: Fn(&Map<String, Value>) -> Result<Summary> + Send + Sync + 'static,
    {
        let doc = MetadataDocument {
            name: name.to_string(),
            kind: "Data".to_string(),
            tags: "test".to_string(),
            descr: String::new(),
            data_req: data_req.to_string(),
            rights: rights.to_string(),
            timeout: 5,
            version: "1".to_string(),
            run: String::new(),
        };
        Check::from_fn(Metadata::from_document(doc, "0.2").unwrap(), run)
    }

    fn emitting(name: &str, data_req: Value, entry: &'static str) -> Check {
        check_with(name, data_req, "user", move |_| {
            let mut entries = Map::new();
            entries.insert(entry.to_string(), json!({"status": "PASS", "result": "ok"}));
            Summary::from_entries(entries)
        })
    }

    fn names(checks: &[Check]) -> Vec<&str> {
        checks.iter().map(|c| c.name()).collect()
    }

    #[test]
    fn independent_checks_run_in_one_round() {
        let report = DependencyRunner::new(
            vec![emitting("a", json!({}), "A"), emitting("b", json!({}), "B")],
            Executor::in_process(),
        )
        .run()
        .unwrap();

        assert_eq!(report.rounds, 1);
        assert_eq!(names(&report.completed), ["a", "b"]);
        assert_eq!(report.severity, Severity::Pass);
        let keys: Vec<&str> = report.tree.entries().keys().map(String::as_str).collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(report.tree.get("a").unwrap()["result"]["A"]["result"], "ok");
    }

    #[test]
    fn reverse_ordered_chain_completes() {
        let checks = vec![
            emitting("c", json!({"b": {}}), "C"),
            emitting("b", json!({"a": {}}), "B"),
            emitting("a", json!({}), "A"),
        ];

        let report = DependencyRunner::new(checks, Executor::in_process())
            .run()
            .unwrap();

        assert_eq!(names(&report.completed), ["a", "b", "c"]);
        assert_eq!(report.rounds, 3);
    }

    #[test]
    fn dependency_names_the_producing_check_not_its_entries() {
        let checks = vec![
            emitting("b", json!({"a": {}}), "B"),
            emitting("a", json!({}), "GPU"),
        ];

        let report = DependencyRunner::new(checks, Executor::in_process())
            .run()
            .unwrap();
        assert_eq!(names(&report.completed), ["a", "b"]);
    }

    #[test]
    fn forward_chain_completes_in_one_round() {
        let checks = vec![
            emitting("a", json!({}), "A"),
            emitting("b", json!({"a": {}}), "B"),
        ];
        let report = DependencyRunner::new(checks, Executor::in_process())
            .run()
            .unwrap();
        assert_eq!(report.rounds, 1);
    }

    #[test]
    fn cycle_is_a_scheduling_error_naming_both() {
        let checks = vec![
            emitting("a", json!({"b": {}}), "A"),
            emitting("b", json!({"a": {}}), "B"),
        ];

        let rounds = Arc::new(AtomicUsize::new(0));
        let counter = rounds.clone();
        let err = DependencyRunner::new(checks, Executor::in_process())
            .run_with_progress(move |event| {
                if let RunProgress::RoundStarting { .. } = event {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap_err();

        match err {
            DiagError::Scheduling { stuck } => assert_eq!(stuck, ["a", "b"]),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(rounds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inputs_contain_only_declared_paths() {
        let producer = check_with("gpu_check", json!({}), "user", |_| {
            let mut entries = Map::new();
            entries.insert(
                "GPU".into(),
                json!({"status": "PASS", "result": {
                    "Intel": {"status": "PASS", "result": "Arc"},
                    "AMD": {"status": "INFO", "result": "absent"}
                }}),
            );
            entries.insert("Other".into(), json!({"status": "INFO", "result": 1}));
            Summary::from_entries(entries)
        });
        let consumer = check_with(
            "driver_check",
            json!({"gpu_check": {"GPU": {"Intel": {}}}}),
            "user",
            |inputs| {
                let produced = &inputs["gpu_check"]["result"];
                let gpu = &produced["GPU"]["result"];
                let status = if gpu.get("AMD").is_none() && produced.get("Other").is_none() {
                    "PASS"
                } else {
                    "FAIL"
                };
                let mut entries = Map::new();
                entries.insert(
                    "Driver".into(),
                    json!({"status": status, "result": gpu["Intel"]["result"].clone()}),
                );
                Summary::from_entries(entries)
            },
        );

        let report = DependencyRunner::new(vec![consumer, producer], Executor::in_process())
            .run()
            .unwrap();

        let driver = &report.tree.get("driver_check").unwrap()["result"]["Driver"];
        assert_eq!(driver["status"], "PASS");
        assert_eq!(driver["result"], "Arc");
    }

    #[test]
    fn failing_check_becomes_error_entry_and_siblings_complete() {
        let checks = vec![
            check_with("broken", json!({}), "user", |_| {
                Summary::from_json(r#"{"result": {"Broken": {"result": 1}}}"#)
            }),
            emitting("fine", json!({}), "Fine"),
        ];

        let report = DependencyRunner::new(checks, Executor::in_process())
            .run()
            .unwrap();

        assert_eq!(report.severity, Severity::Error);
        let broken = report.tree.get("broken").unwrap();
        assert_eq!(broken["status"], "ERROR");
        assert_eq!(broken["result"]["broken"]["status"], "ERROR");
        assert_eq!(report.tree.get("fine").unwrap()["result"]["Fine"]["status"], "PASS");
        assert_eq!(report.completed.len(), 2);
    }

    fn failing_gpu_check() -> Check {
        check_with("gpu_check", json!({}), "user", |_| {
            Err(DiagError::Execution {
                check: "gpu_check".into(),
                message: "no devices".into(),
            })
        })
    }

    #[test]
    fn dependent_of_failed_check_receives_its_error_node() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let dependent = check_with("user_group_check", json!({"gpu_check": {}}), "user", move |inputs| {
            if inputs["gpu_check"]["status"] == "ERROR" {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            let mut entries = Map::new();
            entries.insert("Groups".into(), json!({"status": "WARNING", "result": "unknown"}));
            Summary::from_entries(entries)
        });

        let report = DependencyRunner::new(vec![dependent, failing_gpu_check()], Executor::in_process())
            .run()
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(names(&report.completed), ["gpu_check", "user_group_check"]);
        assert_eq!(report.severity, Severity::Error);
    }

    #[test]
    fn dependent_reading_paths_a_failed_check_never_produced_reports_error() {
        let checks = vec![
            failing_gpu_check(),
            emitting("user_group_check", json!({"gpu_check": {"GPU": {}}}), "Groups"),
            emitting("other", json!({}), "Other"),
        ];

        let report = DependencyRunner::new(checks, Executor::in_process())
            .run()
            .unwrap();

        let dependent = report.tree.get("user_group_check").unwrap();
        assert_eq!(dependent["status"], "ERROR");
        assert!(dependent["result"]["user_group_check"]["message"]
            .as_str()
            .unwrap()
            .contains("gpu_check"));
        assert_eq!(report.tree.get("other").unwrap()["result"]["Other"]["status"], "PASS");
        assert_eq!(report.completed.len(), 3);
    }

    #[test]
    fn admin_check_is_skipped_without_elevation() {
        let checks = vec![
            check_with("admin_check", json!({}), "admin", |_| {
                Ok(Summary::failed("admin_check", "must not run"))
            }),
            emitting("user_check", json!({}), "User"),
        ];

        let report = DependencyRunner::new(checks, Executor::in_process())
            .with_elevated(false)
            .run()
            .unwrap();

        assert_eq!(report.skipped, ["admin_check"]);
        assert_eq!(names(&report.completed), ["user_check"]);
        assert!(report.tree.get("admin_check").is_none());
    }

    #[test]
    fn admin_check_runs_when_elevated() {
        let checks = vec![check_with("admin_check", json!({}), "admin", |_| {
            let mut entries = Map::new();
            entries.insert("Admin".into(), json!({"status": "PASS", "result": true}));
            Summary::from_entries(entries)
        })];

        let report = DependencyRunner::new(checks, Executor::in_process())
            .with_elevated(true)
            .run()
            .unwrap();
        assert!(report.skipped.is_empty());
        assert!(report.tree.get("admin_check").is_some());
    }

    #[test]
    fn dependent_of_skipped_admin_check_is_stuck() {
        let checks = vec![
            check_with("admin_check", json!({}), "admin", |_| {
                Ok(Summary::failed("admin_check", "must not run"))
            }),
            emitting("needs_admin", json!({"admin_check": {}}), "Needs"),
        ];

        let err = DependencyRunner::new(checks, Executor::in_process())
            .with_elevated(false)
            .run()
            .unwrap_err();
        assert!(matches!(err, DiagError::Scheduling { .. }));
    }

    #[test]
    fn cached_summary_is_reused() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let mut check = check_with("cached", json!({}), "user", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Summary::failed("cached", "ran again"))
        });
        let mut entries = Map::new();
        entries.insert("Cached".into(), json!({"status": "PASS", "result": 1}));
        check.set_summary(Summary::from_entries(entries).unwrap());

        let report = DependencyRunner::new(vec![check], Executor::in_process())
            .run()
            .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(report.tree.get("cached").unwrap()["result"]["Cached"]["result"], 1);
    }

    #[test]
    fn empty_run_has_pass_severity() {
        let report = DependencyRunner::new(Vec::new(), Executor::in_process())
            .run()
            .unwrap();
        assert_eq!(report.rounds, 0);
        assert_eq!(report.severity, Severity::Pass);
    }
}
