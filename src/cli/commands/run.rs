//! Run command implementation.
//!
//! Loads the checks, drives them through the dependency runner and prints
//! the merged result tree as JSON.

use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::cli::args::Cli;
use crate::cli::report::write_report;
use crate::error::Result;
use crate::loader::{Loader, Selection};
use crate::runner::{DependencyRunner, Executor, IsolationMode, RunProgress};
use crate::shell;

use super::dispatcher::{Command, CommandResult};
use super::sources::{load_checks, resolve_selection, CheckSource};

/// The run command implementation.
pub struct RunCommand {
    loader: Loader,
    source: CheckSource,
    selection: Option<Selection>,
    isolation: IsolationMode,
    output: Option<PathBuf>,
}

impl RunCommand {
    pub fn new(loader: Loader, source: CheckSource, selection: Option<Selection>) -> Self {
        Self {
            loader,
            source,
            selection,
            isolation: IsolationMode::default(),
            output: None,
        }
    }

    pub fn from_cli(loader: Loader, cli: &Cli) -> Self {
        let source = CheckSource::from_cli(cli);
        let selection = resolve_selection(&cli.select, &source);
        Self {
            isolation: cli.isolation,
            output: cli.output.clone(),
            ..Self::new(loader, source, selection)
        }
    }

    pub fn with_isolation(mut self, isolation: IsolationMode) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output = Some(dir);
        self
    }
}

impl Command for RunCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let checks = load_checks(&self.loader, &self.source, self.selection.as_ref())?;
        info!("Running {} check(s)", checks.len());

        let executor = Executor::new(self.isolation);
        let report = DependencyRunner::new(checks, executor).run_with_progress(|event| match event {
            RunProgress::RoundStarting { round, pending } => {
                debug!("Round {}: {} check(s) pending", round, pending)
            }
            RunProgress::CheckStarting { name } => debug!("Running '{}'", name),
            RunProgress::CheckFinished { name, summary } => {
                info!("'{}' finished: {}", name, summary.severity())
            }
            RunProgress::CheckSkipped { .. } => {}
        })?;

        let document = serde_json::to_string_pretty(&report.tree.to_document())?;
        writeln!(out, "{}", document)?;

        if let Some(dir) = &self.output {
            let path = write_report(dir, &shell::hostname(), &report.tree)?;
            info!("Report saved to {}", path.display());
        }

        info!(
            "Overall status {} ({} completed, {} skipped, {} round(s) in {:.1}s)",
            report.severity,
            report.completed.len(),
            report.skipped.len(),
            report.rounds,
            report.duration.as_secs_f64()
        );
        Ok(CommandResult::success())
    }
}
