//! List command implementation.
//!
//! Prints one line per discovered check.

use std::io::Write;

use crate::check::Check;
use crate::cli::args::Cli;
use crate::error::Result;
use crate::loader::{Loader, Selection};

use super::dispatcher::{Command, CommandResult};
use super::sources::{load_checks, CheckSource};

/// The list command implementation.
pub struct ListCommand {
    loader: Loader,
    source: CheckSource,
    selection: Option<Selection>,
}

impl ListCommand {
    pub fn new(loader: Loader, source: CheckSource, selection: Option<Selection>) -> Self {
        Self {
            loader,
            source,
            selection,
        }
    }

    /// Listing shows everything discovered unless `--select` narrows it.
    pub fn from_cli(loader: Loader, cli: &Cli) -> Self {
        let selection = (!cli.select.is_empty()).then(|| Selection::from_items(&cli.select));
        Self::new(loader, CheckSource::from_cli(cli), selection)
    }
}

fn format_check(check: &Check) -> String {
    let metadata = check.metadata();
    let admin = match metadata.privilege() {
        crate::check::Privilege::Admin => " (admin)",
        crate::check::Privilege::User => "",
    };
    format!(
        "{:<28} {:<10} [{}]{} {}",
        check.name(),
        check.kind().label(),
        metadata.tags().join(","),
        admin,
        metadata.description()
    )
}

impl Command for ListCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let checks = load_checks(&self.loader, &self.source, self.selection.as_ref())?;
        for check in &checks {
            writeln!(out, "{}", format_check(check).trim_end())?;
        }
        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::builtin;
    use crate::loader::HOST_API_VERSION;

    #[test]
    fn lists_name_kind_and_tags() {
        let command = ListCommand::new(
            Loader::new(builtin::registry(HOST_API_VERSION)),
            CheckSource::Search(Vec::new()),
            None,
        );
        let mut out = Vec::new();
        command.execute(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let line = text.lines().next().unwrap();
        assert!(line.starts_with("host_check"));
        assert!(line.contains("module"));
        assert!(line.contains("[default,host]"));
    }
}
