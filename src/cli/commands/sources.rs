//! Where a command gets its checks from.

use std::ffi::OsStr;
use std::path::PathBuf;

use crate::check::Check;
use crate::cli::args::Cli;
use crate::error::{DiagError, Result};
use crate::loader::{
    default_checks_dir, search_locations, select, Discovery, Loader, Selection,
};

/// Origin of the checks for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckSource {
    /// An allow-list file.
    Config(PathBuf),
    /// One plugin file.
    Single(PathBuf),
    /// Built-in modules plus the search locations.
    Search(Vec<PathBuf>),
}

impl CheckSource {
    pub fn from_cli(cli: &Cli) -> Self {
        if let Some(config) = &cli.config {
            return CheckSource::Config(config.clone());
        }
        if let Some(path) = &cli.single_checker {
            return CheckSource::Single(path.clone());
        }

        let mut locations = cli
            .checks_path
            .as_deref()
            .map(|value| search_locations(OsStr::new(value)))
            .unwrap_or_default();
        if let Some(dir) = default_checks_dir().filter(|dir| dir.is_dir()) {
            locations.push(dir);
        }
        CheckSource::Search(locations)
    }

    /// Only runs over the default locations narrow to `default` checks.
    pub fn uses_default_selection(&self) -> bool {
        matches!(self, CheckSource::Search(_))
    }

    pub fn discover(&self, loader: &Loader) -> Result<Discovery> {
        match self {
            CheckSource::Config(path) => loader.load_config(path),
            CheckSource::Single(path) => loader.load_single(path),
            CheckSource::Search(locations) => {
                let mut discovery = loader.discover_registered();
                discovery.extend(loader.discover_locations(locations));
                Ok(discovery)
            }
        }
    }
}

/// The selection in effect: explicit, the default one, or none at all.
pub fn resolve_selection(requested: &[String], source: &CheckSource) -> Option<Selection> {
    if !requested.is_empty() {
        Some(Selection::from_items(requested))
    } else if source.uses_default_selection() {
        Some(Selection::default_checks())
    } else {
        None
    }
}

/// Discover, deduplicate and select checks.
///
/// Duplicate names and an empty result are configuration errors.
pub fn load_checks(
    loader: &Loader,
    source: &CheckSource,
    selection: Option<&Selection>,
) -> Result<Vec<Check>> {
    let checks = source.discover(loader)?.into_checks()?;
    let checks = match selection {
        Some(selection) => select(checks, selection),
        None => checks,
    };
    if checks.is_empty() {
        return Err(DiagError::Configuration {
            message: "no checks match the selection".to_string(),
        });
    }
    Ok(checks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::builtin;
    use crate::loader::HOST_API_VERSION;
    use clap::Parser;

    fn loader() -> Loader {
        Loader::new(builtin::registry(HOST_API_VERSION))
    }

    #[test]
    fn config_takes_precedence() {
        let cli = Cli::try_parse_from(["diagrun", "--config", "checks.json"]).unwrap();
        assert_eq!(
            CheckSource::from_cli(&cli),
            CheckSource::Config(PathBuf::from("checks.json"))
        );
    }

    #[test]
    fn default_selection_only_for_search() {
        let search = CheckSource::Search(Vec::new());
        let single = CheckSource::Single(PathBuf::from("a.sh"));

        assert_eq!(
            resolve_selection(&[], &search),
            Some(Selection::default_checks())
        );
        assert_eq!(resolve_selection(&[], &single), None);
        assert_eq!(
            resolve_selection(&["gpu".to_string()], &single),
            Some(Selection::parse("gpu"))
        );
    }

    #[test]
    fn unmatched_selection_is_configuration_error() {
        let source = CheckSource::Search(Vec::new());
        let err = load_checks(&loader(), &source, Some(&Selection::parse("nothing"))).unwrap_err();
        assert!(matches!(err, DiagError::Configuration { .. }));
    }

    #[test]
    fn search_includes_builtin_modules() {
        let source = CheckSource::Search(Vec::new());
        let checks = load_checks(&loader(), &source, Some(&Selection::default_checks())).unwrap();
        assert_eq!(checks[0].name(), "host_check");
    }
}
