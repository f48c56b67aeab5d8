//! Checks collected from plugins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::check::Check;
use crate::error::{DiagError, Result};

/// Every check discovered so far, with the plugin each came from.
#[derive(Debug, Default)]
pub struct Discovery {
    checks: Vec<Check>,
    sources: Vec<(PathBuf, Vec<String>)>,
    failures: Vec<DiagError>,
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the checks contributed by `source`.
    pub fn add(&mut self, source: PathBuf, checks: Vec<Check>) {
        let names = checks.iter().map(|c| c.name().to_string()).collect();
        self.sources.push((source, names));
        self.checks.extend(checks);
    }

    /// Record a plugin that contributed nothing.
    pub fn record_failure(&mut self, error: DiagError) {
        self.failures.push(error);
    }

    /// Append another discovery, keeping order.
    pub fn extend(&mut self, other: Discovery) {
        self.checks.extend(other.checks);
        self.sources.extend(other.sources);
        self.failures.extend(other.failures);
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Plugin paths with the check names each contributed.
    pub fn sources(&self) -> &[(PathBuf, Vec<String>)] {
        &self.sources
    }

    /// Load errors of plugins that contributed nothing.
    pub fn failures(&self) -> &[DiagError] {
        &self.failures
    }

    /// Fail if two plugins contribute a check with the same name.
    pub fn check_duplicates(&self) -> Result<()> {
        let mut seen: HashMap<&str, &Path> = HashMap::new();
        for (source, names) in &self.sources {
            for name in names {
                if let Some(first) = seen.insert(name.as_str(), source.as_path()) {
                    return Err(DiagError::DuplicateCheck {
                        name: name.clone(),
                        first: first.to_path_buf(),
                        second: source.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Hand out the checks once they are known to be usable.
    ///
    /// Duplicate names and an empty set are both fatal.
    pub fn into_checks(self) -> Result<Vec<Check>> {
        self.check_duplicates()?;
        if self.checks.is_empty() {
            return Err(DiagError::Configuration {
                message: "no checks were found".to_string(),
            });
        }
        Ok(self.checks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{Metadata, MetadataDocument, Summary};

    fn check(name: &str) -> Check {
        let doc = MetadataDocument::from_json(&format!(
            r#"{{"name": "{}", "tags": "gpu", "timeout": 5}}"#,
            name
        ))
        .unwrap();
        Check::from_fn(Metadata::from_document(doc, "0.2").unwrap(), |_| {
            Ok(Summary::failed("unused", "unused"))
        })
    }

    #[test]
    fn duplicate_names_across_plugins_are_fatal() {
        let mut discovery = Discovery::new();
        discovery.add(PathBuf::from("gpu.so"), vec![check("gpu_check")]);
        discovery.add(PathBuf::from("gpu.sh"), vec![check("gpu_check")]);

        let err = discovery.into_checks().unwrap_err();
        assert!(err.is_fatal());
        match err {
            DiagError::DuplicateCheck { name, first, second } => {
                assert_eq!(name, "gpu_check");
                assert_eq!(first, PathBuf::from("gpu.so"));
                assert_eq!(second, PathBuf::from("gpu.sh"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn empty_discovery_is_fatal() {
        let err = Discovery::new().into_checks().unwrap_err();
        assert!(matches!(err, DiagError::Configuration { .. }));
    }

    #[test]
    fn extend_keeps_discovery_order() {
        let mut first = Discovery::new();
        first.add(PathBuf::from("a.sh"), vec![check("a")]);
        let mut second = Discovery::new();
        second.add(PathBuf::from("b.sh"), vec![check("b"), check("c")]);

        first.extend(second);
        let names: Vec<_> = first
            .into_checks()
            .unwrap()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }
}
