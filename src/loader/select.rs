//! Tag and name selection.

use std::collections::BTreeSet;

use tracing::debug;

use crate::check::Check;

/// Selection applied when checks come from default locations.
pub const DEFAULT_SELECTION: &str = "default";
/// Selection keeping every check.
pub const ALL_SELECTION: &str = "all";

/// Set of tags and check names to keep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    items: BTreeSet<String>,
}

impl Selection {
    /// Parse a comma-separated selection.
    pub fn parse(s: &str) -> Self {
        Self::from_items(s.split(','))
    }

    pub fn from_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            items: items
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// The `default` selection.
    pub fn default_checks() -> Self {
        Self::from_items([DEFAULT_SELECTION])
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keeps_all(&self) -> bool {
        self.items.contains(ALL_SELECTION)
    }

    /// Whether `check` matches by name or by any tag.
    pub fn matches(&self, check: &Check) -> bool {
        self.keeps_all()
            || self.items.contains(check.name())
            || check
                .metadata()
                .tags()
                .iter()
                .any(|tag| self.items.contains(tag))
    }
}

/// Keep the checks `selection` matches and every loaded check they depend
/// on, directly or not, in their original order.
pub fn select(checks: Vec<Check>, selection: &Selection) -> Vec<Check> {
    let mut wanted: BTreeSet<&str> = checks
        .iter()
        .filter(|c| selection.matches(c))
        .map(|c| c.name())
        .collect();

    let mut queue: Vec<&str> = wanted.iter().copied().collect();
    while let Some(name) = queue.pop() {
        let Some(check) = checks.iter().find(|c| c.name() == name) else {
            continue;
        };
        for dependency in check.metadata().dependencies().keys() {
            if wanted.insert(dependency.as_str()) {
                debug!("Selecting '{}' as a dependency of '{}'", dependency, name);
                queue.push(dependency.as_str());
            }
        }
    }

    let wanted: BTreeSet<String> = wanted.into_iter().map(str::to_string).collect();
    checks
        .into_iter()
        .filter(|c| wanted.contains(c.name()))
        .collect()
}
