//! Check metadata and its validation.
//!
//! Plugins describe their checks with a [`MetadataDocument`], the wire form
//! shared by all three plugin kinds. [`Metadata::from_document`] validates it
//! and produces the immutable [`Metadata`] the runner works with.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DiagError, Result};

/// Privilege a check needs to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    #[default]
    User,
    Admin,
}

impl Privilege {
    /// Parse the `rights` field of a metadata document.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Privilege::User),
            "admin" => Some(Privilege::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Privilege::User => "user",
            Privilege::Admin => "admin",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata as plugins publish it.
///
/// `tags` is a comma-separated list and `dataReq` a JSON-encoded dependency
/// document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub name: String,

    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub tags: String,

    #[serde(default)]
    pub descr: String,

    #[serde(rename = "dataReq", default = "empty_dependency_document")]
    pub data_req: String,

    #[serde(default = "default_rights")]
    pub rights: String,

    pub timeout: i64,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub run: String,
}

fn empty_dependency_document() -> String {
    "{}".to_string()
}

fn default_rights() -> String {
    Privilege::User.as_str().to_string()
}

impl MetadataDocument {
    /// Parse a metadata document from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Validated, immutable description of one check.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    name: String,
    kind: String,
    tags: Vec<String>,
    description: String,
    dependencies: Map<String, Value>,
    privilege: Privilege,
    timeout_secs: u64,
    version: String,
    entry_point: String,
    api_version: String,
}

impl Metadata {
    /// Validate a document published by a plugin speaking `api_version`.
    ///
    /// Checks, in order: the dependency document is a JSON object, the name
    /// has no whitespace, no tag has whitespace, the privilege is known and
    /// the timeout is positive. Tags come out sorted.
    pub fn from_document(doc: MetadataDocument, api_version: impl Into<String>) -> Result<Self> {
        let invalid = |message: String| DiagError::InvalidMetadata {
            name: doc.name.clone(),
            message,
        };

        let dependencies = match serde_json::from_str::<Value>(&doc.data_req) {
            Ok(Value::Object(map)) => map,
            _ => {
                return Err(invalid(format!(
                    "'dataReq' value '{}' is not a JSON object",
                    doc.data_req
                )))
            }
        };

        if doc.name.is_empty() || doc.name.chars().any(char::is_whitespace) {
            return Err(invalid(
                "'name' must be non-empty and contain no whitespace".to_string(),
            ));
        }

        let tags = canonical_tags(&doc.tags);
        if let Some(tag) = tags.iter().find(|t| t.chars().any(char::is_whitespace)) {
            return Err(invalid(format!("tag '{}' contains whitespace", tag)));
        }

        let privilege = Privilege::parse(&doc.rights).ok_or_else(|| {
            invalid(format!(
                "'rights' must be 'user' or 'admin', got '{}'",
                doc.rights
            ))
        })?;

        if doc.timeout <= 0 {
            return Err(invalid(format!(
                "'timeout' must be a positive number of seconds, got {}",
                doc.timeout
            )));
        }

        Ok(Self {
            tags,
            dependencies,
            privilege,
            timeout_secs: doc.timeout as u64,
            name: doc.name,
            kind: doc.kind,
            description: doc.descr,
            version: doc.version,
            entry_point: doc.run,
            api_version: api_version.into(),
        })
    }

    /// Re-serialize to the wire form with canonical tag order.
    pub fn to_document(&self) -> MetadataDocument {
        MetadataDocument {
            name: self.name.clone(),
            kind: self.kind.clone(),
            tags: self.tags.join(","),
            descr: self.description.clone(),
            data_req: Value::Object(self.dependencies.clone()).to_string(),
            rights: self.privilege.as_str().to_string(),
            timeout: self.timeout_secs as i64,
            version: self.version.clone(),
            run: self.entry_point.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Tags in sorted order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The declared dependency document.
    pub fn dependencies(&self) -> &Map<String, Value> {
        &self.dependencies
    }

    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// API version of the plugin that provided this check.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }
}

fn canonical_tags(tags: &str) -> Vec<String> {
    let mut tags: Vec<String> = tags
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}
