//! Type-safe vocabulary for instance definitions
//!
//! Change categories, auxiliary script kinds, deployment types and link kinds
//! are closed enums so that matching on them is exhaustive. Artifact kinds are
//! the one open set: unknown kinds are kept by name and produce no script.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Coarse classification of what changed since the last deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeCategory {
    Artifacts,
    Deployment,
    Data,
}

/// Payload kind of an auxiliary script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScriptKind {
    /// Shell commands executed inside the instance's container
    Shell,
    /// Recognized but not rendered yet
    Python,
    /// Recognized but not rendered yet
    Sql,
}

impl ScriptKind {
    /// Whether scripts of this kind contribute a fragment
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Shell)
    }
}

/// Deployment backends known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeploymentType {
    /// Container runtime backend
    Docker,
}

/// What a folder link carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LinkKind {
    Artifact,
    Data,
}

/// Artifact source kind
///
/// Unknown kinds deserialize into `Unsupported` so that a definition carrying
/// them still loads; fetching them yields an empty script.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArtifactKind {
    Maven,
    Unsupported(String),
}

impl From<String> for ArtifactKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "maven" => Self::Maven,
            _ => Self::Unsupported(value),
        }
    }
}

impl From<ArtifactKind> for String {
    fn from(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Maven => "maven".to_string(),
            ArtifactKind::Unsupported(name) => name,
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Maven => write!(f, "maven"),
            Self::Unsupported(name) => write!(f, "{}", name),
        }
    }
}
