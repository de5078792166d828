//! Shared taxonomy: agents, documents, and the analysis key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The four analysis agents a document can be run through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Clause,
    Risk,
    Draft,
    Summary,
}

impl AgentType {
    /// All agents, in report-page order.
    pub const ALL: [AgentType; 4] = [
        AgentType::Clause,
        AgentType::Risk,
        AgentType::Draft,
        AgentType::Summary,
    ];

    /// Route segment used by the analysis backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Clause => "clause",
            AgentType::Risk => "risk",
            AgentType::Draft => "draft",
            AgentType::Summary => "summary",
        }
    }

    /// Human-readable agent name for report headings.
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentType::Clause => "Clause Extraction",
            AgentType::Risk => "Risk Detection",
            AgentType::Draft => "Drafting",
            AgentType::Summary => "Summary",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an agent name is not recognised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown agent type '{0}': expected one of clause, risk, draft, summary")]
pub struct UnknownAgent(pub String);

impl FromStr for AgentType {
    type Err = UnknownAgent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clause" => Ok(AgentType::Clause),
            "risk" => Ok(AgentType::Risk),
            "draft" => Ok(AgentType::Draft),
            "summary" => Ok(AgentType::Summary),
            _ => Err(UnknownAgent(s.to_string())),
        }
    }
}

/// Opaque document identifier issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for DocumentId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Identifies one unit of analysis work: a document seen through one agent.
///
/// Used as the controller identity and as the cache key for fetched results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisKey {
    pub document_id: DocumentId,
    pub agent: AgentType,
}

impl AnalysisKey {
    pub fn new(document_id: impl Into<DocumentId>, agent: AgentType) -> Self {
        Self {
            document_id: document_id.into(),
            agent,
        }
    }
}

impl fmt::Display for AnalysisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.document_id, self.agent)
    }
}
