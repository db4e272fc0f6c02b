//! Shared contract and finding types exchanged with the contract service.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identity of a finding. The only field that survives re-fetches.
pub type FindingId = i64;

/// Identifier of a contract and of the analysis job running over it.
pub type ContractId = i64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown severity: {0}")]
    Severity(String),
    #[error("unknown contract status: {0}")]
    Status(String),
}

/// Risk level reported by the analysis step.
///
/// Variant order is priority order: `High` outranks `Medium` outranks `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Overlap priority: lower wins.
    pub fn priority(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    /// `true` when `self` should replace `other` on an overlapping span.
    pub fn outranks(self, other: Severity) -> bool {
        self.priority() < other.priority()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Self::High),
            "MEDIUM" => Ok(Self::Medium),
            "LOW" => Ok(Self::Low),
            _ => Err(ParseError::Severity(s.to_string())),
        }
    }
}

/// A reported risk item: a quoted clause and how severe it is.
///
/// The contract service calls the severity field `level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub clause: String,
    #[serde(rename = "level")]
    pub severity: Severity,
}

impl Finding {
    pub fn new(id: FindingId, clause: impl Into<String>, severity: Severity) -> Self {
        Self {
            id,
            clause: clause.into(),
            severity,
        }
    }
}

/// Full record behind a finding, fetched when a user inspects one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingDetail {
    pub id: FindingId,
    pub clause: String,
    #[serde(rename = "level")]
    pub severity: Severity,
    pub reason: String,
    pub suggestion: Option<String>,
}

/// Server-side analysis status of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContractStatus {
    Analyzing,
    Completed,
    Failed,
}

impl FromStr for ContractStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ANALYZING" => Ok(Self::Analyzing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(ParseError::Status(s.to_string())),
        }
    }
}

/// A stored contract with its extracted plain text.
///
/// `content` is the document every span offset refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: ContractId,
    pub filename: String,
    #[serde(default)]
    pub content: String,
    pub status: ContractStatus,
    /// Local timestamp without zone, as the service stores it.
    pub created_at: Option<NaiveDateTime>,
}
