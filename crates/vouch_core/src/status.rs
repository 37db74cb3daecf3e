//! Request kinds, decisions, row statuses and the outcome of every
//! lifecycle operation.
//!
//! Outcomes are values, not errors: "nothing pending" and "operation
//! failed" are distinct variants the caller can branch on.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Field name to error message. Empty means valid.
pub type ValidationErrors = BTreeMap<String, String>;

/// Nature of a submitted change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestKind {
    Add,
    Update,
    Delete,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Add => "ADD",
            RequestKind::Update => "UPDATE",
            RequestKind::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADD" => Ok(RequestKind::Add),
            "UPDATE" => Ok(RequestKind::Update),
            "DELETE" => Ok(RequestKind::Delete),
            other => Err(format!("Unknown request kind: {}", other)),
        }
    }
}

/// A checker's decision on a pending change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Approve,
    Reject,
    Rectify,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Approve => "APPROVE",
            Action::Reject => "REJECT",
            Action::Rectify => "RECTIFY",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROVE" => Ok(Action::Approve),
            "REJECT" => Ok(Action::Reject),
            "RECTIFY" => Ok(Action::Rectify),
            other => Err(format!("Unknown action: {}", other)),
        }
    }
}

/// Value of the STATUS column.
///
/// Staging rows are PENDING or RECTIFY; history rows are APPROVE or REJECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RowStatus {
    Pending,
    Rectify,
    Approve,
    Reject,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Pending => "PENDING",
            RowStatus::Rectify => "RECTIFY",
            RowStatus::Approve => "APPROVE",
            RowStatus::Reject => "REJECT",
        }
    }

    /// History status recorded for a terminal decision.
    pub fn for_decision(action: Action) -> Option<Self> {
        match action {
            Action::Approve => Some(RowStatus::Approve),
            Action::Reject => Some(RowStatus::Reject),
            Action::Rectify => None,
        }
    }
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(RowStatus::Pending),
            "RECTIFY" => Ok(RowStatus::Rectify),
            "APPROVE" => Ok(RowStatus::Approve),
            "REJECT" => Ok(RowStatus::Reject),
            other => Err(format!("Unknown row status: {}", other)),
        }
    }
}

/// Outcome of `submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitStatus {
    Success(RequestKind),
    ApprovalPending,
    DataAlreadyPresent,
    DataNotPresent,
    ValidationFailed(ValidationErrors),
    PersistenceFailed,
}

impl SubmitStatus {
    pub fn code(&self) -> &'static str {
        match self {
            SubmitStatus::Success(_) => "SUCCESS",
            SubmitStatus::ApprovalPending => "APPROVAL_PENDING",
            SubmitStatus::DataAlreadyPresent => "DATA_ALREADY_PRESENT",
            SubmitStatus::DataNotPresent => "DATA_NOT_PRESENT",
            SubmitStatus::ValidationFailed(_) => "VALIDATION_FAILED",
            SubmitStatus::PersistenceFailed => "PERSISTENCE_FAILED",
        }
    }

    pub fn message(&self) -> String {
        match self {
            SubmitStatus::Success(kind) => format!("Data added for approval: {}", kind),
            SubmitStatus::ApprovalPending => "Data is already pending for approval".to_string(),
            SubmitStatus::DataAlreadyPresent => "Data already present".to_string(),
            SubmitStatus::DataNotPresent => "Data not present".to_string(),
            SubmitStatus::ValidationFailed(_) => "Validation failed".to_string(),
            SubmitStatus::PersistenceFailed => "Failed to persist data".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubmitStatus::Success(_))
    }
}

/// Outcome of `decide`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionStatus {
    ActionSuccessful(Action),
    ActionFailed(Action),
    NoRequestPending,
}

impl DecisionStatus {
    pub fn code(&self) -> &'static str {
        match self {
            DecisionStatus::ActionSuccessful(_) => "ACTION_SUCCESSFUL",
            DecisionStatus::ActionFailed(_) => "ACTION_FAILED",
            DecisionStatus::NoRequestPending => "NO_REQUEST_PENDING",
        }
    }

    pub fn message(&self) -> String {
        match self {
            DecisionStatus::ActionSuccessful(action) => format!("{} action successful", action),
            DecisionStatus::ActionFailed(action) => format!("{} action failed", action),
            DecisionStatus::NoRequestPending => "No request pending".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DecisionStatus::ActionSuccessful(_))
    }
}

/// Outcome of the maker-side `rectify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RectifyStatus {
    RectificationSuccessful,
    NoRequestPending,
    ValidationFailed(ValidationErrors),
    RectificationFailed,
}

impl RectifyStatus {
    pub fn code(&self) -> &'static str {
        match self {
            RectifyStatus::RectificationSuccessful => "RECTIFICATION_SUCCESSFUL",
            RectifyStatus::NoRequestPending => "NO_REQUEST_PENDING",
            RectifyStatus::ValidationFailed(_) => "VALIDATION_FAILED",
            RectifyStatus::RectificationFailed => "RECTIFICATION_FAILED",
        }
    }

    pub fn message(&self) -> String {
        match self {
            RectifyStatus::RectificationSuccessful => {
                "Data rectified and resubmitted for approval".to_string()
            }
            RectifyStatus::NoRequestPending => "No request pending for rectification".to_string(),
            RectifyStatus::ValidationFailed(_) => "Validation failed".to_string(),
            RectifyStatus::RectificationFailed => "Rectification failed".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RectifyStatus::RectificationSuccessful)
    }
}

fn serialize_status<S: Serializer>(
    serializer: S,
    code: &str,
    message: &str,
    errors: Option<&ValidationErrors>,
) -> Result<S::Ok, S::Error> {
    let len = if errors.is_some() { 3 } else { 2 };
    let mut state = serializer.serialize_struct("Status", len)?;
    state.serialize_field("code", code)?;
    state.serialize_field("message", message)?;
    if let Some(errors) = errors {
        state.serialize_field("errors", errors)?;
    }
    state.end()
}

impl Serialize for SubmitStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let errors = match self {
            SubmitStatus::ValidationFailed(errors) => Some(errors),
            _ => None,
        };
        serialize_status(serializer, self.code(), &self.message(), errors)
    }
}

impl Serialize for DecisionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_status(serializer, self.code(), &self.message(), None)
    }
}

impl Serialize for RectifyStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let errors = match self {
            RectifyStatus::ValidationFailed(errors) => Some(errors),
            _ => None,
        };
        serialize_status(serializer, self.code(), &self.message(), errors)
    }
}
