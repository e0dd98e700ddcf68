//! Audit entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ChangeOperation;

/// A unique identifier for an audit entry, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditEntryId(Uuid);

impl AuditEntryId {
    /// Create a new unique entry ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AuditEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AuditEntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// State-changing action recorded by the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Restore,
}

impl AuditAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Restore => "restore",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ChangeOperation> for AuditAction {
    fn from(operation: ChangeOperation) -> Self {
        match operation {
            ChangeOperation::Create => Self::Create,
            ChangeOperation::Update => Self::Update,
            ChangeOperation::Delete => Self::Delete,
        }
    }
}

/// Immutable record of a single state-changing action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub action: AuditAction,
    /// Transaction (record) the action applied to
    pub transaction_id: String,
    /// Serialized as RFC 3339 / ISO-8601 UTC
    pub changed_at: DateTime<Utc>,
    /// Device or user identifier responsible for the change
    pub changed_by: String,
    #[serde(default)]
    pub previous_state: Option<Value>,
    #[serde(default)]
    pub new_state: Option<Value>,
}

/// Input for `AuditStore::log_transaction_change`
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionChange {
    pub profile_id: String,
    pub transaction_id: String,
    pub action: AuditAction,
    pub previous_state: Option<Value>,
    pub new_state: Option<Value>,
    pub changed_by: String,
}

impl TransactionChange {
    pub fn new(
        profile_id: impl Into<String>,
        transaction_id: impl Into<String>,
        action: AuditAction,
        changed_by: impl Into<String>,
    ) -> Self {
        Self {
            profile_id: profile_id.into(),
            transaction_id: transaction_id.into(),
            action,
            previous_state: None,
            new_state: None,
            changed_by: changed_by.into(),
        }
    }

    #[must_use]
    pub fn with_previous_state(mut self, state: Option<Value>) -> Self {
        self.previous_state = state;
        self
    }

    #[must_use]
    pub fn with_new_state(mut self, state: Option<Value>) -> Self {
        self.new_state = state;
        self
    }
}
