//! Pending change model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of local mutation waiting to be pushed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

impl ChangeOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown change operation '{other}'")),
        }
    }
}

/// A locally applied mutation not yet confirmed by the remote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    /// Unique change id (UUID v7, so queue order is also creation order)
    pub id: Uuid,
    pub record_id: String,
    pub operation: ChangeOperation,
    #[serde(default)]
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
}

impl PendingChange {
    #[must_use]
    pub fn new(record_id: impl Into<String>, operation: ChangeOperation, payload: Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            record_id: record_id.into(),
            operation,
            payload,
            enqueued_at: Utc::now(),
        }
    }

    pub const fn is_destructive(&self) -> bool {
        matches!(self.operation, ChangeOperation::Delete)
    }
}
