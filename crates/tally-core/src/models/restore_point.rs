//! Restore point model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::LocalState;

/// A unique identifier for a restore point, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestorePointId(Uuid);

impl RestorePointId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RestorePointId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RestorePointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RestorePointId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A named full-state snapshot a profile can be rolled back to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorePoint {
    pub id: RestorePointId,
    pub created_at: DateTime<Utc>,
    pub label: String,
    pub snapshot: LocalState,
}

impl RestorePoint {
    #[must_use]
    pub fn new(label: impl Into<String>, snapshot: LocalState) -> Self {
        Self {
            id: RestorePointId::new(),
            created_at: Utc::now(),
            label: label.into(),
            snapshot,
        }
    }
}
