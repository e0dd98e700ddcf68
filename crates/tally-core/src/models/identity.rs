//! User/device identity supplied by the external auth layer

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Authenticated user on a specific device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub device_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            device_id: device_id.into(),
        }
    }
}

/// Source of the current identity, queried at call time
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;
}

/// Mutable identity holder updated by sign-in / sign-out flows
#[derive(Debug, Default)]
pub struct SessionIdentity {
    inner: RwLock<Option<Identity>>,
}

impl SessionIdentity {
    pub const fn new(identity: Option<Identity>) -> Self {
        Self {
            inner: RwLock::new(identity),
        }
    }

    pub fn sign_in(&self, identity: Identity) {
        *self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(identity);
    }

    pub fn sign_out(&self) {
        *self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}
