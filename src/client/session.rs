use std::sync::{Arc, RwLock};

use crate::authz::Role;
use crate::models::user::{AuthResponse, TokenPair, UserProfile};

/// Tokens and identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

impl From<AuthResponse> for Session {
    fn from(value: AuthResponse) -> Self {
        Session {
            access_token: value.access_token,
            refresh_token: value.refresh_token,
            user: value.user,
        }
    }
}

/// Explicit, shareable holder for the current session.
///
/// Cloning shares the same slot, so a handle can be passed to whatever needs
/// to read the session instead of reaching for global state.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Session> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn set(&self, session: Session) {
        *self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(session);
    }

    /// Remove and return the session.
    pub fn take(&self) -> Option<Session> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner()).take()
    }

    pub fn clear(&self) {
        self.take();
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    pub fn role(&self) -> Option<Role> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|s| s.user.role)
    }

    /// Install a rotated pair, keeping the user projection.
    pub fn apply_rotation(&self, pair: &TokenPair) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.as_mut() {
            Some(session) => {
                session.access_token = pair.access_token.clone();
                session.refresh_token = pair.refresh_token.clone();
                true
            }
            None => false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner()).is_some()
    }
}
