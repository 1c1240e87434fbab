use serde::Serialize;
use uuid::Uuid;

use super::Role;
use crate::jwt::Claims;

/// Principal represents the authenticated caller as derived from an access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_ceo(&self) -> bool {
        self.role == Role::Ceo
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
        }
    }
}
