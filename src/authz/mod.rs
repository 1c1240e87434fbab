//! Authorization - roles, the route permission table and the policy evaluator
//!
//! A single [`PermissionTable`] is loaded at process start and shared by
//! reference between the request gate and the UI visibility helper
//! (`SessionClient::has_permission`). Nothing re-declares the table.

mod evaluator;
mod principal;
mod table;

pub use evaluator::{DefaultPolicyEvaluator, PolicyEvaluator};
pub use principal::Principal;
pub use table::{matches_prefix, PermissionTable};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;

/// Closed set of roles. Every user holds exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "CEO")]
    Ceo,
    #[serde(alias = "ADMIN")]
    Admin,
    #[serde(alias = "ASSISTANT")]
    Assistant,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Ceo, Role::Admin, Role::Assistant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Ceo => "ceo",
            Role::Admin => "admin",
            Role::Assistant => "assistant",
        }
    }

    /// Roles allowed to change other users' roles.
    pub fn is_administrative(&self) -> bool {
        matches!(self, Role::Ceo | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ceo" => Ok(Role::Ceo),
            "admin" | "administrator" => Ok(Role::Admin),
            "assistant" => Ok(Role::Assistant),
            other => Err(AppError::bad_request(format!("unknown role: {other}"))),
        }
    }
}
