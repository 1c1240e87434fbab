use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::Role;
use crate::errors::AppError;

/// Static role -> allowed route prefixes mapping.
///
/// Backoffice prefixes sit outside the per-role entries: they are granted to
/// [`Role::Ceo`] and to nobody else, whatever the entries say.
#[derive(Debug, Clone)]
pub struct PermissionTable {
    entries: HashMap<Role, Vec<String>>,
    backoffice: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    #[serde(default)]
    roles: HashMap<String, Vec<String>>,
    #[serde(default)]
    backoffice: Vec<String>,
}

impl PermissionTable {
    pub fn new(entries: HashMap<Role, Vec<String>>, backoffice: Vec<String>) -> Self {
        let table = Self { entries, backoffice };
        for role in Role::ALL {
            if table.prefixes(role).is_empty() {
                tracing::warn!(role = %role, "role has no permission entry, all protected routes will be denied");
            }
        }
        table
    }

    /// Dashboard areas for every role, administration for CEO and ADMIN,
    /// backoffice for CEO only.
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();
        entries.insert(Role::Ceo, vec!["/dashboard".to_string(), "/admin".to_string()]);
        entries.insert(Role::Admin, vec!["/dashboard".to_string(), "/admin".to_string()]);
        entries.insert(Role::Assistant, vec!["/dashboard".to_string()]);

        Self::new(entries, vec!["/backoffice".to_string()])
    }

    /// Parse `{"roles": {"ceo": ["/dashboard"]}, "backoffice": ["/backoffice"]}`.
    pub fn from_json_str(raw: &str) -> Result<Self, AppError> {
        let raw: RawTable = serde_json::from_str(raw)
            .map_err(|err| AppError::configuration(format!("invalid permission table: {err}")))?;

        let mut entries = HashMap::new();
        for (name, prefixes) in raw.roles {
            let role = name
                .parse::<Role>()
                .map_err(|_| AppError::configuration(format!("permission table names unknown role '{name}'")))?;
            entries.insert(role, prefixes.into_iter().map(normalize_prefix).collect());
        }

        Ok(Self::new(entries, raw.backoffice.into_iter().map(normalize_prefix).collect()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AppError::configuration(format!("failed to read permission table {}: {err}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Prefixes declared for `role`; empty when the role is undeclared.
    pub fn prefixes(&self, role: Role) -> &[String] {
        self.entries.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_backoffice(&self, path: &str) -> bool {
        self.backoffice.iter().any(|prefix| matches_prefix(path, prefix))
    }

    pub fn has_permission(&self, role: Role, path: &str) -> bool {
        if self.is_backoffice(path) {
            return role == Role::Ceo;
        }

        self.prefixes(role).iter().any(|prefix| matches_prefix(path, prefix))
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Segment-aware prefix test: `/admin` covers `/admin` and `/admin/users`
/// but not `/administration`.
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.starts_with('/');
    }

    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn normalize_prefix(prefix: String) -> String {
    let trimmed = prefix.trim();
    let with_slash = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };

    if with_slash.len() > 1 {
        with_slash.trim_end_matches('/').to_string()
    } else {
        with_slash
    }
}
