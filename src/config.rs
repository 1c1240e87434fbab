use std::env;

use crate::authz::PermissionTable;
use crate::errors::AppError;
use crate::jwt::JwtConfig;

const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt: JwtConfig,
    pub refresh_ttl_days: i64,
    pub cookie_secure: bool,
    pub permission_table: PermissionTable,
}

impl Config {
    /// Defaults for everything except the signing key.
    pub fn new(jwt: JwtConfig) -> Self {
        Self {
            jwt,
            refresh_ttl_days: DEFAULT_REFRESH_TTL_DAYS,
            cookie_secure: true,
            permission_table: PermissionTable::builtin(),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let jwt = JwtConfig::from_env()?;

        let refresh_ttl_days = env::var("REFRESH_TOKEN_TTL_DAYS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(DEFAULT_REFRESH_TTL_DAYS))
            .map_err(|_| AppError::configuration("REFRESH_TOKEN_TTL_DAYS must be a valid integer"))?;
        if refresh_ttl_days <= 0 {
            return Err(AppError::configuration("REFRESH_TOKEN_TTL_DAYS must be positive"));
        }

        let cookie_secure = match env::var("COOKIE_SECURE") {
            Ok(val) => parse_bool(&val)
                .ok_or_else(|| AppError::configuration("COOKIE_SECURE must be true or false"))?,
            Err(_) => true,
        };

        let permission_table = match env::var("PERMISSION_TABLE_PATH").ok().filter(|p| !p.is_empty()) {
            Some(path) => {
                tracing::info!(path = %path, "loading permission table");
                PermissionTable::load(path)?
            }
            None => PermissionTable::builtin(),
        };

        Ok(Self {
            jwt,
            refresh_ttl_days,
            cookie_secure,
            permission_table,
        })
    }

    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_days * 86_400
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_token_lifetimes() {
        let config = Config::new(JwtConfig::new("secret", 24));
        assert_eq!(config.jwt.expires_in(), 86_400);
        assert_eq!(config.refresh_ttl_seconds(), 7 * 86_400);
        assert!(config.cookie_secure);
    }

    #[test]
    fn bool_flags_accept_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
