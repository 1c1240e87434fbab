use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::AppError;
use crate::models::user::DbUser;

pub const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at, deleted_at";

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    // Try RFC3339 first (e.g. 2025-11-19T12:34:56Z)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try SQLite default timestamp format: "YYYY-MM-DD HH:MM:SS" (with optional fractional seconds)
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range"))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, AppError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::internal(format!("missing {}: {}", name, e)))
}

pub fn db_user_from_row(row: &SqliteRow) -> Result<DbUser, AppError> {
    let id_s: String = column(row, "id")?;
    let name: String = column(row, "name")?;
    let email: String = column(row, "email")?;
    let password_hash: String = column(row, "password_hash")?;
    let role_s: String = column(row, "role")?;
    let created_at_s: String = column(row, "created_at")?;
    let updated_at_s: String = column(row, "updated_at")?;
    let deleted_at_s: Option<String> = column(row, "deleted_at")?;

    let id = Uuid::parse_str(&id_s).map_err(|e| AppError::internal(format!("invalid uuid: {}", e)))?;
    let role = role_s
        .parse::<Role>()
        .map_err(|_| AppError::internal(format!("invalid role stored for user {}: {}", id, role_s)))?;
    let created_at = parse_datetime(&created_at_s)?;
    let updated_at = parse_datetime(&updated_at_s)?;
    let deleted_at = match deleted_at_s {
        Some(s) if !s.trim().is_empty() => Some(parse_datetime(&s)?),
        _ => None,
    };

    Ok(DbUser {
        id,
        name,
        email,
        password_hash,
        role,
        created_at,
        updated_at,
        deleted_at,
    })
}
