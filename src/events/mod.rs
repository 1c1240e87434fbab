//! Audit trail for authentication events.
//!
//! Handlers and the token issuer publish onto a broadcast bus; a single
//! listener task projects events into the `auth_events` table. Publishing is
//! fire and forget so audit failures never break a request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod names {
    pub const LOGIN_SUCCEEDED: &str = "auth.login";
    pub const LOGIN_FAILED: &str = "auth.login_failed";
    pub const TOKEN_REFRESHED: &str = "auth.refreshed";
    pub const REFRESH_REUSE_DETECTED: &str = "auth.refresh_reuse_detected";
    pub const LOGGED_OUT: &str = "auth.logout";
    pub const USER_REGISTERED: &str = "user.registered";
    pub const ROLE_CHANGED: &str = "user.role_changed";
    pub const USER_DELETED: &str = "user.deleted";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: impl Into<String>, actor_id: Option<Uuid>, subject_id: Option<Uuid>, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<DomainEvent<Value>>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<DomainEvent<Value>>) {
    broadcast::channel(1024)
}

pub fn publish(bus: &EventBus, name: &str, actor_id: Option<Uuid>, subject_id: Option<Uuid>, payload: Value) {
    // No receiver is not an error: the audit trail is optional.
    let _ = bus.send(DomainEvent::new(name, actor_id, subject_id, payload));
}

pub async fn start_auth_event_listener(mut rx: broadcast::Receiver<DomainEvent<Value>>, pool: SqlitePool) {
    tracing::info!("auth event listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "auth event listener lagged, events dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if let Err(err) = persist(&pool, &event).await {
            tracing::error!(event = %event.name, "failed to save auth event: {}", err);
        }
    }
    tracing::info!("auth event listener stopped");
}

async fn persist(pool: &SqlitePool, event: &DomainEvent<Value>) -> Result<(), sqlx::Error> {
    let properties = serde_json::to_string(&event.payload).unwrap_or_else(|_| "{}".to_string());

    sqlx::query(
        "INSERT INTO auth_events (id, event_name, actor_id, subject_id, occurred_at, properties) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(event.id.to_string())
    .bind(&event.name)
    .bind(event.actor_id.map(|id| id.to_string()))
    .bind(event.subject_id.map(|id| id.to_string()))
    .bind(event.occurred_at.to_rfc3339())
    .bind(properties)
    .execute(pool)
    .await?;

    Ok(())
}
