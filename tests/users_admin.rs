mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::{spawn_app, Reply, TestApp, PASSWORD};
use globoo_auth::authz::Role;

async fn set_role(t: &TestApp, token: &str, user_id: Uuid, role: &str) -> Result<Reply> {
    let req = Request::builder()
        .method("PUT")
        .uri(format!("/api/users/{}/role", user_id))
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(json!({ "role": role }).to_string()))?;
    t.send(req).await
}

async fn delete_user(t: &TestApp, token: &str, user_id: Uuid) -> Result<Reply> {
    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/api/users/{}", user_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    t.send(req).await
}

#[tokio::test]
async fn admin_can_promote_but_not_crown() -> Result<()> {
    let t = spawn_app().await?;
    let admin = t.seed_user("Bruno Lima", "bruno@globoo.com.br", Role::Admin).await?;
    let assistant = t.seed_user("Ana Souza", "ana@globoo.com.br", Role::Assistant).await?;
    let admin_token = t.token_for(admin, Role::Admin)?;

    let promoted = set_role(&t, &admin_token, assistant, "admin").await?;
    assert_eq!(promoted.status, StatusCode::OK, "promotion failed: {}", promoted.body);
    assert_eq!(promoted.body["role"], "admin");

    let crowned = set_role(&t, &admin_token, assistant, "ceo").await?;
    assert_eq!(crowned.status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn assistants_cannot_change_roles() -> Result<()> {
    let t = spawn_app().await?;
    let assistant = t.seed_user("Ana Souza", "ana@globoo.com.br", Role::Assistant).await?;
    let token = t.token_for(assistant, Role::Assistant)?;

    let reply = set_role(&t, &token, assistant, "admin").await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["error"], "unauthorized");

    Ok(())
}

#[tokio::test]
async fn role_change_ends_existing_sessions() -> Result<()> {
    let t = spawn_app().await?;
    let ceo = t.seed_user("Carla Dias", "carla@globoo.com.br", Role::Ceo).await?;
    let assistant = t.seed_user("Ana Souza", "ana@globoo.com.br", Role::Assistant).await?;

    let login = t.login("ana@globoo.com.br", PASSWORD).await?;
    let refresh = login.str("refresh_token");

    let reply = set_role(&t, &t.token_for(ceo, Role::Ceo)?, assistant, "ceo").await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["role"], "ceo");

    let stale = t.post_json("/api/auth/refresh", json!({ "refresh_token": refresh })).await?;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);

    let fresh = t.login("ana@globoo.com.br", PASSWORD).await?;
    assert_eq!(fresh.body["user"]["role"], "ceo");

    Ok(())
}

#[tokio::test]
async fn unknown_user_or_role_is_rejected() -> Result<()> {
    let t = spawn_app().await?;
    let ceo = t.seed_user("Carla Dias", "carla@globoo.com.br", Role::Ceo).await?;
    let token = t.token_for(ceo, Role::Ceo)?;

    let missing = set_role(&t, &token, Uuid::new_v4(), "admin").await?;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let bogus = set_role(&t, &token, ceo, "intern").await?;
    assert!(bogus.status.is_client_error());

    Ok(())
}

#[tokio::test]
async fn only_ceo_deletes_accounts() -> Result<()> {
    let t = spawn_app().await?;
    let ceo = t.seed_user("Carla Dias", "carla@globoo.com.br", Role::Ceo).await?;
    let admin = t.seed_user("Bruno Lima", "bruno@globoo.com.br", Role::Admin).await?;
    let assistant = t.seed_user("Ana Souza", "ana@globoo.com.br", Role::Assistant).await?;

    let by_admin = delete_user(&t, &t.token_for(admin, Role::Admin)?, assistant).await?;
    assert_eq!(by_admin.status, StatusCode::FORBIDDEN);

    let ceo_token = t.token_for(ceo, Role::Ceo)?;
    let by_ceo = delete_user(&t, &ceo_token, assistant).await?;
    assert_eq!(by_ceo.status, StatusCode::NO_CONTENT);

    let gone = t.login("ana@globoo.com.br", PASSWORD).await?;
    assert_eq!(gone.status, StatusCode::UNAUTHORIZED);

    let twice = delete_user(&t, &ceo_token, assistant).await?;
    assert_eq!(twice.status, StatusCode::NOT_FOUND);

    let own = delete_user(&t, &ceo_token, ceo).await?;
    assert_eq!(own.status, StatusCode::BAD_REQUEST);

    Ok(())
}
