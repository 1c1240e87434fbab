//! Gated page routes. The HR screens themselves live in the frontend; these
//! handlers only answer once the session gate has let a request through.

use axum::extract::{OriginalUri, Query};
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::authz::Principal;

#[derive(Debug, Serialize)]
pub struct PageView {
    pub view: &'static str,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Principal>,
}

#[derive(Debug, Deserialize)]
pub struct LoginPageQuery {
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

pub async fn login_page(OriginalUri(uri): OriginalUri, Query(query): Query<LoginPageQuery>) -> Json<PageView> {
    Json(PageView {
        view: "login",
        path: uri.path().to_string(),
        callback_url: query.callback_url.filter(|url| is_local_path(url)),
        user: None,
    })
}

pub async fn access_denied(OriginalUri(uri): OriginalUri, principal: Option<Extension<Principal>>) -> Json<PageView> {
    Json(PageView {
        view: "access_denied",
        path: uri.path().to_string(),
        callback_url: None,
        user: principal.map(|Extension(p)| p),
    })
}

pub async fn section(OriginalUri(uri): OriginalUri, principal: Option<Extension<Principal>>) -> Json<PageView> {
    let path = uri.path().to_string();
    let view = match path.split('/').nth(1) {
        Some("admin") => "admin",
        Some("backoffice") => "backoffice",
        _ => "dashboard",
    };

    Json(PageView {
        view,
        path,
        callback_url: None,
        user: principal.map(|Extension(p)| p),
    })
}

/// Only same-site paths are honoured as post-login targets.
pub fn is_local_path(url: &str) -> bool {
    url.starts_with('/') && !url.starts_with("//") && !url.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_must_stay_on_site() {
        assert!(is_local_path("/dashboard/folha"));
        assert!(!is_local_path("//evil.example"));
        assert!(!is_local_path("https://evil.example"));
        assert!(!is_local_path("/\\evil.example"));
    }
}
