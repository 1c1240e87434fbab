//! Per-request session gate.
//!
//! Re-derives the caller's identity from the bearer token, applies the
//! permission table and either forwards the request or redirects. Token
//! problems never surface as errors here; they only make the caller
//! unauthenticated.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::app::AppState;
use crate::authz::{matches_prefix, PolicyEvaluator, Principal};
use crate::jwt::{bearer_token, JwtConfig};
use crate::utils::encode_query_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    AuthenticatedNoPermission,
    AuthenticatedPermitted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Forward,
    RedirectToLogin { location: String },
    RedirectAccessDenied { location: String },
    RedirectLanding { location: String },
}

/// Route groups the gate knows about.
#[derive(Debug, Clone)]
pub struct GateRoutes {
    pub protected: Vec<String>,
    pub auth_only: Vec<String>,
    pub login_path: String,
    pub access_denied_path: String,
    pub landing_path: String,
}

impl Default for GateRoutes {
    fn default() -> Self {
        Self {
            protected: vec!["/dashboard".to_string(), "/admin".to_string(), "/backoffice".to_string()],
            auth_only: vec!["/auth/login".to_string()],
            login_path: "/auth/login".to_string(),
            access_denied_path: "/acesso-negado".to_string(),
            landing_path: "/dashboard".to_string(),
        }
    }
}

impl GateRoutes {
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected.iter().any(|prefix| matches_prefix(path, prefix))
    }

    pub fn is_auth_only(&self, path: &str) -> bool {
        self.auth_only.iter().any(|prefix| matches_prefix(path, prefix))
    }
}

#[derive(Clone)]
pub struct SessionGate {
    evaluator: Arc<dyn PolicyEvaluator>,
    routes: GateRoutes,
}

impl SessionGate {
    pub fn new(evaluator: Arc<dyn PolicyEvaluator>, routes: GateRoutes) -> Self {
        Self { evaluator, routes }
    }

    /// Decoding failures of any kind collapse to `None`.
    pub fn authenticate(&self, jwt: &JwtConfig, token: Option<&str>) -> Option<Principal> {
        let token = token?;
        match jwt.decode(token) {
            Ok(claims) => Some(Principal::from(claims)),
            Err(err) => {
                tracing::debug!(error = %err, "discarding unusable access token");
                None
            }
        }
    }

    pub fn state(&self, principal: Option<&Principal>, path: &str) -> SessionState {
        match principal {
            None => SessionState::Unauthenticated,
            Some(principal) if self.evaluator.can(principal, path) => SessionState::AuthenticatedPermitted,
            Some(_) => SessionState::AuthenticatedNoPermission,
        }
    }

    pub fn decide(&self, principal: Option<&Principal>, path: &str, query: Option<&str>) -> GateDecision {
        if principal.is_some() && self.routes.is_auth_only(path) {
            return GateDecision::RedirectLanding {
                location: self.routes.landing_path.clone(),
            };
        }

        if !self.routes.is_protected(path) {
            return GateDecision::Forward;
        }

        match self.state(principal, path) {
            SessionState::Unauthenticated => {
                let callback = match query {
                    Some(q) if !q.is_empty() => format!("{path}?{q}"),
                    _ => path.to_string(),
                };
                GateDecision::RedirectToLogin {
                    location: format!("{}?callbackUrl={}", self.routes.login_path, encode_query_value(&callback)),
                }
            }
            SessionState::AuthenticatedNoPermission => GateDecision::RedirectAccessDenied {
                location: self.routes.access_denied_path.clone(),
            },
            SessionState::AuthenticatedPermitted => GateDecision::Forward,
        }
    }
}

pub async fn session_gate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let principal = state.gate.authenticate(&state.jwt, bearer_token(req.headers()));
    let path = req.uri().path().to_string();
    let decision = state.gate.decide(principal.as_ref(), &path, req.uri().query());

    match decision {
        GateDecision::Forward => {
            if let Some(principal) = principal {
                req.extensions_mut().insert(principal);
            }
            next.run(req).await
        }
        GateDecision::RedirectToLogin { location } => {
            tracing::debug!(path = %path, "unauthenticated, redirecting to login");
            Redirect::temporary(&location).into_response()
        }
        GateDecision::RedirectAccessDenied { location } => {
            if let Some(principal) = principal {
                tracing::info!(user_id = %principal.user_id, role = %principal.role, path = %path, "access denied");
            }
            Redirect::temporary(&location).into_response()
        }
        GateDecision::RedirectLanding { location } => Redirect::temporary(&location).into_response(),
    }
}
