#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("session expired, please log in again")]
    InvalidToken,
    #[error("not allowed for this role")]
    Unauthorized,
    #[error("no active session")]
    NotAuthenticated,
    #[error("service unavailable, try again later")]
    UpstreamUnavailable(#[source] reqwest::Error),
    #[error("unexpected response {status}: {body}")]
    Status { status: u16, body: String },
}

impl ClientError {
    /// Transport failures (connect, timeout, broken body) are never auth
    /// failures.
    pub fn from_transport(err: reqwest::Error) -> Self {
        ClientError::UpstreamUnavailable(err)
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ClientError::InvalidCredentials | ClientError::InvalidToken | ClientError::NotAuthenticated)
    }
}
