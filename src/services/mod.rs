pub mod store;
pub mod token_issuer;

pub use store::{CredentialStore, RefreshTokenStore, RotateOutcome};
pub use token_issuer::TokenIssuer;
