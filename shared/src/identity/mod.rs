//! Identity provider adapter.

pub mod cognito;
pub mod memory;

use crate::error::AuthError;
use crate::types::{RegisterRequest, User};
use async_trait::async_trait;
use serde::Serialize;

pub use cognito::CognitoIdentityProvider;
pub use memory::MemoryIdentityProvider;

/// Tokens issued on a successful sign-in.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub user_id: String,
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i32,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, AuthError>;

    /// Create the account and its student profile. Returns the new user id.
    async fn register(&self, request: &RegisterRequest) -> Result<String, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Role/department lookup keyed by user id.
    async fn lookup_profile(&self, user_id: &str) -> Result<User, AuthError>;
}
