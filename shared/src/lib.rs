pub mod auth;
pub mod complaints;
pub mod config;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod navigation;
pub mod responses;
pub mod session;
pub mod sockets;
pub mod store;
pub mod types;
pub mod users;

use aws_sdk_dynamodb::Client as DynamoClient;
use config::Config;
use error::AuthError;
use identity::IdentityProvider;
use lambda_http::{Request, RequestExt};
use lifecycle::ComplaintService;
use session::Session;
use std::sync::Arc;
use store::ComplaintStore;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub complaints: ComplaintService,
    pub identity: Arc<dyn IdentityProvider>,
    /// Connection registry for the WebSocket API; absent when running in memory.
    pub dynamo_client: Option<DynamoClient>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn ComplaintStore>,
        identity: Arc<dyn IdentityProvider>,
        dynamo_client: Option<DynamoClient>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            complaints: ComplaintService::new(store),
            identity,
            dynamo_client,
        })
    }

    /// Caller user id from the API Gateway JWT authorizer, or from
    /// `X-User-Id` when local overrides are enabled.
    pub fn caller_id(&self, event: &Request) -> Option<String> {
        let from_jwt = event
            .request_context_ref()
            .and_then(|ctx| ctx.authorizer())
            .and_then(|auth| auth.jwt.as_ref())
            .and_then(|jwt| jwt.claims.get("sub"))
            .map(|s| s.to_string());

        from_jwt.or_else(|| {
            if !self.config.allow_user_header {
                return None;
            }
            event
                .headers()
                .get("X-User-Id")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
    }

    /// Build the caller's session, loading their profile for the role.
    pub async fn caller_session(&self, event: &Request) -> Result<Session, AuthError> {
        let user_id = self.caller_id(event).ok_or_else(|| {
            tracing::warn!("Request without caller identity");
            AuthError::Unauthenticated
        })?;
        let user = self.identity.lookup_profile(&user_id).await?;
        Ok(Session::for_user(user))
    }
}
