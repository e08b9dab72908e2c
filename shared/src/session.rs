//! Explicit session context.
//!
//! Lifecycle operations never consult an ambient "current user"; callers
//! hand them a [`Session`]. [`SessionManager`] is the client-side holder of
//! the signed-in session and publishes the current user on every change.

use crate::error::AuthError;
use crate::identity::{Credentials, IdentityProvider};
use crate::types::User;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// An authenticated user plus the token used to end the session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub access_token: Option<String>,
}

impl Session {
    /// Session for a caller already authenticated upstream (API Gateway JWT).
    pub fn for_user(user: User) -> Self {
        Self {
            user,
            access_token: None,
        }
    }

    /// Sign in and load the caller's profile.
    pub async fn establish(
        provider: &dyn IdentityProvider,
        email: &str,
        password: &str,
    ) -> Result<(Session, Credentials), AuthError> {
        let credentials = provider.sign_in(email, password).await?;
        let user = provider.lookup_profile(&credentials.user_id).await?;
        let session = Session {
            user,
            access_token: Some(credentials.access_token.clone()),
        };
        Ok((session, credentials))
    }

    pub fn user_id(&self) -> &str {
        &self.user.user_id
    }
}

pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    current: Mutex<Option<Session>>,
    user_tx: watch::Sender<Option<User>>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (user_tx, _) = watch::channel(None);
        Self {
            provider,
            current: Mutex::new(None),
            user_tx,
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let (session, _) = Session::establish(self.provider.as_ref(), email, password).await?;
        *self.current.lock().await = Some(session.clone());
        self.user_tx.send_replace(Some(session.user.clone()));
        tracing::info!("Signed in as {}", session.user.email);
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let previous = self.current.lock().await.take();
        self.user_tx.send_replace(None);

        if let Some(token) = previous.and_then(|session| session.access_token) {
            self.provider.sign_out(&token).await?;
        }
        Ok(())
    }

    pub async fn session(&self) -> Option<Session> {
        self.current.lock().await.clone()
    }

    /// Stream of the signed-in user, `None` while signed out.
    pub fn current_user(&self) -> watch::Receiver<Option<User>> {
        self.user_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryIdentityProvider;
    use crate::types::Role;

    async fn provider() -> Arc<MemoryIdentityProvider> {
        let provider = Arc::new(MemoryIdentityProvider::new());
        provider
            .insert_user(
                User {
                    user_id: "fac-1".to_string(),
                    email: "fac@example.edu".to_string(),
                    department: "CS".to_string(),
                    year: None,
                    section: None,
                    role: Role::Faculty,
                },
                "hunter22",
            )
            .await;
        provider
    }

    #[tokio::test]
    async fn test_current_user_follows_sign_in_and_out() {
        let manager = SessionManager::new(provider().await);
        let mut current = manager.current_user();
        assert!(current.borrow().is_none());

        let session = manager.sign_in("fac@example.edu", "hunter22").await.unwrap();
        assert_eq!(session.user.role, Role::Faculty);
        current.changed().await.unwrap();
        assert_eq!(current.borrow().as_ref().map(|u| u.user_id.clone()), Some("fac-1".to_string()));

        manager.sign_out().await.unwrap();
        current.changed().await.unwrap();
        assert!(current.borrow().is_none());
        assert!(manager.session().await.is_none());
    }

    #[tokio::test]
    async fn test_bad_credentials_leave_user_signed_out() {
        let manager = SessionManager::new(provider().await);

        let result = manager.sign_in("fac@example.edu", "wrong").await;
        assert_eq!(result.unwrap_err(), AuthError::InvalidCredentials);
        assert!(manager.current_user().borrow().is_none());
    }
}
