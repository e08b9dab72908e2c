use super::{Credentials, IdentityProvider};
use crate::error::AuthError;
use crate::types::{RegisterRequest, Role, User};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

const TOKEN_LIFETIME_SECS: i32 = 3600;

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: User,
}

#[derive(Debug, Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
    tokens: HashMap<String, String>,
}

/// Identity provider backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    accounts: RwLock<Accounts>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an account with an explicit role, e.g. a faculty member.
    pub async fn insert_user(&self, user: User, password: &str) {
        self.accounts.write().await.by_email.insert(
            user.email.clone(),
            Account {
                password: password.to_string(),
                user,
            },
        );
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, AuthError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .by_email
            .get(email)
            .ok_or(AuthError::UserNotFound)?;
        if account.password != password {
            return Err(AuthError::InvalidCredentials);
        }
        let user_id = account.user.user_id.clone();

        let access_token = uuid::Uuid::new_v4().to_string();
        accounts.tokens.insert(access_token.clone(), user_id.clone());

        Ok(Credentials {
            user_id,
            id_token: uuid::Uuid::new_v4().to_string(),
            access_token,
            refresh_token: uuid::Uuid::new_v4().to_string(),
            expires_in: TOKEN_LIFETIME_SECS,
        })
    }

    async fn register(&self, request: &RegisterRequest) -> Result<String, AuthError> {
        if request.password.len() < 8 {
            return Err(AuthError::InvalidPassword);
        }

        let mut accounts = self.accounts.write().await;
        if accounts.by_email.contains_key(&request.email) {
            return Err(AuthError::AccountExists);
        }

        let user_id = uuid::Uuid::new_v4().to_string();
        accounts.by_email.insert(
            request.email.clone(),
            Account {
                password: request.password.clone(),
                user: User {
                    user_id: user_id.clone(),
                    email: request.email.clone(),
                    department: request.department.clone(),
                    year: request.year.clone(),
                    section: request.section.clone(),
                    role: Role::Student,
                },
            },
        );
        Ok(user_id)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.accounts
            .write()
            .await
            .tokens
            .remove(access_token)
            .map(|_| ())
            .ok_or(AuthError::Unauthenticated)
    }

    async fn lookup_profile(&self, user_id: &str) -> Result<User, AuthError> {
        self.accounts
            .read()
            .await
            .by_email
            .values()
            .find(|account| account.user.user_id == user_id)
            .map(|account| account.user.clone())
            .ok_or_else(|| AuthError::ProfileMissing(user_id.to_string()))
    }
}
