use super::{Credentials, IdentityProvider};
use crate::error::AuthError;
use crate::store::codec::{user_from_item, user_key, user_to_item};
use crate::types::{RegisterRequest, Role, User};
use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::types::{AttributeType, AuthFlowType};
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Cognito user pool for credentials, DynamoDB for the user profile.
pub struct CognitoIdentityProvider {
    cognito_client: CognitoClient,
    dynamo_client: DynamoClient,
    table_name: String,
    client_id: String,
    client_secret: String,
    user_pool_id: Option<String>,
}

impl CognitoIdentityProvider {
    pub fn new(
        cognito_client: CognitoClient,
        dynamo_client: DynamoClient,
        table_name: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        user_pool_id: Option<String>,
    ) -> Self {
        Self {
            cognito_client,
            dynamo_client,
            table_name: table_name.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            user_pool_id,
        }
    }

    async fn resolve_user_id(&self, access_token: &str) -> Result<String, AuthError> {
        let response = self
            .cognito_client
            .get_user()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| classify_provider_error(&format!("{:?}", e)))?;

        response
            .user_attributes()
            .iter()
            .find(|attr| attr.name() == "sub")
            .and_then(|attr| attr.value())
            .map(|sub| sub.to_string())
            .ok_or_else(|| AuthError::Provider("user has no sub attribute".to_string()))
    }

    async fn save_profile(&self, user: &User) -> Result<(), AuthError> {
        let item = user_to_item(user, &chrono::Utc::now());
        self.dynamo_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("Failed to store profile: {:?}", e)))?;
        Ok(())
    }
}

/// Compute the SECRET_HASH for Cognito authentication
pub fn compute_secret_hash(username: &str, client_id: &str, client_secret: &str) -> String {
    let message = format!("{}{}", username, client_id);
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    let result = mac.finalize();
    general_purpose::STANDARD.encode(result.into_bytes())
}

/// Map a Cognito error (debug formatted) onto the auth taxonomy.
pub fn classify_provider_error(error_message: &str) -> AuthError {
    if error_message.contains("NotAuthorizedException") {
        AuthError::InvalidCredentials
    } else if error_message.contains("UserNotConfirmedException") {
        AuthError::UserNotConfirmed
    } else if error_message.contains("UserNotFoundException") {
        AuthError::UserNotFound
    } else if error_message.contains("PasswordResetRequiredException") {
        AuthError::PasswordResetRequired
    } else if error_message.contains("TooManyRequestsException") {
        AuthError::TooManyRequests
    } else if error_message.contains("UsernameExistsException") {
        AuthError::AccountExists
    } else if error_message.contains("InvalidPasswordException") {
        AuthError::InvalidPassword
    } else {
        AuthError::Provider(error_message.to_string())
    }
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, AuthError> {
        tracing::info!("Authenticating user: {}", email);

        let secret_hash = compute_secret_hash(email, &self.client_id, &self.client_secret);

        let response = self
            .cognito_client
            .initiate_auth()
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .client_id(&self.client_id)
            .auth_parameters("USERNAME", email)
            .auth_parameters("PASSWORD", password)
            .auth_parameters("SECRET_HASH", &secret_hash)
            .send()
            .await
            .map_err(|e| {
                let error_message = format!("{:?}", e);
                tracing::error!("Cognito authentication error: {}", error_message);
                classify_provider_error(&error_message)
            })?;

        let auth_result = response.authentication_result().ok_or_else(|| {
            tracing::error!("No authentication result returned");
            AuthError::Provider("No authentication result returned".to_string())
        })?;

        let access_token = auth_result.access_token().unwrap_or_default().to_string();
        let user_id = self.resolve_user_id(&access_token).await?;

        tracing::info!("Authentication successful for user: {}", email);

        Ok(Credentials {
            user_id,
            id_token: auth_result.id_token().unwrap_or_default().to_string(),
            access_token,
            refresh_token: auth_result.refresh_token().unwrap_or_default().to_string(),
            expires_in: auth_result.expires_in(),
        })
    }

    async fn register(&self, request: &RegisterRequest) -> Result<String, AuthError> {
        tracing::info!("Signing up user: {}", request.email);

        let secret_hash = compute_secret_hash(&request.email, &self.client_id, &self.client_secret);

        let email_attribute = AttributeType::builder()
            .name("email")
            .value(&request.email)
            .build()
            .map_err(|e| AuthError::Provider(format!("{:?}", e)))?;

        let response = self
            .cognito_client
            .sign_up()
            .client_id(&self.client_id)
            .username(&request.email)
            .password(&request.password)
            .secret_hash(&secret_hash)
            .user_attributes(email_attribute)
            .send()
            .await
            .map_err(|e| {
                let error_message = format!("{:?}", e);
                tracing::error!("Cognito signup error: {}", error_message);
                classify_provider_error(&error_message)
            })?;

        let user_id = response.user_sub().to_string();

        if let Some(user_pool_id) = &self.user_pool_id {
            if let Err(e) = self
                .cognito_client
                .admin_confirm_sign_up()
                .user_pool_id(user_pool_id)
                .username(&request.email)
                .send()
                .await
            {
                // The user can still confirm through the verification email.
                tracing::error!("Failed to auto-confirm user: {:?}", e);
            } else {
                tracing::info!("User auto-confirmed: {}", request.email);
            }
        } else {
            tracing::warn!("COGNITO_USER_POOL_ID not set; skipping auto-confirm");
        }

        let user = User {
            user_id: user_id.clone(),
            email: request.email.clone(),
            department: request.department.clone(),
            year: request.year.clone(),
            section: request.section.clone(),
            role: Role::Student,
        };
        self.save_profile(&user).await?;

        tracing::info!("Signup successful for user: {}", request.email);
        Ok(user_id)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.cognito_client
            .global_sign_out()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| classify_provider_error(&format!("{:?}", e)))?;
        Ok(())
    }

    async fn lookup_profile(&self, user_id: &str) -> Result<User, AuthError> {
        let pk = user_key(user_id);

        let result = self
            .dynamo_client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("Failed to load profile: {:?}", e)))?;

        match result.item() {
            Some(item) => user_from_item(user_id, item).map_err(|e| {
                tracing::error!("Unreadable profile for {}: {}", user_id, e);
                AuthError::ProfileMissing(user_id.to_string())
            }),
            None => Err(AuthError::ProfileMissing(user_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_hash_is_keyed_by_username_and_client() {
        let hash = compute_secret_hash("a@example.edu", "client", "secret");

        assert_eq!(hash, compute_secret_hash("a@example.edu", "client", "secret"));
        assert_ne!(hash, compute_secret_hash("b@example.edu", "client", "secret"));
        assert_ne!(hash, compute_secret_hash("a@example.edu", "client", "other"));
        // base64 of a 32-byte digest
        assert_eq!(hash.len(), 44);
    }

    #[test]
    fn test_classify_provider_error() {
        assert_eq!(
            classify_provider_error("ServiceError { source: NotAuthorizedException(..) }"),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            classify_provider_error("UsernameExistsException"),
            AuthError::AccountExists
        );
        assert!(matches!(
            classify_provider_error("DispatchFailure(timeout)"),
            AuthError::Provider(_)
        ));
    }
}
