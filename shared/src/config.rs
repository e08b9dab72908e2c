use crate::error::ConfigError;
use std::env;

const DEFAULT_TABLE_NAME: &str = "complaint-box";
const DEFAULT_OWNER_INDEX: &str = "GSI1";
const DEFAULT_DEPARTMENT_INDEX: &str = "GSI2";

/// Runtime configuration, read once from the Lambda environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    pub owner_index: String,
    pub department_index: String,
    pub cognito_client_id: String,
    pub cognito_client_secret: String,
    pub cognito_user_pool_id: Option<String>,
    pub ws_api_endpoint: Option<String>,
    /// Accept the `X-User-Id` header as caller identity (local development only).
    pub allow_user_header: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            table_name: env::var("TABLE_NAME").unwrap_or_else(|_| DEFAULT_TABLE_NAME.to_string()),
            owner_index: env::var("OWNER_INDEX").unwrap_or_else(|_| DEFAULT_OWNER_INDEX.to_string()),
            department_index: env::var("DEPARTMENT_INDEX")
                .unwrap_or_else(|_| DEFAULT_DEPARTMENT_INDEX.to_string()),
            cognito_client_id: required("COGNITO_CLIENT_ID")?,
            cognito_client_secret: required("COGNITO_CLIENT_SECRET")?,
            cognito_user_pool_id: env::var("COGNITO_USER_POOL_ID").ok(),
            ws_api_endpoint: env::var("WS_API_ENDPOINT").ok(),
            allow_user_header: flag("ALLOW_USER_HEADER")?,
        })
    }

    /// Configuration for the stream consumer, which never talks to Cognito.
    pub fn stream_from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            table_name: env::var("TABLE_NAME").unwrap_or_else(|_| DEFAULT_TABLE_NAME.to_string()),
            owner_index: DEFAULT_OWNER_INDEX.to_string(),
            department_index: DEFAULT_DEPARTMENT_INDEX.to_string(),
            cognito_client_id: String::new(),
            cognito_client_secret: String::new(),
            cognito_user_pool_id: None,
            ws_api_endpoint: Some(required("WS_API_ENDPOINT")?),
            allow_user_header: false,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn flag(name: &'static str) -> Result<bool, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(false),
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" | "" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value }),
        },
    }
}
