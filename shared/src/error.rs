use thiserror::Error;

/// Failures reported by the identity provider or the session layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Please verify your email before logging in")]
    UserNotConfirmed,

    #[error("No account found with this email")]
    UserNotFound,

    #[error("Password reset required")]
    PasswordResetRequired,

    #[error("Too many login attempts. Please try again later")]
    TooManyRequests,

    #[error("An account with this email already exists")]
    AccountExists,

    #[error("Password must contain at least 8 characters with uppercase, lowercase, number, and special character")]
    InvalidPassword,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("No profile found for user {0}")]
    ProfileMissing(String),

    #[error("Identity provider error: {0}")]
    Provider(String),
}

/// Failures reported by a complaint store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("complaint {0} not found")]
    NotFound(String),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the complaint lifecycle operations.
#[derive(Debug, Error)]
pub enum ComplaintError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("You don't have permission to perform this action")]
    AccessDenied,

    #[error("Complaint {0} not found")]
    NotFound(String),

    /// A status or reply write failed.
    #[error("update failed: {0}")]
    Update(StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
