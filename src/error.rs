/// Error Handling Module
///
/// This module provides a unified error handling system for the authentication service.
/// It covers:
/// 1. Domain-specific error types (validation, authentication, storage, configuration)
/// 2. A unified `AppError` used for control flow
/// 3. HTTP response mapping that never leaks authentication detail
/// 4. Structured error logging with context

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

use crate::auth::TokenError;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for signup input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
        }
    }
}

impl StdError for ValidationError {}

/// Authentication failures.
///
/// Every variant reaches the caller as the same unauthorized response. The
/// distinction only survives in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    CredentialInvalid,
    TokenExpired,
    TokenMalformed,
    TokenSignatureMismatch,
    TokenAudienceMismatch,
    TokenIssuerMismatch,
    TokenKindMismatch,
    RefreshTokenUnknown,
    UserMismatch,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::CredentialInvalid => write!(f, "Invalid credentials"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::TokenMalformed => write!(f, "Token is malformed"),
            AuthError::TokenSignatureMismatch => write!(f, "Token signature mismatch"),
            AuthError::TokenAudienceMismatch => write!(f, "Token audience mismatch"),
            AuthError::TokenIssuerMismatch => write!(f, "Token issuer mismatch"),
            AuthError::TokenKindMismatch => write!(f, "Token used as the wrong kind"),
            AuthError::RefreshTokenUnknown => write!(f, "Refresh token was never issued"),
            AuthError::UserMismatch => write!(f, "Token subject does not match stored owner"),
        }
    }
}

impl StdError for AuthError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::SignatureMismatch => AuthError::TokenSignatureMismatch,
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::AudienceMismatch => AuthError::TokenAudienceMismatch,
            TokenError::IssuerMismatch => AuthError::TokenIssuerMismatch,
            TokenError::KindMismatch => AuthError::TokenKindMismatch,
            TokenError::Malformed => AuthError::TokenMalformed,
        }
    }
}

/// User directory and refresh token store failures
#[derive(Debug)]
pub enum StorageError {
    Duplicate(String),
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Duplicate(msg) => write!(f, "Duplicate entry: {}", msg),
            StorageError::Unavailable(msg) => write!(f, "Storage unavailable: {}", msg),
        }
    }
}

impl StdError for StorageError {}

/// Configuration errors. Always fatal at startup.
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    Storage(StorageError),
    Config(ConfigError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Storage(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl AppError {
    /// Internal authentication failure kind, if this is one.
    pub fn auth_kind(&self) -> Option<AuthError> {
        match self {
            AppError::Auth(e) => Some(*e),
            _ => None,
        }
    }
}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Auth(err.into())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // 23505: unique_violation
            if db_err.code().as_deref() == Some("23505") {
                return StorageError::Duplicate(db_err.message().to_string());
            }
        }
        StorageError::Unavailable(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Storage(err.into())
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses
///
/// Never logs. Handlers log failures once through [`ErrorContext`].
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (code, message) = match self {
            // Signup input problems -> 409, matching the wire contract
            AppError::Validation(e) => ("VALIDATION_ERROR", e.to_string()),

            // Every authentication failure looks identical from outside
            AppError::Auth(_) => ("UNAUTHORIZED", "Invalid credentials".to_string()),

            AppError::Storage(StorageError::Duplicate(_)) => {
                ("DUPLICATE_ENTRY", "Username already registered".to_string())
            }
            AppError::Storage(StorageError::Unavailable(_)) => (
                "SERVICE_UNAVAILABLE",
                "Storage temporarily unavailable".to_string(),
            ),

            AppError::Config(_) => ("CONFIG_ERROR", "Server configuration error".to_string()),

            AppError::Internal(_) => ("INTERNAL_ERROR", "Internal server error".to_string()),
        };

        let status = self.status();
        let error_response = ErrorResponse::new(
            request_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
        );

        (status, error_response)
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::CONFLICT,
            AppError::Auth(_) => StatusCode::NOT_FOUND,
            AppError::Storage(StorageError::Duplicate(_)) => StatusCode::CONFLICT,
            AppError::Storage(StorageError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        self.status()
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-request context for log correlation
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: String,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
        }
    }

    /// The one log line for a failed request
    pub fn log_error(&self, error: &AppError) {
        match error {
            AppError::Validation(e) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    error = %e,
                    "Validation error"
                );
            }
            AppError::Auth(AuthError::CredentialInvalid) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    "Invalid credentials attempt"
                );
            }
            AppError::Auth(e) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    reason = ?e,
                    "Authentication rejected"
                );
            }
            AppError::Storage(StorageError::Duplicate(_)) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    error = %error,
                    "Duplicate entry attempt"
                );
            }
            _ => {
                tracing::error!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    error = %error,
                    "Request failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    struct EventCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for EventCounter {
        fn on_event(&self, _event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn events_emitted(f: impl FnOnce()) -> usize {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(EventCounter(count.clone()));
        tracing::subscriber::with_default(subscriber, f);
        count.load(Ordering::SeqCst)
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("username".to_string());
        assert_eq!(err.to_string(), "username is empty");
    }

    #[test]
    fn test_token_error_conversion() {
        let app_err: AppError = TokenError::Expired.into();
        assert_eq!(app_err.auth_kind(), Some(AuthError::TokenExpired));

        let app_err: AppError = TokenError::AudienceMismatch.into();
        assert_eq!(app_err.auth_kind(), Some(AuthError::TokenAudienceMismatch));
    }

    #[test]
    fn test_auth_errors_share_one_response() {
        let kinds = [
            AuthError::CredentialInvalid,
            AuthError::TokenExpired,
            AuthError::TokenMalformed,
            AuthError::TokenSignatureMismatch,
            AuthError::TokenAudienceMismatch,
            AuthError::TokenIssuerMismatch,
            AuthError::TokenKindMismatch,
            AuthError::RefreshTokenUnknown,
            AuthError::UserMismatch,
        ];

        for kind in kinds {
            let (status, body) =
                <AppError as ErrorHandler>::error_response(&AppError::Auth(kind), "req-1");
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body.code, "UNAUTHORIZED");
            assert_eq!(body.message, "Invalid credentials");
        }
    }

    #[test]
    fn test_storage_status_codes() {
        let duplicate = AppError::Storage(StorageError::Duplicate("alice".to_string()));
        assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);

        let down = AppError::Storage(StorageError::Unavailable("timeout".to_string()));
        assert_eq!(down.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_validation_maps_to_conflict() {
        let err = AppError::Validation(ValidationError::TooShort("password".to_string(), 8));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_failed_request_is_logged_once() {
        let errors = [
            AppError::Auth(AuthError::RefreshTokenUnknown),
            AppError::Auth(AuthError::CredentialInvalid),
            AppError::Validation(ValidationError::EmptyField("username".to_string())),
            AppError::Storage(StorageError::Duplicate("alice".to_string())),
            AppError::Storage(StorageError::Unavailable("timeout".to_string())),
            AppError::Internal("boom".to_string()),
        ];

        for error in errors {
            let ctx = ErrorContext::new("token_refresh");
            let logged = events_emitted(|| {
                ctx.log_error(&error);
                let response = <AppError as ResponseError>::error_response(&error);
                assert_eq!(response.status(), error.status_code());
            });
            assert_eq!(logged, 1, "{:?} should be logged exactly once", error);
        }
    }

    #[test]
    fn test_error_context_creation() {
        let ctx = ErrorContext::new("token_refresh");
        assert_eq!(ctx.operation, "token_refresh");
        assert!(!ctx.request_id.is_empty());
    }
}
