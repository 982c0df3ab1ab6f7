/// Authentication Routes
///
/// Handles signup, login, token refresh, logout, and current user information.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthService, Credential, TokenClaims};
use crate::error::{AppError, ErrorContext};

/// Signup and login request
#[derive(Deserialize)]
pub struct CredentialRequest {
    pub username: String,
    pub password: String,
}

impl From<CredentialRequest> for Credential {
    fn from(form: CredentialRequest) -> Self {
        Credential {
            username: form.username,
            password: form.password,
        }
    }
}

/// Token refresh request
///
/// Clients may still send `accessToken`; like any unknown field it is dropped.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub user_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUserResponse {
    pub user_name: String,
}

/// POST /auth/signup
///
/// # Errors
/// - 409: Blank username, password too short/long, or username taken
/// - 503: Storage unavailable
pub async fn signup(
    form: web::Json<CredentialRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_signup");

    let user_id = service
        .register(form.into_inner().into())
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(HttpResponse::Ok().json(SignupResponse { user_id }))
}

/// POST /auth/login
///
/// Returns access token, refresh token and user id on success.
///
/// # Errors
/// - 404: Invalid credentials. Unknown user and wrong password are not distinguished.
/// - 503: Storage unavailable
pub async fn login(
    form: web::Json<CredentialRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let pair = service.login(form.into_inner().into()).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %pair.user_id,
        "Login succeeded"
    );

    Ok(HttpResponse::Ok().json(pair))
}

/// POST /auth/refresh
///
/// Returns the new access token as the bare response body.
///
/// # Errors
/// - 404: Refresh token invalid, expired, unknown, or not matching its user
/// - 503: Storage unavailable
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let access_token = service
        .refresh(&form.refresh_token, form.user_id)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(access_token))
}

/// POST /auth/logout
///
/// Always 204, whether or not the token was known.
pub async fn logout(
    form: web::Json<LogoutRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_logout");

    service.logout(&form.refresh_token).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/me
///
/// **Requires valid access token** in the Authorization header; claims are
/// injected by the token middleware.
pub async fn current_user(claims: web::ReqData<TokenClaims>) -> HttpResponse {
    HttpResponse::Ok().json(CurrentUserResponse {
        user_name: claims.into_inner().user_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_request_tolerates_access_token() {
        let user_id = Uuid::new_v4();
        let body = serde_json::json!({
            "accessToken": "stale-access",
            "refreshToken": "refresh",
            "userId": user_id,
        });

        let request: RefreshRequest =
            serde_json::from_value(body).expect("Failed to parse refresh request");

        assert_eq!(request.refresh_token, "refresh");
        assert_eq!(request.user_id, Some(user_id));
    }

    #[test]
    fn test_refresh_request_needs_refresh_token() {
        let body = serde_json::json!({ "accessToken": "stale-access" });
        assert!(serde_json::from_value::<RefreshRequest>(body).is_err());
    }
}
