/// Access Token Middleware
///
/// Verifies the bearer token from the Authorization header on every request
/// and injects its claims into request extensions for route handlers. Only
/// access tokens are accepted.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{TokenCodec, TokenKind};
use crate::error::AuthError;

/// Middleware for protecting routes
pub struct JwtMiddleware {
    codec: TokenCodec,
}

impl JwtMiddleware {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            codec: self.codec.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    codec: TokenCodec,
}

fn unauthorized(reason: &'static str) -> Error {
    let response = HttpResponse::Unauthorized().json(serde_json::json!({
        "error": "Invalid or missing token",
        "code": "UNAUTHORIZED"
    }));
    actix_web::error::InternalError::from_response(reason, response).into()
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let bearer = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string);

        let Some(token) = bearer else {
            tracing::warn!("Missing or invalid Authorization header");
            return Box::pin(async move { Err(unauthorized("Unauthorized")) });
        };

        match self.codec.verify(&token, TokenKind::Access) {
            Ok(claims) => {
                tracing::debug!(user_name = %claims.user_name, "Access token verified");
                req.extensions_mut().insert(claims);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => {
                tracing::warn!(reason = ?AuthError::from(e), "Access token rejected");
                Box::pin(async move { Err(unauthorized("Invalid token")) })
            }
        }
    }
}
