/// Token Issuance and Verification
///
/// Compact HS256-signed tokens. The signature covers the header and the whole
/// claim payload, so changing any claim, the issuer, the audience or the
/// expiry invalidates it.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{SignedClaims, TokenClaims, TokenKind};
use crate::configuration::JwtSettings;
use crate::error::AppError;

/// Why a token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    SignatureMismatch,
    Expired,
    AudienceMismatch,
    IssuerMismatch,
    /// An access token where a refresh token was expected, or the reverse
    KindMismatch,
    Malformed,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::SignatureMismatch => write!(f, "signature mismatch"),
            TokenError::Expired => write!(f, "token expired"),
            TokenError::AudienceMismatch => write!(f, "audience mismatch"),
            TokenError::IssuerMismatch => write!(f, "issuer mismatch"),
            TokenError::KindMismatch => write!(f, "wrong token kind"),
            TokenError::Malformed => write!(f, "malformed token"),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::SignatureMismatch,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidAudience => TokenError::AudienceMismatch,
            ErrorKind::InvalidIssuer => TokenError::IssuerMismatch,
            _ => TokenError::Malformed,
        }
    }
}

/// Signs and verifies tokens for one issuer/audience pair.
///
/// Holds only immutable key material, so one instance can be shared by
/// every request handler.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
}

impl TokenCodec {
    pub fn new(secret: &[u8], issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    pub fn from_settings(config: &JwtSettings) -> Self {
        Self::new(
            config.secret.as_bytes(),
            config.issuer.clone(),
            config.audience.clone(),
        )
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Issue a token of `kind` valid for `ttl` from now
    ///
    /// # Errors
    /// Returns error if the expiry is out of range, an extension claim uses a
    /// reserved name, or the payload cannot be encoded
    pub fn issue(
        &self,
        claims: &TokenClaims,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, AppError> {
        self.issue_at(claims, kind, ttl, Utc::now())
    }

    /// Issue a token as if the current time were `issued_at`
    pub fn issue_at(
        &self,
        claims: &TokenClaims,
        kind: TokenKind,
        ttl: Duration,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        if let Some(name) = claims.reserved_extension() {
            return Err(AppError::Internal(format!(
                "Claim name `{}` is reserved",
                name
            )));
        }

        let expires_at = issued_at.checked_add_signed(ttl).ok_or_else(|| {
            AppError::Internal(format!("Token expiry out of range for ttl {}", ttl))
        })?;

        let payload = SignedClaims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_use: kind,
            claims: claims.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify a token of `kind` and return its claims
    ///
    /// # Errors
    /// Returns the first check that failed: signature, issuer, audience,
    /// expiry, then kind
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, kind, Utc::now())
    }

    /// Verify a token as if the current time were `now`
    pub fn verify_at(
        &self,
        token: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        // Expiry is checked below against the supplied instant, without leeway
        validation.validate_exp = false;

        let data = decode::<SignedClaims>(token, &self.decoding_key, &validation)?;

        if now.timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        if data.claims.token_use != kind {
            return Err(TokenError::KindMismatch);
        }
        if data.claims.claims.reserved_extension().is_some() {
            return Err(TokenError::Malformed);
        }

        Ok(data.claims.claims)
    }
}
