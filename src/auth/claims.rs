/// Token Claims structures
///
/// `TokenClaims` is the application claim set carried by every token.
/// `SignedClaims` is the full payload that gets signed: the registered
/// JWT claims (RFC 7519) with the application claims flattened beside them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Payload keys owned by the codec. Extension claims may not use them.
pub const RESERVED_CLAIMS: &[&str] = &[
    "iss",
    "sub",
    "aud",
    "exp",
    "nbf",
    "iat",
    "jti",
    "token_use",
    "userName",
];

/// Which of the two token flavors a token is
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Application claims embedded in access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Username the token was issued to
    #[serde(rename = "userName")]
    pub user_name: String,
    /// Extension claims. Sorted, so the encoded payload is canonical.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl TokenClaims {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Attach an extension claim
    ///
    /// # Errors
    /// Returns error if `name` is one of [`RESERVED_CLAIMS`]
    pub fn with_claim(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, AppError> {
        let name = name.into();
        if is_reserved(&name) {
            return Err(AppError::Internal(format!(
                "Claim name `{}` is reserved",
                name
            )));
        }
        self.extra.insert(name, value.into());
        Ok(self)
    }

    /// First extension claim that collides with a reserved name, if any
    pub(crate) fn reserved_extension(&self) -> Option<&str> {
        self.extra
            .keys()
            .map(String::as_str)
            .find(|name| is_reserved(name))
    }
}

fn is_reserved(name: &str) -> bool {
    RESERVED_CLAIMS.contains(&name)
}

/// Full signed payload
#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct SignedClaims {
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token id
    pub jti: String,
    pub token_use: TokenKind,
    #[serde(flatten)]
    pub claims: TokenClaims,
}

/// Only the expiry, for callers that decode without a key
#[derive(Debug, Deserialize)]
pub(crate) struct ExpiryClaim {
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let claims = TokenClaims::new("alice").with_claim("role", "admin").unwrap();

        assert_eq!(claims.user_name, "alice");
        assert_eq!(claims.extra.get("role").map(String::as_str), Some("admin"));
        assert_eq!(claims.reserved_extension(), None);
    }

    #[test]
    fn test_reserved_claim_names_rejected() {
        for name in RESERVED_CLAIMS {
            let result = TokenClaims::new("alice").with_claim(*name, "x");
            assert!(
                matches!(result, Err(AppError::Internal(_))),
                "`{}` should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_reserved_extension_detected() {
        let mut claims = TokenClaims::new("alice");
        claims.extra.insert("exp".to_string(), "x".to_string());

        assert_eq!(claims.reserved_extension(), Some("exp"));
    }

    #[test]
    fn test_claims_serialize_with_camel_case_name() {
        let claims = TokenClaims::new("alice");
        let json = serde_json::to_value(&claims).expect("Failed to serialize claims");

        assert_eq!(json, serde_json::json!({ "userName": "alice" }));
    }

    #[test]
    fn test_signed_claims_round_trip_through_json() {
        let signed = SignedClaims {
            iss: "issuer".to_string(),
            aud: "audience".to_string(),
            iat: 10,
            exp: 20,
            jti: "id".to_string(),
            token_use: TokenKind::Refresh,
            claims: TokenClaims::new("alice")
                .with_claim("b", "2")
                .and_then(|c| c.with_claim("a", "1"))
                .unwrap(),
        };

        let encoded = serde_json::to_string(&signed).expect("Failed to serialize");
        let decoded: SignedClaims = serde_json::from_str(&encoded).expect("Failed to parse");

        assert_eq!(decoded.claims, signed.claims);
        assert_eq!(decoded.exp, 20);
        assert_eq!(decoded.token_use, TokenKind::Refresh);
        assert!(encoded.contains(r#""token_use":"refresh""#));
        // Extension claims are written in sorted order
        assert!(encoded.find("\"a\"").unwrap() < encoded.find("\"b\"").unwrap());
    }

    #[test]
    fn test_missing_user_name_rejected() {
        let json = r#"{"iss":"i","aud":"a","iat":1,"exp":2,"jti":"x","token_use":"access"}"#;
        assert!(serde_json::from_str::<SignedClaims>(json).is_err());
    }

    #[test]
    fn test_missing_token_use_rejected() {
        let json = r#"{"iss":"i","aud":"a","iat":1,"exp":2,"jti":"x","userName":"alice"}"#;
        assert!(serde_json::from_str::<SignedClaims>(json).is_err());
    }
}
