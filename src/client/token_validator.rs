/// Local token inspection
///
/// Reads the expiry out of a cached access token without the signing secret.
/// The signature is NOT verified here. A "valid" result only means the token
/// is not yet known to be stale; it is a cache-freshness heuristic, not a
/// security decision. The server re-verifies every token it receives.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::auth::ExpiryClaim;

/// Expiry instant of `token`, or `None` if it cannot be decoded or carries no `exp`
pub fn expiration_time(token: &str) -> Option<DateTime<Utc>> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);

    match decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => Utc.timestamp_opt(data.claims.exp, 0).single(),
        Err(e) => {
            tracing::debug!(error = %e, "Could not decode cached token");
            None
        }
    }
}

/// Whether `token` is still usable at `now`. Undecodable tokens are not.
pub fn is_token_valid_at(token: &str, now: DateTime<Utc>) -> bool {
    match expiration_time(token) {
        Some(expires_at) => {
            let valid = now < expires_at;
            if !valid {
                tracing::debug!(%expires_at, "Cached token has expired");
            }
            valid
        }
        None => false,
    }
}

pub fn is_token_valid(token: &str) -> bool {
    is_token_valid_at(token, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{TokenClaims, TokenCodec, TokenKind};
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn codec() -> TokenCodec {
        TokenCodec::new(
            b"test-secret-key-at-least-32-characters-long",
            "test-issuer",
            "test-audience",
        )
    }

    #[test]
    fn test_reads_expiry_without_secret() {
        let issued_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let token = codec()
            .issue_at(
                &TokenClaims::new("alice"),
                TokenKind::Access,
                Duration::hours(1),
                issued_at,
            )
            .unwrap();

        assert_eq!(expiration_time(&token), Some(issued_at + Duration::hours(1)));
    }

    #[test]
    fn test_validity_window() {
        let issued_at = Utc::now();
        let token = codec()
            .issue_at(
                &TokenClaims::new("alice"),
                TokenKind::Access,
                Duration::hours(1),
                issued_at,
            )
            .unwrap();

        assert!(is_token_valid_at(&token, issued_at + Duration::minutes(30)));
        assert!(!is_token_valid_at(&token, issued_at + Duration::hours(2)));
    }

    #[test]
    fn test_malformed_token_is_invalid() {
        assert!(!is_token_valid(""));
        assert!(!is_token_valid("garbage"));
        assert!(!is_token_valid("invalid.token.here"));
    }

    #[test]
    fn test_token_without_expiry_is_invalid() {
        #[derive(serde::Serialize)]
        struct NoExpiry {
            #[serde(rename = "userName")]
            user_name: String,
        }

        let token = encode(
            &Header::default(),
            &NoExpiry {
                user_name: "alice".to_string(),
            },
            &EncodingKey::from_secret(b"whatever"),
        )
        .unwrap();

        assert_eq!(expiration_time(&token), None);
        assert!(!is_token_valid(&token));
    }
}
