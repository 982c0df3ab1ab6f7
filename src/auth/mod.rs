/// Authentication module
///
/// Handles password hashing, token issuance/verification, refresh token
/// storage, and the login/refresh flows built on top of them.

mod claims;
mod jwt;
mod password;
mod refresh_token;
mod service;
mod users;

pub use claims::{TokenClaims, TokenKind, RESERVED_CLAIMS};
pub use jwt::{TokenCodec, TokenError};
pub use password::{
    generate_salted_hash, generate_salted_hash_with_length, validate_new_password,
    verify_password, PasswordRecord, DEFAULT_SALT_LENGTH,
};
pub use refresh_token::{InMemoryRefreshTokenStore, PgRefreshTokenStore, RefreshTokenStore};
pub use service::{AuthService, Credential, TokenPair};
pub use users::{InMemoryUserDirectory, PgUserDirectory, UserDirectory, UserRecord};

pub(crate) use claims::ExpiryClaim;
