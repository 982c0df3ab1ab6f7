/// Client-side session handling
///
/// Mirrors the server's token checks locally to avoid doomed requests. The
/// server stays the only authority.

mod api;
mod session;
mod token_validator;

pub use api::{AuthApiClient, ClientError};
pub use session::{AuthInfo, SessionGuard};
pub use token_validator::{expiration_time, is_token_valid, is_token_valid_at};
