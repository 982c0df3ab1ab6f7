use crate::error::ConfigError;

const MIN_SECRET_LENGTH: usize = 32;
/// Ten years, in seconds
const MAX_TOKEN_EXPIRY: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    /// Absent means the in-memory stores are used.
    #[serde(default)]
    pub database: Option<DatabaseSettings>,
    #[serde(default)]
    pub client: ClientSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// Token signing settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    #[serde(default = "default_access_expiry")]
    pub access_token_expiry: i64, // seconds
    #[serde(default = "default_refresh_expiry")]
    pub refresh_token_expiry: i64, // seconds
}

fn default_access_expiry() -> i64 {
    3600
}

fn default_refresh_expiry() -> i64 {
    86_400
}

impl JwtSettings {
    /// Reject settings that would make every token forgeable or useless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()));
        }
        if self.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.issuer".to_string()));
        }
        if self.audience.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.audience".to_string()));
        }
        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "token expiry must be positive".to_string(),
            ));
        }
        if self.access_token_expiry > MAX_TOKEN_EXPIRY
            || self.refresh_token_expiry > MAX_TOKEN_EXPIRY
        {
            return Err(ConfigError::InvalidValue(format!(
                "token expiry must not exceed {} seconds",
                MAX_TOKEN_EXPIRY
            )));
        }
        Ok(())
    }
}

/// Settings for the client-side API wrapper
#[derive(serde::Deserialize, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_ms: 10_000,
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        // e.g. `APP__JWT__SECRET=...` overrides `jwt.secret`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
