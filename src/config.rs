use std::env;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

/// AppConfig
///
/// Immutable configuration loaded once at startup and shared through `AppState` via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. `None` (local only) runs on the in-memory repository.
    pub db_url: Option<String>,
    pub env: Env,
    // Secret used to validate incoming JWTs issued by the identity provider.
    pub jwt_secret: String,
    // Identity provider used by `/register`. Registration is disabled when unset.
    pub auth_provider_url: Option<String>,
    pub auth_provider_key: Option<String>,
    // S3-compatible storage for post images (MinIO locally).
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_key: String,
    pub s3_secret: String,
    pub s3_bucket: String,
    pub posts_per_page: u64,
    pub bind_addr: String,
}

/// Env
///
/// Runtime context. `Local` enables the `x-user-id` auth bypass, MinIO defaults and
/// pretty logs; `Production` demands every secret explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_POSTS_PER_PAGE: u64 = 10;
const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

impl Default for AppConfig {
    /// Test-safe values; never reads the environment.
    fn default() -> Self {
        Self {
            db_url: None,
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            auth_provider_url: None,
            auth_provider_key: None,
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "blogicum-test".to_string(),
            posts_per_page: DEFAULT_POSTS_PER_PAGE,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from process environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// from_lookup
    ///
    /// Builds the configuration from any key/value source. Production fails fast on a
    /// missing secret instead of starting with an incomplete configuration.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = match lookup("APP_ENV").as_deref() {
            Some("production") => Env::Production,
            _ => Env::Local,
        };

        let required =
            |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let posts_per_page = match lookup("POSTS_PER_PAGE") {
            None => DEFAULT_POSTS_PER_PAGE,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "POSTS_PER_PAGE".to_string(),
                        message: format!("expected a positive integer, got {:?}", raw),
                    });
                }
            },
        };

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let auth_provider_url = lookup("AUTH_PROVIDER_URL");
        let auth_provider_key = lookup("AUTH_PROVIDER_KEY");

        match env {
            Env::Local => Ok(Self {
                db_url: lookup("DATABASE_URL"),
                env: Env::Local,
                jwt_secret: lookup("JWT_SECRET").unwrap_or_else(|| LOCAL_JWT_SECRET.to_string()),
                auth_provider_url,
                auth_provider_key,
                // MinIO from the docker-compose setup.
                s3_endpoint: lookup("S3_ENDPOINT")
                    .unwrap_or_else(|| "http://localhost:9000".to_string()),
                s3_region: lookup("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                s3_key: lookup("S3_ACCESS_KEY").unwrap_or_else(|| "admin".to_string()),
                s3_secret: lookup("S3_SECRET_KEY").unwrap_or_else(|| "password".to_string()),
                s3_bucket: lookup("S3_BUCKET_NAME")
                    .unwrap_or_else(|| "blogicum-uploads".to_string()),
                posts_per_page,
                bind_addr,
            }),
            Env::Production => Ok(Self {
                db_url: Some(required("DATABASE_URL")?),
                env: Env::Production,
                jwt_secret: required("JWT_SECRET")?,
                auth_provider_url,
                auth_provider_key,
                s3_endpoint: required("S3_ENDPOINT")?,
                s3_region: lookup("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                s3_key: required("S3_ACCESS_KEY")?,
                s3_secret: required("S3_SECRET_KEY")?,
                s3_bucket: required("S3_BUCKET_NAME")?,
                posts_per_page,
                bind_addr,
            }),
        }
    }
}
