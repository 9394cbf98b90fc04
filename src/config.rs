use crate::errors::{AppError, Result};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MAX_UPLOAD_FILES: usize = 5;
pub const DEFAULT_MAX_UPLOAD_FILE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaidEnvironment {
    Sandbox,
    Development,
    Production,
}

impl PlaidEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            PlaidEnvironment::Sandbox => "https://sandbox.plaid.com",
            PlaidEnvironment::Development => "https://development.plaid.com",
            PlaidEnvironment::Production => "https://production.plaid.com",
        }
    }
}

impl FromStr for PlaidEnvironment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(PlaidEnvironment::Sandbox),
            "development" => Ok(PlaidEnvironment::Development),
            "production" => Ok(PlaidEnvironment::Production),
            other => Err(AppError::ConfigError(format!("Unknown PLAID_ENV '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct PlaidConfig {
    pub client_id: Option<String>,
    pub secret: Option<String>,
    pub environment: PlaidEnvironment,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_files: usize,
    pub max_file_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub rate_limit_per_sec: u64,
    pub seed_test_user: bool,
    pub openai: OpenAiConfig,
    pub plaid: PlaidConfig,
    pub upload: UploadConfig,
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| AppError::ConfigError("JWT_SECRET must be set".to_string()))?;
        if jwt_secret.trim().is_empty() {
            return Err(AppError::ConfigError("JWT_SECRET must not be empty".to_string()));
        }

        Ok(Self {
            port: parse_var("PORT", 3000)?,
            database_url: var_or("DATABASE_URL", "sqlite:andy_ai.db"),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            session_ttl_hours: parse_var("SESSION_TTL_HOURS", 24)?,
            rate_limit_per_sec: parse_var("RATE_LIMIT_PER_SEC", 5)?,
            seed_test_user: parse_var("SEED_TEST_USER", false)?,
            openai: OpenAiConfig {
                api_key: optional_var("OPENAI_API_KEY"),
                base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                model: var_or("OPENAI_MODEL", "gpt-4"),
                timeout_secs: parse_var("OPENAI_TIMEOUT_SECS", 60)?,
            },
            plaid: PlaidConfig {
                client_id: optional_var("PLAID_CLIENT_ID"),
                secret: optional_var("PLAID_SECRET"),
                environment: parse_var("PLAID_ENV", PlaidEnvironment::Sandbox)?,
            },
            upload: UploadConfig {
                dir: PathBuf::from(var_or("UPLOAD_DIR", "uploads")),
                max_files: parse_var("MAX_UPLOAD_FILES", DEFAULT_MAX_UPLOAD_FILES)?,
                max_file_bytes: parse_var("MAX_UPLOAD_FILE_BYTES", DEFAULT_MAX_UPLOAD_FILE_BYTES)?,
            },
        })
    }
}

fn optional_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn var_or(key: &str, default: &str) -> String {
    optional_var(key).unwrap_or_else(|| default.to_string())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::ConfigError(format!("Invalid value for {}: {}", key, e))),
        None => Ok(default),
    }
}
