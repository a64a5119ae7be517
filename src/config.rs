use std::path::PathBuf;

pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} characters long")]
    WeakSecret,
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

/// Runtime settings, read from the environment (and `.env` in debug builds).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub frontend_url: Option<String>,
    pub enable_hsts: bool,
    pub data_dir: PathBuf,
    pub database_url: Option<String>,
    pub seed_demo_users: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // only validated here; the auth module reads it on demand
        let secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }

        let port = match lookup("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid("PORT", raw))?,
            None => 8080,
        };
        let flag = |name: &str| lookup(name).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            frontend_url: lookup("FRONTEND_URL").filter(|s| !s.is_empty()),
            enable_hsts: flag("ENABLE_HSTS"),
            data_dir: lookup("BOARD_DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data")),
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            seed_demo_users: flag("SEED_DEMO_USERS"),
        })
    }
}
