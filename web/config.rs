use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

/// Runtime settings, read from the environment after `.env` is loaded.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    /// Prefix for pagination links.
    pub base_url: String,
    pub image_dir: PathBuf,
    /// Prefix under which stored images are served.
    pub image_base_url: String,
    pub jwt_secret: String,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let base_url = get("BASE_URL", "http://localhost:3000");
        let image_base_url = get("IMAGE_BASE_URL", &format!("{base_url}/images"));
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        Ok(AppConfig {
            host: get("HOST", "0.0.0.0"),
            port: parse("PORT", &get("PORT", "3000"))?,
            database_url: get("DATABASE_URL", "sqlite:./db/database.db"),
            database_max_connections: parse(
                "DATABASE_MAX_CONNECTIONS",
                &get("DATABASE_MAX_CONNECTIONS", "5"),
            )?,
            base_url,
            image_dir: PathBuf::from(get("IMAGE_DIR", "./images")),
            image_base_url,
            jwt_secret,
            max_upload_bytes: parse("MAX_UPLOAD_BYTES", &get("MAX_UPLOAD_BYTES", "5242880"))?,
            request_timeout: Duration::from_secs(parse(
                "REQUEST_TIMEOUT_SECS",
                &get("REQUEST_TIMEOUT_SECS", "30"),
            )?),
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::Invalid {
                key: "HOST",
                value: self.host.clone(),
            })
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
