use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub listen_addr: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub frontend_url: Option<String>,
    pub page_size: u64,
    pub session_ttl_hours: i64,
    pub comment_append_attempts: u32,
    pub log_dir: String,
    pub bootstrap_admin_user: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialAppConfig {
    listen_addr: Option<String>,
    database_url: Option<String>,
    jwt_secret: Option<String>,
    frontend_url: Option<String>,
    page_size: Option<u64>,
    session_ttl_hours: Option<i64>,
    comment_append_attempts: Option<u32>,
    log_dir: Option<String>,
    bootstrap_admin_user: Option<String>,
    bootstrap_admin_password: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

const DEFAULT_PAGE_SIZE: u64 = 10;
const DEFAULT_SESSION_TTL_HOURS: i64 = 168;
const DEFAULT_COMMENT_APPEND_ATTEMPTS: u32 = 3;

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl PartialAppConfig {
    fn from_file(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))
    }

    // An exported but empty variable counts as unset
    fn without_empty_values(self) -> Self {
        Self {
            listen_addr: non_empty(self.listen_addr),
            database_url: non_empty(self.database_url),
            jwt_secret: non_empty(self.jwt_secret),
            frontend_url: non_empty(self.frontend_url),
            log_dir: non_empty(self.log_dir),
            bootstrap_admin_user: non_empty(self.bootstrap_admin_user),
            bootstrap_admin_password: non_empty(self.bootstrap_admin_password),
            ..self
        }
    }
}

impl AppConfig {
    /// Loads the optional TOML file at `config_path`, then lets environment
    /// variables override it.
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        let file_config = match config_path {
            Some(path) => PartialAppConfig::from_file(Path::new(path))?,
            None => PartialAppConfig::default(),
        };
        let env_config: PartialAppConfig = envy::from_env::<PartialAppConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;
        Self::merge(env_config.without_empty_values(), file_config)
    }

    fn merge(env_config: PartialAppConfig, file_config: PartialAppConfig) -> Result<Self, String> {
        let config = AppConfig {
            listen_addr: env_config
                .listen_addr
                .or(file_config.listen_addr)
                .unwrap_or_else(default_listen_addr),
            database_url: env_config.database_url.or(file_config.database_url),
            jwt_secret: env_config
                .jwt_secret
                .or(file_config.jwt_secret)
                .filter(|s| !s.is_empty())
                .ok_or("JWT_SECRET is required")?,
            frontend_url: env_config.frontend_url.or(file_config.frontend_url),
            page_size: env_config
                .page_size
                .or(file_config.page_size)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            session_ttl_hours: env_config
                .session_ttl_hours
                .or(file_config.session_ttl_hours)
                .unwrap_or(DEFAULT_SESSION_TTL_HOURS),
            comment_append_attempts: env_config
                .comment_append_attempts
                .or(file_config.comment_append_attempts)
                .unwrap_or(DEFAULT_COMMENT_APPEND_ATTEMPTS),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            bootstrap_admin_user: env_config
                .bootstrap_admin_user
                .or(file_config.bootstrap_admin_user),
            bootstrap_admin_password: env_config
                .bootstrap_admin_password
                .or(file_config.bootstrap_admin_password),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 {
            return Err("PAGE_SIZE must be greater than 0".to_string());
        }
        if self.comment_append_attempts == 0 {
            return Err("COMMENT_APPEND_ATTEMPTS must be greater than 0".to_string());
        }
        if self.session_ttl_hours <= 0 {
            return Err("SESSION_TTL_HOURS must be greater than 0".to_string());
        }
        if self.bootstrap_admin_user.is_some() != self.bootstrap_admin_password.is_some() {
            return Err(
                "BOOTSTRAP_ADMIN_USER and BOOTSTRAP_ADMIN_PASSWORD must be set together".to_string(),
            );
        }
        Ok(())
    }
}
