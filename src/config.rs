use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3306;
const DEFAULT_USER: &str = "root";
const DEFAULT_DATABASE: &str = "SileenSystem";
const DEFAULT_SQL_FILE: &str = "Tables.sql";
const DEFAULT_CREDENTIAL_FILE: &str = "working_password.txt";
const CONFIG_DIR: &str = "config";

/// Schema bootstrap configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
    /// SQL file executed against the server
    #[serde(default = "default_sql_file")]
    pub sql_file: PathBuf,

    /// Root passwords tried in order until one connects. Environment
    /// variables supply them comma-separated.
    #[serde(default, deserialize_with = "deserialize_candidates")]
    pub password_candidates: Vec<String>,

    /// Where the winning password is written; `None` disables persistence
    #[serde(default = "default_credential_file")]
    pub credential_file: Option<PathBuf>,

    /// Abort on the first failing statement instead of skipping it
    #[serde(default)]
    pub strict: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            sql_file: default_sql_file(),
            password_candidates: Vec::new(),
            credential_file: default_credential_file(),
            strict: false,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// MySQL server host
    #[validate(length(min = 1))]
    #[serde(default = "default_host")]
    pub host: String,

    /// MySQL server port
    #[validate(range(min = 1))]
    #[serde(default = "default_port")]
    pub port: u16,

    /// Account used by every tool
    #[validate(length(min = 1))]
    #[serde(default = "default_user")]
    pub user: String,

    /// Account password; never has a built-in default
    #[serde(default)]
    pub password: Option<String>,

    /// Target schema
    #[validate(length(min = 1))]
    #[serde(default = "default_database")]
    pub database: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[validate(custom = "validate_log_level")]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Schema bootstrap settings
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("environment", &self.environment)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("db_connect_timeout_secs", &self.db_connect_timeout_secs)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("bootstrap.sql_file", &self.bootstrap.sql_file)
            .field(
                "bootstrap.password_candidates",
                &self.bootstrap.password_candidates.len(),
            )
            .field("bootstrap.credential_file", &self.bootstrap.credential_file)
            .field("bootstrap.strict", &self.bootstrap.strict)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: None,
            database: default_database(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl AppConfig {
    /// Builds a `mysql://` URL for this server.
    ///
    /// When `include_database` is false the URL selects no schema, which is
    /// what the bootstrap needs before the schema exists.
    pub fn connection_url(
        &self,
        include_database: bool,
        password: Option<&str>,
    ) -> Result<String, AppConfigError> {
        mysql_url(
            &self.host,
            self.port,
            &self.user,
            password,
            include_database.then_some(self.database.as_str()),
        )
    }

    /// URL for the configured schema using the configured password
    pub fn database_url(&self) -> Result<String, AppConfigError> {
        self.connection_url(true, self.password.as_deref())
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Logs where the tools will connect; call after [`init_tracing`]
    pub fn log_summary(&self) {
        info!(
            environment = %self.environment,
            host = %self.host,
            port = self.port,
            database = %self.database,
            "Configuration loaded"
        );
    }
}

/// Builds a `mysql://` URL with the password percent-encoded.
///
/// An empty password leaves the URL without one.
pub fn mysql_url(
    host: &str,
    port: u16,
    user: &str,
    password: Option<&str>,
    database: Option<&str>,
) -> Result<String, AppConfigError> {
    let mut url = Url::parse(&format!("mysql://{}:{}", host, port))
        .map_err(|e| AppConfigError::InvalidUrl(e.to_string()))?;
    url.set_username(user)
        .map_err(|_| AppConfigError::InvalidUrl("cannot set user".into()))?;
    if let Some(password) = password.filter(|p| !p.is_empty()) {
        url.set_password(Some(password))
            .map_err(|_| AppConfigError::InvalidUrl("cannot set password".into()))?;
    }
    if let Some(database) = database {
        url.set_path(database);
    }
    Ok(url.to_string())
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_sql_file() -> PathBuf {
    PathBuf::from(DEFAULT_SQL_FILE)
}

fn default_credential_file() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_CREDENTIAL_FILE))
}

fn default_db_connect_timeout_secs() -> u64 {
    10
}

fn default_db_acquire_timeout_secs() -> u64 {
    10
}

/// Accepts either a list or a single comma-separated string.
///
/// Environment values stay strings so a candidate such as `0000` is never
/// coerced into a number.
fn deserialize_candidates<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Candidates {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Candidates::deserialize(deserializer)? {
        Candidates::List(list) => list,
        Candidates::Joined(joined) => joined.split(',').map(str::to_string).collect(),
    })
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Filter used when `RUST_LOG` is unset; the bare level also covers the
/// binaries' own targets
pub fn default_log_directive(level: &str) -> String {
    format!("{},sea_orm=warn,sqlx=warn", level)
}

fn log_filter(level: &str) -> EnvFilter {
    let directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default_log_directive(level));
    EnvFilter::new(directive)
}

/// Builds the fmt subscriber writing to `writer`.
pub fn build_subscriber<W>(
    filter: EnvFilter,
    json: bool,
    writer: W,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(writer);
    if json {
        Box::new(builder.json().finish())
    } else {
        Box::new(builder.finish())
    }
}

/// Initializes tracing using the provided log level as the default filter.
///
/// Logs go to stderr; stdout carries only the reports.
pub fn init_tracing(level: &str, json: bool) {
    let subscriber = build_subscriber(log_filter(level), json, std::io::stderr);
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] with an explicit config directory
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    debug!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        debug!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    // NOTE: password has no default. It must come from APP__PASSWORD or a
    // config file that is kept out of version control.
    let config = Config::builder()
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        debug!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(app_config)
}
