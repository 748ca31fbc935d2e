use crate::config::AppConfig;
use crate::errors::{AdminError, MySqlErrorCode};
use metrics::{counter, histogram};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, ExecResult,
};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, Instrument};

/// Type alias for the single admin connection
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
///
/// The tools always run on exactly one connection: session state such as
/// `USE` and `FOREIGN_KEY_CHECKS` must apply to every statement they issue.
#[derive(Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &redact_url(&self.url))
            .field("connect_timeout", &self.connect_timeout)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl DbConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
            acquire_timeout: Duration::from_secs(10),
        }
    }

    /// Settings from `AppConfig` with an explicit URL
    pub fn from_app_config(cfg: &AppConfig, url: String) -> Self {
        Self {
            url,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Strips the password from a connection URL for logging
pub fn redact_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

/// Opens the single connection used for a whole run
///
/// # Errors
/// Returns the driver error if the server refuses the connection
pub async fn establish_connection(config: &DbConfig) -> Result<DbPool, DbErr> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(1)
        .min_connections(1)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    check_connection(&db).await?;

    info!("Connected to {}", redact_url(&config.url));
    Ok(db)
}

/// Connects to the configured schema with the configured password
pub async fn connect_from_app_config(cfg: &AppConfig) -> Result<DbPool, AdminError> {
    let db_cfg = DbConfig::from_app_config(cfg, cfg.database_url()?);
    Ok(establish_connection(&db_cfg).await?)
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), DbErr> {
    let start = Instant::now();
    let result = pool.ping().await;
    match &result {
        Ok(_) => debug!("Database connection check successful in {:?}", start.elapsed()),
        Err(e) => {
            error!("Database connection check failed: {}", e);
            counter!("sileen_db.connection_failures", 1);
        }
    }
    result
}

/// Closes the connection; failures are logged, never propagated
pub async fn close_pool(pool: DbPool) {
    match pool.close().await {
        Ok(()) => info!("Connection closed."),
        Err(e) => error!("Failed to close connection cleanly: {}", e),
    }
}

/// Executes one statement without preparing it
///
/// DDL and session statements cannot always be prepared, so every step the
/// tools run goes through here. The error is returned untouched so the caller
/// decides whether its code is expected.
pub async fn execute_step<C>(db: &C, step: &str, sql: &str) -> Result<ExecResult, DbErr>
where
    C: ConnectionTrait,
{
    let span = info_span!("sql_step", step = %step);
    async move {
        let start = Instant::now();
        debug!(sql = %sql, "Executing statement");
        let result = db.execute_unprepared(sql).await;
        histogram!("sileen_db.statement.duration", start.elapsed());
        if let Err(e) = &result {
            counter!("sileen_db.statement.error", 1, "step" => step.to_string());
            debug!(
                error = %e,
                code = ?MySqlErrorCode::from_db_err(e),
                "Statement failed"
            );
        }
        result
    }
    .instrument(span)
    .await
}
