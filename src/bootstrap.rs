//! Schema bootstrap: finds a root password that the server accepts and runs
//! the schema script through that connection.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{mysql_url, AppConfig};
use crate::db::{close_pool, establish_connection, execute_step, DbConfig};
use crate::errors::{AdminError, MySqlErrorCode};
use crate::sql_script::{SqlScript, SqlStatement};

/// Server account used for one connection attempt.
#[derive(Clone)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Server and account from the config, without a password
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            port: cfg.port,
            user: cfg.user.clone(),
            password: String::new(),
        }
    }

    pub fn with_password(&self, password: &str) -> Self {
        Self {
            password: password.to_string(),
            ..self.clone()
        }
    }

    /// Server-level URL; no schema is selected
    pub fn server_url(&self) -> Result<String, AdminError> {
        Ok(mysql_url(
            &self.host,
            self.port,
            &self.user,
            Some(self.password.as_str()),
            None,
        )?)
    }
}

/// Opens server connections for the credential search.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<DatabaseConnection, AdminError>;
}

/// Connects to a real MySQL server.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl MySqlConnector {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<DatabaseConnection, AdminError> {
        let db_cfg = DbConfig {
            url: credentials.server_url()?,
            connect_timeout: self.connect_timeout,
            acquire_timeout: self.acquire_timeout,
        };
        Ok(establish_connection(&db_cfg).await?)
    }
}

/// Tries each candidate password in order and keeps the first connection.
///
/// Returns the 0-based index of the winning candidate.
pub async fn find_working_connection<K>(
    connector: &K,
    account: &Credentials,
    candidates: &[String],
) -> Result<(usize, DatabaseConnection), AdminError>
where
    K: Connector + ?Sized,
{
    for (index, password) in candidates.iter().enumerate() {
        info!(candidate = index + 1, of = candidates.len(), "Trying password candidate");
        match connector.connect(&account.with_password(password)).await {
            Ok(db) => {
                info!(candidate = index + 1, "Connected to MySQL server");
                return Ok((index, db));
            }
            Err(e) => {
                let code = e.mysql_code().map(|c| c.to_string());
                warn!(
                    candidate = index + 1,
                    code = code.as_deref().unwrap_or("none"),
                    "Failed to connect: {}",
                    e
                );
            }
        }
    }
    Err(AdminError::NoWorkingCredential {
        tried: candidates.len(),
    })
}

/// A script statement that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementFailure {
    /// 1-based position in the script
    pub index: usize,
    pub line: usize,
    pub code: Option<MySqlErrorCode>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScriptRun {
    pub executed: usize,
    pub failures: Vec<StatementFailure>,
}

/// Runs statements in order on one connection.
///
/// Failing statements are skipped and recorded; with `strict` the first one
/// is returned as [`AdminError::StatementFailed`].
pub async fn run_script<C>(
    db: &C,
    statements: &[SqlStatement],
    strict: bool,
) -> Result<ScriptRun, AdminError>
where
    C: ConnectionTrait,
{
    let mut run = ScriptRun::default();
    for (i, statement) in statements.iter().enumerate() {
        let index = i + 1;
        let step = format!("statement_{}", index);
        match execute_step(db, &step, &statement.text).await {
            Ok(_) => run.executed += 1,
            Err(source) if strict => {
                return Err(AdminError::StatementFailed {
                    index,
                    line: statement.line,
                    source,
                });
            }
            Err(e) => {
                warn!(index, line = statement.line, "Skipping statement error: {}", e);
                run.failures.push(StatementFailure {
                    index,
                    line: statement.line,
                    code: MySqlErrorCode::from_db_err(&e),
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(run)
}

#[derive(Clone)]
pub struct BootstrapOptions {
    pub candidates: Vec<String>,
    pub strict: bool,
    pub credential_file: Option<PathBuf>,
}

impl fmt::Debug for BootstrapOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapOptions")
            .field("candidates", &self.candidates.len())
            .field("strict", &self.strict)
            .field("credential_file", &self.credential_file)
            .finish()
    }
}

/// Command-line overrides for [`BootstrapOptions::resolve`].
#[derive(Clone, Default)]
pub struct BootstrapOverrides {
    pub candidates: Vec<String>,
    pub strict: bool,
    pub credential_file: Option<PathBuf>,
    pub no_credential_file: bool,
}

impl BootstrapOptions {
    /// Merges config and overrides.
    ///
    /// Candidates come from the overrides, else `bootstrap.password_candidates`,
    /// else the configured `password`. `no_credential_file` beats any path.
    pub fn resolve(cfg: &AppConfig, overrides: &BootstrapOverrides) -> Self {
        let candidates = if !overrides.candidates.is_empty() {
            overrides.candidates.clone()
        } else if !cfg.bootstrap.password_candidates.is_empty() {
            cfg.bootstrap.password_candidates.clone()
        } else {
            cfg.password.iter().cloned().collect()
        };

        let credential_file = if overrides.no_credential_file {
            None
        } else {
            overrides
                .credential_file
                .clone()
                .or_else(|| cfg.bootstrap.credential_file.clone())
        };

        Self {
            candidates,
            strict: overrides.strict || cfg.bootstrap.strict,
            credential_file,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub script: PathBuf,
    /// 0-based index of the password that connected
    pub candidate_index: usize,
    pub statements: usize,
    pub executed: usize,
    pub failures: Vec<StatementFailure>,
    pub credential_file: Option<PathBuf>,
}

impl fmt::Display for BootstrapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Database setup completed successfully.")?;
        writeln!(f, "  script:     {}", self.script.display())?;
        writeln!(f, "  candidate:  #{}", self.candidate_index + 1)?;
        write!(
            f,
            "  statements: {} executed, {} skipped",
            self.executed,
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(
                f,
                "\n    #{} (line {}): {}",
                failure.index, failure.line, failure.message
            )?;
        }
        if let Some(path) = &self.credential_file {
            write!(f, "\n  working password written to {}", path.display())?;
        }
        Ok(())
    }
}

/// Connects with the first accepted candidate, runs the script and records
/// the password.
///
/// Nothing is written when no candidate connects. The connection is closed
/// on every path once it is open.
pub async fn bootstrap<K>(
    connector: &K,
    account: &Credentials,
    script: &SqlScript,
    options: &BootstrapOptions,
) -> Result<BootstrapReport, AdminError>
where
    K: Connector + ?Sized,
{
    let (candidate_index, db) =
        find_working_connection(connector, account, &options.candidates).await?;

    info!(
        path = %script.path.display(),
        statements = script.len(),
        "Running SQL script"
    );
    let run = run_script(&db, &script.statements, options.strict).await;
    close_pool(db).await;
    let run = run?;

    if let Some(path) = &options.credential_file {
        persist_credential(path, &options.candidates[candidate_index])?;
        info!(path = %path.display(), "Working password saved");
    }

    info!("Database setup completed successfully.");
    Ok(BootstrapReport {
        script: script.path.clone(),
        candidate_index,
        statements: script.len(),
        executed: run.executed,
        failures: run.failures,
        credential_file: options.credential_file.clone(),
    })
}

/// Writes the password as the whole file content, readable by the owner only.
pub fn persist_credential(path: &Path, password: &str) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // mode() only applies on creation
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(password.as_bytes())?;
    file.sync_all()
}
