use std::fmt::Display;
use std::io::{self, Write};

use sea_orm::DbErr;
use serde::Serialize;

use crate::errors::MySqlErrorCode;

/// A statement that failed but did not stop the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepFailure {
    pub step: String,
    pub code: Option<MySqlErrorCode>,
    pub message: String,
}

impl StepFailure {
    pub fn new(step: impl Into<String>, err: &DbErr) -> Self {
        Self {
            step: step.into(),
            code: MySqlErrorCode::from_db_err(err),
            message: err.to_string(),
        }
    }
}

/// Writes a report either as its human summary or as pretty JSON
pub fn write_report<T, W>(out: &mut W, report: &T, json: bool) -> io::Result<()>
where
    T: Serialize + Display,
    W: Write,
{
    if json {
        serde_json::to_writer_pretty(&mut *out, report)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{}", report)?;
    }
    out.flush()
}

/// Prints a report to stdout; logs never share this stream
pub fn print_report<T>(report: &T, json: bool) -> io::Result<()>
where
    T: Serialize + Display,
{
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_report(&mut out, report, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{build_subscriber, default_log_directive};
    use crate::test_writer::CapturedWriter;
    use sea_orm::RuntimeErr;
    use tracing_subscriber::EnvFilter;

    #[test]
    fn failure_keeps_code_and_message() {
        let err = DbErr::Exec(RuntimeErr::Internal(
            "error returned from database: 1060 (42S21): Duplicate column name 'image_path'".into(),
        ));
        let failure = StepFailure::new("add_image_path", &err);
        assert_eq!(failure.code, Some(MySqlErrorCode::DuplicateColumn));
        assert!(failure.message.contains("Duplicate column name"));

        let rendered = serde_json::to_value(&failure).unwrap();
        assert_eq!(rendered["code"], "duplicate_column");
        assert_eq!(rendered["step"], "add_image_path");
    }

    #[test]
    fn json_report_stream_holds_only_json() {
        let failure = StepFailure::new("truncate", &DbErr::Custom("boom".into()));
        let logs = CapturedWriter::default();
        let subscriber = build_subscriber(
            EnvFilter::new(default_log_directive("info")),
            false,
            logs.clone(),
        );

        let mut out = Vec::new();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Truncated sale_items.");
            write_report(&mut out, &failure, true).unwrap();
            tracing::info!("Connection closed.");
        });

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["step"], "truncate");
        assert!(parsed["code"].is_null());
        assert!(logs.contents().contains("Truncated sale_items."));
        assert!(logs.contents().contains("Connection closed."));
    }
}
