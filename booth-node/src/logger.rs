//! Logging Infrastructure
//!
//! Console output plus, when a log directory is given, daily rolling files:
//! - `app/`      application logs, removed after the retention window
//! - `audit/`    verification records and integrity failures (kept)
//! - `security/` login, logout and credential events (kept)

use std::fs;
use std::path::Path;

use chrono::{Local, NaiveDate, NaiveTime, TimeZone};
use tracing::Metadata;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

/// Application logs older than this are deleted by [`cleanup_old_logs`]
pub const APP_LOG_RETENTION_DAYS: i64 = 14;

const APP_PREFIX: &str = "app";
const AUDIT_TARGET: &str = "audit";
const SECURITY_TARGET: &str = "security";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Initialize the logging system
///
/// # Arguments
/// * `level` - default filter when `RUST_LOG` is unset ("info", "debug", ...)
/// * `json_format` - JSON lines instead of the human-readable format
/// * `log_dir` - enable file logging under this directory
///
/// ```no_run
/// booth_node::logger::init_logger_with_file("info", false, Some("./work_dir/logs"))?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logger_with_file(
    level: &str,
    json_format: bool,
    log_dir: Option<&str>,
) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer> = vec![console_layer(json_format)];

    if let Some(dir) = log_dir {
        let log_dir = Path::new(dir);
        layers.push(file_layer(&log_dir.join("app"), APP_PREFIX, json_format, |meta| {
            meta.target() != AUDIT_TARGET && meta.target() != SECURITY_TARGET
        })?);
        layers.push(file_layer(&log_dir.join("audit"), AUDIT_TARGET, json_format, |meta| {
            meta.target() == AUDIT_TARGET
        })?);
        layers.push(file_layer(
            &log_dir.join("security"),
            SECURITY_TARGET,
            json_format,
            |meta| meta.target() == SECURITY_TARGET,
        )?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;
    Ok(())
}

/// Console-only logging
pub fn init_logger(level: &str, json_format: bool) -> anyhow::Result<()> {
    init_logger_with_file(level, json_format, None)
}

fn console_layer(json_format: bool) -> BoxedLayer {
    if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    }
}

/// Daily rolling `<prefix>.YYYY-MM-DD.log` files holding events `keep` accepts
fn file_layer(
    dir: &Path,
    prefix: &str,
    json_format: bool,
    keep: fn(&Metadata<'_>) -> bool,
) -> anyhow::Result<BoxedLayer> {
    fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(dir)?;

    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(appender));

    Ok(if json_format {
        layer.json().with_filter(filter_fn(keep)).boxed()
    } else {
        layer.with_filter(filter_fn(keep)).boxed()
    })
}

/// Delete `app/app.YYYY-MM-DD.log` files older than `retention_days`.
/// Audit and security logs are never touched. Returns the number removed.
pub fn cleanup_old_logs(log_dir: &Path, retention_days: i64) -> anyhow::Result<usize> {
    let cutoff = Local::now() - chrono::Duration::days(retention_days);
    let app_log_dir = log_dir.join("app");
    if !app_log_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(app_log_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(date) = name
            .strip_prefix("app.")
            .and_then(|rest| rest.strip_suffix(".log"))
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            continue;
        };

        if let Some(day_start) = Local.from_local_datetime(&date.and_time(NaiveTime::MIN)).single()
            && day_start < cutoff
        {
            fs::remove_file(&path)?;
            tracing::info!(file = %name, "Deleted old log file");
            removed += 1;
        }
    }

    Ok(removed)
}
