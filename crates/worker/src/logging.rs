//! Tracing subscriber setup: console output plus one log file per day.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives used when `RUST_LOG` is not set.
const DEFAULT_DIRECTIVES: &str = "robodispatch_worker=info,robodispatch_broker=info,\
robodispatch_launcher=info,robodispatch_events=info,robodispatch_core=info";

/// `dd-mm-YYYY.log`
pub fn log_file_name(date: NaiveDate) -> String {
    format!("{}.log", date.format("%d-%m-%Y"))
}

/// Create `dir` if needed and open (truncating) the log file for `date`.
pub fn open_log_file(dir: &Path, date: NaiveDate) -> std::io::Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(log_file_name(date));
    let file = File::create(&path)?;
    Ok((path, file))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_DIRECTIVES.into())
}

/// Console-only logging, used when the configuration could not be loaded.
pub fn init_console() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Console logging plus today's log file under `log_dir`.
///
/// Returns the path of the log file.
pub fn init(log_dir: &Path) -> std::io::Result<PathBuf> {
    let today = chrono::Local::now().date_naive();
    let (path, file) = open_log_file(log_dir, today)?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false),
        )
        .init();

    Ok(path)
}
