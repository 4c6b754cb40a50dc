//! Optional file-backed tracing setup.
//!
//! The interface owns stderr, so logs only go somewhere when `$SIFT_LOG`
//! names a file; without it tracing stays uninitialized and every span and
//! event is a no-op.

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

const LOG_PATH_ENV: &str = "SIFT_LOG";
const LOG_FILTER_ENV: &str = "SIFT_LOG_FILTER";

pub fn initialize() {
    let Ok(path) = std::env::var(LOG_PATH_ENV) else {
        return;
    };
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        eprintln!("sift: cannot open log file {path}");
        return;
    };
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
}
