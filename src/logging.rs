use std::{fmt::Display, sync::OnceLock};

use log::{LevelFilter, Log, Metadata, Record};

// Installed once per process; later calls only adjust the level filter.
static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Writes `timestamp [LEVEL] target: message` lines to stderr.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        eprintln!(
            "{} [{}] {}: {}",
            jiff::Timestamp::now(),
            record.level().as_str(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Initialize the logging system.
pub fn init_logging(level: LevelFilter) {
    let logger = LOGGER.get_or_init(|| StderrLogger);
    if log::set_logger(logger).is_err() {
        log::debug!("logger already installed, only updating level");
    }
    log::set_max_level(level);
}

/// Result extension for convenient error logging
pub trait ResultExt<T, E> {
    fn log_error(self, context: &str) -> Self;
}

impl<T, E: Display> ResultExt<T, E> for Result<T, E> {
    fn log_error(self, context: &str) -> Self {
        if let Err(ref error) = self {
            log::error!("{}: {}", context, error);
        }
        self
    }
}
