use std::sync::OnceLock;
#[cfg(test)]
use std::sync::Mutex;

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::config::{PROGRAM_LOG_LEVEL, PROGRAM_NAME};

/// Third-party crates (tiny_http, ignore, ...) never log below this level,
/// whatever `BACKDEX_LOG_LEVEL` says.
const FOREIGN_LEVEL_CAP: Level = Level::Warn;

enum LogTarget {
    Stderr,
    #[cfg(test)]
    Capture(Mutex<Vec<String>>),
}

pub struct Logger {
    level: Level,
    target: LogTarget,
}

fn is_own_target(target: &str) -> bool {
    target.starts_with(PROGRAM_NAME)
}

fn format_line(record: &Record<'_>) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    format!(
        "{} {:<5} [{}] {}",
        timestamp,
        record.level(),
        record.target(),
        record.args()
    )
}

impl Logger {
    fn effective_level(&self, target: &str) -> Level {
        if is_own_target(target) {
            self.level
        } else {
            self.level.min(FOREIGN_LEVEL_CAP)
        }
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.effective_level(metadata.target())
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_line(record);
        match &self.target {
            LogTarget::Stderr => eprintln!("{line}"),
            #[cfg(test)]
            LogTarget::Capture(lines) => {
                let mut lines = lines.lock().unwrap_or_else(|e| e.into_inner());
                lines.push(line);
            }
        }
    }

    fn flush(&self) {}
}

fn get_level_from_env() -> Level {
    std::env::var(PROGRAM_LOG_LEVEL)
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .and_then(|filter| filter.to_level())
        .unwrap_or(Level::Warn)
}

/// Install the stderr logger, reading the level from `BACKDEX_LOG_LEVEL`.
pub fn init() -> Result<(), SetLoggerError> {
    init_with_level(get_level_from_env())
}

/// Install the stderr logger at a fixed level.
///
/// Only the first call installs anything; later calls are no-ops so that
/// binaries and test harnesses can both call it freely.
pub fn init_with_level(level: Level) -> Result<(), SetLoggerError> {
    static LOGGER: OnceLock<Logger> = OnceLock::new();

    let init_call = LOGGER.get().is_none();

    let logger = LOGGER.get_or_init(|| Logger {
        level,
        target: LogTarget::Stderr,
    });

    if init_call {
        log::set_logger(logger)?;
        log::set_max_level(logger.level.to_level_filter());
    }

    Ok(())
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
