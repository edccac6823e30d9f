// Tue Jan 13 2026 - Alex

use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::time::Instant;

pub struct LoggingUtils;

impl LoggingUtils {
    /// `RUST_LOG` wins when present; otherwise the louder of the configured
    /// level and the `-v` count drives the stderr logger.
    pub fn init(configured: &str, verbosity: usize) {
        if std::env::var_os("RUST_LOG").is_some() {
            env_logger::Builder::from_default_env().try_init().ok();
            return;
        }
        let configured = Self::parse_level(configured).unwrap_or(LevelFilter::Warn);
        Self::install(configured.max(Self::level_from_verbosity(verbosity)));
    }

    pub fn install(level: LevelFilter) {
        let logger = StderrLogger {
            level,
            started: Instant::now(),
        };
        if log::set_boxed_logger(Box::new(logger)).is_ok() {
            log::set_max_level(level);
        }
    }

    pub fn parse_level(s: &str) -> Option<LevelFilter> {
        match s.trim().to_lowercase().as_str() {
            "warning" => Some(LevelFilter::Warn),
            other => other.parse().ok(),
        }
    }

    pub fn level_from_verbosity(verbosity: usize) -> LevelFilter {
        match verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Error => "E".red().bold(),
        Level::Warn => "W".yellow().bold(),
        Level::Info => "I".green().bold(),
        Level::Debug => "D".blue().bold(),
        Level::Trace => "T".magenta().bold(),
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let module = record.target().strip_prefix("memhook::").unwrap_or(record.target());
        let elapsed = format!("{:>8.3}", self.started.elapsed().as_secs_f64());
        eprintln!(
            "{} {} {} {}",
            elapsed.dimmed(),
            level_tag(record.level()),
            module.dimmed(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Logs the elapsed time of a scope at debug level.
pub struct ScopedTimer {
    label: String,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        log::debug!("{} finished in {:.2}ms", self.label, self.start.elapsed().as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!(LoggingUtils::parse_level("DEBUG"), Some(LevelFilter::Debug));
        assert_eq!(LoggingUtils::parse_level(" warning "), Some(LevelFilter::Warn));
        assert_eq!(LoggingUtils::parse_level("off"), Some(LevelFilter::Off));
        assert_eq!(LoggingUtils::parse_level("bogus"), None);
    }

    #[test]
    fn test_verbosity_raises_level() {
        assert_eq!(LoggingUtils::level_from_verbosity(0), LevelFilter::Warn);
        assert_eq!(LoggingUtils::level_from_verbosity(2), LevelFilter::Debug);
        assert_eq!(LoggingUtils::level_from_verbosity(7), LevelFilter::Trace);
        assert!(LoggingUtils::level_from_verbosity(1) > LevelFilter::Error);
    }
}
