use std::io::Write;

use chrono::Utc;
use log::{LevelFilter, Log, Metadata, Record};

/// Minimal stderr backend for the `log` facade. Report output owns stdout.
pub struct StderrLogger {
    level: LevelFilter,
}

impl StderrLogger {
    pub fn new(level: LevelFilter) -> Self {
        StderrLogger { level }
    }

    /// Level from `ROS_STATUS_LOG`, `warn` when unset or unrecognised.
    pub fn level_from_env() -> LevelFilter {
        parse_level(std::env::var("ROS_STATUS_LOG").ok().as_deref())
    }

    /// Installs the logger globally; a second call is a no-op.
    pub fn init(level: LevelFilter) {
        if log::set_boxed_logger(Box::new(StderrLogger::new(level))).is_ok() {
            log::set_max_level(level);
        }
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
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "{} {:<5} {}: {}",
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn parse_level(raw: Option<&str>) -> LevelFilter {
    raw.and_then(|value| value.trim().parse().ok())
        .unwrap_or(LevelFilter::Warn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn level_parsing_falls_back_to_warn() {
        assert_eq!(parse_level(Some("debug")), LevelFilter::Debug);
        assert_eq!(parse_level(Some(" TRACE ")), LevelFilter::Trace);
        assert_eq!(parse_level(Some("off")), LevelFilter::Off);
        assert_eq!(parse_level(Some("chatty")), LevelFilter::Warn);
        assert_eq!(parse_level(None), LevelFilter::Warn);
    }

    #[test]
    fn enabled_respects_filter() {
        let logger = StderrLogger::new(LevelFilter::Info);
        let info = Metadata::builder().level(Level::Info).build();
        let debug = Metadata::builder().level(Level::Debug).build();
        assert!(logger.enabled(&info));
        assert!(!logger.enabled(&debug));
    }
}
