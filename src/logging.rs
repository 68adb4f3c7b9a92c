use std::io::Write;

use env_logger::Env;
use log::Level;

const TIMESTAMP_FORMAT: &str = "%Y%m%d %H:%M:%S";

/// Sink for the warnings and progress messages emitted by the header checks.
///
/// Checks take a `&dyn Reporter` instead of reaching for the global logger so
/// callers (and tests) decide where messages go.
pub trait Reporter {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Forwards messages to the `log` facade under a fixed target.
#[derive(Debug, Clone, Copy)]
pub struct LogReporter {
    target: &'static str,
}

impl LogReporter {
    pub fn new(target: &'static str) -> Self {
        Self { target }
    }
}

impl Reporter for LogReporter {
    fn info(&self, message: &str) {
        log::info!(target: self.target, "{}", message);
    }

    fn warn(&self, message: &str) {
        log::warn!(target: self.target, "{}", message);
    }
}

/// Level names as the downstream log scrapers expect them.
pub fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

pub fn format_line(level: Level, timestamp: &str, target: &str, message: &str) -> String {
    format!("[{}] [{}] [{}] - {}", level_name(level), timestamp, target, message)
}

/// Install the stderr logger: `[LEVEL] [timestamp] [logger-name] - message`.
pub fn init_logger() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
            writeln!(
                buf,
                "{}",
                format_line(
                    record.level(),
                    &timestamp,
                    record.target(),
                    &record.args().to_string()
                )
            )
        })
        .init();
}
