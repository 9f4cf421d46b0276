//! 把 log 宏的输出打印到 stderr
//!
//! 日志级别由环境变量 `JBOD_LOG` 决定 (error / warn / info / debug / trace / off), 默认 warn

use std::{env, io::Write};

use lazy_static::*;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub const LOG_ENV: &str = "JBOD_LOG";

struct Logger {
    level: LevelFilter,
}

impl Logger {
    fn from_env() -> Self {
        let level = env::var(LOG_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(LevelFilter::Warn);
        Self { level }
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = writeln!(
            std::io::stderr().lock(),
            "[{} {:>5} {}] {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

lazy_static! {
    static ref LOGGER: Logger = Logger::from_env();
}

pub fn init() -> Result<(), SetLoggerError> {
    log::set_logger(&*LOGGER)?;
    log::set_max_level(LOGGER.level);
    Ok(())
}
