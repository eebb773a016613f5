//! Handles logging for the runtime: a log-crate backend writing text or
//! json lines to stderr or the file given on the command line.
use std::env;
use std::io::{stderr, Write};
use std::path::PathBuf;
use std::{
    fs::{File, OpenOptions},
    str::FromStr,
};

use anyhow::{bail, Result};
use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::OnceCell;

pub static KONTAINER_LOGGER: OnceCell<KontainerLogger> = OnceCell::new();
static LOG_FILE: OnceCell<Option<File>> = OnceCell::new();

const LOG_FORMAT_TEXT: &str = "text";
const LOG_FORMAT_JSON: &str = "json";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

fn detect_log_format(log_format: Option<&str>) -> Result<LogFormat> {
    match log_format {
        None | Some(LOG_FORMAT_TEXT) => Ok(LogFormat::Text),
        Some(LOG_FORMAT_JSON) => Ok(LogFormat::Json),
        Some(unknown) => bail!("unknown log format: {}", unknown),
    }
}

pub fn init(debug: bool, log_file: Option<PathBuf>, log_format: Option<String>) -> Result<()> {
    let format = detect_log_format(log_format.as_deref())?;
    let level_filter = if debug {
        LevelFilter::Debug
    } else if let Ok(log_level_str) = env::var("KONTAINER_LOG_LEVEL") {
        LevelFilter::from_str(&log_level_str).unwrap_or(LevelFilter::Warn)
    } else {
        LevelFilter::Warn
    };

    let logger =
        KONTAINER_LOGGER.get_or_init(|| KontainerLogger::new(level_filter.to_level(), format));
    log::set_logger(logger)
        .map(|()| log::set_max_level(level_filter))
        .expect("set logger failed");

    LOG_FILE.get_or_init(|| -> Option<File> {
        log_file.as_ref().map(|log_file_path| {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(log_file_path)
                .expect("failed opening log file")
        })
    });

    Ok(())
}

pub struct KontainerLogger {
    level: Option<log::Level>,
    format: LogFormat,
}

impl KontainerLogger {
    fn new(level: Option<log::Level>, format: LogFormat) -> Self {
        Self { level, format }
    }

    fn render(&self, record: &Record) -> String {
        let timestamp = chrono::Local::now().to_rfc3339();
        match self.format {
            LogFormat::Text => match (record.file(), record.line()) {
                (Some(file), Some(line)) => format!(
                    "[{} {}:{}] {} {}",
                    record.level(),
                    file,
                    line,
                    timestamp,
                    record.args()
                ),
                (_, _) => format!("[{}] {} {}", record.level(), timestamp, record.args()),
            },
            LogFormat::Json => serde_json::json!({
                "level": record.level().to_string(),
                "time": timestamp,
                "msg": record.args().to_string(),
            })
            .to_string(),
        }
    }
}

impl Log for KontainerLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if let Some(level) = self.level {
            metadata.level() <= level
        } else {
            false
        }
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let log_msg = self.render(record);
            if let Some(mut log_file) = LOG_FILE.get().and_then(|f| f.as_ref()) {
                let _ = writeln!(log_file, "{log_msg}");
            } else {
                let _ = writeln!(stderr(), "{log_msg}");
            }
        }
    }

    fn flush(&self) {
        if let Some(mut log_file) = LOG_FILE.get().and_then(|f| f.as_ref()) {
            let _ = log_file.flush();
        } else {
            let _ = stderr().flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_log_format() {
        assert_eq!(detect_log_format(None).unwrap(), LogFormat::Text);
        assert_eq!(detect_log_format(Some("text")).unwrap(), LogFormat::Text);
        assert_eq!(detect_log_format(Some("json")).unwrap(), LogFormat::Json);
        assert!(detect_log_format(Some("yaml")).is_err());
    }

    #[test]
    fn test_json_render_is_valid_json() {
        let logger = KontainerLogger::new(Some(log::Level::Warn), LogFormat::Json);
        let rendered = logger.render(
            &log::Record::builder()
                .args(format_args!("something happened"))
                .level(log::Level::Warn)
                .build(),
        );
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["level"], "WARN");
        assert_eq!(parsed["msg"], "something happened");
    }
}
