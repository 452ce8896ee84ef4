use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::PathBuf,
};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use log::{LevelFilter, Log, Metadata, Record};
use serde_json::json;

pub const LOG_JSON_ENV: &str = "CARDCTL_LOG_JSON_PATH";

/// Console output for the operator plus an optional JSON-lines event file.
pub struct Logger {
    command: &'static str,
    json_file: Option<File>,
}

impl Logger {
    pub fn from_env(command: &'static str) -> Result<Self> {
        let path = std::env::var(LOG_JSON_ENV).ok().map(PathBuf::from);
        Self::new(command, path)
    }

    pub fn new(command: &'static str, path: Option<PathBuf>) -> Result<Self> {
        let json_file = match path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("create log dir {}", parent.display()))?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("open event log {}", path.display()))?;
                Some(file)
            }
            None => None,
        };
        Ok(Self { command, json_file })
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        println!("{}", message.as_ref());
        self.event("info", message.as_ref());
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        eprintln!("warning: {}", message.as_ref());
        self.event("warn", message.as_ref());
    }

    fn event(&mut self, level: &str, message: &str) {
        let Some(file) = &mut self.json_file else {
            return;
        };
        let now = Utc::now();
        let entry = json!({
            "ts_ms": now.timestamp_millis(),
            "at": now.to_rfc3339_opts(SecondsFormat::Millis, true),
            "command": self.command,
            "level": level,
            "msg": message,
        });
        // The event file is best effort; console output already happened.
        let _ = writeln!(file, "{entry}");
        let _ = file.flush();
    }
}

/// Routes `log` records from the storage library to stderr.
struct StderrLog;

static STDERR_LOG: StderrLog = StderrLog;

impl Log for StderrLog {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

pub fn install_log_bridge(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    if log::set_logger(&STDERR_LOG).is_ok() {
        log::set_max_level(level);
    }
}
