// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Logger construction shared by the daemons in this workspace.

use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;
use serde::Serialize;
use slog::Drain;

// Number of records buffered by the async drain before it starts dropping
// (and reporting) messages.
const ASYNC_CHAN_SIZE: usize = 0x2000;

/// How log records are rendered.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line, terminal-friendly text.
    #[default]
    Human,
    /// Bunyan-style JSON, one object per line.
    Json,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid log format '{0}': expected 'human' or 'json'")]
pub struct LogFormatParseError(String);

impl FromStr for LogFormat {
    type Err = LogFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            _ => Err(LogFormatParseError(s.to_string())),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Human => write!(f, "human"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Build the root logger for the daemon `name`.
///
/// Records go to `log_file` (opened for append) if one is given, and to
/// stdout otherwise.  Formatting happens on a background thread, so callers
/// must drop every clone of the returned logger before the process exits if
/// they want the final records flushed.
pub fn init(
    name: &'static str,
    log_file: &Option<String>,
    log_format: LogFormat,
) -> anyhow::Result<slog::Logger> {
    let sink: Box<dyn Write + Send> = match log_file {
        Some(path) => Box::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {path}"))?,
        ),
        None => Box::new(std::io::stdout()),
    };

    let drain = match log_format {
        LogFormat::Human => {
            let decorator = slog_term::PlainDecorator::new(sink);
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            slog_async::Async::new(drain)
                .chan_size(ASYNC_CHAN_SIZE)
                .build()
                .fuse()
        }
        LogFormat::Json => {
            let drain = slog_bunyan::with_name(name, sink).build().fuse();
            slog_async::Async::new(drain)
                .chan_size(ASYNC_CHAN_SIZE)
                .build()
                .fuse()
        }
    };

    Ok(slog::Logger::root(drain, slog::o!("unit" => name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(tag: &str) -> String {
        let mut path = std::env::temp_dir();
        path.push(format!("common-logging-{tag}-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::default(), LogFormat::Human);
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_json_log_to_file() {
        let path = scratch_file("json");
        let log = init("logtest", &Some(path.clone()), LogFormat::Json)
            .unwrap();
        slog::info!(log, "hello"; "port" => 9091);
        drop(log);

        let contents = std::fs::read_to_string(&path).unwrap();
        let line = contents.lines().next().expect("no log record written");
        let record: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(record["msg"], "hello");
        assert_eq!(record["port"], 9091);
        assert_eq!(record["unit"], "logtest");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_human_log_appends() {
        let path = scratch_file("human");
        for msg in ["first", "second"] {
            let log = init("logtest", &Some(path.clone()), LogFormat::Human)
                .unwrap();
            slog::info!(log, "{}", msg);
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("first"));
        assert!(contents.contains("second"));
        let _ = std::fs::remove_file(&path);
    }
}
