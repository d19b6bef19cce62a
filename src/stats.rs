//! Append-only JSON statistics log

use std::io::Write;
use std::path::{Path, PathBuf};

use atomicwrites::{AllowOverwrite, AtomicFile};
use chrono::{DateTime, SecondsFormat, TimeZone};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{analysis::ColorCount, color::color_name};

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("error writing log: {0}")]
    Write(#[from] atomicwrites::Error<std::io::Error>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStat {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub name: String,
    pub percent: f64,
}

impl ColorStat {
    pub fn new(entry: &ColorCount, total_pixels: usize) -> Self {
        let (r, g, b) = entry.color.into_components();

        Self {
            r,
            g,
            b,
            name: color_name(entry.color).to_owned(),
            percent: entry.percent(total_pixels),
        }
    }
}

/// Statistics for one sampling cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub screen_size: String,
    pub top_colors: Vec<ColorStat>,
}

impl LogEntry {
    pub fn new<Tz: TimeZone>(
        timestamp: DateTime<Tz>,
        (width, height): (u32, u32),
        top_colors: &[ColorCount],
        total_pixels: usize,
    ) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            screen_size: format!("{}x{}", width, height),
            top_colors: top_colors
                .iter()
                .map(|entry| ColorStat::new(entry, total_pixels))
                .collect(),
        }
    }
}

/// JSON file holding an array of log entries
#[derive(Debug, Clone)]
pub struct StatsLog {
    path: PathBuf,
}

impl StatsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        // Temporary files are created next to the log, which needs an explicit parent
        let path = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => path,
            _ => Path::new(".").join(path),
        };

        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the entries currently in the log
    ///
    /// A missing or blank file holds no entries. Files that are not a JSON array are read as
    /// one JSON object per line, and lines that fail to parse are dropped.
    pub fn read_entries(&self) -> Result<Vec<Value>, StatsError> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        Ok(parse_entries(&content))
    }

    /// Add `entry` at the end of the log, rewriting the whole file
    pub fn append(&self, entry: &LogEntry) -> Result<(), StatsError> {
        let mut entries = self.read_entries()?;
        entries.push(serde_json::to_value(entry)?);

        AtomicFile::new(&self.path, AllowOverwrite).write(|f| {
            serde_json::to_writer_pretty(&mut *f, &entries)?;
            f.write_all(b"\n")?;
            f.sync_all()
        })?;

        trace!(path = %self.path.display(), entries = entries.len(), "appended log entry");
        Ok(())
    }
}

fn parse_entries(content: &[u8]) -> Vec<Value> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Vec::new();
    }

    if let Ok(entries) = serde_json::from_slice::<Vec<Value>>(content) {
        return entries;
    }

    // Lines are parsed as bytes, so invalid UTF-8 only affects its own line
    let entries: Vec<_> = content
        .split(|&byte| byte == b'\n')
        .filter_map(|line| serde_json::from_slice::<Value>(line).ok())
        .filter(Value::is_object)
        .collect();

    debug!(entries = entries.len(), "recovered line-delimited log");
    entries
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};

    use super::*;
    use crate::models::Color;

    fn entry(seconds: i64) -> LogEntry {
        LogEntry::new(
            Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap(),
            (192, 108),
            &[
                ColorCount {
                    color: Color::new(0, 0, 0),
                    count: 3,
                },
                ColorCount {
                    color: Color::new(240, 0, 0),
                    count: 1,
                },
            ],
            4,
        )
    }

    #[test]
    fn entry_format() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let entry = LogEntry::new(
            tz.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap(),
            (10, 5),
            &[ColorCount {
                color: Color::new(240, 0, 0),
                count: 25,
            }],
            50,
        );

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "timestamp": "2024-05-06T07:08:09+02:00",
                "screen_size": "10x5",
                "top_colors": [
                    { "r": 240, "g": 0, "b": 0, "name": "light red", "percent": 50.0 }
                ]
            })
        );
    }

    #[test]
    fn append_to_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = StatsLog::new(dir.path().join("colorlog.json"));

        log.append(&entry(0)).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let parsed: Vec<LogEntry> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, vec![entry(0)]);
    }

    #[test]
    fn append_to_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colorlog.json");
        std::fs::write(&path, "  \n").unwrap();

        let log = StatsLog::new(&path);
        log.append(&entry(0)).unwrap();
        log.append(&entry(1)).unwrap();

        let parsed: Vec<LogEntry> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, vec![entry(0), entry(1)]);
    }

    #[test]
    fn migrate_line_delimited_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colorlog.json");

        let legacy = format!(
            "{}\nthis line is garbage\n{}\n[1, 2]\n{}\n",
            serde_json::to_string(&entry(0)).unwrap(),
            serde_json::to_string(&entry(1)).unwrap(),
            r#"{"timestamp": "partial"#,
        );
        std::fs::write(&path, legacy).unwrap();

        let log = StatsLog::new(&path);
        assert_eq!(log.read_entries().unwrap().len(), 2);

        log.append(&entry(2)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<LogEntry> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, vec![entry(0), entry(1), entry(2)]);

        // Indented for humans
        assert!(content.starts_with("[\n  {"));
    }

    #[test]
    fn drop_invalid_utf8_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colorlog.json");

        let mut legacy = serde_json::to_vec(&entry(0)).unwrap();
        legacy.extend_from_slice(b"\n\xff\xfe garbage\n");
        std::fs::write(&path, legacy).unwrap();

        let log = StatsLog::new(&path);
        log.append(&entry(1)).unwrap();
        log.append(&entry(2)).unwrap();

        let parsed: Vec<LogEntry> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, vec![entry(0), entry(1), entry(2)]);
    }

    #[test]
    fn keep_unknown_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colorlog.json");
        std::fs::write(&path, r#"[{"note": "kept"}]"#).unwrap();

        let log = StatsLog::new(&path);
        log.append(&entry(0)).unwrap();

        let entries = log.read_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], serde_json::json!({ "note": "kept" }));
    }

    #[test]
    fn relative_path_gets_parent() {
        let log = StatsLog::new("colorlog.json");
        assert_eq!(log.path(), Path::new("./colorlog.json"));

        let log = StatsLog::new("logs/colorlog.json");
        assert_eq!(log.path(), Path::new("logs/colorlog.json"));
    }
}
