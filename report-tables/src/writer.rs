//! Report artifacts: indented JSON with sorted keys and dashboard timestamps.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::info;

use crate::errors::{TableError, TableResult};

/// Format of the `*_timestamp.txt` files.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes `value` to `path` indented by `indent` spaces, object keys sorted.
pub fn write_json<T: Serialize>(path: &Path, value: &T, indent: usize) -> TableResult<()> {
    ensure_parent(path)?;
    // objects of a Value are ordered maps
    let value = serde_json::to_value(value).map_err(|e| TableError::json(path, e))?;

    let file = fs::File::create(path).map_err(|e| TableError::io(path, e))?;
    let mut w = BufWriter::new(file);
    let pad = vec![b' '; indent];
    let mut ser = Serializer::with_formatter(&mut w, PrettyFormatter::with_indent(&pad));
    value
        .serialize(&mut ser)
        .map_err(|e| TableError::json(path, e))?;
    w.flush().map_err(|e| TableError::io(path, e))?;

    info!("wrote {}", path.display());
    Ok(())
}

/// Writes the current local time, without a trailing newline.
pub fn write_timestamp(path: &Path) -> TableResult<()> {
    ensure_parent(path)?;
    let now = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
    fs::write(path, now).map_err(|e| TableError::io(path, e))
}

/// Reads a JSON report written by an earlier step.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> TableResult<T> {
    let raw = fs::read_to_string(path).map_err(|e| TableError::io(path, e))?;
    serde_json::from_str(&raw).map_err(|e| TableError::json(path, e))
}

fn ensure_parent(path: &Path) -> TableResult<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| TableError::io(dir, e))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_sorted_with_requested_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data.json");
        write_json(&path, &json!([{"b": 1, "a": [2]}]), 1).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "[\n {\n  \"a\": [\n   2\n  ],\n  \"b\": 1\n }\n]");
        let back: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(back[0]["b"], 1);
    }

    #[test]
    fn timestamp_has_dashboard_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update_timestamp.txt");
        write_timestamp(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT).is_ok());
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let err = read_json::<serde_json::Value>(Path::new("/nonexistent/data.json")).unwrap_err();
        assert!(matches!(err, TableError::Io { .. }));
    }
}
