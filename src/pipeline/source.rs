//! Streaming record sources for import.
//!
//! Input is either standard input or a set of filesystem paths; directories
//! expand to their `*.json` files in deterministic walk order. Each stream is
//! decoded as a sequence of whitespace-delimited JSON objects (a top-level
//! array contributes its elements instead), one record per object. Decode and
//! construction failures are yielded per item so a bad record does not sink
//! the rest of the batch.

use crate::record::Record;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::io::Read;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Expands input paths into the list of JSON files to import.
///
/// Regular files are used directly; directories are walked recursively and
/// contribute their `*.json` files, visited in sorted order.
pub fn expand_input_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        let metadata = std::fs::metadata(path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;

        if metadata.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.map_err(|e| Error::Io {
                    path: path.clone(),
                    source: e.into(),
                })?;
                if entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == "json")
                {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }

    Ok(files)
}

/// A lazy stream of records decoded from a reader.
///
/// Pulling stops the moment the caller stops iterating; there is no buffering
/// beyond the JSON value currently being decoded. A syntax error ends the
/// stream after being reported, since the byte position of the next object is
/// no longer known; a structurally valid object that fails record
/// construction (e.g. missing `_id`) only skips that record.
pub struct RecordSource<R: Read> {
    stream: serde_json::StreamDeserializer<'static, serde_json::de::IoRead<R>, Value>,
    pending: VecDeque<Value>,
    poisoned: bool,
}

impl<R: Read> RecordSource<R> {
    /// Creates a record stream over a reader.
    pub fn new(reader: R) -> Self {
        Self {
            stream: serde_json::Deserializer::from_reader(reader).into_iter(),
            pending: VecDeque::new(),
            poisoned: false,
        }
    }
}

impl<R: Read> Iterator for RecordSource<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(value) = self.pending.pop_front() {
                return Some(Record::from_value(value));
            }
            if self.poisoned {
                return None;
            }

            match self.stream.next()? {
                Ok(Value::Array(items)) => {
                    self.pending.extend(items);
                }
                Ok(value) => return Some(Record::from_value(value)),
                Err(e) => {
                    self.poisoned = true;
                    return Some(Err(Error::MalformedRecord(format!("invalid JSON: {e}"))));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::io::Cursor;

    fn collect(input: &str) -> Vec<Result<Record>> {
        RecordSource::new(Cursor::new(input.to_string())).collect()
    }

    #[test]
    fn test_newline_delimited_objects() {
        let items = collect(
            r#"{"_id": "note/a", "n": 1}
{"_id": "note/b", "n": 2}
"#,
        );
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().id(), "note/a");
        assert_eq!(items[1].as_ref().unwrap().id(), "note/b");
    }

    #[test]
    fn test_whitespace_delimited_objects() {
        let items = collect(r#"{"_id": "note/a"}   {"_id": "note/b"} {"_id": "note/c"}"#);
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(Result::is_ok));
    }

    #[test]
    fn test_top_level_array() {
        let items = collect(r#"[{"_id": "note/a"}, {"_id": "note/b"}]"#);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(Result::is_ok));
    }

    #[test]
    fn test_missing_id_skips_only_that_record() {
        let items = collect(
            r#"{"no_id": true}
{"_id": "note/b"}
"#,
        );
        assert_eq!(items.len(), 2);
        assert!(items[0].is_err());
        assert_eq!(items[1].as_ref().unwrap().id(), "note/b");
    }

    #[test]
    fn test_syntax_error_ends_stream_after_reporting() {
        let items = collect(r#"{"_id": "note/a"} {"broken"#);
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[test]
    fn test_empty_input() {
        assert!(collect("").is_empty());
        assert!(collect("   \n  ").is_empty());
    }

    #[test]
    fn test_expand_input_paths() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();
        std::fs::write(nested.join("c.json"), "{}").unwrap();

        let files = expand_input_paths(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a.json", "b.json", "c.json"]);

        // regular files are taken as-is, json or not
        let single = dir.path().join("notes.txt");
        let files = expand_input_paths(&[single.clone()]).unwrap();
        assert_eq!(files, [single]);

        assert!(expand_input_paths(&[dir.path().join("missing")]).is_err());
    }
}
