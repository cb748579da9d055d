//! Record command group.

use super::warn;
use crate::complex::DOWNLOAD_ASSET_PREFIX;
use crate::container::RecordStore;
use crate::pipeline::{self, ExportOptions, ImportOptions};
use crate::record::{Record, check_record_id};
use crate::{Error, Result};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Asks on the terminal whether a matched complex value should be converted.
///
/// Re-prompts until the answer is y/Y or n/N.
fn confirm_conversion(key: &str, value: &str, kind: &'static str) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(format!("Convert field '{key}' ({kind} value '{value}')?"))
        .interact()
        .map_err(|e| Error::OperationFailed {
            operation: "confirm_conversion".to_string(),
            cause: e.to_string(),
        })
}

/// `record import [<path> ...]`
///
/// With no paths, records are read from standard input.
pub fn import_records(
    store: &dyn RecordStore,
    paths: &[PathBuf],
    options: &ImportOptions,
) -> Result<()> {
    let mut confirm = confirm_conversion;
    let mut warn_sink = |e: &Error| warn(e);

    let report = if paths.is_empty() {
        let stdin = std::io::stdin();
        pipeline::import_reader(
            store,
            stdin.lock(),
            None,
            options,
            &mut confirm,
            &mut warn_sink,
        )
    } else {
        pipeline::import_paths(store, paths, options, &mut confirm, &mut warn_sink)?
    };

    println!("Imported {} records, {} failed.", report.saved, report.failed);
    Ok(())
}

/// `record export <record_id> ...`
pub fn export_records(
    store: &dyn RecordStore,
    record_ids: &[String],
    options: &ExportOptions,
) -> Result<()> {
    pipeline::export_records(store, record_ids, options, &mut |e| warn(e))
}

/// `record query <record_type>`
pub fn query_records(
    store: &dyn RecordStore,
    record_type: &str,
    options: &ExportOptions,
) -> Result<()> {
    pipeline::query_records(store, record_type, options, &mut |e| warn(e))
}

/// `record delete <record_id> ...`
///
/// All IDs are validated before anything is deleted; per-record server
/// failures afterwards are warnings.
pub fn delete_records(store: &dyn RecordStore, record_ids: &[String]) -> Result<()> {
    for record_id in record_ids {
        check_record_id(record_id)?;
    }

    for warning in store.delete_records(record_ids)? {
        warn(&warning);
    }
    Ok(())
}

/// `record set <record_id> <key=value> ...`
pub fn set_attributes(
    store: &dyn RecordStore,
    record_id: &str,
    assignments: &[String],
) -> Result<()> {
    let mut record = Record::empty(record_id)?;
    for assignment in assignments {
        record.assign(assignment)?;
    }
    store.save_record(&record)
}

/// Renders an attribute value the way the terminal expects it: strings raw,
/// everything else as JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `record get <record_id> <key>`
///
/// With `fetch_asset` set and an `@asset:` value, the asset content itself is
/// written instead of the marker.
pub fn get_attribute(
    store: &dyn RecordStore,
    record_id: &str,
    key: &str,
    output: Option<&Path>,
    fetch_asset: bool,
) -> Result<()> {
    check_record_id(record_id)?;
    let record = store.fetch_record(record_id)?;
    let value = record.get(key);

    if fetch_asset {
        if let Some(asset_id) = value.as_str().and_then(|s| s.strip_prefix(DOWNLOAD_ASSET_PREFIX)) {
            let bytes = store.fetch_asset(asset_id)?;
            return match output {
                Some(path) => std::fs::write(path, bytes).map_err(|source| Error::Io {
                    path: path.to_path_buf(),
                    source,
                }),
                None => std::io::stdout().write_all(&bytes).map_err(|e| {
                    Error::OperationFailed {
                        operation: "write_stdout".to_string(),
                        cause: e.to_string(),
                    }
                }),
            };
        }
    }

    let rendered = render_value(&value);
    match output {
        Some(path) => {
            std::fs::write(path, format!("{rendered}\n")).map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })
        }
        None => {
            println!("{rendered}");
            Ok(())
        }
    }
}

/// Round-trips a record through `$EDITOR` (default `vim`) via a scratch file.
fn modify_with_editor(record: &Record) -> Result<Record> {
    let scratch = tempfile::Builder::new()
        .prefix("strandcli-")
        .suffix(".json")
        .tempfile()
        .map_err(|e| Error::OperationFailed {
            operation: "create_scratch_file".to_string(),
            cause: e.to_string(),
        })?;

    std::fs::write(scratch.path(), record.to_pretty_json()?).map_err(|source| Error::Io {
        path: scratch.path().to_path_buf(),
        source,
    })?;

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string());
    let status = std::process::Command::new(&editor)
        .arg(scratch.path())
        .status()
        .map_err(|e| Error::OperationFailed {
            operation: "run_editor".to_string(),
            cause: format!("{editor}: {e}"),
        })?;
    if !status.success() {
        return Err(Error::OperationFailed {
            operation: "run_editor".to_string(),
            cause: format!("{editor} exited with {status}"),
        });
    }

    let contents = std::fs::read_to_string(scratch.path()).map_err(|source| Error::Io {
        path: scratch.path().to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents)
        .map_err(|e| Error::MalformedRecord(format!("edited record: {e}")))
}

/// `record edit <record_id|record_type>`
///
/// Given a bare type, a fresh `<type>/<uuid>` record is created. With
/// `create_new` the record is not fetched first.
pub fn edit_record(store: &dyn RecordStore, target: &str, create_new: bool) -> Result<()> {
    let (record_id, create_new) = if target.contains('/') {
        check_record_id(target)?;
        (target.to_string(), create_new)
    } else {
        (format!("{target}/{}", uuid::Uuid::new_v4()), true)
    };

    let record = if create_new {
        Record::empty(&record_id)?
    } else {
        store.fetch_record(&record_id)?
    };

    let edited = modify_with_editor(&record)?;
    store.save_record(&edited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("plain")), "plain");
        assert_eq!(render_value(&json!(42)), "42");
        assert_eq!(render_value(&json!(true)), "true");
        assert_eq!(render_value(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(render_value(&json!([1, 2])), "[1,2]");
    }
}
