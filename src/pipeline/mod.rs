//! Record import/export pipeline.
//!
//! Import runs each record through a fixed sequence: decode, asset upload,
//! complex-value conversion, save. Export is the inverse: fetch or query,
//! strip server bookkeeping, materialize assets, write JSON. Batch operations
//! are partial-failure tolerant: per-record errors go to the warning callback
//! and the rest of the batch keeps going. There are no transaction or
//! rollback semantics; a partially applied batch is expected.

mod source;

pub use source::{RecordSource, expand_input_paths};

use crate::complex::{DOWNLOAD_ASSET_PREFIX, UPLOAD_ASSET_PREFIX, complex_value_types};
use crate::container::RecordStore;
use crate::record::{Record, check_record_id};
use crate::{Error, Result};
use serde_json::Value;
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Callback deciding whether a matched complex value gets converted.
///
/// Receives the field key, the marker string, and the variant name. Errors
/// abort the record, not the batch.
pub type ConvertPrompt<'a> = &'a mut dyn FnMut(&str, &str, &'static str) -> Result<bool>;

/// Callback receiving per-record warnings during batch operations.
pub type WarningSink<'a> = &'a mut dyn FnMut(&Error);

/// Options controlling record import.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Drop `@file:` fields instead of uploading them.
    pub skip_asset: bool,
    /// Base directory for relative asset paths. When unset, paths resolve
    /// against the record file's containing directory.
    pub asset_base_dir: Option<PathBuf>,
    /// Convert complex values without prompting.
    pub force_convert: bool,
}

impl ImportOptions {
    /// Enables or disables asset handling.
    #[must_use]
    pub const fn with_skip_asset(mut self, skip: bool) -> Self {
        self.skip_asset = skip;
        self
    }

    /// Sets the base directory for relative asset paths.
    #[must_use]
    pub fn with_asset_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_base_dir = Some(dir.into());
        self
    }

    /// Enables or disables unprompted complex-value conversion.
    #[must_use]
    pub const fn with_force_convert(mut self, force: bool) -> Self {
        self.force_convert = force;
        self
    }
}

/// Options controlling record export and query output.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Leave `@asset:` fields alone instead of downloading them.
    pub skip_asset: bool,
    /// Directory downloaded assets are written into.
    pub asset_base_dir: Option<PathBuf>,
    /// Indent the JSON output.
    pub pretty_print: bool,
    /// Write to this file instead of standard output.
    pub output: Option<PathBuf>,
}

impl ExportOptions {
    /// Enables or disables asset handling.
    #[must_use]
    pub const fn with_skip_asset(mut self, skip: bool) -> Self {
        self.skip_asset = skip;
        self
    }

    /// Sets the directory downloaded assets are written into.
    #[must_use]
    pub fn with_asset_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_base_dir = Some(dir.into());
        self
    }

    /// Enables or disables indented output.
    #[must_use]
    pub const fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    /// Writes output to a file instead of standard output.
    #[must_use]
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }
}

/// Counts of a finished import batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Records saved successfully.
    pub saved: usize,
    /// Records that failed and were reported as warnings.
    pub failed: usize,
}

/// Keys whose value is a string carrying the given marker prefix.
fn marked_keys(record: &Record, prefix: &str) -> Vec<String> {
    record
        .data
        .iter()
        .filter(|(_, value)| value.as_str().is_some_and(|s| s.starts_with(prefix)))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Resolves an `@file:` payload to the file to upload.
fn resolve_asset_path(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    base_dir.map_or_else(|| path.to_path_buf(), |dir| dir.join(raw))
}

/// Uploads every `@file:` field of a record, replacing the marker with the
/// server-issued `@asset:<id>` marker.
///
/// With `skip_asset` set the fields are removed instead. A failed upload
/// leaves the record untouched and aborts the record.
pub fn upload_assets(
    store: &dyn RecordStore,
    record: &mut Record,
    base_dir: Option<&Path>,
    skip_asset: bool,
) -> Result<()> {
    for key in marked_keys(record, UPLOAD_ASSET_PREFIX) {
        if skip_asset {
            record.data.remove(&key);
            continue;
        }

        let marker = record.get(&key);
        let raw = marker
            .as_str()
            .and_then(|s| s.strip_prefix(UPLOAD_ASSET_PREFIX))
            .unwrap_or_default();
        let path = resolve_asset_path(raw, base_dir);

        let asset_id = store.save_asset(&path)?;
        tracing::debug!(record_id = record.id(), key, asset_id, "uploaded asset");
        record.set(key, format!("{DOWNLOAD_ASSET_PREFIX}{asset_id}"));
    }
    Ok(())
}

/// Converts complex-value markers into their structured payloads.
///
/// Each remaining string field is matched against the registered variants;
/// the first match wins. Unless `force_convert` is set, the prompt decides
/// per field, and declining leaves the marker string untouched.
pub fn convert_complex_values(
    record: &mut Record,
    force_convert: bool,
    confirm: ConvertPrompt<'_>,
) -> Result<()> {
    let keys: Vec<String> = record
        .data
        .iter()
        .filter(|(_, value)| value.is_string())
        .map(|(key, _)| key.clone())
        .collect();

    for key in keys {
        let Some(text) = record.data.get(&key).and_then(Value::as_str) else {
            continue;
        };
        let text = text.to_string();

        // asset markers are transfer side effects, not codec input
        if text.starts_with(UPLOAD_ASSET_PREFIX) || text.starts_with(DOWNLOAD_ASSET_PREFIX) {
            continue;
        }

        for complex_type in complex_value_types() {
            if !complex_type.validate(&text) {
                continue;
            }
            if force_convert || confirm(&key, &text, complex_type.name())? {
                let converted = complex_type.convert(&text)?;
                record.set(key.clone(), converted);
            }
            break;
        }
    }
    Ok(())
}

/// Downloads every `@asset:` field of a record, writing the bytes to an
/// asset-ID-named file and replacing the marker with `@file:<local path>`.
///
/// The asset ID is server-supplied and names the local file, so it must be a
/// plain file name; an ID carrying path components is rejected before any
/// bytes are fetched.
pub fn download_assets(
    store: &dyn RecordStore,
    record: &mut Record,
    base_dir: Option<&Path>,
    skip_asset: bool,
) -> Result<()> {
    if skip_asset {
        return Ok(());
    }

    for key in marked_keys(record, DOWNLOAD_ASSET_PREFIX) {
        let marker = record.get(&key);
        let asset_id = marker
            .as_str()
            .and_then(|s| s.strip_prefix(DOWNLOAD_ASSET_PREFIX))
            .unwrap_or_default()
            .to_string();

        if Path::new(&asset_id).file_name() != Some(OsStr::new(&asset_id)) {
            return Err(Error::MalformedRecord(format!(
                "asset ID '{asset_id}' is not a plain file name"
            )));
        }

        let bytes = store.fetch_asset(&asset_id)?;
        let path = base_dir.map_or_else(|| PathBuf::from(&asset_id), |dir| dir.join(&asset_id));
        std::fs::write(&path, bytes).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(record_id = record.id(), key, asset_id, "downloaded asset");
        record.set(key, format!("{UPLOAD_ASSET_PREFIX}{}", path.display()));
    }
    Ok(())
}

/// Runs one record through the import sequence and saves it.
pub fn import_record(
    store: &dyn RecordStore,
    record: &mut Record,
    base_dir: Option<&Path>,
    options: &ImportOptions,
    confirm: ConvertPrompt<'_>,
) -> Result<()> {
    upload_assets(store, record, base_dir, options.skip_asset)?;
    convert_complex_values(record, options.force_convert, confirm)?;
    store.save_record(record)
}

/// Imports every record decoded from a reader.
///
/// `base_dir` is the directory relative asset paths resolve against when the
/// options carry no explicit base directory.
pub fn import_reader<R: std::io::Read>(
    store: &dyn RecordStore,
    reader: R,
    base_dir: Option<&Path>,
    options: &ImportOptions,
    confirm: ConvertPrompt<'_>,
    warn: WarningSink<'_>,
) -> ImportReport {
    let effective_base = options.asset_base_dir.as_deref().or(base_dir);
    let mut report = ImportReport::default();

    for item in RecordSource::new(reader) {
        let outcome = item.and_then(|mut record| {
            import_record(store, &mut record, effective_base, options, confirm)
        });
        match outcome {
            Ok(()) => report.saved += 1,
            Err(e) => {
                warn(&e);
                report.failed += 1;
            }
        }
    }

    report
}

/// Imports records from files and directories.
///
/// Files that cannot be opened are reported as warnings; the remaining files
/// are still imported.
pub fn import_paths(
    store: &dyn RecordStore,
    paths: &[PathBuf],
    options: &ImportOptions,
    confirm: ConvertPrompt<'_>,
    warn: WarningSink<'_>,
) -> Result<ImportReport> {
    let files = expand_input_paths(paths)?;
    let mut report = ImportReport::default();

    for file in files {
        let reader = match std::fs::File::open(&file) {
            Ok(f) => std::io::BufReader::new(f),
            Err(source) => {
                warn(&Error::Io {
                    path: file.clone(),
                    source,
                });
                continue;
            }
        };

        tracing::info!(file = %file.display(), "importing records");
        let file_report = import_reader(store, reader, file.parent(), options, confirm, warn);
        report.saved += file_report.saved;
        report.failed += file_report.failed;
    }

    Ok(report)
}

/// Opens the configured output destination.
fn output_writer(options: &ExportOptions) -> Result<Box<dyn Write>> {
    match &options.output {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(std::io::stdout())),
    }
}

/// Writes one record as JSON, newline-terminated.
fn write_record(writer: &mut dyn Write, record: &Record, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        record.to_pretty_json()?
    } else {
        serde_json::to_string(record).map_err(|e| Error::OperationFailed {
            operation: "serialize_record".to_string(),
            cause: e.to_string(),
        })?
    };
    writeln!(writer, "{rendered}").map_err(|e| Error::OperationFailed {
        operation: "write_record".to_string(),
        cause: e.to_string(),
    })
}

/// Post-download handling shared by export and query: strip server
/// bookkeeping, then materialize assets.
fn process_downloaded(
    store: &dyn RecordStore,
    record: &mut Record,
    options: &ExportOptions,
) -> Result<()> {
    record.post_download_handle()?;
    download_assets(
        store,
        record,
        options.asset_base_dir.as_deref(),
        options.skip_asset,
    )
}

/// Exports records by ID, one JSON object per record.
pub fn export_records(
    store: &dyn RecordStore,
    record_ids: &[String],
    options: &ExportOptions,
    warn: WarningSink<'_>,
) -> Result<()> {
    let mut writer = output_writer(options)?;

    for record_id in record_ids {
        let outcome = check_record_id(record_id)
            .and_then(|()| store.fetch_record(record_id))
            .and_then(|mut record| {
                process_downloaded(store, &mut record, options)?;
                write_record(writer.as_mut(), &record, options.pretty_print)
            });
        if let Err(e) = outcome {
            warn(&e);
        }
    }

    writer.flush().map_err(|e| Error::OperationFailed {
        operation: "flush_output".to_string(),
        cause: e.to_string(),
    })
}

/// Queries all records of a type and writes them like an export.
pub fn query_records(
    store: &dyn RecordStore,
    record_type: &str,
    options: &ExportOptions,
    warn: WarningSink<'_>,
) -> Result<()> {
    if record_type.contains('/') {
        return Err(Error::MalformedRecord(
            "record type cannot contain '/'".to_string(),
        ));
    }

    let results = store.query_records(record_type)?;
    let mut writer = output_writer(options)?;

    for item in results {
        let outcome = item.and_then(|mut record| {
            process_downloaded(store, &mut record, options)?;
            write_record(writer.as_mut(), &record, options.pretty_print)
        });
        if let Err(e) = outcome {
            warn(&e);
        }
    }

    writer.flush().map_err(|e| Error::OperationFailed {
        operation: "flush_output".to_string(),
        cause: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn auto_yes() -> impl FnMut(&str, &str, &'static str) -> Result<bool> {
        |_: &str, _: &str, _: &'static str| Ok(true)
    }

    #[test]
    fn test_convert_complex_values_forced() {
        let mut r = record(json!({
            "_id": "note/a",
            "loc": "@loc:3.14,2.17",
            "ref": "@ref:someref",
            "plain": "untouched",
            "n": 7,
        }));
        convert_complex_values(&mut r, true, &mut auto_yes()).unwrap();

        assert_eq!(
            r.get("loc"),
            json!({"$type": "geo", "$lat": 3.14, "$lng": 2.17})
        );
        assert_eq!(r.get("ref"), json!({"$type": "ref", "$id": "someref"}));
        assert_eq!(r.get("plain"), json!("untouched"));
        assert_eq!(r.get("n"), json!(7));
    }

    #[test]
    fn test_convert_complex_values_declined_leaves_marker() {
        let mut r = record(json!({"_id": "note/a", "str": "@str:keep"}));
        let mut decline = |_: &str, _: &str, _: &'static str| Ok(false);
        convert_complex_values(&mut r, false, &mut decline).unwrap();
        assert_eq!(r.get("str"), json!("@str:keep"));
    }

    #[test]
    fn test_convert_complex_values_prompt_sees_field() {
        let mut r = record(json!({"_id": "note/a", "str": "@str:x"}));
        let mut seen = Vec::new();
        let mut confirm = |key: &str, value: &str, kind: &'static str| {
            seen.push((key.to_string(), value.to_string(), kind));
            Ok(true)
        };
        convert_complex_values(&mut r, false, &mut confirm).unwrap();
        assert_eq!(seen, [("str".to_string(), "@str:x".to_string(), "string")]);
    }

    #[test]
    fn test_convert_skips_asset_markers() {
        let mut r = record(json!({
            "_id": "note/a",
            "up": "@file:photo.png",
            "down": "@asset:abc",
        }));
        convert_complex_values(&mut r, true, &mut auto_yes()).unwrap();
        assert_eq!(r.get("up"), json!("@file:photo.png"));
        assert_eq!(r.get("down"), json!("@asset:abc"));
    }

    #[test]
    fn test_convert_bad_location_aborts_record() {
        let mut r = record(json!({"_id": "note/a", "loc": "@loc:3,4,5"}));
        assert!(convert_complex_values(&mut r, true, &mut auto_yes()).is_err());
    }

    #[test]
    fn test_resolve_asset_path() {
        assert_eq!(
            resolve_asset_path("a.png", Some(Path::new("/base"))),
            PathBuf::from("/base/a.png")
        );
        assert_eq!(resolve_asset_path("a.png", None), PathBuf::from("a.png"));
        assert_eq!(
            resolve_asset_path("/abs/a.png", Some(Path::new("/base"))),
            PathBuf::from("/abs/a.png")
        );
    }

    #[test]
    fn test_marked_keys() {
        let r = record(json!({
            "_id": "note/a",
            "one": "@file:x",
            "two": "@file:y",
            "other": "@asset:z",
            "n": 1,
        }));
        let mut keys = marked_keys(&r, UPLOAD_ASSET_PREFIX);
        keys.sort();
        assert_eq!(keys, ["one", "two"]);
    }
}
