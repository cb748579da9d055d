//! Typed database operations over the generic action protocol.

use super::{ActionResponse, Container, is_error_value};
use crate::record::Record;
use crate::{Error, Result};
use serde_json::{Map, Value, json};
use std::path::Path;

/// The operations a record store exposes.
///
/// [`Database`] is the remote implementation; tests substitute a local fake.
/// Batch operations surface per-item failures as values rather than aborting,
/// so callers can keep going and report them as warnings.
pub trait RecordStore {
    /// Fetches a single record by ID.
    fn fetch_record(&self, record_id: &str) -> Result<Record>;

    /// Queries all records of a type. Per-record failures are returned in
    /// place so the rest of the result set is still usable.
    fn query_records(&self, record_type: &str) -> Result<Vec<Result<Record>>>;

    /// Saves one record. The record is validated before transmission.
    fn save_record(&self, record: &Record) -> Result<()>;

    /// Deletes records by ID, returning per-record errors as warnings.
    fn delete_records(&self, record_ids: &[String]) -> Result<Vec<Error>>;

    /// Downloads the bytes of an asset by its ID.
    fn fetch_asset(&self, asset_id: &str) -> Result<Vec<u8>>;

    /// Uploads a local file as an asset, returning the new asset ID.
    fn save_asset(&self, path: &Path) -> Result<String>;

    /// Adds a column to a record type's schema.
    fn create_column(&self, record_type: &str, column_name: &str, column_def: &str) -> Result<()>;

    /// Renames a schema column.
    fn rename_column(&self, record_type: &str, old_name: &str, new_name: &str) -> Result<()>;

    /// Removes a schema column.
    fn delete_column(&self, record_type: &str, column_name: &str) -> Result<()>;

    /// Fetches the record-type schema map.
    fn fetch_schema(&self) -> Result<Map<String, Value>>;
}

/// A remote database reached through a [`Container`].
pub struct Database {
    /// The transport client.
    pub container: Container,
    /// `_public`, `_private`, or an explicit database ID.
    pub database_id: String,
}

impl Database {
    /// Creates a facade over an explicit database ID.
    #[must_use]
    pub fn new(container: Container, database_id: impl Into<String>) -> Self {
        Self {
            container,
            database_id: database_id.into(),
        }
    }

    /// Facade over the public database.
    #[must_use]
    pub fn public(container: Container) -> Self {
        let database_id = container.public_database_id().to_string();
        Self {
            container,
            database_id,
        }
    }

    /// Facade over the current user's private database.
    #[must_use]
    pub fn private(container: Container) -> Self {
        let database_id = container.private_database_id().to_string();
        Self {
            container,
            database_id,
        }
    }

    /// Posts an action and rejects whole-request error envelopes.
    fn request(&self, action: &str, payload: Map<String, Value>) -> Result<ActionResponse> {
        let response = self.container.make_request(action, payload)?;
        if response.is_error() {
            return Err(response.to_error());
        }
        Ok(response)
    }

    /// Unpacks `result` as the array every record action answers with.
    fn result_array(response: &ActionResponse) -> Result<&Vec<Value>> {
        response
            .result()
            .and_then(Value::as_array)
            .ok_or_else(|| Error::UnexpectedServerData("'result' is not an array".to_string()))
    }

    /// Unpacks one result item, which is either a record object or a
    /// per-record error object.
    fn result_record(item: &Value) -> Result<Record> {
        let data = item
            .as_object()
            .ok_or_else(|| Error::UnexpectedServerData("result item is not an object".to_string()))?;

        if is_error_value(data) {
            return Err(super::ServerError::from_map(data).into_error());
        }

        Record::from_map(data.clone())
    }

    fn payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert(
            "database_id".to_string(),
            Value::String(self.database_id.clone()),
        );
        payload
    }
}

impl RecordStore for Database {
    fn fetch_record(&self, record_id: &str) -> Result<Record> {
        let mut payload = self.payload();
        payload.insert("ids".to_string(), json!([record_id]));

        let response = self.request("record:fetch", payload)?;
        let result = Self::result_array(&response)?;
        let first = result.first().ok_or_else(|| {
            Error::UnexpectedServerData("'result' array is empty".to_string())
        })?;
        Self::result_record(first)
    }

    fn query_records(&self, record_type: &str) -> Result<Vec<Result<Record>>> {
        let mut payload = self.payload();
        payload.insert(
            "record_type".to_string(),
            Value::String(record_type.to_string()),
        );

        let response = self.request("record:query", payload)?;
        let result = Self::result_array(&response)?;
        Ok(result.iter().map(Self::result_record).collect())
    }

    fn save_record(&self, record: &Record) -> Result<()> {
        record.pre_upload_validate()?;

        let mut payload = self.payload();
        payload.insert("records".to_string(), json!([record.to_value()]));

        let response = self.request("record:save", payload)?;
        let result = Self::result_array(&response)?;
        let first = result.first().ok_or_else(|| {
            Error::UnexpectedServerData("'result' array is empty".to_string())
        })?;
        Self::result_record(first).map(|_| ())
    }

    fn delete_records(&self, record_ids: &[String]) -> Result<Vec<Error>> {
        let mut payload = self.payload();
        payload.insert("ids".to_string(), json!(record_ids));

        let response = self.request("record:delete", payload)?;
        let result = Self::result_array(&response)?;

        let mut warnings = Vec::new();
        for item in result {
            match item.as_object() {
                Some(data) if is_error_value(data) => {
                    warnings.push(super::ServerError::from_map(data).into_error());
                }
                Some(_) => {}
                None => warnings.push(Error::UnexpectedServerData(
                    "result item is not an object".to_string(),
                )),
            }
        }
        Ok(warnings)
    }

    fn fetch_asset(&self, asset_id: &str) -> Result<Vec<u8>> {
        let url = self.container.asset_download_url(asset_id);
        self.container.get_asset(&url)
    }

    fn save_asset(&self, path: &Path) -> Result<String> {
        let body = std::fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "path has no usable file name",
                ),
            })?;

        let response = self
            .container
            .put_asset(filename, content_type_for(path), body)?;
        if response.is_error() {
            return Err(response.to_error());
        }

        response
            .result()
            .and_then(|r| r.get("$name"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| {
                Error::UnexpectedServerData("asset result has no '$name' field".to_string())
            })
    }

    fn create_column(&self, record_type: &str, column_name: &str, column_def: &str) -> Result<()> {
        let mut payload = self.payload();
        payload.insert(
            "record_types".to_string(),
            json!({
                record_type: {
                    "fields": [{"name": column_name, "type": column_def}],
                }
            }),
        );

        self.request("schema:create", payload).map(|_| ())
    }

    fn rename_column(&self, record_type: &str, old_name: &str, new_name: &str) -> Result<()> {
        let mut payload = self.payload();
        payload.insert(
            "record_type".to_string(),
            Value::String(record_type.to_string()),
        );
        payload.insert("item_type".to_string(), Value::String("field".to_string()));
        payload.insert("item_name".to_string(), Value::String(old_name.to_string()));
        payload.insert("new_name".to_string(), Value::String(new_name.to_string()));

        self.request("schema:rename", payload).map(|_| ())
    }

    fn delete_column(&self, record_type: &str, column_name: &str) -> Result<()> {
        let mut payload = self.payload();
        payload.insert(
            "record_type".to_string(),
            Value::String(record_type.to_string()),
        );
        payload.insert("item_type".to_string(), Value::String("field".to_string()));
        payload.insert(
            "item_name".to_string(),
            Value::String(column_name.to_string()),
        );

        self.request("schema:delete", payload).map(|_| ())
    }

    fn fetch_schema(&self) -> Result<Map<String, Value>> {
        let response = self.request("schema:fetch", self.payload())?;

        response
            .result()
            .and_then(|r| r.get("record_types"))
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| {
                Error::UnexpectedServerData("'result.record_types' is not an object".to_string())
            })
    }
}

/// Guesses a content type from the file extension.
///
/// The server only uses this as a hint; unknown extensions fall back to an
/// opaque byte stream.
fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}
