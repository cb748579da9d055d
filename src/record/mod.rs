//! The record entity.
//!
//! A record is a single addressable unit of remote data, identified by
//! `<type>/<key>`. On the wire a record is a flat JSON object whose `_id`
//! field carries the identifier; in memory the identifier lives outside the
//! data map and is immutable. `_`-prefixed field names are reserved for the
//! server and are rejected on the way up, stripped on the way down.

use crate::{Error, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Checks that a record ID conforms to the `<type>/<key>` format.
///
/// Both segments must be non-empty; the key may itself contain `/`.
pub fn check_record_id(record_id: &str) -> Result<()> {
    let mut parts = record_id.splitn(2, '/');
    let record_type = parts.next().unwrap_or_default();
    let key = parts.next().unwrap_or_default();
    if record_type.is_empty() || key.is_empty() {
        return Err(Error::InvalidRecordId(record_id.to_string()));
    }
    Ok(())
}

/// In-memory representation of a Strand record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: String,
    /// Field data. Never contains the `_id` key; that lives in the ID.
    pub data: Map<String, Value>,
}

impl Record {
    /// Creates a record with empty data from a caller-supplied ID.
    pub fn empty(record_id: &str) -> Result<Self> {
        check_record_id(record_id)?;
        Ok(Self {
            id: record_id.to_string(),
            data: Map::new(),
        })
    }

    /// Constructs a record from a decoded JSON object.
    ///
    /// The object must carry a string `_id` field; it is extracted out of the
    /// data map into the record ID.
    pub fn from_map(mut map: Map<String, Value>) -> Result<Self> {
        let id = match map.remove("_id") {
            Some(Value::String(id)) => id,
            Some(_) => {
                return Err(Error::MalformedRecord("'_id' is not a string".to_string()));
            }
            None => return Err(Error::MalformedRecord("'_id' is missing".to_string())),
        };

        Ok(Self { id, data: map })
    }

    /// Constructs a record from an arbitrary JSON value, which must be an
    /// object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(Error::MalformedRecord(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    /// The record identifier, `<type>/<key>`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the value stored under `key`, or an empty string if absent.
    ///
    /// A missing key is not an error; the empty-string sentinel matches what
    /// the record would print for an unset field.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        self.data
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()))
    }

    /// Unconditionally sets `key` to `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Sets a field from a `key=value` expression.
    ///
    /// Splits on the first `=`; both sides must be non-empty, and the key may
    /// not start with the reserved `_` prefix.
    pub fn assign(&mut self, expr: &str) -> Result<()> {
        let Some((key, value)) = expr.split_once('=') else {
            return Err(Error::MalformedRecord(format!(
                "assignment '{expr}' is not in the key=value format"
            )));
        };
        if key.is_empty() || value.is_empty() {
            return Err(Error::MalformedRecord(format!(
                "assignment '{expr}' is not in the key=value format"
            )));
        }
        if key.starts_with('_') {
            return Err(Error::ReservedKey(key.to_string()));
        }

        self.set(key, value);
        Ok(())
    }

    /// Validates the record before it is sent to the server.
    ///
    /// Re-checks the ID format and rejects any reserved field key that got
    /// into the data map after construction.
    pub fn pre_upload_validate(&self) -> Result<()> {
        check_record_id(&self.id)?;

        for key in self.data.keys() {
            if key.starts_with('_') {
                return Err(Error::ReservedKey(key.clone()));
            }
        }
        Ok(())
    }

    /// Cleans up a record fetched from the server.
    ///
    /// The server may attach `_`-prefixed bookkeeping fields; they must not
    /// be echoed back on a later save, so they are dropped here.
    pub fn post_download_handle(&mut self) -> Result<()> {
        check_record_id(&self.id)?;
        self.data.retain(|key, _| !key.starts_with('_'));
        Ok(())
    }

    /// The record in its wire-format JSON shape, `_id` included.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.data.len() + 1);
        map.insert("_id".to_string(), Value::String(self.id.clone()));
        for (key, value) in &self.data {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// Renders the record as indented JSON.
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::OperationFailed {
            operation: "serialize_record".to_string(),
            cause: e.to_string(),
        })
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.data.len() + 1))?;
        map.serialize_entry("_id", &self.id)?;
        for (key, value) in &self.data {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = Map::deserialize(deserializer)?;
        Self::from_map(map).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn record_from(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test_case("note/first" => true; "two segments")]
    #[test_case("note/has/slash" => true; "key may contain slash")]
    #[test_case("" => false; "empty")]
    #[test_case("onlytype" => false; "missing key")]
    #[test_case("/onlykey" => false; "missing type")]
    #[test_case("type/" => false; "empty key")]
    fn test_check_record_id(record_id: &str) -> bool {
        check_record_id(record_id).is_ok()
    }

    #[test]
    fn test_from_map_extracts_id() {
        let record = record_from(json!({"_id": "type/key", "a": 1}));
        assert_eq!(record.id(), "type/key");
        assert_eq!(record.data, json!({"a": 1}).as_object().unwrap().clone());
        assert!(!record.data.contains_key("_id"));
    }

    #[test]
    fn test_from_map_requires_string_id() {
        assert!(Record::from_value(json!({"a": 1})).is_err());
        assert!(Record::from_value(json!({"_id": 42, "a": 1})).is_err());
        assert!(Record::from_value(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_get_missing_key_is_empty_string() {
        let record = Record::empty("note/first").unwrap();
        assert_eq!(record.get("absent"), Value::String(String::new()));
    }

    #[test]
    fn test_assign() {
        let mut record = Record::empty("note/first").unwrap();
        record.assign("title=hello world").unwrap();
        assert_eq!(record.get("title"), json!("hello world"));

        // value keeps everything after the first '='
        record.assign("eq=a=b").unwrap();
        assert_eq!(record.get("eq"), json!("a=b"));

        assert!(record.assign("no-equals-sign").is_err());
        assert!(record.assign("=value").is_err());
        assert!(record.assign("key=").is_err());
        assert!(matches!(
            record.assign("_reserved=x"),
            Err(Error::ReservedKey(_))
        ));
    }

    #[test]
    fn test_pre_upload_validate_rejects_injected_reserved_key() {
        let mut record = Record::empty("note/first").unwrap();
        record.set("fine", "v");
        assert!(record.pre_upload_validate().is_ok());

        record.data.insert("_sneaky".to_string(), json!(1));
        assert!(matches!(
            record.pre_upload_validate(),
            Err(Error::ReservedKey(_))
        ));
    }

    #[test]
    fn test_post_download_strips_server_fields() {
        let mut record = record_from(json!({
            "_id": "note/first",
            "_access": ["r"],
            "_created_at": "2015-01-01",
            "title": "kept",
        }));
        record.post_download_handle().unwrap();
        assert_eq!(record.data.len(), 1);
        assert_eq!(record.get("title"), json!("kept"));
    }

    #[test]
    fn test_wire_round_trip() {
        let record = record_from(json!({"_id": "note/first", "n": 2, "flag": true}));
        let encoded = serde_json::to_value(&record).unwrap();
        assert_eq!(encoded["_id"], json!("note/first"));
        assert_eq!(encoded["n"], json!(2));

        let decoded: Record = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, record);
    }
}
