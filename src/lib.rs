//! # strandcli
//!
//! Command line client for the Strand backend-as-a-service platform.
//!
//! Strand stores schemaless records, record-type schemas, and binary assets
//! behind an HTTP/JSON action protocol. This crate provides the typed client
//! pieces the `strandcli` binary is built from:
//!
//! - [`record`]: the in-memory record entity and its wire-format rules
//! - [`complex`]: the `@loc:`/`@ref:`/`@str:` complex-value codec
//! - [`container`]: the transport client and the database facade
//! - [`pipeline`]: streaming record import/export with asset side effects
//! - [`config`]: config file loading and flag/env merging
//!
//! ## Example
//!
//! ```rust,ignore
//! use strandcli::container::{Container, Database, RecordStore};
//!
//! let container = Container::new("https://api.example.com/".into())
//!     .with_api_key("my-api-key");
//! let db = Database::public(container);
//! let record = db.fetch_record("note/first")?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::path::PathBuf;
use thiserror::Error as ThisError;

pub mod cli;
pub mod complex;
pub mod config;
pub mod container;
pub mod pipeline;
pub mod record;

pub use complex::{ComplexValueType, complex_value_types};
pub use config::CliConfig;
pub use container::{Container, Database, RecordStore};
pub use record::Record;

/// Message used when a server error response carries no `message` field.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown Error";

/// Error type for strandcli operations.
///
/// Local validation errors ([`Error::InvalidRecordId`], [`Error::ReservedKey`],
/// [`Error::MalformedRecord`], [`Error::ComplexValue`]) are always surfaced and
/// never silently repaired. Remote errors unpacked from the action envelope
/// become [`Error::Server`] or, with record context, [`Error::ServerRecord`].
#[derive(Debug, ThisError)]
pub enum Error {
    /// A record ID did not match the `<type>/<key>` format.
    #[error("record ID '{0}' is not in the expected <type>/<key> format")]
    InvalidRecordId(String),

    /// An attempt to write a `_`-prefixed field, which the server owns.
    #[error("cannot set data with reserved key: {0}")]
    ReservedKey(String),

    /// Record data could not be decoded into a record.
    #[error("record data is not in the expected format: {0}")]
    MalformedRecord(String),

    /// A complex-value marker carried an unparseable payload.
    #[error("wrong format of complex value ({kind}): {cause}")]
    ComplexValue {
        /// Which complex-value variant rejected the payload.
        kind: &'static str,
        /// What was wrong with it.
        cause: String,
    },

    /// A filesystem operation failed on the given path.
    #[error("{}: {source}", path.display())]
    Io {
        /// The offending path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An HTTP request could not be completed.
    #[error("request '{action}' failed: {cause}")]
    Transport {
        /// The remote action (or asset operation) being performed.
        action: String,
        /// The underlying cause.
        cause: String,
    },

    /// The server answered an action with an error envelope.
    #[error("{0}")]
    Server(String),

    /// A per-record server error with the record ID attached.
    #[error("record {id}: {message}")]
    ServerRecord {
        /// ID of the record the error applies to.
        id: String,
        /// Server-provided message.
        message: String,
    },

    /// The response was well-formed JSON but missing an expected field.
    #[error("unexpected server data: {0}")]
    UnexpectedServerData(String),

    /// The configuration file could not be read or parsed.
    #[error("unable to read config file: {0}")]
    Config(String),

    /// A local operation outside the other categories failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for strandcli operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidRecordId("onlytype".to_string());
        assert_eq!(
            err.to_string(),
            "record ID 'onlytype' is not in the expected <type>/<key> format"
        );

        let err = Error::ReservedKey("_access".to_string());
        assert_eq!(err.to_string(), "cannot set data with reserved key: _access");

        let err = Error::ServerRecord {
            id: "note/a".to_string(),
            message: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "record note/a: not found");

        let err = Error::UnexpectedServerData("'result' is not an array".to_string());
        assert_eq!(
            err.to_string(),
            "unexpected server data: 'result' is not an array"
        );
    }
}
