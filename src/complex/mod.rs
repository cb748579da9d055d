//! Complex-value codec.
//!
//! Record fields may carry string markers that stand in for richer structured
//! values, e.g. `"@loc:3.14,2.17"` for a geo point. Before a record is saved,
//! each marker is expanded into the structured JSON payload the server
//! understands. Every variant implements [`ComplexValueType`]; the import
//! pipeline iterates [`complex_value_types`] per field, so adding a variant
//! does not touch the pipeline.
//!
//! The `@file:` (upload) and `@asset:` (download) markers are not part of this
//! codec: they trigger asset transfer side effects and are handled by the
//! pipeline directly.
//!
//! Conversion output is always a structured [`Value`] stored directly in the
//! record data; serializing it is the wire boundary's job.

use crate::{Error, Result};
use serde_json::{Value, json};

/// Marker prefix for local files to be uploaded as assets.
pub const UPLOAD_ASSET_PREFIX: &str = "@file:";

/// Marker prefix for remote assets to be downloaded on export.
pub const DOWNLOAD_ASSET_PREFIX: &str = "@asset:";

/// A recognizable complex-value variant.
///
/// `validate` is a pure prefix test and never fails. `convert` expects a
/// candidate for which `validate` returned `true`; implementations still
/// re-check the prefix and return an error instead of panicking.
pub trait ComplexValueType: Send + Sync {
    /// Short variant name used in error messages and prompts.
    fn name(&self) -> &'static str;

    /// Returns whether the candidate string carries this variant's marker.
    fn validate(&self, candidate: &str) -> bool;

    /// Converts a marker string into its structured JSON payload.
    fn convert(&self, candidate: &str) -> Result<Value>;
}

/// `@loc:<lat>,<lng>`: a geographic point.
pub struct LocationType;

impl ComplexValueType for LocationType {
    fn name(&self) -> &'static str {
        "location"
    }

    fn validate(&self, candidate: &str) -> bool {
        candidate.starts_with("@loc:")
    }

    fn convert(&self, candidate: &str) -> Result<Value> {
        let payload = candidate
            .strip_prefix("@loc:")
            .ok_or_else(|| Error::ComplexValue {
                kind: "location",
                cause: format!("'{candidate}' does not carry the @loc: marker"),
            })?;

        let tokens: Vec<&str> = payload.split(',').collect();
        if tokens.len() != 2 {
            return Err(Error::ComplexValue {
                kind: "location",
                cause: format!("expected <lat>,<lng>, got {} tokens", tokens.len()),
            });
        }

        let mut coords = [0f64; 2];
        for (slot, token) in coords.iter_mut().zip(&tokens) {
            *slot = token.parse().map_err(|_| Error::ComplexValue {
                kind: "location",
                cause: format!("'{token}' is not a number"),
            })?;
        }

        Ok(json!({"$type": "geo", "$lat": coords[0], "$lng": coords[1]}))
    }
}

/// `@ref:<id>`: a reference to another record.
pub struct ReferenceType;

impl ComplexValueType for ReferenceType {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn validate(&self, candidate: &str) -> bool {
        candidate.starts_with("@ref:")
    }

    fn convert(&self, candidate: &str) -> Result<Value> {
        let id = candidate
            .strip_prefix("@ref:")
            .ok_or_else(|| Error::ComplexValue {
                kind: "reference",
                cause: format!("'{candidate}' does not carry the @ref: marker"),
            })?;

        Ok(json!({"$type": "ref", "$id": id}))
    }
}

/// `@str:<text>`: a literal string that would otherwise read as a marker.
pub struct StringType;

impl ComplexValueType for StringType {
    fn name(&self) -> &'static str {
        "string"
    }

    fn validate(&self, candidate: &str) -> bool {
        candidate.starts_with("@str:")
    }

    fn convert(&self, candidate: &str) -> Result<Value> {
        let text = candidate
            .strip_prefix("@str:")
            .ok_or_else(|| Error::ComplexValue {
                kind: "string",
                cause: format!("'{candidate}' does not carry the @str: marker"),
            })?;

        Ok(json!({"$type": "str", "$str": text}))
    }
}

static COMPLEX_VALUE_TYPES: &[&dyn ComplexValueType] = &[&LocationType, &ReferenceType, &StringType];

/// Returns the registered complex-value variants, in match order.
#[must_use]
pub fn complex_value_types() -> &'static [&'static dyn ComplexValueType] {
    COMPLEX_VALUE_TYPES
}
