//! CLI command implementations.
//!
//! Each submodule implements one command group of the `strandcli` binary:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `record import` | Stream JSON records into the database |
//! | `record export` | Export records by ID, materializing assets |
//! | `record query` | Query all records of a type |
//! | `record delete` | Delete records by ID |
//! | `record set` | Set attributes with `key=value` expressions |
//! | `record get` | Print one attribute of a record |
//! | `record edit` | Round-trip a record through `$EDITOR` |
//! | `schema add/move/remove/fetch` | Manage record-type schemas |
//!
//! Batch commands report per-item failures through [`warn`] and keep going;
//! single-target commands return the error, and `main` exits non-zero.

// command output goes to the terminal
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

mod record;
mod schema;

pub use record::{
    delete_records, edit_record, export_records, get_attribute, import_records, query_records,
    set_attributes,
};
pub use schema::{add_column, fetch_schema, move_column, remove_column};

use crate::Error;

/// Prints a per-item warning without aborting the batch.
pub fn warn(err: &Error) {
    tracing::warn!(error = %err, "continuing after per-item failure");
    eprintln!("Warning: {err}");
}
