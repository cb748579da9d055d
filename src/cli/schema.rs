//! Schema command group.

use crate::container::RecordStore;
use crate::{Error, Result};

/// `schema add <record_type> <column_name> <column_def>`
pub fn add_column(
    store: &dyn RecordStore,
    record_type: &str,
    column_name: &str,
    column_def: &str,
) -> Result<()> {
    store.create_column(record_type, column_name, column_def)
}

/// `schema move <record_type> <column_name> <new_column_name>`
pub fn move_column(
    store: &dyn RecordStore,
    record_type: &str,
    column_name: &str,
    new_column_name: &str,
) -> Result<()> {
    store.rename_column(record_type, column_name, new_column_name)
}

/// `schema remove <record_type> <column_name>`
pub fn remove_column(store: &dyn RecordStore, record_type: &str, column_name: &str) -> Result<()> {
    store.delete_column(record_type, column_name)
}

/// `schema fetch`
pub fn fetch_schema(store: &dyn RecordStore) -> Result<()> {
    let record_types = store.fetch_schema()?;
    let rendered =
        serde_json::to_string_pretty(&record_types).map_err(|e| Error::OperationFailed {
            operation: "serialize_schema".to_string(),
            cause: e.to_string(),
        })?;
    println!("{rendered}");
    Ok(())
}
