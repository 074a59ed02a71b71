//! Table registry.
//!
//! Every key written through a [`crate::Store`] must start with the name of
//! a registered table followed by `:`. Names may not contain `:`, so no
//! table's key range can contain another's.

use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Separator between key segments.
pub const KEY_SEPARATOR: char = ':';

/// Category given to tables registered without one.
pub const DEFAULT_CATEGORY: &str = "default";

/// Descriptor of a registered table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    /// Table name, the first key segment.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Grouping label.
    pub category: String,
}

/// Returns the table segment of `key`, if the key has one.
///
/// ```
/// use tablekv_core::table_of;
///
/// assert_eq!(table_of("note:alice:1"), Some("note"));
/// assert_eq!(table_of("note"), None);
/// ```
#[must_use]
pub fn table_of(key: &str) -> Option<&str> {
    key.split_once(KEY_SEPARATOR).map(|(table, _)| table)
}

/// Checks that `name` can be used as a table name.
///
/// # Errors
///
/// Returns a validation error for empty names and names containing `:`.
pub fn validate_table_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::validation("table name can not be empty"));
    }
    if name.contains(KEY_SEPARATOR) {
        return Err(CoreError::validation(format!(
            "table name '{name}' can not contain '{KEY_SEPARATOR}'"
        )));
    }
    Ok(())
}

/// In-memory set of table descriptors.
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: RwLock<BTreeMap<String, TableInfo>>,
}

impl TableRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table in the default category.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is invalid.
    pub fn register(&self, name: &str, description: &str) -> CoreResult<()> {
        self.register_in(name, description, DEFAULT_CATEGORY)
    }

    /// Registers a table, replacing any previous descriptor of that name.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is invalid.
    pub fn register_in(&self, name: &str, description: &str, category: &str) -> CoreResult<()> {
        validate_table_name(name)?;
        let info = TableInfo {
            name: name.to_string(),
            description: description.to_string(),
            category: category.to_string(),
        };
        self.tables.write().insert(info.name.clone(), info);
        Ok(())
    }

    /// Fails unless `name` is registered.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown tables.
    pub fn check(&self, name: &str) -> CoreResult<()> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(CoreError::validation(format!("table '{name}' not registered")))
        }
    }

    /// Validates a key for writing and returns its table name.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the key has no table segment, no
    /// record part, or names an unregistered table.
    pub fn check_key<'k>(&self, key: &'k str) -> CoreResult<&'k str> {
        let Some((table, rest)) = key.split_once(KEY_SEPARATOR) else {
            return Err(CoreError::validation(format!(
                "key '{key}' has no table prefix"
            )));
        };
        if rest.is_empty() {
            return Err(CoreError::validation(format!("key '{key}' has no record id")));
        }
        self.check(table)?;
        Ok(table)
    }

    /// Returns the descriptor of a table.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<TableInfo> {
        self.tables.read().get(name).cloned()
    }

    /// Returns true if the table is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    /// Returns a copy of every descriptor, sorted by name.
    #[must_use]
    pub fn tables(&self) -> Vec<TableInfo> {
        self.tables.read().values().cloned().collect()
    }

    /// Returns the number of registered tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}
