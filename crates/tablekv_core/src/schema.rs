//! Column and index reconciliation for relational tables.
//!
//! A [`TableManager`] brings one SQL table to a wanted shape with idempotent
//! statements: it creates the table if missing, adds columns that are not
//! there yet and creates indexes that don't exist. Statements go through a
//! caller-supplied [`SqlExecutor`], so this module carries no database
//! client of its own.

use crate::error::{CoreError, CoreResult};
use serde_json::{Map, Value};
use std::fmt;

/// Runs SQL text against a relational engine.
pub trait SqlExecutor {
    /// Executes a statement that returns no rows.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Sql`] if the engine rejects the statement.
    fn execute(&self, sql: &str) -> CoreResult<()>;

    /// Executes a query and returns its rows as column-name maps.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Sql`] if the engine rejects the query.
    fn query(&self, sql: &str) -> CoreResult<Vec<Map<String, Value>>>;
}

/// SQL flavor of the engine behind an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// SQLite 3.
    Sqlite,
    /// MySQL / MariaDB.
    MySql,
}

impl Dialect {
    fn create_table(self, table: &str) -> String {
        match self {
            Self::Sqlite => format!(
                "CREATE TABLE IF NOT EXISTS `{table}` (id integer primary key autoincrement);"
            ),
            Self::MySql => format!(
                "CREATE TABLE IF NOT EXISTS `{table}` (id bigint unsigned primary key auto_increment) CHARACTER SET utf8mb4;"
            ),
        }
    }

    fn describe(self, table: &str) -> String {
        match self {
            Self::Sqlite => format!("pragma table_info('{table}')"),
            Self::MySql => format!("DESC `{table}`"),
        }
    }

    /// Column holding the name and the type in describe rows.
    const fn describe_fields(self) -> (&'static str, &'static str) {
        match self {
            Self::Sqlite => ("name", "type"),
            Self::MySql => ("Field", "Type"),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
        })
    }
}

/// A column reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Declared type, as the engine reports it.
    pub column_type: String,
}

fn validate_identifier(kind: &str, name: &str) -> CoreResult<()> {
    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        Ok(())
    } else {
        Err(CoreError::validation(format!("invalid {kind} name '{name}'")))
    }
}

fn validate_column_type(column_type: &str) -> CoreResult<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '(' | ')' | ',' | ' ');
    if !column_type.trim().is_empty() && column_type.chars().all(allowed) {
        Ok(())
    } else {
        Err(CoreError::validation(format!("invalid column type '{column_type}'")))
    }
}

/// Renders a default value as an SQL literal.
fn sql_literal(value: &Value) -> CoreResult<String> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        other => Err(CoreError::validation(format!(
            "unsupported default value {other}"
        ))),
    }
}

/// Keeps one SQL table in shape.
#[derive(Debug)]
pub struct TableManager<E> {
    executor: E,
    dialect: Dialect,
    table: String,
}

impl<E: SqlExecutor> TableManager<E> {
    /// Creates the table if needed and returns its manager.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid table name, or the
    /// executor's error if the table cannot be created.
    pub fn new(executor: E, dialect: Dialect, table: &str) -> CoreResult<Self> {
        validate_identifier("table", table)?;
        executor.execute(&dialect.create_table(table))?;
        Ok(Self {
            executor,
            dialect,
            table: table.to_string(),
        })
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns the executor.
    #[must_use]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Lists the table's columns.
    ///
    /// # Errors
    ///
    /// Returns the executor's error.
    pub fn desc_columns(&self) -> CoreResult<Vec<ColumnInfo>> {
        let (name_field, type_field) = self.dialect.describe_fields();
        let rows = self.executor.query(&self.dialect.describe(&self.table))?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let name = row.get(name_field)?.as_str()?;
                let column_type = row.get(type_field).and_then(Value::as_str).unwrap_or_default();
                Some(ColumnInfo {
                    name: name.to_string(),
                    column_type: column_type.to_string(),
                })
            })
            .collect())
    }

    /// Returns true if the table has `column`.
    ///
    /// # Errors
    ///
    /// Returns the executor's error.
    pub fn has_column(&self, column: &str) -> CoreResult<bool> {
        Ok(self.desc_columns()?.iter().any(|c| c.name == column))
    }

    /// Adds `column` unless it exists. Returns true if it was added.
    ///
    /// String defaults are quoted with `'` doubled; booleans become `1`/`0`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad name, type or default, or the
    /// executor's error.
    pub fn add_column(
        &self,
        column: &str,
        column_type: &str,
        default: Option<&Value>,
        not_null: bool,
    ) -> CoreResult<bool> {
        validate_identifier("column", column)?;
        validate_column_type(column_type)?;
        if self.has_column(column)? {
            return Ok(false);
        }

        let mut sql = format!(
            "ALTER TABLE `{}` ADD COLUMN `{column}` {column_type}",
            self.table
        );
        if let Some(default) = default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&sql_literal(default)?);
        }
        if not_null {
            sql.push_str(" NOT NULL");
        }
        self.executor.execute(&sql)?;
        tracing::info!(table = %self.table, column, "column added");
        Ok(true)
    }

    /// Returns the index name for `columns`, `idx_<table>_<col>_<col>`.
    #[must_use]
    pub fn index_name(&self, columns: &[&str]) -> String {
        format!("idx_{}_{}", self.table, columns.join("_"))
    }

    /// Creates an index over `columns` if missing.
    ///
    /// Engine failures are logged and reported as `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or invalid column list.
    pub fn add_index(&self, columns: &[&str], unique: bool) -> CoreResult<bool> {
        self.validate_columns(columns)?;
        let name = self.index_name(columns);
        let unique = if unique { "UNIQUE " } else { "" };
        let if_not_exists = match self.dialect {
            Dialect::Sqlite => "IF NOT EXISTS ",
            Dialect::MySql => "",
        };
        let sql = format!(
            "CREATE {unique}INDEX {if_not_exists}{name} ON `{}` ({})",
            self.table,
            columns.join(",")
        );
        Ok(self.execute_logged(&sql, "create index"))
    }

    /// Drops the index over `columns`.
    ///
    /// Engine failures are logged and reported as `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or invalid column list.
    pub fn drop_index(&self, columns: &[&str]) -> CoreResult<bool> {
        self.validate_columns(columns)?;
        let name = self.index_name(columns);
        let sql = match self.dialect {
            Dialect::Sqlite => format!("DROP INDEX {name}"),
            Dialect::MySql => format!("DROP INDEX {name} ON `{}`", self.table),
        };
        Ok(self.execute_logged(&sql, "drop index"))
    }

    /// Drops `column` if it exists. Returns true if it was dropped.
    ///
    /// SQLite is left untouched: the call logs a warning and returns false.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad name, or the executor's error.
    pub fn drop_column(&self, column: &str) -> CoreResult<bool> {
        validate_identifier("column", column)?;
        match self.dialect {
            Dialect::Sqlite => {
                tracing::warn!(table = %self.table, column, "drop column is not supported on sqlite");
                Ok(false)
            }
            Dialect::MySql => {
                if !self.has_column(column)? {
                    return Ok(false);
                }
                self.executor
                    .execute(&format!("ALTER TABLE `{}` DROP COLUMN `{column}`", self.table))?;
                tracing::info!(table = %self.table, column, "column dropped");
                Ok(true)
            }
        }
    }

    fn validate_columns(&self, columns: &[&str]) -> CoreResult<()> {
        if columns.is_empty() {
            return Err(CoreError::validation("index needs at least one column"));
        }
        columns
            .iter()
            .try_for_each(|column| validate_identifier("column", column))
    }

    fn execute_logged(&self, sql: &str, action: &str) -> bool {
        match self.executor.execute(sql) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(table = %self.table, action, error = %e, "schema statement failed");
                false
            }
        }
    }
}
