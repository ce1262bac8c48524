//! SQL text for every statement the loader issues.
//!
//! Identifiers never reach a statement without passing through
//! [`quote_identifier`]. Values are always bound as parameters.

use itertools::Itertools;

use crate::{
    error::{ImportError, ImportResult},
    infer::ColumnDef,
};

pub const MAX_IDENTIFIER_CHARS: usize = 64;

/// Bind parameters MySQL accepts in one prepared statement.
pub const MAX_PLACEHOLDERS: usize = 65_535;

pub const TABLE_EXISTS_SQL: &str = "SELECT COUNT(*) FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

/// Wraps `name` in backticks, doubling embedded backticks. Rejects names
/// MySQL would refuse anyway.
pub fn quote_identifier(name: &str) -> ImportResult<String> {
    let reject = |reason| ImportError::InvalidIdentifier {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(reject("identifier is empty"));
    }
    if name.chars().count() > MAX_IDENTIFIER_CHARS {
        return Err(reject("identifier is longer than 64 characters"));
    }
    if name.contains('\0') {
        return Err(reject("identifier contains a NUL character"));
    }
    if name.ends_with(' ') {
        return Err(reject("identifier ends with a space"));
    }
    Ok(format!("`{}`", name.replace('`', "``")))
}

pub fn drop_table_sql(table: &str) -> ImportResult<String> {
    Ok(format!("DROP TABLE IF EXISTS {}", quote_identifier(table)?))
}

pub fn create_table_sql(table: &str, columns: &[ColumnDef]) -> ImportResult<String> {
    if columns.is_empty() {
        return Err(ImportError::InvalidSpec(format!(
            "table '{table}' needs at least one column"
        )));
    }
    let definitions = columns
        .iter()
        .map(|column| {
            quote_identifier(&column.name)
                .map(|quoted| format!("{quoted} {} NULL", column.storage.mysql_type()))
        })
        .process_results(|mut definitions| definitions.join(", "))?;
    Ok(format!(
        "CREATE TABLE {} ({definitions}) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        quote_identifier(table)?
    ))
}

/// `INSERT INTO t (a, b) ` with a trailing space, ready for a `VALUES`
/// list of row tuples.
pub fn insert_prefix<S: AsRef<str>>(table: &str, columns: &[S]) -> ImportResult<String> {
    let names = columns
        .iter()
        .map(|column| quote_identifier(column.as_ref()))
        .process_results(|mut names| names.join(", "))?;
    Ok(format!("INSERT INTO {} ({names}) ", quote_identifier(table)?))
}

/// Most rows of `width` columns one multi-row insert can carry.
pub fn rows_per_statement(width: usize) -> usize {
    (MAX_PLACEHOLDERS / width.max(1)).max(1)
}
