//! Table naming and statement construction
//!
//! Every collection lives in one table of fixed shape:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS "<name>" (key VARCHAR(100) PRIMARY KEY, value TEXT NOT NULL)
//! ```
//!
//! The table name is the only piece of text ever spliced into SQL, and a
//! [`TableName`] can only be obtained through [`TableName::sanitize`], so the
//! spliced text is always `[a-z0-9_]+`. Keys and values travel as bind
//! parameters.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use crate::core::{MapError, Result};

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new("[^A-Za-z0-9]").unwrap();
}

/// A sanitized collection name, usable verbatim as a table identifier.
///
/// Distinct raw names may collapse to the same table (`"a-b"` and `"a b"` both
/// become `a_b`); nothing detects that. Two more ways to collide:
///
/// - Replacement is per `char`, so a character outside the Basic Multilingual
///   Plane (`"😀"`) becomes one `_`. A sanitizer that works on UTF-16 code
///   units would produce `__` and address a different table.
/// - PostgreSQL truncates identifiers to 63 bytes, so names sharing their
///   first 63 sanitized bytes land in the same table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    /// Replace every character outside `[A-Za-z0-9]` with `_`, then lower-case.
    pub fn sanitize(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(MapError::Configuration("collection name is required".into()));
        }
        let name = UNSAFE_CHARS.replace_all(raw, "_").to_lowercase();
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parameterized statement against one collection table.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable { table: TableName },
    SelectAll { table: TableName },
    SelectOne { table: TableName, key: String },
    Exists { table: TableName, key: String },
    Upsert { table: TableName, key: String, value: String },
    Delete { table: TableName, key: String },
    Truncate { table: TableName },
    Count { table: TableName },
}

impl Statement {
    pub fn table(&self) -> &TableName {
        match self {
            Self::CreateTable { table }
            | Self::SelectAll { table }
            | Self::SelectOne { table, .. }
            | Self::Exists { table, .. }
            | Self::Upsert { table, .. }
            | Self::Delete { table, .. }
            | Self::Truncate { table }
            | Self::Count { table } => table,
        }
    }

    /// SQL text with `$n` placeholders.
    pub fn sql(&self) -> String {
        let t = quote_ident(self.table().as_str());
        match self {
            Self::CreateTable { .. } => format!(
                "CREATE TABLE IF NOT EXISTS {} (key VARCHAR(100) PRIMARY KEY, value TEXT NOT NULL)",
                t
            ),
            Self::SelectAll { .. } => format!("SELECT key, value FROM {}", t),
            Self::SelectOne { .. } => format!("SELECT key, value FROM {} WHERE key = $1", t),
            Self::Exists { .. } => format!("SELECT key FROM {} WHERE key = $1", t),
            // Conflict target is the primary key alone.
            Self::Upsert { .. } => format!(
                "INSERT INTO {} (key, value) VALUES ($1, $2) ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
                t
            ),
            Self::Delete { .. } => format!("DELETE FROM {} WHERE key = $1", t),
            Self::Truncate { .. } => format!("TRUNCATE TABLE {}", t),
            Self::Count { .. } => format!("SELECT COUNT(*) AS count FROM {}", t),
        }
    }

    /// Bind parameters, in placeholder order.
    pub fn params(&self) -> Vec<&str> {
        match self {
            Self::SelectOne { key, .. } | Self::Exists { key, .. } | Self::Delete { key, .. } => {
                vec![key.as_str()]
            }
            Self::Upsert { key, value, .. } => vec![key.as_str(), value.as_str()],
            Self::CreateTable { .. }
            | Self::SelectAll { .. }
            | Self::Truncate { .. }
            | Self::Count { .. } => Vec::new(),
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "create_table",
            Self::SelectAll { .. } => "select_all",
            Self::SelectOne { .. } => "select_one",
            Self::Exists { .. } => "exists",
            Self::Upsert { .. } => "upsert",
            Self::Delete { .. } => "delete",
            Self::Truncate { .. } => "truncate",
            Self::Count { .. } => "count",
        }
    }
}

/// Sanitized names are already lower-case; quoting keeps names such as `user`
/// or `2024_stats` valid identifiers.
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident)
}
