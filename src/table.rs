//! Format string table, loaded once per run and held read-only.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Failure to load the format table. Everything past table loading is
/// recovered locally, so this is the decoder's only fatal error type.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to read the format table")]
    Io(#[from] std::io::Error),
    #[error("the format table is not valid JSON")]
    Json(#[from] serde_json::Error),
}

/// Read-only mapping from string address to printf-style format template.
///
/// The source JSON is a flat object keyed by decimal addresses, e.g.
/// `{"20185096": "QSPI", "20185088": "%s %s initialized!"}`. The table is
/// injected into the decoder by reference; nothing mutates it after load.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FormatTable {
    entries: HashMap<String, String>,
}

impl FormatTable {
    /// Load the table from a JSON file.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Build a table from numeric entries. Handy for synthetic tables.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(addr, template)| (addr.to_string(), template.into()))
                .collect(),
        }
    }

    /// Look up the template for a numeric string address. A missing
    /// address is an expected condition; callers report it and move on.
    pub fn lookup(&self, addr: u32) -> Option<&str> {
        self.entries.get(&addr.to_string()).map(String::as_str)
    }

    /// Number of templates in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
