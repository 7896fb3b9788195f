//! Table metadata and its on-disk form.

use crate::storage::tuple::AttributeType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const SCHEMA_FILE_EXTENSION: &str = "schema";

/// Per-table directory entry: the declared schema and how many pages have been
/// allocated. Stored next to the table file as `<table_name>.schema`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub table_name: String,
    /// Column name to declared type (`"string"`, `"int"`, ...).
    pub schema: BTreeMap<String, String>,
    pub page_count: u32,
}

impl TableInfo {
    pub fn new(table_name: impl Into<String>, schema: BTreeMap<String, String>) -> Self {
        Self {
            table_name: table_name.into(),
            schema,
            page_count: 0,
        }
    }

    pub fn schema_path(db_dir: &Path, table_name: &str) -> PathBuf {
        db_dir.join(format!("{}.{}", table_name, SCHEMA_FILE_EXTENSION))
    }

    pub fn column_type(&self, column: &str) -> Option<AttributeType> {
        self.schema
            .get(column)
            .map(|declared| AttributeType::from_declared(declared))
    }

    pub fn save(&self, db_dir: &Path) -> Result<()> {
        let path = Self::schema_path(db_dir, &self.table_name);
        let data = bincode::serialize(self).context("Failed to encode table info")?;
        std::fs::write(&path, data).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    pub fn load(db_dir: &Path, table_name: &str) -> Result<Self> {
        let path = Self::schema_path(db_dir, table_name);
        let data = std::fs::read(&path).with_context(|| format!("Failed to read {:?}", path))?;
        bincode::deserialize(&data).with_context(|| format!("Corrupt table info in {:?}", path))
    }
}
