use crate::catalog::{Table, SCHEMA_FILE_EXTENSION};
use crate::storage::page::{Predicate, ID_ATTRIBUTE};
use crate::storage::tuple::{Attribute, AttributeType, Tuple};
use anyhow::{anyhow, bail, Context, Result};
use log::info;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Directory holding one `.HAD` page file and one `.schema` file per table.
    pub data_dir: PathBuf,
    /// Number of buffer frames given to each table.
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            data_dir: PathBuf::from("haddb_data"),
            pool_size: 64,
        }
    }
}

/// High-level database interface: a directory of tables and the operations the
/// execution layer issues against them.
pub struct Database {
    config: DatabaseConfig,
    tables: HashMap<String, Table>,
}

impl Database {
    /// Create a new, empty database directory
    pub fn create(config: DatabaseConfig) -> Result<Self> {
        if config.data_dir.exists() {
            bail!("Database directory already exists at {:?}", config.data_dir);
        }
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create {:?}", config.data_dir))?;
        info!("Created database at {:?}", config.data_dir);

        Ok(Self {
            config,
            tables: HashMap::new(),
        })
    }

    /// Open an existing database, loading every table found in its directory
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        if !config.data_dir.is_dir() {
            bail!("Database directory does not exist at {:?}", config.data_dir);
        }

        let mut tables = HashMap::new();
        let entries = std::fs::read_dir(&config.data_dir)
            .with_context(|| format!("Failed to list {:?}", config.data_dir))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SCHEMA_FILE_EXTENSION) {
                continue;
            }
            let Some(table_name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let table = Table::open(&config.data_dir, table_name, config.pool_size)
                .with_context(|| format!("Failed to open table '{}'", table_name))?;
            tables.insert(table_name.to_string(), table);
        }
        info!(
            "Opened database at {:?} with {} table(s)",
            config.data_dir,
            tables.len()
        );

        Ok(Self { config, tables })
    }

    pub fn open_or_create(config: DatabaseConfig) -> Result<Self> {
        if config.data_dir.exists() {
            Self::open(config)
        } else {
            Self::create(config)
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Create a table and its first page
    pub fn create_table(&mut self, name: &str, schema: BTreeMap<String, String>) -> Result<()> {
        validate_identifier(name)?;
        if self.tables.contains_key(name) {
            bail!("Table '{}' already exists", name);
        }
        for column in schema.keys() {
            validate_identifier(column)?;
            if column == ID_ATTRIBUTE {
                bail!("Column name '{}' is reserved", ID_ATTRIBUTE);
            }
        }

        let mut table = Table::create(&self.config.data_dir, name, schema, self.config.pool_size)?;
        table.create_page()?;
        self.tables.insert(name.to_string(), table);
        Ok(())
    }

    /// Drop a table, removing its files
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        let table = self
            .tables
            .remove(name)
            .ok_or_else(|| anyhow!("Table '{}' does not exist", name))?;
        let table_path = table.buffer_pool().table_file().path().to_path_buf();
        let schema_path = crate::catalog::TableInfo::schema_path(&self.config.data_dir, name);
        // Dropping the table drops its pool, which writes back dirty frames.
        drop(table);

        std::fs::remove_file(&schema_path)
            .with_context(|| format!("Failed to remove {:?}", schema_path))?;
        if table_path.exists() {
            std::fs::remove_file(&table_path)
                .with_context(|| format!("Failed to remove {:?}", table_path))?;
        }
        info!("Dropped table '{}'", name);
        Ok(())
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Insert one row given as `(column, value)` pairs. Attribute types come from the
    /// declared schema. Returns the synthetic id of the new tuple.
    pub fn insert(&mut self, table_name: &str, values: &[(&str, &str)]) -> Result<i32> {
        let table = self
            .tables
            .get_mut(table_name)
            .ok_or_else(|| anyhow!("Table '{}' does not exist", table_name))?;

        let mut attributes = Vec::with_capacity(values.len());
        for (column, value) in values {
            let attr_type = column_type(table, column)?;
            check_value(attr_type, column, value)?;
            attributes.push(Attribute::new(*column, attr_type, *value));
        }

        table.insert(attributes)
    }

    pub fn select(&self, table_name: &str, predicate: &Predicate) -> Result<Vec<Tuple>> {
        self.get_table(table_name)?.select(predicate)
    }

    pub fn delete(&self, table_name: &str, predicate: &Predicate) -> Result<usize> {
        self.get_table(table_name)?.delete(predicate)
    }

    pub fn update(
        &self,
        table_name: &str,
        predicate: &Predicate,
        assignments: &[(&str, &str)],
    ) -> Result<usize> {
        let table = self.get_table(table_name)?;
        let mut attributes = Vec::with_capacity(assignments.len());
        for (column, value) in assignments {
            let attr_type = column_type(table, column)?;
            check_value(attr_type, column, value)?;
            attributes.push(Attribute::new(*column, attr_type, *value));
        }
        table.update(predicate, &attributes)
    }

    /// Write back every dirty page of every table
    pub fn flush(&self) -> Result<()> {
        for table in self.tables.values() {
            table.flush()?;
        }
        Ok(())
    }

    pub fn buffer_state(&self, table_name: &str) -> Result<String> {
        Ok(self.get_table(table_name)?.buffer_pool().display_state())
    }

    fn get_table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| anyhow!("Table '{}' does not exist", name))
    }
}

fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("Invalid identifier '{}'", name);
    }
    Ok(())
}

fn column_type(table: &Table, column: &str) -> Result<AttributeType> {
    if column == ID_ATTRIBUTE {
        bail!("Column '{}' is assigned by the database", ID_ATTRIBUTE);
    }
    table.info().column_type(column).ok_or_else(|| {
        anyhow!(
            "Column '{}' does not exist in table '{}'",
            column,
            table.name()
        )
    })
}

fn check_value(attr_type: AttributeType, column: &str, value: &str) -> Result<()> {
    if attr_type == AttributeType::Int && value.parse::<i64>().is_err() {
        bail!("Value '{}' for column '{}' is not an integer", value, column);
    }
    Ok(())
}
