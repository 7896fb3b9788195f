pub mod table_info;

pub use table_info::{TableInfo, SCHEMA_FILE_EXTENSION};

use crate::storage::buffer::{BufferPoolManager, PageGuard};
use crate::storage::disk::TableFile;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{PageId, Predicate};
use crate::storage::tuple::{Attribute, Tuple, TUPLE_SIZE};
use anyhow::{bail, Result};
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A table: its directory entry plus the buffer pool in front of its page file.
///
/// Every page access goes through the pool. Page ids are dense, `0..page_count`.
pub struct Table {
    info: TableInfo,
    db_dir: PathBuf,
    buffer_pool: BufferPoolManager,
}

impl Table {
    /// Creates the table file and directory entry. The table starts with no pages.
    pub fn create(
        db_dir: &Path,
        table_name: &str,
        schema: BTreeMap<String, String>,
        pool_size: usize,
    ) -> Result<Self> {
        if TableInfo::schema_path(db_dir, table_name).exists() {
            bail!("Table '{}' already exists", table_name);
        }

        let table_file = TableFile::create(db_dir, table_name)?;
        let info = TableInfo::new(table_name, schema);
        info.save(db_dir)?;
        info!("Created table '{}' at {:?}", table_name, table_file.path());

        Ok(Self {
            info,
            db_dir: db_dir.to_path_buf(),
            buffer_pool: BufferPoolManager::with_clock(table_file, pool_size),
        })
    }

    pub fn open(db_dir: &Path, table_name: &str, pool_size: usize) -> Result<Self> {
        let info = TableInfo::load(db_dir, table_name)?;
        let table_file = TableFile::new(db_dir, table_name);
        debug!(
            "Opened table '{}' with {} page(s)",
            table_name, info.page_count
        );

        Ok(Self {
            info,
            db_dir: db_dir.to_path_buf(),
            buffer_pool: BufferPoolManager::with_clock(table_file, pool_size),
        })
    }

    pub fn name(&self) -> &str {
        &self.info.table_name
    }

    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    pub fn page_count(&self) -> u32 {
        self.info.page_count
    }

    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.buffer_pool
    }

    pub fn page_ids(&self) -> impl Iterator<Item = PageId> {
        (0..self.info.page_count).map(PageId)
    }

    /// Allocates the next page id and returns the new, empty page pinned.
    ///
    /// The directory entry is saved before the page image is written, so the file never
    /// holds an image past `page_count`. A counted page without an image loads as empty.
    pub fn create_page(&mut self) -> Result<PageGuard> {
        let page_id = PageId(self.info.page_count);
        self.info.page_count += 1;
        if let Err(e) = self.info.save(&self.db_dir) {
            self.info.page_count -= 1;
            return Err(e);
        }

        let guard = self.buffer_pool.fetch_page_write(page_id)?;
        self.buffer_pool.flush_page(page_id)?;
        debug!("Table '{}' allocated page {}", self.info.table_name, page_id);

        Ok(guard)
    }

    pub fn get_page(&self, page_id: PageId, is_write: bool) -> StorageResult<PageGuard> {
        if page_id.0 >= self.info.page_count {
            return Err(StorageError::PageNotFound(page_id));
        }
        if is_write {
            self.buffer_pool.fetch_page_write(page_id)
        } else {
            self.buffer_pool.fetch_page(page_id)
        }
    }

    /// Appends a tuple to the last page, allocating a new page when it is full.
    /// Returns the synthetic id assigned to the tuple.
    pub fn insert(&mut self, attributes: Vec<Attribute>) -> Result<i32> {
        if let Some(last) = self.info.page_count.checked_sub(1).map(PageId) {
            let guard = self.get_page(last, false)?;
            let has_room = guard.read()?.freespace() as usize >= TUPLE_SIZE;
            if has_room {
                let id = guard.write()?.insert_tuple(attributes)?;
                return Ok(id);
            }
        }

        let guard = self.create_page()?;
        let id = guard.write()?.insert_tuple(attributes)?;
        Ok(id)
    }

    pub fn select(&self, predicate: &Predicate) -> Result<Vec<Tuple>> {
        let mut results = Vec::new();
        for page_id in self.page_ids() {
            let guard = self.get_page(page_id, false)?;
            results.extend(guard.read()?.get_tuple(predicate));
        }
        Ok(results)
    }

    /// Deletes matching tuples on every page. Pages without a match stay clean.
    pub fn delete(&self, predicate: &Predicate) -> Result<usize> {
        let mut deleted = 0;
        for page_id in self.page_ids() {
            let guard = self.get_page(page_id, false)?;
            let has_match = guard.read()?.scan(predicate).next().is_some();
            if has_match {
                deleted += guard.write()?.delete_tuple(predicate);
            }
        }
        Ok(deleted)
    }

    pub fn update(&self, predicate: &Predicate, assignments: &[Attribute]) -> Result<usize> {
        let mut updated = 0;
        for page_id in self.page_ids() {
            let guard = self.get_page(page_id, false)?;
            let has_match = guard.read()?.scan(predicate).next().is_some();
            if has_match {
                updated += guard.write()?.update_tuples(predicate, assignments)?;
            }
        }
        Ok(updated)
    }

    pub fn flush(&self) -> Result<()> {
        self.buffer_pool.flush_all()?;
        Ok(())
    }
}
