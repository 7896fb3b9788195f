use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const PAGE_SIZE: usize = 4096;

pub const TABLE_FILE_EXTENSION: &str = "HAD";

/// One flat file per table, logically split into `PAGE_SIZE` pages addressed by
/// `page_id * PAGE_SIZE`. The file is opened and closed on every operation; no handle
/// is held between calls.
#[derive(Debug, Clone)]
pub struct TableFile {
    path: PathBuf,
}

impl TableFile {
    /// Refers to `<db_dir>/<table_name>.HAD` without touching the filesystem.
    pub fn new(db_dir: &Path, table_name: &str) -> Self {
        Self {
            path: db_dir.join(format!("{}.{}", table_name, TABLE_FILE_EXTENSION)),
        }
    }

    /// Creates the backing file if it does not exist yet. Existing contents are kept.
    pub fn create(db_dir: &Path, table_name: &str) -> StorageResult<Self> {
        let table_file = Self::new(db_dir, table_name);
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&table_file.path)?;
        Ok(table_file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads one page image. A missing file or a page past the end of the file is
    /// [`StorageError::PageNotFound`]; a page cut short by the end of the file is
    /// [`StorageError::ShortRead`].
    pub fn read_page(&self, page_id: PageId) -> StorageResult<Box<[u8; PAGE_SIZE]>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::PageNotFound(page_id))
            }
            Err(e) => return Err(e.into()),
        };

        let offset = Self::page_offset(page_id);
        let file_size = file.metadata()?.len();
        if offset >= file_size {
            return Err(StorageError::PageNotFound(page_id));
        }
        if offset + PAGE_SIZE as u64 > file_size {
            return Err(StorageError::ShortRead {
                page_id,
                expected: PAGE_SIZE,
                actual: (file_size - offset) as usize,
            });
        }

        let mut buf = Box::new([0u8; PAGE_SIZE]);
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf.as_mut_slice())?;
        Ok(buf)
    }

    /// Writes one page image, zero-extending the file when the page lies past its end.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> StorageResult<()> {
        if data.len() != PAGE_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("page image must be {} bytes, got {}", PAGE_SIZE, data.len()),
            )
            .into());
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        let offset = Self::page_offset(page_id);
        let file_size = file.metadata()?.len();
        if offset + PAGE_SIZE as u64 > file_size {
            file.set_len(offset + PAGE_SIZE as u64)?;
        }

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.sync_all()?;

        Ok(())
    }

    pub fn num_pages(&self) -> StorageResult<u32> {
        match std::fs::metadata(&self.path) {
            Ok(metadata) => Ok((metadata.len() / PAGE_SIZE as u64) as u32),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn page_offset(page_id: PageId) -> u64 {
        page_id.0 as u64 * PAGE_SIZE as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_file_name() {
        let table_file = TableFile::new(Path::new("/data/shop"), "orders");
        assert_eq!(table_file.path(), Path::new("/data/shop/orders.HAD"));
    }

    #[test]
    fn test_create_keeps_contents() -> Result<()> {
        let dir = tempdir()?;
        let table_file = TableFile::create(dir.path(), "t")?;
        assert!(table_file.exists());
        assert_eq!(table_file.num_pages()?, 0);

        table_file.write_page(PageId(0), &[7u8; PAGE_SIZE])?;
        let reopened = TableFile::create(dir.path(), "t")?;
        assert_eq!(reopened.num_pages()?, 1);
        assert_eq!(reopened.read_page(PageId(0))?[0], 7);
        Ok(())
    }

    #[test]
    fn test_write_and_read_page() -> Result<()> {
        let dir = tempdir()?;
        let table_file = TableFile::new(dir.path(), "t");

        let mut write_buf = vec![0u8; PAGE_SIZE];
        write_buf[0] = 42;
        write_buf[PAGE_SIZE - 1] = 24;
        table_file.write_page(PageId(0), &write_buf)?;

        let read_buf = table_file.read_page(PageId(0))?;
        assert_eq!(read_buf[0], 42);
        assert_eq!(read_buf[PAGE_SIZE - 1], 24);
        Ok(())
    }

    #[test]
    fn test_page_boundary() -> Result<()> {
        let dir = tempdir()?;
        let table_file = TableFile::new(dir.path(), "t");

        table_file.write_page(PageId(0), &[1u8; PAGE_SIZE])?;
        table_file.write_page(PageId(1), &[2u8; PAGE_SIZE])?;

        assert!(table_file.read_page(PageId(0))?.iter().all(|&b| b == 1));
        assert!(table_file.read_page(PageId(1))?.iter().all(|&b| b == 2));
        Ok(())
    }

    #[test]
    fn test_sparse_growth() -> Result<()> {
        let dir = tempdir()?;
        let table_file = TableFile::new(dir.path(), "t");

        table_file.write_page(PageId(5), &[5u8; PAGE_SIZE])?;
        assert_eq!(table_file.num_pages()?, 6);

        let gap = table_file.read_page(PageId(2))?;
        assert!(gap.iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn test_missing_pages() -> Result<()> {
        let dir = tempdir()?;
        let table_file = TableFile::new(dir.path(), "t");

        assert!(matches!(
            table_file.read_page(PageId(0)),
            Err(StorageError::PageNotFound(PageId(0)))
        ));
        assert_eq!(table_file.num_pages()?, 0);

        table_file.write_page(PageId(0), &[1u8; PAGE_SIZE])?;
        assert!(matches!(
            table_file.read_page(PageId(1)),
            Err(StorageError::PageNotFound(PageId(1)))
        ));
        Ok(())
    }

    #[test]
    fn test_short_read() -> Result<()> {
        let dir = tempdir()?;
        let table_file = TableFile::new(dir.path(), "t");
        std::fs::write(table_file.path(), vec![0u8; PAGE_SIZE + 100])?;

        assert!(matches!(
            table_file.read_page(PageId(1)),
            Err(StorageError::ShortRead {
                expected: PAGE_SIZE,
                actual: 100,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn test_invalid_image_size() -> Result<()> {
        let dir = tempdir()?;
        let table_file = TableFile::new(dir.path(), "t");
        assert!(table_file.write_page(PageId(0), &[0u8; 100]).is_err());
        assert!(!table_file.exists());
        Ok(())
    }
}
