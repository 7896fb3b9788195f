//! Page-addressed table files on disk.

pub mod table_file;

pub use table_file::{TableFile, PAGE_SIZE, TABLE_FILE_EXTENSION};
