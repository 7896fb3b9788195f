//! Storage layer implementation for haddb.
//!
//! Tables live in flat files of fixed-size pages. Key components:
//!
//! - **Tuple**: an attribute list encoded into a fixed 50-byte slot
//! - **Page**: a 4KB unit holding a small header and up to 81 tuple slots
//! - **TableFile**: reads and writes page images at `page_id * PAGE_SIZE`
//! - **BufferPoolManager**: fixed set of frames with clock eviction and pin-based leases
//!
//! The buffer pool is the only path between pages and the table file; higher layers
//! request pages from it and never hold page references across other requests.

pub mod buffer;
pub mod disk;
pub mod error;
pub mod page;
pub mod tuple;

pub use buffer::frame::PageKind;
pub use buffer::{BufferPoolManager, BufferPoolStats, FrameState, PageGuard, PageRef};
pub use disk::{TableFile, PAGE_SIZE};
pub use error::{StorageError, StorageResult};
pub use page::{Page, PageId, Predicate, ID_ATTRIBUTE, TUPLES_PER_PAGE};
pub use tuple::{Attribute, AttributeType, Tuple, TUPLE_SIZE};
