//! In-memory table pages and their on-disk image.
//!
//! Page image layout (all integers big-endian):
//!
//! ```text
//! offset 0:   i32 freespace
//! offset 4:   i32 id_range.0
//! offset 8:   i32 id_range.1
//! offset 12:  TUPLE_SIZE-byte tuple slots, packed, zero padded to PAGE_SIZE
//! ```

use crate::storage::disk::{TableFile, PAGE_SIZE};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::tuple::{Attribute, AttributeType, Tuple, TUPLE_SIZE};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;
use std::path::Path;

pub const PAGE_HEADER_SIZE: usize = 3 * std::mem::size_of::<i32>();
pub const PAGE_BODY_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE;
pub const TUPLES_PER_PAGE: usize = PAGE_BODY_SIZE / TUPLE_SIZE;

/// Name of the synthetic attribute stamped on every inserted tuple.
pub const ID_ATTRIBUTE: &str = "id";

const FREESPACE_OFFSET: usize = 0;
const ID_FIRST_OFFSET: usize = 4;
const ID_SECOND_OFFSET: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tuple filter used by get, delete and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    All,
    Equals { key: String, value: String },
}

impl Predicate {
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Equals { key, value } => tuple.get_attribute(key) == Some(value.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    page_id: PageId,
    id_range: (i32, i32),
    tuples: Vec<Tuple>,
}

impl Page {
    /// Creates an empty page whose id range is the block of [`TUPLES_PER_PAGE`] ids
    /// owned by `page_id`. Fails when that block does not fit in `i32`.
    pub fn new(page_id: PageId) -> StorageResult<Self> {
        let per_page = TUPLES_PER_PAGE as i32;
        let first = i32::try_from(page_id.0)
            .ok()
            .and_then(|id| id.checked_mul(per_page));
        let last = first.and_then(|first| first.checked_add(per_page - 1));

        match (first, last) {
            (Some(first), Some(last)) => Ok(Self::with_id_range(page_id, (first, last))),
            _ => Err(StorageError::PageIdOutOfRange(page_id)),
        }
    }

    pub fn with_id_range(page_id: PageId, id_range: (i32, i32)) -> Self {
        Self {
            page_id,
            id_range,
            tuples: Vec::new(),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn id_range(&self) -> (i32, i32) {
        self.id_range
    }

    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Bytes left for further tuple slots. Always derived from the tuple count.
    pub fn freespace(&self) -> i32 {
        (PAGE_BODY_SIZE - self.tuples.len() * TUPLE_SIZE) as i32
    }

    /// Appends a tuple built from `attributes` plus a synthetic `id` attribute and
    /// returns the assigned id. The tuple must fit its slot whole, `id` included, so
    /// the resident page always equals its on-disk image. On error the page is untouched.
    pub fn insert_tuple(&mut self, attributes: Vec<Attribute>) -> StorageResult<i32> {
        let available = self.freespace() as usize;
        if available < TUPLE_SIZE {
            return Err(StorageError::PageFull {
                required: TUPLE_SIZE,
                available,
            });
        }

        let id = self
            .id_range
            .0
            .checked_add(self.tuples.len() as i32)
            .ok_or_else(|| StorageError::CorruptPage {
                page_id: self.page_id,
                reason: format!("id range starting at {} is exhausted", self.id_range.0),
            })?;
        let mut tuple = Tuple::from_attributes(attributes);
        tuple.add_attribute(Attribute::new(ID_ATTRIBUTE, AttributeType::Int, id.to_string()));
        check_fits(&tuple)?;

        self.tuples.push(tuple);
        Ok(id)
    }

    /// Removes every matching tuple and returns how many were removed.
    pub fn delete_tuple(&mut self, predicate: &Predicate) -> usize {
        let before = self.tuples.len();
        match predicate {
            Predicate::All => self.tuples.clear(),
            _ => self.tuples.retain(|tuple| !predicate.matches(tuple)),
        }
        before - self.tuples.len()
    }

    pub fn get_tuple(&self, predicate: &Predicate) -> Vec<Tuple> {
        self.scan(predicate).cloned().collect()
    }

    /// Lazy view over the matching tuples, in insertion order.
    pub fn scan<'a>(&'a self, predicate: &'a Predicate) -> impl Iterator<Item = &'a Tuple> + 'a {
        self.tuples.iter().filter(move |tuple| predicate.matches(tuple))
    }

    /// Applies `assignments` to every matching tuple and returns the match count.
    /// If any updated tuple would outgrow its slot, nothing is changed.
    pub fn update_tuples(
        &mut self,
        predicate: &Predicate,
        assignments: &[Attribute],
    ) -> StorageResult<usize> {
        let mut updated = Vec::new();
        for (index, tuple) in self.tuples.iter().enumerate() {
            if predicate.matches(tuple) {
                let mut tuple = tuple.clone();
                tuple.update_attributes(assignments);
                check_fits(&tuple)?;
                updated.push((index, tuple));
            }
        }

        let count = updated.len();
        for (index, tuple) in updated {
            self.tuples[index] = tuple;
        }
        Ok(count)
    }

    pub fn to_bytes(&self) -> Box<[u8; PAGE_SIZE]> {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        BigEndian::write_i32(&mut data[FREESPACE_OFFSET..], self.freespace());
        BigEndian::write_i32(&mut data[ID_FIRST_OFFSET..], self.id_range.0);
        BigEndian::write_i32(&mut data[ID_SECOND_OFFSET..], self.id_range.1);

        for (i, tuple) in self.tuples.iter().enumerate() {
            let offset = PAGE_HEADER_SIZE + i * TUPLE_SIZE;
            data[offset..offset + TUPLE_SIZE].copy_from_slice(&tuple.encode());
        }

        data
    }

    /// Rebuilds a page from its image. An all-zero image (never written) is reported as
    /// [`StorageError::PageNotFound`], which is distinct from an empty formatted page.
    pub fn from_bytes(page_id: PageId, data: &[u8; PAGE_SIZE]) -> StorageResult<Self> {
        let freespace = BigEndian::read_i32(&data[FREESPACE_OFFSET..]);
        let id_range = (
            BigEndian::read_i32(&data[ID_FIRST_OFFSET..]),
            BigEndian::read_i32(&data[ID_SECOND_OFFSET..]),
        );

        if freespace == 0 {
            return Err(StorageError::PageNotFound(page_id));
        }
        if freespace < 0
            || freespace as usize > PAGE_BODY_SIZE
            || (PAGE_BODY_SIZE - freespace as usize) % TUPLE_SIZE != 0
        {
            return Err(StorageError::CorruptPage {
                page_id,
                reason: format!("freespace {} is not a valid slot boundary", freespace),
            });
        }

        let used_space = PAGE_SIZE - freespace as usize;
        let tuple_count = (used_space - PAGE_HEADER_SIZE) / TUPLE_SIZE;

        let mut tuples = Vec::with_capacity(tuple_count);
        for slot in data[PAGE_HEADER_SIZE..]
            .chunks_exact(TUPLE_SIZE)
            .take(tuple_count)
        {
            match Tuple::decode(slot)? {
                Some(tuple) => tuples.push(tuple),
                None => {
                    return Err(StorageError::CorruptPage {
                        page_id,
                        reason: format!("slot {} inside the used region is empty", tuples.len()),
                    })
                }
            }
        }

        Ok(Self {
            page_id,
            id_range,
            tuples,
        })
    }

    /// Writes this page into slot `page_id` of `<db_dir>/<table_name>.HAD`, growing the
    /// file with zeros when the slot lies past its end.
    pub fn serialize(&self, page_id: PageId, db_dir: &Path, table_name: &str) -> StorageResult<()> {
        TableFile::new(db_dir, table_name).write_page(page_id, &self.to_bytes()[..])
    }

    pub fn deserialize(page_id: PageId, db_dir: &Path, table_name: &str) -> StorageResult<Self> {
        let data = TableFile::new(db_dir, table_name).read_page(page_id)?;
        Self::from_bytes(page_id, &data)
    }
}

fn check_fits(tuple: &Tuple) -> StorageResult<()> {
    if tuple.fits() {
        Ok(())
    } else {
        Err(StorageError::TupleTooLarge {
            required: tuple.encoded_len(),
            available: TUPLE_SIZE,
        })
    }
}
