pub mod clock;
pub mod frame;
pub mod replacer;

use crate::storage::disk::TableFile;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{Page, PageId};
use clock::ClockReplacer;
use frame::{Frame, FrameId, PageKind};
use log::{debug, warn};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use replacer::Replacer;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Counters describing how the pool has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferPoolStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub flushes: u64,
}

/// Read-only snapshot of one frame, as shown by [`BufferPoolManager::display_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameState {
    pub frame_id: FrameId,
    pub page_id: Option<PageId>,
    pub kind: PageKind,
    pub pin_count: u32,
    pub is_dirty: bool,
    pub reference: bool,
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page_id {
            Some(page_id) => write!(
                f,
                "Frame {}: Page ID: {}, Type: {}, Pin Count: {}, Dirty: {}, Reference: {}",
                self.frame_id, page_id, self.kind, self.pin_count, self.is_dirty, self.reference
            ),
            None => write!(f, "Frame {}: Empty Slot", self.frame_id),
        }
    }
}

/// Fixed-capacity page cache in front of one table file.
///
/// The pool is the only component that loads pages from or writes pages to the file.
/// Callers get a [`PageGuard`] per request; the guard holds a pin on the frame until it
/// is dropped, so every exit path releases it.
#[derive(Clone)]
pub struct BufferPoolManager {
    inner: Arc<BufferPoolInner>,
}

struct BufferPoolInner {
    table_file: TableFile,
    state: Mutex<PoolState>,
}

struct PoolState {
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    replacer: Box<dyn Replacer>,
    stats: BufferPoolStats,
}

impl BufferPoolManager {
    pub fn new(table_file: TableFile, replacer: Box<dyn Replacer>, capacity: usize) -> Self {
        let frames = (0..capacity).map(|_| Frame::default()).collect();
        Self {
            inner: Arc::new(BufferPoolInner {
                table_file,
                state: Mutex::new(PoolState {
                    frames,
                    page_table: HashMap::with_capacity(capacity),
                    replacer,
                    stats: BufferPoolStats::default(),
                }),
            }),
        }
    }

    pub fn with_clock(table_file: TableFile, capacity: usize) -> Self {
        Self::new(table_file, Box::new(ClockReplacer::new()), capacity)
    }

    pub fn capacity(&self) -> usize {
        self.inner.state.lock().frames.len()
    }

    pub fn table_file(&self) -> &TableFile {
        &self.inner.table_file
    }

    /// Pins `page_id`, loading it into a frame on a miss. A page with no on-disk image
    /// yet comes back as a fresh empty page. With `is_write` the frame is marked dirty.
    ///
    /// Requesting a page that is already pinned pins it again; each guard releases one pin.
    pub fn request_page(
        &self,
        page_id: PageId,
        kind: PageKind,
        is_write: bool,
    ) -> StorageResult<PageGuard> {
        let mut state = self.inner.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.frames[frame_id].pin(is_write);
            state.stats.hits += 1;
            return Ok(PageGuard::new(self.inner.clone(), frame_id, page_id));
        }

        state.stats.misses += 1;
        let frame_id = self.inner.claim_frame(&mut state)?;
        let page = self.inner.load_page(page_id)?;

        state.frames[frame_id].install(page, kind, is_write);
        state.page_table.insert(page_id, frame_id);
        debug!("Loaded page {} into frame {}", page_id, frame_id);

        Ok(PageGuard::new(self.inner.clone(), frame_id, page_id))
    }

    pub fn fetch_page(&self, page_id: PageId) -> StorageResult<PageGuard> {
        self.request_page(page_id, PageKind::Data, false)
    }

    pub fn fetch_page_write(&self, page_id: PageId) -> StorageResult<PageGuard> {
        self.request_page(page_id, PageKind::Data, true)
    }

    /// Writes `page_id` back if it is resident and dirty. Returns whether a write happened.
    pub fn flush_page(&self, page_id: PageId) -> StorageResult<bool> {
        let mut state = self.inner.state.lock();
        match state.page_table.get(&page_id).copied() {
            Some(frame_id) => {
                let flushed = self.inner.flush_frame(&mut state.frames[frame_id])?;
                if flushed {
                    state.stats.flushes += 1;
                }
                Ok(flushed)
            }
            None => Ok(false),
        }
    }

    pub fn flush_all(&self) -> StorageResult<()> {
        let mut state = self.inner.state.lock();
        let PoolState { frames, stats, .. } = &mut *state;
        for frame in frames.iter_mut() {
            if self.inner.flush_frame(frame)? {
                stats.flushes += 1;
            }
        }
        Ok(())
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.inner.state.lock().page_table.contains_key(&page_id)
    }

    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.inner.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| state.frames[frame_id].pin_count())
    }

    pub fn stats(&self) -> BufferPoolStats {
        self.inner.state.lock().stats
    }

    pub fn frame_states(&self) -> Vec<FrameState> {
        let state = self.inner.state.lock();
        state
            .frames
            .iter()
            .enumerate()
            .map(|(frame_id, frame)| FrameState {
                frame_id,
                page_id: frame.page_id(),
                kind: frame.kind(),
                pin_count: frame.pin_count(),
                is_dirty: frame.is_dirty(),
                reference: frame.reference(),
            })
            .collect()
    }

    /// Human-readable dump of every frame. Has no side effects.
    pub fn display_state(&self) -> String {
        let mut out = String::from("Buffer Pool State:\n");
        for frame_state in self.frame_states() {
            out.push_str(&frame_state.to_string());
            out.push('\n');
        }
        out
    }
}

impl BufferPoolInner {
    /// Finds a frame for a new page, writing back and unmapping its current page first.
    /// The frame is left empty.
    fn claim_frame(&self, state: &mut PoolState) -> StorageResult<FrameId> {
        let PoolState {
            frames,
            page_table,
            replacer,
            stats,
        } = state;

        let frame_id = replacer
            .victim(frames)
            .ok_or(StorageError::BufferExhausted {
                capacity: frames.len(),
            })?;

        let frame = &mut frames[frame_id];
        if let Some(old_page_id) = frame.page_id() {
            let flushed = self
                .flush_frame(frame)
                .map_err(|e| StorageError::FlushFailed {
                    page_id: old_page_id,
                    source: Box::new(e),
                })?;
            if flushed {
                stats.flushes += 1;
            }

            page_table.remove(&old_page_id);
            frame.reset();
            stats.evictions += 1;
            debug!("Evicted page {} from frame {}", old_page_id, frame_id);
        }

        Ok(frame_id)
    }

    fn load_page(&self, page_id: PageId) -> StorageResult<Page> {
        let loaded = self
            .table_file
            .read_page(page_id)
            .and_then(|data| Page::from_bytes(page_id, &data));

        match loaded {
            Ok(page) => Ok(page),
            Err(StorageError::PageNotFound(_)) => {
                debug!("Page {} has no on-disk image, starting empty", page_id);
                Page::new(page_id)
            }
            Err(e) => Err(e),
        }
    }

    fn flush_frame(&self, frame: &mut Frame) -> StorageResult<bool> {
        write_back(&self.table_file, frame)
    }

    fn release(&self, frame_id: FrameId, page_id: PageId) {
        let mut state = self.state.lock();
        let frame = &mut state.frames[frame_id];
        if frame.page_id() == Some(page_id) {
            frame.unpin();
        }
    }
}

impl Drop for BufferPoolInner {
    fn drop(&mut self) {
        let Self { table_file, state } = self;
        for frame in state.get_mut().frames.iter_mut() {
            let page_id = frame.page_id();
            if let Err(e) = write_back(table_file, frame) {
                warn!("Failed to flush page {:?} on shutdown: {}", page_id, e);
            }
        }
    }
}

/// A pinned page. The pin is released when the guard is dropped.
///
/// [`PageGuard::read`] and [`PageGuard::write`] lock the pool while the returned
/// reference lives; drop it before requesting other pages from the same pool.
pub struct PageGuard {
    inner: Arc<BufferPoolInner>,
    frame_id: FrameId,
    page_id: PageId,
}

impl PageGuard {
    fn new(inner: Arc<BufferPoolInner>, frame_id: FrameId, page_id: PageId) -> Self {
        Self {
            inner,
            frame_id,
            page_id,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn read(&self) -> StorageResult<PageRef<'_>> {
        let (frame_id, page_id) = (self.frame_id, self.page_id);
        let state = self.inner.state.lock();
        MutexGuard::try_map(state, |state| resident_page(&mut state.frames[frame_id], page_id))
            .map(PageRef)
            .map_err(|_| StorageError::PageNotResident(page_id))
    }

    /// Mutable access to the page. Marks the frame dirty.
    pub fn write(&self) -> StorageResult<MappedMutexGuard<'_, Page>> {
        let (frame_id, page_id) = (self.frame_id, self.page_id);
        let state = self.inner.state.lock();
        MutexGuard::try_map(state, |state| {
            let frame = &mut state.frames[frame_id];
            if frame.page_id() == Some(page_id) {
                frame.mark_dirty();
            }
            resident_page(frame, page_id)
        })
        .map_err(|_| StorageError::PageNotResident(page_id))
    }

    /// Releases the pin now instead of at the end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        self.inner.release(self.frame_id, self.page_id);
    }
}

fn write_back(table_file: &TableFile, frame: &mut Frame) -> StorageResult<bool> {
    if !frame.is_dirty() {
        return Ok(false);
    }
    if let Some(page) = frame.page() {
        table_file.write_page(page.page_id(), &page.to_bytes()[..])?;
    }
    frame.mark_clean();
    Ok(true)
}

fn resident_page(frame: &mut Frame, page_id: PageId) -> Option<&mut Page> {
    frame.page_mut().filter(|page| page.page_id() == page_id)
}

/// Shared view of a pinned page.
pub struct PageRef<'a>(MappedMutexGuard<'a, Page>);

impl Deref for PageRef<'_> {
    type Target = Page;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
