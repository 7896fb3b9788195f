use crate::storage::page::{Page, PageId};
use std::fmt;

pub type FrameId = usize;

/// What a resident page is used for. Only informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageKind {
    Index,
    #[default]
    Data,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKind::Index => write!(f, "INDEX"),
            PageKind::Data => write!(f, "DATA"),
        }
    }
}

/// One cache slot of the buffer pool.
///
/// A frame with a non-zero pin count is never handed out by a replacer, and a dirty
/// frame is only reset after its page has been written back.
#[derive(Debug, Default)]
pub struct Frame {
    page: Option<Page>,
    kind: PageKind,
    pin_count: u32,
    reference: bool,
    is_dirty: bool,
}

impl Frame {
    pub fn page_id(&self) -> Option<PageId> {
        self.page.as_ref().map(Page::page_id)
    }

    pub fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    pub fn kind(&self) -> PageKind {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.page.is_none()
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    pub fn reference(&self) -> bool {
        self.reference
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub(crate) fn clear_reference(&mut self) {
        self.reference = false;
    }

    pub(crate) fn page_mut(&mut self) -> Option<&mut Page> {
        self.page.as_mut()
    }

    pub(crate) fn install(&mut self, page: Page, kind: PageKind, is_write: bool) {
        self.page = Some(page);
        self.kind = kind;
        self.pin_count = 1;
        self.reference = true;
        self.is_dirty = is_write;
    }

    /// Records another borrower of an already resident page.
    pub(crate) fn pin(&mut self, is_write: bool) {
        self.pin_count += 1;
        self.reference = true;
        self.is_dirty |= is_write;
    }

    pub(crate) fn unpin(&mut self) {
        self.pin_count = self.pin_count.saturating_sub(1);
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    pub(crate) fn reset(&mut self) {
        *self = Frame::default();
    }

    #[cfg(test)]
    pub(crate) fn resident(page_id: u32, pin_count: u32, reference: bool) -> Self {
        Self {
            page: Some(Page::with_id_range(PageId(page_id), (0, 80))),
            kind: PageKind::Data,
            pin_count,
            reference,
            is_dirty: false,
        }
    }
}
