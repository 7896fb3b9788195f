use super::frame::{Frame, FrameId};
use std::fmt::Debug;

pub trait Replacer: Send + Sync + Debug {
    /// Select a frame to (re)use: either an empty frame or an unpinned resident one.
    /// May age frames while searching. Returns None if every frame is pinned.
    fn victim(&mut self, frames: &mut [Frame]) -> Option<FrameId>;
}
