use super::frame::{Frame, FrameId};
use super::replacer::Replacer;

/// Second-chance replacement.
///
/// The hand walks the frames in order. An empty frame is taken at once. An unpinned
/// frame with its reference bit set has the bit cleared and is passed over; one with the
/// bit clear is the victim. Pinned frames are skipped. The sweep gives up after two full
/// revolutions, which is enough to age and then revisit every unpinned frame.
#[derive(Debug, Default)]
pub struct ClockReplacer {
    hand: usize,
}

impl ClockReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hand(&self) -> usize {
        self.hand
    }
}

impl Replacer for ClockReplacer {
    fn victim(&mut self, frames: &mut [Frame]) -> Option<FrameId> {
        let capacity = frames.len();
        if capacity == 0 {
            return None;
        }

        for _ in 0..2 * capacity {
            let frame_id = self.hand % capacity;
            self.hand = (frame_id + 1) % capacity;

            let frame = &mut frames[frame_id];
            if frame.is_empty() {
                return Some(frame_id);
            }
            if frame.is_pinned() {
                continue;
            }
            if frame.reference() {
                frame.clear_reference();
            } else {
                return Some(frame_id);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_frames_first() {
        let mut replacer = ClockReplacer::new();
        let mut frames: Vec<Frame> = (0..3).map(|_| Frame::default()).collect();

        assert_eq!(replacer.victim(&mut frames), Some(0));
        assert_eq!(replacer.hand(), 1);
        assert_eq!(replacer.victim(&mut frames), Some(1));
    }

    #[test]
    fn test_second_chance() {
        let mut replacer = ClockReplacer::new();
        let mut frames = vec![
            Frame::resident(0, 0, true),
            Frame::resident(1, 0, false),
            Frame::resident(2, 0, true),
        ];

        // Frame 0 is aged and skipped, frame 1 has no reference bit.
        assert_eq!(replacer.victim(&mut frames), Some(1));
        assert!(!frames[0].reference());
        assert!(frames[2].reference());
        assert_eq!(replacer.hand(), 2);
    }

    #[test]
    fn test_all_referenced_wraps_to_start() {
        let mut replacer = ClockReplacer::new();
        let mut frames = vec![
            Frame::resident(0, 0, true),
            Frame::resident(1, 0, true),
            Frame::resident(2, 0, true),
        ];

        assert_eq!(replacer.victim(&mut frames), Some(0));
        assert!(frames.iter().all(|f| !f.reference()));
        assert_eq!(replacer.victim(&mut frames), Some(1));
    }

    #[test]
    fn test_pinned_frames_are_skipped() {
        let mut replacer = ClockReplacer::new();
        let mut frames = vec![
            Frame::resident(0, 1, false),
            Frame::resident(1, 2, true),
            Frame::resident(2, 0, true),
        ];

        assert_eq!(replacer.victim(&mut frames), Some(2));
        // Pinned frames keep their reference bits.
        assert!(frames[1].reference());
    }

    #[test]
    fn test_all_pinned() {
        let mut replacer = ClockReplacer::new();
        let mut frames = vec![Frame::resident(0, 1, true), Frame::resident(1, 1, false)];
        assert_eq!(replacer.victim(&mut frames), None);
    }

    #[test]
    fn test_no_frames() {
        let mut replacer = ClockReplacer::new();
        assert_eq!(replacer.victim(&mut []), None);
    }
}
