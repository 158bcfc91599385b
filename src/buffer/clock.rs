use std::sync::Arc;

use super::frame::Frame;
use super::FrameId;
use crate::error::Error;
use crate::error::Result;

/// Second-chance (clock) eviction over the pool's frame array.
///
/// The cursor survives across calls: each scan resumes where the previous
/// one stopped, which is what spreads evictions fairly over the slots. The
/// evictor only picks slots; index unbinding and dirty write-back are the
/// pool's job.
pub struct ClockEvictor {
    hand: FrameId,
    num_slots: usize,
}

impl ClockEvictor {
    pub fn new(num_slots: usize) -> Self {
        assert!(num_slots > 0, "pool must have at least one slot");
        // one position before slot 0, so the first advance lands on it
        ClockEvictor { hand: num_slots - 1, num_slots }
    }

    /// Current cursor position, for white-box inspection.
    pub fn hand(&self) -> FrameId {
        self.hand
    }

    /// Find a reusable slot.
    ///
    /// Invalid slots are taken immediately. A valid slot with its reference
    /// bit set gets a second chance: the bit is cleared and the scan moves
    /// on. A valid, unreferenced slot with no pins is the victim. Once every
    /// slot has been seen pinned without producing a victim the pool is
    /// exhausted, which bounds the scan to roughly two sweeps.
    pub fn find_victim(&mut self, frames: &[Arc<Frame>]) -> Result<FrameId> {
        let mut pinned = 0;
        while pinned < self.num_slots {
            self.hand = (self.hand + 1) % self.num_slots;
            let mut frame = frames[self.hand].write()?;
            if !frame.valid {
                return Ok(self.hand);
            }
            if frame.ref_bit {
                frame.ref_bit = false;
                continue;
            }
            if frame.pin_count == 0 {
                return Ok(self.hand);
            }
            pinned += 1;
        }
        Err(Error::BufferExceeded)
    }
}
