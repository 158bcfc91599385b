pub mod clock;
pub mod frame;
pub mod index;
pub mod pool;

/// Identity of a buffer pool slot, an index into the frame array.
pub type FrameId = usize;
