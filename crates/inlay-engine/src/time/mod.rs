//! Frame timing.
//!
//! - `FrameClock` produces clamped per-frame deltas (one per render loop)
//! - `FramePacer` computes how long a loop should sleep to hold a target rate

mod frame_clock;
mod pacer;

pub use frame_clock::{FrameClock, FrameTime};
pub use pacer::FramePacer;
