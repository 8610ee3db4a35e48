//! Frame timing for hosts that drive the scheduler themselves.
//!
//! The scheduler only consumes millisecond timestamps; a browser-like host
//! passes its animation-frame timestamp, a native host uses `FrameClock`.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
