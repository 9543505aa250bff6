// THEORY:
// This file is the entry point for the `rolling_motion` library crate. It defines
// the public API exposed to consumers such as the `frame_tester` binary.
//
// The primary exports are the synchronous `Tracker`, which turns a stream of
// frames into rectangles of motion, and the `MotionStage`, which hosts a tracker
// behind an async channel. The arithmetic kernels and the rectangle merger live
// in `core_modules` and are public for callers who want to drive them directly.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use config::{ConfigError, TrackerConfig};
pub use error::MotionError;
pub use parallel_pipeline::MotionStage;
pub use pipeline::{
    DEFAULT_WINDOW, Frame, FrameShape, PixelFormat, RawFrame, Rect, RectFilter, Tracker,
    TrackerState, sort_by_area_desc,
};
