// THEORY:
// Every failure the engine can report is a contract violation by the caller or a
// bug in the roll discipline. None of them are retried: the engine only does pure
// computation over frames that have already been delivered, so the first error
// is surfaced and the caller is expected to stop feeding the stream.

use crate::core_modules::frame::{FrameShape, PixelFormat};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MotionError {
    /// A frame arrived whose layout differs from the one established by the
    /// first frame of the stream.
    #[error("frame layout changed mid-stream: expected {expected}, got {actual}")]
    FormatMismatch {
        expected: FrameShape,
        actual: FrameShape,
    },
    #[error("unsupported pixel format {0:?}")]
    UnsupportedPixelFormat(PixelFormat),
    /// Push on a full ring. Only reachable through a broken roll discipline.
    #[error("frame ring overflow (capacity {capacity})")]
    RingBufferOverflow { capacity: usize },
    #[error("invalid frame geometry: {0}")]
    InvalidGeometry(String),
    #[error("failed to build row worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("motion stage is closed")]
    StageClosed,
}
