// THEORY:
// The `pipeline` module is the top-level API of the motion engine. A `Tracker`
// takes one frame at a time and answers with the rectangles of the image that
// differ from the rolling average of the previous N frames. It owns every piece
// of per-stream state; the modules in `core_modules` are stateless kernels or
// plain containers that it drives.
//
// Key architectural principles:
// 1.  **Two States**: A tracker is `Warming` until it has seen N frames and
//     `Steady` forever after. While warming it only accumulates and answers with
//     an empty list, because a partial average is not a meaningful baseline.
// 2.  **Layout Locked at First Frame**: The byte length, stride, width and pixel
//     format of the first frame fix the size of the rolling sums and the column
//     scoring strategy. Any later frame that disagrees is rejected before a
//     single accumulator is touched, so a failed call leaves the tracker as it was.
// 3.  **Pop, Roll, Push**: Once the ring is full the oldest frame is popped, the
//     new frame is rolled in against it, then pushed. The ring never holds more
//     than N frames and never copies pixels.
// 4.  **Fork-Join Per Frame**: Rows are scanned in parallel by the `RowScanner`;
//     the merge that follows is sequential and sees rows in image order.

use crate::config::TrackerConfig;
use crate::core_modules::column_delta::column_delta::ColumnDeltaFinder;
use crate::core_modules::rect_merger::find_connected_rects;
use crate::core_modules::ring_buffer::RingBuffer;
use crate::core_modules::rolling_sum::RollingSums;
use crate::core_modules::row_scanner::{RowGeometry, RowScanner};
use crate::error::MotionError;
use tracing::{debug, error, info, trace};

// Re-export key data structures for the public API.
pub use crate::core_modules::frame::{Frame, FrameShape, PixelFormat, RawFrame};
pub use crate::core_modules::rect::{Rect, RectFilter, RowRects, sort_by_area_desc};
pub use crate::core_modules::rolling_sum::DEFAULT_WINDOW;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// Fewer than N frames seen; results are always empty.
    Warming,
    /// The window is full and every frame is compared against it.
    Steady,
}

/// Everything fixed by the first frame of a stream.
#[derive(Debug, Clone, Copy)]
struct StreamLayout {
    shape: FrameShape,
    geometry: RowGeometry,
}

impl StreamLayout {
    fn establish(shape: FrameShape) -> Result<Self, MotionError> {
        let finder = ColumnDeltaFinder::for_format(shape.format, shape.width)?;
        shape.check_geometry()?;
        Ok(Self {
            shape,
            geometry: RowGeometry {
                stride: shape.stride,
                height: shape.height(),
                finder,
            },
        })
    }
}

/// Rolling-average motion tracker over a window of `N` frames.
pub struct Tracker<F: Frame, const N: usize = DEFAULT_WINDOW> {
    state: TrackerState,
    frame_count: u64,
    ring: RingBuffer<F, N>,
    sums: RollingSums<N>,
    layout: Option<StreamLayout>,
    scanner: RowScanner,
}

impl<F: Frame, const N: usize> Tracker<F, N> {
    pub fn new(config: &TrackerConfig) -> Result<Self, MotionError> {
        let scanner = RowScanner::new(config)?;
        Ok(Self {
            state: TrackerState::Warming,
            frame_count: 0,
            ring: RingBuffer::new(),
            sums: RollingSums::new(0),
            layout: None,
            scanner,
        })
    }

    /// Feeds the next frame and returns the regions that moved relative to the
    /// average of the previous `N` frames. Pixels count as moving when their
    /// squared color distance from the average exceeds `threshold`.
    pub fn get_rects(&mut self, frame: F, threshold: u32) -> Result<Vec<Rect>, MotionError> {
        let result = self.track(frame, threshold);
        if let Err(err) = &result {
            error!(frame = self.frame_count, error = %err, "frame rejected");
        }
        result
    }

    fn track(&mut self, frame: F, threshold: u32) -> Result<Vec<Rect>, MotionError> {
        // --- 1. Validate before touching any state ---
        let geometry = self.layout_for(&frame)?.geometry;

        // --- 2. Roll against the displaced frame, or keep warming ---
        let displaced = if self.ring.is_full() {
            self.ring.pop()
        } else {
            None
        };
        let rects = match displaced {
            Some(old) => {
                let rows = self.scanner.scan::<N>(
                    self.sums.as_mut_slice(),
                    frame.bytes(),
                    old.bytes(),
                    &geometry,
                    threshold,
                );
                if rows.iter().all(Vec::is_empty) {
                    Vec::new()
                } else {
                    find_connected_rects(geometry.finder.width(), &rows)
                }
            }
            None => {
                self.sums.add_frame(frame.bytes());
                Vec::new()
            }
        };

        // --- 3. Remember the frame and advance ---
        self.ring
            .push(frame)
            .map_err(|_| MotionError::RingBufferOverflow { capacity: N })?;
        self.frame_count += 1;
        if self.state == TrackerState::Warming && self.ring.is_full() {
            self.state = TrackerState::Steady;
            info!(window = N, frames = self.frame_count, "tracker warmed up");
        }

        trace!(frame = self.frame_count, rects = rects.len(), "frame tracked");
        Ok(rects)
    }

    /// Returns the stream layout, establishing it from `frame` on the first call.
    fn layout_for(&mut self, frame: &F) -> Result<StreamLayout, MotionError> {
        let shape = frame.shape();
        match self.layout {
            Some(layout) if layout.shape == shape => Ok(layout),
            Some(layout) => Err(MotionError::FormatMismatch {
                expected: layout.shape,
                actual: shape,
            }),
            None => {
                let layout = StreamLayout::establish(shape)?;
                self.sums = RollingSums::new(shape.byte_len);
                self.layout = Some(layout);
                debug!(
                    %shape,
                    height = layout.geometry.height,
                    workers = self.scanner.workers(),
                    rows_per_job = self.scanner.rows_per_job(layout.geometry.height),
                    "stream layout established"
                );
                Ok(layout)
            }
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Frames accepted so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn window(&self) -> usize {
        N
    }

    /// The layout locked in by the first frame, if one has arrived.
    pub fn shape(&self) -> Option<FrameShape> {
        self.layout.map(|layout| layout.shape)
    }

    pub fn rolling_sums(&self) -> &RollingSums<N> {
        &self.sums
    }
}
