// THEORY:
// The `MotionStage` hosts a `Tracker` inside an async application. Tracking is
// CPU-bound and strictly ordered, so the tracker lives on a single blocking worker
// and frames reach it through a bounded channel. Callers on the async side only
// ever see a future that resolves to the result for their own frame.
//
// Key architectural principles:
// 1.  **Single Consumer**: Exactly one worker owns the tracker. Frames are tracked
//     in the order they were accepted by the channel, which is the order the rolling
//     average requires.
// 2.  **Backpressure**: The queue is bounded; a producer that outruns the tracker
//     waits in `submit` instead of piling frames up in memory.
// 3.  **Fail-Stop**: The first fatal error is delivered to the frame that caused it,
//     then the worker exits. Anything queued behind it, and anything submitted
//     later, resolves to `StageClosed`.

use crate::core_modules::frame::Frame;
use crate::core_modules::rect::Rect;
use crate::error::MotionError;
use crate::pipeline::Tracker;
use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

type FrameResult = Result<Vec<Rect>, MotionError>;

struct FrameTask<F> {
    frame: F,
    threshold: u32,
    result_sender: oneshot::Sender<FrameResult>,
}

/// An async front end for a `Tracker` running on its own blocking thread.
pub struct MotionStage<F> {
    task_sender: mpsc::Sender<FrameTask<F>>,
    worker: tokio::task::JoinHandle<u64>,
}

impl<F: Frame + Send + 'static> MotionStage<F> {
    /// Moves `tracker` onto a blocking worker. At most `queue_depth` frames wait
    /// in front of it. Must be called from within a tokio runtime.
    pub fn spawn<const N: usize>(mut tracker: Tracker<F, N>, queue_depth: usize) -> Self {
        let (task_sender, mut task_receiver) = mpsc::channel::<FrameTask<F>>(queue_depth.max(1));

        let worker = tokio::task::spawn_blocking(move || {
            info!(window = N, queue_depth, "motion stage started");
            while let Some(task) = task_receiver.blocking_recv() {
                let result = tracker.get_rects(task.frame, task.threshold);
                let fatal = result.is_err();
                // The caller may have given up on its result; tracking goes on.
                let _ = task.result_sender.send(result);
                if fatal {
                    warn!(frames = tracker.frame_count(), "motion stage halted by error");
                    break;
                }
            }
            info!(frames = tracker.frame_count(), "motion stage stopped");
            tracker.frame_count()
        });

        Self {
            task_sender,
            worker,
        }
    }

    /// Queues `frame` and waits for its rectangles.
    pub async fn submit(&self, frame: F, threshold: u32) -> FrameResult {
        let (result_sender, result_receiver) = oneshot::channel();
        let task = FrameTask {
            frame,
            threshold,
            result_sender,
        };

        self.task_sender
            .send(task)
            .await
            .map_err(|_| MotionError::StageClosed)?;

        result_receiver.await.map_err(|_| MotionError::StageClosed)?
    }

    /// Tracks every frame of `frames`, yielding results in frame order.
    pub fn track_stream<'a, S>(
        &'a self,
        frames: S,
        threshold: u32,
    ) -> impl Stream<Item = FrameResult> + 'a
    where
        S: Stream<Item = F> + 'a,
    {
        frames.then(move |frame| self.submit(frame, threshold))
    }

    /// True once the worker has stopped accepting frames.
    pub fn is_closed(&self) -> bool {
        self.task_sender.is_closed()
    }

    /// Stops accepting frames, lets the worker finish what is queued, and
    /// returns the number of frames the tracker accepted over its lifetime.
    pub async fn shutdown(self) -> Result<u64, MotionError> {
        let MotionStage {
            task_sender,
            worker,
        } = self;
        drop(task_sender);
        worker.await.map_err(|err| {
            warn!(error = %err, "motion stage worker did not exit cleanly");
            MotionError::StageClosed
        })
    }
}
