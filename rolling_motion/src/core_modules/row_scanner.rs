// THEORY:
// The `RowScanner` orchestrates the per-row half of the engine. For every image row
// it rolls the rolling sums forward, scores each pixel column, and records the runs
// of columns whose score exceeds the threshold. It is not an analyzer itself: the
// arithmetic lives in `rolling_sum` and `column_delta`, the scanner only slices the
// frame into rows and schedules them.
//
// Key architectural principles:
// 1.  **Row Independence**: A row touches only its own `stride` bytes of the rolling
//     sums and writes only its own output slot. Rows can therefore be processed in
//     any order and on any thread.
// 2.  **Explicit Fork-Join**: The rows are partitioned into k contiguous ranges. Each
//     range becomes a `RowJob` that owns disjoint mutable sub-slices of the sums and
//     of the output. The jobs run on a dedicated worker pool and the call does not
//     return until every job has finished, so the merger downstream always sees a
//     complete, ordered set of rows.
// 3.  **No Shared Mutable State**: Jobs never lock. Exclusive access is proven by
//     the borrow checker through `chunks_mut`, not by convention.
// 4.  **Per-Job Scratch**: Each job allocates one delta row and one score row and
//     reuses them for every row it processes.

use crate::config::TrackerConfig;
use crate::core_modules::column_delta::column_delta::{ColumnDeltaFinder, Delta, Score};
use crate::core_modules::rect::{Rect, RowRects};
use crate::core_modules::rolling_sum::roll_and_delta;
use crate::error::MotionError;
use rayon::prelude::*;
use tracing::debug;

/// Collects the runs of columns whose score exceeds `threshold` on row `y`.
/// Adjacent exceeding columns coalesce into a single rectangle.
pub fn active_runs(scores: &[Score], threshold: Score, y: usize) -> RowRects {
    let y = y as i32;
    let mut runs: RowRects = Vec::new();
    for (x, &score) in scores.iter().enumerate() {
        if score <= threshold {
            continue;
        }
        let x = x as i32;
        match runs.last_mut() {
            Some(run) if run.max_x == x => run.max_x += 1,
            _ => runs.push(Rect::row_span(y, x, x + 1)),
        }
    }
    runs
}

/// The fixed per-stream numbers a row job needs.
#[derive(Debug, Clone, Copy)]
pub struct RowGeometry {
    pub stride: usize,
    pub height: usize,
    pub finder: ColumnDeltaFinder,
}

/// A contiguous range of rows with exclusive access to their sums and output.
struct RowJob<'a> {
    first_row: usize,
    sums: &'a mut [u32],
    new: &'a [u8],
    old: &'a [u8],
    out: &'a mut [RowRects],
}

impl RowJob<'_> {
    fn run<const N: usize>(self, geometry: &RowGeometry, threshold: Score) {
        let stride = geometry.stride;
        let mut deltas: Vec<Delta> = vec![0; stride];
        let mut scores: Vec<Score> = vec![0; geometry.finder.width()];

        let rows = self
            .sums
            .chunks_mut(stride)
            .zip(self.new.chunks(stride))
            .zip(self.old.chunks(stride))
            .zip(self.out.iter_mut());
        for (i, (((sums, new), old), out)) in rows.enumerate() {
            roll_and_delta::<N>(sums, new, old, &mut deltas);
            geometry.finder.find(&deltas, &mut scores);
            *out = active_runs(&scores, threshold, self.first_row + i);
        }
    }
}

/// Splits frames into row ranges and runs them on a fixed worker pool.
pub struct RowScanner {
    pool: Option<rayon::ThreadPool>,
    workers: usize,
    min_rows_per_job: usize,
}

impl RowScanner {
    pub fn new(config: &TrackerConfig) -> Result<Self, MotionError> {
        let workers = match config.row_jobs {
            0 => num_cpus::get(),
            n => n,
        }
        .max(1);

        // A single worker runs inline on the calling thread.
        let pool = if workers > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("motion-rows-{i}"))
                    .build()?,
            )
        } else {
            None
        };
        debug!(workers, "row scanner ready");

        Ok(Self {
            pool,
            workers,
            min_rows_per_job: config.min_rows_per_job.max(1),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// How many rows each job gets for an image `height` rows tall.
    pub fn rows_per_job(&self, height: usize) -> usize {
        let jobs = (height / self.min_rows_per_job).clamp(1, self.workers);
        height.div_ceil(jobs).max(1)
    }

    /// Rolls every row of `new` against `old`, returning the active runs of each
    /// row in row order. Blocks until all row jobs have completed.
    pub fn scan<const N: usize>(
        &self,
        sums: &mut [u32],
        new: &[u8],
        old: &[u8],
        geometry: &RowGeometry,
        threshold: Score,
    ) -> Vec<RowRects> {
        let mut rows: Vec<RowRects> = vec![Vec::new(); geometry.height];
        let rows_per_job = self.rows_per_job(geometry.height);
        let span = rows_per_job * geometry.stride;

        // --- 1. Fork: carve disjoint row ranges ---
        let jobs: Vec<RowJob<'_>> = sums
            .chunks_mut(span)
            .zip(new.chunks(span))
            .zip(old.chunks(span))
            .zip(rows.chunks_mut(rows_per_job))
            .enumerate()
            .map(|(i, (((sums, new), old), out))| RowJob {
                first_row: i * rows_per_job,
                sums,
                new,
                old,
                out,
            })
            .collect();

        // --- 2. Run, then join ---
        match &self.pool {
            Some(pool) if jobs.len() > 1 => pool.install(|| {
                jobs.into_par_iter()
                    .for_each(|job| job.run::<N>(geometry, threshold));
            }),
            _ => {
                for job in jobs {
                    job.run::<N>(geometry, threshold);
                }
            }
        }

        rows
    }
}
