// THEORY:
// The `ColumnDeltaFinder` turns a row of per-byte deltas into one score per pixel
// column. A byte delta on its own means nothing: whether it belongs to a red
// channel, a luma sample or a chroma sample shared by two pixels depends on the
// pixel format. This module is the only place that knows how bytes group into
// pixels.
//
// Key architectural principles:
// 1.  **Squared Distance**: Every score is a sum of squared channel deltas. Squaring
//     makes the score independent of the direction of change, so a pixel that got
//     brighter scores the same as one that got darker by the same amount.
// 2.  **Resolved Once**: The variant is picked from the first frame of a stream and
//     then reused for every row of every frame. There is no per-row dispatch on the
//     frame's format tag.
// 3.  **Caller-Owned Buffers**: `find` writes into a scores slice supplied by the
//     row worker, so scanning a frame allocates nothing per row.

pub mod column_delta {
    use crate::core_modules::frame::PixelFormat;
    use crate::error::MotionError;

    pub type Delta = i32;
    pub type Score = u32;

    #[inline]
    fn squared(delta: Delta) -> Score {
        (delta * delta) as Score
    }

    /// Format-aware mapping from byte deltas to per-column squared color distance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ColumnDeltaFinder {
        /// One luma byte per column.
        Luma { width: usize },
        /// Y0 Cb Y1 Cr groups; the chroma term is shared by both columns of a pair.
        Yuyv { width: usize },
        /// R G B groups.
        Rgb { width: usize },
    }

    impl ColumnDeltaFinder {
        pub fn for_format(format: PixelFormat, width: usize) -> Result<Self, MotionError> {
            match format {
                PixelFormat::Luma => Ok(ColumnDeltaFinder::Luma { width }),
                PixelFormat::Yuyv => Ok(ColumnDeltaFinder::Yuyv { width }),
                PixelFormat::Rgb => Ok(ColumnDeltaFinder::Rgb { width }),
                other => Err(MotionError::UnsupportedPixelFormat(other)),
            }
        }

        /// Number of pixel columns, and so the length of the scores slice.
        pub fn width(&self) -> usize {
            match *self {
                ColumnDeltaFinder::Luma { width }
                | ColumnDeltaFinder::Yuyv { width }
                | ColumnDeltaFinder::Rgb { width } => width,
            }
        }

        /// Number of leading delta bytes that carry pixel data.
        pub fn pixel_bytes(&self) -> usize {
            match *self {
                ColumnDeltaFinder::Luma { width } => width,
                ColumnDeltaFinder::Yuyv { width } => width * 2,
                ColumnDeltaFinder::Rgb { width } => width * 3,
            }
        }

        /// Fills `scores[..width]` from `deltas[..pixel_bytes]`.
        pub fn find(&self, deltas: &[Delta], scores: &mut [Score]) {
            let deltas = &deltas[..self.pixel_bytes()];
            let scores = &mut scores[..self.width()];
            match self {
                ColumnDeltaFinder::Luma { .. } => {
                    for (score, &dy) in scores.iter_mut().zip(deltas) {
                        *score = squared(dy);
                    }
                }
                ColumnDeltaFinder::Yuyv { .. } => {
                    for (pair, group) in scores.chunks_exact_mut(2).zip(deltas.chunks_exact(4)) {
                        let chroma = squared(group[1]) + squared(group[3]);
                        pair[0] = squared(group[0]) + chroma;
                        pair[1] = squared(group[2]) + chroma;
                    }
                }
                ColumnDeltaFinder::Rgb { .. } => {
                    for (score, group) in scores.iter_mut().zip(deltas.chunks_exact(3)) {
                        *score = squared(group[0]) + squared(group[1]) + squared(group[2]);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::column_delta::*;
    use crate::core_modules::frame::PixelFormat;
    use crate::core_modules::rolling_sum::RollingSums;
    use crate::error::MotionError;

    fn deltas_against_blank(new: &[u8]) -> Vec<Delta> {
        let mut sums = RollingSums::<64>::new(new.len());
        let mut deltas = vec![0; new.len()];
        sums.roll_and_delta(new, &vec![0; new.len()], &mut deltas);
        deltas
    }

    #[test]
    fn rgb_scores_sum_squared_channels() {
        // Pixel 1 = (1, 0, 2), pixel 3 = (0, 3, 0).
        let row = [0, 0, 0, 1, 0, 2, 0, 0, 0, 0, 3, 0];
        let deltas = deltas_against_blank(&row);
        let finder = ColumnDeltaFinder::for_format(PixelFormat::Rgb, 4).expect("rgb is supported");
        let mut scores = [0; 4];
        finder.find(&deltas, &mut scores);
        assert_eq!(scores, [0, 5, 0, 9]);
    }

    #[test]
    fn yuyv_pairs_share_chroma() {
        let row = [0, 2, 1, 0, 0, 0, 0, 3];
        let deltas = deltas_against_blank(&row);
        let finder =
            ColumnDeltaFinder::for_format(PixelFormat::Yuyv, 4).expect("yuyv is supported");
        let mut scores = [0; 4];
        finder.find(&deltas, &mut scores);
        assert_eq!(scores, [4, 5, 9, 9]);
    }

    #[test]
    fn luma_scores_one_column_per_byte() {
        let finder =
            ColumnDeltaFinder::for_format(PixelFormat::Luma, 4).expect("luma is supported");
        let mut scores = [0; 4];
        finder.find(&[-1, -2, -3, -4], &mut scores);
        assert_eq!(scores, [1, 4, 9, 16]);
    }

    #[test]
    fn trailing_stride_padding_is_ignored() {
        let finder = ColumnDeltaFinder::Rgb { width: 2 };
        let mut scores = [0; 2];
        finder.find(&[1, 1, 1, 2, 0, 0, 100, 100], &mut scores);
        assert_eq!(scores, [3, 4]);
    }

    #[test]
    fn scores_ignore_delta_sign() {
        let deltas: Vec<Delta> = vec![3, -7, 12, -1, 0, 5, -9, 4];
        let flipped: Vec<Delta> = deltas.iter().map(|d| -d).collect();
        for finder in [
            ColumnDeltaFinder::Luma { width: 8 },
            ColumnDeltaFinder::Yuyv { width: 4 },
            ColumnDeltaFinder::Rgb { width: 2 },
        ] {
            let mut forward = [0; 8];
            let mut backward = [0; 8];
            finder.find(&deltas, &mut forward);
            finder.find(&flipped, &mut backward);
            assert_eq!(forward, backward, "{finder:?}");
        }
    }

    #[test]
    fn unsupported_formats_are_rejected() {
        assert!(matches!(
            ColumnDeltaFinder::for_format(PixelFormat::Rgba, 4),
            Err(MotionError::UnsupportedPixelFormat(PixelFormat::Rgba))
        ));
    }
}
