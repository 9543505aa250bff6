// THEORY:
// The `RectMerger` is the spatial grouping layer. The row scan hands it, for every
// image row in order, the one-row-tall runs of active columns. It sweeps down the
// image once and grows those fragments into 2D bounding boxes, uniting anything
// that touches within one pixel (diagonals included).
//
// Key architectural principles & algorithm steps:
// 1.  **The Slate**: A width-sized array maps every column to (1 + index) of the
//     open rectangle currently covering it, 0 meaning "nothing". Looking up which
//     open rectangles a new fragment touches is a scan over a handful of columns
//     rather than a comparison against every open rectangle.
// 2.  **Open vs Done**: Open rectangles still reach the previous row and may keep
//     growing. As soon as a row passes without touching one, it can never grow
//     again and moves to the done list.
// 3.  **Absorption**: When a new fragment touches open rectangles they are united
//     into it and their slots are tombstoned (`None`). A tombstone is never
//     confused with a legitimately empty rectangle.
// 4.  **Row Order**: The sweep depends on rows arriving strictly top to bottom. Rows
//     computed in parallel are joined before the merger sees any of them.
// 5.  **Final Coalescing**: A box can widen late, after a neighbour it now overlaps
//     was already retired, and open boxes drawn over each other on the slate can
//     hide one another. A last pass unites any done boxes that still touch, so no
//     two returned rectangles are mergeable. It buckets boxes on a coarse grid and
//     only compares a box with the boxes in the cells around it.

use crate::core_modules::rect::{Rect, RowRects};

/// Column-indexed scratch space plus the open rectangles drawn on it.
struct Slate {
    cols: Vec<usize>,
    rects: Vec<Option<Rect>>,
}

impl Slate {
    fn new(width: usize) -> Self {
        Self {
            cols: vec![0; width],
            rects: Vec::new(),
        }
    }

    fn clean(&mut self) {
        self.cols.fill(0);
    }

    /// Clamped column range of `rect` on this slate.
    fn span(&self, rect: &Rect) -> std::ops::Range<usize> {
        let lo = rect.min_x.max(0) as usize;
        let hi = (rect.max_x.max(0) as usize).min(self.cols.len());
        lo..hi.max(lo)
    }

    fn draw(&mut self, index: usize) {
        if let Some(rect) = self.rects[index] {
            let span = self.span(&rect);
            self.cols[span].fill(index + 1);
        }
    }

    fn draw_all(&mut self) {
        for index in 0..self.rects.len() {
            self.draw(index);
        }
    }

    /// Adds a fragment from the current row, absorbing every open rectangle it
    /// touches, and draws the result.
    fn add(&mut self, fragment: Rect) {
        let mut grown = fragment.inset(-1);
        let mut last = 0;
        for x in self.span(&grown) {
            let slot = self.cols[x];
            if slot != 0 && slot != last {
                if let Some(open) = self.rects[slot - 1].take() {
                    grown = grown.union(&open.inset(-1));
                }
                last = slot;
            }
        }
        self.rects.push(Some(grown.inset(1)));
        self.draw(self.rects.len() - 1);
    }

    fn has_open(&self) -> bool {
        self.rects.iter().any(Option::is_some)
    }
}

/// Streaming scanline assembly of row fragments into bounding boxes.
pub struct RectMerger {
    slate: Slate,
    done: Vec<Rect>,
    carried: Vec<Option<Rect>>,
}

impl RectMerger {
    pub fn new(width: usize) -> Self {
        Self {
            slate: Slate::new(width),
            done: Vec::new(),
            carried: Vec::with_capacity(10),
        }
    }

    /// Feeds the fragments of the next row. Rows must arrive in order, one call
    /// per image row, empty rows included.
    pub fn add_row(&mut self, row: &[Rect]) {
        match (self.slate.has_open(), row.is_empty()) {
            (false, true) => {}
            (true, true) => self.flush(),
            (false, false) => self.seed(row),
            (true, false) => self.merge(row),
        }
    }

    /// Starts a fresh set of open rectangles from the fragments of one row.
    fn seed(&mut self, row: &[Rect]) {
        self.slate.rects.clear();
        self.slate.clean();
        for &fragment in row {
            self.slate.add(fragment);
        }
    }

    fn flush(&mut self) {
        self.done.extend(self.slate.rects.drain(..).flatten());
        self.slate.clean();
    }

    fn merge(&mut self, row: &[Rect]) {
        self.slate.clean();
        self.slate.draw_all();
        for &fragment in row {
            self.slate.add(fragment);
        }

        // Whatever did not reach this row is finished.
        let row_end = row[0].max_y;
        self.carried.clear();
        for rect in self.slate.rects.drain(..).flatten() {
            if rect.max_y < row_end {
                self.done.push(rect);
            } else {
                self.carried.push(Some(rect));
            }
        }
        std::mem::swap(&mut self.slate.rects, &mut self.carried);
    }

    /// Closes every open rectangle and returns the merged result.
    pub fn finish(mut self) -> Vec<Rect> {
        self.flush();
        coalesce_touching(self.done)
    }
}

/// Side, in pixels, of one bucket of the coalescing grid.
const GRID_CELL: i32 = 16;

/// Done boxes bucketed by the grid cells they cover, so the boxes near a given
/// box are found without looking at every other box.
struct BoxGrid {
    origin_x: i32,
    origin_y: i32,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<usize>>,
    boxes: Vec<Option<Rect>>,
    seen: Vec<u32>,
    query: u32,
}

impl BoxGrid {
    fn new(bounds: Rect) -> Self {
        let cols = (bounds.width().max(1) as usize).div_ceil(GRID_CELL as usize);
        let rows = (bounds.height().max(1) as usize).div_ceil(GRID_CELL as usize);
        Self {
            origin_x: bounds.min_x,
            origin_y: bounds.min_y,
            cols,
            rows,
            cells: vec![Vec::new(); cols * rows],
            boxes: Vec::new(),
            seen: Vec::new(),
            query: 0,
        }
    }

    /// Grid cells overlapped by the half-open span `[lo, hi)`, clamped to the grid.
    fn cell_span(lo: i32, hi: i32, origin: i32, count: usize) -> std::ops::Range<usize> {
        let first = (lo - origin).div_euclid(GRID_CELL).max(0) as usize;
        let last = ((hi - 1 - origin).div_euclid(GRID_CELL) + 1).max(0) as usize;
        first.min(count)..last.min(count)
    }

    fn cells_of(&self, rect: &Rect) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
        (
            Self::cell_span(rect.min_x, rect.max_x, self.origin_x, self.cols),
            Self::cell_span(rect.min_y, rect.max_y, self.origin_y, self.rows),
        )
    }

    /// Live boxes touching `rect`, other than `skip`.
    fn touching(&mut self, rect: &Rect, skip: Option<usize>) -> Vec<usize> {
        self.query += 1;
        let (xs, ys) = self.cells_of(&rect.inset(-1));
        let mut hits = Vec::new();
        for cy in ys {
            for cx in xs.clone() {
                for &id in &self.cells[cy * self.cols + cx] {
                    if Some(id) == skip || self.seen[id] == self.query {
                        continue;
                    }
                    self.seen[id] = self.query;
                    if self.boxes[id].is_some_and(|b| b.touches(rect)) {
                        hits.push(id);
                    }
                }
            }
        }
        hits
    }

    /// Records box `id` in the cells of `rect` it was not already in as `before`.
    fn register(&mut self, id: usize, rect: &Rect, before: Option<Rect>) {
        let (xs, ys) = self.cells_of(rect);
        let (old_xs, old_ys) = match before {
            Some(old) => self.cells_of(&old),
            None => (0..0, 0..0),
        };
        for cy in ys {
            for cx in xs.clone() {
                if old_xs.contains(&cx) && old_ys.contains(&cy) {
                    continue;
                }
                self.cells[cy * self.cols + cx].push(id);
            }
        }
    }

    /// Adds `rect`, uniting it with every box it touches until it touches none.
    /// The largest absorbed box keeps its slot and grows in place.
    fn insert(&mut self, rect: Rect) {
        let mut merged = rect;
        let mut keep: Option<usize> = None;
        loop {
            let hits = self.touching(&merged, keep);
            if hits.is_empty() {
                break;
            }
            for id in hits {
                let Some(other) = self.boxes[id] else {
                    continue;
                };
                merged = merged.union(&other);
                let kept = keep.and_then(|k| self.boxes[k]);
                if kept.is_none_or(|kept| other.area() > kept.area()) {
                    if let Some(k) = keep {
                        self.boxes[k] = None;
                    }
                    keep = Some(id);
                } else {
                    self.boxes[id] = None;
                }
            }
        }

        match keep {
            Some(id) => {
                let before = self.boxes[id].replace(merged);
                self.register(id, &merged, before);
            }
            None => {
                let id = self.boxes.len();
                self.boxes.push(Some(merged));
                self.seen.push(0);
                self.register(id, &merged, None);
            }
        }
    }

    fn into_boxes(self) -> Vec<Rect> {
        self.boxes.into_iter().flatten().collect()
    }
}

/// Unites rectangles until no two of them touch. Each box only looks at the
/// grid cells around it, so sparse input costs time linear in its size.
fn coalesce_touching(rects: Vec<Rect>) -> Vec<Rect> {
    if rects.len() < 2 {
        return rects;
    }
    let bounds = rects.iter().fold(Rect::default(), |acc, r| acc.union(r));
    let mut grid = BoxGrid::new(bounds);
    for rect in rects {
        grid.insert(rect);
    }
    grid.into_boxes()
}

/// Merges per-row fragments of an image `width` pixels wide into connected
/// bounding boxes. `rows[y]` holds the fragments of row `y`.
pub fn find_connected_rects(width: usize, rows: &[RowRects]) -> Vec<Rect> {
    let mut merger = RectMerger::new(width);
    for row in rows {
        merger.add_row(row);
    }
    merger.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::row_scanner::active_runs;

    fn run(y: i32, x0: i32, x1: i32) -> Rect {
        Rect::row_span(y, x0, x1)
    }

    fn sorted(mut rects: Vec<Rect>) -> Vec<Rect> {
        rects.sort();
        rects
    }

    /// The runs of set cells, row by row, as the row scan reports them.
    fn rows_of(width: usize, height: usize, set: impl Fn(usize, usize) -> bool) -> Vec<RowRects> {
        (0..height)
            .map(|y| {
                let scores: Vec<u32> = (0..width).map(|x| u32::from(set(x, y))).collect();
                active_runs(&scores, 0, y)
            })
            .collect()
    }

    /// Unites touching boxes two at a time until none touch.
    fn closure_by_pairs(mut rects: Vec<Rect>) -> Vec<Rect> {
        let mut i = 0;
        while i < rects.len() {
            let mut grew = false;
            let mut j = i + 1;
            while j < rects.len() {
                if rects[i].touches(&rects[j]) {
                    let other = rects.swap_remove(j);
                    rects[i] = rects[i].union(&other);
                    grew = true;
                    j = i + 1;
                } else {
                    j += 1;
                }
            }
            i = if grew { 0 } else { i + 1 };
        }
        rects
    }

    fn assert_maximal(rects: &[Rect]) {
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!a.touches(b), "{a:?} and {b:?} should have been merged");
            }
        }
    }

    #[test]
    fn grows_regions_row_by_row() {
        let mut rows: Vec<RowRects> = vec![Vec::new(); 5];

        rows[1] = vec![run(1, 1, 2)];
        assert_eq!(find_connected_rects(5, &rows), vec![Rect::new(1, 1, 2, 2)]);

        rows[2] = vec![run(2, 2, 3)];
        assert_eq!(find_connected_rects(5, &rows), vec![Rect::new(1, 1, 3, 3)]);

        rows[4] = vec![run(4, 4, 5)];
        assert_eq!(
            sorted(find_connected_rects(5, &rows)),
            vec![Rect::new(1, 1, 3, 3), Rect::new(4, 4, 5, 5)]
        );

        rows[1].push(run(1, 4, 5));
        assert_eq!(
            sorted(find_connected_rects(5, &rows)),
            vec![
                Rect::new(1, 1, 3, 3),
                Rect::new(4, 1, 5, 2),
                Rect::new(4, 4, 5, 5)
            ]
        );

        rows[2].push(run(2, 4, 5));
        assert_eq!(
            sorted(find_connected_rects(5, &rows)),
            vec![
                Rect::new(1, 1, 3, 3),
                Rect::new(4, 1, 5, 3),
                Rect::new(4, 4, 5, 5)
            ]
        );

        rows[3] = vec![run(3, 2, 3)];
        assert_eq!(
            sorted(find_connected_rects(5, &rows)),
            vec![
                Rect::new(1, 1, 3, 4),
                Rect::new(4, 1, 5, 3),
                Rect::new(4, 4, 5, 5)
            ]
        );

        rows[3].push(run(3, 4, 5));
        let merged = find_connected_rects(5, &rows);
        assert_maximal(&merged);
        assert_eq!(
            sorted(merged),
            vec![Rect::new(1, 1, 3, 4), Rect::new(4, 1, 5, 5)]
        );
    }

    #[test]
    fn empty_input_yields_nothing() {
        let rows: Vec<RowRects> = vec![Vec::new(); 8];
        assert!(find_connected_rects(8, &rows).is_empty());
        assert!(find_connected_rects(8, &[]).is_empty());
    }

    #[test]
    fn a_gap_column_keeps_runs_apart() {
        let rows = vec![vec![run(0, 1, 2), run(0, 3, 4)]];
        assert_eq!(
            find_connected_rects(6, &rows),
            vec![Rect::new(1, 0, 2, 1), Rect::new(3, 0, 4, 1)]
        );
    }

    #[test]
    fn fragment_bridging_two_open_regions_unites_them() {
        let rows = vec![
            vec![run(0, 0, 2), run(0, 6, 8)],
            vec![run(1, 0, 2), run(1, 6, 8)],
            vec![run(2, 1, 7)],
        ];
        assert_eq!(find_connected_rects(8, &rows), vec![Rect::new(0, 0, 8, 3)]);
    }

    #[test]
    fn regions_separated_by_a_blank_row_stay_apart() {
        let rows = vec![vec![run(0, 0, 3)], Vec::new(), vec![run(2, 0, 3)]];
        assert_eq!(
            sorted(find_connected_rects(4, &rows)),
            vec![Rect::new(0, 0, 3, 1), Rect::new(0, 2, 3, 3)]
        );
    }

    #[test]
    fn late_widening_swallows_a_retired_neighbour() {
        let rows = vec![
            vec![run(0, 0, 1)],
            vec![run(1, 0, 1)],
            vec![run(2, 0, 1), run(2, 5, 6)],
            vec![run(3, 0, 1)],
            vec![run(4, 0, 8)],
        ];
        let merged = find_connected_rects(12, &rows);
        assert_eq!(merged, vec![Rect::new(0, 0, 8, 5)]);
    }

    #[test]
    fn every_fragment_is_covered_by_exactly_one_box() {
        let rows: Vec<RowRects> = vec![
            vec![run(0, 0, 2), run(0, 9, 10)],
            vec![run(1, 3, 4), run(1, 9, 11)],
            Vec::new(),
            vec![run(3, 0, 1), run(3, 5, 7), run(3, 11, 12)],
            vec![run(4, 1, 2), run(4, 7, 8)],
            vec![run(5, 14, 15)],
        ];
        let merged = find_connected_rects(16, &rows);
        assert_maximal(&merged);
        for fragment in rows.iter().flatten() {
            let covering = merged.iter().filter(|r| r.contains(fragment)).count();
            assert_eq!(covering, 1, "{fragment:?} in {merged:?}");
        }
    }

    #[test]
    fn random_grids_match_pairwise_closure() {
        let (width, height) = (28, 22);
        for seed in 1..=30u64 {
            let density = 10 + (seed % 5) * 10;
            let mut state = seed;
            let cells: Vec<bool> = (0..width * height)
                .map(|_| {
                    state = state
                        .wrapping_mul(6364136223846793005)
                        .wrapping_add(1442695040888963407);
                    (state >> 33) % 100 < density
                })
                .collect();
            let rows = rows_of(width, height, |x, y| cells[y * width + x]);

            let merged = find_connected_rects(width, &rows);
            assert_maximal(&merged);
            for fragment in rows.iter().flatten() {
                let covering = merged.iter().filter(|r| r.contains(fragment)).count();
                assert_eq!(covering, 1, "seed {seed}: {fragment:?} in {merged:?}");
            }

            let expected = closure_by_pairs(rows.iter().flatten().copied().collect());
            assert_eq!(sorted(merged), sorted(expected), "seed {seed}");
        }
    }

    #[test]
    fn sparse_dots_on_a_large_frame_stay_separate() {
        let (width, height) = (640, 480);
        let rows = rows_of(width, height, |x, y| x % 2 == 0 && y % 2 == 0);
        let merged = find_connected_rects(width, &rows);
        assert_eq!(merged.len(), (width / 2) * (height / 2));

        let dots: Vec<Rect> = rows.into_iter().flatten().collect();
        assert_eq!(sorted(merged), sorted(dots));
    }

    #[test]
    fn coalescing_follows_a_long_chain() {
        let chain: Vec<Rect> = (0..2000).map(|x| run(x % 3, 500 + x, 501 + x)).collect();
        assert_eq!(coalesce_touching(chain.clone()), vec![Rect::new(500, 0, 2500, 3)]);

        let reversed: Vec<Rect> = chain.into_iter().rev().collect();
        assert_eq!(coalesce_touching(reversed), vec![Rect::new(500, 0, 2500, 3)]);
    }

    #[test]
    fn coalescing_keeps_separate_boxes_in_order() {
        let boxes = vec![
            Rect::new(0, 0, 3, 3),
            Rect::new(40, 40, 44, 41),
            Rect::new(4, 0, 6, 2),
            Rect::new(45, 42, 46, 43),
        ];
        assert_eq!(
            coalesce_touching(boxes.clone()),
            vec![
                Rect::new(0, 0, 3, 3),
                Rect::new(40, 40, 44, 41),
                Rect::new(4, 0, 6, 2),
                Rect::new(45, 42, 46, 43)
            ]
        );
        assert_eq!(coalesce_touching(boxes).len(), 4);
    }
}
