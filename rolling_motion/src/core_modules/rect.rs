// THEORY:
// A `Rect` is the unit of output for the whole engine: an axis-aligned, half-open
// box `[min_x, max_x) x [min_y, max_y)` in pixel space. The same type is used for
// the one-row-tall fragments produced by the row scan (see `RowRects`) and for the
// final merged regions.
//
// Key architectural principles:
// 1.  **Half-Open Boxes**: A box covering columns 3 and 4 of row 7 is
//     `[3, 5) x [7, 8)`. Widths and areas fall out as plain subtraction.
// 2.  **Signed Coordinates**: Growing a box by one pixel on each side may push it
//     past the image edge, so coordinates are `i32`.
// 3.  **One-Pixel Adjacency**: Two boxes "touch" when growing one of them by a pixel
//     on every side makes them overlap. Diagonal neighbours touch.
// 4.  **Dumb Data**: `RectFilter` and `sort_by_area_desc` are conveniences for
//     consumers of the output; the engine itself never filters.

use serde::Deserialize;

/// An axis-aligned half-open integer rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Rect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

/// The one-row-tall rectangles found in a single image row, left to right.
pub type RowRects = Vec<Rect>;

impl Rect {
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The run of columns `[min_x, max_x)` on row `y`.
    pub const fn row_span(y: i32, min_x: i32, max_x: i32) -> Self {
        Self::new(min_x, y, max_x, y + 1)
    }

    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }

    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            return 0;
        }
        i64::from(self.width()) * i64::from(self.height())
    }

    /// Shrinks the box by `n` on every side; a negative `n` grows it.
    pub fn inset(&self, n: i32) -> Self {
        Self::new(self.min_x + n, self.min_y + n, self.max_x - n, self.max_y - n)
    }

    /// The smallest box containing both. An empty box contributes nothing.
    pub fn union(&self, other: &Rect) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    /// True when the boxes overlap or sit within one pixel of each other,
    /// diagonals included.
    pub fn touches(&self, other: &Rect) -> bool {
        self.inset(-1).intersects(other)
    }

    pub fn contains(&self, other: &Rect) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }
}

/// Orders rectangles from largest to smallest area.
pub fn sort_by_area_desc(rects: &mut [Rect]) {
    rects.sort_by(|a, b| b.area().cmp(&a.area()));
}

/// Drops rectangles that are too small, too large, or too elongated to be of
/// interest. A `None` limit disables that check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RectFilter {
    #[serde(default)]
    pub min_area: Option<i64>,
    #[serde(default)]
    pub max_area: Option<i64>,
    /// Largest accepted width:height (or height:width) ratio.
    #[serde(default)]
    pub max_squareness: Option<i64>,
}

impl RectFilter {
    pub fn accepts(&self, rect: &Rect) -> bool {
        if rect.is_empty() {
            return false;
        }
        let area = rect.area();
        if self.min_area.is_some_and(|min| area < min) {
            return false;
        }
        if self.max_area.is_some_and(|max| area > max) {
            return false;
        }
        if let Some(squareness) = self.max_squareness {
            // Ratios are compared in tenths to stay in integers.
            let (w, h) = (i64::from(rect.width()), i64::from(rect.height()));
            let limit = 10 * squareness;
            if 10 * w / h > limit || 10 * h / w > limit {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, rects: Vec<Rect>) -> Vec<Rect> {
        rects.into_iter().filter(|r| self.accepts(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_neighbours_touch() {
        let a = Rect::row_span(1, 1, 2);
        let b = Rect::row_span(2, 2, 3);
        assert!(a.touches(&b));
        assert!(b.touches(&a));
        assert_eq!(a.union(&b), Rect::new(1, 1, 3, 3));
    }

    #[test]
    fn a_gap_column_does_not_touch() {
        let a = Rect::row_span(0, 0, 2);
        let b = Rect::row_span(0, 3, 5);
        assert!(!a.touches(&b));
        let c = Rect::row_span(2, 0, 2);
        assert!(!a.touches(&c));
    }

    #[test]
    fn union_with_empty_is_identity() {
        let a = Rect::new(3, 4, 5, 9);
        assert_eq!(a.union(&Rect::default()), a);
        assert_eq!(Rect::default().union(&a), a);
    }

    #[test]
    fn sorts_largest_first() {
        let mut rects = vec![
            Rect::new(0, 0, 1, 1),
            Rect::new(0, 0, 4, 4),
            Rect::new(0, 0, 2, 3),
        ];
        sort_by_area_desc(&mut rects);
        assert_eq!(
            rects.iter().map(Rect::area).collect::<Vec<_>>(),
            vec![16, 6, 1]
        );
    }

    #[test]
    fn filter_checks_area_and_squareness() {
        let filter = RectFilter {
            min_area: Some(20),
            max_area: Some(200),
            max_squareness: Some(2),
        };
        assert!(filter.accepts(&Rect::new(0, 0, 5, 5)));
        assert!(!filter.accepts(&Rect::new(0, 0, 4, 4)));
        assert!(!filter.accepts(&Rect::new(0, 0, 20, 20)));
        assert!(!filter.accepts(&Rect::new(0, 0, 30, 3)));
        assert!(filter.accepts(&Rect::new(0, 0, 10, 5)));

        let kept = filter.apply(vec![Rect::new(0, 0, 5, 5), Rect::new(0, 0, 1, 1)]);
        assert_eq!(kept, vec![Rect::new(0, 0, 5, 5)]);
        assert!(RectFilter::default().accepts(&Rect::new(0, 0, 1, 100)));
    }
}
