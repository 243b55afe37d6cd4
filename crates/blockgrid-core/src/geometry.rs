#![forbid(unsafe_code)]

//! Pixel-space geometric primitives.
//!
//! All values are CSS-style pixels (`f64`), origin at the top-left of the
//! host viewport. Grid cells live in `blockgrid-layout`; this module never
//! rounds or snaps.

/// A point in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise difference `self - origin`.
    #[inline]
    pub fn delta_from(self, origin: Point) -> (f64, f64) {
        (self.x - origin.x, self.y - origin.y)
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(self, other: Point) -> f64 {
        let (dx, dy) = self.delta_from(other);
        dx.hypot(dy)
    }

    /// Translate by a delta.
    #[inline]
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// An axis-aligned rectangle in pixel space.
///
/// Edges are half-open: `x <= px < right()`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelRect {
    /// Left edge (inclusive).
    pub x: f64,
    /// Top edge (inclusive).
    pub y: f64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl PixelRect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalized rectangle spanning two arbitrary corners.
    ///
    /// Used for rubber-band selection where the pointer may travel up/left of
    /// its origin.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    /// Right edge (exclusive).
    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Top-left corner.
    #[inline]
    pub const fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Check if the rectangle has zero area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Check if a point is inside the rectangle.
    #[inline]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Whether the two rectangles share any area.
    ///
    /// Touching edges do not intersect.
    #[inline]
    pub fn intersects(&self, other: &PixelRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Like [`intersects`](Self::intersects) but with closed edges, so a
    /// zero-width or zero-height rectangle still meets whatever it crosses.
    #[inline]
    pub fn overlaps_closed(&self, other: &PixelRect) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    /// Translate by a delta.
    #[inline]
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Express this rectangle relative to another rectangle's origin.
    #[inline]
    #[must_use]
    pub fn relative_to(&self, origin: Point) -> Self {
        self.translated(-origin.x, -origin.y)
    }
}

/// Sides for padding/margin, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sides {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Sides {
    /// Create new sides with equal values.
    pub const fn all(val: f64) -> Self {
        Self {
            top: val,
            right: val,
            bottom: val,
            left: val,
        }
    }

    /// Create new sides with specific values.
    pub const fn new(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Sum of left and right.
    #[inline]
    pub fn horizontal_sum(&self) -> f64 {
        self.left + self.right
    }

    /// Sum of top and bottom.
    #[inline]
    pub fn vertical_sum(&self) -> f64 {
        self.top + self.bottom
    }
}

impl From<f64> for Sides {
    fn from(val: f64) -> Self {
        Self::all(val)
    }
}

/// The board container as measured by the host surface.
///
/// `bounds` is the border box in viewport pixels; `padding` is subtracted
/// to obtain the content box the grid is laid out in.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContainerBox {
    pub bounds: PixelRect,
    pub padding: Sides,
}

impl ContainerBox {
    /// Create a container box.
    pub const fn new(bounds: PixelRect, padding: Sides) -> Self {
        Self { bounds, padding }
    }

    /// Container anchored at the viewport origin with no padding.
    pub const fn from_size(width: f64, height: f64) -> Self {
        Self::new(PixelRect::new(0.0, 0.0, width, height), Sides::all(0.0))
    }

    /// Content box (bounds minus padding).
    pub fn content(&self) -> PixelRect {
        PixelRect::new(
            self.bounds.x + self.padding.left,
            self.bounds.y + self.padding.top,
            (self.bounds.width - self.padding.horizontal_sum()).max(0.0),
            (self.bounds.height - self.padding.vertical_sum()).max(0.0),
        )
    }

    /// Inner width available to grid columns and gaps.
    #[inline]
    pub fn inner_width(&self) -> f64 {
        self.content().width
    }

    /// Whether a viewport point lies inside the container's border box.
    #[inline]
    pub fn contains(&self, point: Point) -> bool {
        self.bounds.contains(point)
    }

    /// Convert a viewport point into container-relative coordinates.
    #[inline]
    pub fn to_local(&self, point: Point) -> Point {
        Point::new(point.x - self.bounds.x, point.y - self.bounds.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_corners_normalizes() {
        let rect = PixelRect::from_corners(Point::new(50.0, 40.0), Point::new(10.0, 90.0));
        assert_eq!(rect, PixelRect::new(10.0, 40.0, 40.0, 50.0));
    }

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = PixelRect::new(0.0, 0.0, 10.0, 10.0);
        let b = PixelRect::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&PixelRect::new(9.5, 9.5, 1.0, 1.0)));
    }

    #[test]
    fn contains_is_half_open() {
        let rect = PixelRect::new(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(Point::new(0.0, 0.0)));
        assert!(!rect.contains(Point::new(10.0, 5.0)));
    }

    #[test]
    fn container_content_subtracts_padding() {
        let container = ContainerBox::new(
            PixelRect::new(100.0, 50.0, 800.0, 600.0),
            Sides::new(10.0, 20.0, 10.0, 20.0),
        );
        assert_eq!(
            container.content(),
            PixelRect::new(120.0, 60.0, 760.0, 580.0)
        );
        assert_eq!(container.inner_width(), 760.0);
    }

    #[test]
    fn padding_larger_than_bounds_clamps_to_zero() {
        let container = ContainerBox::new(PixelRect::new(0.0, 0.0, 10.0, 10.0), Sides::all(20.0));
        assert_eq!(container.inner_width(), 0.0);
    }

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn degenerate_rect_overlaps_what_it_crosses() {
        let block = PixelRect::new(0.0, 0.0, 60.0, 60.0);
        let line = PixelRect::from_corners(Point::new(0.0, -10.0), Point::new(0.0, 90.0));
        assert!(!line.intersects(&block));
        assert!(line.overlaps_closed(&block));
        let dot = PixelRect::new(64.0, 30.0, 0.0, 0.0);
        assert!(!dot.overlaps_closed(&block));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn rect() -> impl Strategy<Value = PixelRect> {
            (-500.0..500.0f64, -500.0..500.0f64, 0.0..300.0f64, 0.0..300.0f64)
                .prop_map(|(x, y, w, h)| PixelRect::new(x, y, w, h))
        }

        proptest! {
            #[test]
            fn intersection_is_symmetric(a in rect(), b in rect()) {
                prop_assert_eq!(a.intersects(&b), b.intersects(&a));
                prop_assert_eq!(a.overlaps_closed(&b), b.overlaps_closed(&a));
            }

            #[test]
            fn intersecting_implies_closed_overlap(a in rect(), b in rect()) {
                if a.intersects(&b) {
                    prop_assert!(a.overlaps_closed(&b));
                }
            }

            #[test]
            fn contained_point_meets_its_rect(r in rect(), fx in 0.0..1.0f64, fy in 0.0..1.0f64) {
                let point = Point::new(r.x + r.width * fx, r.y + r.height * fy);
                let dot = PixelRect::new(point.x, point.y, 0.0, 0.0);
                prop_assert!(r.overlaps_closed(&dot));
                if r.contains(point) {
                    let tiny = PixelRect::new(point.x, point.y, 1e-6, 1e-6);
                    prop_assert!(r.intersects(&tiny));
                }
            }

            #[test]
            fn from_corners_is_order_independent(
                ax in -500.0..500.0f64, ay in -500.0..500.0f64,
                bx in -500.0..500.0f64, by in -500.0..500.0f64,
            ) {
                let a = Point::new(ax, ay);
                let b = Point::new(bx, by);
                prop_assert_eq!(PixelRect::from_corners(a, b), PixelRect::from_corners(b, a));
            }
        }
    }
}
