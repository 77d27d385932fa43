//! Canvas geometry: points, bounds, the pan/zoom view transform, and the
//! point-to-segment distance used by eraser hit-testing.
//!
//! Two coordinate systems are in play. **Screen space** is what pointer
//! events report. **Canvas space** is where item positions are stored.
//! `ViewTransform` maps between them:
//!
//! ```text
//! canvas = (screen - offset) / scale
//! screen = canvas * scale + offset
//! ```

use serde::{Deserialize, Serialize};

/// Smallest permitted zoom factor. Scale never reaches zero.
pub const MIN_SCALE: f64 = 0.1;

/// Largest permitted zoom factor.
pub const MAX_SCALE: f64 = 5.0;

/// A point in either screen or canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    #[must_use]
    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Axis-aligned rectangle in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    /// AABB overlap. Rectangles that only share an edge count as touching.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.x <= other.x + other.width
            && self.x + self.width >= other.x
            && self.y <= other.y + other.height
            && self.y + self.height >= other.y
    }

    /// Min/max box over `points`, with `pad` added to width and height so
    /// round stroke caps are not clipped. `None` for an empty slice.
    pub fn enclosing(points: &[Point], pad: f64) -> Option<Bounds> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Bounds::new(min_x, min_y, max_x - min_x + pad, max_y - min_y + pad))
    }
}

/// Pan/zoom state of the active canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    scale: f64,
    offset: Point,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self { scale: 1.0, offset: Point::default() }
    }
}

impl ViewTransform {
    /// Build a transform, clamping `scale` into `[MIN_SCALE, MAX_SCALE]`.
    /// Non-finite inputs fall back to the identity components.
    #[must_use]
    pub fn new(scale: f64, offset: Point) -> Self {
        let mut view = Self::default();
        view.set_scale(scale);
        if offset.is_finite() {
            view.offset = offset;
        }
        view
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    /// Set the zoom factor without recentring. NaN/∞ are ignored.
    pub fn set_scale(&mut self, scale: f64) {
        if scale.is_finite() {
            self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        } else {
            log::warn!("ignoring non-finite scale {scale}");
        }
    }

    #[must_use]
    pub fn screen_to_canvas(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.offset.x) / self.scale,
            (screen.y - self.offset.y) / self.scale,
        )
    }

    #[must_use]
    pub fn canvas_to_screen(&self, canvas: Point) -> Point {
        Point::new(
            canvas.x * self.scale + self.offset.x,
            canvas.y * self.scale + self.offset.y,
        )
    }

    /// Convert a screen-space delta (pixels) to a canvas-space delta.
    #[must_use]
    pub fn screen_delta_to_canvas(&self, delta: Point) -> Point {
        Point::new(delta.x / self.scale, delta.y / self.scale)
    }

    /// Zoom to `new_scale` keeping the canvas point under `cursor` fixed:
    /// `offset' = cursor - (cursor - offset) * (s1 / s0)`.
    ///
    /// `cursor` is relative to the canvas origin on screen.
    pub fn zoom_at(&mut self, cursor: Point, new_scale: f64) {
        if !cursor.is_finite() || !new_scale.is_finite() {
            log::warn!("ignoring zoom at {cursor:?} to {new_scale}");
            return;
        }
        let s0 = self.scale;
        let s1 = new_scale.clamp(MIN_SCALE, MAX_SCALE);
        let ratio = s1 / s0;
        self.offset = Point::new(
            cursor.x - (cursor.x - self.offset.x) * ratio,
            cursor.y - (cursor.y - self.offset.y) * ratio,
        );
        self.scale = s1;
    }

    /// Multiply the current scale by `factor`, recentred on `cursor`.
    pub fn zoom_by(&mut self, cursor: Point, factor: f64) {
        self.zoom_at(cursor, self.scale * factor);
    }

    /// Unmodified wheel/trackpad scroll: `offset' = offset - delta`.
    pub fn pan_by_wheel(&mut self, delta: Point) {
        if delta.is_finite() {
            self.offset = self.offset - delta;
        }
    }

    /// Move the view by a screen-space translation.
    pub fn pan_by(&mut self, delta: Point) {
        if delta.is_finite() {
            self.offset = self.offset + delta;
        }
    }
}

/// Euclidean distance from `p` to the segment `a`–`b`.
///
/// Projects `p` onto the infinite line through `a` and `b`, clamps the
/// projection parameter to `[0, 1]`, and measures to the clamped point.
/// A degenerate segment (`a == b`) is treated as the point `a`.
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * abx, a.y + t * aby))
}

/// True if any consecutive point pair of `points` lies within `threshold`
/// of `p` (inclusive). A single point is tested as a zero-length segment.
pub fn polyline_within(points: &[Point], p: Point, threshold: f64) -> bool {
    match points {
        [] => false,
        [only] => p.distance(*only) <= threshold,
        _ => points
            .windows(2)
            .any(|pair| point_segment_distance(p, pair[0], pair[1]) <= threshold),
    }
}
