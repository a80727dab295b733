//! Canvas geometry — `f64` scene coordinates with no implicit unit.

pub type Unit = euclid::UnknownUnit;

pub type Point = euclid::Point2D<f64, Unit>;
pub type Vector = euclid::Vector2D<f64, Unit>;
pub type Size = euclid::Size2D<f64, Unit>;
pub type Rect = euclid::Rect<f64, Unit>;

pub fn point(x: f64, y: f64) -> Point {
    euclid::point2(x, y)
}

pub fn vector(x: f64, y: f64) -> Vector {
    euclid::vec2(x, y)
}

pub fn size(w: f64, h: f64) -> Size {
    euclid::size2(w, h)
}

pub fn rect(x: f64, y: f64, w: f64, h: f64) -> Rect {
    Rect::new(point(x, y), size(w, h))
}

/// Bounding box of an item whose top-left corner sits at `pos`.
pub fn item_rect(pos: Point, item: Size) -> Rect {
    Rect::new(pos, item)
}

/// `r` grown by `pad` on every side. Collision checks run on padded boxes
/// so items keep a visible gap, not just non-overlap.
pub fn padded(r: &Rect, pad: f64) -> Rect {
    r.inflate(pad, pad)
}

/// Distance from `p` to the segment `a`..`b`.
pub fn dist_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.square_length();
    if len_sq <= f64::EPSILON {
        return (p - a).length();
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).length()
}
