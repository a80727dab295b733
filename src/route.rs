//! Connection routing: cubic Bezier chains from a parent's right edge to a
//! child's left edge, threaded through the connection's pins, plus a
//! tolerance-based hit test for pointer interaction.

use crate::config::RouterConfig;
use crate::error::GraphError;
use crate::geom::{Point, dist_to_segment, point};
use crate::graph::{Connection, GraphModel};

/// One cubic Bezier span of a routed connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicSegment {
    pub from: Point,
    pub ctrl1: Point,
    pub ctrl2: Point,
    pub to: Point,
}

impl CubicSegment {
    pub fn eval(&self, t: f64) -> Point {
        let u = 1.0 - t;
        let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
        point(
            a * self.from.x + b * self.ctrl1.x + c * self.ctrl2.x + d * self.to.x,
            a * self.from.y + b * self.ctrl1.y + c * self.ctrl2.y + d * self.to.y,
        )
    }
}

// Polyline resolution for the hit test. Connections are gentle S-curves,
// so a coarse flattening stays well inside the click tolerance.
const HIT_SAMPLES: usize = 24;

#[derive(Debug, Clone)]
pub struct ConnectionRouter {
    config: RouterConfig,
}

impl ConnectionRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Route `conn` between its endpoint nodes' anchors.
    pub fn route(
        &self,
        model: &GraphModel,
        conn: &Connection,
    ) -> Result<Vec<CubicSegment>, GraphError> {
        let start = model
            .node(conn.start)
            .ok_or_else(|| GraphError::NotFound(format!("node {}", conn.start)))?
            .anchor_out();
        let end = model
            .node(conn.end)
            .ok_or_else(|| GraphError::NotFound(format!("node {}", conn.end)))?
            .anchor_in();
        Ok(self.route_points(start, &conn.pins, end))
    }

    /// Build the Bezier chain through `start`, each pin in order, and
    /// `end`. Each span's control points extend horizontally from its
    /// endpoints by half the span's x-distance, capped by the configured
    /// maximum, which keeps short hops tight and long hops from ballooning.
    pub fn route_points(&self, start: Point, pins: &[Point], end: Point) -> Vec<CubicSegment> {
        let mut waypoints = Vec::with_capacity(pins.len() + 2);
        waypoints.push(start);
        waypoints.extend_from_slice(pins);
        waypoints.push(end);

        waypoints
            .windows(2)
            .map(|w| {
                let (from, to) = (w[0], w[1]);
                let finite =
                    from.x.is_finite() && from.y.is_finite() && to.x.is_finite() && to.y.is_finite();
                if !finite {
                    // Degenerate endpoints degrade to a straight span.
                    return CubicSegment {
                        from,
                        ctrl1: from,
                        ctrl2: to,
                        to,
                    };
                }
                let offset = ((to.x - from.x).abs() / 2.0).min(self.config.control_cap);
                CubicSegment {
                    from,
                    ctrl1: point(from.x + offset, from.y),
                    ctrl2: point(to.x - offset, to.y),
                    to,
                }
            })
            .collect()
    }

    /// Polyline length of the routed curve.
    pub fn length(&self, segments: &[CubicSegment]) -> f64 {
        let mut total = 0.0;
        for seg in segments {
            let mut prev = seg.from;
            for i in 1..=HIT_SAMPLES {
                let next = seg.eval(i as f64 / HIT_SAMPLES as f64);
                total += (next - prev).length();
                prev = next;
            }
        }
        total
    }

    /// Point at normalized arc position `t` (clamped to 0..=1) along the
    /// whole chain. `None` for an empty path.
    pub fn point_at(&self, segments: &[CubicSegment], t: f64) -> Option<Point> {
        let first = segments.first()?;
        let total = self.length(segments);
        if total <= f64::EPSILON {
            return Some(first.from);
        }
        let target = total * t.clamp(0.0, 1.0);
        let mut walked = 0.0;
        let mut prev = first.from;
        for seg in segments {
            for i in 1..=HIT_SAMPLES {
                let next = seg.eval(i as f64 / HIT_SAMPLES as f64);
                let step = (next - prev).length();
                if step > 0.0 && walked + step >= target {
                    return Some(prev + (next - prev) * ((target - walked) / step));
                }
                walked += step;
                prev = next;
            }
        }
        Some(prev)
    }

    /// Whether `p` lies within the click tolerance of the routed curve.
    pub fn hit_test(&self, segments: &[CubicSegment], p: Point) -> bool {
        let tol = self.config.click_tolerance;
        for seg in segments {
            let mut prev = seg.from;
            for i in 1..=HIT_SAMPLES {
                let next = seg.eval(i as f64 / HIT_SAMPLES as f64);
                if dist_to_segment(p, prev, next) <= tol {
                    return true;
                }
                prev = next;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::graph::Role;
    use crate::layout::LayoutEngine;

    fn router() -> ConnectionRouter {
        ConnectionRouter::new(RouterConfig::default())
    }

    #[test]
    fn pinless_route_is_one_segment_between_endpoints() {
        let r = router();
        let segs = r.route_points(point(450.0, 200.0), &[], point(800.0, 200.0));
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].eval(0.0), point(450.0, 200.0));
        assert_eq!(segs[0].eval(1.0), point(800.0, 200.0));
        // dx = 350, so the control offset is 175, under the cap.
        assert_eq!(segs[0].ctrl1, point(625.0, 200.0));
        assert_eq!(segs[0].ctrl2, point(625.0, 200.0));
    }

    #[test]
    fn control_offset_is_capped() {
        let r = router();
        let segs = r.route_points(point(0.0, 0.0), &[], point(1000.0, 0.0));
        assert_eq!(segs[0].ctrl1, point(200.0, 0.0));
        assert_eq!(segs[0].ctrl2, point(800.0, 0.0));
    }

    #[test]
    fn pins_split_the_route() {
        let r = router();
        let pins = [point(300.0, 50.0), point(600.0, -50.0)];
        let segs = r.route_points(point(0.0, 0.0), &pins, point(900.0, 0.0));
        assert_eq!(segs.len(), 3);
        // The chain passes through each pin.
        assert_eq!(segs[0].to, pins[0]);
        assert_eq!(segs[1].from, pins[0]);
        assert_eq!(segs[1].to, pins[1]);
        assert_eq!(segs[2].from, pins[1]);
    }

    #[test]
    fn hit_test_respects_tolerance() {
        let r = router();
        let segs = r.route_points(point(0.0, 100.0), &[], point(400.0, 100.0));
        // A horizontal span with equal y stays on the straight line.
        assert!(r.hit_test(&segs, point(200.0, 100.0)));
        assert!(r.hit_test(&segs, point(200.0, 119.0)));
        assert!(!r.hit_test(&segs, point(200.0, 125.0)));
        assert!(!r.hit_test(&segs, point(200.0, 300.0)));
    }

    #[test]
    fn length_and_point_at_on_a_straight_span() {
        let r = router();
        let segs = r.route_points(point(0.0, 100.0), &[], point(400.0, 100.0));
        let len = r.length(&segs);
        assert!((len - 400.0).abs() < 1.0, "length was {len}");

        let mid = r.point_at(&segs, 0.5).unwrap();
        assert!((mid.x - 200.0).abs() < 1.0);
        assert!((mid.y - 100.0).abs() < 1e-6);

        assert_eq!(r.point_at(&segs, -1.0).unwrap(), point(0.0, 100.0));
        assert!(r.point_at(&[], 0.5).is_none());
    }

    #[test]
    fn non_finite_endpoint_degrades_to_straight_segment() {
        let r = router();
        let segs = r.route_points(point(0.0, 0.0), &[], point(f64::NAN, 10.0));
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].ctrl1, segs[0].from);
    }

    #[test]
    fn route_uses_node_anchors() {
        let layout = LayoutEngine::new(LayoutConfig::default());
        let mut model = GraphModel::new();
        let a = model.add_node("a", Role::Author, None, &layout).unwrap();
        let b = model.add_node("b", Role::Assistant, Some(a), &layout).unwrap();

        let r = router();
        let conn = model.connection_between(a, b).unwrap();
        let segs = r.route(&model, conn).unwrap();
        assert_eq!(segs.first().unwrap().from, model.node(a).unwrap().anchor_out());
        assert_eq!(segs.last().unwrap().to, model.node(b).unwrap().anchor_in());
    }

    #[test]
    fn route_with_dangling_endpoint_is_not_found() {
        let model = GraphModel::new();
        let conn = Connection::new(crate::graph::NodeId(0), crate::graph::NodeId(1));
        assert!(matches!(
            router().route(&model, &conn),
            Err(GraphError::NotFound(_))
        ));
    }
}
