//! Automatic placement: spiral collision-avoiding search for single nodes
//! and the whole-canvas `auto_organize` pass.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::config::LayoutConfig;
use crate::geom::{Point, Rect, Size, item_rect, padded, point, vector};
use crate::graph::{GraphModel, NodeId};

#[derive(Debug, Clone)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Where the first root lands on an empty canvas.
    pub fn origin(&self) -> Point {
        point(self.config.start_x, self.config.start_y)
    }

    /// Find a collision-free top-left position for an `item`-sized box,
    /// starting at `base` and spiraling outward (right, down, left, up,
    /// with leg length growing each layer). Horizontal steps are half the
    /// horizontal spacing; vertical steps are the full vertical spacing.
    ///
    /// The search is bounded by `max_attempts`; on exhaustion the item is
    /// stacked below `base`, offset by one vertical step per existing node
    /// (`node_count`), so repeated fallbacks do not pile onto the same spot.
    pub fn find_free_position(
        &self,
        base: Point,
        item: Size,
        obstacles: &[Rect],
        node_count: usize,
        max_attempts: usize,
    ) -> Point {
        let pad = self.config.collision_padding;
        let free = |pos: Point| {
            let candidate = padded(&item_rect(pos, item), pad);
            !obstacles.iter().any(|o| candidate.intersects(o))
        };

        if free(base) {
            return base;
        }

        let legs = [
            vector(self.config.horizontal_spacing / 2.0, 0.0),
            vector(0.0, self.config.vertical_spacing),
            vector(-self.config.horizontal_spacing / 2.0, 0.0),
            vector(0.0, -self.config.vertical_spacing),
        ];

        let mut pos = base;
        let mut attempts = 0usize;
        let mut layer = 1usize;
        'search: while attempts < max_attempts {
            for step in legs {
                for _ in 0..layer {
                    if attempts >= max_attempts {
                        break 'search;
                    }
                    pos += step;
                    attempts += 1;
                    if free(pos) {
                        return pos;
                    }
                }
            }
            layer += 1;
        }

        warn!(attempts, "spiral search exhausted, stacking below base");
        base + vector(0.0, node_count as f64 * self.config.vertical_spacing)
    }

    /// Re-place every node tree by tree: roots in creation order, each
    /// depth one level gap further right, siblings stacked top to bottom.
    ///
    /// Members of locked frames keep their positions and their frames act
    /// as obstacles; the whole free layout starts to the right of the
    /// rightmost locked frame. Unlocked frames are re-fitted around their
    /// members afterwards.
    pub fn auto_organize(&self, model: &mut GraphModel) {
        let frozen: HashSet<NodeId> = model
            .frames()
            .filter(|f| f.locked)
            .flat_map(|f| f.members.iter().copied())
            .collect();

        let mut obstacles: Vec<Rect> = Vec::new();
        let mut origin_x = self.config.start_x;
        for frame in model.frames().filter(|f| f.locked) {
            obstacles.push(padded(&frame.rect, self.config.frame_clearance));
            origin_x = origin_x.max(frame.rect.max_x() + self.config.frame_clearance);
        }

        let roots = model.roots();
        debug!(
            roots = roots.len(),
            frozen = frozen.len(),
            origin_x,
            "organizing canvas"
        );

        let mut cursor_y = self.config.start_y;
        for root in roots {
            cursor_y = self.place_subtree(model, root, origin_x, cursor_y, 0, &frozen, &mut obstacles);
        }

        model.refresh_unlocked_frame_rects();
    }

    /// Place `id` and its subtree; returns the y where the next sibling
    /// subtree may start.
    fn place_subtree(
        &self,
        model: &mut GraphModel,
        id: NodeId,
        origin_x: f64,
        y: f64,
        depth: usize,
        frozen: &HashSet<NodeId>,
        obstacles: &mut Vec<Rect>,
    ) -> f64 {
        let Some((item, children)) = model.node(id).map(|n| (n.size, n.children.clone())) else {
            return y;
        };

        let mut next_y = y;
        if !frozen.contains(&id) {
            let base = point(origin_x + depth as f64 * self.config.level_gap_x, y);
            let pos = self.find_free_position(
                base,
                item,
                obstacles,
                model.node_count(),
                self.config.max_attempts,
            );
            if let Err(e) = model.move_node(id, pos) {
                warn!(node = %id, error = %e, "skipping unplaceable node");
            } else {
                obstacles.push(padded(
                    &item_rect(pos, item),
                    self.config.organize_padding,
                ));
                next_y = pos.y + item.height + self.config.min_gap_y;
            }
        }

        let mut child_y = y;
        for ch in children {
            child_y = self.place_subtree(model, ch, origin_x, child_y, depth + 1, frozen, obstacles);
        }
        next_y.max(child_y)
    }
}
