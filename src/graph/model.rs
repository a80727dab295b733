//! `GraphModel` — canonical store of nodes, connections, frames, and
//! free-floating canvas items.
//!
//! Single-writer: all mutation happens through `&mut self`, synchronously,
//! with no I/O. Every mutating operation validates its preconditions before
//! touching anything, so a failed call leaves the model unchanged.
//!
//! Connections are a materialized view of the parent/children relation:
//! for every parent/child pair there is exactly one connection, and pins
//! are the only state a connection owns independently. `validate()`
//! enforces this rule after structural mutations.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use crate::error::GraphError;
use crate::geom::{Point, Rect, vector};
use crate::layout::LayoutEngine;
use crate::llm::ChatMessage;

use super::types::{
    Chart, Connection, Frame, FrameId, NavigationPin, Node, NodeId, Note, Role, ViewState,
};

#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    nodes: BTreeMap<NodeId, Node>,
    connections: Vec<Connection>,
    frames: BTreeMap<FrameId, Frame>,
    notes: Vec<Note>,
    charts: Vec<Chart>,
    navigation_pins: Vec<NavigationPin>,
    view_state: ViewState,
    next_node: u64,
    next_frame: u64,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Node lifecycle ────────────────────────────────────────────────

    /// Create a node placed near its parent (or at the layout origin for
    /// roots) and, when a parent is given, the parent→child connection.
    pub fn add_node(
        &mut self,
        text: &str,
        role: Role,
        parent: Option<NodeId>,
        layout: &LayoutEngine,
    ) -> Result<NodeId, GraphError> {
        self.add_node_with_history(text, role, parent, Vec::new(), layout)
    }

    /// [`GraphModel::add_node`] carrying an explicit conversation-history
    /// slice (message append paths build it from the parent's history).
    pub fn add_node_with_history(
        &mut self,
        text: &str,
        role: Role,
        parent: Option<NodeId>,
        history: Vec<ChatMessage>,
        layout: &LayoutEngine,
    ) -> Result<NodeId, GraphError> {
        let base = match parent {
            Some(pid) => {
                let p = self
                    .nodes
                    .get(&pid)
                    .ok_or_else(|| GraphError::NotFound(format!("parent node {pid}")))?;
                p.pos + vector(layout.config().horizontal_spacing, 0.0)
            }
            None => layout.origin(),
        };

        let obstacles = self.obstacle_rects(None);
        let pos = layout.find_free_position(
            base,
            Node::default_size(),
            &obstacles,
            self.nodes.len(),
            layout.config().max_attempts,
        );

        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(
            id,
            Node {
                id,
                pos,
                size: Node::default_size(),
                role,
                text: text.to_string(),
                history,
                scroll_value: 0.0,
                parent,
                children: Vec::new(),
            },
        );

        if let Some(pid) = parent {
            if let Some(p) = self.nodes.get_mut(&pid) {
                p.children.push(id);
            }
            self.connections.push(Connection::new(pid, id));
        }

        debug!(node = %id, role = role.as_str(), parent = ?parent, "added node");
        Ok(id)
    }

    /// Remove a node: its children are reparented to the removed node's
    /// parent (or become roots), replacement connections are created, and
    /// every connection touching the node is dropped along with its pins.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&id) {
            return Err(GraphError::NotFound(format!("node {id}")));
        }
        let (parent, children) = {
            let n = &self.nodes[&id];
            (n.parent, n.children.clone())
        };

        // Frame membership first; emptied frames dissolve.
        for frame in self.frames.values_mut() {
            frame.members.retain(|m| *m != id);
        }
        self.frames.retain(|fid, f| {
            if f.members.is_empty() {
                debug!(frame = %fid, "dissolving emptied frame");
                false
            } else {
                true
            }
        });

        match parent {
            Some(pid) => {
                if let Some(p) = self.nodes.get_mut(&pid) {
                    p.children.retain(|c| *c != id);
                }
                for &ch in &children {
                    if let Some(c) = self.nodes.get_mut(&ch) {
                        c.parent = Some(pid);
                    }
                    if let Some(p) = self.nodes.get_mut(&pid) {
                        if !p.children.contains(&ch) {
                            p.children.push(ch);
                        }
                    }
                    self.connections.push(Connection::new(pid, ch));
                }
            }
            None => {
                for &ch in &children {
                    if let Some(c) = self.nodes.get_mut(&ch) {
                        c.parent = None;
                    }
                }
            }
        }

        let before = self.connections.len();
        self.connections.retain(|c| c.start != id && c.end != id);
        debug!(
            node = %id,
            reparented = children.len(),
            dropped = before - self.connections.len(),
            "removed node"
        );

        self.nodes.remove(&id);
        self.validate();
        Ok(())
    }

    pub fn move_node(&mut self, id: NodeId, pos: Point) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| GraphError::NotFound(format!("node {id}")))?;
        node.pos = pos;
        Ok(())
    }

    pub fn set_scroll(&mut self, id: NodeId, value: f64) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| GraphError::NotFound(format!("node {id}")))?;
        node.scroll_value = value;
        Ok(())
    }

    // ── Frames ────────────────────────────────────────────────────────

    /// Group nodes into a new (locked) frame. A node owned by another
    /// frame is first removed from it; frames emptied that way dissolve.
    pub fn create_frame(&mut self, members: &[NodeId]) -> Result<FrameId, GraphError> {
        if members.is_empty() {
            return Err(GraphError::Validation(
                "a frame needs at least one member".into(),
            ));
        }
        for m in members {
            if !self.nodes.contains_key(m) {
                return Err(GraphError::NotFound(format!("node {m}")));
            }
        }

        let mut uniq: Vec<NodeId> = Vec::new();
        for &m in members {
            if !uniq.contains(&m) {
                uniq.push(m);
            }
        }

        for frame in self.frames.values_mut() {
            frame.members.retain(|m| !uniq.contains(m));
        }
        self.frames.retain(|fid, f| {
            if f.members.is_empty() {
                debug!(frame = %fid, "dissolving frame emptied by regrouping");
                false
            } else {
                true
            }
        });

        // Members exist (checked above), so the bounds are always present.
        let rect = self
            .member_bounds(&uniq)
            .ok_or_else(|| GraphError::Validation("frame members vanished".into()))?;

        let id = FrameId(self.next_frame);
        self.next_frame += 1;
        self.frames.insert(
            id,
            Frame {
                id,
                members: uniq,
                rect,
                locked: true,
                color: Frame::DEFAULT_COLOR.to_string(),
                header_color: None,
                note: Frame::DEFAULT_NOTE.to_string(),
            },
        );
        debug!(frame = %id, "created frame");
        Ok(id)
    }

    pub fn dissolve_frame(&mut self, id: FrameId) -> Result<(), GraphError> {
        self.frames
            .remove(&id)
            .map(|_| debug!(frame = %id, "dissolved frame"))
            .ok_or_else(|| GraphError::NotFound(format!("frame {id}")))
    }

    pub fn set_frame_locked(&mut self, id: FrameId, locked: bool) -> Result<(), GraphError> {
        let frame = self
            .frames
            .get_mut(&id)
            .ok_or_else(|| GraphError::NotFound(format!("frame {id}")))?;
        frame.locked = locked;
        Ok(())
    }

    /// Recompute the rects of unlocked frames from their members' current
    /// positions. Locked frames keep their stored rect.
    pub fn refresh_unlocked_frame_rects(&mut self) {
        let updates: Vec<(FrameId, Rect)> = self
            .frames
            .values()
            .filter(|f| !f.locked)
            .filter_map(|f| self.member_bounds(&f.members).map(|r| (f.id, r)))
            .collect();
        for (id, rect) in updates {
            if let Some(f) = self.frames.get_mut(&id) {
                f.rect = rect;
            }
        }
    }

    fn member_bounds(&self, members: &[NodeId]) -> Option<Rect> {
        let mut bounds: Option<Rect> = None;
        for m in members {
            let r = self.nodes.get(m)?.rect();
            bounds = Some(match bounds {
                Some(b) => b.union(&r),
                None => r,
            });
        }
        bounds.map(|b| b.inflate(Frame::PADDING, Frame::PADDING))
    }

    // ── Connection pins ───────────────────────────────────────────────

    /// Add a waypoint to the start→end connection, keeping pins ordered
    /// by x-coordinate.
    pub fn add_pin(&mut self, start: NodeId, end: NodeId, at: Point) -> Result<(), GraphError> {
        let conn = self
            .connections
            .iter_mut()
            .find(|c| c.start == start && c.end == end)
            .ok_or_else(|| GraphError::NotFound(format!("connection {start}->{end}")))?;
        conn.pins.push(at);
        conn.pins.sort_by(|a, b| a.x.total_cmp(&b.x));
        Ok(())
    }

    pub fn remove_pin(
        &mut self,
        start: NodeId,
        end: NodeId,
        index: usize,
    ) -> Result<Point, GraphError> {
        let conn = self
            .connections
            .iter_mut()
            .find(|c| c.start == start && c.end == end)
            .ok_or_else(|| GraphError::NotFound(format!("connection {start}->{end}")))?;
        if index >= conn.pins.len() {
            return Err(GraphError::NotFound(format!(
                "pin {index} on connection {start}->{end}"
            )));
        }
        Ok(conn.pins.remove(index))
    }

    // ── Validation ────────────────────────────────────────────────────

    /// Restore the canonical rule after a structural mutation:
    /// - parent/children links must be mutually consistent and refer to
    ///   live nodes;
    /// - every connection mirrors a live parent→child edge, exactly once;
    /// - every parent→child edge has a connection (missing ones are
    ///   materialized without pins).
    pub fn validate(&mut self) {
        let existing: HashSet<NodeId> = self.nodes.keys().copied().collect();

        // Repair node links that reference dead or disagreeing nodes.
        let ids: Vec<NodeId> = existing.iter().copied().collect();
        for id in &ids {
            if let Some(node) = self.nodes.get_mut(id) {
                node.children.retain(|c| existing.contains(c) && c != id);
                if let Some(p) = node.parent {
                    if !existing.contains(&p) {
                        warn!(node = %id, parent = %p, "clearing dangling parent link");
                        node.parent = None;
                    }
                }
            }
        }
        let mut stale: Vec<(NodeId, NodeId)> = Vec::new();
        for (id, node) in &self.nodes {
            for &ch in &node.children {
                let agrees = self
                    .nodes
                    .get(&ch)
                    .is_some_and(|c| c.parent == Some(*id));
                if !agrees {
                    stale.push((*id, ch));
                }
            }
        }
        for (p, ch) in stale {
            warn!(parent = %p, child = %ch, "dropping child link without matching parent");
            if let Some(n) = self.nodes.get_mut(&p) {
                n.children.retain(|c| *c != ch);
            }
        }

        // Connections: drop dangling, mismatched, and duplicate edges.
        let nodes = &self.nodes;
        let mut seen: HashSet<(NodeId, NodeId)> = HashSet::new();
        self.connections.retain(|c| {
            let mirrors_edge = nodes
                .get(&c.end)
                .is_some_and(|end| end.parent == Some(c.start))
                && nodes.contains_key(&c.start);
            if !mirrors_edge {
                warn!(start = %c.start, end = %c.end, "dropping invalid connection");
                return false;
            }
            if !seen.insert((c.start, c.end)) {
                warn!(start = %c.start, end = %c.end, "dropping duplicate connection");
                return false;
            }
            true
        });

        // Materialize edges that lost their connection.
        let mut missing: Vec<(NodeId, NodeId)> = Vec::new();
        for (id, node) in &self.nodes {
            for &ch in &node.children {
                if !seen.contains(&(*id, ch)) {
                    missing.push((*id, ch));
                }
            }
        }
        for (s, e) in missing {
            debug!(start = %s, end = %e, "materializing missing connection");
            seen.insert((s, e));
            self.connections.push(Connection::new(s, e));
        }
    }

    // ── Read API ──────────────────────────────────────────────────────

    /// All nodes in creation order (ids ascend with creation).
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection_between(&self, start: NodeId, end: NodeId) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.start == start && c.end == end)
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.values()
    }

    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(&id)
    }

    pub fn frame_of(&self, node: NodeId) -> Option<FrameId> {
        self.frames
            .values()
            .find(|f| f.members.contains(&node))
            .map(|f| f.id)
    }

    /// Parentless nodes in creation order — the roots of the layout trees.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.parent.is_none())
            .map(|n| n.id)
            .collect()
    }

    /// Bounding boxes of everything placement must avoid: every node
    /// (minus `exclude`) and every frame.
    pub fn obstacle_rects(&self, exclude: Option<NodeId>) -> Vec<Rect> {
        let mut rects: Vec<Rect> = self
            .nodes
            .values()
            .filter(|n| Some(n.id) != exclude)
            .map(|n| n.rect())
            .collect();
        rects.extend(self.frames.values().map(|f| f.rect));
        rects
    }

    // ── Free-floating items & view state ──────────────────────────────

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn add_note(&mut self, note: Note) {
        self.notes.push(note);
    }

    pub fn set_notes(&mut self, notes: Vec<Note>) {
        self.notes = notes;
    }

    pub fn charts(&self) -> &[Chart] {
        &self.charts
    }

    pub fn add_chart(&mut self, chart: Chart) {
        self.charts.push(chart);
    }

    pub fn navigation_pins(&self) -> &[NavigationPin] {
        &self.navigation_pins
    }

    pub fn add_navigation_pin(&mut self, pin: NavigationPin) {
        self.navigation_pins.push(pin);
    }

    pub fn set_navigation_pins(&mut self, pins: Vec<NavigationPin>) {
        self.navigation_pins = pins;
    }

    pub fn view_state(&self) -> &ViewState {
        &self.view_state
    }

    pub fn set_view_state(&mut self, state: ViewState) {
        self.view_state = state;
    }

    // ── Restore hooks (codec) ─────────────────────────────────────────
    //
    // Deserialization rebuilds a model in passes that temporarily bypass
    // the materialized-view rule; `validate()` runs as the final pass.

    pub(crate) fn insert_restored_node(
        &mut self,
        text: String,
        role: Role,
        pos: Point,
        history: Vec<ChatMessage>,
        scroll_value: f64,
    ) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(
            id,
            Node {
                id,
                pos,
                size: Node::default_size(),
                role,
                text,
                history,
                scroll_value,
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    pub(crate) fn link_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        if parent == child {
            return Err(GraphError::Validation(format!("node {parent} cannot parent itself")));
        }
        match self.nodes.get(&child) {
            Some(c) if c.parent.is_some() && c.parent != Some(parent) => {
                return Err(GraphError::Validation(format!(
                    "node {child} has more than one parent"
                )));
            }
            Some(_) => {}
            None => return Err(GraphError::NotFound(format!("node {child}"))),
        }
        if !self.nodes.contains_key(&parent) {
            return Err(GraphError::NotFound(format!("node {parent}")));
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
        if let Some(p) = self.nodes.get_mut(&parent) {
            if !p.children.contains(&child) {
                p.children.push(child);
            }
        }
        Ok(())
    }

    /// Returns `false` when a start→end connection already exists
    /// (the load path de-duplicates instead of erroring).
    pub(crate) fn push_restored_connection(&mut self, start: NodeId, end: NodeId) -> bool {
        if self.connection_between(start, end).is_some() {
            return false;
        }
        self.connections.push(Connection::new(start, end));
        true
    }

    pub(crate) fn attach_pins(&mut self, start: NodeId, end: NodeId, pins: Vec<Point>) {
        if let Some(conn) = self
            .connections
            .iter_mut()
            .find(|c| c.start == start && c.end == end)
        {
            conn.pins = pins;
            conn.pins.sort_by(|a, b| a.x.total_cmp(&b.x));
        }
    }

    /// Returns `None` when no members survive de-duplication; frames are
    /// never empty, so such records are skipped rather than inserted.
    pub(crate) fn insert_restored_frame(
        &mut self,
        members: Vec<NodeId>,
        rect: Rect,
        locked: bool,
        color: String,
        header_color: Option<String>,
        note: String,
    ) -> Option<FrameId> {
        let mut uniq: Vec<NodeId> = Vec::new();
        for m in members {
            if self.frame_of(m).is_some() {
                warn!(node = %m, "node already framed, skipping duplicate membership");
                continue;
            }
            if !uniq.contains(&m) {
                uniq.push(m);
            }
        }
        if uniq.is_empty() {
            warn!("skipping frame record with no members");
            return None;
        }
        let id = FrameId(self.next_frame);
        self.next_frame += 1;
        self.frames.insert(
            id,
            Frame {
                id,
                members: uniq,
                rect,
                locked,
                color,
                header_color,
                note,
            },
        );
        Some(id)
    }
}
