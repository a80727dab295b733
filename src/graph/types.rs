//! Canvas item types owned by [`crate::graph::GraphModel`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geom::{Point, Rect, Size, item_rect, point, size};
use crate::llm::ChatMessage;

// ── Ids ───────────────────────────────────────────────────────────────────

/// Stable node identity — allocated from a per-model counter, never reused.
/// Wire formats address nodes by array index instead; ids exist only
/// in memory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub(crate) u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FrameId(pub(crate) u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

// ── Nodes ─────────────────────────────────────────────────────────────────

/// Who authored a message node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Author,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Author => "author",
            Role::Assistant => "assistant",
        }
    }
}

/// One message on the canvas.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub pos: Point,
    pub size: Size,
    pub role: Role,
    pub text: String,
    /// Accumulated conversation up to and including this message.
    pub history: Vec<ChatMessage>,
    pub scroll_value: f64,
    pub parent: Option<NodeId>,
    /// Children in creation order.
    pub children: Vec<NodeId>,
}

impl Node {
    pub const DEFAULT_WIDTH: f64 = 400.0;
    pub const DEFAULT_HEIGHT: f64 = 100.0;

    pub fn default_size() -> Size {
        size(Self::DEFAULT_WIDTH, Self::DEFAULT_HEIGHT)
    }

    pub fn rect(&self) -> Rect {
        item_rect(self.pos, self.size)
    }

    /// Outgoing connection anchor: right edge, vertical center.
    pub fn anchor_out(&self) -> Point {
        point(self.pos.x + self.size.width, self.pos.y + self.size.height / 2.0)
    }

    /// Incoming connection anchor: left edge, vertical center.
    pub fn anchor_in(&self) -> Point {
        point(self.pos.x, self.pos.y + self.size.height / 2.0)
    }
}

// ── Connections ───────────────────────────────────────────────────────────

/// Directed structural edge between a parent and a child node.
///
/// Connections mirror the parent/children relation; pins are the only
/// state a connection owns independently.
#[derive(Debug, Clone)]
pub struct Connection {
    pub start: NodeId,
    pub end: NodeId,
    /// Waypoints in the connection's coordinate space, kept sorted by x.
    pub pins: Vec<Point>,
}

impl Connection {
    pub fn new(start: NodeId, end: NodeId) -> Self {
        Self {
            start,
            end,
            pins: Vec::new(),
        }
    }
}

// ── Frames ────────────────────────────────────────────────────────────────

/// Grouping container owning a subset of nodes.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: FrameId,
    /// Member nodes in grouping order.
    pub members: Vec<NodeId>,
    pub rect: Rect,
    /// Locked frames freeze member positions during `auto_organize`.
    pub locked: bool,
    pub color: String,
    pub header_color: Option<String>,
    pub note: String,
}

impl Frame {
    pub const PADDING: f64 = 30.0;
    pub const DEFAULT_COLOR: &'static str = "#2d2d2d";
    pub const DEFAULT_NOTE: &'static str = "Add note...";
}

// ── Free-floating canvas items ────────────────────────────────────────────

/// Sticky note; not part of the node graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub content: String,
    pub pos: Point,
    pub size: Size,
    pub color: String,
    pub header_color: Option<String>,
}

/// Embedded chart; persisted inside the graph blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub data: serde_json::Value,
    pub pos: Point,
    pub size: Size,
}

/// Named canvas location for quick navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationPin {
    pub title: String,
    pub note: String,
    pub pos: Point,
}

/// Viewport state persisted with the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub zoom_factor: f64,
    pub scroll_position: Point,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom_factor: 1.0,
            scroll_position: point(0.0, 0.0),
        }
    }
}
