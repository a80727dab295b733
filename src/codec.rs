//! Graph blob (de)serialization.
//!
//! The wire format addresses nodes by their position in the `nodes` array,
//! not by id — ids are an in-memory concern and never persisted. Points and
//! sizes serialize as `[x, y]` pairs.
//!
//! Decoding is strict and atomic: it rebuilds a fresh [`GraphModel`] in
//! passes (nodes, child links, connections and pins, frames, then a final
//! validation) and any out-of-range index or malformed structure fails the
//! whole decode, leaving the caller's model untouched.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GraphError;
use crate::geom::{Point, Rect, Size};
use crate::graph::{Chart, GraphModel, NodeId, Role, ViewState};
use crate::llm::ChatMessage;

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct GraphRecord {
    #[serde(default)]
    nodes: Vec<NodeRecord>,
    #[serde(default)]
    connections: Vec<ConnectionRecord>,
    #[serde(default)]
    frames: Vec<FrameRecord>,
    #[serde(default)]
    charts: Vec<Chart>,
    #[serde(default)]
    view_state: ViewState,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    pos: Point,
    role: Role,
    text: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
    #[serde(default)]
    scroll_value: f64,
    /// Child array indices, in the node's child order. Parent links are
    /// derived from these on decode; order is part of the contract.
    #[serde(default)]
    children: Vec<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConnectionRecord {
    start: usize,
    end: usize,
    #[serde(default)]
    pins: Vec<Point>,
}

fn default_locked() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
struct FrameRecord {
    members: Vec<usize>,
    pos: Point,
    size: Size,
    #[serde(default = "default_locked")]
    locked: bool,
    color: String,
    #[serde(default)]
    header_color: Option<String>,
    note: String,
}

// ── Encode ────────────────────────────────────────────────────────────────

/// Serialize a model to its JSON blob.
pub fn encode(model: &GraphModel) -> Result<String, GraphError> {
    let index: HashMap<NodeId, usize> = model
        .nodes()
        .enumerate()
        .map(|(i, n)| (n.id, i))
        .collect();

    let nodes = model
        .nodes()
        .map(|n| NodeRecord {
            pos: n.pos,
            role: n.role,
            text: n.text.clone(),
            history: n.history.clone(),
            scroll_value: n.scroll_value,
            children: n.children.iter().map(|c| index[c]).collect(),
        })
        .collect();

    let connections = model
        .connections()
        .iter()
        .map(|c| ConnectionRecord {
            start: index[&c.start],
            end: index[&c.end],
            pins: c.pins.clone(),
        })
        .collect();

    let frames = model
        .frames()
        .map(|f| FrameRecord {
            members: f.members.iter().map(|m| index[m]).collect(),
            pos: f.rect.origin,
            size: f.rect.size,
            locked: f.locked,
            color: f.color.clone(),
            header_color: f.header_color.clone(),
            note: f.note.clone(),
        })
        .collect();

    let record = GraphRecord {
        nodes,
        connections,
        frames,
        charts: model.charts().to_vec(),
        view_state: model.view_state().clone(),
    };

    serde_json::to_string(&record)
        .map_err(|e| GraphError::Codec(format!("cannot serialize graph: {e}")))
}

// ── Decode ────────────────────────────────────────────────────────────────

/// Rebuild a model from its JSON blob. Returns a fresh model only when the
/// whole record decodes cleanly.
pub fn decode(text: &str) -> Result<GraphModel, GraphError> {
    let record: GraphRecord = serde_json::from_str(text)
        .map_err(|e| GraphError::Codec(format!("malformed graph blob: {e}")))?;

    let mut model = GraphModel::new();

    // Pass 1: nodes, in array order.
    let ids: Vec<NodeId> = record
        .nodes
        .iter()
        .map(|n| {
            model.insert_restored_node(
                n.text.clone(),
                n.role,
                n.pos,
                n.history.clone(),
                n.scroll_value,
            )
        })
        .collect();

    let resolve = |what: &str, i: usize| -> Result<NodeId, GraphError> {
        ids.get(i)
            .copied()
            .ok_or_else(|| GraphError::Codec(format!("{what} index {i} out of range")))
    };

    // Pass 2: child links, in each record's stored order.
    for (i, n) in record.nodes.iter().enumerate() {
        for &ch in &n.children {
            let child = resolve("child", ch)?;
            model
                .link_child(ids[i], child)
                .map_err(|e| GraphError::Codec(format!("node {i}: {e}")))?;
        }
    }

    // Pass 3: connections with their pins. Duplicates are dropped here;
    // edges that mirror no parent link fall to the final validation.
    for c in &record.connections {
        let start = resolve("connection", c.start)?;
        let end = resolve("connection", c.end)?;
        if !model.push_restored_connection(start, end) {
            warn!(start = c.start, end = c.end, "skipping duplicate connection record");
            continue;
        }
        model.attach_pins(start, end, c.pins.clone());
    }

    // Pass 4: frames.
    for f in &record.frames {
        let members = f
            .members
            .iter()
            .map(|&m| resolve("frame member", m))
            .collect::<Result<Vec<_>, _>>()?;
        model.insert_restored_frame(
            members,
            Rect::new(f.pos, f.size),
            f.locked,
            f.color.clone(),
            f.header_color.clone(),
            f.note.clone(),
        );
    }

    for chart in record.charts {
        model.add_chart(chart);
    }
    model.set_view_state(record.view_state);

    // Pass 5: restore the materialized-view rule.
    model.validate();

    debug!(
        nodes = model.node_count(),
        connections = model.connections().len(),
        "decoded graph blob"
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::geom::point;
    use crate::layout::LayoutEngine;

    fn sample_model() -> GraphModel {
        let layout = LayoutEngine::new(LayoutConfig::default());
        let mut model = GraphModel::new();
        let a = model.add_node("root", Role::Author, None, &layout).unwrap();
        let b = model
            .add_node_with_history(
                "reply",
                Role::Assistant,
                Some(a),
                vec![ChatMessage::user("root"), ChatMessage::assistant("reply")],
                &layout,
            )
            .unwrap();
        let _c = model.add_node("branch", Role::Author, Some(a), &layout).unwrap();
        model.add_pin(a, b, point(500.0, 220.0)).unwrap();
        model.create_frame(&[a, b]).unwrap();
        model.set_scroll(b, 0.4).unwrap();
        model.add_chart(Chart {
            data: serde_json::json!({"kind": "bar", "values": [1, 2, 3]}),
            pos: point(900.0, 50.0),
            size: crate::geom::size(200.0, 150.0),
        });
        model.set_view_state(ViewState {
            zoom_factor: 1.5,
            scroll_position: point(-40.0, 12.0),
        });
        model
    }

    #[test]
    fn round_trip_preserves_structure() {
        let model = sample_model();
        let blob = encode(&model).unwrap();
        let restored = decode(&blob).unwrap();

        assert_eq!(restored.node_count(), model.node_count());
        assert_eq!(restored.connections().len(), model.connections().len());
        assert_eq!(restored.frames().count(), model.frames().count());

        // Creation order survives, so nodes line up pairwise.
        for (orig, back) in model.nodes().zip(restored.nodes()) {
            assert_eq!(back.text, orig.text);
            assert_eq!(back.role, orig.role);
            assert_eq!(back.pos, orig.pos);
            assert_eq!(back.scroll_value, orig.scroll_value);
            assert_eq!(back.history, orig.history);
        }

        let frame = restored.frames().next().unwrap();
        assert!(frame.locked);
        assert_eq!(frame.members.len(), 2);

        assert_eq!(restored.charts().len(), 1);
        assert_eq!(restored.view_state().zoom_factor, 1.5);
    }

    #[test]
    fn pins_survive_round_trip() {
        let model = sample_model();
        let restored = decode(&encode(&model).unwrap()).unwrap();
        let pinned = restored
            .connections()
            .iter()
            .find(|c| !c.pins.is_empty())
            .expect("pinned connection");
        assert_eq!(pinned.pins, vec![point(500.0, 220.0)]);
    }

    #[test]
    fn empty_record_decodes_to_empty_model() {
        let model = decode("{}").unwrap();
        assert_eq!(model.node_count(), 0);
        assert!(model.connections().is_empty());
        assert_eq!(model.view_state().zoom_factor, 1.0);
    }

    #[test]
    fn malformed_blob_is_codec_error() {
        assert!(matches!(decode("not json"), Err(GraphError::Codec(_))));
        assert!(matches!(
            decode(r#"{"nodes": 3}"#),
            Err(GraphError::Codec(_))
        ));
    }

    #[test]
    fn out_of_range_child_fails_decode() {
        let blob = r#"{
            "nodes": [
                {"pos": [0.0, 0.0], "role": "author", "text": "a", "children": [7]}
            ]
        }"#;
        let err = decode(blob).unwrap_err();
        assert!(matches!(err, GraphError::Codec(_)));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn child_claimed_by_two_parents_fails_decode() {
        let blob = r#"{
            "nodes": [
                {"pos": [0.0, 0.0], "role": "author", "text": "a", "children": [2]},
                {"pos": [0.0, 0.0], "role": "author", "text": "b", "children": [2]},
                {"pos": [0.0, 0.0], "role": "assistant", "text": "c"}
            ]
        }"#;
        assert!(matches!(decode(blob), Err(GraphError::Codec(_))));
    }

    #[test]
    fn out_of_range_connection_fails_decode() {
        let blob = r#"{
            "nodes": [
                {"pos": [0.0, 0.0], "role": "author", "text": "a"}
            ],
            "connections": [{"start": 0, "end": 5}]
        }"#;
        assert!(matches!(decode(blob), Err(GraphError::Codec(_))));
    }

    #[test]
    fn stray_connection_record_is_dropped() {
        let blob = r#"{
            "nodes": [
                {"pos": [0.0, 0.0], "role": "author", "text": "a", "children": [2]},
                {"pos": [0.0, 0.0], "role": "author", "text": "b"},
                {"pos": [0.0, 0.0], "role": "assistant", "text": "c"}
            ],
            "connections": [{"start": 1, "end": 2}]
        }"#;
        // The stray connection does not rewrite c's parent; validation
        // drops it instead.
        let model = decode(blob).unwrap();
        assert_eq!(model.connections().len(), 1);
        let c = model.nodes().nth(2).unwrap();
        let a = model.nodes().next().unwrap();
        assert_eq!(c.parent, Some(a.id));
    }

    #[test]
    fn missing_connection_records_are_materialized() {
        let blob = r#"{
            "nodes": [
                {"pos": [0.0, 0.0], "role": "author", "text": "a", "children": [1]},
                {"pos": [10.0, 0.0], "role": "assistant", "text": "b"}
            ]
        }"#;
        let model = decode(blob).unwrap();
        assert_eq!(model.connections().len(), 1);
    }

    #[test]
    fn child_order_survives_round_trip() {
        let layout = LayoutEngine::new(LayoutConfig::default());
        let mut model = GraphModel::new();
        let a = model.add_node("a", Role::Author, None, &layout).unwrap();
        let b = model.add_node("b", Role::Assistant, Some(a), &layout).unwrap();
        let c = model.add_node("c", Role::Author, Some(b), &layout).unwrap();
        let d = model.add_node("d", Role::Author, Some(a), &layout).unwrap();

        // Reparenting appends c after d, so a's children are no longer in
        // creation order.
        model.remove_node(b).unwrap();
        assert_eq!(model.node(a).unwrap().children, vec![d, c]);

        let restored = decode(&encode(&model).unwrap()).unwrap();
        let root = restored.nodes().next().unwrap();
        let texts: Vec<&str> = root
            .children
            .iter()
            .map(|id| restored.node(*id).unwrap().text.as_str())
            .collect();
        assert_eq!(texts, vec!["d", "c"], "children order changed across round-trip");
    }

    #[test]
    fn empty_frame_record_is_dropped() {
        let blob = r##"{
            "nodes": [
                {"pos": [0.0, 0.0], "role": "author", "text": "a"}
            ],
            "frames": [
                {"members": [], "pos": [0.0, 0.0], "size": [100.0, 100.0],
                 "color": "#2d2d2d", "note": ""}
            ]
        }"##;
        let model = decode(blob).unwrap();
        assert_eq!(model.frames().count(), 0);
    }

    #[test]
    fn frame_record_emptied_by_deduplication_is_dropped() {
        // Both records claim node 0; the second loses its only member and
        // must not survive as an empty frame.
        let blob = r##"{
            "nodes": [
                {"pos": [0.0, 0.0], "role": "author", "text": "a"}
            ],
            "frames": [
                {"members": [0], "pos": [0.0, 0.0], "size": [100.0, 100.0],
                 "color": "#2d2d2d", "note": ""},
                {"members": [0], "pos": [50.0, 50.0], "size": [100.0, 100.0],
                 "color": "#2d2d2d", "note": ""}
            ]
        }"##;
        let model = decode(blob).unwrap();
        assert_eq!(model.frames().count(), 1);
        assert!(model.frames().all(|f| !f.members.is_empty()));
    }
}
