//! Canvas behavior end to end: branching, reorganizing, routing, and the
//! rewiring rules around node removal.

use canopy::config::{LayoutConfig, RouterConfig};
use canopy::geom::{padded, point};
use canopy::graph::{GraphModel, Role};
use canopy::{ConnectionRouter, LayoutEngine};

fn engine() -> LayoutEngine {
    // Opt-in log output: RUST_LOG=canopy=debug cargo test.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .try_init();
    LayoutEngine::new(LayoutConfig::default())
}

#[test]
fn branching_conversation_stays_consistent() {
    let layout = engine();
    let mut model = GraphModel::new();

    let q = model.add_node("question", Role::Author, None, &layout).unwrap();
    let a1 = model.add_node("first answer", Role::Assistant, Some(q), &layout).unwrap();
    let a2 = model.add_node("second answer", Role::Assistant, Some(q), &layout).unwrap();
    let follow = model.add_node("follow-up", Role::Author, Some(a1), &layout).unwrap();

    // One connection per edge, nothing else.
    assert_eq!(model.connections().len(), 3);
    assert!(model.connection_between(q, a1).is_some());
    assert!(model.connection_between(q, a2).is_some());
    assert!(model.connection_between(a1, follow).is_some());

    // No two nodes were placed on top of each other.
    let rects: Vec<_> = model.nodes().map(|n| n.rect()).collect();
    for (i, r) in rects.iter().enumerate() {
        for other in &rects[i + 1..] {
            assert!(!r.intersects(other), "{r:?} overlaps {other:?}");
        }
    }
}

#[test]
fn removing_a_branch_point_rewires_around_it() {
    let layout = engine();
    let mut model = GraphModel::new();

    let root = model.add_node("root", Role::Author, None, &layout).unwrap();
    let mid = model.add_node("mid", Role::Assistant, Some(root), &layout).unwrap();
    let left = model.add_node("left", Role::Author, Some(mid), &layout).unwrap();
    let right = model.add_node("right", Role::Author, Some(mid), &layout).unwrap();

    model.remove_node(mid).unwrap();

    assert_eq!(model.node(left).unwrap().parent, Some(root));
    assert_eq!(model.node(right).unwrap().parent, Some(root));
    assert_eq!(model.connections().len(), 2);
    assert!(model.connection_between(root, left).is_some());
    assert!(model.connection_between(root, right).is_some());
}

#[test]
fn organize_respects_locked_frames_and_clears_overlaps() {
    let layout = engine();
    let mut model = GraphModel::new();

    let a = model.add_node("a", Role::Author, None, &layout).unwrap();
    let b = model.add_node("b", Role::Assistant, Some(a), &layout).unwrap();
    let c = model.add_node("c", Role::Author, Some(b), &layout).unwrap();
    let loose = model.add_node("loose", Role::Author, None, &layout).unwrap();

    let frame = model.create_frame(&[a, b]).unwrap();
    let frozen_a = model.node(a).unwrap().pos;
    let frozen_b = model.node(b).unwrap().pos;
    let frame_right = model.frame(frame).unwrap().rect.max_x();

    layout.auto_organize(&mut model);

    // Locked members held still; free nodes moved clear of the frame.
    assert_eq!(model.node(a).unwrap().pos, frozen_a);
    assert_eq!(model.node(b).unwrap().pos, frozen_b);
    assert!(model.node(c).unwrap().pos.x >= frame_right);
    assert!(model.node(loose).unwrap().pos.x >= frame_right);

    let rects: Vec<_> = model.nodes().map(|n| n.rect()).collect();
    for (i, r) in rects.iter().enumerate() {
        for other in &rects[i + 1..] {
            assert!(
                !padded(r, 20.0).intersects(other),
                "{r:?} too close to {other:?}"
            );
        }
    }
}

#[test]
fn routed_connection_is_clickable_along_its_pins() {
    let layout = engine();
    let router = ConnectionRouter::new(RouterConfig::default());
    let mut model = GraphModel::new();

    let a = model.add_node("a", Role::Author, None, &layout).unwrap();
    let b = model.add_node("b", Role::Assistant, Some(a), &layout).unwrap();
    let pin = point(700.0, 500.0);
    model.add_pin(a, b, pin).unwrap();

    let conn = model.connection_between(a, b).unwrap();
    let path = router.route(&model, conn).unwrap();

    assert_eq!(path.len(), 2);
    assert!(router.hit_test(&path, pin));
    assert!(router.hit_test(&path, model.node(a).unwrap().anchor_out()));
    assert!(!router.hit_test(&path, point(-500.0, -500.0)));
}
