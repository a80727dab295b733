//! Branching conversation graph: model and item types.

mod model;
mod types;

pub use model::GraphModel;
pub use types::{
    Chart, Connection, Frame, FrameId, NavigationPin, Node, NodeId, Note, Role, ViewState,
};
