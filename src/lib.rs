//! Canopy — a branching-conversation graph engine.
//!
//! The crate models a canvas of chat messages as a forest of nodes with
//! curved connections, groupable into frames, laid out automatically and
//! persisted to SQLite. Rendering and input handling live elsewhere; this
//! is the data model, the algorithms, and the persistence layer.
//!
//! Entry points:
//! - [`graph::GraphModel`] — the canonical structure and its invariants.
//! - [`layout::LayoutEngine`] — collision-free placement and canvas
//!   reorganization.
//! - [`route::ConnectionRouter`] — Bezier connection paths and hit-testing.
//! - [`store::SessionStore`] — named, timestamped sessions in SQLite.
//! - [`chat::ChatSession`] — conversation orchestration over an async
//!   completion provider.

pub mod chat;
pub mod codec;
pub mod config;
pub mod error;
pub mod geom;
pub mod graph;
pub mod layout;
pub mod llm;
pub mod route;
pub mod store;

pub use chat::ChatSession;
pub use config::EngineConfig;
pub use error::GraphError;
pub use graph::{FrameId, GraphModel, NodeId, Role};
pub use layout::LayoutEngine;
pub use route::ConnectionRouter;
pub use store::{SessionMeta, SessionStore};
