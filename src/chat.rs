//! `ChatSession` — one open conversation canvas.
//!
//! Owns the graph, the layout engine, and a completion provider. Graph
//! mutation stays synchronous and single-writer; completions run as
//! detached tokio tasks that hold only a provider clone and the message
//! history, so a slow or cancelled request can never touch the model.
//! The finished result is applied back through one synchronous mutation.

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::codec;
use crate::config::EngineConfig;
use crate::error::GraphError;
use crate::graph::{GraphModel, NodeId, Role};
use crate::layout::LayoutEngine;
use crate::llm::{ChatMessage, LlmProvider, ProviderError, providers};

pub struct ChatSession {
    model: GraphModel,
    layout: LayoutEngine,
    provider: LlmProvider,
    /// Store row this canvas is bound to, once persisted.
    session_id: Option<i64>,
}

impl ChatSession {
    pub fn new(layout: LayoutEngine, provider: LlmProvider) -> Self {
        Self {
            model: GraphModel::new(),
            layout,
            provider,
            session_id: None,
        }
    }

    /// Build a session from engine config: layout from `[layout]`, the
    /// provider from `[llm]` via the provider factory.
    pub fn from_config(config: &EngineConfig, api_key: Option<String>) -> Result<Self, GraphError> {
        let provider = providers::build(&config.llm, api_key)
            .map_err(|e| GraphError::Config(e.to_string()))?;
        Ok(Self::new(LayoutEngine::new(config.layout.clone()), provider))
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut GraphModel {
        &mut self.model
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    pub fn session_id(&self) -> Option<i64> {
        self.session_id
    }

    pub fn bind_session(&mut self, id: i64) {
        self.session_id = Some(id);
    }

    // ── Conversation ──────────────────────────────────────────────────

    /// Append an author message under `parent` (or as a new root). The
    /// node's history is the parent's history plus this message.
    pub fn append_author(
        &mut self,
        parent: Option<NodeId>,
        text: &str,
    ) -> Result<NodeId, GraphError> {
        let mut history = match parent {
            Some(p) => self
                .model
                .node(p)
                .ok_or_else(|| GraphError::NotFound(format!("node {p}")))?
                .history
                .clone(),
            None => Vec::new(),
        };
        history.push(ChatMessage::user(text));
        self.model
            .add_node_with_history(text, Role::Author, parent, history, &self.layout)
    }

    /// Start a completion for `node`'s history as a detached task. The
    /// task owns a provider clone and the messages, nothing else.
    pub fn spawn_completion(
        &self,
        node: NodeId,
    ) -> Result<JoinHandle<Result<String, ProviderError>>, GraphError> {
        let history = self
            .model
            .node(node)
            .ok_or_else(|| GraphError::NotFound(format!("node {node}")))?
            .history
            .clone();
        let provider = self.provider.clone();
        debug!(node = %node, messages = history.len(), "spawning completion");
        Ok(tokio::spawn(async move { provider.complete(&history).await }))
    }

    /// Apply a finished completion under `parent`. Provider failures are
    /// reported and produce no node; the graph is only touched on success.
    pub fn apply_completion(
        &mut self,
        parent: NodeId,
        result: Result<String, ProviderError>,
    ) -> Result<Option<NodeId>, GraphError> {
        let text = match result {
            Ok(text) => text,
            Err(e) => {
                error!(parent = %parent, error = %e, "completion failed");
                return Ok(None);
            }
        };
        let mut history = self
            .model
            .node(parent)
            .ok_or_else(|| GraphError::NotFound(format!("node {parent}")))?
            .history
            .clone();
        history.push(ChatMessage::assistant(text.as_str()));
        let id = self.model.add_node_with_history(
            &text,
            Role::Assistant,
            Some(parent),
            history,
            &self.layout,
        )?;
        Ok(Some(id))
    }

    /// Rebuild the prompt history leading up to `node` from the ancestor
    /// chain itself, ignoring the stored slices. Used when re-running a
    /// completion after the tree above a node has changed.
    pub fn regenerate_history(&self, node: NodeId) -> Result<Vec<ChatMessage>, GraphError> {
        let n = self
            .model
            .node(node)
            .ok_or_else(|| GraphError::NotFound(format!("node {node}")))?;

        let mut chain = Vec::new();
        let mut cursor = n.parent;
        while let Some(id) = cursor {
            let anc = self
                .model
                .node(id)
                .ok_or_else(|| GraphError::NotFound(format!("node {id}")))?;
            chain.push(id);
            cursor = anc.parent;
        }
        chain.reverse();

        Ok(chain
            .iter()
            .filter_map(|id| self.model.node(*id))
            .map(|a| match a.role {
                Role::Author => ChatMessage::user(a.text.as_str()),
                Role::Assistant => ChatMessage::assistant(a.text.as_str()),
            })
            .collect())
    }

    /// Ask the provider for a short title seeded by `snippet`; falls back
    /// to a timestamp title, so this never fails.
    pub async fn suggest_title(&self, snippet: &str) -> String {
        self.provider.title_or_default(snippet).await
    }

    // ── Persistence ───────────────────────────────────────────────────

    /// Encode the current graph; the blob is a detached copy, safe to
    /// hand to another task.
    pub fn snapshot(&self) -> Result<String, GraphError> {
        codec::encode(&self.model)
    }

    /// Replace the graph with a decoded blob. The old model survives any
    /// decode failure.
    pub fn restore(&mut self, blob: &str) -> Result<(), GraphError> {
        self.model = codec::decode(blob)?;
        Ok(())
    }
}
