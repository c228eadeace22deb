//! Live module graph, as exposed to hot-update hooks.
//!
//! The host tracks every executed module and how badly a file change
//! invalidated it on the server side. Plugins only need to look nodes up by
//! file and read the invalidation state; graph maintenance stays with the
//! host.

use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use crate::server::ClientMessage;

/// How a file change invalidated a module's server-side state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SsrInvalidationState {
    /// Up to date.
    #[default]
    Fresh,
    /// Can be re-executed incrementally by the host.
    Soft,
    /// Cannot be incrementally patched; requires a full page reload.
    Hard,
}

/// A node in the live module graph.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    /// File path on disk.
    pub file: String,
    /// Server-side invalidation state.
    pub ssr_invalidation: SsrInvalidationState,
}

impl ModuleNode {
    #[must_use]
    pub fn new(file: String) -> Self {
        Self {
            file,
            ssr_invalidation: SsrInvalidationState::Fresh,
        }
    }
}

/// File-keyed view of the host's module graph.
pub struct ModuleGraph {
    modules: RwLock<FxHashMap<String, ModuleNode>>,
}

impl ModuleGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            modules: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register a module if it is not already tracked.
    pub fn ensure_module(&self, file: &str) {
        self.modules
            .write()
            .unwrap()
            .entry(file.to_string())
            .or_insert_with(|| ModuleNode::new(file.to_string()));
    }

    /// Record the invalidation state for a tracked module.
    pub fn set_invalidation(&self, file: &str, state: SsrInvalidationState) {
        if let Some(node) = self.modules.write().unwrap().get_mut(file) {
            node.ssr_invalidation = state;
        }
    }

    /// Look a module up by file path.
    #[must_use]
    pub fn get_module_by_file(&self, file: &str) -> Option<ModuleNode> {
        self.modules.read().unwrap().get(file).cloned()
    }
}

impl Default for ModuleGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Context passed to `handle_hot_update` when a file changes.
pub struct HotUpdateContext {
    /// Absolute path of the changed file.
    pub file: String,
    /// The live module graph.
    pub graph: Arc<ModuleGraph>,
    /// Sender feeding all connected live-reload clients.
    pub clients: broadcast::Sender<ClientMessage>,
}
