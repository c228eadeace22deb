//! On-demand module execution.
//!
//! The host owns the machinery that executes a source module and hands back
//! its exports; plugins only see the [`ModuleLoader`] trait. For build-time
//! pre-rendering the host can also spawn a [`Sandbox`]: a headless instance
//! of its own dev-server machinery used purely as a module-execution
//! environment, with watching, hot reload, and dependency discovery turned
//! off.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Exported members of an executed source module, as a JSON value.
pub type ModuleExports = serde_json::Value;

/// Failure while loading or executing a module.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ModuleError {
    /// Error message.
    pub message: String,
    /// Server-side stack trace, when the failure came from executing user
    /// code. Hosts rewrite these frames so they map back to source.
    pub stack: Option<String>,
}

impl ModuleError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    #[must_use]
    pub fn with_stack(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: Some(stack.into()),
        }
    }
}

/// Loads and executes a module on demand, returning its exports.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load_module(&self, path: &Path) -> Result<ModuleExports, ModuleError>;
}

/// Options for spawning a headless module-execution sandbox.
///
/// Derived from the host's resolved user configuration. The defaults from
/// [`SandboxOptions::headless`] disable everything a pre-render pass must
/// not trigger; `exclude_plugins` keeps the spawning plugin out of the
/// nested instance so it cannot re-enter itself.
#[derive(Debug, Clone)]
pub struct SandboxOptions {
    /// Project root the sandbox resolves modules against.
    pub root: PathBuf,
    /// File watching.
    pub watch: bool,
    /// Hot reload.
    pub hmr: bool,
    /// Dependency pre-bundling discovery.
    pub dep_discovery: bool,
    /// Plugin names the nested instance must not register.
    pub exclude_plugins: Vec<String>,
}

impl SandboxOptions {
    /// Headless defaults: no watching, no hot reload, no dependency
    /// discovery, nothing excluded yet.
    #[must_use]
    pub fn headless(root: PathBuf) -> Self {
        Self {
            root,
            watch: false,
            hmr: false,
            dep_discovery: false,
            exclude_plugins: Vec::new(),
        }
    }

    /// Exclude a plugin by name from the nested instance.
    #[must_use]
    pub fn exclude(mut self, plugin: impl Into<String>) -> Self {
        self.exclude_plugins.push(plugin.into());
        self
    }

    /// Whether the named plugin is excluded.
    #[must_use]
    pub fn excludes(&self, plugin: &str) -> bool {
        self.exclude_plugins.iter().any(|p| p == plugin)
    }
}

/// A running sandbox. Exclusively owned by one pre-render pass; `close`
/// must run on every exit path.
#[async_trait]
pub trait Sandbox: ModuleLoader {
    /// Tear the sandbox down and release its resources.
    async fn close(self: Box<Self>) -> Result<(), ModuleError>;
}

/// Spawns sandboxes from the host's resolved configuration.
#[async_trait]
pub trait SandboxFactory: Send + Sync {
    async fn spawn(&self, options: SandboxOptions) -> Result<Box<dyn Sandbox>, ModuleError>;
}
