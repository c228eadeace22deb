//! Plugin hooks and dispatch.
//!
//! Hosts hold plugins behind `Box<dyn Plugin>` and drive them through a
//! [`PluginContainer`] scoped to the active [`Command`]. A plugin that does
//! not apply to the active command is present but skipped for every hook,
//! so mode gating lives in one place instead of inside hook bodies.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

use crate::graph::HotUpdateContext;
use crate::server::ServerContext;

/// Result type for plugin hooks.
pub type HookResult<T> = Result<T, HookError>;

/// Fatal error raised from a plugin hook.
#[derive(Debug, Error)]
#[error("[{plugin}] {hook}: {message}")]
pub struct HookError {
    /// Plugin name that raised the error.
    pub plugin: String,
    /// Hook that failed.
    pub hook: &'static str,
    /// Error message.
    pub message: String,
}

impl HookError {
    #[must_use]
    pub fn new(
        plugin: impl Into<String>,
        hook: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            plugin: plugin.into(),
            hook,
            message: message.into(),
        }
    }
}

/// The host's run mode: a one-shot production build or a live dev server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Build,
    Serve,
}

/// The bundling input configuration a host records before building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleInput {
    /// A single entry path.
    Single(String),
    /// A list of entry paths.
    Paths(Vec<String>),
}

/// Static bundling configuration, mutable during the `config` hook.
#[derive(Debug, Clone, Default)]
pub struct BundleConfig {
    /// Build inputs. `None` until something registers one.
    pub input: Option<BundleInput>,
}

impl BundleConfig {
    /// Append inputs, preserving anything already configured.
    pub fn push_inputs(&mut self, inputs: impl IntoIterator<Item = String>) {
        let mut paths = match self.input.take() {
            None => Vec::new(),
            Some(BundleInput::Single(path)) => vec![path],
            Some(BundleInput::Paths(paths)) => paths,
        };
        paths.extend(inputs);
        self.input = Some(BundleInput::Paths(paths));
    }
}

/// Configuration after the host has resolved it. Read-only for plugins.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Project root.
    pub root: PathBuf,
    /// Build output directory, relative to the root.
    pub out_dir: PathBuf,
    /// Active run mode.
    pub command: Command,
    /// The recorded bundling input configuration.
    pub input: Option<BundleInput>,
}

/// Context passed to build lifecycle hooks.
///
/// Carries the resolved paths plus the host's warning channel. Warnings are
/// collected per build so tests and hosts can inspect them; fatal failures
/// are returned as [`HookError`]s instead.
#[derive(Debug)]
pub struct BuildContext {
    /// Project root.
    pub root: PathBuf,
    /// Build output directory, relative to the root.
    pub out_dir: PathBuf,
    warnings: Mutex<Vec<String>>,
}

impl BuildContext {
    #[must_use]
    pub fn new(root: PathBuf, out_dir: PathBuf) -> Self {
        Self {
            root,
            out_dir,
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Report a non-fatal warning through the host channel.
    pub fn warn(&self, plugin: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(plugin, "{message}");
        self.warnings
            .lock()
            .unwrap()
            .push(format!("[{plugin}] {message}"));
    }

    /// Warnings reported so far, in order.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }
}

/// Result of a `resolve_id` hook.
#[derive(Debug, Clone)]
pub struct ResolveIdResult {
    /// Resolved module ID.
    pub id: String,
    /// Whether this module is external (don't bundle).
    pub external: bool,
}

impl ResolveIdResult {
    /// Create a resolved module result.
    pub fn resolved(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external: false,
        }
    }
}

/// Result of a `load` hook.
#[derive(Debug, Clone)]
pub struct LoadResult {
    /// Module source.
    pub code: String,
    /// Optional source map.
    pub map: Option<String>,
}

impl LoadResult {
    /// Create a load result with code only.
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            map: None,
        }
    }
}

/// The plugin hook trait.
///
/// All hooks have default implementations that do nothing, so a plugin only
/// implements the hooks it cares about. Hooks that suspend (module loading,
/// rendering, file I/O) are async; pure lookups stay synchronous.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name for diagnostics and self-identification.
    fn name(&self) -> &str;

    /// Whether this plugin participates in the given run mode.
    fn apply(&self, _command: Command) -> bool {
        true
    }

    /// Modify the static bundling configuration before it is resolved.
    async fn config(&self, _config: &mut BundleConfig) -> HookResult<()> {
        Ok(())
    }

    /// Observe the resolved configuration.
    fn config_resolved(&self, _config: &ResolvedConfig) -> HookResult<()> {
        Ok(())
    }

    /// Called before bundling begins.
    async fn build_start(&self, _ctx: &BuildContext) -> HookResult<()> {
        Ok(())
    }

    /// Claim a module id. Return `Some` to own the resolution, `None` to
    /// let the next plugin or the default resolver handle it.
    fn resolve_id(
        &self,
        _specifier: &str,
        _importer: Option<&str>,
    ) -> HookResult<Option<ResolveIdResult>> {
        Ok(None)
    }

    /// Provide the content of a claimed module id.
    fn load(&self, _id: &str) -> HookResult<Option<LoadResult>> {
        Ok(None)
    }

    /// Called after the bundle has been written to disk.
    async fn write_bundle(&self, _ctx: &BuildContext) -> HookResult<()> {
        Ok(())
    }

    /// Configure the dev server: register middleware, read the loader.
    async fn configure_server(&self, _server: &mut ServerContext) -> HookResult<()> {
        Ok(())
    }

    /// React to a module-graph invalidation event.
    fn handle_hot_update(&self, _ctx: &HotUpdateContext) -> HookResult<()> {
        Ok(())
    }
}

/// Ordered plugin dispatch for one host run.
///
/// The container is scoped to a single [`Command`]; plugins whose `apply`
/// guard rejects that command are skipped for every hook. `resolve_id` and
/// `load` return the first non-`None` answer; lifecycle hooks fan out
/// sequentially in registration order.
pub struct PluginContainer {
    plugins: Vec<Box<dyn Plugin>>,
    command: Command,
}

impl PluginContainer {
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            plugins: Vec::new(),
            command,
        }
    }

    /// Add a plugin.
    pub fn add(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Add several plugins, preserving order.
    pub fn extend(&mut self, plugins: Vec<Box<dyn Plugin>>) {
        self.plugins.extend(plugins);
    }

    /// The command this container dispatches for.
    #[must_use]
    pub fn command(&self) -> Command {
        self.command
    }

    fn active(&self) -> impl Iterator<Item = &dyn Plugin> {
        self.plugins
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| p.apply(self.command))
    }

    /// Call `config` on all applicable plugins.
    pub async fn call_config(&self, config: &mut BundleConfig) -> HookResult<()> {
        for plugin in self.active() {
            plugin.config(config).await?;
        }
        Ok(())
    }

    /// Call `config_resolved` on all applicable plugins.
    pub fn call_config_resolved(&self, config: &ResolvedConfig) -> HookResult<()> {
        for plugin in self.active() {
            plugin.config_resolved(config)?;
        }
        Ok(())
    }

    /// Call `build_start` on all applicable plugins.
    pub async fn call_build_start(&self, ctx: &BuildContext) -> HookResult<()> {
        for plugin in self.active() {
            plugin.build_start(ctx).await?;
        }
        Ok(())
    }

    /// Try to resolve a module id. First non-`None` answer wins.
    pub fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
    ) -> HookResult<Option<ResolveIdResult>> {
        for plugin in self.active() {
            if let Some(result) = plugin.resolve_id(specifier, importer)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    /// Try to load a module. First non-`None` answer wins.
    pub fn load(&self, id: &str) -> HookResult<Option<LoadResult>> {
        for plugin in self.active() {
            if let Some(result) = plugin.load(id)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    /// Call `write_bundle` on all applicable plugins.
    pub async fn call_write_bundle(&self, ctx: &BuildContext) -> HookResult<()> {
        for plugin in self.active() {
            plugin.write_bundle(ctx).await?;
        }
        Ok(())
    }

    /// Call `configure_server` on all applicable plugins.
    pub async fn call_configure_server(&self, server: &mut ServerContext) -> HookResult<()> {
        for plugin in self.active() {
            plugin.configure_server(server).await?;
        }
        Ok(())
    }

    /// Call `handle_hot_update` on all applicable plugins.
    pub fn call_handle_hot_update(&self, ctx: &HotUpdateContext) -> HookResult<()> {
        for plugin in self.active() {
            plugin.handle_hot_update(ctx)?;
        }
        Ok(())
    }
}
