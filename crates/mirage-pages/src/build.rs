//! Build-phase adapter.
//!
//! Makes virtual entries look like real input files to the bundler:
//! registers one `<dir>/<name>.html` input per entry, pre-renders every
//! entry during build start inside a headless sandbox, answers resolve/load
//! for the normalized ids from the per-build cache, and optionally rewrites
//! the emitted files after the bundle is written.

use async_trait::async_trait;
use mirage_core::{
    BuildContext, BundleConfig, BundleInput, Command, HookError, HookResult, LoadResult, Plugin,
    ResolveIdResult, ResolvedConfig, Sandbox, SandboxFactory, SandboxOptions,
};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::config::{EntryMap, PagesConfig, RenderArgs};
use crate::entry::{entry_id, entry_inputs, strip_query};

/// Build-phase adapter. Applies only when the host runs a build.
pub struct BuildPagesPlugin {
    name: String,
    config: PagesConfig,
    sandboxes: Arc<dyn SandboxFactory>,
    state: RwLock<BuildState>,
}

/// Per-registration build state. Written only during lifecycle hooks;
/// read-only while the bundler resolves and loads.
#[derive(Default)]
struct BuildState {
    /// Normalized virtual id → rendered HTML, for the current build.
    resolved_html: FxHashMap<String, String>,
    /// Configuration captured in `config_resolved`.
    resolved: Option<ResolvedConfig>,
}

impl BuildPagesPlugin {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        config: PagesConfig,
        sandboxes: Arc<dyn SandboxFactory>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            sandboxes,
            state: RwLock::new(BuildState::default()),
        }
    }

    fn fatal(&self, hook: &'static str, message: impl Into<String>) -> HookError {
        HookError::new(&self.name, hook, message)
    }

    /// Render every entry sequentially, in enumeration order, through the
    /// sandbox loader. Errors name the entry that failed.
    async fn render_entries(
        &self,
        sandbox: &dyn Sandbox,
        root: &Path,
        entries: &EntryMap,
    ) -> Result<FxHashMap<String, String>, String> {
        let mut resolved = FxHashMap::default();
        for (key, value) in entries {
            let id = entry_id(key);
            let path = root.join(value);
            let module = sandbox
                .load_module(&path)
                .await
                .map_err(|err| format!("failed to load {value} for {key}: {err}"))?;
            let html = self
                .config
                .source
                .render(&RenderArgs { module })
                .await
                .map_err(|err| format!("failed to render {key}: {err}"))?;
            // Empty output means "nothing to render here": the entry is
            // simply absent from the cache. Duplicate normalized ids are
            // last-write-wins.
            if let Some(html) = html.filter(|html| !html.is_empty()) {
                resolved.insert(id, html);
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl Plugin for BuildPagesPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, command: Command) -> bool {
        command == Command::Build
    }

    async fn config(&self, config: &mut BundleConfig) -> HookResult<()> {
        let entries = self
            .config
            .source
            .entries()
            .await
            .map_err(|err| self.fatal("config", format!("entry enumeration failed: {err}")))?;
        config.push_inputs(entry_inputs(&entries));
        Ok(())
    }

    fn config_resolved(&self, config: &ResolvedConfig) -> HookResult<()> {
        self.state.write().unwrap().resolved = Some(config.clone());
        Ok(())
    }

    async fn build_start(&self, ctx: &BuildContext) -> HookResult<()> {
        // Stale entries from a previous build must not survive into this
        // one, even if pre-rendering fails below.
        self.state.write().unwrap().resolved_html.clear();

        let entries =
            self.config.source.entries().await.map_err(|err| {
                self.fatal("buildStart", format!("entry enumeration failed: {err}"))
            })?;

        // Headless nested instance: no watching, no hot reload, no
        // dependency discovery, and never this plugin itself.
        let options = SandboxOptions::headless(ctx.root.clone()).exclude(&self.name);
        let sandbox = self
            .sandboxes
            .spawn(options)
            .await
            .map_err(|err| self.fatal("buildStart", format!("sandbox startup failed: {err}")))?;

        let rendered = self.render_entries(sandbox.as_ref(), &ctx.root, &entries).await;
        // The sandbox is torn down on every exit path before any error
        // propagates.
        let closed = sandbox.close().await;

        let rendered = rendered.map_err(|message| self.fatal("buildStart", message))?;
        closed
            .map_err(|err| self.fatal("buildStart", format!("sandbox shutdown failed: {err}")))?;

        tracing::debug!(pages = rendered.len(), "pre-rendered virtual entries");
        self.state.write().unwrap().resolved_html = rendered;
        Ok(())
    }

    fn resolve_id(
        &self,
        specifier: &str,
        _importer: Option<&str>,
    ) -> HookResult<Option<ResolveIdResult>> {
        let clean = strip_query(specifier);
        if !clean.is_empty() && self.state.read().unwrap().resolved_html.contains_key(clean) {
            return Ok(Some(ResolveIdResult::resolved(specifier)));
        }
        Ok(None)
    }

    fn load(&self, id: &str) -> HookResult<Option<LoadResult>> {
        let clean = strip_query(id);
        Ok(self
            .state
            .read()
            .unwrap()
            .resolved_html
            .get(clean)
            .map(|html| LoadResult::code(html.clone())))
    }

    async fn write_bundle(&self, ctx: &BuildContext) -> HookResult<()> {
        let Some(transform) = self.config.transform.clone() else {
            return Ok(());
        };

        let input = self
            .state
            .read()
            .unwrap()
            .resolved
            .as_ref()
            .and_then(|resolved| resolved.input.clone());
        let Some(BundleInput::Paths(inputs)) = input else {
            return Err(self.fatal("writeBundle", "invalid input configuration"));
        };

        for id in inputs {
            let output_path = ctx.root.join(&ctx.out_dir).join(&id);
            if !output_path.exists() {
                ctx.warn(
                    &self.name,
                    format!("output file {} does not exist", output_path.display()),
                );
                continue;
            }
            let html = tokio::fs::read_to_string(&output_path).await.map_err(|err| {
                self.fatal(
                    "writeBundle",
                    format!("failed to read {}: {err}", output_path.display()),
                )
            })?;
            let html = transform
                .transform(html)
                .await
                .map_err(|err| self.fatal("writeBundle", format!("failed to transform {id}: {err}")))?;
            tokio::fs::write(&output_path, html).await.map_err(|err| {
                self.fatal(
                    "writeBundle",
                    format!("failed to write {}: {err}", output_path.display()),
                )
            })?;
        }
        Ok(())
    }
}
