//! Serve-phase adapter.
//!
//! Answers live requests for virtual pages by rendering on demand. Every
//! request re-executes the source module so live editing always sees fresh
//! output; the only state is the entry path index, computed once at server
//! startup and read-only afterwards.

use async_trait::async_trait;
use mirage_core::{
    inject_reload_client, ClientMessage, Command, HookError, HookResult, HotUpdateContext,
    HttpRequest, Middleware, MiddlewareOutcome, MiddlewareResponse, ModuleLoader, Plugin,
    ServerContext, SsrInvalidationState, StacktraceFixer,
};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{PagesConfig, RenderArgs};
use crate::entry::{entry_index, strip_query};

/// Serve-phase adapter. Applies only when the host runs the dev server.
pub struct ServePagesPlugin {
    name: String,
    config: PagesConfig,
}

impl ServePagesPlugin {
    #[must_use]
    pub fn new(name: impl Into<String>, config: PagesConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

#[async_trait]
impl Plugin for ServePagesPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, command: Command) -> bool {
        command == Command::Serve
    }

    async fn configure_server(&self, server: &mut ServerContext) -> HookResult<()> {
        let entries = self.config.source.entries().await.map_err(|err| {
            HookError::new(
                &self.name,
                "configureServer",
                format!("entry enumeration failed: {err}"),
            )
        })?;
        let index = entry_index(&server.root, &entries);
        tracing::debug!(pages = index.len(), "indexed virtual pages");

        server.use_middleware(Arc::new(PagesMiddleware {
            name: self.name.clone(),
            config: self.config.clone(),
            index,
            loader: server.loader(),
            fixer: server.fixer(),
        }));
        Ok(())
    }

    fn handle_hot_update(&self, ctx: &HotUpdateContext) -> HookResult<()> {
        // Soft invalidations are the host's business; only a hard SSR
        // invalidation forces every client to reload.
        if let Some(node) = ctx.graph.get_module_by_file(&ctx.file) {
            if node.ssr_invalidation == SsrInvalidationState::Hard {
                tracing::debug!(file = %ctx.file, "hard SSR invalidation, full reload");
                let _ = ctx.clients.send(ClientMessage::FullReload);
            }
        }
        Ok(())
    }
}

/// Request interceptor for virtual pages.
struct PagesMiddleware {
    name: String,
    config: PagesConfig,
    /// Normalized virtual id → absolute source module path.
    index: FxHashMap<String, PathBuf>,
    loader: Arc<dyn ModuleLoader>,
    fixer: Arc<dyn StacktraceFixer>,
}

#[async_trait]
impl Middleware for PagesMiddleware {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, req: &HttpRequest) -> MiddlewareOutcome {
        let Some(url) = req.url.as_deref() else {
            return MiddlewareOutcome::Next;
        };

        let path = strip_query(url);
        let id = path.strip_prefix('/').unwrap_or(path);
        if !id.ends_with(".html") {
            return MiddlewareOutcome::Next;
        }
        let Some(entry_path) = self.index.get(id) else {
            return MiddlewareOutcome::Next;
        };

        // On demand: every request re-executes the source module.
        let module = match self.loader.load_module(entry_path).await {
            Ok(module) => module,
            Err(mut err) => {
                self.fixer.fix(&mut err);
                return MiddlewareOutcome::Fail(err);
            }
        };

        let html = match self.config.source.render(&RenderArgs { module }).await {
            Ok(html) => html,
            Err(err) => {
                tracing::error!(page = id, "render failed: {err}");
                return MiddlewareOutcome::Fail(err.into());
            }
        };
        let Some(html) = html.filter(|html| !html.is_empty()) else {
            // Nothing to serve; not an error.
            return MiddlewareOutcome::Next;
        };

        let html = inject_reload_client(html);
        let html = match &self.config.transform {
            Some(transform) => match transform.transform(html).await {
                Ok(html) => html,
                Err(err) => {
                    tracing::error!(page = id, "transform failed: {err}");
                    return MiddlewareOutcome::Fail(err.into());
                }
            },
            None => html,
        };

        MiddlewareOutcome::Respond(MiddlewareResponse::html(html))
    }
}
