//! Dev-server context exposed to plugins.
//!
//! The host's live server hands each plugin a [`ServerContext`] during
//! `configure_server`: middleware registration, the on-demand SSR module
//! loader, the standard HTML transform (reload-client injection), a
//! stack-trace fixer, and the broadcast channel feeding connected
//! live-reload clients.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::loader::{ModuleError, ModuleLoader};

/// URL the reload client script is served from.
pub const RELOAD_CLIENT_SRC: &str = "/@reload-client";

/// An incoming request, as seen by plugin middleware. The method is not
/// part of the contract; interception is decided on the URL alone.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request URL including any query string; `None` for malformed
    /// requests.
    pub url: Option<String>,
}

impl HttpRequest {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }
}

/// Response produced by a middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareResponse {
    /// HTTP status code.
    pub status: u16,
    /// Content-Type header.
    pub content_type: String,
    /// Response body.
    pub body: String,
}

impl MiddlewareResponse {
    /// A `200` HTML response.
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.into(),
        }
    }
}

/// What a middleware decided to do with a request.
#[derive(Debug)]
pub enum MiddlewareOutcome {
    /// Respond; the chain stops here.
    Respond(MiddlewareResponse),
    /// Not handled here; the host tries the next handler.
    Next,
    /// Failed; the error is forwarded to the host's error handler.
    Fail(ModuleError),
}

/// A request handler registered by a plugin.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name for diagnostics.
    fn name(&self) -> &str;

    async fn handle(&self, req: &HttpRequest) -> MiddlewareOutcome;
}

/// Rewrites server-side stack traces so frames map back to source.
pub trait StacktraceFixer: Send + Sync {
    fn fix(&self, err: &mut ModuleError);
}

struct NoopFixer;

impl StacktraceFixer for NoopFixer {
    fn fix(&self, _err: &mut ModuleError) {}
}

/// Messages pushed to connected live-reload clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Connection handshake.
    Connected,
    /// Reload the whole page; the update cannot be patched in.
    FullReload,
}

impl ClientMessage {
    /// Stable JSON wire form.
    #[must_use]
    pub fn to_json(&self) -> String {
        match self {
            ClientMessage::Connected => r#"{"type":"connected"}"#.to_string(),
            ClientMessage::FullReload => r#"{"type":"full-reload","path":"*"}"#.to_string(),
        }
    }
}

/// Result of running a request through the registered middleware chain.
#[derive(Debug)]
pub enum Dispatch {
    /// A middleware responded.
    Handled(MiddlewareResponse),
    /// The request fell through; carries the forwarded error when a
    /// middleware failed rather than declined.
    Unhandled(Option<ModuleError>),
}

/// Per-registration view of the host's live server.
pub struct ServerContext {
    /// Project root.
    pub root: PathBuf,
    loader: Arc<dyn ModuleLoader>,
    fixer: Arc<dyn StacktraceFixer>,
    middlewares: Vec<Arc<dyn Middleware>>,
    clients: broadcast::Sender<ClientMessage>,
}

impl ServerContext {
    #[must_use]
    pub fn new(root: PathBuf, loader: Arc<dyn ModuleLoader>) -> Self {
        let (clients, _) = broadcast::channel(16);
        Self {
            root,
            loader,
            fixer: Arc::new(NoopFixer),
            middlewares: Vec::new(),
            clients,
        }
    }

    /// Install a host stack-trace fixer.
    #[must_use]
    pub fn with_fixer(mut self, fixer: Arc<dyn StacktraceFixer>) -> Self {
        self.fixer = fixer;
        self
    }

    /// The on-demand SSR module loader.
    #[must_use]
    pub fn loader(&self) -> Arc<dyn ModuleLoader> {
        Arc::clone(&self.loader)
    }

    /// The stack-trace fixer.
    #[must_use]
    pub fn fixer(&self) -> Arc<dyn StacktraceFixer> {
        Arc::clone(&self.fixer)
    }

    /// Register a middleware at the end of the chain.
    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    /// Sender feeding all connected live-reload clients.
    #[must_use]
    pub fn clients(&self) -> broadcast::Sender<ClientMessage> {
        self.clients.clone()
    }

    /// Subscribe as a live-reload client.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
        self.clients.subscribe()
    }

    /// Run a request through the chain. `Fail` short-circuits to the host's
    /// error handler; the long-lived server never crashes on it.
    pub async fn dispatch(&self, req: &HttpRequest) -> Dispatch {
        for middleware in &self.middlewares {
            match middleware.handle(req).await {
                MiddlewareOutcome::Respond(response) => return Dispatch::Handled(response),
                MiddlewareOutcome::Next => {}
                MiddlewareOutcome::Fail(err) => {
                    tracing::debug!(middleware = middleware.name(), "forwarding error: {err}");
                    return Dispatch::Unhandled(Some(err));
                }
            }
        }
        Dispatch::Unhandled(None)
    }
}

/// Host-standard HTML transform: inject the reload client script before
/// `</head>`, else before `</body>`, else append. Idempotent.
#[must_use]
pub fn inject_reload_client(html: String) -> String {
    if html.contains(RELOAD_CLIENT_SRC) {
        return html;
    }
    let tag = format!(r#"<script type="module" src="{RELOAD_CLIENT_SRC}"></script>"#);
    let mut html = html;
    if let Some(pos) = html.find("</head>") {
        html.insert_str(pos, &format!("  {tag}\n  "));
    } else if let Some(pos) = html.find("</body>") {
        html.insert_str(pos, &format!("  {tag}\n  "));
    } else {
        html.push_str(&format!("\n{tag}"));
    }
    html
}
