#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

//! Host hook contract consumed by mirage adapters.
//!
//! A bundler-style host drives plugins through two distinct phases: a
//! one-shot production build (static config → build start → module
//! resolution/loading → bundle write) and a live dev server (middleware,
//! on-demand SSR module loading, hot updates). This crate defines that
//! surface as traits and plain data so adapters can be written against it
//! and exercised without a real host:
//!
//! - [`plugin`] — the [`Plugin`] hook trait, dispatch container, and
//!   build-side configuration types
//! - [`loader`] — on-demand module execution ([`ModuleLoader`]) and the
//!   headless sandbox used for pre-rendering
//! - [`server`] — dev-server context: middleware, HTML client injection,
//!   stack-trace fixing, live-reload broadcast
//! - [`graph`] — the live module graph with SSR invalidation states

pub mod graph;
pub mod loader;
pub mod plugin;
pub mod server;

pub use graph::{HotUpdateContext, ModuleGraph, ModuleNode, SsrInvalidationState};
pub use loader::{
    ModuleError, ModuleExports, ModuleLoader, Sandbox, SandboxFactory, SandboxOptions,
};
pub use plugin::{
    BuildContext, BundleConfig, BundleInput, Command, HookError, HookResult, LoadResult, Plugin,
    PluginContainer, ResolveIdResult, ResolvedConfig,
};
pub use server::{
    inject_reload_client, ClientMessage, Dispatch, HttpRequest, Middleware, MiddlewareOutcome,
    MiddlewareResponse, ServerContext, StacktraceFixer, RELOAD_CLIENT_SRC,
};
