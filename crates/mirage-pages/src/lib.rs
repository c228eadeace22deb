#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

//! Virtual HTML pages for a bundler-style host.
//!
//! Lets a project declare HTML pages whose markup is produced by executing
//! a source module and rendering its exports, instead of being read from
//! static `.html` files on disk. One [`PagesConfig`] yields two adapters,
//! each gated to one host run mode:
//!
//! - [`BuildPagesPlugin`] registers the virtual entries as build inputs,
//!   pre-renders them once per build inside a headless sandbox, and serves
//!   the cached markup through the resolve/load hooks; after the bundle is
//!   written it can rewrite the emitted files in place.
//! - [`ServePagesPlugin`] intercepts matching dev-server requests and
//!   renders on demand, with no cache, so every request reflects the
//!   current source.
//!
//! ```ignore
//! use mirage_pages::{virtual_pages, PagesConfig};
//!
//! let config = PagesConfig::new(source).with_transform(minifier);
//! let mut container = PluginContainer::new(command);
//! container.extend(virtual_pages(config, sandboxes));
//! ```

pub mod build;
pub mod config;
pub mod entry;
pub mod serve;

pub use build::BuildPagesPlugin;
pub use config::{
    EntryMap, HtmlTransform, PageError, PageResult, PageSource, PagesConfig, RenderArgs,
};
pub use serve::ServePagesPlugin;

use mirage_core::{Plugin, SandboxFactory};
use std::sync::Arc;

/// Base name shared by both adapters.
pub const PLUGIN_NAME: &str = "mirage-pages";

/// Construct the virtual-pages plugin pair from one configuration.
///
/// The adapters are named `mirage-pages:build` and `mirage-pages:serve`;
/// the host container dispatches to whichever one applies to the active
/// run mode.
#[must_use]
pub fn virtual_pages(
    config: PagesConfig,
    sandboxes: Arc<dyn SandboxFactory>,
) -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(BuildPagesPlugin::new(
            format!("{PLUGIN_NAME}:build"),
            config.clone(),
            sandboxes,
        )),
        Box::new(ServePagesPlugin::new(
            format!("{PLUGIN_NAME}:serve"),
            config,
        )),
    ]
}
