//! Caller-facing configuration.
//!
//! A caller describes its virtual pages with a [`PageSource`] (which
//! entries exist, and how one renders from its loaded module) plus an
//! optional [`HtmlTransform`] applied after the initial render in both
//! phases. One [`PagesConfig`] feeds both adapters.

use async_trait::async_trait;
use mirage_core::{ModuleError, ModuleExports};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by a caller-supplied callback.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PageError(pub String);

impl PageError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<PageError> for ModuleError {
    fn from(err: PageError) -> Self {
        ModuleError::new(err.0)
    }
}

/// Result type for caller callbacks.
pub type PageResult<T> = Result<T, PageError>;

/// Logical output path → source module path.
///
/// `"templates/page1.html"` → `"tests/page1.tsx"`. The ordered map gives a
/// deterministic enumeration order for sequential rendering.
pub type EntryMap = BTreeMap<String, String>;

/// Arguments to [`PageSource::render`].
pub struct RenderArgs {
    /// Exported members of the executed source module.
    pub module: ModuleExports,
}

/// Supplies virtual pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Enumerate entries.
    async fn entries(&self) -> PageResult<EntryMap>;

    /// Render one entry from its loaded module. `None` or an empty string
    /// means "nothing to render here" and is not an error.
    async fn render(&self, args: &RenderArgs) -> PageResult<Option<String>>;
}

/// Post-processes rendered HTML.
#[async_trait]
pub trait HtmlTransform: Send + Sync {
    async fn transform(&self, html: String) -> PageResult<String>;
}

/// Configuration shared by the build and serve adapters.
#[derive(Clone)]
pub struct PagesConfig {
    /// Entry enumeration and rendering.
    pub source: Arc<dyn PageSource>,
    /// Optional HTML post-processing. When absent, the post-build rewrite
    /// phase is skipped entirely.
    pub transform: Option<Arc<dyn HtmlTransform>>,
}

impl PagesConfig {
    #[must_use]
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            transform: None,
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Arc<dyn HtmlTransform>) -> Self {
        self.transform = Some(transform);
        self
    }
}
