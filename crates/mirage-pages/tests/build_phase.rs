//! Integration tests for the build-phase adapter.
//!
//! Drives `BuildPagesPlugin` through a `PluginContainer` the way a host
//! would: config → config_resolved → build_start → resolve/load →
//! write_bundle, with a mock sandbox factory standing in for the host's
//! headless module-execution machinery.

use async_trait::async_trait;
use mirage_core::{
    BuildContext, BundleConfig, BundleInput, Command, ModuleError, ModuleExports, ModuleLoader,
    PluginContainer, ResolvedConfig, Sandbox, SandboxFactory, SandboxOptions,
};
use mirage_pages::{
    virtual_pages, EntryMap, HtmlTransform, PageError, PageResult, PageSource, PagesConfig,
    RenderArgs,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Page source backed by a fixed entry list. Renders whatever the loaded
/// module exports as `html`.
struct StaticSource {
    entries: Vec<(&'static str, &'static str)>,
    fail_render: bool,
}

impl StaticSource {
    fn new(entries: Vec<(&'static str, &'static str)>) -> Arc<Self> {
        Arc::new(Self {
            entries,
            fail_render: false,
        })
    }
}

#[async_trait]
impl PageSource for StaticSource {
    async fn entries(&self) -> PageResult<EntryMap> {
        Ok(self
            .entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect())
    }

    async fn render(&self, args: &RenderArgs) -> PageResult<Option<String>> {
        if self.fail_render {
            return Err(PageError::new("render exploded"));
        }
        Ok(args
            .module
            .get("html")
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }
}

/// Appends a footer comment, so rewritten files are recognizable.
struct FooterTransform;

#[async_trait]
impl HtmlTransform for FooterTransform {
    async fn transform(&self, html: String) -> PageResult<String> {
        Ok(format!("{html}<!-- built -->"))
    }
}

/// Sandbox that fabricates module exports from the requested path. Modules
/// whose stem is `empty` export nothing renderable.
struct MockSandbox {
    loads: Arc<Mutex<Vec<PathBuf>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl ModuleLoader for MockSandbox {
    async fn load_module(&self, path: &Path) -> Result<ModuleExports, ModuleError> {
        self.loads.lock().unwrap().push(path.to_path_buf());
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if stem == "empty" {
            return Ok(json!({}));
        }
        Ok(json!({
            "html": format!("<html><body>{stem}</body></html>"),
        }))
    }
}

#[async_trait]
impl Sandbox for MockSandbox {
    async fn close(self: Box<Self>) -> Result<(), ModuleError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct MockSandboxes {
    loads: Arc<Mutex<Vec<PathBuf>>>,
    closed: Arc<AtomicBool>,
    spawned_with: Arc<Mutex<Vec<SandboxOptions>>>,
}

#[async_trait]
impl SandboxFactory for MockSandboxes {
    async fn spawn(&self, options: SandboxOptions) -> Result<Box<dyn Sandbox>, ModuleError> {
        self.spawned_with.lock().unwrap().push(options);
        Ok(Box::new(MockSandbox {
            loads: Arc::clone(&self.loads),
            closed: Arc::clone(&self.closed),
        }))
    }
}

fn build_container(config: PagesConfig, sandboxes: Arc<MockSandboxes>) -> PluginContainer {
    let mut container = PluginContainer::new(Command::Build);
    container.extend(virtual_pages(config, sandboxes));
    container
}

fn resolved(root: &Path, input: Option<BundleInput>) -> ResolvedConfig {
    ResolvedConfig {
        root: root.to_path_buf(),
        out_dir: PathBuf::from("dist"),
        command: Command::Build,
        input,
    }
}

#[tokio::test]
async fn registers_inputs_additively() {
    let source = StaticSource::new(vec![
        ("templates/page1.html", "tests/page1.tsx"),
        ("about.tsx", "src/about.tsx"),
    ]);
    let container = build_container(
        PagesConfig::new(source),
        Arc::new(MockSandboxes::default()),
    );

    let mut config = BundleConfig {
        input: Some(BundleInput::Single("index.html".to_string())),
    };
    container.call_config(&mut config).await.unwrap();

    assert_eq!(
        config.input,
        Some(BundleInput::Paths(vec![
            "index.html".to_string(),
            "about.html".to_string(),
            "templates/page1.html".to_string(),
        ]))
    );
}

#[tokio::test]
async fn serve_container_leaves_build_config_alone() {
    let source = StaticSource::new(vec![("templates/page1.html", "tests/page1.tsx")]);
    let mut container = PluginContainer::new(Command::Serve);
    container.extend(virtual_pages(
        PagesConfig::new(source),
        Arc::new(MockSandboxes::default()),
    ));

    let mut config = BundleConfig::default();
    container.call_config(&mut config).await.unwrap();
    assert_eq!(config.input, None);
}

#[tokio::test]
async fn pre_render_then_resolve_and_load() {
    let source = StaticSource::new(vec![("templates/page1.html", "tests/page1.tsx")]);
    let sandboxes = Arc::new(MockSandboxes::default());
    let container = build_container(PagesConfig::new(source), Arc::clone(&sandboxes));

    let root = PathBuf::from("/app");
    container
        .call_config_resolved(&resolved(&root, None))
        .unwrap();
    container
        .call_build_start(&BuildContext::new(root.clone(), PathBuf::from("dist")))
        .await
        .unwrap();

    // The sandbox was headless, excluded this plugin, and is closed now.
    let options = sandboxes.spawned_with.lock().unwrap();
    assert_eq!(options.len(), 1);
    assert!(!options[0].watch);
    assert!(!options[0].hmr);
    assert!(!options[0].dep_discovery);
    assert!(options[0].excludes("mirage-pages:build"));
    drop(options);
    assert!(sandboxes.closed.load(Ordering::SeqCst));
    assert_eq!(
        *sandboxes.loads.lock().unwrap(),
        vec![PathBuf::from("/app/tests/page1.tsx")]
    );

    // Query strings are stripped before lookup; content is identical.
    let clean = container.resolve_id("templates/page1.html", None).unwrap();
    assert_eq!(clean.unwrap().id, "templates/page1.html");
    let queried = container
        .resolve_id("templates/page1.html?v=1", None)
        .unwrap();
    assert_eq!(queried.unwrap().id, "templates/page1.html?v=1");

    let body = container.load("templates/page1.html").unwrap().unwrap();
    let queried_body = container.load("templates/page1.html?v=1").unwrap().unwrap();
    assert_eq!(body.code, "<html><body>page1</body></html>");
    assert_eq!(body.code, queried_body.code);

    // Unregistered ids stay with the default resolver.
    assert!(container.resolve_id("other.html", None).unwrap().is_none());
    assert!(container.load("other.html").unwrap().is_none());
}

#[tokio::test]
async fn empty_render_omits_entry_from_cache() {
    let source = StaticSource::new(vec![("templates/blank.html", "tests/empty.tsx")]);
    let container = build_container(
        PagesConfig::new(source),
        Arc::new(MockSandboxes::default()),
    );

    let root = PathBuf::from("/app");
    container
        .call_config_resolved(&resolved(&root, None))
        .unwrap();
    container
        .call_build_start(&BuildContext::new(root, PathBuf::from("dist")))
        .await
        .unwrap();

    assert!(container
        .resolve_id("templates/blank.html", None)
        .unwrap()
        .is_none());
    assert!(container.load("templates/blank.html").unwrap().is_none());
}

#[tokio::test]
async fn duplicate_ids_last_write_wins() {
    // Both keys normalize to pages/home.html; the later enumeration entry
    // is the one retained.
    let source = StaticSource::new(vec![
        ("pages/home.md", "tests/first.tsx"),
        ("pages/home.txt", "tests/second.tsx"),
    ]);
    let container = build_container(
        PagesConfig::new(source),
        Arc::new(MockSandboxes::default()),
    );

    let root = PathBuf::from("/app");
    container
        .call_config_resolved(&resolved(&root, None))
        .unwrap();
    container
        .call_build_start(&BuildContext::new(root, PathBuf::from("dist")))
        .await
        .unwrap();

    let body = container.load("pages/home.html").unwrap().unwrap();
    assert_eq!(body.code, "<html><body>second</body></html>");
}

#[tokio::test]
async fn render_failure_aborts_build_and_closes_sandbox() {
    let source = Arc::new(StaticSource {
        entries: vec![("templates/page1.html", "tests/page1.tsx")],
        fail_render: true,
    });
    let sandboxes = Arc::new(MockSandboxes::default());
    let container = build_container(PagesConfig::new(source), Arc::clone(&sandboxes));

    let root = PathBuf::from("/app");
    container
        .call_config_resolved(&resolved(&root, None))
        .unwrap();
    let err = container
        .call_build_start(&BuildContext::new(root, PathBuf::from("dist")))
        .await
        .unwrap_err();

    // The error names the page that failed, and the sandbox did not leak.
    assert!(err.to_string().contains("templates/page1.html"));
    assert!(sandboxes.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn write_bundle_rewrites_recorded_inputs_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let out = root.join("dist/templates");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("page1.html"), "<html>old</html>").unwrap();
    std::fs::write(root.join("dist/untouched.html"), "<html>keep</html>").unwrap();

    let source = StaticSource::new(vec![("templates/page1.html", "tests/page1.tsx")]);
    let config = PagesConfig::new(source).with_transform(Arc::new(FooterTransform));
    let container = build_container(config, Arc::new(MockSandboxes::default()));

    let input = Some(BundleInput::Paths(vec![
        "templates/page1.html".to_string(),
        "templates/missing.html".to_string(),
    ]));
    container.call_config_resolved(&resolved(&root, input)).unwrap();

    let ctx = BuildContext::new(root.clone(), PathBuf::from("dist"));
    container.call_write_bundle(&ctx).await.unwrap();

    // Recorded inputs are rewritten; a missing file warns and is skipped;
    // files outside the recorded list are untouched.
    let rewritten = std::fs::read_to_string(out.join("page1.html")).unwrap();
    assert_eq!(rewritten, "<html>old</html><!-- built -->");
    let untouched = std::fs::read_to_string(root.join("dist/untouched.html")).unwrap();
    assert_eq!(untouched, "<html>keep</html>");

    let warnings = ctx.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("missing.html"));
    assert!(warnings[0].contains("does not exist"));
}

#[tokio::test]
async fn write_bundle_requires_a_recorded_input_list() {
    let source = StaticSource::new(vec![("templates/page1.html", "tests/page1.tsx")]);
    let config = PagesConfig::new(source).with_transform(Arc::new(FooterTransform));
    let container = build_container(config, Arc::new(MockSandboxes::default()));

    let root = PathBuf::from("/app");
    let input = Some(BundleInput::Single("index.html".to_string()));
    container.call_config_resolved(&resolved(&root, input)).unwrap();

    let err = container
        .call_write_bundle(&BuildContext::new(root, PathBuf::from("dist")))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid input configuration"));
}

#[tokio::test]
async fn write_bundle_is_skipped_without_a_transform() {
    let source = StaticSource::new(vec![("templates/page1.html", "tests/page1.tsx")]);
    let container = build_container(
        PagesConfig::new(source),
        Arc::new(MockSandboxes::default()),
    );

    // No transform configured: the phase is skipped before the recorded
    // input configuration is even inspected.
    let root = PathBuf::from("/app");
    container
        .call_write_bundle(&BuildContext::new(root, PathBuf::from("dist")))
        .await
        .unwrap();
}
