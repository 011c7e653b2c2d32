//! The shared engine handle passed to every module.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use {
    graft_config::{GraftConfig, ModuleDescriptor},
    serde_json::Value,
    tokio::sync::watch,
    tracing::{debug, info},
};

use crate::{
    assembler::{PathTokens, ScriptAssembler},
    events::{Event, EventListener, EventSurface, ListenerId, ListenerOptions},
    initializer::{InitReport, ModuleInitializer},
    module::{LoaderSet, ModuleLoader},
    resolver::ModuleResolver,
    snippets::SnippetRegistry,
    store::KeyValueStore,
};

struct EngineInner {
    modules: Vec<ModuleDescriptor>,
    track_path: String,
    system_events_path: String,
    snippets: Arc<SnippetRegistry>,
    events: EventSurface,
    store: Arc<dyn KeyValueStore>,
    resolver: ModuleResolver,
    loaders: LoaderSet,
    assembler: ScriptAssembler,
    started: AtomicBool,
    ready: watch::Sender<Option<Arc<InitReport>>>,
}

/// Cheap-to-clone handle over one engine's shared state.
///
/// Engines built from separate builders share nothing.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

/// Wires configuration, the key-value store and module loaders into an
/// [`Engine`].
pub struct EngineBuilder {
    config: GraftConfig,
    store: Arc<dyn KeyValueStore>,
    loaders: LoaderSet,
}

impl EngineBuilder {
    pub fn new(config: GraftConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let loaders = LoaderSet::with_builtin(&config.shell);
        Self {
            config,
            store,
            loaders,
        }
    }

    /// Register an additional loader, replacing the built-in one for
    /// `extension` if any.
    #[must_use]
    pub fn loader(mut self, extension: &str, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loaders.register(extension, loader);
        self
    }

    /// Build the engine without loading any module.
    pub fn build(self) -> Engine {
        let snippets = Arc::new(SnippetRegistry::default());
        let (ready, _) = watch::channel(None);
        let GraftConfig {
            track_path,
            system_events_path,
            modules,
            paths,
            ..
        } = self.config;

        Engine {
            inner: Arc::new(EngineInner {
                modules,
                track_path,
                system_events_path,
                events: EventSurface::new(Arc::clone(&snippets)),
                snippets,
                store: self.store,
                resolver: ModuleResolver::from_config(&paths),
                loaders: self.loaders,
                assembler: ScriptAssembler::new(paths.snippets_dir),
                started: AtomicBool::new(false),
                ready,
            }),
        }
    }

    /// Build the engine and start loading modules in the background.
    ///
    /// Returns immediately; await [`Engine::ready`] for the settled state.
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> Engine {
        let engine = self.build();
        let background = engine.clone();
        tokio::spawn(async move {
            background.initialize().await;
        });
        engine
    }
}

impl Engine {
    pub fn builder(config: GraftConfig, store: Arc<dyn KeyValueStore>) -> EngineBuilder {
        EngineBuilder::new(config, store)
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Load and initialize every configured module.
    ///
    /// Runs at most once per engine; later calls wait for the first run.
    pub async fn initialize(&self) -> Arc<InitReport> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return self.ready().await;
        }

        debug!(modules = self.inner.modules.len(), "initializing modules");
        let report = ModuleInitializer::new(&self.inner.resolver, &self.inner.loaders)
            .run(self, &self.inner.modules)
            .await;
        let report = Arc::new(report);

        info!(
            loaded = report.loaded().count(),
            skipped = report.skipped().count(),
            failed = report.failed().count(),
            snippets = self.inner.snippets.len(),
            "modules initialized"
        );
        self.inner.ready.send_replace(Some(Arc::clone(&report)));
        report
    }

    /// Wait until every module's entry point has settled.
    ///
    /// Only resolves once [`Engine::initialize`] has run to completion, either
    /// directly or through [`EngineBuilder::start`]. On an engine from
    /// [`EngineBuilder::build`] that is never initialized this waits forever.
    pub async fn ready(&self) -> Arc<InitReport> {
        let mut rx = self.inner.ready.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(report) => report.clone().unwrap_or_default(),
            Err(_) => Arc::default(),
        }
    }

    /// The report of a finished initialization, if there is one yet.
    pub fn report(&self) -> Option<Arc<InitReport>> {
        self.inner.ready.borrow().clone()
    }

    // ── Events ──────────────────────────────────────────────────────────────

    /// Subscribe to an event type, requiring the snippet of the same name.
    pub fn add_event_listener(
        &self,
        kind: &str,
        listener: Arc<dyn EventListener>,
        options: ListenerOptions,
    ) -> ListenerId {
        self.inner.events.add_event_listener(kind, listener, options)
    }

    pub fn remove_event_listener(&self, kind: &str, id: ListenerId) -> bool {
        self.inner.events.remove_event_listener(kind, id)
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.inner.events.listener_count(kind)
    }

    /// Deliver `event` to its listeners; returns how many ran.
    pub async fn dispatch_event(&self, event: &Event) -> usize {
        self.inner.events.dispatch(event).await
    }

    // ── Store ───────────────────────────────────────────────────────────────

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.store.get(key)
    }

    pub fn set(&self, key: &str, value: Value) -> bool {
        self.inner.store.set(key, value)
    }

    // ── Script ──────────────────────────────────────────────────────────────

    /// Snippet names required so far, in first-requirement order.
    pub fn required_snippets(&self) -> Vec<String> {
        self.inner.snippets.names()
    }

    /// Concatenated source of every required snippet with path tokens
    /// substituted.
    ///
    /// Reflects the requirements at call time; before [`Engine::ready`]
    /// resolves that may not include every module's snippets.
    pub fn injected_script(&self) -> String {
        let names = self.required_snippets();
        self.inner.assembler.assemble(&names, PathTokens {
            track_path: &self.inner.track_path,
            system_events_path: &self.inner.system_events_path,
        })
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn track_path(&self) -> &str {
        &self.inner.track_path
    }

    pub fn system_events_path(&self) -> &str {
        &self.inner.system_events_path
    }

    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.inner.modules
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.inner.resolver
    }

    pub fn loaders(&self) -> &LoaderSet {
        &self.inner.loaders
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{path::Path, time::Duration};

    use {async_trait::async_trait, graft_config::PathsConfig, serde_json::json};

    use super::*;
    use crate::{
        events::FnListener,
        module::{EngineModule, NativeLoader},
        store::MemoryStore,
    };

    struct Listens(&'static str, &'static str);

    #[async_trait]
    impl EngineModule for Listens {
        fn name(&self) -> &str {
            self.0
        }

        async fn init(&self, engine: Engine, _settings: Value) -> anyhow::Result<()> {
            engine.add_event_listener(
                self.1,
                Arc::new(FnListener::new(self.0, |_event: Event| async { Ok(()) })),
                ListenerOptions::default(),
            );
            Ok(())
        }
    }

    struct Hangs;

    #[async_trait]
    impl EngineModule for Hangs {
        fn name(&self) -> &str {
            "hangs"
        }

        async fn init(&self, _engine: Engine, _settings: Value) -> anyhow::Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    struct Slow;

    #[async_trait]
    impl EngineModule for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn init(&self, engine: Engine, _settings: Value) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            engine.add_event_listener(
                "late",
                Arc::new(FnListener::new("slow", |_event: Event| async { Ok(()) })),
                ListenerOptions::default(),
            );
            Ok(())
        }
    }

    fn layout(root: &Path, modules: &[&str], snippets: &[(&str, &str)]) -> PathsConfig {
        let modules_dir = root.join("modules");
        let snippets_dir = root.join("browser");
        std::fs::create_dir_all(&snippets_dir).unwrap();
        for name in modules {
            std::fs::create_dir_all(modules_dir.join(name)).unwrap();
            std::fs::write(modules_dir.join(name).join("index.native"), "").unwrap();
        }
        for (name, source) in snippets {
            std::fs::write(snippets_dir.join(format!("{name}.js")), source).unwrap();
        }
        PathsConfig {
            modules_dir,
            snippets_dir,
            module_extensions: vec!["native".into()],
        }
    }

    fn native() -> Arc<NativeLoader> {
        Arc::new(
            NativeLoader::new()
                .with_module(Arc::new(Listens("clicks", "click")))
                .with_module(Arc::new(Slow))
                .with_module(Arc::new(Hangs)),
        )
    }

    fn config(paths: PathsConfig, modules: &[&str]) -> GraftConfig {
        GraftConfig::new(
            "/t",
            "/e",
            modules.iter().map(|m| ModuleDescriptor::named(*m)).collect(),
        )
        .with_paths(paths)
    }

    #[test]
    fn baseline_snippet_present_before_initialization() {
        let engine = Engine::builder(
            GraftConfig::new("/t", "/e", vec![]),
            Arc::new(MemoryStore::new()),
        )
        .build();
        assert_eq!(engine.required_snippets(), vec!["track"]);
        assert!(engine.report().is_none());
    }

    #[tokio::test]
    async fn initialize_then_assemble() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = layout(tmp.path(), &["clicks"], &[
            ("track", "t(TRACK_PATH);"),
            ("click", "c(SYSTEM_EVENTS_PATH);"),
        ]);
        let engine = Engine::builder(config(paths, &["clicks"]), Arc::new(MemoryStore::new()))
            .loader("native", native())
            .build();

        let report = engine.initialize().await;
        assert_eq!(report.loaded().count(), 1);
        assert_eq!(engine.required_snippets(), vec!["track", "click"]);
        assert_eq!(engine.injected_script(), "t(/t);c(/e);");
    }

    #[tokio::test]
    async fn initialize_runs_once() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = layout(tmp.path(), &["clicks"], &[]);
        let engine = Engine::builder(config(paths, &["clicks"]), Arc::new(MemoryStore::new()))
            .loader("native", native())
            .build();

        let first = engine.initialize().await;
        let second = engine.initialize().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.listener_count("click"), 1);
    }

    #[tokio::test]
    async fn start_exposes_ready_future() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = layout(tmp.path(), &["slow", "clicks"], &[]);
        let engine = Engine::builder(
            config(paths, &["slow", "clicks"]),
            Arc::new(MemoryStore::new()),
        )
        .loader("native", native())
        .start();

        let report = engine.ready().await;
        assert_eq!(report.loaded().count(), 2);
        assert_eq!(engine.required_snippets(), vec!["track", "click", "late"]);
        assert!(engine.report().is_some());
    }

    #[tokio::test]
    async fn hanging_module_does_not_hold_back_later_modules() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = layout(tmp.path(), &["hangs", "clicks"], &[]);
        let engine = Engine::builder(
            config(paths, &["hangs", "clicks"]),
            Arc::new(MemoryStore::new()),
        )
        .loader("native", native())
        .start();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !engine.required_snippets().contains(&"click".to_string()) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("second module never registered its listener");

        assert_eq!(engine.listener_count("click"), 1);
        assert!(engine.report().is_none());
    }

    #[tokio::test]
    async fn engines_do_not_share_state() {
        let a = Engine::builder(GraftConfig::new("/a", "/ae", vec![]), Arc::new(MemoryStore::new()))
            .build();
        let b = Engine::builder(GraftConfig::new("/b", "/be", vec![]), Arc::new(MemoryStore::new()))
            .build();

        a.add_event_listener(
            "scroll",
            Arc::new(FnListener::new("x", |_event: Event| async { Ok(()) })),
            ListenerOptions::default(),
        );
        a.set("k", json!(1));

        assert_eq!(b.required_snippets(), vec!["track"]);
        assert_eq!(b.get("k"), None);
        assert_eq!(a.get("k"), Some(json!(1)));
    }

    #[tokio::test]
    async fn dispatch_reaches_module_listeners() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = layout(tmp.path(), &["clicks"], &[]);
        let engine = Engine::builder(config(paths, &["clicks"]), Arc::new(MemoryStore::new()))
            .loader("native", native())
            .build();
        engine.initialize().await;

        let event = Event::new("click").with_payload(json!({"x": 3}));
        assert_eq!(engine.dispatch_event(&event).await, 1);
        assert_eq!(engine.dispatch_event(&Event::new("scroll")).await, 0);
    }
}
