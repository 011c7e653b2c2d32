//! Module and loader contracts.
//!
//! A [`ModuleLoader`] turns a resolved implementation file into an
//! [`EngineModule`]; the [`LoaderSet`] picks the loader by file extension.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    graft_common::events::{Event, EventListener},
    graft_config::ShellConfig,
    serde_json::Value,
    tracing::debug,
};

use crate::{
    engine::Engine,
    error::{Error, Result},
    manifest::{ManifestFormat, ManifestLoader},
    resolver::ResolvedModule,
    shell_module::ShellModuleLoader,
};

/// A loaded module, ready to be initialized against an engine.
#[async_trait]
pub trait EngineModule: Send + Sync {
    fn name(&self) -> &str;

    /// Entry point. Receives the shared engine and the module's settings as
    /// configured. Errors are reported by the initializer and never stop
    /// other modules.
    async fn init(&self, engine: Engine, settings: Value) -> anyhow::Result<()>;
}

/// Loads the implementation file found by the resolver.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, module: &ResolvedModule) -> Result<Arc<dyn EngineModule>>;
}

/// Loaders keyed by file extension (without the leading dot).
#[derive(Clone, Default)]
pub struct LoaderSet {
    loaders: HashMap<String, Arc<dyn ModuleLoader>>,
}

impl LoaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manifest loaders for `toml`, `yaml` and `json`, shell loader for `sh`.
    pub fn with_builtin(shell: &ShellConfig) -> Self {
        let mut set = Self::new();
        set.register("toml", Arc::new(ManifestLoader::new(ManifestFormat::Toml)));
        set.register("yaml", Arc::new(ManifestLoader::new(ManifestFormat::Yaml)));
        set.register("json", Arc::new(ManifestLoader::new(ManifestFormat::Json)));
        set.register(
            "sh",
            Arc::new(ShellModuleLoader::new(Duration::from_secs(
                shell.timeout_secs,
            ))),
        );
        set
    }

    /// Register `loader` for `extension`, replacing any previous one.
    pub fn register(&mut self, extension: &str, loader: Arc<dyn ModuleLoader>) {
        let extension = extension.trim_start_matches('.').to_string();
        debug!(%extension, "module loader registered");
        self.loaders.insert(extension, loader);
    }

    pub fn get(&self, extension: &str) -> Option<&Arc<dyn ModuleLoader>> {
        self.loaders.get(extension)
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.loaders.keys().cloned().collect();
        exts.sort();
        exts
    }

    /// Load `module` with the loader registered for its extension.
    pub async fn load(&self, module: &ResolvedModule) -> Result<Arc<dyn EngineModule>> {
        let loader = self
            .get(&module.extension)
            .ok_or_else(|| Error::NoLoader {
                extension: module.extension.clone(),
                path: module.path.clone(),
            })?;
        loader.load(module).await
    }
}

// ── Native modules ──────────────────────────────────────────────────────────

/// Modules compiled into the host, looked up by identifier.
///
/// The resolved file only acts as an on-switch: registering this loader for,
/// say, `native` makes `modules/<id>/index.native` enable the compiled-in
/// module `<id>`.
#[derive(Clone, Default)]
pub struct NativeLoader {
    modules: HashMap<String, Arc<dyn EngineModule>>,
}

impl NativeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_module(mut self, module: Arc<dyn EngineModule>) -> Self {
        self.register(module);
        self
    }

    pub fn register(&mut self, module: Arc<dyn EngineModule>) {
        self.modules.insert(module.name().to_string(), module);
    }
}

#[async_trait]
impl ModuleLoader for NativeLoader {
    async fn load(&self, module: &ResolvedModule) -> Result<Arc<dyn EngineModule>> {
        self.modules
            .get(&module.name)
            .cloned()
            .ok_or_else(|| Error::NotRegistered {
                name: module.name.clone(),
            })
    }
}

// ── Listener installed by declarative modules ───────────────────────────────

/// Listener that only records the event in the log.
///
/// Declarative modules have no host-side behaviour; subscribing is what
/// pulls their snippet into the injected script.
pub struct LoggingListener {
    module: String,
}

impl LoggingListener {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
        }
    }
}

#[async_trait]
impl EventListener for LoggingListener {
    fn name(&self) -> &str {
        &self.module
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        debug!(module = %self.module, event = %event.kind, "module observed event");
        Ok(())
    }
}
