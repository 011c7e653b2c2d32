//! Declarative modules described by a manifest file.
//!
//! A manifest lists the events the module listens for and default state it
//! seeds into the key-value store:
//! ```text
//! description = "Outbound link tracking"
//! events = ["click", "visibility"]
//!
//! [state]
//! "outbound.enabled" = true
//!
//! [requires]
//! settings = ["site_id"]
//! ```
//! The same shape is accepted as YAML or JSON.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use {
    anyhow::bail,
    async_trait::async_trait,
    graft_common::events::ListenerOptions,
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tracing::{debug, warn},
};

use crate::{
    engine::Engine,
    error::{Error, Result},
    module::{EngineModule, LoggingListener, ModuleLoader},
    resolver::ResolvedModule,
};

/// File formats a manifest can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Toml,
    Yaml,
    Json,
}

/// Settings keys a module refuses to start without.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestRequirements {
    #[serde(default)]
    pub settings: Vec<String>,
}

/// Parsed module manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub state: BTreeMap<String, Value>,
    #[serde(default)]
    pub requires: ManifestRequirements,
}

/// Parse manifest text in the given format.
pub fn parse_manifest(raw: &str, format: ManifestFormat) -> Result<ModuleManifest> {
    if raw.trim().is_empty() {
        return Ok(ModuleManifest::default());
    }
    let manifest = match format {
        ManifestFormat::Toml => toml::from_str(raw)?,
        ManifestFormat::Yaml => serde_yaml::from_str(raw)?,
        ManifestFormat::Json => serde_json::from_str(raw)?,
    };
    Ok(manifest)
}

/// Event subscriptions and state writes a module declares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Declarations {
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub state: BTreeMap<String, Value>,
}

impl Declarations {
    /// Write state and subscribe to events on behalf of `module`.
    ///
    /// With `keep_existing`, keys already present in the store are left alone.
    pub fn apply(&self, engine: &Engine, module: &str, keep_existing: bool) {
        for (key, value) in &self.state {
            if keep_existing && engine.get(key).is_some() {
                debug!(module, key = %key, "state already set, keeping existing value");
                continue;
            }
            if !engine.set(key, value.clone()) {
                warn!(module, key = %key, "store refused state write");
            }
        }

        for kind in &self.events {
            engine.add_event_listener(
                kind,
                Arc::new(LoggingListener::new(module)),
                ListenerOptions::default(),
            );
        }
    }
}

/// A module whose whole behaviour is its manifest.
pub struct ManifestModule {
    module_name: String,
    manifest: ModuleManifest,
    source_path: PathBuf,
}

impl ManifestModule {
    pub fn new(name: impl Into<String>, manifest: ModuleManifest, source_path: PathBuf) -> Self {
        Self {
            module_name: name.into(),
            manifest,
            source_path,
        }
    }

    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    fn check_settings(&self, settings: &Value) -> anyhow::Result<()> {
        for key in &self.manifest.requires.settings {
            match settings.get(key) {
                Some(v) if !v.is_null() => {},
                _ => bail!(
                    "module '{}' ({}) requires setting '{key}'",
                    self.module_name,
                    self.source_path.display()
                ),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EngineModule for ManifestModule {
    fn name(&self) -> &str {
        &self.module_name
    }

    async fn init(&self, engine: Engine, settings: Value) -> anyhow::Result<()> {
        self.check_settings(&settings)?;

        let declarations = Declarations {
            events: self.manifest.events.clone(),
            state: self.manifest.state.clone(),
        };
        declarations.apply(&engine, &self.module_name, true);
        Ok(())
    }
}

/// Loads `index.{toml,yaml,json}` manifests.
pub struct ManifestLoader {
    format: ManifestFormat,
}

impl ManifestLoader {
    pub fn new(format: ManifestFormat) -> Self {
        Self { format }
    }
}

#[async_trait]
impl ModuleLoader for ManifestLoader {
    async fn load(&self, module: &ResolvedModule) -> Result<Arc<dyn EngineModule>> {
        let raw = tokio::fs::read_to_string(&module.path).await?;
        let manifest = parse_manifest(&raw, self.format)
            .map_err(|e| Error::invalid_manifest(&module.path, e.to_string()))?;
        debug!(module = %module.name, events = manifest.events.len(), "manifest parsed");
        Ok(Arc::new(ManifestModule::new(
            module.name.clone(),
            manifest,
            module.path.clone(),
        )))
    }
}
