//! Config schema types: configured modules, path tokens, and lookup directories.

use std::{collections::BTreeMap, path::PathBuf};

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

/// Module file extensions, in resolution priority order.
pub const DEFAULT_MODULE_EXTENSIONS: &[&str] = &["toml", "yaml", "json", "sh"];

/// Root configuration.
///
/// `modules`, `track_path` and `system_events_path` are required; there is no
/// meaningful default for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraftConfig {
    /// Path substituted for the `TRACK_PATH` token in snippets.
    pub track_path: String,
    /// Path substituted for the `SYSTEM_EVENTS_PATH` token in snippets.
    pub system_events_path: String,
    /// Modules to load, in order.
    pub modules: Vec<ModuleDescriptor>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub shell: ShellConfig,
}

impl GraftConfig {
    pub fn new(
        track_path: impl Into<String>,
        system_events_path: impl Into<String>,
        modules: Vec<ModuleDescriptor>,
    ) -> Self {
        Self {
            track_path: track_path.into(),
            system_events_path: system_events_path.into(),
            modules,
            paths: PathsConfig::default(),
            shell: ShellConfig::default(),
        }
    }

    #[must_use]
    pub fn with_paths(mut self, paths: PathsConfig) -> Self {
        self.paths = paths;
        self
    }
}

/// Where modules and snippets are looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root holding `<id>/index.<ext>` module directories.
    pub modules_dir: PathBuf,
    /// Root holding `<snippet>.js` sources.
    pub snippets_dir: PathBuf,
    /// Module file extensions tried in order. A leading dot is optional.
    pub module_extensions: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            modules_dir: PathBuf::from("modules"),
            snippets_dir: PathBuf::from("browser"),
            module_extensions: DEFAULT_MODULE_EXTENSIONS
                .iter()
                .map(|e| (*e).to_string())
                .collect(),
        }
    }
}

impl PathsConfig {
    /// Extensions with any leading dot removed and empty entries dropped.
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.module_extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .collect()
    }
}

/// Settings for shell-backed modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Seconds a module script may run before it is killed.
    pub timeout_secs: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

// ── ModuleDescriptor ────────────────────────────────────────────────────────

/// A configured module: a bare identifier or `{ identifier = settings }`.
///
/// Settings are opaque to the engine and forwarded to the module untouched.
/// A bare identifier carries an empty object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDescriptor", into = "RawDescriptor")]
pub struct ModuleDescriptor {
    name: String,
    settings: Value,
    bare: bool,
}

impl ModuleDescriptor {
    /// A module without settings.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: Value::Object(serde_json::Map::new()),
            bare: true,
        }
    }

    /// A module with an explicit settings value.
    pub fn with_settings(name: impl Into<String>, settings: Value) -> Self {
        Self {
            name: name.into(),
            settings,
            bare: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Value {
        &self.settings
    }
}

/// Whether `name` can be used as a path segment under the modules or
/// snippets directory.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawDescriptor {
    Named(String),
    Configured(BTreeMap<String, Value>),
}

impl TryFrom<RawDescriptor> for ModuleDescriptor {
    type Error = String;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        match raw {
            RawDescriptor::Named(name) => Ok(Self::named(name)),
            RawDescriptor::Configured(map) => {
                if map.len() != 1 {
                    return Err(format!(
                        "module entry must have exactly one key, found {}",
                        map.len()
                    ));
                }
                let Some((name, settings)) = map.into_iter().next() else {
                    return Err("module entry must have exactly one key, found 0".into());
                };
                Ok(Self::with_settings(name, settings))
            },
        }
    }
}

impl From<ModuleDescriptor> for RawDescriptor {
    fn from(desc: ModuleDescriptor) -> Self {
        if desc.bare {
            Self::Named(desc.name)
        } else {
            Self::Configured(BTreeMap::from([(desc.name, desc.settings)]))
        }
    }
}
