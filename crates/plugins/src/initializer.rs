//! Loads every configured module against the shared engine.
//!
//! Modules are resolved and loaded one at a time in configuration order, and
//! their entry points are started in that same order. Entry points then run
//! concurrently on the initializing task, so a module that suspends for a
//! long time holds back nobody but itself. A module that cannot be resolved
//! is skipped; one that fails to load or initialize is logged and recorded,
//! and the rest carry on.

use std::{any::Any, panic::AssertUnwindSafe, path::PathBuf};

use {
    futures::{FutureExt, future::join_all},
    graft_config::ModuleDescriptor,
    serde::Serialize,
    tracing::{debug, info, warn},
};

use crate::{engine::Engine, module::LoaderSet, resolver::ModuleResolver};

/// What happened to one configured module.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ModuleStatus {
    /// Resolved, loaded, and its entry point returned successfully.
    Loaded { path: PathBuf },
    /// No implementation file exists.
    Skipped,
    /// Loading or the entry point failed.
    Failed { path: PathBuf, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: ModuleStatus,
}

/// Outcome of one initialization run, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InitReport {
    pub modules: Vec<ModuleOutcome>,
}

impl InitReport {
    pub fn loaded(&self) -> impl Iterator<Item = &ModuleOutcome> {
        self.modules
            .iter()
            .filter(|m| matches!(m.status, ModuleStatus::Loaded { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ModuleOutcome> {
        self.modules
            .iter()
            .filter(|m| matches!(m.status, ModuleStatus::Skipped))
    }

    pub fn failed(&self) -> impl Iterator<Item = &ModuleOutcome> {
        self.modules
            .iter()
            .filter(|m| matches!(m.status, ModuleStatus::Failed { .. }))
    }

    /// Status of the first module configured under `name`.
    pub fn status_of(&self, name: &str) -> Option<&ModuleStatus> {
        self.modules
            .iter()
            .find(|m| m.name == name)
            .map(|m| &m.status)
    }
}

/// Drives resolution, loading and entry-point invocation.
pub struct ModuleInitializer<'a> {
    resolver: &'a ModuleResolver,
    loaders: &'a LoaderSet,
}

impl<'a> ModuleInitializer<'a> {
    pub fn new(resolver: &'a ModuleResolver, loaders: &'a LoaderSet) -> Self {
        Self { resolver, loaders }
    }

    /// Initialize `modules` against `engine`. Never fails; per-module problems
    /// are in the returned report.
    pub async fn run(&self, engine: &Engine, modules: &[ModuleDescriptor]) -> InitReport {
        let mut outcomes = Vec::with_capacity(modules.len());
        let mut pending = Vec::new();

        for descriptor in modules {
            let name = descriptor.name().to_string();

            let Some(resolved) = self.resolver.resolve(&name) else {
                debug!(module = %name, "no implementation found, skipping");
                outcomes.push(ModuleOutcome {
                    name,
                    status: ModuleStatus::Skipped,
                });
                continue;
            };

            let module = match self.loaders.load(&resolved).await {
                Ok(module) => module,
                Err(e) => {
                    warn!(module = %name, path = %resolved.path.display(), error = %e, "failed to load module");
                    outcomes.push(ModuleOutcome {
                        name,
                        status: ModuleStatus::Failed {
                            path: resolved.path,
                            error: e.to_string(),
                        },
                    });
                    continue;
                },
            };

            info!(module = %name, path = %resolved.path.display(), "loading module");

            let index = outcomes.len();
            outcomes.push(ModuleOutcome {
                name: name.clone(),
                status: ModuleStatus::Loaded {
                    path: resolved.path.clone(),
                },
            });

            let engine = engine.clone();
            let settings = descriptor.settings().clone();
            let path = resolved.path;
            pending.push(async move {
                let result = AssertUnwindSafe(module.init(engine, settings))
                    .catch_unwind()
                    .await;
                let error = match result {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(format!("{e:#}")),
                    Err(panic) => Some(format!("panicked: {}", panic_message(&*panic))),
                };
                (index, name, path, error)
            });
        }

        for (index, name, path, error) in join_all(pending).await {
            let Some(error) = error else {
                debug!(module = %name, "module initialized");
                continue;
            };
            warn!(module = %name, path = %path.display(), error = %error, "module failed to initialize");
            outcomes[index].status = ModuleStatus::Failed { path, error };
        }

        outcomes.into()
    }
}

impl From<Vec<ModuleOutcome>> for InitReport {
    fn from(modules: Vec<ModuleOutcome>) -> Self {
        Self { modules }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
