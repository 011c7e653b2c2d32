//! Plugin composition: module resolution and loading, the event surface, and
//! assembly of the injected client script.
//!
//! Modules live under `modules/<id>/index.<ext>` and are loaded through the
//! [`module::LoaderSet`] entry for their extension. While initializing, a
//! module registers event listeners on the [`Engine`]; every event type it
//! listens for marks the client snippet of the same name as required, and
//! [`Engine::injected_script`] concatenates those snippets from
//! `browser/<name>.js`.

pub mod assembler;
pub mod engine;
pub mod error;
pub mod events;
pub mod initializer;
pub mod manifest;
pub mod module;
pub mod resolver;
pub mod shell_module;
pub mod snippets;
pub mod store;

pub use {
    engine::{Engine, EngineBuilder},
    error::{Error, Result},
    initializer::{InitReport, ModuleOutcome, ModuleStatus},
    module::{EngineModule, LoaderSet, ModuleLoader, NativeLoader},
    resolver::{ModuleResolver, ResolvedModule},
    snippets::{BASELINE_SNIPPET, SnippetRegistry},
    store::{KeyValueStore, MemoryStore},
};
