//! Configuration loading, validation, and env substitution.
//!
//! Config files: `graft.toml`, `graft.yaml`, `graft.yml`, or `graft.json`
//! Searched in `./` then `~/.config/graft/`.
//!
//! Supports `${ENV_VAR}` substitution in the raw file text.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, find_config_file, load_config, parse_config},
    schema::{
        DEFAULT_MODULE_EXTENSIONS, GraftConfig, ModuleDescriptor, PathsConfig, ShellConfig,
        is_valid_identifier,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
