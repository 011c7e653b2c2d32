//! Configuration validation.
//!
//! Parses a config file, then reports problems that would make modules or
//! snippets silently disappear at runtime: malformed identifiers, duplicate
//! modules, unusable extension lists, and missing lookup directories.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::{
    env_subst::substitute_env,
    loader::{find_config_file, parse_config},
    schema::{DEFAULT_MODULE_EXTENSIONS, GraftConfig, is_valid_identifier},
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "type-error", "path", "module", "extension",
    /// "file-ref", "shell"
    pub category: &'static str,
    /// Dotted path, e.g. "modules[2]"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Validate the config at `path`, or the discovered one when `None`.
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path.map(Path::to_path_buf).or_else(find_config_file);

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "file-ref",
                "",
                "no config file found",
            )],
            config_path: None,
        };
    };

    let mut result = match std::fs::read_to_string(&actual_path) {
        Ok(raw) => validate_str(&substitute_env(&raw), &actual_path),
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate config text without touching the filesystem beyond the
/// directory checks. `path` only selects the format.
#[must_use]
pub fn validate_str(raw: &str, path: &Path) -> ValidationResult {
    let mut diagnostics = Vec::new();

    match parse_config(raw, path) {
        Ok(config) => {
            diagnostics.extend(validate_config(&config));
            check_directories(&config, &mut diagnostics);
        },
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("failed to parse config: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Semantic checks on an already-parsed config.
#[must_use]
pub fn validate_config(config: &GraftConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    check_token_paths(config, &mut diagnostics);
    check_modules(config, &mut diagnostics);
    check_extensions(config, &mut diagnostics);

    if config.shell.timeout_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "shell",
            "shell.timeout_secs",
            "timeout of 0 seconds fails every shell module",
        ));
    }

    diagnostics
}

fn check_token_paths(config: &GraftConfig, diagnostics: &mut Vec<Diagnostic>) {
    for (field, value) in [
        ("track_path", &config.track_path),
        ("system_events_path", &config.system_events_path),
    ] {
        if value.trim().is_empty() {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "path",
                field,
                "path must not be empty",
            ));
        } else if !value.starts_with('/') && !value.contains("://") {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "path",
                field,
                format!("\"{value}\" is relative; snippets resolve it against the page URL"),
            ));
        }
    }

    if !config.track_path.is_empty() && config.track_path == config.system_events_path {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "path",
            "system_events_path",
            "tracking and system-events paths are identical",
        ));
    }
}

fn check_modules(config: &GraftConfig, diagnostics: &mut Vec<Diagnostic>) {
    if config.modules.is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "module",
            "modules",
            "no modules configured; only the baseline snippet will be injected",
        ));
        return;
    }

    let mut seen = HashSet::new();
    for (idx, module) in config.modules.iter().enumerate() {
        let path = format!("modules[{idx}]");
        let name = module.name();
        if !is_valid_identifier(name) {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "module",
                path,
                format!("\"{name}\" is not a valid module identifier"),
            ));
            continue;
        }
        if !seen.insert(name) {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "module",
                path,
                format!("module \"{name}\" is configured more than once and will initialize twice"),
            ));
        }
    }
}

fn check_extensions(config: &GraftConfig, diagnostics: &mut Vec<Diagnostic>) {
    let extensions = config.paths.normalized_extensions();
    if extensions.is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "extension",
            "paths.module_extensions",
            "no module extensions configured; no module can be resolved",
        ));
        return;
    }

    let mut seen = HashSet::new();
    for ext in &extensions {
        if !seen.insert(ext.as_str()) {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "extension",
                "paths.module_extensions",
                format!("extension \".{ext}\" is listed more than once"),
            ));
        } else if !DEFAULT_MODULE_EXTENSIONS.contains(&ext.as_str()) {
            diagnostics.push(Diagnostic::new(
                Severity::Info,
                "extension",
                "paths.module_extensions",
                format!("extension \".{ext}\" has no built-in loader; register one when embedding"),
            ));
        }
    }
}

fn check_directories(config: &GraftConfig, diagnostics: &mut Vec<Diagnostic>) {
    for (field, dir) in [
        ("paths.modules_dir", &config.paths.modules_dir),
        ("paths.snippets_dir", &config.paths.snippets_dir),
    ] {
        if !dir.is_dir() {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "file-ref",
                field,
                format!("directory {} does not exist", dir.display()),
            ));
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ModuleDescriptor, PathsConfig};

    fn config(modules: Vec<ModuleDescriptor>) -> GraftConfig {
        GraftConfig::new("/t", "/e", modules)
    }

    fn categories(diags: &[Diagnostic]) -> Vec<(&'static str, Severity)> {
        diags.iter().map(|d| (d.category, d.severity)).collect()
    }

    #[test]
    fn clean_config_has_no_semantic_diagnostics() {
        let diags = validate_config(&config(vec![ModuleDescriptor::named("track")]));
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn empty_track_path_is_error() {
        let mut cfg = config(vec![ModuleDescriptor::named("track")]);
        cfg.track_path = String::new();
        let diags = validate_config(&cfg);
        assert_eq!(categories(&diags), vec![("path", Severity::Error)]);
        assert_eq!(diags[0].path, "track_path");
    }

    #[test]
    fn relative_path_is_warning() {
        let mut cfg = config(vec![ModuleDescriptor::named("track")]);
        cfg.system_events_path = "events".into();
        let diags = validate_config(&cfg);
        assert_eq!(categories(&diags), vec![("path", Severity::Warning)]);
    }

    #[test]
    fn absolute_url_is_accepted() {
        let mut cfg = config(vec![ModuleDescriptor::named("track")]);
        cfg.track_path = "https://collector.example/t".into();
        assert!(validate_config(&cfg).is_empty());
    }

    #[test]
    fn identical_paths_warned() {
        let mut cfg = config(vec![ModuleDescriptor::named("track")]);
        cfg.system_events_path = "/t".into();
        let diags = validate_config(&cfg);
        assert_eq!(categories(&diags), vec![("path", Severity::Warning)]);
    }

    #[test]
    fn invalid_identifier_is_error() {
        let diags = validate_config(&config(vec![ModuleDescriptor::named("../escape")]));
        assert_eq!(categories(&diags), vec![("module", Severity::Error)]);
        assert_eq!(diags[0].path, "modules[0]");
    }

    #[test]
    fn duplicate_module_warned() {
        let diags = validate_config(&config(vec![
            ModuleDescriptor::named("track"),
            ModuleDescriptor::with_settings("track", serde_json::json!({"x": 1})),
        ]));
        assert_eq!(categories(&diags), vec![("module", Severity::Warning)]);
        assert_eq!(diags[0].path, "modules[1]");
    }

    #[test]
    fn no_modules_is_info() {
        let diags = validate_config(&config(vec![]));
        assert_eq!(categories(&diags), vec![("module", Severity::Info)]);
    }

    #[test]
    fn empty_extension_list_is_error() {
        let cfg = config(vec![ModuleDescriptor::named("track")]).with_paths(PathsConfig {
            module_extensions: vec![".".into()],
            ..PathsConfig::default()
        });
        let diags = validate_config(&cfg);
        assert_eq!(categories(&diags), vec![("extension", Severity::Error)]);
    }

    #[test]
    fn custom_and_duplicate_extensions_reported() {
        let cfg = config(vec![ModuleDescriptor::named("track")]).with_paths(PathsConfig {
            module_extensions: vec!["toml".into(), ".toml".into(), "native".into()],
            ..PathsConfig::default()
        });
        let diags = validate_config(&cfg);
        assert_eq!(categories(&diags), vec![
            ("extension", Severity::Warning),
            ("extension", Severity::Info),
        ]);
    }

    #[test]
    fn zero_shell_timeout_warned() {
        let mut cfg = config(vec![ModuleDescriptor::named("track")]);
        cfg.shell.timeout_secs = 0;
        let diags = validate_config(&cfg);
        assert_eq!(categories(&diags), vec![("shell", Severity::Warning)]);
    }

    #[test]
    fn parse_failure_is_type_error() {
        let result = validate_str("track_path = \"/t\"", Path::new("graft.toml"));
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].category, "type-error");
    }

    #[test]
    fn missing_directories_warned() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = format!(
            "track_path = \"/t\"\nsystem_events_path = \"/e\"\nmodules = []\n[paths]\nmodules_dir = \"{}\"\nsnippets_dir = \"{}\"\n",
            tmp.path().join("nope-modules").display(),
            tmp.path().display(),
        );
        let result = validate_str(&raw, Path::new("graft.toml"));
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 1);
        let warn = result
            .diagnostics
            .iter()
            .find(|d| d.severity == Severity::Warning)
            .unwrap();
        assert_eq!(warn.path, "paths.modules_dir");
    }

    #[test]
    fn validate_reads_file_and_records_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("graft.json");
        std::fs::write(&path, "{ not json").unwrap();
        let result = validate(Some(&path));
        assert!(result.has_errors());
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
    }
}
