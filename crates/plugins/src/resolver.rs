//! Module resolution from the filesystem.
//!
//! A module `<id>` is implemented by `<modules_dir>/<id>/index.<ext>`. The
//! extensions are tried in configured priority order and the first existing
//! file wins, so a directory holding several formats resolves the same way on
//! every platform.

use std::path::{Path, PathBuf};

use {graft_config::PathsConfig, serde::Serialize, tracing::warn};

/// Basename of a module's implementation file.
pub const MODULE_ENTRY_STEM: &str = "index";

/// A module identifier mapped to its implementation file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedModule {
    pub name: String,
    pub path: PathBuf,
    /// Matched extension, without the leading dot.
    pub extension: String,
}

/// Maps module identifiers to implementation files.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    modules_dir: PathBuf,
    extensions: Vec<String>,
}

impl ModuleResolver {
    /// `extensions` are tried in order; a leading dot is optional.
    pub fn new<I, S>(modules_dir: impl Into<PathBuf>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            modules_dir: modules_dir.into(),
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn from_config(paths: &PathsConfig) -> Self {
        Self::new(&paths.modules_dir, paths.normalized_extensions())
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Candidate files for `name`, in the order they are tried.
    pub fn candidates(&self, name: &str) -> Vec<(String, PathBuf)> {
        let dir = self.modules_dir.join(name);
        self.extensions
            .iter()
            .map(|ext| (ext.clone(), dir.join(format!("{MODULE_ENTRY_STEM}.{ext}"))))
            .collect()
    }

    /// Find the implementation of `name`, or `None` if no candidate exists.
    pub fn resolve(&self, name: &str) -> Option<ResolvedModule> {
        if !graft_config::is_valid_identifier(name) {
            warn!(module = name, "refusing to resolve invalid module identifier");
            return None;
        }

        self.candidates(name)
            .into_iter()
            .find(|(_, path)| path.is_file())
            .map(|(extension, path)| ResolvedModule {
                name: name.to_string(),
                path,
                extension,
            })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn write_module(root: &Path, name: &str, ext: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("index.{ext}")), "").unwrap();
    }

    #[test]
    fn resolves_single_candidate() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(tmp.path(), "track", "json");

        let resolver = ModuleResolver::new(tmp.path(), ["toml", "yaml", "json", "sh"]);
        let resolved = resolver.resolve("track").unwrap();
        assert_eq!(resolved.name, "track");
        assert_eq!(resolved.extension, "json");
        assert_eq!(resolved.path, tmp.path().join("track/index.json"));
    }

    #[test]
    fn earliest_extension_wins() {
        let tmp = tempfile::tempdir().unwrap();
        // Written in reverse priority so creation order can't explain the result.
        for ext in ["sh", "json", "yaml"] {
            write_module(tmp.path(), "track", ext);
        }

        let resolver = ModuleResolver::new(tmp.path(), ["toml", "yaml", "json", "sh"]);
        assert_eq!(resolver.resolve("track").unwrap().extension, "yaml");

        let reversed = ModuleResolver::new(tmp.path(), ["sh", "json", "yaml", "toml"]);
        assert_eq!(reversed.resolve("track").unwrap().extension, "sh");
    }

    #[test]
    fn missing_module_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = ModuleResolver::new(tmp.path(), ["toml"]);
        assert!(resolver.resolve("custom").is_none());
    }

    #[test]
    fn unlisted_extension_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(tmp.path(), "track", "py");
        let resolver = ModuleResolver::new(tmp.path(), ["toml", "sh"]);
        assert!(resolver.resolve("track").is_none());
    }

    #[test]
    fn directory_named_like_candidate_is_not_a_match() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("track/index.toml")).unwrap();
        write_module(tmp.path(), "track", "sh");
        let resolver = ModuleResolver::new(tmp.path(), ["toml", "sh"]);
        assert_eq!(resolver.resolve("track").unwrap().extension, "sh");
    }

    #[test]
    fn invalid_identifiers_never_resolve() {
        let tmp = tempfile::tempdir().unwrap();
        let modules = tmp.path().join("modules");
        std::fs::create_dir_all(&modules).unwrap();
        std::fs::write(tmp.path().join("index.toml"), "").unwrap();

        let resolver = ModuleResolver::new(&modules, ["toml"]);
        assert!(resolver.resolve("..").is_none());
        assert!(resolver.resolve("").is_none());
    }

    #[test]
    fn leading_dots_normalized() {
        let resolver = ModuleResolver::new("modules", [".toml", "sh", ""]);
        assert_eq!(resolver.extensions(), ["toml", "sh"]);
        let candidates = resolver.candidates("track");
        assert_eq!(candidates[0].1, PathBuf::from("modules/track/index.toml"));
        assert_eq!(candidates[1].1, PathBuf::from("modules/track/index.sh"));
    }
}
