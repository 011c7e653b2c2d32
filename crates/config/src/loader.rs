use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::GraftConfig,
};

/// Standard config file names, checked in order.
pub const CONFIG_FILENAMES: &[&str] = &["graft.toml", "graft.yaml", "graft.yml", "graft.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<GraftConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./graft.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/graft/graft.{toml,yaml,yml,json}` (user-global)
///
/// Unlike most settings, the module list has no sensible default, so a
/// missing file is an error.
pub fn discover_and_load() -> Result<(PathBuf, GraftConfig)> {
    let path = find_config_file().ok_or(Error::NotFound)?;
    debug!(path = %path.display(), "loading config");
    let config = load_config(&path)?;
    Ok((path, config))
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    find_config_in(Path::new(".")).or_else(|| config_dir().and_then(|dir| find_config_in(&dir)))
}

fn find_config_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// Returns the user-global config directory (`~/.config/graft/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "graft").map(|d| d.config_dir().to_path_buf())
}

/// Parse already-substituted config text, picking the format from `path`.
pub fn parse_config(raw: &str, path: &Path) -> Result<GraftConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn loads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("graft.toml");
        std::fs::write(
            &path,
            r#"
track_path = "/t"
system_events_path = "/e"
modules = ["track"]

[paths]
modules_dir = "plugins"
"#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.track_path, "/t");
        assert_eq!(cfg.paths.modules_dir, PathBuf::from("plugins"));
        assert_eq!(cfg.paths.snippets_dir, PathBuf::from("browser"));
    }

    #[test]
    fn loads_yaml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("graft.yaml");
        std::fs::write(
            &path,
            "track_path: /t\nsystem_events_path: /e\nmodules:\n  - track\n  - custom:\n      x: 1\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.modules[0].name(), "track");
        assert_eq!(cfg.modules[1].name(), "custom");
        assert_eq!(cfg.modules[1].settings(), &json!({"x": 1}));
    }

    #[test]
    fn loads_json_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("graft.json");
        std::fs::write(
            &path,
            r#"{"track_path":"/t","system_events_path":"/e","modules":[{"custom":{"x":1}}]}"#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.modules[0].settings(), &json!({"x": 1}));
    }

    #[test]
    fn unsupported_extension_rejected() {
        let err = parse_config("", Path::new("graft.ini")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
        assert_eq!(err.to_string(), "unsupported config format: .ini");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/graft.toml")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/graft.toml"));
    }

    #[test]
    fn find_config_prefers_toml() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("graft.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("graft.toml"), "").unwrap();
        assert_eq!(
            find_config_in(tmp.path()).unwrap(),
            tmp.path().join("graft.toml")
        );
    }
}
