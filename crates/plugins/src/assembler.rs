//! Builds the injected client script from the required snippets.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Replaced with the tracking endpoint path.
pub const TRACK_PATH_TOKEN: &str = "TRACK_PATH";
/// Replaced with the system-events endpoint path.
pub const SYSTEM_EVENTS_PATH_TOKEN: &str = "SYSTEM_EVENTS_PATH";
/// Snippet sources are `<snippets_dir>/<name>.js`.
pub const SNIPPET_EXTENSION: &str = "js";

/// Values substituted for the path tokens.
#[derive(Debug, Clone, Copy)]
pub struct PathTokens<'a> {
    pub track_path: &'a str,
    pub system_events_path: &'a str,
}

/// Replace every path token in `source`.
///
/// Tokens are matched against the original text only, so a substituted path
/// that happens to contain a token is never expanded again.
pub fn substitute_tokens(source: &str, tokens: PathTokens<'_>) -> String {
    let replacements = [
        (TRACK_PATH_TOKEN, tokens.track_path),
        (SYSTEM_EVENTS_PATH_TOKEN, tokens.system_events_path),
    ];

    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    loop {
        let next = replacements
            .iter()
            .filter_map(|(token, value)| rest.find(token).map(|at| (at, *token, *value)))
            .min_by_key(|(at, ..)| *at);
        let Some((at, token, value)) = next else {
            break;
        };
        out.push_str(&rest[..at]);
        out.push_str(value);
        rest = &rest[at + token.len()..];
    }
    out.push_str(rest);
    out
}

/// Reads snippet sources and concatenates them.
#[derive(Debug, Clone)]
pub struct ScriptAssembler {
    snippets_dir: PathBuf,
}

impl ScriptAssembler {
    pub fn new(snippets_dir: impl Into<PathBuf>) -> Self {
        Self {
            snippets_dir: snippets_dir.into(),
        }
    }

    pub fn snippets_dir(&self) -> &Path {
        &self.snippets_dir
    }

    pub fn snippet_path(&self, name: &str) -> PathBuf {
        self.snippets_dir.join(format!("{name}.{SNIPPET_EXTENSION}"))
    }

    /// Concatenate the substituted source of each snippet in `names`, in order.
    ///
    /// Snippets without a source file contribute nothing.
    pub fn assemble(&self, names: &[String], tokens: PathTokens<'_>) -> String {
        let mut script = String::new();
        for name in names {
            if let Some(source) = self.read_snippet(name) {
                script.push_str(&substitute_tokens(&source, tokens));
            }
        }
        script
    }

    fn read_snippet(&self, name: &str) -> Option<String> {
        if !graft_config::is_valid_identifier(name) {
            warn!(snippet = name, "skipping snippet with unsafe name");
            return None;
        }

        let path = self.snippet_path(name);
        match std::fs::read_to_string(&path) {
            Ok(source) => Some(source),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(snippet = name, path = %path.display(), "no snippet source");
                None
            },
            Err(e) => {
                warn!(snippet = name, path = %path.display(), error = %e, "failed to read snippet");
                None
            },
        }
    }
}
