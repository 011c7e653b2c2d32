//! Modules implemented as shell scripts.
//!
//! `index.sh` runs once per initialization with `sh`, from the module's own
//! directory. It receives `{"module": <id>, "settings": {...}}` as JSON on
//! stdin and may print its declarations on stdout:
//!
//! - Exit 0, no stdout → nothing declared
//! - Exit 0, stdout `{"events": [...], "state": {...}}` → listeners added, state written
//! - Any other exit code → module failure with stderr as the reason
//! - Timeout → module failure, the child is killed

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use {
    anyhow::{Context, bail},
    async_trait::async_trait,
    serde_json::Value,
    tokio::{io::AsyncWriteExt, process::Command},
    tracing::debug,
};

use crate::{
    engine::Engine,
    error::Result,
    manifest::Declarations,
    module::{EngineModule, ModuleLoader},
    resolver::ResolvedModule,
};

/// A module backed by a shell script.
pub struct ShellModule {
    module_name: String,
    script: PathBuf,
    timeout: Duration,
}

impl ShellModule {
    pub fn new(name: impl Into<String>, script: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            module_name: name.into(),
            script: script.into(),
            timeout,
        }
    }

    async fn run(&self, engine: &Engine, settings: &Value) -> anyhow::Result<String> {
        let input = serde_json::to_string(&serde_json::json!({
            "module": self.module_name,
            "settings": settings,
        }))
        .context("failed to serialize module input")?;

        let script = std::path::absolute(&self.script)
            .with_context(|| format!("failed to resolve {}", self.script.display()))?;
        let workdir = script.parent().unwrap_or(Path::new("."));
        let mut child = Command::new("sh")
            .arg(&script)
            .current_dir(workdir)
            .env("GRAFT_MODULE", &self.module_name)
            .env("GRAFT_TRACK_PATH", engine.track_path())
            .env("GRAFT_SYSTEM_EVENTS_PATH", engine.system_events_path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", script.display()))?;

        let stdin = child.stdin.take();
        let completion = async move {
            // The script may exit without reading stdin.
            if let Some(mut stdin) = stdin
                && let Err(e) = stdin.write_all(input.as_bytes()).await
                && e.kind() != std::io::ErrorKind::BrokenPipe
            {
                return Err(e);
            }
            child.wait_with_output().await
        };

        let output = tokio::time::timeout(self.timeout, completion)
            .await
            .with_context(|| {
                format!(
                    "module '{}' timed out after {:?}",
                    self.module_name, self.timeout
                )
            })?
            .with_context(|| format!("module '{}' failed to complete", self.module_name))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        debug!(
            module = %self.module_name,
            exit_code = output.status.code(),
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "shell module completed"
        );

        if !output.status.success() {
            bail!(
                "module '{}' exited with {}: {}",
                self.module_name,
                output.status,
                stderr.trim()
            );
        }

        Ok(stdout.trim().to_string())
    }
}

#[async_trait]
impl EngineModule for ShellModule {
    fn name(&self) -> &str {
        &self.module_name
    }

    async fn init(&self, engine: Engine, settings: Value) -> anyhow::Result<()> {
        let stdout = self.run(&engine, &settings).await?;
        if stdout.is_empty() {
            return Ok(());
        }

        let declarations: Declarations = serde_json::from_str(&stdout).with_context(|| {
            format!(
                "module '{}' printed invalid declarations",
                self.module_name
            )
        })?;
        declarations.apply(&engine, &self.module_name, false);
        Ok(())
    }
}

/// Loads `index.sh` modules.
pub struct ShellModuleLoader {
    timeout: Duration,
}

impl ShellModuleLoader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ModuleLoader for ShellModuleLoader {
    async fn load(&self, module: &ResolvedModule) -> Result<Arc<dyn EngineModule>> {
        Ok(Arc::new(ShellModule::new(
            module.name.clone(),
            module.path.clone(),
            self.timeout,
        )))
    }
}
