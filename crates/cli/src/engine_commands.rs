//! Commands that build an engine from the loaded configuration.

use std::sync::Arc;

use {
    anyhow::Result,
    graft_config::GraftConfig,
    graft_plugins::{Engine, MemoryStore, ModuleStatus},
    tracing::debug,
};

fn engine(config: GraftConfig) -> Engine {
    Engine::builder(config, Arc::new(MemoryStore::new())).start()
}

/// Print the injected script once every module has settled.
pub async fn script(config: GraftConfig) -> Result<()> {
    let engine = engine(config);
    let report = engine.ready().await;
    debug!(
        failed = report.failed().count(),
        snippets = engine.required_snippets().len(),
        "engine ready"
    );
    print!("{}", engine.injected_script());
    Ok(())
}

/// Print the settled snippet requirement set.
pub async fn snippets(config: GraftConfig, json: bool) -> Result<()> {
    let engine = engine(config);
    engine.ready().await;
    let names = engine.required_snippets();

    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
        return Ok(());
    }

    for name in &names {
        println!("  {name}");
    }
    Ok(())
}

/// Show how each configured module resolves, then load them and report the
/// outcome.
pub async fn modules(config: GraftConfig, json: bool) -> Result<()> {
    let engine = engine(config);
    let report = engine.ready().await;

    if json {
        let entries: Vec<serde_json::Value> = engine
            .modules()
            .iter()
            .zip(&report.modules)
            .map(|(descriptor, outcome)| {
                let resolved = engine.resolver().resolve(descriptor.name());
                serde_json::json!({
                    "name": descriptor.name(),
                    "settings": descriptor.settings(),
                    "resolved": resolved,
                    "outcome": outcome,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if report.modules.is_empty() {
        println!("No modules configured.");
        return Ok(());
    }

    for outcome in &report.modules {
        match &outcome.status {
            ModuleStatus::Loaded { path } => {
                println!("  ✓ {}: {}", outcome.name, path.display());
            },
            ModuleStatus::Skipped => {
                println!("  - {}: not found", outcome.name);
                for (_, candidate) in engine.resolver().candidates(&outcome.name) {
                    println!("    ↳ tried {}", candidate.display());
                }
            },
            ModuleStatus::Failed { path, error } => {
                println!("  ✗ {}: {}", outcome.name, path.display());
                println!("    ↳ {error}");
            },
        }
    }
    Ok(())
}
