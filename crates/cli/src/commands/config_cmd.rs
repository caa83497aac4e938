//! `tessera config`: configuration management commands.

use anyhow::{Context, bail};
use std::path::Path;
use tessera_config::AppConfig;
use tessera_core::agent::ProviderKind;

use crate::runtime::{config_file, load_config};

pub fn validate(config_path: Option<&Path>) -> anyhow::Result<()> {
    println!("Validating {}", config_file(config_path).display());
    let config = load_config(config_path)?;
    println!("  Config parsed successfully");

    let mut warnings = Vec::new();
    for credential in config.resolve_credentials() {
        if credential.secret.is_empty() && credential.provider != ProviderKind::Ollama {
            warnings.push(format!(
                "Credential '{}' has no secret{}",
                credential.id,
                credential
                    .provider
                    .api_key_env_var()
                    .map(|var| format!(" (set {var})"))
                    .unwrap_or_default()
            ));
        }
    }
    if config.workspace.root.as_ref().is_some_and(|root| !root.is_dir()) {
        warnings.push("Workspace root is not a directory; an in-memory workspace will be used".into());
    }

    if warnings.is_empty() {
        println!("  All checks passed");
    } else {
        for w in &warnings {
            println!("  warning: {w}");
        }
    }

    let agents = config.resolve_agents();
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Max turns: {}", config.orchestrator.max_turns);
    println!("  Agents:    {}", agents.len());
    if let Some(planner) = config.planner_id() {
        println!("  Planner:   {planner}");
    }
    Ok(())
}

pub fn path(config_path: Option<&Path>) {
    println!("{}", config_file(config_path).display());
}

pub fn init(config_path: Option<&Path>) -> anyhow::Result<()> {
    let path = config_file(config_path);
    if path.exists() {
        bail!("Config already exists at {}", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
