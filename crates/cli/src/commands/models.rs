//! `tessera models`: list the models each credential can use.

use std::path::Path;
use tessera_config::AppConfig;
use tessera_core::agent::{Credential, ProviderKind};
use tessera_providers::catalog::fetch_available_models;

use crate::runtime::load_config;

pub async fn run(config_path: Option<&Path>, provider: Option<ProviderKind>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    for credential in credentials_for(&config, provider) {
        let api_url = config
            .provider(credential.provider)
            .and_then(|p| p.api_url.as_deref());
        let models = fetch_available_models(&credential, api_url).await;

        let label = if credential.alias.is_empty() {
            credential.id.clone()
        } else {
            format!("{} ({})", credential.id, credential.alias)
        };
        println!("{label} [{}]", credential.provider);
        for model in models {
            println!("  {model}");
        }
    }
    Ok(())
}

/// Configured credentials, narrowed to one provider kind. A kind with no
/// credential gets one built from its provider settings and environment.
fn credentials_for(config: &AppConfig, kind: Option<ProviderKind>) -> Vec<Credential> {
    let credentials = config.resolve_credentials();
    let Some(kind) = kind else {
        return credentials;
    };

    let matching: Vec<Credential> = credentials
        .into_iter()
        .filter(|c| c.provider == kind)
        .collect();
    if !matching.is_empty() {
        return matching;
    }

    let secret = config
        .provider(kind)
        .and_then(|p| p.api_key.clone())
        .or_else(|| kind.api_key_env_var().and_then(|var| std::env::var(var).ok()))
        .unwrap_or_default();
    vec![Credential {
        id: kind.as_str().to_string(),
        provider: kind,
        secret,
        alias: String::new(),
    }]
}
