//! Model catalog.
//!
//! Live listing with a uniform fallback: any transport or parse failure, and
//! an empty live list, yield the provider's static default models.

use tessera_core::agent::{Credential, ProviderKind};
use tessera_core::provider::Provider;
use tracing::{debug, warn};

use crate::router::build_provider;

fn defaults(kind: ProviderKind) -> Vec<String> {
    kind.default_models().iter().map(|m| m.to_string()).collect()
}

/// List the models available to a credential, never failing.
pub async fn fetch_available_models(credential: &Credential, api_url: Option<&str>) -> Vec<String> {
    let provider = build_provider(credential, api_url);
    models_or_defaults(provider.as_ref()).await
}

/// `Provider::list_models`, falling back to the static list.
pub async fn models_or_defaults(provider: &dyn Provider) -> Vec<String> {
    let kind = provider.kind();
    match provider.list_models().await {
        Ok(models) if !models.is_empty() => {
            debug!(provider = %kind, count = models.len(), "Fetched model list");
            models
        }
        Ok(_) => {
            warn!(provider = %kind, "Provider listed no models, using defaults");
            defaults(kind)
        }
        Err(e) => {
            warn!(provider = %kind, error = %e, "Model listing failed, using defaults");
            defaults(kind)
        }
    }
}
