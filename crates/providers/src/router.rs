//! Provider router: builds one provider per credential from config.
//!
//! Gemini credentials get the native adapter; every other kind goes through
//! the OpenAI-compatible adapter on its configured or well-known endpoint.

use std::collections::HashMap;
use std::sync::Arc;
use tessera_config::AppConfig;
use tessera_core::agent::{Credential, ProviderKind};
use tessera_core::provider::Provider;

use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Routes agents to providers by credential id.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a provider under a credential id.
    pub fn register(&mut self, credential_id: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(credential_id.into(), provider);
    }

    /// Get the provider for a credential.
    pub fn get(&self, credential_id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(credential_id).cloned()
    }

    /// List all registered credential ids.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the adapter for one credential. `api_url` overrides the kind's
/// well-known endpoint.
pub fn build_provider(credential: &Credential, api_url: Option<&str>) -> Arc<dyn Provider> {
    match credential.provider {
        ProviderKind::Gemini => {
            let mut p = GeminiProvider::new(&credential.secret);
            if let Some(url) = api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        kind => Arc::new(OpenAiCompatProvider::new(
            kind,
            api_url.unwrap_or(kind.default_base_url()),
            &credential.secret,
        )),
    }
}

/// Build providers for every configured credential.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new();

    for credential in config.resolve_credentials() {
        let api_url = config
            .provider(credential.provider)
            .and_then(|p| p.api_url.as_deref());
        router.register(credential.id.clone(), build_provider(&credential, api_url));
    }

    router
}
