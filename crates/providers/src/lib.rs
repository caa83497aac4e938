//! LLM Provider implementations for Tessera.
//!
//! All providers implement the `tessera_core::Provider` trait.
//! The router builds the correct provider for each credential.

pub mod catalog;
pub mod gemini;
pub mod openai_compat;
pub mod router;
mod transport;

pub use catalog::fetch_available_models;
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config, build_provider};
