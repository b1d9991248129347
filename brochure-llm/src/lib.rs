//! Provider-agnostic LLM access for the brochure generator.
//!
//! This crate exposes a common [`traits::LlmClient`] interface with one-shot
//! and streaming generation, plus concrete backends for OpenAI, Gemini,
//! Claude, and Ollama. [`ensure_llm_ready`] turns a resolved
//! [`brochure_common::LlmConfig`] into a ready client.
//!
//! # Examples
//! ```no_run
//! use brochure_common::{LlmConfig, Result};
//! use brochure_llm::ensure_llm_ready;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let cfg = LlmConfig::OpenAi {
//!     api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
//!     model: "gpt-4o-mini".into(),
//!     base_url: None,
//! };
//! let client = ensure_llm_ready(&cfg, Duration::from_secs(120)).await?;
//! assert!(!client.model_name().is_empty());
//! # Ok(())
//! # }
//! ```
#[cfg(feature = "claude")]
pub mod claude;
#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
pub mod stream;
pub mod traits;

use brochure_common::{BrochureError, LlmConfig};
use std::sync::Arc;
use std::time::Duration;
use traits::LlmClient;

pub use stream::TextStream;
pub use traits::{GenerateOpts, LlmResponse};

/// Build a client for `config`. Ollama clients probe the server and pull the
/// model if it is missing; hosted providers are constructed without I/O.
pub async fn ensure_llm_ready(
    config: &LlmConfig,
    request_timeout: Duration,
) -> brochure_common::Result<Arc<dyn LlmClient + Send + Sync + 'static>> {
    tracing::debug!(model=%config.model(), "llm.client.init");
    match config {
        #[cfg(feature = "ollama")]
        LlmConfig::Ollama { base_url, model } => {
            let client =
                ollama::OllamaClient::with_timeout(base_url.clone(), model.clone(), request_timeout)
                    .await?;
            Ok(Arc::new(client))
        }
        #[cfg(feature = "gemini")]
        LlmConfig::Gemini {
            api_key,
            model,
            base_url,
        } => {
            let client = gemini::GeminiClient::with_endpoint(
                api_key.clone(),
                model.clone(),
                base_url.as_deref(),
                request_timeout,
            )?;
            Ok(Arc::new(client))
        }
        #[cfg(feature = "openai")]
        LlmConfig::OpenAi {
            api_key,
            model,
            base_url,
        } => {
            let client = openai::OpenAiClient::with_endpoint(
                api_key.clone(),
                model.clone(),
                base_url.as_deref(),
                request_timeout,
            )?;
            Ok(Arc::new(client))
        }
        #[cfg(feature = "claude")]
        LlmConfig::Claude {
            api_key,
            model,
            base_url,
        } => {
            let client = claude::ClaudeClient::with_endpoint(
                api_key.clone(),
                model.clone(),
                base_url.as_deref(),
                request_timeout,
            )?;
            Ok(Arc::new(client))
        }
        #[allow(unreachable_patterns)]
        _ => Err(BrochureError::Config(
            "LLM provider not enabled".to_string(),
        )),
    }
}
