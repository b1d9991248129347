use crate::stream::TextStream;
use async_trait::async_trait;
use brochure_common::{BrochureError, Result};
use brochure_http::HttpError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

/// Per-call generation knobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOpts {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Ask the provider to constrain output to a JSON object.
    pub json: bool,
}

impl GenerateOpts {
    pub fn json() -> Self {
        Self {
            json: true,
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a full response to `prompt`, sent as the user message, with an
    /// optional system message.
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        opts: &GenerateOpts,
    ) -> Result<LlmResponse>;

    /// Generate a response as an ordered stream of text fragments.
    ///
    /// Providers without native streaming fall back to a single fragment
    /// holding the whole answer.
    async fn generate_stream(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        opts: &GenerateOpts,
    ) -> Result<TextStream> {
        let response = self.generate(prompt, system_prompt, opts).await?;
        Ok(TextStream::once(response.text))
    }

    /// Check if the LLM service is available
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    /// Short provider name for logs ("openai", "gemini", ...).
    fn provider(&self) -> &'static str;
}

/// Map a transport failure into a provider error with a readable cause.
pub(crate) fn provider_error(provider: &str, err: HttpError) -> BrochureError {
    let detail = match err.status().map(|s| s.as_u16()) {
        Some(401) => format!("invalid API key ({err})"),
        Some(403) => format!("API access forbidden ({err})"),
        Some(429) => format!("rate limit exceeded ({err})"),
        _ => err.to_string(),
    };
    BrochureError::Provider(format!("{provider}: {detail}"))
}
