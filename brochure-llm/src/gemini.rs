use crate::stream::{decode_lines, sse_data, StreamStep, TextStream};
use crate::traits::{provider_error, GenerateOpts, LlmClient, LlmResponse};
use async_trait::async_trait;
use brochure_common::{BrochureError, Result};
use brochure_http::{Auth, HttpClient, RequestOpts};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Duration;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
const PROVIDER: &str = "gemini";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_settings: Option<Vec<GeminiSafetySetting>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct GeminiSafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    total_token_count: Option<u32>,
}

impl GeminiResponse {
    /// Text of the first candidate, rejecting safety blocks.
    fn first_candidate_text(&self) -> Result<String> {
        let Some(candidate) = self.candidates.first() else {
            return Err(BrochureError::Provider(format!(
                "{PROVIDER}: no candidates returned"
            )));
        };
        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(BrochureError::Provider(format!(
                "{PROVIDER}: content blocked by safety filters"
            )));
        }
        Ok(candidate
            .content
            .as_ref()
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default())
    }
}

/// Google Gemini API client.
///
/// Requires a valid API key and internet access.
pub struct GeminiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a new client using the provided API key and model.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Self::with_endpoint(api_key, model, None, Duration::from_secs(120))
    }

    pub fn with_endpoint(
        api_key: String,
        model: String,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = HttpClient::new(base_url.unwrap_or(GEMINI_BASE_URL))
            .map_err(|e| BrochureError::Config(format!("HttpClient init failed: {e}")))?
            .with_timeout(timeout);

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    fn create_safety_settings() -> Vec<GeminiSafetySetting> {
        [
            "HARM_CATEGORY_HARASSMENT",
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
        ]
        .into_iter()
        .map(|category| GeminiSafetySetting {
            category,
            threshold: "BLOCK_MEDIUM_AND_ABOVE",
        })
        .collect()
    }

    fn request(prompt: &str, system_prompt: Option<&str>, opts: &GenerateOpts) -> GeminiRequest {
        let generation_config =
            if opts.max_tokens.is_some() || opts.temperature.is_some() || opts.json {
                Some(GeminiGenerationConfig {
                    temperature: opts.temperature,
                    max_output_tokens: opts.max_tokens,
                    response_mime_type: opts.json.then_some("application/json"),
                })
            } else {
                None
            };

        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config,
            safety_settings: Some(Self::create_safety_settings()),
            system_instruction: system_prompt.map(|sys| GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: sys.to_string(),
                }],
            }),
        }
    }

    fn opts(&self) -> RequestOpts<'_> {
        RequestOpts {
            auth: Some(Auth::Query {
                name: "key",
                value: Cow::Borrowed(&self.api_key),
            }),
            ..Default::default()
        }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        opts: &GenerateOpts,
    ) -> Result<LlmResponse> {
        let path = format!("models/{}:generateContent", self.model);
        tracing::debug!(model=%self.model, json=opts.json, "gemini.generate");

        let request = Self::request(prompt, system_prompt, opts);
        let resp: GeminiResponse = self
            .client
            .post_json_opts(&path, &request, self.opts())
            .await
            .map_err(|e| provider_error(PROVIDER, e))?;

        let text = resp.first_candidate_text()?;
        Ok(LlmResponse {
            text,
            model: resp.model_version.or_else(|| Some(self.model.clone())),
            tokens_used: resp.usage_metadata.and_then(|u| u.total_token_count),
        })
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        opts: &GenerateOpts,
    ) -> Result<TextStream> {
        let path = format!("models/{}:streamGenerateContent", self.model);
        tracing::debug!(model=%self.model, "gemini.generate_stream");

        let request = Self::request(prompt, system_prompt, opts);
        let mut req_opts = self.opts();
        req_opts.query = Some(vec![("alt", Cow::Borrowed("sse"))]);

        let bytes = self
            .client
            .post_json_stream(&path, &request, req_opts)
            .await
            .map_err(|e| provider_error(PROVIDER, e))?;

        Ok(TextStream::spawn(decode_lines(bytes, PROVIDER, parse_stream_line)))
    }

    async fn health_check(&self) -> Result<bool> {
        let opts = GenerateOpts {
            max_tokens: Some(5),
            temperature: Some(0.1),
            ..GenerateOpts::default()
        };
        match self.generate("Respond with just 'OK'", None, &opts).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Gemini health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &'static str {
        PROVIDER
    }
}

fn parse_stream_line(line: &str) -> Result<StreamStep> {
    let Some(data) = sse_data(line) else {
        return Ok(StreamStep::Skip);
    };
    let chunk: GeminiResponse = serde_json::from_str(data)
        .map_err(|e| BrochureError::Provider(format!("{PROVIDER}: bad stream chunk: {e}")))?;
    // Trailing chunks may carry only usage metadata.
    if chunk.candidates.is_empty() {
        return Ok(StreamStep::Skip);
    }
    chunk.first_candidate_text().map(StreamStep::Text)
}
