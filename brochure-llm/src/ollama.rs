use crate::stream::{decode_lines, StreamStep, TextStream};
use crate::traits::{provider_error, GenerateOpts, LlmClient, LlmResponse};
use async_trait::async_trait;
use brochure_common::{BrochureError, Result};
use brochure_http::{HttpClient, RequestOpts};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";
const PROVIDER: &str = "ollama";
/// Model pulls download gigabytes; give them room.
const PULL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "ChatOptions::is_empty")]
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize, Default)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl ChatOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.num_predict.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    #[serde(default)]
    status: String,
}

/// Ollama client for local model inference.
///
/// Expects a running Ollama server (see https://github.com/ollama/ollama).
pub struct OllamaClient {
    client: HttpClient,
    model: String,
}

impl OllamaClient {
    /// Create a new client and verify server/model availability.
    pub async fn new(base_url: String, model: String) -> Result<Self> {
        Self::with_timeout(base_url, model, Duration::from_secs(120)).await
    }

    pub async fn with_timeout(base_url: String, model: String, timeout: Duration) -> Result<Self> {
        let client = HttpClient::new(&base_url)
            .map_err(|e| BrochureError::Config(format!("HttpClient init failed: {e}")))?
            .with_timeout(timeout);

        let ollama_client = Self { client, model };
        ollama_client.ensure_model_available().await?;
        Ok(ollama_client)
    }

    async fn fetch_available_models(&self) -> Result<Vec<String>> {
        let tags: TagsResponse = self
            .client
            .get_json(
                "api/tags",
                RequestOpts {
                    retries: Some(0),
                    timeout: Some(Duration::from_secs(10)),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| {
                tracing::debug!(error=%e, "ollama.probe_failed");
                BrochureError::Provider(OLLAMA_CONNECTION_ERROR.to_string())
            })?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn ensure_model_available(&self) -> Result<()> {
        let models = self.fetch_available_models().await?;
        if models.iter().any(|m| m == &self.model) {
            return Ok(());
        }

        tracing::info!("Model {} not found locally, pulling...", self.model);
        let resp: PullResponse = self
            .client
            .post_json_opts(
                "api/pull",
                &PullRequest {
                    model: &self.model,
                    stream: false,
                },
                RequestOpts {
                    timeout: Some(PULL_TIMEOUT),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| provider_error(PROVIDER, e))?;
        tracing::info!(status=%resp.status, "Successfully pulled model: {}", self.model);
        Ok(())
    }

    fn request<'a>(
        &'a self,
        prompt: &'a str,
        system_prompt: Option<&'a str>,
        opts: &GenerateOpts,
        stream: bool,
    ) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        ChatRequest {
            model: &self.model,
            messages,
            stream,
            format: opts.json.then_some("json"),
            options: ChatOptions {
                temperature: opts.temperature,
                num_predict: opts.max_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        opts: &GenerateOpts,
    ) -> Result<LlmResponse> {
        tracing::debug!(model=%self.model, json=opts.json, "ollama.generate");

        let req = self.request(prompt, system_prompt, opts, false);
        let chunk: ChatChunk = self
            .client
            .post_json_opts("api/chat", &req, RequestOpts::default())
            .await
            .map_err(|e| provider_error(PROVIDER, e))?;

        if let Some(err) = chunk.error {
            return Err(BrochureError::Provider(format!("{PROVIDER}: {err}")));
        }

        let tokens_used = match (chunk.prompt_eval_count, chunk.eval_count) {
            (None, None) => None,
            (p, e) => Some(p.unwrap_or(0) + e.unwrap_or(0)),
        };

        Ok(LlmResponse {
            text: chunk.message.map(|m| m.content).unwrap_or_default(),
            model: Some(self.model.clone()),
            tokens_used,
        })
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        opts: &GenerateOpts,
    ) -> Result<TextStream> {
        tracing::debug!(model=%self.model, "ollama.generate_stream");

        let req = self.request(prompt, system_prompt, opts, true);
        let bytes = self
            .client
            .post_json_stream("api/chat", &req, RequestOpts::default())
            .await
            .map_err(|e| provider_error(PROVIDER, e))?;

        Ok(TextStream::spawn(decode_lines(bytes, PROVIDER, parse_stream_line)))
    }

    async fn health_check(&self) -> Result<bool> {
        self.fetch_available_models()
            .await
            .map(|_| true)
            .or(Ok(false))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &'static str {
        PROVIDER
    }
}

/// One NDJSON object per line.
fn parse_stream_line(line: &str) -> Result<StreamStep> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(StreamStep::Skip);
    }
    let chunk: ChatChunk = serde_json::from_str(line)
        .map_err(|e| BrochureError::Provider(format!("{PROVIDER}: bad stream chunk: {e}")))?;

    if let Some(err) = chunk.error {
        return Err(BrochureError::Provider(format!("{PROVIDER}: {err}")));
    }
    let text = chunk.message.map(|m| m.content).unwrap_or_default();
    if chunk.done {
        // The final object may still carry trailing content.
        return Ok(if text.is_empty() {
            StreamStep::Done
        } else {
            StreamStep::Text(text)
        });
    }
    Ok(StreamStep::Text(text))
}
