use crate::stream::{decode_lines, sse_data, StreamStep, TextStream};
use crate::traits::{provider_error, GenerateOpts, LlmClient, LlmResponse};
use async_trait::async_trait;
use brochure_common::{BrochureError, Result};
use brochure_http::{Auth, HttpClient, RequestOpts};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";
const PROVIDER: &str = "openai";

/// OpenAI client speaking the Responses API.
pub struct OpenAiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ResponsesApiRequest<'a> {
    model: &'a str,
    input: Vec<InputMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextConfig>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct InputMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct TextConfig {
    format: TextFormat,
}

#[derive(Serialize)]
struct TextFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ResponsesApiResponse {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    pub model: String,
    #[serde(default)]
    pub output: Vec<ResponseMessage>,
    #[serde(default)]
    pub usage: Option<ResponseUsage>,
}

/// One element in the `output` array
#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Vec<ResponseContent>,
}

/// One part of the message `content`
#[derive(Debug, Deserialize)]
pub struct ResponseContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ResponseUsage {
    pub total_tokens: Option<u32>,
}

/// One server-sent event from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<serde_json::Value>,
}

impl StreamEvent {
    fn failure_reason(&self) -> String {
        self.message
            .clone()
            .or_else(|| {
                self.response
                    .as_ref()
                    .and_then(|r| r.pointer("/error/message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| self.kind.clone())
    }
}

impl ResponsesApiResponse {
    /// All `output_text` parts, in order.
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .filter(|msg| msg.kind == "message")
            .flat_map(|msg| &msg.content)
            .filter(|c| c.kind == "output_text")
            .map(|c| c.text.as_str())
            .collect()
    }
}

impl OpenAiClient {
    /// Create a new client for the given API key and model.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Self::with_endpoint(api_key, model, None, Duration::from_secs(120))
    }

    /// Client for an OpenAI-compatible endpoint (gateway, proxy, test server).
    pub fn with_endpoint(
        api_key: String,
        model: String,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = HttpClient::new(base_url.unwrap_or(OPENAI_API_BASE))
            .map_err(|e| BrochureError::Config(format!("HttpClient init failed: {e}")))?
            .with_timeout(timeout);

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    fn request<'a>(
        &'a self,
        prompt: &'a str,
        system_prompt: Option<&'a str>,
        opts: &GenerateOpts,
        stream: bool,
    ) -> ResponsesApiRequest<'a> {
        let mut input = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            input.push(InputMessage {
                role: "system",
                content: system,
            });
        }
        input.push(InputMessage {
            role: "user",
            content: prompt,
        });

        ResponsesApiRequest {
            model: &self.model,
            input,
            max_output_tokens: opts.max_tokens,
            temperature: opts.temperature,
            text: opts.json.then(|| TextConfig {
                format: TextFormat {
                    kind: "json_object",
                },
            }),
            stream,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        opts: &GenerateOpts,
    ) -> Result<LlmResponse> {
        tracing::debug!(model=%self.model, json=opts.json, "openai.generate");

        let req = self.request(prompt, system_prompt, opts, false);
        let resp: ResponsesApiResponse = self
            .client
            .post_json("responses", Some(&self.api_key), &req)
            .await
            .map_err(|e| provider_error(PROVIDER, e))?;

        if resp.status.as_deref() == Some("failed") {
            return Err(BrochureError::Provider(format!(
                "{PROVIDER}: response {} failed",
                resp.id
            )));
        }

        Ok(LlmResponse {
            text: resp.output_text(),
            tokens_used: resp.usage.as_ref().and_then(|u| u.total_tokens),
            model: Some(resp.model),
        })
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        opts: &GenerateOpts,
    ) -> Result<TextStream> {
        tracing::debug!(model=%self.model, "openai.generate_stream");

        let req = self.request(prompt, system_prompt, opts, true);
        let bytes = self
            .client
            .post_json_stream(
                "responses",
                &req,
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.api_key)),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| provider_error(PROVIDER, e))?;

        Ok(TextStream::spawn(decode_lines(bytes, PROVIDER, parse_stream_line)))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn health_check(&self) -> Result<bool> {
        let opts = GenerateOpts {
            max_tokens: Some(16),
            ..GenerateOpts::default()
        };
        match self.generate("Respond with just 'OK'", None, &opts).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("OpenAi health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

fn parse_stream_line(line: &str) -> Result<StreamStep> {
    let Some(data) = sse_data(line) else {
        return Ok(StreamStep::Skip);
    };
    if data == "[DONE]" {
        return Ok(StreamStep::Done);
    }
    let event: StreamEvent = serde_json::from_str(data)
        .map_err(|e| BrochureError::Provider(format!("{PROVIDER}: bad stream event: {e}")))?;

    match event.kind.as_str() {
        "response.output_text.delta" => Ok(StreamStep::Text(event.delta.unwrap_or_default())),
        "response.completed" => Ok(StreamStep::Done),
        "response.failed" | "error" => Err(BrochureError::Provider(format!(
            "{PROVIDER}: stream failed: {}",
            event.failure_reason()
        ))),
        _ => Ok(StreamStep::Skip),
    }
}
