use crate::stream::{decode_lines, sse_data, StreamStep, TextStream};
use crate::traits::{provider_error, GenerateOpts, LlmClient, LlmResponse};
use async_trait::async_trait;
use brochure_common::{BrochureError, Result};
use brochure_http::{Auth, HttpClient, RequestOpts};
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1/";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "claude";
/// The Messages API requires an explicit output cap.
const DEFAULT_MAX_TOKENS: u32 = 2048;
/// JSON mode has no API switch; an assistant turn opening the object makes
/// the model continue it.
const JSON_PREFILL: &str = "{";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Anthropic Messages API client.
pub struct ClaudeClient {
    client: HttpClient,
    api_key: HeaderValue,
    model: String,
}

impl ClaudeClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Self::with_endpoint(api_key, model, None, Duration::from_secs(120))
    }

    pub fn with_endpoint(
        api_key: String,
        model: String,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = HttpClient::new(base_url.unwrap_or(ANTHROPIC_API_BASE))
            .map_err(|e| BrochureError::Config(format!("HttpClient init failed: {e}")))?
            .with_timeout(timeout);
        let mut api_key = HeaderValue::from_str(api_key.trim())
            .map_err(|e| BrochureError::Config(format!("invalid Anthropic API key: {e}")))?;
        api_key.set_sensitive(true);

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
    ) -> MessagesRequest<'a> {
        let mut messages = vec![Message {
            role: "user",
            content: prompt,
        }];
        if opts.json {
            messages.push(Message {
                role: "assistant",
                content: JSON_PREFILL,
            });
        }
        MessagesRequest {
            model: &self.model,
            max_tokens: opts.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: system_prompt,
            messages,
            temperature: opts.temperature,
            stream,
        }
    }

    fn opts(&self) -> RequestOpts<'_> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        RequestOpts {
            auth: Some(Auth::Header {
                name: HeaderName::from_static("x-api-key"),
                value: self.api_key.clone(),
            }),
            headers: Some(headers),
            ..Default::default()
        }
    }
}

#[async_trait]
impl LlmClient for ClaudeClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        opts: &GenerateOpts,
    ) -> Result<LlmResponse> {
        tracing::debug!(model=%self.model, json=opts.json, "claude.generate");

        let req = self.request(prompt, system_prompt, opts, false);
        let resp: MessagesResponse = self
            .client
            .post_json_opts("messages", &req, self.opts())
            .await
            .map_err(|e| provider_error(PROVIDER, e))?;

        let mut text: String = resp
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();
        if opts.json {
            text.insert_str(0, JSON_PREFILL);
        }

        Ok(LlmResponse {
            text,
            model: Some(resp.model),
            tokens_used: resp.usage.map(|u| u.input_tokens + u.output_tokens),
        })
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        opts: &GenerateOpts,
    ) -> Result<TextStream> {
        tracing::debug!(model=%self.model, json=opts.json, "claude.generate_stream");

        let req = self.request(prompt, system_prompt, opts, true);
        let bytes = self
            .client
            .post_json_stream("messages", &req, self.opts())
            .await
            .map_err(|e| provider_error(PROVIDER, e))?;

        let fragments = decode_lines(bytes, PROVIDER, parse_stream_line);
        if opts.json {
            let prefill = stream::once(async { Ok::<_, BrochureError>(JSON_PREFILL.to_string()) });
            Ok(TextStream::spawn(prefill.chain(fragments)))
        } else {
            Ok(TextStream::spawn(fragments))
        }
    }

    async fn health_check(&self) -> Result<bool> {
        let opts = GenerateOpts {
            max_tokens: Some(5),
            ..GenerateOpts::default()
        };
        match self.generate("Respond with just 'OK'", None, &opts).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Claude health check failed: {}", e);
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
    let event: StreamEvent = serde_json::from_str(data)
        .map_err(|e| BrochureError::Provider(format!("{PROVIDER}: bad stream event: {e}")))?;

    match event.kind.as_str() {
        "content_block_delta" => {
            let text = event
                .delta
                .as_ref()
                .filter(|d| d.get("type").and_then(|t| t.as_str()) == Some("text_delta"))
                .and_then(|d| d.get("text"))
                .and_then(|t| t.as_str())
                .unwrap_or_default();
            Ok(StreamStep::Text(text.to_string()))
        }
        "message_stop" => Ok(StreamStep::Done),
        "error" => {
            let reason = event
                .error
                .as_ref()
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            Err(BrochureError::Provider(format!(
                "{PROVIDER}: stream failed: {reason}"
            )))
        }
        _ => Ok(StreamStep::Skip),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_defaults_max_tokens_and_keeps_system_separate() {
        let client = ClaudeClient::new("sk-ant".into(), "claude-3-5-haiku-latest".into()).unwrap();
        let req = client.request("page text", Some("be brief"), &GenerateOpts::default(), true);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({
                "model": "claude-3-5-haiku-latest",
                "max_tokens": 2048,
                "system": "be brief",
                "messages": [{"role": "user", "content": "page text"}],
                "stream": true
            })
        );
    }

    #[test]
    fn json_mode_prefills_an_assistant_turn() {
        let client = ClaudeClient::new("sk-ant".into(), "claude-3-5-haiku-latest".into()).unwrap();
        let req = client.request("links", Some("pick links"), &GenerateOpts::json(), false);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v["messages"],
            json!([
                {"role": "user", "content": "links"},
                {"role": "assistant", "content": "{"}
            ])
        );
        assert!(v.get("stream").is_none());
    }

    #[test]
    fn stream_events_map_to_steps() {
        let delta = r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Acme"}}"#;
        assert_eq!(
            parse_stream_line(delta).unwrap(),
            StreamStep::Text("Acme".into())
        );
        assert_eq!(
            parse_stream_line(r#"data: {"type":"ping"}"#).unwrap(),
            StreamStep::Skip
        );
        assert_eq!(
            parse_stream_line(r#"data: {"type":"message_stop"}"#).unwrap(),
            StreamStep::Done
        );
        let err = parse_stream_line(
            r#"data: {"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }
}
