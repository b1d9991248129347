//! Small HTTP client with safe logging, retries, and flexible auth.
//!
//! - Request options: headers, `Auth`, query params, timeout, retries
//! - JSON, text, and streaming-body helpers
//! - Redacts sensitive query params and headers; never logs secret values
//! - Retries 429/5xx with exponential backoff and `Retry-After` support
//! - Optional *raw* request/response logging via `BROCHURE_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), brochure_http::HttpError> {
//! let client = brochure_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", brochure_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! A client built with [`HttpClient::detached`] has no base URL and only
//! accepts absolute URLs; the page fetcher uses that form.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::pin::Pin;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

const RAW_ENV: &str = "BROCHURE_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;

const SECRET_QUERY_KEYS: &[&str] = &[
    "access_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "token",
    "secret",
    "client_secret",
    "bearer",
];

const SECRET_HEADERS: &[&str] = &["authorization", "x-api-key", "x-goog-api-key"];

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret_query_key(key: &str) -> bool {
    SECRET_QUERY_KEYS.contains(&key.to_ascii_lowercase().as_str())
}

fn is_secret_header(name: &str) -> bool {
    SECRET_HEADERS.contains(&name.to_ascii_lowercase().as_str())
}

/// Best-effort curl line for repro/debug. Secret headers and query values are redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, value) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, value.replace('\'', r"'\''")));
    }
    if let Some(bytes) = body {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                let s = truncate_utf8(s, RAW_MAX_BODY);
                parts.push(format!("-d '{}'", s.replace('\'', r"'\''")));
            }
            Err(_) => parts.push(format!("--data-binary @- # ({} bytes)", bytes.len())),
        }
    }
    let mut shown = url.clone();
    let (_, redacted) = redact_query(url);
    if redacted.is_empty() {
        shown.set_query(None);
    } else {
        shown.query_pairs_mut().clear().extend_pairs(redacted);
    }
    parts.push(format!("'{}'", shown.as_str()));
    parts.join(" ")
}

fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let val = if is_secret_header(&key) {
                "<redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (key, val)
        })
        .collect()
}

/// "host + path" for logs, plus the query with secret values replaced.
fn redact_query(url: &Url) -> (String, Vec<(String, String)>) {
    let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
    let redacted = url
        .query_pairs()
        .map(|(k, v)| {
            let secret = is_secret_query_key(&k);
            (
                k.into_owned(),
                if secret {
                    "<redacted>".into()
                } else {
                    v.into_owned()
                },
            )
        })
        .collect();
    (host_path, redacted)
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

impl HttpError {
    /// HTTP status for API errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Response body delivered chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

// ==============================
// Auth & Request Options
// ==============================

/// Authentication strategies supported by the HTTP client helpers.
///
/// ```
/// use brochure_http::Auth;
///
/// let bearer = Auth::Bearer("token");
/// match bearer {
///     Auth::Bearer(value) => assert_eq!(value, "token"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    /// Custom header (e.g., Anthropic: x-api-key)
    Header {
        name: HeaderName,
        value: HeaderValue,
    },
    /// Auth via query param (e.g., Gemini: key=...)
    Query {
        name: &'a str,
        value: Cow<'a, str>,
    },
    None,
}

impl Auth<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Auth::Bearer(_) => "bearer",
            Auth::Header { .. } => "header",
            Auth::Query { .. } => "query",
            Auth::None => "none",
        }
    }
}

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use brochure_http::{Auth, RequestOpts};
/// use std::borrow::Cow;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(1),
///     auth: Some(Auth::Query {
///         name: "key",
///         value: Cow::Borrowed("demo"),
///     }),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(!opts.allow_absolute);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
    /// If true and `path` is an absolute URL, use it as-is (ignore base).
    pub allow_absolute: bool,
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Option<Url>,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// A missing trailing slash is added so relative paths extend the base
    /// instead of replacing its last segment.
    ///
    /// ```no_run
    /// use brochure_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com/v1")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// assert_eq!(client.base().unwrap().as_str(), "https://api.example.com/v1/");
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let mut base = base.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| HttpError::Url(e.to_string()))?;
        Ok(Self {
            base: Some(base),
            ..Self::detached()?
        })
    }

    /// A client without a base URL; every path must be absolute.
    pub fn detached() -> Result<Self, HttpError> {
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base: None,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
        })
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// Override the default timeout returned by [`HttpClient::new`].
    ///
    /// ```no_run
    /// use brochure_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?
    ///     .with_timeout(Duration::from_secs(2));
    /// assert_eq!(client.default_timeout, Duration::from_secs(2));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the default retry budget returned by [`HttpClient::new`].
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// POST JSON using optional Bearer auth.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let opts = RequestOpts {
            auth: bearer.map(Auth::Bearer),
            ..Default::default()
        };
        self.request_json_internal(Method::POST, path, Some(body), opts)
            .await
    }

    /// GET JSON with per-request options (headers/query/auth/timeout/retries).
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.request_json_internal::<(), T>(Method::GET, path, None, opts)
            .await
    }

    /// POST JSON with per-request options (headers/query/auth/timeout/retries).
    pub async fn post_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_json_internal(Method::POST, path, Some(body), opts)
            .await
    }

    /// GET a document and return its body as text (lossy UTF-8).
    pub async fn get_text(&self, path: &str, opts: RequestOpts<'_>) -> Result<String, HttpError> {
        let (resp, req_id) = self
            .send_internal::<()>(Method::GET, path, None, opts, true)
            .await?;
        let bytes = resp.bytes().await.map_err(|e| {
            tracing::warn!(req_id=%req_id, message=%e, "http.network_error.body");
            HttpError::Network(e.to_string())
        })?;
        tracing::trace!(
            req_id=%req_id,
            body_snippet=%snip_body(&bytes),
            "http.response.body_snippet"
        );
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// POST JSON and hand back the response body as a byte stream.
    ///
    /// Retries apply only until the response headers arrive. No total timeout
    /// is set, so long generations are not cut off; dropping the stream closes
    /// the connection.
    pub async fn post_json_stream<B>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<ByteStream, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let (resp, _req_id) = self
            .send_internal(Method::POST, path, Some(body), opts, false)
            .await?;
        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| HttpError::Network(e.to_string())));
        Ok(Box::pin(stream))
    }

    fn resolve_url(&self, path: &str, allow_absolute: bool) -> Result<Url, HttpError> {
        let joined = |base: &Url| base.join(path).map_err(|e| HttpError::Url(e.to_string()));
        match &self.base {
            Some(base) if allow_absolute => Url::parse(path).or_else(|_| joined(base)),
            Some(base) => joined(base),
            None => Url::parse(path).map_err(|e| HttpError::Url(format!("{path}: {e}"))),
        }
    }

    async fn request_json_internal<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (resp, req_id) = self.send_internal(method, path, body, opts, true).await?;
        let bytes = resp.bytes().await.map_err(|e| {
            tracing::warn!(req_id=%req_id, message=%e, "http.network_error.body");
            HttpError::Network(e.to_string())
        })?;

        let snippet = snip_body(&bytes);
        tracing::trace!(req_id=%req_id, body_snippet=%snippet, "http.response.body_snippet");

        serde_json::from_slice::<T>(&bytes).map_err(|e| {
            tracing::warn!(
                req_id=%req_id,
                serde_line=%e.line(),
                serde_col=%e.column(),
                serde_err=%e,
                body_snippet=%snippet,
                "http.response.decode_error"
            );
            HttpError::Decode(e.to_string(), snippet)
        })
    }

    /// Build, log, and send a request, retrying transport failures and
    /// 429/5xx answers. Returns the first successful response with its body
    /// unread, along with the request id used in logs.
    async fn send_internal<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        mut opts: RequestOpts<'_>,
        apply_timeout: bool,
    ) -> Result<(Response, String), HttpError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.resolve_url(path, opts.allow_absolute)?;

        // Query auth is folded into the query list once so retries reuse it.
        if let Some(Auth::Query { name, value }) = &opts.auth {
            opts.query
                .get_or_insert_with(Vec::new)
                .push((*name, value.clone()));
        }

        let body_bytes = match body {
            Some(b) => Some(serde_json::to_vec(b).map_err(|e| HttpError::Build(e.to_string()))?),
            None => None,
        };

        let bearer = match &opts.auth {
            Some(Auth::Bearer(tok)) => Some(sanitize_api_key(tok)?),
            _ => None,
        };

        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let auth_kind = opts.auth.as_ref().map(Auth::kind).unwrap_or("none");
        let req_id = format!("r{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
        let mut attempt = 0usize;

        loop {
            let mut rb = self.inner.request(method.clone(), url.clone());
            if apply_timeout {
                rb = rb.timeout(timeout);
            }
            if let Some(q) = &opts.query {
                let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
                rb = rb.query(&pairs);
            }
            if let Some(bytes) = &body_bytes {
                rb = rb
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }
            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }
            match &opts.auth {
                Some(Auth::Header { name, value }) => rb = rb.header(name, value),
                Some(Auth::Bearer(_)) => {
                    if let Some(tok) = &bearer {
                        rb = rb.bearer_auth(tok);
                    }
                }
                _ => {}
            }

            let redacted_q: Vec<(String, String)> = opts
                .query
                .as_ref()
                .map(|q| {
                    q.iter()
                        .map(|(k, v)| {
                            let shown = if is_secret_query_key(k) {
                                "<redacted>".to_string()
                            } else {
                                v.to_string()
                            };
                            ((*k).to_string(), shown)
                        })
                        .collect()
                })
                .unwrap_or_default();

            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                method=%method,
                host_path=%redact_query(&url).0,
                query=?redacted_q,
                timeout_ms=apply_timeout.then(|| timeout.as_millis() as u64),
                auth_kind,
                has_body=%body_bytes.is_some(),
                "http.request.start"
            );

            if raw_enabled() {
                let mut merged = opts.headers.clone().unwrap_or_default();
                if let Some(Auth::Header { name, value }) = &opts.auth {
                    merged.insert(name.clone(), value.clone());
                }
                let mut shown = url.clone();
                if !redacted_q.is_empty() {
                    shown.query_pairs_mut().extend_pairs(&redacted_q);
                }
                let curl = make_curl(&method, &shown, &merged, body_bytes.as_deref());
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            let t0 = Instant::now();
            let resp = match rb.send().await {
                Ok(resp) => resp,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network_send"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(
                        req_id=%req_id,
                        attempt,
                        max_retries,
                        message=%message,
                        "http.network_error.send"
                    );
                    return Err(HttpError::Network(message));
                }
            };

            let status = resp.status();
            let headers = resp.headers().clone();
            let x_request_id = headers
                .get("x-request-id")
                .or_else(|| headers.get("request-id"))
                .or_else(|| headers.get("x-correlation-id"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=t0.elapsed().as_millis() as u64,
                x_request_id=%x_request_id,
                content_type=?headers.get(reqwest::header::CONTENT_TYPE),
                "http.response.headers"
            );
            if raw_enabled() {
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    status=%status,
                    headers=?redact_headers(&headers),
                    "response"
                );
            }

            if status.is_success() {
                return Ok((resp, req_id));
            }

            let bytes = resp.bytes().await.unwrap_or_default();
            let message = extract_error_message_multi(&bytes);
            let snippet = snip_body(&bytes);
            let is_429 = status == StatusCode::TOO_MANY_REQUESTS;

            if (is_429 || status.is_server_error()) && attempt < max_retries {
                attempt += 1;
                let retry_after = retry_after_delay_secs(&headers);
                let delay = match retry_after {
                    Some(secs) => Duration::from_secs(secs),
                    // default floor for 429 when no Retry-After is present
                    None if is_429 => backoff(attempt).max(Duration::from_millis(1100)),
                    None => backoff(attempt),
                };
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    retry_after_secs=?retry_after,
                    message=%message,
                    body_snippet=%snippet,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                message=%message,
                x_request_id=%x_request_id,
                body_snippet=%snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                request_id: x_request_id,
            });
        }
    }
}

// ==============================
// Helpers
// ==============================

fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(16) as u32;
    Duration::from_millis(200u64.saturating_mul(1u64 << shift))
}

fn extract_error_message_multi(body: &[u8]) -> String {
    // OpenAI / Anthropic / Gemini: {"error":{"message":"..."}}
    #[derive(Deserialize)]
    struct NestedEnv {
        error: NestedDetail,
    }
    #[derive(Deserialize)]
    struct NestedDetail {
        message: String,
    }

    // Generic: {"message":"..."} or {"detail":"..."} or {"error":"..."} (Ollama)
    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(env) = serde_json::from_slice::<NestedEnv>(body) {
        return env.error.message;
    }
    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        for candidate in [m.message, m.detail, m.error] {
            if !candidate.is_empty() {
                return candidate;
            }
        }
    }
    snip_body(body)
}

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
}

fn truncate_utf8(s: &str, max: usize) -> Cow<'_, str> {
    if s.len() <= max {
        return Cow::Borrowed(s);
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(format!("{}…", &s[..end]))
}

fn snip_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match truncate_utf8(&text, 500) {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s,
    }
}

fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if !s.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "API key contains control characters".into(),
        ));
    }
    HeaderValue::from_str(&format!("Bearer {}", s))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_quotes_and_whitespace() {
        let key = sanitize_api_key("  \"sk-abc\n123\"  ").unwrap();
        assert_eq!(key, "sk-abc123");
    }

    #[test]
    fn sanitize_rejects_non_ascii() {
        assert!(matches!(
            sanitize_api_key("sk-ünïcode"),
            Err(HttpError::Build(_))
        ));
    }

    #[test]
    fn error_message_prefers_nested_provider_shape() {
        let body = br#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(extract_error_message_multi(body), "Incorrect API key provided");
    }

    #[test]
    fn error_message_handles_flat_ollama_shape() {
        let body = br#"{"error":"model 'llama9' not found"}"#;
        assert_eq!(extract_error_message_multi(body), "model 'llama9' not found");
    }

    #[test]
    fn error_message_falls_back_to_snippet() {
        assert_eq!(extract_error_message_multi(b"Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn query_secrets_are_redacted() {
        let url = Url::parse("https://example.com/v1/models?key=abc&alt=sse").unwrap();
        let (host_path, q) = redact_query(&url);
        assert_eq!(host_path, "example.com/v1/models");
        assert_eq!(
            q,
            vec![
                ("key".to_string(), "<redacted>".to_string()),
                ("alt".to_string(), "sse".to_string())
            ]
        );
    }

    #[test]
    fn curl_never_contains_secrets() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("sk-ant-secret"));
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        let url = Url::parse("https://example.com/v1/messages?key=abc").unwrap();
        let curl = make_curl(&Method::POST, &url, &headers, Some(b"{\"a\":1}"));
        assert!(!curl.contains("sk-ant-secret"));
        assert!(!curl.contains("key=abc"));
        assert!(curl.contains("anthropic-version: 2023-06-01"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "ééééé";
        let cut = truncate_utf8(s, 3);
        assert_eq!(cut, "é…");
    }

    #[test]
    fn base_gets_trailing_slash() {
        let client = HttpClient::new("http://127.0.0.1:9/v1beta").unwrap();
        let url = client
            .resolve_url("models/gemini-2.5-flash:generateContent", false)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn detached_client_requires_absolute_urls() {
        let client = HttpClient::detached().unwrap();
        assert!(client.resolve_url("/about", false).is_err());
        assert!(client.resolve_url("https://example.com/about", false).is_ok());
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(2), Duration::from_millis(400));
        assert_eq!(backoff(3), Duration::from_millis(800));
    }
}
