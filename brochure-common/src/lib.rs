//! Common types and utilities shared across the brochure crates.
//!
//! This crate defines the runtime configuration object, model selection tags,
//! observability helpers, and the shared error type used throughout the
//! workspace. It stays dependency-light so every crate can depend on it.
//!
//! # Overview
//!
//! - [`BrochureConfig`]: Top-level runtime configuration, built once at startup
//! - [`ModelTag`]: Caller-facing backend selector (`GPT`, `Gemini`, ...)
//! - [`LlmConfig`]: Resolved provider configuration, credentials included
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`BrochureError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use brochure_common::{BrochureConfig, ModelTag};
//!
//! let cfg = BrochureConfig::default();
//! assert_eq!(cfg.fetch.timeout_secs, 10);
//! assert!(cfg.generation.follow_links);
//!
//! let tag: ModelTag = "gpt".parse().unwrap();
//! assert_eq!(tag, ModelTag::Gpt);
//! assert!("llama-x".parse::<ModelTag>().is_err());
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub mod observability;

/// Browser-like User-Agent; some sites refuse requests without one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-haiku-latest";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Backend selector supplied by the caller.
///
/// Parsing is case-insensitive and accepts a provider alias for each tag.
/// Anything else is rejected with [`BrochureError::UnsupportedModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelTag {
    Gpt,
    Gemini,
    Claude,
    Ollama,
}

impl ModelTag {
    pub const ALL: [ModelTag; 4] = [
        ModelTag::Gpt,
        ModelTag::Gemini,
        ModelTag::Claude,
        ModelTag::Ollama,
    ];

    /// Key of the provider section in configuration files.
    pub fn provider_key(self) -> &'static str {
        match self {
            ModelTag::Gpt => "openai",
            ModelTag::Gemini => "gemini",
            ModelTag::Claude => "claude",
            ModelTag::Ollama => "ollama",
        }
    }

    /// Environment variable holding the credential, if the backend needs one.
    pub fn credential_env(self) -> Option<&'static str> {
        match self {
            ModelTag::Gpt => Some("OPENAI_API_KEY"),
            ModelTag::Gemini => Some("GEMINI_API_KEY"),
            ModelTag::Claude => Some("ANTHROPIC_API_KEY"),
            ModelTag::Ollama => None,
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ModelTag::Gpt => DEFAULT_OPENAI_MODEL,
            ModelTag::Gemini => DEFAULT_GEMINI_MODEL,
            ModelTag::Claude => DEFAULT_CLAUDE_MODEL,
            ModelTag::Ollama => DEFAULT_OLLAMA_MODEL,
        }
    }
}

impl fmt::Display for ModelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelTag::Gpt => "GPT",
            ModelTag::Gemini => "Gemini",
            ModelTag::Claude => "Claude",
            ModelTag::Ollama => "Ollama",
        };
        f.write_str(name)
    }
}

impl FromStr for ModelTag {
    type Err = BrochureError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gpt" | "openai" => Ok(ModelTag::Gpt),
            "gemini" | "google" => Ok(ModelTag::Gemini),
            "claude" | "anthropic" => Ok(ModelTag::Claude),
            "ollama" | "local" => Ok(ModelTag::Ollama),
            _ => Err(BrochureError::UnsupportedModel(raw.to_string())),
        }
    }
}

/// Fully resolved configuration for one LLM provider.
///
/// Produced by [`ProvidersConfig::llm_config_for`]; credentials are already
/// present, so constructing a client from it never consults the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LlmConfig {
    OpenAi {
        api_key: String,
        model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    Gemini {
        api_key: String,
        model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    Claude {
        api_key: String,
        model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    Ollama {
        base_url: String,
        model: String,
    },
}

impl LlmConfig {
    pub fn model(&self) -> &str {
        match self {
            LlmConfig::OpenAi { model, .. }
            | LlmConfig::Gemini { model, .. }
            | LlmConfig::Claude { model, .. }
            | LlmConfig::Ollama { model, .. } => model,
        }
    }

    /// The credential carried by this configuration, if any.
    pub fn api_key(&self) -> Option<&str> {
        match self {
            LlmConfig::OpenAi { api_key, .. }
            | LlmConfig::Gemini { api_key, .. }
            | LlmConfig::Claude { api_key, .. } => Some(api_key),
            LlmConfig::Ollama { .. } => None,
        }
    }
}

/// Top-level runtime configuration.
///
/// Constructed once at startup (usually by `brochure-config`) and passed by
/// reference to the components that need it. Nothing mutates it afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrochureConfig {
    pub fetch: FetchConfig,
    pub generation: GenerationConfig,
    pub providers: ProvidersConfig,
}

/// Settings for landing and linked page retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-page timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Knobs for the brochure pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Ask the model which links are relevant and fetch those pages too.
    pub follow_links: bool,
    /// Upper bound on sub-pages fetched after classification.
    pub max_linked_pages: usize,
    /// The user prompt is cut to this many characters before sending.
    pub max_prompt_chars: usize,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            follow_links: true,
            max_linked_pages: 5,
            max_prompt_chars: 20_000,
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Per-provider overrides as written in configuration files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderConfig,
    pub gemini: ProviderConfig,
    pub claude: ProviderConfig,
    pub ollama: ProviderConfig,
    /// Total timeout for one-shot model calls. Streams only get a connect timeout.
    pub request_timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: ProviderConfig::default(),
            gemini: ProviderConfig::default(),
            claude: ProviderConfig::default(),
            ollama: ProviderConfig::default(),
            request_timeout_secs: 120,
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, tag: ModelTag) -> &ProviderConfig {
        match tag {
            ModelTag::Gpt => &self.openai,
            ModelTag::Gemini => &self.gemini,
            ModelTag::Claude => &self.claude,
            ModelTag::Ollama => &self.ollama,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Resolve the provider behind `tag` into a ready-to-use [`LlmConfig`].
    ///
    /// Credentials are taken from the provider section first and from the
    /// provider's environment variable second. A missing credential is a
    /// [`BrochureError::Config`].
    ///
    /// ```
    /// use brochure_common::{LlmConfig, ModelTag, ProvidersConfig};
    ///
    /// let mut providers = ProvidersConfig::default();
    /// providers.openai.api_key = Some("sk-test-123".into());
    ///
    /// match providers.llm_config_for(ModelTag::Gpt).unwrap() {
    ///     LlmConfig::OpenAi { api_key, model, .. } => {
    ///         assert_eq!(api_key, "sk-test-123");
    ///         assert_eq!(model, "gpt-4o-mini");
    ///     }
    ///     other => panic!("unexpected config: {other:?}"),
    /// }
    /// ```
    pub fn llm_config_for(&self, tag: ModelTag) -> Result<LlmConfig> {
        let section = self.get(tag);
        let model = section
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| tag.default_model().to_string());
        let base_url = section.base_url.clone();

        match tag {
            ModelTag::Ollama => Ok(LlmConfig::Ollama {
                base_url: base_url.unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
                model,
            }),
            ModelTag::Gpt => Ok(LlmConfig::OpenAi {
                api_key: resolve_api_key(tag, section)?,
                model,
                base_url,
            }),
            ModelTag::Gemini => Ok(LlmConfig::Gemini {
                api_key: resolve_api_key(tag, section)?,
                model,
                base_url,
            }),
            ModelTag::Claude => Ok(LlmConfig::Claude {
                api_key: resolve_api_key(tag, section)?,
                model,
                base_url,
            }),
        }
    }
}

fn resolve_api_key(tag: ModelTag, section: &ProviderConfig) -> Result<String> {
    // An unexpanded `${VAR}` means the referenced variable was never set.
    let configured = section
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty() && !k.contains("${"));
    if let Some(key) = configured {
        return Ok(key.to_string());
    }

    let Some(var) = tag.credential_env() else {
        return Ok(String::new());
    };
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(BrochureError::Config(format!(
            "{var} is not set (export it or set providers.{}.api_key)",
            tag.provider_key()
        ))),
    }
}

/// Error types used across the brochure workspace.
#[derive(thiserror::Error, Debug)]
pub enum BrochureError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller asked for a backend that does not exist.
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// A page could not be retrieved.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// A model provider call, decode, or stream failed.
    #[error("Provider error: {0}")]
    Provider(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`BrochureError`].
pub type Result<T> = std::result::Result<T, BrochureError>;
