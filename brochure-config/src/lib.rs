//! Loader for [`BrochureConfig`] with file + environment overlays.
//!
//! Precedence, lowest first:
//!
//! 1. built-in defaults
//! 2. config files and inline YAML, in the order they were added
//! 3. `BROCHURE__`-prefixed environment variables, `__` between path
//!    segments (`BROCHURE__GENERATION__MAX_LINKED_PAGES=3`)
//!
//! `${VAR}` references in string values are expanded after merging. Unknown
//! variables are left untouched, so a placeholder API key such as
//! `${OPENAI_API_KEY}` simply falls through to the environment lookup in
//! [`brochure_common::ProvidersConfig::llm_config_for`].
//!
//! Example `brochure.yaml`:
//!
//! ```yaml
//! fetch:
//!   timeout_secs: 10
//! generation:
//!   follow_links: true
//!   max_linked_pages: 5
//! providers:
//!   openai:
//!     model: gpt-4o-mini
//!     api_key: ${OPENAI_API_KEY}
//!   ollama:
//!     base_url: http://localhost:11434
//! ```
use brochure_common::BrochureConfig;
use config::{Config, ConfigError, Environment, File};
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "BROCHURE";
const ENV_SEPARATOR: &str = "__";

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// `<config_dir>/brochure/brochure.yaml`, e.g. `~/.config/brochure/brochure.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("brochure").join("brochure.yaml"))
}

/// Builder hides the `config` crate wiring (files + env overrides).
pub struct BrochureConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for BrochureConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl BrochureConfigLoader {
    /// Start from built-in defaults; environment overrides are applied by
    /// [`BrochureConfigLoader::load`].
    ///
    /// ```
    /// use brochure_config::BrochureConfigLoader;
    ///
    /// let config = BrochureConfigLoader::new()
    ///     .with_yaml_str("generation:\n  max_linked_pages: 2")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.generation.max_linked_pages, 2);
    /// assert!(config.generation.follow_links);
    /// assert_eq!(config.fetch.timeout_secs, 10);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist; the `config` crate
    /// infers the format from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when missing.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Attach [`default_config_path`] if the platform has a config directory.
    pub fn with_default_location(self) -> Self {
        match default_config_path() {
            Some(path) => {
                tracing::debug!(path=%path.display(), "config.default_location");
                self.with_optional_file(path)
            }
            None => self,
        }
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use brochure_config::BrochureConfigLoader;
    ///
    /// let cfg = BrochureConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// providers:
    ///   gemini:
    ///     model: "gemini-2.5-pro"
    ///   request_timeout_secs: 30
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.providers.gemini.model.as_deref(), Some("gemini-2.5-pro"));
    /// assert_eq!(cfg.providers.request_timeout_secs, 30);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge every source, overlay `BROCHURE__*` environment variables, expand
    /// `${VAR}` placeholders, and deserialize into [`BrochureConfig`].
    pub fn load(self) -> Result<BrochureConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR),
            )
            .build()?;

        // Convert to serde_json::Value first
        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        // Back through `config` so env strings coerce to the field type
        // ("3" -> u64, "false" -> bool) and digit-only keys stay strings.
        Config::try_from(&v)?.try_deserialize()
    }
}
