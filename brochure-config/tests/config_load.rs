use brochure_common::{LlmConfig, ModelTag};
use brochure_config::BrochureConfigLoader;
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a config file in a temp dir and return its path.
fn write_file(tmp: &TempDir, name: &str, contents: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, contents).expect("write config");
    p
}

const FILE_YAML: &str = r#"
fetch:
  timeout_secs: 5
generation:
  follow_links: true
  max_linked_pages: 4
  temperature: 0.2
providers:
  openai:
    model: "gpt-4o"
    api_key: "${BROCHURE_TEST_OPENAI_KEY}"
  ollama:
    base_url: "http://gpu-box:11434"
"#;

#[test]
#[serial]
fn file_values_and_env_expansion() {
    let tmp = TempDir::new().unwrap();
    let path = write_file(&tmp, "brochure.yaml", FILE_YAML);

    temp_env::with_var("BROCHURE_TEST_OPENAI_KEY", Some("sk-from-env"), || {
        let config = BrochureConfigLoader::new()
            .with_file(&path)
            .load()
            .expect("load config");

        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.generation.max_linked_pages, 4);
        assert_eq!(config.generation.temperature, Some(0.2));
        assert_eq!(config.providers.request_timeout_secs, 120);

        match config.providers.llm_config_for(ModelTag::Gpt).unwrap() {
            LlmConfig::OpenAi { api_key, model, .. } => {
                assert_eq!(api_key, "sk-from-env");
                assert_eq!(model, "gpt-4o");
            }
            other => panic!("unexpected config: {other:?}"),
        }
        match config.providers.llm_config_for(ModelTag::Ollama).unwrap() {
            LlmConfig::Ollama { base_url, .. } => assert_eq!(base_url, "http://gpu-box:11434"),
            other => panic!("unexpected config: {other:?}"),
        }
    });
}

#[test]
#[serial]
fn environment_overrides_file() {
    let tmp = TempDir::new().unwrap();
    let path = write_file(&tmp, "brochure.yaml", FILE_YAML);

    temp_env::with_vars(
        [
            ("BROCHURE__GENERATION__MAX_LINKED_PAGES", Some("2")),
            ("BROCHURE__GENERATION__FOLLOW_LINKS", Some("false")),
            ("BROCHURE__PROVIDERS__GEMINI__MODEL", Some("gemini-2.5-pro")),
        ],
        || {
            let config = BrochureConfigLoader::new()
                .with_file(&path)
                .load()
                .expect("load config");

            assert_eq!(config.generation.max_linked_pages, 2);
            assert!(!config.generation.follow_links);
            assert_eq!(
                config.providers.gemini.model.as_deref(),
                Some("gemini-2.5-pro")
            );
            assert_eq!(config.fetch.timeout_secs, 5);
        },
    );
}

#[test]
#[serial]
fn missing_optional_file_gives_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = BrochureConfigLoader::new()
        .with_optional_file(tmp.path().join("absent.yaml"))
        .load()
        .expect("defaults");

    assert_eq!(config.fetch.timeout_secs, 10);
    assert!(config.generation.follow_links);
    assert_eq!(config.generation.max_linked_pages, 5);
}

#[test]
#[serial]
fn missing_required_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let result = BrochureConfigLoader::new()
        .with_file(tmp.path().join("absent.yaml"))
        .load();
    assert!(result.is_err());
}

#[test]
#[serial]
fn toml_files_are_supported() {
    let tmp = TempDir::new().unwrap();
    let path = write_file(
        &tmp,
        "brochure.toml",
        "[generation]\nmax_prompt_chars = 8000\n\n[providers.claude]\nmodel = \"claude-3-5-sonnet-latest\"\n",
    );

    let config = BrochureConfigLoader::new()
        .with_file(&path)
        .load()
        .expect("load toml");

    assert_eq!(config.generation.max_prompt_chars, 8000);
    assert_eq!(
        config.providers.claude.model.as_deref(),
        Some("claude-3-5-sonnet-latest")
    );
}

#[test]
#[serial]
fn unresolved_placeholder_key_falls_back_to_provider_env() {
    temp_env::with_vars(
        [
            ("GEMINI_API_KEY", Some("g-from-env")),
            ("BROCHURE_TEST_UNSET_KEY", None::<&str>),
        ],
        || {
            let config = BrochureConfigLoader::new()
                .with_yaml_str("providers:\n  gemini:\n    api_key: \"${BROCHURE_TEST_UNSET_KEY}\"\n")
                .load()
                .expect("load config");

            match config.providers.llm_config_for(ModelTag::Gemini).unwrap() {
                LlmConfig::Gemini { api_key, .. } => assert_eq!(api_key, "g-from-env"),
                other => panic!("unexpected config: {other:?}"),
            }
        },
    );
}

#[test]
#[serial]
fn numeric_looking_env_values_keep_their_field_types() {
    temp_env::with_vars(
        [
            ("BROCHURE__PROVIDERS__OPENAI__API_KEY", Some("0012345678")),
            ("BROCHURE__PROVIDERS__OPENAI__MODEL", Some("4242")),
            ("BROCHURE__FETCH__TIMEOUT_SECS", Some("7")),
            ("BROCHURE__GENERATION__TEMPERATURE", Some("0.5")),
        ],
        || {
            let config = BrochureConfigLoader::new().load().expect("load config");

            assert_eq!(config.fetch.timeout_secs, 7);
            assert_eq!(config.generation.temperature, Some(0.5));
            match config.providers.llm_config_for(ModelTag::Gpt).unwrap() {
                LlmConfig::OpenAi { api_key, model, .. } => {
                    assert_eq!(api_key, "0012345678");
                    assert_eq!(model, "4242");
                }
                other => panic!("unexpected config: {other:?}"),
            }
        },
    );
}
