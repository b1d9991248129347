use std::sync::Arc;

use brochure_common::{BrochureConfig, GenerationConfig, ModelTag, Result};
use brochure_llm::traits::{GenerateOpts, LlmClient};
use brochure_llm::{TextStream, ensure_llm_ready};
use brochure_web::{HttpPageFetcher, PageFetcher};
use serde::Serialize;

use crate::classifier::{LinkClassifier, LinkSelection};
use crate::prompts::{BrochurePrompt, LinkedPage, build_brochure_prompt};

/// A finished brochure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Brochure {
    pub company: String,
    pub markdown: String,
    pub model: String,
    /// Pages whose contents went into the prompt, landing page first.
    pub sources: Vec<String>,
}

/// Everything gathered before the generation call.
#[derive(Debug, Clone)]
pub struct PreparedBrochure {
    pub company: String,
    pub prompt: BrochurePrompt,
    pub selection: LinkSelection,
    pub sources: Vec<String>,
}

/// Fetch, classify, and write: the whole brochure pipeline.
pub struct BrochureGenerator {
    fetcher: Arc<dyn PageFetcher>,
    llm: Arc<dyn LlmClient + Send + Sync>,
    classifier: LinkClassifier,
    config: GenerationConfig,
}

impl BrochureGenerator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        llm: Arc<dyn LlmClient + Send + Sync>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            fetcher,
            classifier: LinkClassifier::new(llm.clone()),
            llm,
            config,
        }
    }

    /// Build a generator for a model tag such as `"GPT"` or `"gemini"`.
    ///
    /// An unknown tag is rejected before any client is built or any request
    /// is made.
    pub async fn for_model(config: &BrochureConfig, tag: &str) -> Result<Self> {
        let tag: ModelTag = tag.parse()?;
        let llm_config = config.providers.llm_config_for(tag)?;
        let llm = ensure_llm_ready(&llm_config, config.providers.request_timeout()).await?;
        let fetcher = Arc::new(HttpPageFetcher::new(&config.fetch)?);

        tracing::info!(%tag, model=%llm.model_name(), "generator.ready");
        Ok(Self::new(fetcher, llm, config.generation.clone()))
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Gather page contents and assemble the prompt.
    pub async fn prepare(&self, company: &str, url: &str) -> PreparedBrochure {
        let landing = self.fetcher.fetch(url).await;
        let mut sources = vec![landing.url.clone()];

        let selection = if self.config.follow_links {
            self.classifier.classify(&landing).await
        } else {
            LinkSelection::default()
        };

        let mut linked = Vec::new();
        for link in selection
            .links
            .iter()
            .filter(|link| link.url != landing.url)
            .take(self.config.max_linked_pages)
        {
            let page = self.fetcher.fetch(&link.url).await;
            if page.is_empty() {
                tracing::debug!(url=%link.url, "generator.linked_page.empty");
                continue;
            }
            sources.push(page.url.clone());
            linked.push(LinkedPage {
                kind: link.kind.clone(),
                page,
            });
        }

        let prompt =
            build_brochure_prompt(company, &landing, &linked, self.config.max_prompt_chars);
        tracing::info!(
            company,
            url,
            linked_pages = linked.len(),
            prompt_chars = prompt.user.chars().count(),
            "generator.prepared"
        );

        PreparedBrochure {
            company: company.to_string(),
            prompt,
            selection,
            sources,
        }
    }

    /// Generate the whole brochure in one call.
    pub async fn generate(&self, company: &str, url: &str) -> Result<Brochure> {
        let prepared = self.prepare(company, url).await;
        let response = self
            .llm
            .generate(
                &prepared.prompt.user,
                Some(&prepared.prompt.system),
                &self.opts(),
            )
            .await?;

        tracing::info!(
            company,
            provider = self.llm.provider(),
            tokens_used = ?response.tokens_used,
            "generator.done"
        );
        Ok(Brochure {
            company: prepared.company,
            markdown: response.text,
            model: response
                .model
                .unwrap_or_else(|| self.llm.model_name().to_string()),
            sources: prepared.sources,
        })
    }

    /// Generate the brochure as a stream of Markdown fragments. Dropping the
    /// stream abandons the request.
    pub async fn stream(&self, company: &str, url: &str) -> Result<TextStream> {
        let prepared = self.prepare(company, url).await;
        tracing::info!(company, provider = self.llm.provider(), "generator.stream.start");
        self.llm
            .generate_stream(
                &prepared.prompt.user,
                Some(&prepared.prompt.system),
                &self.opts(),
            )
            .await
    }

    fn opts(&self) -> GenerateOpts {
        GenerateOpts {
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            json: false,
        }
    }
}
