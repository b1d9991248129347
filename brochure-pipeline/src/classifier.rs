//! Ask the model which links on a page belong in a brochure.

use std::collections::HashSet;
use std::sync::Arc;

use brochure_common::{BrochureError, Result};
use brochure_llm::traits::{GenerateOpts, LlmClient};
use brochure_web::Webpage;
use brochure_web::extract::absolute_link;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::prompts::{LINK_SYSTEM_PROMPT, link_user_prompt};

/// Links the model judged relevant, in the model's order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSelection {
    #[serde(default)]
    pub links: Vec<SelectedLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedLink {
    /// Free-form label such as "about page" or "careers page".
    #[serde(rename = "type", default)]
    pub kind: String,
    pub url: String,
}

impl LinkSelection {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Compact JSON, e.g. `{"links":[]}`.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"links":[]}"#.to_string())
    }

    /// Keep only links that resolve to one of `page`'s own links, once each.
    fn retain_known(self, page: &Webpage) -> Self {
        let base = Url::parse(&page.url).ok();
        let known: HashSet<&str> = page.links.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();

        let links = self
            .links
            .into_iter()
            .filter_map(|link| {
                let resolved = match &base {
                    Some(base) => absolute_link(base, &link.url)?,
                    None => link.url.trim().to_string(),
                };
                if !known.contains(resolved.as_str()) {
                    tracing::debug!(url=%link.url, "classifier.link.unknown");
                    return None;
                }
                seen.insert(resolved.clone()).then(|| SelectedLink {
                    kind: link.kind,
                    url: resolved,
                })
            })
            .collect();
        Self { links }
    }
}

/// Parse a classifier reply. A ```json fence or surrounding prose is tolerated.
pub fn parse_selection(raw: &str) -> Result<LinkSelection> {
    let json = extract_json_block(raw).unwrap_or_else(|| raw.trim().to_string());
    serde_json::from_str(&json).map_err(|e| {
        BrochureError::Provider(format!("link selection is not valid JSON: {e}"))
    })
}

fn extract_json_block(text: &str) -> Option<String> {
    let re_fence = Regex::new("(?s)```(?:json)?\\s*(\\{.*?\\})\\s*```").ok()?;
    if let Some(caps) = re_fence.captures(text) {
        return Some(caps.get(1)?.as_str().to_string());
    }
    let re_plain = Regex::new("(?s)(\\{.*\\})").ok()?;
    re_plain
        .captures(text)
        .and_then(|c| c.get(1).map(|m| m.as_str().to_string()))
}

/// Picks brochure-relevant links from a page with one JSON-mode model call.
#[derive(Clone)]
pub struct LinkClassifier {
    llm: Arc<dyn LlmClient + Send + Sync>,
}

impl LinkClassifier {
    pub fn new(llm: Arc<dyn LlmClient + Send + Sync>) -> Self {
        Self { llm }
    }

    /// Never fails: model and parse errors are logged and give an empty
    /// selection. A page without links is answered without calling the model.
    pub async fn classify(&self, page: &Webpage) -> LinkSelection {
        if page.links.is_empty() {
            tracing::debug!(url=%page.url, "classifier.skip.no_links");
            return LinkSelection::default();
        }

        let prompt = link_user_prompt(page);
        let reply = match self
            .llm
            .generate(&prompt, Some(LINK_SYSTEM_PROMPT), &GenerateOpts::json())
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(url=%page.url, provider=self.llm.provider(), error=%e, "classifier.model_failed");
                return LinkSelection::default();
            }
        };

        let selection = match parse_selection(&reply.text) {
            Ok(selection) => selection.retain_known(page),
            Err(e) => {
                tracing::warn!(url=%page.url, error=%e, "classifier.parse_failed");
                return LinkSelection::default();
            }
        };

        tracing::info!(
            url=%page.url,
            candidates=page.links.len(),
            selected=selection.links.len(),
            "classifier.done"
        );
        selection
    }
}
