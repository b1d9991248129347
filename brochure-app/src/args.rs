use brochure_common::BrochureConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "brochure")]
#[command(about = "Generate a Markdown company brochure from the company's website")]
#[command(version)]
pub struct Args {
    /// Company name used in the brochure
    #[arg(short, long)]
    pub company: String,

    /// Landing page URL
    #[arg(short, long)]
    pub url: String,

    /// Model backend: GPT, Gemini, Claude or Ollama
    #[arg(short, long, env = "BROCHURE_MODEL", default_value = "GPT")]
    pub model: String,

    /// Print the brochure as it is generated
    #[arg(long)]
    pub stream: bool,

    /// Only use the landing page; skip link classification
    #[arg(long)]
    pub no_follow_links: bool,

    /// Maximum number of linked pages to fetch
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Config file (YAML, TOML or JSON); defaults to <config dir>/brochure/brochure.yaml
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Mirror debug logs to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Fold command-line overrides into the loaded configuration.
    pub fn apply(&self, config: &mut BrochureConfig) {
        if self.no_follow_links {
            config.generation.follow_links = false;
        }
        if let Some(max) = self.max_pages {
            config.generation.max_linked_pages = max;
        }
    }
}
