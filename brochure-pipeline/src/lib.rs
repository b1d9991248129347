//! The brochure pipeline.
//!
//! Fetch the landing page, optionally let the model pick relevant sub-pages
//! and fetch those too, then ask the model for a Markdown brochure in one
//! call, returned whole or as a [`brochure_llm::TextStream`].
//!
//! ```no_run
//! use brochure_common::BrochureConfig;
//! use brochure_pipeline::BrochureGenerator;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> brochure_common::Result<()> {
//! let generator = BrochureGenerator::for_model(&BrochureConfig::default(), "GPT").await?;
//! let brochure = generator.generate("Acme", "https://acme.example").await?;
//! println!("{}", brochure.markdown);
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod generator;
pub mod prompts;

pub use classifier::{LinkClassifier, LinkSelection, SelectedLink};
pub use generator::{Brochure, BrochureGenerator, PreparedBrochure};
pub use prompts::{BrochurePrompt, LinkedPage};
