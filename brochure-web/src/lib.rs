//! Webpage acquisition for the brochure pipeline.
//!
//! - [`Webpage`]: title, cleaned body text, and outbound links of one page
//! - [`extract::parse_webpage`]: HTML to [`Webpage`] with `scraper`
//! - [`PageFetcher`] and its HTTP implementation [`HttpPageFetcher`]
//!
//! Fetching never fails: any network, status, or URL problem is logged and
//! degrades to [`Webpage::empty`].

pub mod extract;
pub mod fetch;
pub mod webpage;

pub use fetch::{HttpPageFetcher, PageFetcher};
pub use webpage::{NO_TITLE, Webpage};
