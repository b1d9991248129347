use serde::Serialize;

/// Title used when a page has none, or could not be fetched.
pub const NO_TITLE: &str = "No title found";

/// The useful parts of one fetched page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Webpage {
    pub url: String,
    pub title: String,
    /// Visible body text, one text node per line.
    pub text: String,
    /// Unique absolute http(s) links in first-seen order.
    pub links: Vec<String>,
}

impl Webpage {
    /// The degraded result for a page that could not be fetched or parsed.
    pub fn empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: NO_TITLE.to_string(),
            text: String::new(),
            links: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.links.is_empty()
    }

    /// Title and text in the block format used inside model prompts.
    pub fn contents(&self) -> String {
        format!(
            "Webpage Title:\n{}\nWebpage Contents:\n{}\n\n",
            self.title, self.text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_page_has_placeholder_title() {
        let page = Webpage::empty("https://example.com/");
        assert_eq!(page.title, "No title found");
        assert!(page.text.is_empty());
        assert!(page.links.is_empty());
        assert!(page.is_empty());
    }

    #[test]
    fn contents_renders_title_and_text() {
        let page = Webpage {
            url: "https://example.com/".into(),
            title: "Acme".into(),
            text: "We build widgets.".into(),
            links: vec![],
        };
        assert_eq!(
            page.contents(),
            "Webpage Title:\nAcme\nWebpage Contents:\nWe build widgets.\n\n"
        );
    }
}
