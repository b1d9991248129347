//! HTML to [`Webpage`].

use std::collections::HashSet;

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::webpage::{NO_TITLE, Webpage};

/// Elements whose subtrees never contribute body text.
const IRRELEVANT_TAGS: &[&str] = &["script", "style", "img", "input", "nav", "footer"];

/// Parse a fetched document. `url` is the page address used to resolve
/// relative links.
pub fn parse_webpage(url: &Url, html: &str) -> Webpage {
    let doc = Html::parse_document(html);

    Webpage {
        url: url.to_string(),
        title: extract_title(&doc).unwrap_or_else(|| NO_TITLE.to_string()),
        text: extract_text(&doc),
        links: extract_links(&doc, url),
    }
}

fn extract_title(doc: &Html) -> Option<String> {
    let sel = Selector::parse("title").ok()?;
    let title = doc.select(&sel).next()?.text().collect::<String>();
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

fn extract_text(doc: &Html) -> String {
    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| doc.select(&sel).next())
        .unwrap_or_else(|| doc.root_element());

    let mut lines = Vec::new();
    collect_text(body, &mut lines);
    lines.join("\n")
}

fn collect_text(element: ElementRef<'_>, lines: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let line = text.trim();
                if !line.is_empty() {
                    lines.push(line.to_string());
                }
            }
            Node::Element(el) if IRRELEVANT_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, lines);
                }
            }
            _ => {}
        }
    }
}

fn extract_links(doc: &Html, base: &Url) -> Vec<String> {
    let Ok(sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in doc.select(&sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(link) = absolute_link(base, href) else {
            continue;
        };
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }
    links
}

/// Resolve `href` against `base`, keeping only http(s) targets. The fragment
/// is dropped so in-page anchors collapse onto their page.
pub fn absolute_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[test]
    fn parses_minimal_landing_page() {
        let html = r#"<html><title>Acme</title><body><p>We build widgets.</p><a href="/about">About</a></body></html>"#;
        let page = parse_webpage(&base(), html);
        assert_eq!(page.url, "https://example.com/");
        assert_eq!(page.title, "Acme");
        assert!(page.text.contains("We build widgets."));
        assert_eq!(page.links, vec!["https://example.com/about"]);
    }

    #[test]
    fn missing_title_falls_back() {
        let page = parse_webpage(&base(), "<html><body><p>hi</p></body></html>");
        assert_eq!(page.title, NO_TITLE);

        let blank = parse_webpage(&base(), "<html><head><title>  </title></head></html>");
        assert_eq!(blank.title, NO_TITLE);
    }

    #[test]
    fn irrelevant_subtrees_are_skipped() {
        let html = r#"
            <html><head><title> Acme Corp </title></head>
            <body>
              <nav><a href="/pricing">Pricing</a></nav>
              <script>var tracking = 1;</script>
              <style>p { color: red; }</style>
              <h1>Acme</h1>
              <div>
                <p>
                   We build widgets.
                </p>
                <input value="search">
                <p>Since <b>1999</b>.</p>
              </div>
              <footer>Copyright Acme</footer>
            </body></html>"#;
        let page = parse_webpage(&base(), html);
        assert_eq!(page.title, "Acme Corp");
        assert_eq!(page.text, "Acme\nWe build widgets.\nSince\n1999\n.");
        // nav links still count as outbound links
        assert_eq!(page.links, vec!["https://example.com/pricing"]);
    }

    #[test]
    fn links_are_absolute_unique_and_web_only() {
        let html = r##"
            <body>
              <a href="/about">About</a>
              <a href="https://example.com/about">About again</a>
              <a href="/about#team">Team</a>
              <a href="careers">Careers</a>
              <a href="mailto:info@example.com">Mail</a>
              <a href="tel:+15555555">Call</a>
              <a href="javascript:void(0)">Nothing</a>
              <a href="#top">Top</a>
              <a href="">Blank</a>
              <a href="https://twitter.com/acme">Twitter</a>
              <a>No href</a>
            </body>"##;
        let page = parse_webpage(&Url::parse("https://example.com/home/").unwrap(), html);
        assert_eq!(
            page.links,
            vec![
                "https://example.com/about",
                "https://example.com/home/careers",
                "https://example.com/home/",
                "https://twitter.com/acme",
            ]
        );
    }

    #[test]
    fn absolute_link_rejects_other_schemes() {
        assert_eq!(absolute_link(&base(), "ftp://example.com/file"), None);
        assert_eq!(
            absolute_link(&base(), "  /jobs  "),
            Some("https://example.com/jobs".to_string())
        );
    }
}
