//! Prompt text for link classification and brochure writing.

use brochure_web::Webpage;

pub const LINK_SYSTEM_PROMPT: &str = "You are provided with a list of links found on a webpage. \
You are able to decide which of the links would be most relevant to include in a brochure about the company, \
such as links to an About page, or a Company page, or Careers/Jobs pages.\n\
You should respond in JSON as in this example:\n\
{\n    \"links\": [\n        {\"type\": \"about page\", \"url\": \"https://full.url/goes/here/about\"},\n        \
{\"type\": \"careers page\", \"url\": \"https://another.full.url/careers\"}\n    ]\n}";

pub const BROCHURE_SYSTEM_PROMPT: &str = "You are an assistant that analyzes the contents of a company website landing page \
and creates a short brochure about the company for prospective customers, investors and recruits. Respond in markdown.";

/// Label used for a linked page the model gave no type.
const DEFAULT_LINK_TYPE: &str = "linked page";

/// System and user messages for one model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrochurePrompt {
    pub system: String,
    pub user: String,
}

/// A fetched sub-page together with the type the classifier gave it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedPage {
    pub kind: String,
    pub page: Webpage,
}

/// User message asking the model to pick brochure-worthy links from `page`.
pub fn link_user_prompt(page: &Webpage) -> String {
    let mut prompt = format!(
        "Here is the list of links on the website of {} - please decide which of these are relevant web links \
for a brochure about the company, respond with the full https URL in JSON format. \
Do not include Terms of Service, Privacy, social media or email links.\n",
        page.url
    );
    prompt.push_str("Links (some might be relative links):\n");
    prompt.push_str(&page.links.join("\n"));
    prompt
}

/// Assemble the brochure request from the landing page and any linked pages.
///
/// The user message is cut to `max_chars` characters.
pub fn build_brochure_prompt(
    company: &str,
    landing: &Webpage,
    linked: &[LinkedPage],
    max_chars: usize,
) -> BrochurePrompt {
    let mut user = format!(
        "Please generate a company brochure for {company}. Here is their landing page:\n"
    );
    user.push_str(&landing.contents());

    for linked_page in linked {
        let kind = match linked_page.kind.trim() {
            "" => DEFAULT_LINK_TYPE,
            kind => kind,
        };
        user.push_str(&format!("{kind} ({}):\n", linked_page.page.url));
        user.push_str(&linked_page.page.contents());
    }

    let user = truncate_chars(user, max_chars);
    BrochurePrompt {
        system: BROCHURE_SYSTEM_PROMPT.to_string(),
        user,
    }
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max_chars) {
        tracing::debug!(
            kept_chars = max_chars,
            dropped_bytes = text.len() - cut,
            "prompt.truncated"
        );
        text.truncate(cut);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, title: &str, text: &str) -> Webpage {
        Webpage {
            url: url.into(),
            title: title.into(),
            text: text.into(),
            links: vec![],
        }
    }

    #[test]
    fn prompt_embeds_company_and_landing_text() {
        let landing = page("https://acme.test/", "Acme", "We build widgets.");
        let prompt = build_brochure_prompt("Acme", &landing, &[], 10_000);
        assert_eq!(prompt.system, BROCHURE_SYSTEM_PROMPT);
        assert_eq!(
            prompt.user,
            "Please generate a company brochure for Acme. Here is their landing page:\n\
Webpage Title:\nAcme\nWebpage Contents:\nWe build widgets.\n\n"
        );
    }

    #[test]
    fn linked_pages_follow_the_landing_page() {
        let landing = page("https://acme.test/", "Acme", "We build widgets.");
        let linked = [
            LinkedPage {
                kind: "about page".into(),
                page: page("https://acme.test/about", "About", "Founded 1999."),
            },
            LinkedPage {
                kind: " ".into(),
                page: page("https://acme.test/jobs", "Jobs", "We are hiring."),
            },
        ];
        let prompt = build_brochure_prompt("Acme", &landing, &linked, 10_000);

        let about = prompt.user.find("about page (https://acme.test/about):\n").unwrap();
        let jobs = prompt.user.find("linked page (https://acme.test/jobs):\n").unwrap();
        assert!(prompt.user.find("We build widgets.").unwrap() < about);
        assert!(about < jobs);
        assert!(prompt.user.ends_with("We are hiring.\n\n"));
    }

    #[test]
    fn user_prompt_is_truncated_on_char_boundary() {
        let landing = page("https://acme.test/", "Café", &"é".repeat(100));
        let prompt = build_brochure_prompt("Acme", &landing, &[], 80);
        assert_eq!(prompt.user.chars().count(), 80);
        assert!(prompt.user.starts_with("Please generate a company brochure for Acme."));
    }

    #[test]
    fn link_prompt_lists_every_link() {
        let mut landing = page("https://acme.test/", "Acme", "");
        landing.links = vec![
            "https://acme.test/about".into(),
            "https://acme.test/careers".into(),
        ];
        let prompt = link_user_prompt(&landing);
        assert!(prompt.starts_with("Here is the list of links on the website of https://acme.test/"));
        assert!(prompt.ends_with("https://acme.test/about\nhttps://acme.test/careers"));
    }
}
