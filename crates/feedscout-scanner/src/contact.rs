//! Best-guess contact email extraction from a rendered page.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Textual matches at or below this length are ignored.
const MIN_EMAIL_LEN: usize = 5;

/// Textual matches at or above this length are ignored.
const MAX_EMAIL_LEN: usize = 100;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"(?i)[a-z0-9._-]+@[a-z0-9.-]+\.[a-z]{2,}").expect("valid regex")
    })
}

fn mailto_selector() -> &'static Selector {
    static MAILTO: OnceLock<Selector> = OnceLock::new();
    MAILTO.get_or_init(|| Selector::parse(r#"a[href^="mailto:"]"#).expect("valid selector"))
}

fn body_selector() -> &'static Selector {
    static BODY: OnceLock<Selector> = OnceLock::new();
    BODY.get_or_init(|| Selector::parse("body").expect("valid selector"))
}

/// Pulls a single contact email out of page text or `mailto:` links.
#[derive(Debug, Clone)]
pub struct EmailExtractor {
    denylist: Vec<String>,
}

impl EmailExtractor {
    pub fn new(denylist: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            denylist: denylist
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .collect(),
        }
    }

    /// Pick an email from visible text, falling back to `mailto:` links only
    /// when the text contains no address-like match at all.
    pub fn extract(&self, text: &str, mailto_hrefs: &[String]) -> Option<String> {
        let mut matches = email_regex().find_iter(text).peekable();

        if matches.peek().is_some() {
            return matches
                .map(|m| m.as_str().trim().to_lowercase())
                .find(|email| self.acceptable(email));
        }

        mailto_hrefs.iter().find_map(|href| mailto_address(href))
    }

    /// Run [`EmailExtractor::extract`] over an HTML document.
    pub fn extract_from_html(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);

        let hrefs: Vec<String> = document
            .select(mailto_selector())
            .filter_map(|el| el.value().attr("href"))
            .map(ToString::to_string)
            .collect();

        self.extract(&visible_text(&document), &hrefs)
    }

    fn acceptable(&self, email: &str) -> bool {
        email.len() > MIN_EMAIL_LEN
            && email.len() < MAX_EMAIL_LEN
            && !self.denylist.iter().any(|deny| email.contains(deny.as_str()))
    }
}

fn mailto_address(href: &str) -> Option<String> {
    let rest = href.trim();
    let rest = rest
        .get(..7)
        .filter(|scheme| scheme.eq_ignore_ascii_case("mailto:"))
        .map(|_| &rest[7..])?;
    let address = rest.split('?').next().unwrap_or_default().trim();
    if address.is_empty() {
        None
    } else {
        Some(address.to_lowercase())
    }
}

/// Body text without script and style content.
fn visible_text(document: &Html) -> String {
    let Some(body) = document.select(body_selector()).next() else {
        return String::new();
    };

    let mut text = String::new();
    for node in body.descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript"));
        if !hidden {
            text.push_str(fragment);
            text.push(' ');
        }
    }
    text
}
