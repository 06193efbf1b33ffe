// src/utils/mod.rs

//! Utility functions and helpers.

pub mod http;
pub mod url;

use scraper::Html;
use scraper::node::Node;

/// Elements whose boundaries separate words in rendered text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Convert an HTML fragment to whitespace-normalized plain text.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut text = String::with_capacity(html.len());
    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if BLOCK_ELEMENTS.contains(&e.name()) => text.push(' '),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize `pt_br` style locale tags to `pt_BR`.
pub fn normalize_locale(locale: &str) -> String {
    match locale.split_once('_') {
        Some((language, country)) if !country.contains('_') => {
            format!("{}_{}", language.to_lowercase(), country.to_uppercase())
        }
        _ => locale.to_string(),
    }
}

/// Language part of a locale tag, lowercased.
pub fn locale_language(locale: &str) -> String {
    locale
        .split(['_', '-'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Split `facet:value` at the first colon; `None` when malformed.
pub fn split_tag(tag: &str) -> Option<(&str, &str)> {
    tag.split_once(':')
        .filter(|(facet, value)| !facet.is_empty() && !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text() {
        assert_eq!(
            html_to_text("<p>Hello <b>big</b> world</p><p>Again</p>"),
            "Hello big world Again"
        );
        assert_eq!(html_to_text("plain   text"), "plain text");
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("pt_br"), "pt_BR");
        assert_eq!(normalize_locale("EN_us"), "en_US");
        assert_eq!(normalize_locale("fr"), "fr");
    }

    #[test]
    fn test_locale_language() {
        assert_eq!(locale_language("pt_BR"), "pt");
        assert_eq!(locale_language("EN"), "en");
    }

    #[test]
    fn test_split_tag() {
        assert_eq!(split_tag("category:news"), Some(("category", "news")));
        assert_eq!(split_tag("category:news/world"), Some(("category", "news/world")));
        assert_eq!(split_tag("malformed"), None);
        assert_eq!(split_tag(":x"), None);
    }
}
