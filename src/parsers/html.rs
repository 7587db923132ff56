use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("static selector"));
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// What the crawler needs from a rendered page source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPage {
    pub title: Option<String>,
    /// Absolute links in document order, without duplicates
    pub links: Vec<String>,
    pub markdown: String,
}

/// Parses HTML content to extract the title, links and a Markdown rendering
pub fn parse(html: &str, base_url: &Url) -> ParsedPage {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let links = extract_links(&doc, base_url);
    ::log::debug!("HTML parser found {} links", links.len());

    ParsedPage {
        title,
        links,
        markdown: html2md::parse_html(html),
    }
}

fn extract_links(doc: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    doc.select(&LINK_SELECTOR)
        .filter_map(|e| e.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .filter(|href| {
            let lower = href.to_ascii_lowercase();
            !(lower.starts_with("javascript:")
                || lower.starts_with("mailto:")
                || lower.starts_with("tel:"))
        })
        .filter_map(|href| base_url.join(href).ok())
        .map(|u| u.to_string())
        .filter(|u| seen.insert(u.clone()))
        .collect()
}
