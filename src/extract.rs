//! Readable-text extraction from HTML pages.
//!
//! Used by the HTTP fetcher (competitor pages) and the news parser. Text
//! under boilerplate elements is skipped while walking the DOM, and the main
//! content area is chosen by selector priority:
//!
//! | Priority | Selector          |
//! |----------|-------------------|
//! | 1        | `article`         |
//! | 2        | `main`            |
//! | 3        | `[role="main"]`   |
//! | 4        | `body`            |

use scraper::{ElementRef, Html, Selector};

use crate::traits::ParsedArticle;

/// Elements whose text never counts as page content.
const BOILERPLATE: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "svg", "iframe",
];

const CONTENT_SELECTORS: &[&str] = &["article", "main", "[role=\"main\"]", "body"];

/// Title and main text of a page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageText {
    pub title: Option<String>,
    pub text: String,
}

pub fn extract_page(html: &str) -> PageText {
    let document = Html::parse_document(html);
    PageText {
        title: page_title(&document),
        text: main_text(&document),
    }
}

/// Parse a news page into a [`ParsedArticle`].
///
/// Content comes from `<article>` when present, otherwise from the page's
/// paragraphs. Metadata is read from the usual OpenGraph / article meta tags.
pub fn extract_article(html: &str, url: &str) -> ParsedArticle {
    let document = Html::parse_document(html);

    let title = meta(&document, "property", "og:title").or_else(|| page_title(&document));

    let content = first_match(&document, "article")
        .map(visible_text)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            let paragraphs = select_all(&document, "p")
                .into_iter()
                .map(visible_text)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>();
            (!paragraphs.is_empty()).then(|| paragraphs.join("\n\n"))
        });

    let author = meta(&document, "name", "author")
        .or_else(|| meta(&document, "property", "article:author"));

    let published_date = meta(&document, "property", "article:published_time").or_else(|| {
        first_match(&document, "time[datetime]")
            .and_then(|el| el.value().attr("datetime"))
            .map(|d| d.trim().to_string())
    });

    let mut tags: Vec<String> = meta(&document, "name", "keywords")
        .map(|k| {
            k.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    for tag in meta_all(&document, "property", "article:tag") {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let summary = meta(&document, "name", "description")
        .or_else(|| meta(&document, "property", "og:description"));

    ParsedArticle {
        url: url.to_string(),
        title,
        content,
        author,
        published_date,
        tags,
        summary,
    }
}

fn page_title(document: &Html) -> Option<String> {
    first_match(document, "title")
        .or_else(|| first_match(document, "h1"))
        .map(|el| normalise_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

fn main_text(document: &Html) -> String {
    for selector in CONTENT_SELECTORS {
        if let Some(element) = first_match(document, selector) {
            let text = visible_text(element);
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// Text of `element`, skipping anything inside a boilerplate element.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| BOILERPLATE.contains(&e.name()))
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    normalise_whitespace(&out)
}

fn first_match<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn select_all<'a>(document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn meta_all(document: &Html, attr: &str, key: &str) -> Vec<String> {
    select_all(document, &format!("meta[{attr}=\"{key}\"]"))
        .into_iter()
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

fn meta(document: &Html, attr: &str, key: &str) -> Option<String> {
    meta_all(document, attr, key).into_iter().next()
}

/// Collapse whitespace runs to one space and trim.
fn normalise_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
