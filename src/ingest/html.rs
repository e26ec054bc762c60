//! Readable-text extraction from HTML pages.

use scraper::{ElementRef, Html, Node, Selector};

use super::SourceError;

/// Elements whose text never belongs to the readable body.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "nav", "header", "footer",
];

/// Elements that start a new paragraph in the extracted text.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "main", "aside", "h1", "h2", "h3", "h4", "h5", "h6", "li",
    "ul", "ol", "table", "tr", "blockquote", "pre", "figure", "figcaption", "dd", "dt", "br", "hr",
];

const HTML_PREFIXES: &[&[u8]] = &[b"<!doctype", b"<html", b"<head", b"<body"];

struct RootSelectors {
    article: Selector,
    main: Selector,
    body: Selector,
    title: Selector,
}

impl RootSelectors {
    fn new() -> Result<Self, SourceError> {
        Ok(Self {
            article: parse_selector("article")?,
            main: parse_selector("main")?,
            body: parse_selector("body")?,
            title: parse_selector("title")?,
        })
    }

    fn readable_root<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        document
            .select(&self.article)
            .next()
            .or_else(|| document.select(&self.main).next())
            .or_else(|| document.select(&self.body).next())
    }
}

fn parse_selector(selector: &str) -> Result<Selector, SourceError> {
    Selector::parse(selector)
        .map_err(|error| SourceError::Extraction(format!("invalid selector {selector}: {error:?}")))
}

/// Page text and `<title>` extracted from an HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlText {
    /// Readable text with paragraphs separated by blank lines (not yet normalized).
    pub text: String,
    /// Trimmed `<title>` contents, if present and non-empty.
    pub title: Option<String>,
}

/// Extract readable text from the `<article>`, `<main>`, or `<body>` of `html`.
pub fn html_to_text(html: &str) -> Result<HtmlText, SourceError> {
    let selectors = RootSelectors::new()?;
    let document = Html::parse_document(html);

    let title = document
        .select(&selectors.title)
        .next()
        .map(|element| {
            element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|title| !title.is_empty());

    let mut text = String::new();
    if let Some(root) = selectors.readable_root(&document) {
        collect_text(root, &mut text);
    }

    Ok(HtmlText { text, title })
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(inner) => {
                let name = inner.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                let Some(child_element) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push_str("\n\n");
                }
                collect_text(child_element, out);
                if block {
                    out.push_str("\n\n");
                }
            }
            _ => {}
        }
    }
}

/// Best-effort sniff for HTML bodies served without a useful content type.
pub fn bytes_look_like_html(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let head: Vec<u8> = bytes[start..]
        .iter()
        .take(16)
        .map(u8::to_ascii_lowercase)
        .collect();
    HTML_PREFIXES.iter().any(|prefix| head.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::normalize_text;

    #[test]
    fn prefers_article_and_skips_chrome() {
        let html = r#"<!DOCTYPE html>
            <html><head><title>  Graph   Methods </title><style>p { color: red }</style></head>
            <body>
              <nav>Home | About</nav>
              <article>
                <h1>Overview</h1>
                <p>First paragraph.</p>
                <script>console.log("ignored")</script>
                <p>Second <em>paragraph</em>.</p>
              </article>
              <footer>Copyright</footer>
            </body></html>"#;

        let extracted = html_to_text(html).expect("html");
        assert_eq!(extracted.title.as_deref(), Some("Graph Methods"));
        assert_eq!(
            normalize_text(&extracted.text),
            "Overview\n\nFirst paragraph.\n\nSecond paragraph."
        );
    }

    #[test]
    fn falls_back_to_body_without_title() {
        let extracted =
            html_to_text("<html><body><header>Top</header><div>Only body text</div></body></html>")
                .expect("html");
        assert_eq!(extracted.title, None);
        assert_eq!(normalize_text(&extracted.text), "Only body text");
    }

    #[test]
    fn sniffs_html_prefixes() {
        assert!(bytes_look_like_html(b"  \n<!DOCTYPE html><html>"));
        assert!(bytes_look_like_html(b"<HTML><body>"));
        assert!(!bytes_look_like_html(b"plain text <html>"));
        assert!(!bytes_look_like_html(b""));
    }
}
