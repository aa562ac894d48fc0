//! HTML-to-text extraction.
//!
//! Strips markup, scripts, and chrome elements (nav bars, headers,
//! footers) and collapses whitespace, leaving the readable text that gets
//! chunked and embedded.


use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Elements whose entire subtree is noise for retrieval purposes.
const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "nav", "header", "footer", "aside", "button",
    "template", "svg",
];

/// Elements that introduce a line break around their content.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "ul", "ol", "li", "table", "tr", "pre",
    "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "br", "hr", "dl", "dt", "dd",
];

/// Readable content extracted from a single HTML page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    /// The page title, from `<title>` or the first `<h1>`.
    pub title: String,
    /// Plain text with markup stripped and whitespace collapsed.
    pub text: String,
}

/// Transform raw HTML into plain readable text.
#[inline]
pub fn extract_content(html: &str) -> Result<ExtractedPage> {
    let document = Html::parse_document(html);

    let title = extract_title(&document);

    let mut raw_text = String::new();
    collect_text(document.root_element(), &mut raw_text);
    let text = collapse_whitespace(&raw_text);

    debug!(
        "Extracted content: title='{}', {} chars of text",
        title,
        text.len()
    );

    Ok(ExtractedPage { title, text })
}

fn extract_title(document: &Html) -> String {
    let title_selector = Selector::parse("title").expect("selector is valid");
    if let Some(title_el) = document.select(&title_selector).next() {
        let title = title_el.text().collect::<String>().trim().to_string();
        if !title.is_empty() {
            return title;
        }
    }

    let h1_selector = Selector::parse("h1").expect("selector is valid");
    document
        .select(&h1_selector)
        .next()
        .map(|h1| h1.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Recursively collect text, skipping excluded subtrees and inserting line
/// breaks around block elements.
fn collect_text(element: ElementRef, out: &mut String) {
    let tag_name = element.value().name();

    if EXCLUDED_TAGS.contains(&tag_name) || tag_name == "head" {
        return;
    }

    let is_block = BLOCK_TAGS.contains(&tag_name);
    if is_block {
        out.push('\n');
    }

    for child in element.children() {
        match child.value() {
            scraper::node::Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text(child_ref, out);
                }
            }
            scraper::node::Node::Text(text) => {
                out.push_str(&text.text);
            }
            _ => {} // Skip comments, processing instructions, etc.
        }
    }

    if is_block {
        out.push('\n');
    }
}

/// Collapse runs of whitespace within lines and drop blank lines.
fn collapse_whitespace(raw: &str) -> String {
    let mut lines = Vec::new();

    for line in raw.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            lines.push(collapsed);
        }
    }

    lines.join("\n")
}
