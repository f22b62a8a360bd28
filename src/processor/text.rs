//! HTML to enriched text
//!
//! Persisted documents are turned back into plain text that keeps the
//! structure a reader (or a retriever) needs:
//!
//! - headings become `#`-prefixed lines, one `#` per level
//! - paragraphs and list items get explicit line breaks and markers
//! - links read as `text [absolute url]`

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::processor::error::ProcessError;

/// Never rendered; the title only carries the source URL
const SKIPPED: &[&str] = &["script", "style", "meta", "noscript", "title"];

/// Converts persisted HTML documents to enriched text
#[derive(Debug)]
pub struct TextRenderer {
    title: Selector,
    blank_lines: Regex,
    spaces: Regex,
}

fn heading_level(name: &str) -> Option<usize> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn absolute(href: &str, base: Option<&Url>) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

/// Whitespace-collapsed text of an element, links rendered inline
fn flat_text(element: ElementRef<'_>, base: Option<&Url>) -> String {
    let mut parts = Vec::new();
    collect_flat(element, base, &mut parts);
    parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_flat(element: ElementRef<'_>, base: Option<&Url>, parts: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => parts.push(text.to_string()),
            Node::Element(el) if SKIPPED.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    match link(child, base) {
                        Some(rendered) => parts.push(rendered),
                        None => collect_flat(child, base, parts),
                    }
                }
            }
            _ => {}
        }
    }
}

/// `text [url]` for an anchor with an href and visible text
fn link(element: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
    if element.value().name() != "a" {
        return None;
    }
    let href = element.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    let text = element.text().collect::<String>();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }
    Some(format!("{} [{}]", text, absolute(href, base)))
}

fn collect_blocks(element: ElementRef<'_>, base: Option<&Url>, out: &mut Vec<String>) {
    let name = element.value().name();
    if SKIPPED.contains(&name) {
        return;
    }
    if let Some(rendered) = link(element, base) {
        out.push(rendered);
        return;
    }
    if let Some(level) = heading_level(name) {
        let text = flat_text(element, base);
        if !text.is_empty() {
            out.push(format!("\n\n{} {}\n\n", "#".repeat(level), text));
        }
        return;
    }
    if name == "p" {
        let text = flat_text(element, base);
        if !text.is_empty() {
            out.push(format!("\n{}\n", text));
        }
        return;
    }
    if name == "ul" || name == "ol" {
        let mut index = 0;
        for child in element.children().filter_map(ElementRef::wrap) {
            if child.value().name() != "li" {
                collect_blocks(child, base, out);
                continue;
            }
            let text = flat_text(child, base);
            if text.is_empty() {
                collect_blocks(child, base, out);
            } else if name == "ul" {
                out.push(format!("\n- {}", text));
            } else {
                out.push(format!("\n{}. {}", index + 1, text));
            }
            index += 1;
        }
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) if !text.trim().is_empty() => out.push(text.to_string()),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_blocks(child, base, out);
                }
            }
            _ => {}
        }
    }
}

impl TextRenderer {
    pub fn new() -> Result<Self, ProcessError> {
        Ok(Self {
            title: Selector::parse("title")
                .map_err(|e| ProcessError::Other(format!("invalid selector: {}", e)))?,
            blank_lines: Regex::new(r"\n{3,}")?,
            spaces: Regex::new(r" {2,}")?,
        })
    }

    /// Trimmed `<title>` of a document, the source URL for persisted pages
    pub fn title(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.title)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Enriched text of `html`; relative links resolve against `base_url`
    pub fn render(&self, html: &str, base_url: &str) -> String {
        let document = Html::parse_document(html);
        let base = Url::parse(base_url).ok();
        let mut blocks = Vec::new();
        collect_blocks(document.root_element(), base.as_ref(), &mut blocks);

        let text = blocks.join("\n");
        let text = self.blank_lines.replace_all(&text, "\n\n");
        let text = self.spaces.replace_all(&text, " ");
        text.trim().to_string()
    }
}
