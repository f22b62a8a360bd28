//! Rendering of directory records
//!
//! Two outputs:
//!
//! - the whole-listing markdown intermediate of one language and its minimal
//!   HTML conversion, kept as debug artifacts of a run
//! - the per-record HTML file that lands in the output tree

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};

use super::{Language, ServiceRecord, is_sentinel};
use crate::crawler::storage::sanitize_file_stem;

/// Escape text for HTML content and attribute values
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let line = line.trim();
        if line.starts_with(['-', '+']) {
            out.push('\\');
        }
        for c in line.chars() {
            if matches!(c, '\\' | '*' | '_' | '[' | ']' | '`' | '<' | '>' | '#') {
                out.push('\\');
            }
            out.push(c);
        }
    }
    out
}

/// File-system friendly version of a service name, at most 50 characters
pub fn clean_name(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();

    let mut out = String::with_capacity(kept.len());
    let mut in_separator = false;
    for c in kept.trim().chars() {
        if c == '-' || c.is_whitespace() {
            if !in_separator {
                out.push('_');
            }
            in_separator = true;
        } else {
            out.push(c);
            in_separator = false;
        }
    }
    out.chars().take(50).collect()
}

/// `{ACR}_{clean name}_{FR|EN}_annuaire-services.{extension}`
pub fn record_file_name(record: &ServiceRecord, acronym: &str, extension: &str) -> String {
    format!(
        "{}_{}_{}_annuaire-services.{}",
        sanitize_file_stem(acronym),
        clean_name(&record.name),
        record.language.code(),
        extension
    )
}

fn labelled_line(label: &str, value: &str) -> String {
    format!("**{} :** {}\n\n", label, escape_markdown(value))
}

fn labelled_block(label: &str, value: &str) -> String {
    format!("**{} :**\n{}\n\n", label, escape_markdown(value))
}

fn labelled_link(label: &str, text: &str, url: &str) -> String {
    if is_sentinel(url) {
        labelled_line(label, url)
    } else {
        format!("**{} :** [{}](<{}>)\n\n", label, escape_markdown(text), url)
    }
}

/// Markdown listing of every record of one language
pub fn render_listing_markdown(records: &[ServiceRecord], language: Language) -> String {
    let locale = language.locale();
    let mut md = format!("# {}\n\n_{}_\n\n", locale.listing_title, locale.listing_intro);

    for record in records {
        md.push_str(&format!(
            "## {} - ({})\n\n",
            escape_markdown(&record.name),
            escape_markdown(&record.acronym)
        ));
        md.push_str(&labelled_line(locale.acronym_label, &record.acronym));
        md.push_str(&labelled_block(locale.address_label, &record.address));
        md.push_str(&labelled_block(locale.hours_label, &record.opening_hours));
        md.push_str(&labelled_line(locale.phone_label, &record.phone));
        md.push_str(&labelled_link(
            locale.contact_label,
            locale.contact_label,
            &record.contact_link,
        ));
        md.push_str(&labelled_link(
            locale.organization_label,
            locale.organization_link_text,
            &record.organization_page_link,
        ));
        md.push_str("---\n\n");
    }
    md
}

/// Tracks the open service block while converting markdown
struct HtmlState {
    out: String,
    in_service: bool,
}

impl HtmlState {
    fn close_service(&mut self) {
        if self.in_service {
            self.out.push_str("  </div>\n");
            self.in_service = false;
        }
    }

    fn handle_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.handle_start(tag),
            Event::End(tag_end) => self.handle_end(tag_end),
            Event::Text(text) | Event::Code(text) => self.out.push_str(&escape_html(&text)),
            Event::SoftBreak | Event::HardBreak => self.out.push_str("<br>"),
            Event::Rule => {
                self.close_service();
                self.out.push_str("  <hr>\n");
            }
            _ => {}
        }
    }

    fn handle_start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                if level == HeadingLevel::H2 {
                    self.close_service();
                    self.out.push_str("  <div>\n    <h2>");
                    self.in_service = true;
                } else {
                    self.out.push_str("  <h1>");
                }
            }
            Tag::Paragraph => self.out.push_str(if self.in_service { "    <p>" } else { "  <p>" }),
            Tag::Strong => self.out.push_str("<strong>"),
            Tag::Link { dest_url, .. } => {
                self.out
                    .push_str(&format!("<a href=\"{}\">", escape_html(&dest_url)));
            }
            _ => {}
        }
    }

    fn handle_end(&mut self, tag_end: TagEnd) {
        match tag_end {
            TagEnd::Heading(HeadingLevel::H2) => self.out.push_str("</h2>\n"),
            TagEnd::Heading(_) => self.out.push_str("</h1>\n"),
            TagEnd::Paragraph => self.out.push_str("</p>\n"),
            TagEnd::Strong => self.out.push_str("</strong>"),
            TagEnd::Link => self.out.push_str("</a>"),
            _ => {}
        }
    }
}

/// Convert the listing markdown into a minimal HTML document titled `target_url`
pub fn markdown_to_html(markdown: &str, target_url: &str) -> String {
    let mut state = HtmlState {
        out: format!(
            "<!DOCTYPE html>\n<html>\n<head>\n  <title>{}</title>\n</head>\n<body>\n",
            escape_html(target_url)
        ),
        in_service: false,
    };
    for event in Parser::new(markdown) {
        state.handle_event(event);
    }
    state.close_service();
    state.out.push_str("</body>\n</html>");
    state.out
}

fn lines_as_html(value: &str) -> String {
    value
        .lines()
        .map(escape_html)
        .collect::<Vec<_>>()
        .join("<br>")
}

fn link_paragraph(label: &str, text: &str, url: &str) -> String {
    let value = if is_sentinel(url) {
        escape_html(url)
    } else {
        format!("<a href=\"{}\">{}</a>", escape_html(url), escape_html(text))
    };
    format!("    <p><strong>{} :</strong> {}</p>\n", escape_html(label), value)
}

/// Per-record document; `acronym` overrides the record's own (FR authority for EN)
pub fn render_record_html(record: &ServiceRecord, acronym: &str, listing_url: &str) -> String {
    let locale = record.language.locale();
    let entity_url = escape_html(&format!("{}?entity={}", listing_url, record.service_id));

    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n  <title>{entity_url}</title>\n</head>\n<body>\n  <h1>{entity_url}</h1>\n  <h2>{} - ({})</h2>\n  <div>\n",
        escape_html(&record.name),
        escape_html(acronym),
    );
    html.push_str(&format!(
        "    <p><strong>{} :</strong> {}</p>\n",
        escape_html(locale.acronym_label),
        escape_html(acronym)
    ));
    html.push_str(&format!(
        "    <p><strong>{} :</strong><br>{}</p>\n",
        escape_html(locale.address_label),
        lines_as_html(&record.address)
    ));
    html.push_str(&format!(
        "    <p><strong>{} :</strong><br>{}</p>\n",
        escape_html(locale.hours_label),
        lines_as_html(&record.opening_hours)
    ));
    html.push_str(&format!(
        "    <p><strong>{} :</strong> {}</p>\n",
        escape_html(locale.phone_label),
        escape_html(&record.phone)
    ));
    html.push_str(&link_paragraph(
        locale.contact_label,
        locale.contact_label,
        &record.contact_link,
    ));
    html.push_str(&link_paragraph(
        locale.organization_label,
        locale.organization_link_text,
        &record.organization_page_link,
    ));
    html.push_str("  </div>\n</body>\n</html>");
    html
}
