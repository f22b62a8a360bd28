//! # Content Sanitizer
//!
//! Reduces a raw page to a minimal, link-preserving HTML document holding only
//! the page's main content.
//!
//! The work is an ordered list of named passes over a mutable `scraper` tree.
//! The order is load-bearing: each pass assumes the shape left by the previous
//! ones, so passes are never reordered or run concurrently.
//!
//! Source-document passes:
//!
//! 1. `consent_banners` removes cookie-consent containers and buttons
//! 2. `footer_shortcodes` removes page-builder footer blocks matching configured keywords
//! 3. `navigation_chrome` removes nav/header/footer, navigation roles and nav-ish classes/ids
//!
//! Main content is then isolated and moved into a fresh shell whose title is the
//! page URL. Shell passes:
//!
//! 5. `useless_tags`, `empty_containers`, `repeated_breaks`
//! 6. `navigation_residue` removes breadcrumb lists and link-heavy fragments
//! 7. `attributes` strips every attribute except `href` on anchors
//! 8. `nested_divs`, `buttons_to_headings`
//! 9. `absolute_urls` resolves `href`/`src` against the page URL

use ego_tree::NodeId;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, trace};
use url::Url;

use crate::crawler::error::CrawlError;

/// Heuristic tables used by the sanitizer passes
#[derive(Debug, Clone)]
pub struct SanitizerConfig {
    /// Id of the cookie banner container
    pub cookie_container_id: String,

    /// Vendor marker; any element with an attribute value containing it is removed
    pub cookie_marker: String,

    /// Button texts (lowercase) that identify consent-management buttons
    pub consent_phrases: Vec<String>,

    /// Keywords selecting page-builder footer blocks; empty disables the pass
    pub footer_keywords: Vec<String>,

    /// Substrings of class/id values that mark navigation chrome
    pub navigation_patterns: Vec<String>,

    /// Main content selectors in priority order
    pub main_selectors: Vec<String>,

    /// Minimum text length of a fallback content block
    pub min_fallback_text: usize,

    /// Vocabulary counted to reject navigation-heavy fallback blocks
    pub content_nav_words: Vec<String>,

    /// A fallback block must contain fewer distinct nav words than this
    pub max_nav_words: usize,

    /// Link texts (lowercase) that do not count as useful links in chrome elements
    pub link_nav_words: Vec<String>,

    /// Minimum alt text length for an image to survive
    pub min_alt_len: usize,

    /// Chrome elements with at least this much text survive
    pub min_chrome_text: usize,

    /// A link is useful when its text is longer than this
    pub min_link_text: usize,

    /// Keywords identifying breadcrumb lists
    pub breadcrumb_keywords: Vec<String>,

    /// Keywords identifying span-only residue blocks
    pub residue_keywords: Vec<String>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            cookie_container_id: "cmplz-cookiebanner-container".to_string(),
            cookie_marker: "cmplz".to_string(),
            consent_phrases: strings(&["gérer le consentement"]),
            footer_keywords: Vec::new(),
            navigation_patterns: strings(&[
                "nav",
                "navigation",
                "menu",
                "header",
                "footer",
                "sidebar",
                "aside",
                "breadcrumb",
                "skip",
                "search",
                "lang",
                "cookie",
                "banner",
            ]),
            main_selectors: strings(&[
                "main",
                "[role=\"main\"]",
                ".main-content",
                ".content",
                ".page-content",
                "article",
                ".article-content",
            ]),
            min_fallback_text: 500,
            content_nav_words: strings(&[
                "accueil",
                "menu",
                "navigation",
                "connexion",
                "rechercher",
                "thematiques",
                "actualités",
                "evenements",
            ]),
            max_nav_words: 3,
            link_nav_words: strings(&["accueil", "home", "menu", "connexion", "login", "contact"]),
            min_alt_len: 5,
            min_chrome_text: 100,
            min_link_text: 10,
            breadcrumb_keywords: strings(&["accueil", "thématiques", "home"]),
            residue_keywords: strings(&["démarche", "mise à jour", "transports"]),
        }
    }
}

/// Sanitized page: its source URL and the minimal body markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimalDocument {
    /// Source URL, also the document title
    pub title: String,

    /// Serialized children of `<body>`
    pub body: String,
}

impl MinimalDocument {
    /// Serialize as a complete HTML document
    pub fn to_html(&self) -> String {
        format!(
            "<!DOCTYPE html>\n<html><head><title>{}</title></head><body>{}</body></html>",
            escape_text(&self.title),
            self.body
        )
    }
}

struct PassContext<'a> {
    config: &'a SanitizerConfig,
    base: Option<&'a Url>,
    leading_digits: &'a Regex,
}

/// A named transform over the document tree
struct Pass {
    name: &'static str,
    apply: fn(&mut Html, &PassContext<'_>),
}

const SOURCE_PASSES: &[Pass] = &[
    Pass {
        name: "consent_banners",
        apply: remove_consent_banners,
    },
    Pass {
        name: "footer_shortcodes",
        apply: remove_footer_shortcodes,
    },
    Pass {
        name: "navigation_chrome",
        apply: remove_navigation_chrome,
    },
];

const SHELL_PASSES: &[Pass] = &[
    Pass {
        name: "useless_tags",
        apply: remove_useless_tags,
    },
    Pass {
        name: "empty_containers",
        apply: remove_empty_containers,
    },
    Pass {
        name: "repeated_breaks",
        apply: collapse_repeated_breaks,
    },
    Pass {
        name: "navigation_residue",
        apply: remove_navigation_residue,
    },
    Pass {
        name: "attributes",
        apply: strip_attributes,
    },
    Pass {
        name: "nested_divs",
        apply: collapse_nested_divs,
    },
    Pass {
        name: "buttons_to_headings",
        apply: buttons_to_headings,
    },
    Pass {
        name: "absolute_urls",
        apply: absolutize_urls,
    },
];

/// Compiled sanitizer
#[derive(Debug, Clone)]
pub struct Sanitizer {
    config: SanitizerConfig,
    main_selectors: Vec<Selector>,
    leading_digits: Regex,
}

impl Sanitizer {
    /// Compile the configured selectors
    pub fn new(config: SanitizerConfig) -> Result<Self, CrawlError> {
        let main_selectors = config
            .main_selectors
            .iter()
            .map(|s| {
                Selector::parse(s)
                    .map_err(|e| CrawlError::HtmlParse(format!("invalid selector {}: {}", s, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let leading_digits = Regex::new(r"^(\d+)([A-Za-z])")
            .map_err(|e| CrawlError::Other(format!("Invalid pattern: {}", e)))?;

        Ok(Self {
            config,
            main_selectors,
            leading_digits,
        })
    }

    /// The tables this sanitizer was built from
    pub fn config(&self) -> &SanitizerConfig {
        &self.config
    }

    /// Reduce `html` to the minimal document for `page_url`.
    ///
    /// Malformed markup is parsed permissively; this never fails.
    pub fn sanitize(&self, html: &str, page_url: &str) -> MinimalDocument {
        let base = Url::parse(page_url).ok();
        let ctx = PassContext {
            config: &self.config,
            base: base.as_ref(),
            leading_digits: &self.leading_digits,
        };

        let mut source = Html::parse_document(html);
        run_passes(SOURCE_PASSES, &mut source, &ctx);

        let main = self.isolate_main_content(&source);
        let shell_markup = format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            escape_text(page_url),
            main
        );
        let mut shell = Html::parse_document(&shell_markup);
        run_passes(SHELL_PASSES, &mut shell, &ctx);

        let body = find_element(&shell, "body")
            .map(|body| body.inner_html())
            .unwrap_or_default();
        debug!(url = page_url, bytes = body.len(), "Sanitized page");

        MinimalDocument {
            title: page_url.to_string(),
            body,
        }
    }

    /// Outer markup of the main content block.
    ///
    /// Priority selectors first, then the largest non-navigational `div`, then
    /// everything left in `<body>`.
    fn isolate_main_content(&self, html: &Html) -> String {
        for selector in &self.main_selectors {
            if let Some(element) = html.select(selector).next() {
                return element.html();
            }
        }

        let mut best: Option<(ElementRef<'_>, usize)> = None;
        for div in elements_named(html, "div") {
            let text = visible_text(div);
            let len = text.chars().count();
            if len <= self.config.min_fallback_text {
                continue;
            }
            let lower = text.to_lowercase();
            let nav_count = self
                .config
                .content_nav_words
                .iter()
                .filter(|word| lower.contains(word.as_str()))
                .count();
            if nav_count < self.config.max_nav_words && best.is_none_or(|(_, n)| len > n) {
                best = Some((div, len));
            }
        }
        if let Some((div, _)) = best {
            return div.html();
        }

        find_element(html, "body")
            .unwrap_or_else(|| html.root_element())
            .inner_html()
    }
}

fn run_passes(passes: &[Pass], html: &mut Html, ctx: &PassContext<'_>) {
    for pass in passes {
        (pass.apply)(html, ctx);
        trace!(pass = pass.name, "Applied sanitizer pass");
    }
}

// --- tree helpers -----------------------------------------------------------

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn element_name<'a>(element: &'a ElementRef<'_>) -> &'a str {
    element.value().name()
}

/// Live elements named `name`, in document order
fn elements_named<'a>(html: &'a Html, name: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    html.tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == name)
}

fn find_element<'a>(html: &'a Html, name: &'a str) -> Option<ElementRef<'a>> {
    elements_named(html, name).next()
}

fn ids_named(html: &Html, names: &[&str]) -> Vec<NodeId> {
    html.tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| names.contains(&el.value().name()))
        .map(|el| el.id())
        .collect()
}

/// Element still reachable from the document root
fn live_element(html: &Html, id: NodeId) -> Option<ElementRef<'_>> {
    let node = html.tree.get(id)?;
    let attached = node
        .ancestors()
        .last()
        .is_some_and(|top| top.id() == html.tree.root().id());
    if attached { ElementRef::wrap(node) } else { None }
}

fn detach(html: &mut Html, id: NodeId) {
    if let Some(mut node) = html.tree.get_mut(id) {
        node.detach();
    }
}

/// Evaluate `remove` on each listed element against the current tree and detach matches
fn remove_where<F>(html: &mut Html, ids: Vec<NodeId>, mut remove: F) -> usize
where
    F: FnMut(ElementRef<'_>) -> bool,
{
    let mut removed = 0;
    for id in ids {
        let matched = live_element(html, id).is_some_and(&mut remove);
        if matched {
            detach(html, id);
            removed += 1;
        }
    }
    removed
}

/// Text with each segment trimmed and concatenated
fn visible_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

fn count_descendants(element: ElementRef<'_>, names: &[&str]) -> usize {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|el| names.contains(&el.value().name()))
        .count()
}

fn is_structural(element: &ElementRef<'_>) -> bool {
    matches!(element_name(element), "html" | "head" | "body")
}

fn all_element_ids(html: &Html) -> Vec<NodeId> {
    html.tree
        .root()
        .descendants()
        .filter(|n| n.value().is_element())
        .map(|n| n.id())
        .collect()
}

// --- source passes ----------------------------------------------------------

fn remove_consent_banners(html: &mut Html, ctx: &PassContext<'_>) {
    let config = ctx.config;
    let marker = config.cookie_marker.to_lowercase();
    let ids = all_element_ids(html);
    remove_where(html, ids, |el| {
        if is_structural(&el) {
            return false;
        }
        if el.value().id() == Some(config.cookie_container_id.as_str()) {
            return true;
        }
        if !marker.is_empty()
            && el
                .value()
                .attrs()
                .any(|(_, value)| value.to_lowercase().contains(&marker))
        {
            return true;
        }
        if element_name(&el) == "button" {
            let text = visible_text(el).to_lowercase();
            return config.consent_phrases.iter().any(|p| text.contains(p.as_str()));
        }
        false
    });
}

fn remove_footer_shortcodes(html: &mut Html, ctx: &PassContext<'_>) {
    let keywords = &ctx.config.footer_keywords;
    if keywords.is_empty() {
        return;
    }
    let ids = ids_named(html, &["div", "section"]);
    remove_where(html, ids, |el| {
        let class = el.value().attr("class").unwrap_or_default();
        let is_shortcode = match element_name(&el) {
            "div" => el.value().classes().any(|c| c == "elementor-shortcode"),
            _ => class.contains("elementor-top-section"),
        };
        if !is_shortcode {
            return false;
        }
        let text = visible_text(el).to_lowercase();
        keywords.iter().any(|k| text.contains(k.as_str()))
    });
}

fn remove_navigation_chrome(html: &mut Html, ctx: &PassContext<'_>) {
    let ids = ids_named(html, &["nav", "header", "footer"]);
    remove_where(html, ids, |_| true);

    let ids = all_element_ids(html);
    remove_where(html, ids, |el| {
        matches!(
            el.value().attr("role"),
            Some("navigation" | "banner" | "contentinfo")
        )
    });

    let patterns = &ctx.config.navigation_patterns;
    let ids = all_element_ids(html);
    remove_where(html, ids, |el| {
        if is_structural(&el) {
            return false;
        }
        let class = el.value().attr("class").unwrap_or_default().to_lowercase();
        let id = el.value().id().unwrap_or_default().to_lowercase();
        patterns
            .iter()
            .any(|p| class.contains(p.as_str()) || id.contains(p.as_str()))
    });
}

// --- shell passes -----------------------------------------------------------

fn remove_useless_tags(html: &mut Html, ctx: &PassContext<'_>) {
    let config = ctx.config;
    let ids = ids_named(
        html,
        &["script", "style", "meta", "noscript", "link", "svg", "iframe"],
    );
    remove_where(html, ids, |_| true);

    let ids = ids_named(html, &["img"]);
    remove_where(html, ids, |img| {
        let alt = img.value().attr("alt").unwrap_or_default().trim();
        alt.chars().count() < config.min_alt_len
    });

    let ids = ids_named(html, &["header", "footer", "nav", "aside"]);
    remove_where(html, ids, |el| {
        let text_len = visible_text(el).chars().count();
        let useful_links = el
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|a| element_name(a) == "a" && a.value().attr("href").is_some())
            .filter(|a| {
                let text = visible_text(*a);
                let lower = text.to_lowercase();
                !config.link_nav_words.iter().any(|w| lower.contains(w.as_str()))
                    && text.chars().count() > config.min_link_text
            })
            .count();
        text_len < config.min_chrome_text && useful_links == 0
    });
}

fn remove_empty_containers(html: &mut Html, _ctx: &PassContext<'_>) {
    loop {
        let ids = ids_named(html, &["div", "span", "section", "article", "aside"]);
        let removed = remove_where(html, ids, |el| {
            visible_text(el).is_empty() && count_descendants(el, &["img", "input", "button"]) == 0
        });
        if removed == 0 {
            break;
        }
    }
}

fn is_blank_text(node: &Node) -> bool {
    matches!(node, Node::Text(text) if text.trim().is_empty())
}

fn collapse_repeated_breaks(html: &mut Html, _ctx: &PassContext<'_>) {
    let ids = ids_named(html, &["br"]);
    remove_where(html, ids, |br| {
        let mut previous = br.prev_sibling();
        while let Some(node) = previous {
            if is_blank_text(node.value()) || node.value().is_comment() {
                previous = node.prev_sibling();
                continue;
            }
            return ElementRef::wrap(node).is_some_and(|el| element_name(&el) == "br");
        }
        false
    });
}

fn remove_navigation_residue(html: &mut Html, ctx: &PassContext<'_>) {
    let config = ctx.config;

    let ids = ids_named(html, &["ul", "ol"]);
    remove_where(html, ids, |list| {
        if count_descendants(list, &["a"]) < 3 {
            return false;
        }
        let text = list.text().collect::<String>().to_lowercase();
        config
            .breadcrumb_keywords
            .iter()
            .any(|k| text.contains(k.as_str()))
    });

    let ids = ids_named(html, &["div"]);
    remove_where(html, ids, |div| {
        visible_text(div).chars().count() < 200 && count_descendants(div, &["a"]) > 2
    });

    let ids = ids_named(html, &["div"]);
    remove_where(html, ids, |div| {
        let descendants: Vec<_> = div
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .collect();
        let only_spans =
            !descendants.is_empty() && descendants.iter().all(|el| element_name(el) == "span");
        if !only_spans {
            return false;
        }
        let text = visible_text(div);
        let lower = text.to_lowercase();
        text.chars().count() < 100
            && config
                .residue_keywords
                .iter()
                .any(|k| lower.contains(k.as_str()))
    });
}

fn strip_attributes(html: &mut Html, _ctx: &PassContext<'_>) {
    for id in all_element_ids(html) {
        if let Some(mut node) = html.tree.get_mut(id) {
            if let Node::Element(element) = node.value() {
                let is_anchor = &*element.name.local == "a";
                element
                    .attrs
                    .retain(|name, _| is_anchor && &*name.local == "href");
            }
        }
    }
}

/// Single element child, when there is no meaningful text beside it
fn only_element_child(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut found = None;
    for child in element.children() {
        match child.value() {
            Node::Element(_) => {
                if found.is_some() {
                    return None;
                }
                found = ElementRef::wrap(child);
            }
            Node::Text(text) if !text.trim().is_empty() => return None,
            _ => {}
        }
    }
    found
}

fn collapse_nested_divs(html: &mut Html, _ctx: &PassContext<'_>) {
    loop {
        let mut replacement = None;
        for div in elements_named(html, "div") {
            if let Some(child) = only_element_child(div) {
                if element_name(&child) == "div" {
                    replacement = Some((div.id(), child.id()));
                    break;
                }
            }
        }

        let Some((parent, child)) = replacement else {
            break;
        };
        if let Some(mut node) = html.tree.get_mut(parent) {
            node.insert_id_before(child);
            node.detach();
        }
    }
}

fn buttons_to_headings(html: &mut Html, ctx: &PassContext<'_>) {
    for id in ids_named(html, &["button"]) {
        let Some(button) = live_element(html, id) else {
            continue;
        };
        let text = visible_text(button);
        if text.is_empty() {
            continue;
        }
        let text = ctx.leading_digits.replace(&text, "$1 $2").into_owned();

        let fragment = Html::parse_fragment(&format!("<h3>{}</h3>", escape_text(&text)));
        let Some(heading) = find_element(&fragment, "h3") else {
            continue;
        };
        let heading_value = heading.value().clone();
        let text_values: Vec<Node> = heading.children().map(|c| c.value().clone()).collect();

        let mut orphan = html.tree.orphan(Node::Element(heading_value));
        for value in text_values {
            orphan.append(value);
        }
        let heading_id = orphan.id();

        if let Some(mut node) = html.tree.get_mut(id) {
            node.insert_id_before(heading_id);
            node.detach();
        }
    }
}

fn resolve(base: Option<&Url>, value: &str) -> Option<String> {
    match Url::parse(value) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base.and_then(|b| b.join(value).ok()).map(|u| u.to_string()),
    }
}

fn absolutize_urls(html: &mut Html, ctx: &PassContext<'_>) {
    for id in all_element_ids(html) {
        if let Some(mut node) = html.tree.get_mut(id) {
            if let Node::Element(element) = node.value() {
                element.attrs.retain(|name, value| {
                    let local = &*name.local;
                    if local != "href" && local != "src" {
                        return true;
                    }
                    match resolve(ctx.base, value.trim()) {
                        Some(absolute) => {
                            *value = absolute.as_str().into();
                            true
                        }
                        None => false,
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://monservicepublic.gouv.mc/thematiques/logement/aide";

    fn sanitize(html: &str) -> MinimalDocument {
        Sanitizer::new(SanitizerConfig::default())
            .unwrap()
            .sanitize(html, PAGE)
    }

    #[test]
    fn test_chrome_and_scripts_removed() {
        let html = r#"<html><head><script>var a = 1;</script><style>p{}</style></head><body>
            <header><a href="/">Accueil</a></header>
            <nav><a href="/x">Menu</a></nav>
            <main><h1>Aide au logement</h1><script>track()</script>
            <p>Texte <a href="/demarches/formulaire">formulaire de demande</a></p></main>
            <footer>Pied de page</footer></body></html>"#;

        let doc = sanitize(html);
        let out = doc.to_html();
        for tag in ["<script", "<style", "<nav", "<header", "<footer"] {
            assert!(!out.contains(tag), "{} survived in {}", tag, out);
        }
        assert!(out.starts_with("<!DOCTYPE html>\n"));
        assert!(out.contains(&format!("<title>{}</title>", PAGE)));
        assert!(out.contains(
            r#"<a href="https://monservicepublic.gouv.mc/demarches/formulaire">formulaire de demande</a>"#
        ));
        assert_eq!(doc.title, PAGE);
    }

    #[test]
    fn test_consent_banner_removed() {
        let html = r#"<body><div id="cmplz-cookiebanner-container"><p>Cookies</p></div>
            <main><p class="cmplz-hidden">Caché</p><p>Contenu utile</p>
            <button>Gérer le consentement</button></main></body>"#;

        let doc = sanitize(html);
        assert!(!doc.body.contains("Cookies"));
        assert!(!doc.body.contains("Caché"));
        assert!(!doc.body.contains("consentement"));
        assert!(doc.body.contains("Contenu utile"));
    }

    #[test]
    fn test_main_landmark_preferred_over_article() {
        let html = r#"<body><article><p>Article seul</p></article>
            <main><p>Contenu principal</p></main></body>"#;

        let doc = sanitize(html);
        assert!(doc.body.contains("Contenu principal"));
        assert!(!doc.body.contains("Article seul"));
    }

    #[test]
    fn test_largest_div_fallback() {
        let long = "Les démarches administratives sont décrites ici. ".repeat(20);
        let html = format!(
            "<body><div><p>Court</p></div><div class=\"wrapper\"><p>{}</p></div></body>",
            long
        );

        let doc = sanitize(&html);
        assert!(doc.body.contains("Les démarches administratives"));
        assert!(!doc.body.contains("Court"));
    }

    #[test]
    fn test_attributes_stripped_except_href() {
        let html = r#"<main><p class="lead" style="color:red">Texte</p>
            <a class="btn" href="https://example.org/page" target="_blank">Lien externe vers le site</a></main>"#;

        let doc = sanitize(html);
        assert!(doc.body.contains("<p>Texte</p>"));
        assert!(doc.body.contains(r#"<a href="https://example.org/page">"#));
        assert!(!doc.body.contains("class="));
        assert!(!doc.body.contains("target="));
    }

    #[test]
    fn test_nested_divs_collapse() {
        let html = "<main><div><div><div><p>Profond</p></div></div></div></main>";

        let doc = sanitize(html);
        assert!(doc.body.contains("<div><p>Profond</p></div>"));
        assert!(!doc.body.contains("<div><div>"));
    }

    #[test]
    fn test_buttons_become_headings() {
        let html = "<main><button>1Demande de logement</button><p>Détails</p><button></button></main>";

        let doc = sanitize(html);
        assert!(doc.body.contains("<h3>1 Demande de logement</h3>"));
        assert_eq!(doc.body.matches("<button").count(), 1);
    }

    #[test]
    fn test_breadcrumb_and_link_farms_removed() {
        let html = r#"<main>
            <ul><li><a href="/">Accueil</a></li><li><a href="/thematiques">Thématiques</a></li><li><a href="/t/l">Logement</a></li></ul>
            <div><a href="/a">A</a><a href="/b">B</a><a href="/c">C</a></div>
            <p>Paragraphe conservé</p></main>"#;

        let doc = sanitize(html);
        assert!(!doc.body.contains("<ul>"));
        assert!(!doc.body.contains(">A</a>"));
        assert!(doc.body.contains("Paragraphe conservé"));
    }

    /// Run a single shell pass over `markup`
    fn run_pass(apply: fn(&mut Html, &PassContext<'_>), markup: &str) -> String {
        let sanitizer = Sanitizer::new(SanitizerConfig::default()).unwrap();
        let ctx = PassContext {
            config: &sanitizer.config,
            base: None,
            leading_digits: &sanitizer.leading_digits,
        };
        let mut html = Html::parse_document(markup);
        apply(&mut html, &ctx);
        html.root_element().html()
    }

    #[test]
    fn test_chrome_with_content_survives_useless_tags() {
        let long = "Informations pratiques ".repeat(6);
        let markup = format!(
            r#"<body><header>{}</header>
            <footer><a href="/plan">Plan du quartier Fontvieille</a></footer>
            <nav><a href="/">Accueil du site public</a></nav>
            <aside><a href="/x">Voir</a></aside></body>"#,
            long
        );

        let out = run_pass(remove_useless_tags, &markup);
        assert!(out.contains("<header>Informations pratiques"));
        assert!(out.contains("Plan du quartier Fontvieille"));
        assert!(!out.contains("<nav>"));
        assert!(!out.contains("<aside>"));
    }

    #[test]
    fn test_long_aside_kept_in_main() {
        let long = "Les pièces justificatives sont à déposer au guichet. ".repeat(3);
        let html = format!(
            "<main><p>Contenu</p><aside>{}</aside><aside>Bref</aside></main>",
            long
        );

        let doc = sanitize(&html);
        assert!(doc.body.contains("<aside>Les pièces justificatives"));
        assert!(!doc.body.contains("Bref"));
    }

    #[test]
    fn test_span_only_residue_removed() {
        let html = "<main><div><span>Démarche en ligne</span><span>Mise à jour</span></div>\
            <div><span>Horaires du guichet</span></div><p>Contenu</p></main>";

        let doc = sanitize(html);
        assert!(!doc.body.contains("Démarche en ligne"));
        assert!(doc.body.contains("<div><span>Horaires du guichet</span></div>"));
        assert!(doc.body.contains("<p>Contenu</p>"));
    }

    #[test]
    fn test_nested_empty_containers_removed() {
        let html = "<main><div> <div>\n<div><span> </span></div></div></div>\
            <section><span></span></section><p>Texte</p></main>";

        let doc = sanitize(html);
        assert!(!doc.body.contains("<div"));
        assert!(!doc.body.contains("<span"));
        assert!(!doc.body.contains("<section"));
        assert!(doc.body.contains("<p>Texte</p>"));
    }

    #[test]
    fn test_images_need_alt_text() {
        let html = r#"<main><img src="/a.png"><img src="/b.png" alt="Carte du réseau de bus"><p>x</p></main>"#;

        let doc = sanitize(html);
        assert_eq!(doc.body.matches("<img").count(), 1);
    }

    #[test]
    fn test_repeated_breaks_collapse() {
        let html = "<main><p>Ligne<br><br> <br>Suite</p></main>";

        let doc = sanitize(html);
        assert_eq!(doc.body.matches("<br>").count(), 1);
        assert!(doc.body.contains("Suite"));
    }

    #[test]
    fn test_every_href_absolute() {
        let html = r##"<main><p><a href="#section">Aller à la section</a>
            <a href="../autre">Autre page liée</a>
            <a href="mailto:contact@gouv.mc">Écrire au service</a></p></main>"##;

        let doc = sanitize(html);
        let parsed = Html::parse_fragment(&doc.body);
        let anchors = Selector::parse("a").unwrap();
        let mut count = 0;
        for a in parsed.select(&anchors) {
            let href = a.value().attr("href").unwrap();
            assert!(Url::parse(href).is_ok(), "relative href {}", href);
            count += 1;
        }
        assert_eq!(count, 3);
        assert!(doc.body.contains("https://monservicepublic.gouv.mc/thematiques/autre"));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let config = SanitizerConfig {
            main_selectors: vec!["[[".to_string()],
            ..Default::default()
        };
        assert!(matches!(Sanitizer::new(config), Err(CrawlError::HtmlParse(_))));
    }
}
