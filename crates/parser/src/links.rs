use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).expect("valid regex"));

fn selector(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

/// Collect every candidate URL referenced by a page: `href`
/// from `a`/`link`, `src` from `img`/`script`, plus every regex match against
/// the raw body. Relative references are resolved against `base_url` and
/// normalized; the result is deduplicated.
pub fn extract_links(document: &Html, raw_html: &str, base_url: &Url) -> HashSet<String> {
    let mut raw_refs: HashSet<String> = HashSet::new();

    if let Some(sel) = selector("a[href]") {
        for el in document.select(&sel) {
            if let Some(href) = el.value().attr("href") {
                raw_refs.insert(href.to_string());
            }
        }
    }
    if let Some(sel) = selector("link[href]") {
        for el in document.select(&sel) {
            if let Some(href) = el.value().attr("href") {
                raw_refs.insert(href.to_string());
            }
        }
    }
    if let Some(sel) = selector("img[src]") {
        for el in document.select(&sel) {
            if let Some(src) = el.value().attr("src") {
                raw_refs.insert(src.to_string());
            }
        }
    }
    if let Some(sel) = selector("script[src]") {
        for el in document.select(&sel) {
            if let Some(src) = el.value().attr("src") {
                raw_refs.insert(src.to_string());
            }
        }
    }
    for m in URL_RE.find_iter(raw_html) {
        raw_refs.insert(m.as_str().to_string());
    }

    raw_refs
        .into_iter()
        .filter_map(|r| {
            base_url
                .join(&r)
                .ok()
                .and_then(|u| crawler_core::normalize::normalize_url(u.as_str()).ok())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn collects_all_tag_kinds() {
        let base = Url::parse("http://h/page").unwrap();
        let html = r#"
            <a href="/a">a</a>
            <link href="/style.css">
            <img src="/img.png">
            <script src="/app.js"></script>
        "#;
        let links = extract_links(&doc(html), html, &base);
        assert!(links.contains("http://h/a"));
        assert!(links.contains("http://h/style.css"));
        assert!(links.contains("http://h/img.png"));
        assert!(links.contains("http://h/app.js"));
    }

    #[test]
    fn regex_fallback_finds_bare_urls_in_text() {
        let base = Url::parse("http://h/page").unwrap();
        let html = "<p>see http://other.example/path for details</p>";
        let links = extract_links(&doc(html), html, &base);
        assert!(links.contains("http://other.example/path"));
    }

    #[test]
    fn relative_links_resolve_against_base() {
        let base = Url::parse("http://h/a/b").unwrap();
        let html = r#"<a href="../c">c</a>"#;
        let links = extract_links(&doc(html), html, &base);
        assert!(links.contains("http://h/c"));
    }
}
