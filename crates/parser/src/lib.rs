pub mod links;
pub mod metadata;

use std::collections::HashSet;

use crawler_core::Metadata;
use url::Url;

/// The result of running the link extractor and metadata extractor over one
/// fetched page.
pub struct ParsedPage {
    pub links: HashSet<String>,
    pub metadata: Metadata,
}

/// Parse an HTML body fetched from `base_url`: collect candidate links and
/// extract metadata. `base_url` must already be normalized.
pub fn parse_page(body: &str, base_url: &Url) -> ParsedPage {
    let document = scraper::Html::parse_document(body);

    let links = links::extract_links(&document, body, base_url);
    let mut metadata = metadata::extract_metadata(&document);
    metadata.raw = serde_json::json!({
        "title": metadata.title,
        "author": metadata.author,
        "description": metadata.description,
        "keywords": metadata.keywords,
        "publish_time": metadata.publish_time,
    })
    .to_string();

    ParsedPage { links, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_page_collects_links_and_metadata() {
        let base = Url::parse("http://h/page").unwrap();
        let html = r#"<html><head>
            <title>Hello</title>
            <meta name="description" content="a page">
        </head><body><a href="/other">other</a></body></html>"#;
        let parsed = parse_page(html, &base);
        assert!(parsed.links.contains("http://h/other"));
        assert_eq!(parsed.metadata.title.as_deref(), Some("Hello"));
        assert!(parsed.metadata.raw.contains("\"description\""));
    }
}
