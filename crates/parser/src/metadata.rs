use scraper::{Html, Selector};

use crawler_core::Metadata;

fn selector(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

fn meta_content(document: &Html, sel: &str) -> Option<String> {
    selector(sel)
        .and_then(|s| document.select(&s).next())
        .and_then(|el| el.value().attr("content").map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
}

/// Truncate to at most `max` chars without splitting a multi-byte codepoint.
fn truncate(s: String, max: usize) -> String {
    if s.chars().count() <= max {
        s
    } else {
        s.chars().take(max).collect()
    }
}

/// Extract page metadata, preferring the most specific source for each
/// field and truncating to a fixed length cap.
pub fn extract_metadata(document: &Html) -> Metadata {
    let title = selector("title")
        .and_then(|s| document.select(&s).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| meta_content(document, r#"meta[property="og:title"]"#))
        .map(|t| truncate(t, 500));

    let author = meta_content(document, r#"meta[name="author"]"#)
        .or_else(|| meta_content(document, r#"meta[property="article:author"]"#))
        .or_else(|| {
            selector(r#"a[rel="author"]"#)
                .and_then(|s| document.select(&s).next())
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .map(|a| truncate(a, 200));

    let description = meta_content(document, r#"meta[name="description"]"#)
        .or_else(|| meta_content(document, r#"meta[property="og:description"]"#))
        .map(|d| truncate(d, 1000));

    let keywords =
        meta_content(document, r#"meta[name="keywords"]"#).map(|k| truncate(k, 500));

    let publish_time = meta_content(document, r#"meta[property="article:published_time"]"#)
        .or_else(|| {
            selector("time").and_then(|s| document.select(&s).next()).map(|el| {
                el.value()
                    .attr("datetime")
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| el.text().collect::<String>().trim().to_string())
            })
        })
        .or_else(|| meta_content(document, r#"meta[itemprop="datePublished"]"#))
        .filter(|s| !s.is_empty())
        .map(|p| truncate(p, 50));

    Metadata {
        title,
        author,
        description,
        keywords,
        publish_time,
        raw: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn title_tag_takes_precedence_over_og_title() {
        let html = r#"<html><head>
            <title>Plain Title</title>
            <meta property="og:title" content="OG Title">
        </head></html>"#;
        let m = extract_metadata(&doc(html));
        assert_eq!(m.title.as_deref(), Some("Plain Title"));
    }

    #[test]
    fn falls_back_to_og_title_when_no_title_tag() {
        let html = r#"<html><head><meta property="og:title" content="OG Title"></head></html>"#;
        let m = extract_metadata(&doc(html));
        assert_eq!(m.title.as_deref(), Some("OG Title"));
    }

    #[test]
    fn author_falls_back_through_chain() {
        let html = r#"<html><body><a rel="author">Jane Doe</a></body></html>"#;
        let m = extract_metadata(&doc(html));
        assert_eq!(m.author.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn publish_time_prefers_datetime_attribute() {
        let html = r#"<html><body><time datetime="2024-01-02">Jan 2</time></body></html>"#;
        let m = extract_metadata(&doc(html));
        assert_eq!(m.publish_time.as_deref(), Some("2024-01-02"));
    }

    #[test]
    fn description_is_truncated_to_1000_chars() {
        let long = "x".repeat(1200);
        let html = format!(r#"<meta name="description" content="{long}">"#);
        let m = extract_metadata(&doc(&html));
        assert_eq!(m.description.unwrap().chars().count(), 1000);
    }
}
