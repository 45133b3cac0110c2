//! HTTP fetcher.
//!
//! Follows redirects, streams `text/html` bodies up to a configured cap, and
//! reports only a byte count (from `Content-Length`) for everything else.

use std::time::Instant;

use crawler_core::normalize::normalize_url;
use crawler_core::{CrawlError, FetchConfig, FetchError, FetchSuccess};
use reqwest::Client;

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| CrawlError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch `url`. The returned `final_url` is already normalized —
    /// redirect targets run through the same normalization as
    /// regularly-admitted URLs.
    pub async fn fetch(&self, url: &str) -> Result<FetchSuccess, FetchError> {
        let start = Instant::now();

        let response = self.client.get(url).send().await.map_err(classify_send_error)?;

        let status_code = response.status().as_u16();
        let final_url = response.url().as_str().to_string();
        let final_url = normalize_url(&final_url).unwrap_or(final_url);

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        let is_html = content_type
            .as_deref()
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);

        if is_html {
            let max = self.config.max_body_bytes;
            let mut buf: Vec<u8> = Vec::new();
            let mut stream = response;
            while let Some(chunk) = stream.chunk().await.map_err(classify_send_error)? {
                buf.extend_from_slice(&chunk);
                if buf.len() as u64 >= max {
                    buf.truncate(max as usize);
                    break;
                }
            }
            let byte_count = buf.len() as u64;
            let body = String::from_utf8_lossy(&buf).into_owned();
            Ok(FetchSuccess {
                final_url,
                status_code,
                content_type,
                body: Some(body),
                byte_count,
                elapsed: start.elapsed(),
            })
        } else {
            let byte_count = response
                .headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            Ok(FetchSuccess {
                final_url,
                status_code,
                content_type,
                body: None,
                byte_count,
                elapsed: start.elapsed(),
            })
        }
    }
}

/// Map a `reqwest::Error` to the fixed failure taxonomy in `FetchError`.
fn classify_send_error(err: reqwest::Error) -> FetchError {
    use std::error::Error as _;

    let text = format!("{err}").to_lowercase();
    let source_text = err
        .source()
        .map(|s| format!("{s}").to_lowercase())
        .unwrap_or_default();
    let combined = format!("{text} {source_text}");

    if combined.contains("ssl") || combined.contains("certificate") || combined.contains("tls") {
        FetchError::Ssl(err.to_string())
    } else if err.is_timeout() {
        FetchError::Timeout(err.to_string())
    } else if err.is_connect() || combined.contains("connection") {
        FetchError::Connection(err.to_string())
    } else {
        FetchError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_html_and_normalizes_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html><body>hi</body></html>"),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        let url = format!("{}/page/", server.uri());
        let result = fetcher.fetch(&url).await.unwrap();

        assert_eq!(result.status_code, 200);
        assert!(result.body.unwrap().contains("hi"));
        assert!(result.final_url.ends_with("/page"));
    }

    #[tokio::test]
    async fn non_html_reports_content_length_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .insert_header("content-length", "42")
                    .set_body_bytes(vec![0u8; 42]),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        let url = format!("{}/file.bin", server.uri());
        let result = fetcher.fetch(&url).await.unwrap();

        assert!(result.body.is_none());
        assert_eq!(result.byte_count, 42);
    }

    #[tokio::test]
    async fn html_body_is_capped_at_configured_size() {
        let server = MockServer::start().await;
        let big = "a".repeat(5000);
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(big),
            )
            .mount(&server)
            .await;

        let mut config = FetchConfig::default();
        config.max_body_bytes = 1000;
        let fetcher = Fetcher::new(config).unwrap();
        let url = format!("{}/big", server.uri());
        let result = fetcher.fetch(&url).await.unwrap();

        assert_eq!(result.byte_count, 1000);
    }
}
