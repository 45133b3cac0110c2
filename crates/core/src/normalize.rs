use url::Url;

/// Normalize a URL for admission/seen-set comparisons.
///
/// Strips the fragment, collapses the path so the root is `/` and non-root
/// paths carry no trailing slash, and preserves the query string verbatim.
/// Host case is left intact — the seen-set is scheme+host+path+query
/// sensitive.
pub fn normalize_url(raw: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(raw.trim())?;
    url.set_fragment(None);

    let path = url.path().to_string();
    let collapsed = if path.is_empty() || path == "/" {
        "/".to_string()
    } else if path.len() > 1 && path.ends_with('/') {
        path.trim_end_matches('/').to_string()
    } else {
        path
    };
    url.set_path(&collapsed);

    let host = url.host_str().unwrap_or("").to_string();
    let scheme = url.scheme().to_string();
    let query = url.query().map(|q| format!("?{q}")).unwrap_or_default();

    Ok(format!("{scheme}://{host}{}{query}", url.path()))
}

/// Strip a leading `www.` from a host for same-domain comparisons.
fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// True if `candidate` and `seed` share a host modulo a leading `www.` on
/// either side — stripped from both, not just one.
pub fn same_domain(candidate: &str, seed: &str) -> bool {
    let (Ok(c), Ok(s)) = (Url::parse(candidate), Url::parse(seed)) else {
        return false;
    };
    let c_host = c.host_str().unwrap_or("");
    let s_host = s.host_str().unwrap_or("");
    strip_www(c_host).eq_ignore_ascii_case(strip_www(s_host))
}

/// Extract `scheme://host` from a URL, for robots.txt cache keys.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}
