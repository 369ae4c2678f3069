//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Logs and traces must not carry credentials embedded in URLs or signed
//! query strings from publisher download links.

use reqwest::Url;

/// Reduces a URL to `scheme://host[:port]/path`, masking any userinfo and
/// dropping query and fragment.
///
/// - `https://user:pw@host/a.pdf?token=x` → `https://****@host/a.pdf`
/// - `https://host/a.pdf` → `https://host/a.pdf`
/// - unparsable input → `<invalid url>`
pub fn redact_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "<invalid url>".to_string();
    };

    let host = match (parsed.host_str(), parsed.port()) {
        (Some(h), Some(p)) => format!("{}:{}", h, p),
        (Some(h), None) => h.to_string(),
        (None, _) => String::new(),
    };
    let userinfo = if parsed.username().is_empty() && parsed.password().is_none() {
        ""
    } else {
        "****@"
    };

    format!("{}://{}{}{}", parsed.scheme(), userinfo, host, parsed.path())
}
