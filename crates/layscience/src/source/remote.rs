//! Fetches papers over HTTP: DOIs via a resolver, URLs directly, and
//! uploads from the local [`UploadStore`].

use std::sync::LazyLock;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode, Url};
use scraper::{Html, Selector};
use tracing::Instrument;

use crate::error::ResolveError;
use crate::http::parse_retry_after;
use crate::job::{DocumentMetadata, JobInput, SourceKind};
use crate::sanitize::redact_url;

use super::upload::{UploadStore, PDF_MAGIC};
use super::{DocumentSource, ResolvedDocument, PDF_MIME, TEXT_MIME};

/// Default DOI resolver.
pub const DEFAULT_DOI_RESOLVER: &str = "https://doi.org";

/// Upper bound on PDF links tried from a single landing page.
const MAX_PDF_CANDIDATES: usize = 8;

/// Paragraphs kept when falling back to page text.
const MAX_FALLBACK_PARAGRAPHS: usize = 15;

static SEL_PDF_HINTS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        r#"meta[name="citation_pdf_url"], meta[name="dc.identifier.fulltext"], link[type="application/pdf"]"#,
    )
    .unwrap()
});
static SEL_ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static SEL_CITATION_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="citation_title"]"#).unwrap());
static SEL_TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static SEL_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[name="description"], meta[property="og:description"]"#).unwrap()
});
static SEL_PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());

// ─── Landing pages ──────────────────────────────────────────────────────────

/// What a publisher landing page offers.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LandingPage {
    pub pdf_candidates: Vec<Url>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub paragraphs: Vec<String>,
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Scans an HTML page for PDF links (citation meta tags first, then
/// anchors), a title, a description and readable paragraphs.
pub fn parse_landing_page(html: &str, base: &Url) -> LandingPage {
    let doc = Html::parse_document(html);

    let hinted = doc
        .select(&SEL_PDF_HINTS)
        .filter_map(|el| el.value().attr("content").or_else(|| el.value().attr("href")));
    let anchors = doc
        .select(&SEL_ANCHOR)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| href.to_ascii_lowercase().contains("pdf"));

    let mut pdf_candidates: Vec<Url> = Vec::new();
    for href in hinted.chain(anchors) {
        let href = href.trim();
        let lower = href.to_ascii_lowercase();
        if href.is_empty()
            || ["javascript:", "mailto:", "tel:", "data:"]
                .iter()
                .any(|scheme| lower.starts_with(scheme))
        {
            continue;
        }
        let Ok(url) = base.join(href) else {
            continue;
        };
        if matches!(url.scheme(), "http" | "https") && !pdf_candidates.contains(&url) {
            pdf_candidates.push(url);
        }
        if pdf_candidates.len() >= MAX_PDF_CANDIDATES {
            break;
        }
    }

    let title = doc
        .select(&SEL_CITATION_TITLE)
        .find_map(|el| el.value().attr("content").map(collapse_whitespace))
        .and_then(non_empty)
        .or_else(|| {
            doc.select(&SEL_TITLE)
                .next()
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .and_then(non_empty)
        });

    let description = doc
        .select(&SEL_DESCRIPTION)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .find(|d| !d.is_empty());

    let paragraphs = doc
        .select(&SEL_PARAGRAPH)
        .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
        .filter(|p| !p.is_empty())
        .take(MAX_FALLBACK_PARAGRAPHS)
        .collect();

    LandingPage {
        pdf_candidates,
        title,
        description,
        paragraphs,
    }
}

// ─── HttpDocumentSource ─────────────────────────────────────────────────────

fn network_error(e: reqwest::Error) -> ResolveError {
    let transient = !e.is_builder();
    let message = if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.without_url().to_string()
    };
    ResolveError::Fetch {
        message,
        status: None,
        transient,
        retry_after: None,
    }
}

fn content_type_of(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase())
        .unwrap_or_else(|| {
            mime_guess::from_path(response.url().path())
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        })
}

fn looks_like_pdf(content_type: &str, url: &Url, body: &[u8]) -> bool {
    content_type.contains("pdf")
        || url.path().to_ascii_lowercase().ends_with(".pdf")
        || body.starts_with(PDF_MAGIC)
}

/// [`DocumentSource`] backed by `reqwest`.
#[derive(Clone)]
pub struct HttpDocumentSource {
    client: Client,
    uploads: UploadStore,
    doi_resolver: String,
}

impl HttpDocumentSource {
    pub fn new(client: Client, uploads: UploadStore) -> Self {
        Self {
            client,
            uploads,
            doi_resolver: DEFAULT_DOI_RESOLVER.to_string(),
        }
    }

    /// Overrides the DOI resolver base URL.
    pub fn with_doi_resolver(mut self, base: impl Into<String>) -> Self {
        self.doi_resolver = base.into();
        self
    }

    fn doi_url(&self, doi: &str) -> String {
        format!("{}/{}", self.doi_resolver.trim_end_matches('/'), doi)
    }

    /// Streams a response body, giving up once it exceeds the upload limit.
    async fn read_body(&self, response: Response) -> Result<Vec<u8>, ResolveError> {
        let max = self.uploads.max_bytes();
        let url = redact_url(response.url().as_str());
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(network_error)?;
            if body.len() + chunk.len() > max {
                return Err(ResolveError::UnsupportedFormat(format!(
                    "document at {} exceeds {} bytes",
                    url, max
                )));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    async fn get(&self, url: &str) -> Result<Response, ResolveError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(ResolveError::NotFound(redact_url(url)));
        }
        if !status.is_success() {
            return Err(ResolveError::Fetch {
                message: format!("HTTP {} from {}", status.as_u16(), redact_url(url)),
                status: Some(status.as_u16()),
                transient: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
                retry_after: parse_retry_after(response.headers()),
            });
        }
        Ok(response)
    }

    /// Fetches a candidate link, returning its bytes only if it is a PDF.
    async fn try_pdf(&self, url: &Url) -> Option<Vec<u8>> {
        let response = match self.get(url.as_str()).await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(url = %redact_url(url.as_str()), "PDF candidate failed: {}", e);
                return None;
            }
        };
        let content_type = content_type_of(&response);
        match self.read_body(response).await {
            Ok(body) if content_type.contains("pdf") || body.starts_with(PDF_MAGIC) => Some(body),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(url = %redact_url(url.as_str()), "PDF candidate body failed: {}", e);
                None
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<ResolvedDocument, ResolveError> {
        let response = self.get(url).await?;
        let final_url = response.url().clone();
        let content_type = content_type_of(&response);
        let body = self.read_body(response).await?;

        if looks_like_pdf(&content_type, &final_url, &body) {
            tracing::info!(content_type = %content_type, "Fetched PDF directly");
            let mut metadata = DocumentMetadata::new(SourceKind::FetchedPdf);
            metadata.resolved_url = Some(final_url.to_string());
            return Ok(ResolvedDocument {
                bytes: body,
                content_type: PDF_MIME.to_string(),
                metadata,
            });
        }

        let html = String::from_utf8_lossy(&body);
        let page = parse_landing_page(&html, &final_url);
        tracing::debug!(
            candidates = page.pdf_candidates.len(),
            "Parsed landing page {}",
            redact_url(final_url.as_str())
        );

        for candidate in &page.pdf_candidates {
            if let Some(bytes) = self.try_pdf(candidate).await {
                tracing::info!(url = %redact_url(candidate.as_str()), "Resolved PDF from landing page");
                let mut metadata = DocumentMetadata::new(SourceKind::ResolvedPdf);
                metadata.title = page.title.clone();
                metadata.resolved_url = Some(candidate.to_string());
                return Ok(ResolvedDocument {
                    bytes,
                    content_type: PDF_MIME.to_string(),
                    metadata,
                });
            }
        }

        let (source, text) = if let Some(description) = page.description {
            (SourceKind::HtmlMeta, description)
        } else if !page.paragraphs.is_empty() {
            (SourceKind::HtmlText, page.paragraphs.join("\n\n"))
        } else {
            return Err(ResolveError::UnsupportedFormat(format!(
                "no PDF or readable text at {}",
                redact_url(final_url.as_str())
            )));
        };

        tracing::info!(source = ?source, "Falling back to landing page text");
        let mut metadata = DocumentMetadata::new(source);
        metadata.title = page.title;
        metadata.resolved_url = Some(final_url.to_string());
        Ok(ResolvedDocument {
            bytes: text.into_bytes(),
            content_type: TEXT_MIME.to_string(),
            metadata,
        })
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn resolve(&self, input: &JobInput) -> Result<ResolvedDocument, ResolveError> {
        match input {
            JobInput::Upload(id) => {
                let bytes = self.uploads.load(id).await?;
                Ok(ResolvedDocument {
                    bytes,
                    content_type: PDF_MIME.to_string(),
                    metadata: DocumentMetadata::new(SourceKind::Upload),
                })
            }
            JobInput::Doi(doi) => {
                let url = self.doi_url(doi);
                let span = tracing::info_span!("source.doi", doi = %doi);
                let mut doc = self.fetch(&url).instrument(span).await?;
                doc.metadata.doi = Some(doi.clone());
                Ok(doc)
            }
            JobInput::Url(url) => {
                let span = tracing::info_span!("source.url", url = %redact_url(url));
                self.fetch(url).instrument(span).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://publisher.example/article/123").unwrap()
    }

    #[test]
    fn test_citation_pdf_url_comes_first() {
        let html = r#"
            <html><head>
              <meta name="citation_title" content="  Deep   Sea Worms ">
              <meta name="citation_pdf_url" content="/content/123.full.pdf">
            </head><body>
              <a href="supplement.pdf">Supplement</a>
              <a href="mailto:editor@example.com?subject=pdf">Mail</a>
              <a href="/about">About</a>
            </body></html>"#;

        let page = parse_landing_page(html, &base());
        let urls: Vec<_> = page.pdf_candidates.iter().map(Url::as_str).collect();
        assert_eq!(
            urls,
            vec![
                "https://publisher.example/content/123.full.pdf",
                "https://publisher.example/article/supplement.pdf",
            ]
        );
        assert_eq!(page.title.as_deref(), Some("Deep Sea Worms"));
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let html = r#"<a href="/a.pdf">1</a><a href="/a.pdf">2</a><a href="https://publisher.example/a.pdf">3</a>"#;
        let page = parse_landing_page(html, &base());
        assert_eq!(page.pdf_candidates.len(), 1);
    }

    #[test]
    fn test_description_and_title_fallbacks() {
        let html = r#"
            <html><head><title>Paper page</title>
              <meta property="og:description" content="We study worms.">
            </head><body><p>First para.</p><p>   </p><p>Second
            para.</p></body></html>"#;

        let page = parse_landing_page(html, &base());
        assert!(page.pdf_candidates.is_empty());
        assert_eq!(page.title.as_deref(), Some("Paper page"));
        assert_eq!(page.description.as_deref(), Some("We study worms."));
        assert_eq!(page.paragraphs, vec!["First para.", "Second para."]);
    }

    #[test]
    fn test_candidate_limit() {
        let html: String = (0..20)
            .map(|i| format!(r#"<a href="/f{}.pdf">f</a>"#, i))
            .collect();
        let page = parse_landing_page(&html, &base());
        assert_eq!(page.pdf_candidates.len(), MAX_PDF_CANDIDATES);
    }

    #[test]
    fn test_looks_like_pdf() {
        let url = Url::parse("https://x.example/paper").unwrap();
        assert!(looks_like_pdf("application/pdf", &url, b""));
        assert!(looks_like_pdf("application/octet-stream", &url, b"%PDF-1.4"));
        assert!(!looks_like_pdf("text/html", &url, b"<html>"));

        let url = Url::parse("https://x.example/paper.PDF").unwrap();
        assert!(looks_like_pdf("text/html", &url, b""));
    }

    #[test]
    fn test_doi_url() {
        let source = HttpDocumentSource::new(
            Client::new(),
            UploadStore::new("/tmp/unused", 1024),
        )
        .with_doi_resolver("http://127.0.0.1:9/");
        assert_eq!(
            source.doi_url("10.1000/xyz(1)"),
            "http://127.0.0.1:9/10.1000/xyz(1)"
        );
    }
}
