//! Document sources: turn a [`JobInput`] into document bytes.

use async_trait::async_trait;

use crate::error::ResolveError;
use crate::job::{DocumentMetadata, JobInput};

pub mod remote;
pub mod upload;

pub use remote::HttpDocumentSource;
pub use upload::UploadStore;

/// MIME type of PDF documents.
pub const PDF_MIME: &str = "application/pdf";

/// MIME type used for text recovered from landing pages.
pub const TEXT_MIME: &str = "text/plain";

/// A fetched document ready for text extraction.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub metadata: DocumentMetadata,
}

impl ResolvedDocument {
    pub fn is_pdf(&self) -> bool {
        self.content_type.contains("pdf") || self.bytes.starts_with(upload::PDF_MAGIC)
    }
}

/// Resolves a paper reference to its bytes and best-effort metadata.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn resolve(&self, input: &JobInput) -> Result<ResolvedDocument, ResolveError>;
}
