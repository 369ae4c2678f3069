//! PDF and plain-text extraction using lopdf.

use async_trait::async_trait;

use crate::error::ExtractError;
use crate::source::upload::PDF_MAGIC;

use super::{normalize_whitespace, truncate_chars, ExtractedText, TextExtractor};

/// Extracts text from PDFs page by page; UTF-8 text documents pass through.
///
/// Parsing runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

/// `/Title` from the trailer's document information dictionary.
fn document_title(doc: &lopdf::Document) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?;
    let (_, info) = doc.dereference(info).ok()?;
    let title = info.as_dict().ok()?.get(b"Title").ok()?;
    let (_, title) = doc.dereference(title).ok()?;
    let title = lopdf::decode_text_string(title).ok()?;
    let title = normalize_whitespace(&title).replace('\n', " ");
    (!title.is_empty()).then_some(title)
}

fn extract_text_from_pdf(bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
    let _span = tracing::info_span!("extract.pdf", bytes = bytes.len()).entered();

    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| ExtractError::Parse(format!("failed to load PDF: {}", e)))?;

    let pages = doc.get_pages();
    let mut text = String::new();
    let mut skipped = 0usize;

    for (page_num, _) in pages.iter() {
        match doc.extract_text(&[*page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => {
                skipped += 1;
                tracing::warn!("Skipping page {}: {}", page_num, e);
            }
        }
    }

    if !pages.is_empty() && skipped == pages.len() {
        return Err(ExtractError::Parse(format!(
            "no extractable text on any of {} pages",
            pages.len()
        )));
    }

    let title = document_title(&doc);
    tracing::debug!(
        pages = pages.len(),
        skipped,
        titled = title.is_some(),
        "Extracted PDF text"
    );
    Ok(ExtractedText { text, title })
}

fn extract_plain_text(bytes: &[u8]) -> Result<String, ExtractError> {
    if bytes.contains(&0) {
        return Err(ExtractError::UnsupportedFormat("binary data".to_string()));
    }
    String::from_utf8(bytes.to_vec())
        .map_err(|_| ExtractError::UnsupportedFormat("non UTF-8 data".to_string()))
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(
        &self,
        bytes: &[u8],
        max_chars: usize,
    ) -> Result<ExtractedText, ExtractError> {
        let raw = if bytes.starts_with(PDF_MAGIC) {
            let owned = bytes.to_vec();
            tokio::task::spawn_blocking(move || extract_text_from_pdf(&owned))
                .await
                .map_err(|e| ExtractError::Parse(format!("PDF parser task failed: {}", e)))??
        } else {
            ExtractedText::untitled(extract_plain_text(bytes)?)
        };

        let normalized = normalize_whitespace(&raw.text);
        Ok(ExtractedText {
            text: truncate_chars(&normalized, max_chars).to_string(),
            title: raw.title,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    fn pdf_with_text(lines: &[&str]) -> Vec<u8> {
        pdf_with_info(lines, None)
    }

    fn pdf_with_info(lines: &[&str], title: Option<&str>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for line in lines {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("Td", vec![0.into(), (-14).into()]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        if let Some(title) = title {
            let info_id = doc.add_object(dictionary! {
                "Title" => lopdf::text_string(title),
                "Producer" => Object::string_literal("test"),
            });
            doc.trailer.set("Info", info_id);
        }

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn test_pdf_text_is_extracted() {
        let bytes = pdf_with_text(&["Hello World"]);
        let out = PdfTextExtractor::new().extract(&bytes, 1000).await.unwrap();
        assert!(out.text.contains("Hello World"), "got: {:?}", out.text);
        assert_eq!(out.title, None);
    }

    #[tokio::test]
    async fn test_pdf_info_title_is_returned() {
        let bytes = pdf_with_info(&["Hello World"], Some("  Bees   and Sleep "));
        let out = PdfTextExtractor::new().extract(&bytes, 1000).await.unwrap();
        assert_eq!(out.title.as_deref(), Some("Bees and Sleep"));
    }

    #[tokio::test]
    async fn test_pdf_info_title_decodes_utf16() {
        let bytes = pdf_with_info(&["Hello World"], Some("Schlaf und Gedächtnis"));
        let out = PdfTextExtractor::new().extract(&bytes, 1000).await.unwrap();
        assert_eq!(out.title.as_deref(), Some("Schlaf und Gedächtnis"));
    }

    #[tokio::test]
    async fn test_blank_pdf_title_is_ignored() {
        let bytes = pdf_with_info(&["Hello World"], Some("   "));
        let out = PdfTextExtractor::new().extract(&bytes, 1000).await.unwrap();
        assert_eq!(out.title, None);
    }

    #[tokio::test]
    async fn test_pdf_text_is_truncated() {
        let bytes = pdf_with_text(&["Hello World"]);
        let out = PdfTextExtractor::new().extract(&bytes, 5).await.unwrap();
        assert!(out.text.chars().count() <= 5);
    }

    #[tokio::test]
    async fn test_plain_text_passes_through() {
        let out = PdfTextExtractor::new()
            .extract(b"Hello   world\n\nsecond line", 1000)
            .await
            .unwrap();
        assert_eq!(out, ExtractedText::untitled("Hello world\nsecond line"));
    }

    #[tokio::test]
    async fn test_long_text_is_truncated_not_rejected() {
        let body = "x".repeat(5000);
        let out = PdfTextExtractor::new()
            .extract(body.as_bytes(), 100)
            .await
            .unwrap();
        assert_eq!(out.text.chars().count(), 100);
    }

    #[tokio::test]
    async fn test_binary_is_unsupported() {
        let err = PdfTextExtractor::new()
            .extract(&[0x89, b'P', b'N', b'G', 0, 0, 1], 100)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_parse_error() {
        let err = PdfTextExtractor::new()
            .extract(b"%PDF-1.7\nthis is not really a pdf", 100)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}
