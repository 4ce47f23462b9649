//! PDF text extraction over a scoped temporary file.

use lopdf::Document;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ExamPrepError, Result};

const UPLOAD_FILE_NAME: &str = "upload.pdf";

/// Text pulled out of one uploaded question paper
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExtractedDocument {
    /// Page texts in page order, each followed by a newline. Empty when no
    /// page carried extractable text.
    pub text: String,
    pub page_count: usize,
    pub pages_with_text: usize,
}

impl ExtractedDocument {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    temp_root: PathBuf,
}

impl DocumentExtractor {
    pub fn new(temp_root: PathBuf) -> Self {
        Self { temp_root }
    }

    /// Extract on the blocking pool. The temporary copy of the upload is gone
    /// when this returns, whatever the outcome.
    pub async fn extract(&self, pdf_bytes: Vec<u8>) -> Result<ExtractedDocument> {
        let extractor = self.clone();
        tokio::task::spawn_blocking(move || extractor.extract_blocking(&pdf_bytes))
            .await
            .map_err(|e| ExamPrepError::Internal(format!("PDF extraction task failed: {e}")))?
    }

    pub fn extract_blocking(&self, pdf_bytes: &[u8]) -> Result<ExtractedDocument> {
        fs::create_dir_all(&self.temp_root)?;
        // Removed on drop, including on error and unwind.
        let scratch = tempfile::Builder::new()
            .prefix("exam_prep_upload_")
            .tempdir_in(&self.temp_root)?;
        let path = scratch.path().join(UPLOAD_FILE_NAME);
        fs::write(&path, pdf_bytes)?;

        let extracted = extract_from_path(&path);
        if let Err(e) = scratch.close() {
            tracing::warn!("Failed to remove temporary upload directory: {}", e);
        }
        extracted
    }
}

fn extract_from_path(path: &Path) -> Result<ExtractedDocument> {
    let doc = Document::load(path).map_err(|e| ExamPrepError::MalformedDocument(e.to_string()))?;

    let pages = doc.get_pages();
    let mut text = String::new();
    let mut pages_with_text = 0;

    for page_number in pages.keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(page_text) if !page_text.trim().is_empty() => {
                text.push_str(page_text.trim_end_matches('\n'));
                text.push('\n');
                pages_with_text += 1;
            }
            Ok(_) => {
                tracing::debug!(page = page_number, "page has no extractable text");
            }
            Err(e) => {
                tracing::debug!(page = page_number, "skipping page: {}", e);
            }
        }
    }

    tracing::info!(
        pages = pages.len(),
        pages_with_text,
        chars = text.len(),
        "Extracted text from PDF"
    );

    Ok(ExtractedDocument {
        text,
        page_count: pages.len(),
        pages_with_text,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    /// Builds a PDF with one page per entry; `None` pages carry no text.
    pub(crate) fn build_pdf(pages: &[Option<&str>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for page in pages {
            let operations = match page {
                Some(line) => vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
                None => vec![
                    Operation::new("q", vec![]),
                    Operation::new("Q", vec![]),
                ],
            };
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("content encodes"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("pdf saves");
        bytes
    }

    fn is_empty_dir(path: &Path) -> bool {
        fs::read_dir(path).map(|mut it| it.next().is_none()).unwrap_or(true)
    }

    #[test]
    fn test_malformed_bytes_fail_and_leave_no_temp_files() {
        let root = tempfile::tempdir().expect("root");
        let extractor = DocumentExtractor::new(root.path().to_path_buf());

        for bytes in [b"definitely not a pdf".to_vec(), Vec::new()] {
            let err = extractor.extract_blocking(&bytes).expect_err("must fail");
            assert!(matches!(err, ExamPrepError::MalformedDocument(_)));
            assert!(is_empty_dir(root.path()));
        }
    }

    #[test]
    fn test_pages_without_text_yield_empty_string() {
        let root = tempfile::tempdir().expect("root");
        let extractor = DocumentExtractor::new(root.path().to_path_buf());

        let doc = extractor
            .extract_blocking(&build_pdf(&[None, None]))
            .expect("valid pdf");
        assert_eq!(doc.text, "");
        assert!(doc.is_empty());
        assert_eq!(doc.page_count, 2);
        assert_eq!(doc.pages_with_text, 0);
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_text_pages_are_joined_in_order_skipping_blank_ones() {
        let root = tempfile::tempdir().expect("root");
        let extractor = DocumentExtractor::new(root.path().to_path_buf());

        let pdf = build_pdf(&[Some("LCM of 12 15 20 is 60"), None, Some("Second question")]);
        let doc = extractor.extract(pdf).await.expect("valid pdf");

        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.pages_with_text, 2);
        let first = doc.text.find("60").expect("first page text");
        let second = doc.text.find("Second").expect("third page text");
        assert!(first < second);
        assert!(doc.text.ends_with('\n'));
        assert!(is_empty_dir(root.path()));
    }
}
