//! PDF inspection and preview generation.

use crate::error::{AppError, Result};
use lopdf::{Document, Object};

/// Magic bytes every PDF starts with.
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// Document facts read from an uploaded PDF.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfInfo {
    pub page_count: u32,
    /// `Subject` entry of the info dictionary.
    pub subject: Option<String>,
}

/// Check the PDF header without parsing the document.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

fn load(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| AppError::Processing(e.to_string()))
}

/// Extract text content from a PDF info dictionary value.
fn extract_text(obj: &Object) -> Option<String> {
    let text = match obj {
        Object::String(bytes, _) => {
            // UTF-16BE with BOM
            if bytes.starts_with(&[0xFE, 0xFF]) {
                let utf16: Vec<u16> = bytes[2..]
                    .chunks(2)
                    .map(|chunk| u16::from_be_bytes([chunk[0], chunk.get(1).copied().unwrap_or(0)]))
                    .collect();
                String::from_utf16(&utf16).ok()?
            } else {
                // UTF-8, falling back to Latin-1
                String::from_utf8(bytes.clone())
                    .unwrap_or_else(|_| bytes.iter().map(|&b| b as char).collect())
            }
        }
        Object::Name(name) => String::from_utf8(name.clone()).ok()?,
        _ => return None,
    };

    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn read_info(doc: &Document) -> PdfInfo {
    let mut info = PdfInfo {
        page_count: doc.get_pages().len() as u32,
        ..Default::default()
    };

    if let Ok(info_ref) = doc.trailer.get(b"Info").and_then(Object::as_reference)
        && let Ok(dict) = doc.get_dictionary(info_ref)
    {
        info.subject = dict.get(b"Subject").ok().and_then(extract_text);
    }

    info
}

/// Read page count and info dictionary fields.
#[cfg(test)]
pub(crate) fn inspect(bytes: &[u8]) -> Result<PdfInfo> {
    load(bytes).map(|doc| read_info(&doc))
}

/// Build a document holding the first `max_pages` pages of `bytes`.
///
/// Returns the preview and the facts of the source document.
pub fn generate_preview(bytes: &[u8], max_pages: u32) -> Result<(Vec<u8>, PdfInfo)> {
    let mut doc = load(bytes)?;
    let info = read_info(&doc);

    let total = info.page_count;
    if total == 0 {
        return Err(AppError::Processing("PDF has no pages".to_string()));
    }

    let keep = total.min(max_pages.max(1));
    if keep < total {
        let dropped: Vec<u32> = ((keep + 1)..=total).collect();
        doc.delete_pages(&dropped);
        doc.prune_objects();
    }

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| AppError::Processing(e.to_string()))?;

    tracing::debug!(total, kept = keep, size = out.len(), "Generated preview");
    Ok((out, info))
}

/// Build an in-memory PDF with `pages` blank pages.
#[cfg(test)]
pub(crate) fn sample_pdf(pages: u32, subject: Option<&str>) -> Vec<u8> {
    use lopdf::{Stream, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            page_id.into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(subject) = subject {
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Sample"),
            "Subject" => Object::string_literal(subject),
        });
        doc.trailer.set("Info", info_id);
    }

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_to_limit() {
        let source = sample_pdf(6, None);
        let (preview, info) = generate_preview(&source, 5).unwrap();

        assert_eq!(info.page_count, 6);
        assert_eq!(inspect(&preview).unwrap().page_count, 5);
    }

    #[test]
    fn test_preview_of_short_document_keeps_all_pages() {
        let source = sample_pdf(3, None);
        let (preview, info) = generate_preview(&source, 5).unwrap();

        assert_eq!(info.page_count, 3);
        assert_eq!(inspect(&preview).unwrap().page_count, 3);
    }

    #[test]
    fn test_preview_reports_subject() {
        let (_, info) = generate_preview(&sample_pdf(2, Some("Lecture notes")), 5).unwrap();
        assert_eq!(info.page_count, 2);
        assert_eq!(info.subject.as_deref(), Some("Lecture notes"));

        let (_, info) = generate_preview(&sample_pdf(2, None), 5).unwrap();
        assert_eq!(info.subject, None);
    }

    #[test]
    fn test_garbage_is_a_processing_error() {
        let bytes = b"%PDF-1.5 this is not really a pdf";
        assert!(looks_like_pdf(bytes));
        assert!(matches!(
            generate_preview(bytes, 5),
            Err(AppError::Processing(_))
        ));
    }

    #[test]
    fn test_extract_text_utf16() {
        let obj = Object::String(
            vec![0xFE, 0xFF, 0x00, b'H', 0x00, b'i'],
            lopdf::StringFormat::Literal,
        );
        assert_eq!(extract_text(&obj).as_deref(), Some("Hi"));
        assert_eq!(extract_text(&Object::Integer(3)), None);
    }
}
