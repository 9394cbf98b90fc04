use crate::errors::{AppError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read};
use std::path::Path;

pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// File types accepted for analysis. Each one is tied to a MIME type and the
/// extensions allowed with it; both must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Jpeg,
    Png,
    Pdf,
    Text,
    Docx,
}

const ALLOWED: &[(DocumentKind, &str, &[&str])] = &[
    (DocumentKind::Jpeg, "image/jpeg", &[".jpg", ".jpeg"]),
    (DocumentKind::Png, "image/png", &[".png"]),
    (DocumentKind::Pdf, "application/pdf", &[".pdf"]),
    (DocumentKind::Text, "text/plain", &[".txt"]),
    (DocumentKind::Docx, DOCX_MIME, &[".docx"]),
];

static XML_PARAGRAPH_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"</w:p>|<w:br\s*/>").expect("valid regex"));
static XML_TAB: Lazy<Regex> = Lazy::new(|| Regex::new(r"<w:tab\s*/>").expect("valid regex"));
static XML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n+").expect("valid regex"));

impl DocumentKind {
    /// Resolves the kind of an upload from its declared MIME type and file name.
    pub fn detect(file_name: &str, mime_type: &str) -> Result<Self> {
        let extension = extension_of(file_name);
        let mime_type = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        ALLOWED
            .iter()
            .find(|(_, mime, extensions)| *mime == mime_type && extensions.contains(&extension.as_str()))
            .map(|(kind, _, _)| *kind)
            .ok_or_else(|| {
                AppError::UploadError(format!(
                    "File type not allowed for '{}'. Allowed types: {}",
                    file_name,
                    allowed_extensions().join(", ")
                ))
            })
    }

    pub fn mime_type(&self) -> &'static str {
        ALLOWED
            .iter()
            .find(|(kind, _, _)| kind == self)
            .map(|(_, mime, _)| *mime)
            .unwrap_or("application/octet-stream")
    }
}

pub fn allowed_extensions() -> Vec<&'static str> {
    ALLOWED.iter().flat_map(|(_, _, exts)| exts.iter().copied()).collect()
}

/// Lower-cased extension including the dot, or an empty string.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Pulls readable text out of a document. Images carry no text, so they are
/// described by their dimensions instead.
pub fn extract_text(kind: DocumentKind, file_name: &str, bytes: &[u8]) -> Result<String> {
    match kind {
        DocumentKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
        DocumentKind::Pdf => extract_pdf(file_name, bytes),
        DocumentKind::Docx => extract_docx(file_name, bytes),
        DocumentKind::Jpeg | DocumentKind::Png => describe_image(file_name, bytes),
    }
}

fn extract_pdf(file_name: &str, bytes: &[u8]) -> Result<String> {
    // The PDF parser may panic on malformed input.
    let owned = bytes.to_vec();
    let result = std::panic::catch_unwind(move || pdf_extract::extract_text_from_mem(&owned));
    match result {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(AppError::UploadError(format!("Could not read PDF '{}': {:?}", file_name, e))),
        Err(_) => Err(AppError::UploadError(format!("Could not read PDF '{}'", file_name))),
    }
}

fn extract_docx(file_name: &str, bytes: &[u8]) -> Result<String> {
    let unreadable = |e: &dyn std::fmt::Display| {
        AppError::UploadError(format!("Could not read DOCX '{}': {}", file_name, e))
    };

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| unreadable(&e))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| unreadable(&e))?
        .read_to_string(&mut xml)
        .map_err(|e| unreadable(&e))?;

    Ok(docx_xml_to_text(&xml))
}

fn docx_xml_to_text(xml: &str) -> String {
    let text = XML_PARAGRAPH_END.replace_all(xml, "\n");
    let text = XML_TAB.replace_all(&text, "\t");
    let text = XML_TAG.replace_all(&text, "");
    let text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");
    BLANK_LINES.replace_all(text.trim(), "\n").into_owned()
}

fn describe_image(file_name: &str, bytes: &[u8]) -> Result<String> {
    let size = imagesize::blob_size(bytes)
        .map_err(|e| AppError::UploadError(format!("Could not read image '{}': {}", file_name, e)))?;
    Ok(format!(
        "[Image '{}': {}x{} pixels, no text extracted]",
        file_name, size.width, size.height
    ))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::{Cursor, Write};

    /// Smallest header `imagesize` needs to report PNG dimensions.
    pub fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes
    }

    pub fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn detection_requires_matching_mime_and_extension() {
        assert_eq!(DocumentKind::detect("scan.JPG", "image/jpeg").unwrap(), DocumentKind::Jpeg);
        assert_eq!(DocumentKind::detect("notes.txt", "text/plain; charset=utf-8").unwrap(), DocumentKind::Text);
        assert_eq!(DocumentKind::detect("cv.docx", DOCX_MIME).unwrap(), DocumentKind::Docx);

        assert!(DocumentKind::detect("evil.exe", "application/octet-stream").is_err());
        assert!(DocumentKind::detect("fake.pdf", "image/png").is_err());
        assert!(DocumentKind::detect("noext", "text/plain").is_err());
    }

    #[test]
    fn text_is_decoded_lossily() {
        let text = extract_text(DocumentKind::Text, "a.txt", b"rent 1200\xff").unwrap();
        assert!(text.starts_with("rent 1200"));
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let bytes = docx_with_paragraphs(&["Statement &amp; summary", "Balance: 1,234.56"]);
        let text = extract_text(DocumentKind::Docx, "s.docx", &bytes).unwrap();
        assert_eq!(text, "Statement & summary\nBalance: 1,234.56");
    }

    #[test]
    fn images_are_described_by_size() {
        let text = extract_text(DocumentKind::Png, "receipt.png", &png_header(640, 480)).unwrap();
        assert!(text.contains("640x480"));
    }

    #[test]
    fn broken_documents_are_upload_errors() {
        assert!(matches!(
            extract_text(DocumentKind::Docx, "x.docx", b"not a zip"),
            Err(AppError::UploadError(_))
        ));
        assert!(matches!(
            extract_text(DocumentKind::Pdf, "x.pdf", b"not a pdf"),
            Err(AppError::UploadError(_))
        ));
    }
}
