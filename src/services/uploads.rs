use crate::config::UploadConfig;
use crate::errors::{AppError, Result};
use crate::services::documents::{extension_of, DocumentKind};
use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

const MAX_BASE_NAME_CHARS: usize = 200;

static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]+").expect("valid regex"));

/// A file received from a multipart request, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoredFile {
    /// Name the client uploaded the file under.
    pub name: String,
    /// `image` or `document`.
    #[serde(rename = "type")]
    pub file_type: String,
    pub url: String,
    pub size: usize,
    pub mimetype: String,
    #[serde(skip)]
    pub kind: DocumentKind,
    #[serde(skip)]
    pub path: PathBuf,
}

pub struct UploadStore {
    dir: PathBuf,
    max_files: usize,
    max_file_bytes: usize,
}

impl UploadStore {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            max_files: config.max_files,
            max_file_bytes: config.max_file_bytes,
        }
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    pub fn max_file_bytes(&self) -> usize {
        self.max_file_bytes
    }

    /// Checks a whole batch before anything touches the disk.
    pub fn validate(&self, files: &[IncomingFile]) -> Result<Vec<DocumentKind>> {
        if files.is_empty() {
            return Err(AppError::UploadError("No files uploaded".to_string()));
        }
        if files.len() > self.max_files {
            return Err(AppError::UploadError(format!(
                "Too many files. At most {} files per upload",
                self.max_files
            )));
        }

        files
            .iter()
            .map(|file| {
                if file.bytes.is_empty() {
                    return Err(AppError::UploadError(format!("File '{}' is empty", file.file_name)));
                }
                if file.bytes.len() > self.max_file_bytes {
                    return Err(AppError::UploadError(format!(
                        "File '{}' exceeds the {} MB limit",
                        file.file_name,
                        self.max_file_bytes / (1024 * 1024)
                    )));
                }
                DocumentKind::detect(&file.file_name, &file.content_type)
            })
            .collect()
    }

    /// Validates and writes every file. If any write fails, the files already
    /// written for this batch are removed before the error is returned.
    pub async fn save_all(&self, files: &[IncomingFile]) -> Result<Vec<StoredFile>> {
        let kinds = self.validate(files)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut stored = Vec::with_capacity(files.len());
        for (file, kind) in files.iter().zip(kinds) {
            match self.write(file, kind).await {
                Ok(saved) => stored.push(saved),
                Err(e) => {
                    cleanup(&stored).await;
                    return Err(e);
                }
            }
        }

        tracing::info!(action = "upload_stored", files = stored.len());
        Ok(stored)
    }

    async fn write(&self, file: &IncomingFile, kind: DocumentKind) -> Result<StoredFile> {
        let stored_name = stored_file_name(&file.file_name);
        let path = self.dir.join(&stored_name);
        tokio::fs::write(&path, &file.bytes).await?;

        Ok(StoredFile {
            name: file.file_name.clone(),
            file_type: file_type(kind).to_string(),
            url: format!("/uploads/{}", stored_name),
            size: file.bytes.len(),
            mimetype: kind.mime_type().to_string(),
            kind,
            path,
        })
    }
}

/// Best-effort removal of files written for a failed request.
pub async fn cleanup(files: &[StoredFile]) {
    for file in files {
        if let Err(e) = tokio::fs::remove_file(&file.path).await {
            tracing::warn!(
                action = "upload_cleanup_failed",
                path = %file.path.display(),
                error = %e
            );
        }
    }
}

fn file_type(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Jpeg | DocumentKind::Png => "image",
        _ => "document",
    }
}

/// `<base>-<millis>-<random><ext>`, where base is the original stem with every
/// run of non-alphanumerics replaced by a dash.
pub fn stored_file_name(original: &str) -> String {
    let extension = extension_of(original);
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let mut base: String = NON_ALPHANUMERIC
        .replace_all(stem, "-")
        .trim_matches('-')
        .chars()
        .take(MAX_BASE_NAME_CHARS)
        .collect();
    if base.is_empty() {
        base = "file".to_string();
    }

    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{}-{}-{}{}", base, Utc::now().timestamp_millis(), suffix, extension)
}
