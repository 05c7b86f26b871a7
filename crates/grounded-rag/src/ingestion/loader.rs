//! Directory loader for text, markdown and PDF files

use std::any::Any;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::{Document, FileType};

/// Upper bound on extracting one PDF
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Reads a directory into documents
pub trait DocumentLoader: Send + Sync {
    /// Load every supported file under `dir`
    ///
    /// Unsupported files are skipped and unreadable files are logged; neither
    /// aborts the load.
    fn load(&self, dir: &Path) -> Vec<Document>;
}

/// Recursive filesystem loader
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryLoader;

impl DirectoryLoader {
    /// Create a loader
    pub fn new() -> Self {
        Self
    }

    /// Parse one file into documents
    pub fn load_file(&self, path: &Path, file_type: FileType) -> Result<Vec<Document>> {
        let data = std::fs::read(path)?;

        match file_type {
            FileType::Txt | FileType::Markdown => Ok(vec![Document::new(
                String::from_utf8_lossy(&data),
                path,
                file_type,
            )]),
            FileType::Pdf => Ok(Self::split_pages(&Self::extract_pdf(&data)?, path)),
        }
    }

    /// One document per form-feed separated page, or one for the whole text
    fn split_pages(text: &str, path: &Path) -> Vec<Document> {
        let pages: Vec<&str> = text.split('\u{c}').collect();
        if pages.len() < 2 {
            return vec![Document::new(text, path, FileType::Pdf)];
        }

        pages
            .into_iter()
            .enumerate()
            .filter(|(_, page)| !page.trim().is_empty())
            .map(|(i, page)| Document::new(page, path, FileType::Pdf).with_page(i as u32 + 1))
            .collect()
    }

    #[cfg(feature = "pdf")]
    fn extract_pdf(data: &[u8]) -> Result<String> {
        let text = extract_isolated(data, |bytes| {
            pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| Error::internal(format!("PDF extraction failed: {}", e)))
        })?;

        Ok(text.replace('\0', ""))
    }

    #[cfg(not(feature = "pdf"))]
    fn extract_pdf(_data: &[u8]) -> Result<String> {
        Err(Error::internal("PDF support is disabled (enable the `pdf` feature)"))
    }
}

/// Run an extractor on its own thread with a time limit
///
/// pdf-extract can panic or stall on malformed files; either outcome becomes
/// an error for that one file.
#[cfg_attr(not(feature = "pdf"), allow(dead_code))]
fn extract_isolated<F>(data: &[u8], extract: F) -> Result<String>
where
    F: FnOnce(&[u8]) -> Result<String> + Send + 'static,
{
    let data = data.to_vec();
    let (tx, rx) = mpsc::channel();

    let handle = thread::Builder::new()
        .name("pdf-extract".to_string())
        .spawn(move || {
            let _ = tx.send(extract(&data));
        })
        .map_err(|e| Error::internal(format!("failed to start PDF extraction: {}", e)))?;

    match rx.recv_timeout(EXTRACT_TIMEOUT) {
        Ok(result) => {
            let _ = handle.join();
            result
        }
        Err(RecvTimeoutError::Timeout) => {
            tracing::error!(
                "PDF extraction timed out after {}s",
                EXTRACT_TIMEOUT.as_secs()
            );
            Err(Error::internal(format!(
                "PDF extraction timed out after {}s",
                EXTRACT_TIMEOUT.as_secs()
            )))
        }
        Err(RecvTimeoutError::Disconnected) => {
            let reason = match handle.join() {
                Err(payload) => panic_message(payload.as_ref()),
                Ok(()) => "no result".to_string(),
            };
            Err(Error::internal(format!("PDF extraction crashed: {}", reason)))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl DocumentLoader for DirectoryLoader {
    fn load(&self, dir: &Path) -> Vec<Document> {
        let mut documents = Vec::new();

        if !dir.exists() {
            tracing::warn!(
                "Data directory {} does not exist. No documents loaded.",
                dir.display()
            );
            return documents;
        }

        // Sorted walk keeps chunk ids stable across identical rebuilds
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::error!("Failed to read directory entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(file_type) = FileType::from_path(path) else {
                tracing::debug!("Skipping unsupported file: {}", path.display());
                continue;
            };

            match self.load_file(path, file_type) {
                Ok(loaded) => {
                    tracing::info!(
                        "Loaded {} document(s) from {}",
                        loaded.len(),
                        entry.file_name().to_string_lossy()
                    );
                    documents.extend(loaded);
                }
                Err(e) => {
                    tracing::error!("Failed to load file {} due to error: {}", path.display(), e);
                }
            }
        }

        tracing::info!("Total documents loaded: {}", documents.len());
        documents
    }
}
