//! Document and chunk types with source tracking for citations

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::Txt),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Detect file type from a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Where a piece of text came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// File name used in citations
    pub source: String,
    /// Full origin path
    pub path: String,
    /// Detected file type
    pub file_type: FileType,
    /// 1-based page for paginated sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// A loaded document, immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Full text content
    pub content: String,
    /// Origin metadata
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a document from text and its origin path
    pub fn new(content: impl Into<String>, path: &Path, file_type: FileType) -> Self {
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        Self {
            content: content.into(),
            metadata: DocumentMetadata {
                source,
                path: path.to_string_lossy().to_string(),
                file_type,
                page: None,
            },
        }
    }

    /// Tag the document with a page number
    pub fn with_page(mut self, page: u32) -> Self {
        self.metadata.page = Some(page);
        self
    }
}

/// Metadata carried by every chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// File name inherited from the document
    pub source: String,
    /// Origin path inherited from the document
    pub path: String,
    /// File type inherited from the document
    pub file_type: FileType,
    /// Page inherited from the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Position in the ingestion run, starting at 0 and unique per index
    pub chunk_id: u64,
    /// Character offset of the chunk within its document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
}

impl ChunkMetadata {
    /// Derive chunk metadata from its document
    pub fn from_document(doc: &DocumentMetadata, chunk_id: u64, start_index: usize) -> Self {
        Self {
            source: doc.source.clone(),
            path: doc.path.clone(),
            file_type: doc.file_type,
            page: doc.page,
            chunk_id,
            start_index: Some(start_index),
        }
    }
}

/// A text chunk, the unit of retrieval and citation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk text
    pub content: String,
    /// Source and identity
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// The id citations refer to
    pub fn chunk_id(&self) -> u64 {
        self.metadata.chunk_id
    }

    /// The file name citations refer to
    pub fn source(&self) -> &str {
        &self.metadata.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_source_is_file_name() {
        let doc = Document::new("text", Path::new("/srv/docs/guide.md"), FileType::Markdown);
        assert_eq!(doc.metadata.source, "guide.md");
        assert_eq!(doc.metadata.path, "/srv/docs/guide.md");
        assert_eq!(doc.metadata.page, None);
    }

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_path(Path::new("a/B.PDF")), Some(FileType::Pdf));
        assert_eq!(FileType::from_path(Path::new("notes.markdown")), Some(FileType::Markdown));
        assert_eq!(FileType::from_path(Path::new("image.png")), None);
        assert_eq!(FileType::from_path(Path::new("README")), None);
    }
}
