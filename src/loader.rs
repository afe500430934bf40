//! Document sources and ingestion.
//!
//! A [`DocumentSource`] yields raw text plus an origin identifier. The loader
//! turns a set of sources into [`Document`]s, isolating per-source failures:
//! a source that cannot be read is logged and skipped so the rest of the
//! corpus still ingests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error raised by a single document source.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SourceError {
    /// The underlying bytes could not be read.
    #[error("failed to read source '{origin}': {message}")]
    Read { origin: String, message: String },

    /// The bytes were read but no text could be extracted.
    #[error("source '{origin}' contained no extractable text")]
    Empty { origin: String },
}

/// One extracted text unit of a document, a page or a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    /// Zero-based position within the document.
    pub index: usize,
    /// Optional human label (page number, heading).
    pub label: Option<String>,
    /// The extracted text.
    pub text: String,
}

/// A loaded document: origin identifier, ordered text units, metadata.
///
/// Documents are immutable once loaded. Re-ingesting the same origin produces
/// a new `Document`; the old one is superseded, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Filename or URI the text came from.
    pub origin: String,
    /// Pages or sections, in document order.
    pub units: Vec<TextUnit>,
    /// Source-specific metadata; always carries `doc_type` and `ingested_at`.
    pub metadata: serde_json::Value,
}

impl Document {
    /// Build a document from pre-extracted text units.
    pub fn new(origin: impl Into<String>, doc_type: &str, units: Vec<TextUnit>) -> Self {
        Self {
            origin: origin.into(),
            units,
            metadata: serde_json::json!({
                "doc_type": doc_type,
                "ingested_at": Utc::now().to_rfc3339(),
            }),
        }
    }

    /// Timestamp recorded at ingestion, if present and well-formed.
    #[must_use]
    pub fn ingested_at(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get("ingested_at")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// Total extracted text length across units, in bytes.
    #[must_use]
    pub fn text_len(&self) -> usize {
        self.units.iter().map(|u| u.text.len()).sum()
    }
}

/// A provider of raw document text.
///
/// Enumeration of sources may be partial: a failing source yields an error
/// from [`read`](Self::read) and the loader skips it.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Identifier used for provenance and citation ("document X").
    fn origin(&self) -> &str;

    /// Read and extract the source into a [`Document`].
    async fn read(&self) -> Result<Document, SourceError>;
}

/// An in-memory text source. Paragraph blocks separated by blank lines become
/// one unit each; useful for tests, demos, and callers that extract text
/// upstream.
#[derive(Debug, Clone)]
pub struct TextSource {
    origin: String,
    text: String,
}

impl TextSource {
    pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
impl DocumentSource for TextSource {
    fn origin(&self) -> &str {
        &self.origin
    }

    async fn read(&self) -> Result<Document, SourceError> {
        if self.text.trim().is_empty() {
            return Err(SourceError::Empty {
                origin: self.origin.clone(),
            });
        }
        let units = vec![TextUnit {
            index: 0,
            label: None,
            text: self.text.clone(),
        }];
        Ok(Document::new(&self.origin, "text", units))
    }
}

/// A UTF-8 text file on disk. The file stem is the origin unless overridden.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    origin: String,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let origin = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self { path, origin }
    }

    /// Override the origin identifier.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }
}

#[async_trait]
impl DocumentSource for FileSource {
    fn origin(&self) -> &str {
        &self.origin
    }

    async fn read(&self) -> Result<Document, SourceError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| SourceError::Read {
                origin: self.origin.clone(),
                message: err.to_string(),
            })?;
        if text.trim().is_empty() {
            return Err(SourceError::Empty {
                origin: self.origin.clone(),
            });
        }
        let units = vec![TextUnit {
            index: 0,
            label: None,
            text,
        }];
        Ok(Document::new(&self.origin, "file", units))
    }
}

/// Load every readable source, skipping the ones that fail.
///
/// Failures are logged with `tracing::warn!` and do not abort the batch; the
/// caller decides whether an empty result is fatal (the pipeline escalates it
/// to an ingestion error).
pub async fn load_documents(sources: &[Box<dyn DocumentSource>]) -> Vec<Document> {
    let mut documents = Vec::with_capacity(sources.len());
    for source in sources {
        match source.read().await {
            Ok(doc) => {
                tracing::info!(
                    origin = %doc.origin,
                    units = doc.units.len(),
                    bytes = doc.text_len(),
                    "loaded document"
                );
                documents.push(doc);
            }
            Err(err) => {
                tracing::warn!(origin = %source.origin(), error = %err, "skipping unreadable source");
            }
        }
    }
    documents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn text_source_loads_with_metadata() {
        let source = TextSource::new("handbook.txt", "Admission exams are held in July.");
        let doc = source.read().await.unwrap();
        assert_eq!(doc.origin, "handbook.txt");
        assert_eq!(doc.units.len(), 1);
        assert_eq!(doc.metadata["doc_type"], "text");
        assert!(doc.ingested_at().is_some());
    }

    #[tokio::test]
    async fn empty_text_source_is_an_error() {
        let source = TextSource::new("blank.txt", "   \n ");
        assert!(matches!(
            source.read().await,
            Err(SourceError::Empty { .. })
        ));
    }

    #[tokio::test]
    async fn failing_source_is_skipped_not_fatal() {
        let sources: Vec<Box<dyn DocumentSource>> = vec![
            Box::new(TextSource::new("ok.txt", "some content")),
            Box::new(FileSource::new("/definitely/not/here.txt")),
            Box::new(TextSource::new("also-ok.txt", "more content")),
        ];
        let docs = load_documents(&sources).await;
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].origin, "ok.txt");
        assert_eq!(docs[1].origin, "also-ok.txt");
    }

    #[tokio::test]
    async fn file_source_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        tokio::fs::write(&path, "scholarships are awarded in March")
            .await
            .unwrap();
        let doc = FileSource::new(&path).read().await.unwrap();
        assert_eq!(doc.origin, "notes.txt");
        assert!(doc.units[0].text.contains("March"));
    }
}
