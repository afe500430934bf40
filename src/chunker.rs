//! Splitting documents into retrieval-sized chunks.
//!
//! The splitter walks each text unit with a window of `chunk_size` grapheme
//! clusters and closes every chunk at the coarsest semantic boundary available
//! inside the window: paragraph break, then line break, then sentence end,
//! then plain whitespace. Only when no boundary fits does it cut between
//! graphemes. Adjacent chunks of the same unit overlap by exactly
//! `chunk_overlap` graphemes so context is never lost at a boundary; the
//! final chunk of a unit may be shorter.

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::loader::Document;

/// Default separator ladder, coarse to fine.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// A bounded-length text span derived from one document unit; the unit of
/// retrieval. Immutable; superseded when its document is re-indexed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    /// Stable identifier, deterministic for a given corpus and configuration.
    pub id: String,
    /// Origin identifier of the owning document.
    pub origin: String,
    /// Index of the text unit this chunk was cut from.
    pub unit_index: usize,
    /// Position of this chunk within its document.
    pub chunk_index: usize,
    /// The chunk text.
    pub text: String,
}

/// Document splitter with a configurable separator ladder.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
    separators: Vec<String>,
    /// Cut between graphemes when no separator fits the window. When off, a
    /// token longer than `chunk_size` is emitted whole as an oversized chunk.
    grapheme_fallback: bool,
}

impl Chunker {
    /// Create a splitter with the default separator ladder.
    #[must_use]
    pub fn new(config: ChunkingConfig) -> Self {
        Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_owned()).collect(),
            grapheme_fallback: true,
        }
    }

    /// Replace the separator ladder (ordered coarse to fine).
    #[must_use]
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable the grapheme-level fallback cut.
    #[must_use]
    pub fn with_grapheme_fallback(mut self, enabled: bool) -> Self {
        self.grapheme_fallback = enabled;
        self
    }

    /// Split a batch of documents into chunks, preserving provenance.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in documents {
            let mut chunk_index = 0usize;
            for unit in &doc.units {
                for piece in self.split_text(&unit.text) {
                    chunks.push(Chunk {
                        id: format!("{}#{}.{}", doc.origin, unit.index, chunk_index),
                        origin: doc.origin.clone(),
                        unit_index: unit.index,
                        chunk_index,
                        text: piece,
                    });
                    chunk_index += 1;
                }
            }
            tracing::debug!(origin = %doc.origin, chunks = chunk_index, "chunked document");
        }
        chunks
    }

    /// Split one text into overlapping pieces of at most `chunk_size`
    /// graphemes (oversized only when the fallback is disabled and a token
    /// exceeds the bound).
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        // Grapheme boundaries as ascending byte offsets; index i is the byte
        // offset where grapheme i starts.
        let boundaries: Vec<usize> = text.grapheme_indices(true).map(|(b, _)| b).collect();
        let total = boundaries.len();
        if total <= size {
            return vec![text.to_owned()];
        }

        let byte_at = |g: usize| -> usize {
            if g < total { boundaries[g] } else { text.len() }
        };

        let mut pieces = Vec::new();
        let mut start = 0usize;
        while start < total {
            let hard_end = (start + size).min(total);
            if hard_end == total {
                pieces.push(text[byte_at(start)..].to_owned());
                break;
            }

            let end = match self.best_break(text, &boundaries, start, hard_end, overlap) {
                Some(g) => g,
                None if self.grapheme_fallback => hard_end,
                None => self.oversized_end(text, &boundaries, start, hard_end),
            };

            pieces.push(text[byte_at(start)..byte_at(end)].to_owned());

            if end == total {
                break;
            }
            // Step back by the overlap, but always make forward progress.
            let next = end.saturating_sub(overlap);
            start = if next > start { next } else { end };
        }
        pieces
    }

    /// Latest boundary inside `(start, hard_end]` at the coarsest ladder level
    /// that has one, expressed as a grapheme index just past the separator.
    /// A boundary must land beyond `start + overlap` so the next window still
    /// advances.
    fn best_break(
        &self,
        text: &str,
        boundaries: &[usize],
        start: usize,
        hard_end: usize,
        overlap: usize,
    ) -> Option<usize> {
        let window_start = boundaries[start];
        let window_end = if hard_end < boundaries.len() {
            boundaries[hard_end]
        } else {
            text.len()
        };
        let window = &text[window_start..window_end];

        for sep in &self.separators {
            if sep.is_empty() {
                continue;
            }
            if let Some(pos) = window.rfind(sep.as_str()) {
                let break_byte = window_start + pos + sep.len();
                if let Ok(g) = boundaries.binary_search(&break_byte)
                    && g > start + overlap
                    && g <= hard_end
                {
                    return Some(g);
                }
            }
        }
        None
    }

    /// With the fallback disabled, an unbreakable token runs to the next
    /// occurrence of the finest separator (or the end of the text) and is
    /// emitted whole rather than dropped.
    fn oversized_end(
        &self,
        text: &str,
        boundaries: &[usize],
        start: usize,
        hard_end: usize,
    ) -> usize {
        let total = boundaries.len();
        let search_from = if hard_end < total {
            boundaries[hard_end]
        } else {
            return total;
        };
        let finest = match self.separators.last() {
            Some(sep) if !sep.is_empty() => sep,
            _ => return total,
        };
        match text[search_from..].find(finest.as_str()) {
            Some(pos) => {
                let break_byte = search_from + pos + finest.len();
                boundaries
                    .binary_search(&break_byte)
                    .unwrap_or_else(|g| g)
            }
            None => total,
        }
    }
}
