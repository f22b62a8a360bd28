//! # Text Chunking Module
//!
//! Recursive separator splitting of enriched text.
//!
//! The text is cut on the first separator of [`DEFAULT_SEPARATORS`] it
//! contains; pieces that are still too large are cut again on the next
//! separator, down to single characters. Small neighbouring pieces are then
//! merged back into chunks of at most `target_chunk_size` characters, each
//! chunk starting with the last `overlap_size` characters (or less) of the
//! previous one.
//!
//! Chunks are computed as byte ranges of the input so that overlap can be
//! reasoned about exactly; a separator stays attached to the piece it starts.

use std::collections::VecDeque;
use std::ops::Range;

use tracing::{debug, instrument};

use crate::processor::config::{ChunkOptions, DEFAULT_SEPARATORS};
use crate::processor::error::ProcessError;

struct Splitter<'a> {
    text: &'a str,
    options: &'a ChunkOptions,
    spans: Vec<Range<usize>>,
}

impl Splitter<'_> {
    fn len(&self, span: &Range<usize>) -> usize {
        self.text[span.clone()].chars().count()
    }

    /// Cut `span` before every occurrence of `separator`
    fn pieces(&self, span: Range<usize>, separator: &str) -> Vec<Range<usize>> {
        let segment = &self.text[span.clone()];
        let mut cuts: Vec<usize> = if separator.is_empty() {
            segment.char_indices().map(|(i, _)| i).collect()
        } else {
            segment.match_indices(separator).map(|(i, _)| i).collect()
        };
        cuts.push(segment.len());

        let mut pieces = Vec::with_capacity(cuts.len());
        let mut start = 0;
        for cut in cuts {
            if cut > start {
                pieces.push(span.start + start..span.start + cut);
            }
            start = cut;
        }
        pieces
    }

    fn split(&mut self, span: Range<usize>, separators: &[&str]) {
        let segment = &self.text[span.clone()];
        let position = separators
            .iter()
            .position(|s| s.is_empty() || segment.contains(s))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let mut small = Vec::new();
        for piece in self.pieces(span, separator) {
            if self.len(&piece) < self.options.target_chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                self.merge(&small);
                small.clear();
            }
            if finer.is_empty() {
                self.spans.push(piece);
            } else {
                self.split(piece, finer);
            }
        }
        if !small.is_empty() {
            self.merge(&small);
        }
    }

    fn merge(&mut self, pieces: &[Range<usize>]) {
        let target = self.options.target_chunk_size;
        let overlap = self.options.overlap_size;
        let mut current: VecDeque<Range<usize>> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = self.len(piece);
            if total + len > target && !current.is_empty() {
                if let (Some(first), Some(last)) = (current.front(), current.back()) {
                    self.spans.push(first.start..last.end);
                }
                while total > overlap || (total + len > target && total > 0) {
                    match current.pop_front() {
                        Some(dropped) => total -= self.len(&dropped),
                        None => break,
                    }
                }
            }
            current.push_back(piece.clone());
            total += len;
        }

        if let (Some(first), Some(last)) = (current.front(), current.back()) {
            self.spans.push(first.start..last.end);
        }
    }
}

/// Byte ranges of the chunks of `text`, in document order
#[instrument(skip(text), fields(len = text.len()))]
pub fn chunk_spans(text: &str, options: &ChunkOptions) -> Result<Vec<Range<usize>>, ProcessError> {
    if options.target_chunk_size == 0 {
        return Err(ProcessError::Chunking("chunk size must be positive".to_string()));
    }
    if options.overlap_size >= options.target_chunk_size {
        return Err(ProcessError::Chunking(format!(
            "overlap {} must be smaller than chunk size {}",
            options.overlap_size, options.target_chunk_size
        )));
    }

    let mut splitter = Splitter {
        text,
        options,
        spans: Vec::new(),
    };
    if !text.is_empty() {
        splitter.split(0..text.len(), DEFAULT_SEPARATORS);
    }
    debug!("Created {} chunks", splitter.spans.len());
    Ok(splitter.spans)
}

/// Chunk texts, trimmed, without whitespace-only chunks
pub fn chunk_text(text: &str, options: &ChunkOptions) -> Result<Vec<String>, ProcessError> {
    Ok(chunk_spans(text, options)?
        .into_iter()
        .map(|span| text[span].trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(target_chunk_size: usize, overlap_size: usize) -> ChunkOptions {
        ChunkOptions {
            target_chunk_size,
            overlap_size,
        }
    }

    fn long_document(len: usize) -> String {
        let mut text = String::new();
        let mut chars = 0;
        let mut i = 0;
        while chars < len {
            let sentence = format!("Démarche {} auprès du guichet. ", i);
            chars += sentence.chars().count();
            text.push_str(&sentence);
            i += 1;
            if i % 40 == 0 {
                text.push_str("\n\n");
                chars += 2;
            }
        }
        text.chars().take(len).collect()
    }

    #[test]
    fn test_small_text_is_one_chunk() {
        let text = "Un paragraphe.\n\nUn autre.";
        assert_eq!(chunk_spans(text, &ChunkOptions::default()).unwrap(), vec![0..text.len()]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_text("", &ChunkOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_long_document_overlaps_and_reconstructs() {
        let text = long_document(45_000);
        assert_eq!(text.chars().count(), 45_000);

        let spans = chunk_spans(&text, &options(20_000, 5_000)).unwrap();
        assert!(spans.len() >= 3);
        assert_eq!(spans[0].start, 0);
        assert_eq!(spans.last().unwrap().end, text.len());

        let mut rebuilt = String::new();
        let mut covered = 0;
        for window in spans.windows(2) {
            assert!(window[1].start < window[0].end, "consecutive chunks overlap");
            assert!(window[1].start > window[0].start);
        }
        for span in &spans {
            assert!(text[span.clone()].chars().count() <= 20_000);
            assert!(span.start <= covered);
            if span.end > covered {
                rebuilt.push_str(&text[covered..span.end]);
                covered = span.end;
            }
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_paragraph_boundaries_preferred() {
        let para = "a".repeat(30);
        let text = format!("{}\n\n{}\n\n{}", para, para, para);
        let chunks = chunk_text(&text, &options(70, 10)).unwrap();
        assert_eq!(chunks, vec![format!("{}\n\n{}", para, para), para.clone()]);
    }

    #[test]
    fn test_unbreakable_text_falls_back_to_characters() {
        let text = "é".repeat(25);
        let chunks = chunk_text(&text, &options(10, 2)).unwrap();
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks[0], "é".repeat(10));
        assert_eq!(chunks[1], "é".repeat(10));
    }

    #[test]
    fn test_invalid_options() {
        assert!(matches!(
            chunk_spans("x", &options(10, 10)),
            Err(ProcessError::Chunking(_))
        ));
        assert!(chunk_spans("x", &options(0, 0)).is_err());
    }
}
