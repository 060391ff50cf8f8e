//! Splits document pages into overlapping, size-bounded [`Fragment`]s.
//!
//! Text is cut at the coarsest boundary present (paragraph, line, sentence, word,
//! then single characters), pieces that are still too large are cut again at the
//! next boundary, and the resulting pieces are merged back greedily up to the
//! maximum size. Separators stay attached to the end of the piece they close, so
//! every piece is a contiguous slice of the page and offsets are exact.

use std::collections::VecDeque;

use crate::{
    config::{PipelineConfig, DEFAULT_FRAGMENT_OVERLAP, DEFAULT_MAX_FRAGMENT_SIZE},
    document::{Document, Fragment},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
    Character,
}

impl Boundary {
    const ALL: [Boundary; 5] = [
        Boundary::Paragraph,
        Boundary::Line,
        Boundary::Sentence,
        Boundary::Word,
        Boundary::Character,
    ];

    fn separators(self) -> &'static [&'static str] {
        match self {
            Boundary::Paragraph => &["\n\n"],
            Boundary::Line => &["\n"],
            Boundary::Sentence => &[". ", "? ", "! "],
            Boundary::Word => &[" "],
            Boundary::Character => &[],
        }
    }

    fn occurs_in(self, text: &str) -> bool {
        match self {
            Boundary::Character => true,
            _ => self.separators().iter().any(|s| text.contains(s)),
        }
    }

    fn split(self, piece: Piece<'_>) -> Vec<Piece<'_>> {
        let text = piece.text;
        if self == Boundary::Character {
            return text
                .char_indices()
                .map(|(i, c)| Piece {
                    start: piece.start + i,
                    text: &text[i..i + c.len_utf8()],
                })
                .collect();
        }

        let separators = self.separators();
        let mut pieces = Vec::new();
        let (mut from, mut i) = (0, 0);
        while i < text.len() {
            match separators.iter().find(|s| text[i..].starts_with(**s)) {
                Some(sep) => {
                    i += sep.len();
                    pieces.push(Piece {
                        start: piece.start + from,
                        text: &text[from..i],
                    });
                    from = i;
                }
                None => i += text[i..].chars().next().map_or(1, char::len_utf8),
            }
        }
        if from < text.len() {
            pieces.push(Piece {
                start: piece.start + from,
                text: &text[from..],
            });
        }
        pieces
    }
}

/// A slice of a page along with its byte offset in that page.
#[derive(Debug, Clone, Copy)]
struct Piece<'a> {
    start: usize,
    text: &'a str,
}

impl Piece<'_> {
    fn end(&self) -> usize {
        self.start + self.text.len()
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Produces the trimmed span covering `window`, `None` if it is only whitespace.
/// Pieces in a window are always adjacent in the page.
fn span<'a>(page: &'a str, window: &VecDeque<(Piece<'a>, usize)>) -> Option<Piece<'a>> {
    let (first, last) = (window.front()?.0, window.back()?.0);
    let raw = &page[first.start..last.end()];
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    Some(Piece {
        start: first.start + (raw.len() - raw.trim_start().len()),
        text,
    })
}

/// Splits pages into fragments no longer than `max_size` characters, with
/// consecutive fragments of a page sharing about `overlap` characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragmenter {
    max_size: usize,
    overlap: usize,
}

impl Default for Fragmenter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAGMENT_SIZE, DEFAULT_FRAGMENT_OVERLAP)
    }
}

impl Fragmenter {
    /// `max_size` is raised to at least 1 and `overlap` is capped below it.
    #[must_use]
    pub fn new(max_size: usize, overlap: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            overlap: overlap.min(max_size - 1),
        }
    }

    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.max_fragment_size, config.fragment_overlap)
    }

    /// Fragments every page of `document` in page order. Empty pages contribute nothing.
    #[must_use]
    pub fn fragment(&self, document: &Document) -> Vec<Fragment> {
        document
            .contents
            .iter()
            .enumerate()
            .flat_map(|(i, page)| self.fragment_page(page, i + 1))
            .collect()
    }

    /// Fragments a single page. `page` is the 1-based page number stamped on the output.
    #[must_use]
    pub fn fragment_page(&self, text: &str, page: usize) -> Vec<Fragment> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let mut pieces = Vec::new();
        self.split(Piece { start: 0, text }, &Boundary::ALL, &mut pieces);
        self.merge(text, &pieces)
            .into_iter()
            .map(|piece| Fragment::new(piece.text, page, text[..piece.start].chars().count()))
            .collect()
    }

    /// Cuts `piece` at the coarsest boundary it contains and pushes the parts onto
    /// `out` in page order, cutting parts longer than `max_size` again at the next
    /// boundary. The pushed pieces tile `piece` without gaps.
    fn split<'a>(&self, piece: Piece<'a>, boundaries: &[Boundary], out: &mut Vec<Piece<'a>>) {
        let Some(pos) = boundaries.iter().position(|b| b.occurs_in(piece.text)) else {
            return;
        };
        let (boundary, finer) = (boundaries[pos], &boundaries[pos + 1..]);
        for part in boundary.split(piece) {
            if part.char_len() <= self.max_size || finer.is_empty() {
                out.push(part);
            } else {
                self.split(part, finer, out);
            }
        }
    }

    /// Greedily packs adjacent pieces into chunks of at most `max_size` characters.
    /// When a chunk is emitted, its leading pieces are dropped until the kept tail
    /// would fall under `overlap` characters or until the next piece fits. The
    /// window runs over the whole page, so the tail carries across paragraphs.
    fn merge<'a>(&self, page: &'a str, pieces: &[Piece<'a>]) -> Vec<Piece<'a>> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(Piece<'a>, usize)> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = piece.char_len();
            if total + len > self.max_size && !window.is_empty() {
                chunks.extend(span(page, &window));
                while let Some(&(_, front_len)) = window.front() {
                    let overflows = total + len > self.max_size;
                    let tail = window.get(1).map_or(0, |(next, _)| {
                        let end = window.back().map_or(next.end(), |(last, _)| last.end());
                        page[next.start..end].trim().chars().count()
                    });
                    if !overflows && tail < self.overlap {
                        break;
                    }
                    window.pop_front();
                    total -= front_len;
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        chunks.extend(span(page, &window));
        chunks
    }
}
