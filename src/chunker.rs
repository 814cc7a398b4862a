//! Boundary-aware text splitting.
//!
//! Lengths are counted in `char`s. Chunks borrow from the input and always
//! concatenate back to it exactly.

/// Default maximum chunk length.
pub const DEFAULT_MAX_CHUNK_LEN: usize = 2048;

/// Sentence-ending punctuation followed by a space.
const SENTENCE_ENDS: &[&str] = &[". ", "! ", "? "];

/// Splits text into bounded chunks. Cheap to copy; every call to
/// [`ContentChunker::chunks`] starts over from the beginning.
#[derive(Debug, Clone, Copy)]
pub struct ContentChunker<'a> {
    text: &'a str,
    max_len: usize,
}

impl<'a> ContentChunker<'a> {
    pub fn new(text: &'a str, max_len: usize) -> Self {
        Self {
            text,
            max_len: max_len.max(1),
        }
    }

    pub fn chunks(&self) -> Chunks<'a> {
        Chunks {
            text: self.text,
            max_len: self.max_len,
            start: 0,
        }
    }
}

impl<'a> IntoIterator for ContentChunker<'a> {
    type Item = &'a str;
    type IntoIter = Chunks<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks()
    }
}

/// Convenience wrapper collecting all chunks of `text`.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<&str> {
    ContentChunker::new(text, max_len).chunks().collect()
}

#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    max_len: usize,
    start: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.text[self.start..];
        if rest.is_empty() {
            return None;
        }

        // Byte offset (relative to `rest`) of the first char past the window.
        let window_end = match rest.char_indices().nth(self.max_len) {
            Some((offset, _)) => offset,
            None => {
                self.start = self.text.len();
                return Some(rest);
            }
        };
        let midpoint = rest
            .char_indices()
            .nth(self.max_len / 2)
            .map_or(window_end, |(offset, _)| offset);

        let window = &rest[..window_end];
        let cut = find_cut(window, midpoint).unwrap_or(window_end);

        self.start += cut;
        Some(&rest[..cut])
    }
}

/// Furthest cut point past `midpoint`, trying boundary kinds in priority order.
/// The cut lands just after the boundary.
fn find_cut(window: &str, midpoint: usize) -> Option<usize> {
    let beyond_mid = |cut: usize| (cut > midpoint).then_some(cut);

    window
        .rfind("\n\n")
        .and_then(|pos| beyond_mid(pos + 2))
        .or_else(|| window.rfind('\n').and_then(|pos| beyond_mid(pos + 1)))
        .or_else(|| {
            SENTENCE_ENDS
                .iter()
                .filter_map(|end| window.rfind(end))
                .max()
                .and_then(|pos| beyond_mid(pos + 2))
        })
        .or_else(|| window.rfind(' ').and_then(|pos| beyond_mid(pos + 1)))
}
