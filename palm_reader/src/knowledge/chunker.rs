/// Splits text on progressively finer separators until every piece fits,
/// then packs pieces into chunks that share a short overlap.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, finer) = match separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
        {
            Some(i) => (separators[i], &separators[i + 1..]),
            None => ("", &[][..]),
        };

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|piece| !piece.trim().is_empty())
                .map(String::from)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) <= self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }
            chunks.extend(self.split_with(&piece, finer));
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }
        chunks
    }

    /// Packs pieces greedily; each new chunk starts with the tail pieces of the
    /// previous one that fit within the overlap budget.
    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut window_len = 0;

        for piece in pieces {
            let piece_len = char_len(piece);
            let joined_len = if window.is_empty() {
                piece_len
            } else {
                window_len + sep_len + piece_len
            };

            if joined_len > self.chunk_size && !window.is_empty() {
                push_chunk(&mut chunks, &window, separator);

                while !window.is_empty()
                    && (window_len > self.chunk_overlap
                        || window_len + sep_len + piece_len > self.chunk_size)
                {
                    let removed = char_len(window.remove(0));
                    window_len = if window.is_empty() {
                        0
                    } else {
                        window_len - removed - sep_len
                    };
                }
            }

            window_len = if window.is_empty() {
                piece_len
            } else {
                window_len + sep_len + piece_len
            };
            window.push(piece);
        }

        if !window.is_empty() {
            push_chunk(&mut chunks, &window, separator);
        }
        chunks
    }
}

fn push_chunk(chunks: &mut Vec<String>, window: &[&str], separator: &str) {
    let chunk = window.join(separator).trim().to_string();
    if !chunk.is_empty() {
        chunks.push(chunk);
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = TextChunker::new(500, 50);
        let chunks = chunker.split("## Life line\n\nA long life line means stamina.");
        assert_eq!(chunks, vec!["## Life line\n\nA long life line means stamina."]);
    }

    #[test]
    fn test_paragraphs_are_packed_within_chunk_size() {
        let chunker = TextChunker::new(40, 0);
        let text = "first paragraph here\n\nsecond paragraph here\n\nthird one";
        let chunks = chunker.split(text);
        assert_eq!(
            chunks,
            vec!["first paragraph here", "second paragraph here\n\nthird one"]
        );
        assert!(chunks.iter().all(|c| c.chars().count() <= 40));
    }

    #[test]
    fn test_long_line_falls_back_to_words_with_overlap() {
        let chunker = TextChunker::new(20, 6);
        let text = "alpha beta gamma delta epsilon zeta";
        let chunks = chunker.split(text);

        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(chunks[0], "alpha beta gamma");
        // the trailing word of a chunk opens the next one
        assert!(chunks[1].starts_with("gamma"));
        assert!(chunks.last().unwrap().ends_with("zeta"));
    }

    #[test]
    fn test_unbroken_text_is_split_by_characters() {
        let chunker = TextChunker::new(4, 0);
        let chunks = chunker.split("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let chunker = TextChunker::new(500, 50);
        assert!(chunker.split("  \n\n ").is_empty());
    }
}
