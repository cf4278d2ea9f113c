use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChunkError {
    #[error("Chunk size must be greater than zero")]
    ZeroSize,

    #[error("Chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// Splits text on whitespace into overlapping chunks of bounded length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

fn joined_len(words: &[String]) -> usize {
    if words.is_empty() {
        return 0;
    }
    words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len() - 1
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::ZeroSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Whitespace-separated words, with words longer than a chunk cut into pieces
    fn words(&self, text: &str) -> Vec<String> {
        let mut words = Vec::new();
        for word in text.split_whitespace() {
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(self.chunk_size) {
                words.push(piece.iter().collect());
            }
        }
        words
    }

    /// Trailing words of a finished chunk that fit in the overlap budget
    fn overlap_tail(&self, words: &[String]) -> Vec<String> {
        let mut tail: Vec<String> = Vec::new();
        for word in words.iter().rev() {
            let extra = word.chars().count() + usize::from(!tail.is_empty());
            if joined_len(&tail) + extra > self.chunk_overlap {
                break;
            }
            tail.insert(0, word.clone());
        }
        tail
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();

        for word in self.words(text) {
            let word_len = word.chars().count();
            if !current.is_empty() && joined_len(&current) + 1 + word_len > self.chunk_size {
                chunks.push(current.join(" "));
                current = self.overlap_tail(&current);
                while !current.is_empty() && joined_len(&current) + 1 + word_len > self.chunk_size
                {
                    current.remove(0);
                }
            }
            current.push(word);
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }
        chunks
    }
}
