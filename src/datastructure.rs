/**
Flat storage for a list of sentences. All tokens live in one contiguous vector and the sentence
boundaries are kept as offsets into it, which keeps a whole prediction file in two allocations.
*/
use std::slice::Iter;

/// Sentences stored as a flat vector of tokens plus the offsets where each sentence starts. The
/// offsets always begin with `0` and the last offset is the end of the last *closed* sentence.
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub struct Sentences<T> {
    tokens: Vec<T>,
    indices: Vec<usize>,
}

impl<T> Default for Sentences<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Sentences<T> {
    pub fn new() -> Self {
        Sentences {
            tokens: Vec::new(),
            indices: vec![0],
        }
    }

    /// Appends a token to the sentence currently being built.
    pub fn push(&mut self, token: T) {
        self.tokens.push(token);
    }

    /// Closes the sentence currently being built. Closing an empty sentence does nothing, so
    /// consecutive blank lines never produce empty sentences.
    pub fn close_sentence(&mut self) {
        let last = self.indices.last().copied().unwrap_or(0);
        if self.tokens.len() > last {
            self.indices.push(self.tokens.len());
        }
    }

    /// Number of tokens, including those of a sentence not closed yet.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of closed sentences.
    pub fn sentence_count(&self) -> usize {
        self.indices.len() - 1
    }

    /// Iterates over every token, ignoring the sentence boundaries.
    pub fn iter(&self) -> Iter<'_, T> {
        self.tokens.iter()
    }

    /// Iterates over the closed sentences.
    pub fn iter_vec(&self) -> impl Iterator<Item = &[T]> + '_ {
        self.indices
            .windows(2)
            .map(|bounds| &self.tokens[bounds[0]..bounds[1]])
    }
}

impl<T> From<Vec<Vec<T>>> for Sentences<T> {
    fn from(value: Vec<Vec<T>>) -> Self {
        let length: usize = value.iter().map(|v| v.len()).sum();
        let mut sentences = Sentences {
            tokens: Vec::with_capacity(length),
            indices: Vec::with_capacity(value.len() + 1),
        };
        sentences.indices.push(0);
        for sentence in value {
            sentences.tokens.extend(sentence);
            sentences.close_sentence();
        }
        sentences
    }
}

#[cfg(test)]
impl<T: Clone> From<Sentences<T>> for Vec<Vec<T>> {
    fn from(value: Sentences<T>) -> Self {
        value.iter_vec().map(Vec::from).collect()
    }
}
