/**
Chunk counting the way the CoNLL-2003 scorer does it. Tokens are fed one by one; chunk
boundaries are found by comparing each tag with the previous one, which makes this mode
lenient: an `I-` tag after an `O` opens a chunk instead of being rejected.
*/
use crate::datastructure::Sentences;
use crate::entity::{ConversionError, Entities, SchemeType};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// Counts kept for a single entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeCounts {
    /// Chunks found in both the gold and the predicted tags.
    pub correct_chunks: usize,
    /// Chunks of the gold tags.
    pub found_correct: usize,
    /// Chunks of the predicted tags.
    pub found_guessed: usize,
}

/// Everything the report is computed from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkCounts {
    pub tokens: usize,
    /// Tokens whose gold and predicted tags agree on both prefix and type.
    pub correct_tags: usize,
    pub found_correct: usize,
    pub found_guessed: usize,
    pub correct_chunks: usize,
    /// Per entity type, sorted by name.
    pub per_type: BTreeMap<String, TypeCounts>,
}

/// Streaming chunk counter.
#[derive(Debug, Clone)]
pub struct ChunkCounter {
    raw: bool,
    o_tag: String,
    boundary: String,
    in_correct: bool,
    last_correct: String,
    last_correct_type: String,
    last_guessed: String,
    last_guessed_type: String,
    tokens: usize,
    correct_tags: usize,
    per_type: AHashMap<String, TypeCounts>,
}

impl Default for ChunkCounter {
    fn default() -> Self {
        Self::new(false, "O", "-X-")
    }
}

impl ChunkCounter {
    /// * `raw`: tags carry no prefix. Tags equal to `o_tag` are outside, every other tag `t` is
    ///   read as `I-t`.
    /// * `boundary`: a first field equal to it marks a sentence boundary.
    pub fn new<S: Into<String>>(raw: bool, o_tag: S, boundary: S) -> Self {
        ChunkCounter {
            raw,
            o_tag: o_tag.into(),
            boundary: boundary.into(),
            in_correct: false,
            last_correct: String::from("O"),
            last_correct_type: String::new(),
            last_guessed: String::from("O"),
            last_guessed_type: String::new(),
            tokens: 0,
            correct_tags: 0,
            per_type: AHashMap::default(),
        }
    }

    /// Feeds one line: its first field and its gold and predicted tags.
    pub fn push(&mut self, first: &str, gold: &str, predicted: &str) {
        if first == self.boundary {
            self.push_boundary();
            return;
        }
        self.push_tags(gold, predicted);
    }

    /// Feeds the tags of a token already known not to be a boundary.
    pub fn push_tags(&mut self, gold: &str, predicted: &str) {
        let correct = split_tag(self.raw, &self.o_tag, gold);
        let guessed = split_tag(self.raw, &self.o_tag, predicted);
        self.step(correct, guessed, true);
    }

    /// Sentence boundary. Open chunks are closed and no token is counted.
    pub fn push_boundary(&mut self) {
        self.step(("O", ""), ("O", ""), false);
    }

    /// A token outside of any chunk in both columns, whatever the raw settings.
    pub fn push_outside(&mut self) {
        self.step(("O", ""), ("O", ""), true);
    }

    fn step(&mut self, correct: (&str, &str), guessed: (&str, &str), counted: bool) {
        let (correct, correct_type) = correct;
        let (guessed, guessed_type) = guessed;
        let correct_end = end_of_chunk(
            &self.last_correct,
            correct,
            &self.last_correct_type,
            correct_type,
        );
        let guessed_end = end_of_chunk(
            &self.last_guessed,
            guessed,
            &self.last_guessed_type,
            guessed_type,
        );
        let correct_start = start_of_chunk(
            &self.last_correct,
            correct,
            &self.last_correct_type,
            correct_type,
        );
        let guessed_start = start_of_chunk(
            &self.last_guessed,
            guessed,
            &self.last_guessed_type,
            guessed_type,
        );

        if self.in_correct {
            if correct_end && guessed_end && self.last_guessed_type == self.last_correct_type {
                self.in_correct = false;
                let last_type = self.last_correct_type.clone();
                self.entry(&last_type).correct_chunks += 1;
            } else if correct_end != guessed_end || guessed_type != correct_type {
                self.in_correct = false;
            }
        }
        if correct_start && guessed_start && guessed_type == correct_type {
            self.in_correct = true;
        }
        if correct_start {
            self.entry(correct_type).found_correct += 1;
        }
        if guessed_start {
            self.entry(guessed_type).found_guessed += 1;
        }
        if counted {
            if correct == guessed && guessed_type == correct_type {
                self.correct_tags += 1;
            }
            self.tokens += 1;
        }
        trace!(correct, correct_type, guessed, guessed_type, in_correct = self.in_correct);

        replace(&mut self.last_correct, correct);
        replace(&mut self.last_correct_type, correct_type);
        replace(&mut self.last_guessed, guessed);
        replace(&mut self.last_guessed_type, guessed_type);
    }

    fn entry(&mut self, chunk_type: &str) -> &mut TypeCounts {
        self.per_type.entry(String::from(chunk_type)).or_default()
    }

    /// Closes a chunk still open at the end of the input and returns the counts.
    pub fn finish(mut self) -> ChunkCounts {
        if self.in_correct {
            let last_type = self.last_correct_type.clone();
            self.entry(&last_type).correct_chunks += 1;
        }
        let per_type: BTreeMap<String, TypeCounts> = self.per_type.into_iter().collect();
        let mut counts = ChunkCounts {
            tokens: self.tokens,
            correct_tags: self.correct_tags,
            ..Default::default()
        };
        for c in per_type.values() {
            counts.correct_chunks += c.correct_chunks;
            counts.found_correct += c.found_correct;
            counts.found_guessed += c.found_guessed;
        }
        counts.per_type = per_type;
        counts
    }
}

fn replace(buffer: &mut String, value: &str) {
    buffer.clear();
    buffer.push_str(value);
}

/// Splits a tag at its first `-`. In raw mode the tag is the type itself.
fn split_tag<'t>(raw: bool, o_tag: &str, tag: &'t str) -> (&'t str, &'t str) {
    if raw {
        if tag == o_tag {
            ("O", "")
        } else {
            ("I", tag)
        }
    } else {
        tag.split_once('-').unwrap_or((tag, ""))
    }
}

/// Checks if a chunk ended between the previous and current tag.
pub fn end_of_chunk(prev_tag: &str, tag: &str, prev_type: &str, chunk_type: &str) -> bool {
    matches!(
        (prev_tag, tag),
        ("B", "B") | ("B", "O") | ("I", "B") | ("I", "O") | ("E", "E") | ("E", "I") | ("E", "O")
    ) || (prev_tag != "O" && prev_tag != "." && prev_type != chunk_type)
        || prev_tag == "]"
        || prev_tag == "["
}

/// Checks if a chunk started between the previous and current tag.
pub fn start_of_chunk(prev_tag: &str, tag: &str, prev_type: &str, chunk_type: &str) -> bool {
    matches!(
        (prev_tag, tag),
        ("B", "B") | ("I", "B") | ("O", "B") | ("O", "I") | ("E", "E") | ("E", "I") | ("O", "E")
    ) || (tag != "O" && tag != "." && prev_type != chunk_type)
        || tag == "["
        || tag == "]"
}

/// Counts chunks with the lenient rules over already split sentences.
pub fn count_lenient<S: AsRef<str>>(gold: &Sentences<S>, predicted: &Sentences<S>) -> ChunkCounts {
    let mut counter = ChunkCounter::default();
    for (gold_sentence, predicted_sentence) in gold.iter_vec().zip(predicted.iter_vec()) {
        for (g, p) in gold_sentence.iter().zip(predicted_sentence) {
            let (g, p) = (g.as_ref(), p.as_ref());
            counter.step(split_tag(false, "O", g), split_tag(false, "O", p), true);
        }
        counter.push_boundary();
    }
    counter.finish()
}

/// Counts chunks with the strict rules of `scheme`. A predicted entity is correct when the same
/// sentence holds a gold entity with the same start, end and type.
pub fn count_strict<S: AsRef<str>>(
    gold: &Sentences<S>,
    predicted: &Sentences<S>,
    scheme: SchemeType,
) -> Result<ChunkCounts, ConversionError> {
    let gold_entities = Entities::try_from_strict(gold, scheme)?;
    let predicted_entities = Entities::try_from_strict(predicted, scheme)?;
    let mut types: AHashSet<&str> = gold_entities.unique_tags();
    types.extend(predicted_entities.unique_tags());

    let mut counts = ChunkCounts {
        tokens: gold.len(),
        correct_tags: gold
            .iter()
            .zip(predicted.iter())
            .filter(|(g, p)| g.as_ref() == p.as_ref())
            .count(),
        ..Default::default()
    };
    for chunk_type in types {
        let gold_set = gold_entities.filter(chunk_type);
        let predicted_set = predicted_entities.filter(chunk_type);
        let type_counts = TypeCounts {
            correct_chunks: gold_set.intersection(&predicted_set).count(),
            found_correct: gold_set.len(),
            found_guessed: predicted_set.len(),
        };
        counts.correct_chunks += type_counts.correct_chunks;
        counts.found_correct += type_counts.found_correct;
        counts.found_guessed += type_counts.found_guessed;
        counts.per_type.insert(String::from(chunk_type), type_counts);
    }
    Ok(counts)
}
