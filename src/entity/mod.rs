/**
Strict chunk extraction. A token opens an entity only when the scheme's start patterns match,
the entity grows while the inside patterns match and it is kept only if the token following it
closes it properly.
*/
use crate::datastructure::Sentences;
use crate::entity::schemes::{InnerToken, Token};
use ahash::AHashSet;
use std::fmt::Display;
use std::ops::Deref;
use thiserror::Error;

mod autodetect;
mod schemes;

pub use autodetect::AutoDetectError;
pub use schemes::{InvalidToken, ParsingError, SchemeType, UnknownScheme};

/// An entity represent a named objet in named entity recognition (NER). It contains a start and an
/// end (exclusive) index into its sentence and the entity type (such as `LOC`, `PER`, etc.)
#[derive(Debug, Hash, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Entity<'a> {
    pub start: usize,
    pub end: usize,
    pub tag: &'a str,
}

impl<'a> Entity<'a> {
    pub fn new(start: usize, end: usize, tag: &'a str) -> Self {
        Entity { start, end, tag }
    }
}

impl<'a> Display for Entity<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.tag, self.start, self.end)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error(transparent)]
    InvalidToken(#[from] InvalidToken),
    #[error(transparent)]
    ParsingPrefix(#[from] ParsingError),
}

/// A sentence parsed under a scheme. The outside token is implicitly found before the first and
/// after the last token.
#[derive(Debug, Clone, PartialEq)]
struct Tokens<'a> {
    tokens: Vec<Token<'a>>,
    outside: Token<'a>,
}

impl<'a> Tokens<'a> {
    fn new<S: AsRef<str>>(sentence: &'a [S], scheme: SchemeType) -> Result<Self, ParsingError> {
        let tokens = sentence
            .iter()
            .map(|t| InnerToken::try_new(t.as_ref()).map(|inner| Token::new(scheme, inner)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Tokens {
            tokens,
            outside: Token::outside(scheme),
        })
    }

    /// Token at `index`, the outside token past the end.
    fn get(&self, index: usize) -> &Token<'a> {
        self.tokens.get(index).unwrap_or(&self.outside)
    }

    /// Returns the index following the last token inside the chunk started before `start`.
    fn forward(&self, start: usize, prev: &Token<'a>) -> usize {
        let mut prev = prev;
        for (i, current) in self.tokens.iter().enumerate().skip(start) {
            if current.is_inside(&prev.inner) {
                prev = current;
            } else {
                return i;
            }
        }
        self.tokens.len()
    }

    /// Whether the token at `i - 1` closes its chunk.
    fn is_end(&self, i: usize) -> bool {
        self.get(i).is_end(&self.get(i - 1).inner)
    }

    fn entities(&self) -> Result<Vec<Entity<'a>>, InvalidToken> {
        let mut entities = Vec::new();
        let mut i = 0;
        let mut prev = &self.outside;
        while i < self.tokens.len() {
            let current = &self.tokens[i];
            if !current.is_valid() {
                return Err(current.invalid());
            }
            if current.is_start(&prev.inner) {
                let end = self.forward(i + 1, current);
                if self.is_end(end) {
                    entities.push(Entity::new(i, end, current.inner.tag));
                }
                i = end;
            } else {
                i += 1;
            }
            prev = self.get(i - 1);
        }
        Ok(entities)
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
/// The entities of every sentence, one vector per sentence.
pub struct Entities<'a>(Vec<Vec<Entity<'a>>>);

impl<'a> Deref for Entities<'a> {
    type Target = Vec<Vec<Entity<'a>>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for Entities<'a> {
    type Item = Entity<'a>;
    type IntoIter = std::iter::Flatten<std::vec::IntoIter<Vec<Entity<'a>>>>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter().flatten()
    }
}

impl<'a> From<Vec<Vec<Entity<'a>>>> for Entities<'a> {
    fn from(value: Vec<Vec<Entity<'a>>>) -> Self {
        Entities(value)
    }
}

impl<'a> Entities<'a> {
    /// Parses every sentence under `scheme`. Fails on the first tag that cannot be split into a
    /// prefix or whose prefix the scheme does not allow.
    pub fn try_from_strict<S: AsRef<str>>(
        sentences: &'a Sentences<S>,
        scheme: SchemeType,
    ) -> Result<Self, ConversionError> {
        let mut entities = Vec::with_capacity(sentences.sentence_count());
        for sentence in sentences.iter_vec() {
            let tokens = Tokens::new(sentence, scheme)?;
            entities.push(tokens.entities()?);
        }
        Ok(Entities(entities))
    }

    /// Entities of a given type, keyed by the index of their sentence.
    pub fn filter<S: AsRef<str>>(&self, tag_name: S) -> AHashSet<(usize, &Entity<'a>)> {
        let tag_name = tag_name.as_ref();
        self.iter()
            .enumerate()
            .flat_map(|(sentence, v)| v.iter().map(move |e| (sentence, e)))
            .filter(|(_, e)| e.tag == tag_name)
            .collect()
    }

    /// Number of entities of a given type.
    pub fn filter_count<S: AsRef<str>>(&self, tag_name: S) -> usize {
        let tag_name = tag_name.as_ref();
        self.iter()
            .flat_map(|v| v.iter())
            .filter(|e| e.tag == tag_name)
            .count()
    }

    pub fn unique_tags(&self) -> AHashSet<&'a str> {
        self.iter().flat_map(|v| v.iter()).map(|e| e.tag).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use enum_iterator::{all, Sequence};
    use quickcheck::{self, TestResult};
    use rstest::rstest;

    fn tuples(sentence: Vec<&str>, scheme: SchemeType) -> Vec<(usize, usize, String)> {
        let sentences = Sentences::from(vec![sentence]);
        let entities = Entities::try_from_strict(&sentences, scheme).unwrap();
        entities
            .iter()
            .flat_map(|v| v.iter())
            .map(|e| (e.start, e.end, String::from(e.tag)))
            .collect()
    }

    #[test]
    fn test_entities_try_from() {
        let sentences = Sentences::from(vec![build_str_vec(), build_str_vec_diff()]);
        let entities = Entities::try_from_strict(&sentences, SchemeType::IOB2).unwrap();
        assert_eq!(
            entities.0,
            vec![
                vec![Entity::new(0, 2, "PER"), Entity::new(3, 4, "LOC")],
                vec![
                    Entity::new(0, 2, "GEO"),
                    Entity::new(3, 4, "GEO"),
                    Entity::new(5, 8, "PER"),
                    Entity::new(8, 9, "LOC"),
                ]
            ]
        );
    }

    #[rstest]
    #[case(
        SchemeType::IOB1,
        vec!["I-PER", "I-PER", "B-PER", "O", "I-LOC"],
        vec![(0, 2, "PER"), (2, 3, "PER"), (4, 5, "LOC")]
    )]
    #[case(SchemeType::IOB2, vec!["I-PER", "B-PER", "I-PER", "I-LOC"], vec![(1, 3, "PER")])]
    #[case(
        SchemeType::IOE1,
        vec!["I-PER", "E-PER", "I-PER", "O"],
        vec![(0, 2, "PER"), (2, 3, "PER")]
    )]
    #[case(
        SchemeType::IOE2,
        vec!["I-PER", "E-PER", "E-LOC", "I-MISC"],
        vec![(0, 2, "PER"), (2, 3, "LOC")]
    )]
    #[case(
        SchemeType::IOBES,
        vec!["B-PER", "I-PER", "E-PER", "S-LOC", "B-ORG", "O"],
        vec![(0, 3, "PER"), (3, 4, "LOC")]
    )]
    #[case(
        SchemeType::BILOU,
        vec!["B-PER", "L-PER", "U-LOC", "B-ORG", "I-ORG", "L-ORG"],
        vec![(0, 2, "PER"), (2, 3, "LOC"), (3, 6, "ORG")]
    )]
    fn test_strict_entities_per_scheme(
        #[case] scheme: SchemeType,
        #[case] sentence: Vec<&str>,
        #[case] expected: Vec<(usize, usize, &str)>,
    ) {
        let expected: Vec<(usize, usize, String)> = expected
            .into_iter()
            .map(|(s, e, t)| (s, e, String::from(t)))
            .collect();
        assert_eq!(tuples(sentence, scheme), expected);
    }

    #[test]
    fn test_invalid_prefix_for_scheme() {
        let sentences = Sentences::from(vec![vec!["B-PER", "E-PER"]]);
        let err = Entities::try_from_strict(&sentences, SchemeType::IOB2).unwrap_err();
        assert_eq!(
            err,
            ConversionError::InvalidToken(InvalidToken {
                token: String::from("E-PER"),
                scheme: SchemeType::IOB2
            })
        );
    }

    #[test]
    fn test_unparsable_prefix() {
        let sentences = Sentences::from(vec![vec!["B-PER", "PER"]]);
        let err = Entities::try_from_strict(&sentences, SchemeType::IOB2).unwrap_err();
        assert!(matches!(err, ConversionError::ParsingPrefix(_)));
    }

    #[test]
    fn test_forward_method() {
        let sentence = build_str_vec();
        let tokens = Tokens::new(sentence.as_slice(), SchemeType::IOB2).unwrap();
        assert_eq!(tokens.forward(1, tokens.get(0)), 2);
        assert!(tokens.is_end(2));
        assert!(!tokens.is_end(1));
        assert!(tokens.is_end(4));
    }

    #[test]
    fn test_entities_filter() {
        let sentences = Sentences::from(vec![build_str_vec(), build_str_vec_diff()]);
        let entities = Entities::try_from_strict(&sentences, SchemeType::IOB2).unwrap();
        let geo = Entity::new(0, 2, "GEO");
        let expected: AHashSet<(usize, &Entity)> =
            AHashSet::from_iter(vec![(1, &geo), (1, &entities[1][1])]);
        assert_eq!(entities.filter("GEO"), expected);
        assert_eq!(entities.filter_count("PER"), 2);
        assert_eq!(entities.filter_count("DATE"), 0);
    }

    #[test]
    fn test_same_span_in_other_sentence_is_distinct() {
        let sentences = Sentences::from(vec![vec!["B-PER"], vec!["B-PER"]]);
        let entities = Entities::try_from_strict(&sentences, SchemeType::IOB2).unwrap();
        assert_eq!(entities.filter("PER").len(), 2);
    }

    #[test]
    fn test_unique_tags() {
        let sentences = Sentences::from(vec![build_str_vec(), build_str_vec_diff()]);
        let entities = Entities::try_from_strict(&sentences, SchemeType::IOB2).unwrap();
        let expected: AHashSet<&str> = AHashSet::from_iter(vec!["PER", "LOC", "GEO"]);
        assert_eq!(entities.unique_tags(), expected);
    }

    #[derive(Debug, PartialEq, Hash, Clone, Sequence, Eq)]
    enum TokensToTest {
        BPER,
        BGEO,
        BLOC,
        O,
    }
    impl From<&TokensToTest> for &'static str {
        fn from(value: &TokensToTest) -> Self {
            match value {
                TokensToTest::BPER => "B-PER",
                TokensToTest::BLOC => "B-LOC",
                TokensToTest::BGEO => "B-GEO",
                TokensToTest::O => "O",
            }
        }
    }
    impl quickcheck::Arbitrary for TokensToTest {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            let choices: Vec<TokensToTest> = all::<TokensToTest>().collect();
            g.choose(choices.as_ref()).unwrap().clone()
        }
    }

    #[test]
    fn test_property_begin_only_entities_have_length_one() {
        fn property(tokens: Vec<Vec<TokensToTest>>) -> TestResult {
            let tags: Vec<Vec<&str>> = tokens
                .iter()
                .map(|v| v.iter().map(|t| <&str>::from(t)).collect())
                .collect();
            let begin_count = tags.iter().flatten().filter(|t| **t != "O").count();
            let sentences = Sentences::from(tags);
            let entities = Entities::try_from_strict(&sentences, SchemeType::IOB2).unwrap();
            let mut count = 0;
            for entity in entities {
                count += 1;
                if entity.end - entity.start != 1 {
                    return TestResult::failed();
                }
            }
            TestResult::from_bool(count == begin_count)
        }
        let mut qc = quickcheck::QuickCheck::new().tests(2000);
        qc.quickcheck(property as fn(Vec<Vec<TokensToTest>>) -> TestResult)
    }

    fn build_str_vec() -> Vec<&'static str> {
        vec!["B-PER", "I-PER", "O", "B-LOC"]
    }
    fn build_str_vec_diff() -> Vec<&'static str> {
        vec![
            "B-GEO", "I-GEO", "O", "B-GEO", "O", "B-PER", "I-PER", "I-PER", "B-LOC",
        ]
    }
}
