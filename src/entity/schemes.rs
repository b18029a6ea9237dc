/**
Prefixes, tokens and the pattern tables of every supported tagging scheme.
*/
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Prefix represent an annotation specifying the place of a token in a chunk. For example, in
/// `IOB1`, the `I` prefix is used to indicate that the token is inside a NER.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Sequence)]
pub(crate) enum Prefix {
    I,
    O,
    B,
    E,
    S,
    U,
    L,
    /// Marker used by the pattern tables. It is never parsed from a tag.
    Any,
}

impl Prefix {
    fn matches(&self, other: &Prefix) -> bool {
        matches!((self, other), (Prefix::Any, _) | (_, Prefix::Any)) || self == other
    }
}

impl FromStr for Prefix {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "I" => Ok(Self::I),
            "O" => Ok(Self::O),
            "B" => Ok(Self::B),
            "E" => Ok(Self::E),
            "S" => Ok(Self::S),
            "U" => Ok(Self::U),
            "L" => Ok(Self::L),
            _ => Err(ParsingError::PrefixError(String::from(s))),
        }
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Condition on the entity types of two consecutive tokens.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub(crate) enum Tag {
    Same,
    Diff,
    Any,
}

type Pattern = (Prefix, Prefix, Tag);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Could not parse the string into a `Prefix`
pub enum ParsingError {
    #[error("could not parse the following string into a prefix: {0:?}")]
    PrefixError(String),
    #[error("received an empty tag")]
    EmptyToken,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Encountered a prefix that the scheme does not allow.
#[error("invalid token {token:?} for the {scheme} scheme")]
pub struct InvalidToken {
    pub token: String,
    pub scheme: SchemeType,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub(crate) struct InnerToken<'a> {
    /// The full tag, such as `"B-PER"`.
    pub(crate) token: &'a str,
    pub(crate) prefix: Prefix,
    /// The entity type, such as `"PER"`. Tags without a type get `"_"`.
    pub(crate) tag: &'a str,
}

impl<'a> InnerToken<'a> {
    /// Splits the tag at its first `-`.
    pub(crate) fn try_new(token: &'a str) -> Result<Self, ParsingError> {
        if token.is_empty() {
            return Err(ParsingError::EmptyToken);
        }
        let (prefix, tag) = token.split_once('-').unwrap_or((token, ""));
        let prefix = Prefix::from_str(prefix)?;
        let tag = if tag.is_empty() { "_" } else { tag };
        Ok(InnerToken { token, prefix, tag })
    }

    #[inline]
    fn check_tag(&self, prev: &InnerToken, cond: Tag) -> bool {
        match cond {
            Tag::Any => true,
            Tag::Same => prev.tag == self.tag,
            Tag::Diff => prev.tag != self.tag,
        }
    }

    /// Check whether one of the `(previous prefix, current prefix, type condition)` patterns
    /// matches.
    fn check_patterns(&self, prev: &InnerToken, patterns: &[Pattern]) -> bool {
        patterns.iter().any(|(prev_prefix, current_prefix, cond)| {
            prev_prefix.matches(&prev.prefix)
                && current_prefix.matches(&self.prefix)
                && self.check_tag(prev, *cond)
        })
    }
}

/// A tag parsed under a given scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    scheme: SchemeType,
    pub(crate) inner: InnerToken<'a>,
}

impl<'a> Token<'a> {
    pub(crate) fn new(scheme: SchemeType, inner: InnerToken<'a>) -> Self {
        Token { scheme, inner }
    }

    /// The `O` token appended after every sentence.
    pub(crate) fn outside(scheme: SchemeType) -> Token<'static> {
        Token {
            scheme,
            inner: InnerToken {
                token: "O",
                prefix: Prefix::O,
                tag: "_",
            },
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.scheme.allowed_prefixes().contains(&self.inner.prefix)
    }

    /// Check whether the current token is the start of chunk.
    pub(crate) fn is_start(&self, prev: &InnerToken) -> bool {
        self.inner.check_patterns(prev, self.scheme.start_patterns())
    }

    /// Check whether the current token is inside the chunk started before it.
    pub(crate) fn is_inside(&self, prev: &InnerToken) -> bool {
        self.inner.check_patterns(prev, self.scheme.inside_patterns())
    }

    /// Check whether the *previous* token is the end of chunk.
    pub(crate) fn is_end(&self, prev: &InnerToken) -> bool {
        self.inner.check_patterns(prev, self.scheme.end_patterns())
    }

    pub(crate) fn invalid(&self) -> InvalidToken {
        InvalidToken {
            token: String::from(self.inner.token),
            scheme: self.scheme,
        }
    }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(
    Debug, Clone, Copy, Sequence, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
/// Enumeration of the supported Schemes. They are use to indicate how we are supposed to parse and
/// chunk the different tokens.
pub enum SchemeType {
    IOB1,
    IOE1,
    IOB2,
    IOE2,
    IOBES,
    BILOU,
}

impl SchemeType {
    const IOB1_ALLOWED_PREFIXES: [Prefix; 3] = [Prefix::I, Prefix::O, Prefix::B];
    const IOB1_START_PATTERNS: [Pattern; 5] = [
        (Prefix::O, Prefix::I, Tag::Any),
        (Prefix::I, Prefix::I, Tag::Diff),
        (Prefix::B, Prefix::I, Tag::Any),
        (Prefix::I, Prefix::B, Tag::Same),
        (Prefix::B, Prefix::B, Tag::Same),
    ];
    const IOB1_INSIDE_PATTERNS: [Pattern; 2] = [
        (Prefix::B, Prefix::I, Tag::Same),
        (Prefix::I, Prefix::I, Tag::Same),
    ];
    const IOB1_END_PATTERNS: [Pattern; 6] = [
        (Prefix::I, Prefix::I, Tag::Diff),
        (Prefix::I, Prefix::O, Tag::Any),
        (Prefix::I, Prefix::B, Tag::Any),
        (Prefix::B, Prefix::O, Tag::Any),
        (Prefix::B, Prefix::I, Tag::Diff),
        (Prefix::B, Prefix::B, Tag::Same),
    ];

    const IOE1_ALLOWED_PREFIXES: [Prefix; 3] = [Prefix::I, Prefix::O, Prefix::E];
    const IOE1_START_PATTERNS: [Pattern; 4] = [
        (Prefix::O, Prefix::I, Tag::Any),
        (Prefix::I, Prefix::I, Tag::Diff),
        (Prefix::E, Prefix::I, Tag::Any),
        (Prefix::E, Prefix::E, Tag::Same),
    ];
    const IOE1_INSIDE_PATTERNS: [Pattern; 2] = [
        (Prefix::I, Prefix::I, Tag::Same),
        (Prefix::I, Prefix::E, Tag::Same),
    ];
    const IOE1_END_PATTERNS: [Pattern; 5] = [
        (Prefix::I, Prefix::I, Tag::Diff),
        (Prefix::I, Prefix::O, Tag::Any),
        (Prefix::I, Prefix::E, Tag::Diff),
        (Prefix::E, Prefix::I, Tag::Same),
        (Prefix::E, Prefix::E, Tag::Same),
    ];

    const IOB2_ALLOWED_PREFIXES: [Prefix; 3] = [Prefix::I, Prefix::O, Prefix::B];
    const IOB2_START_PATTERNS: [Pattern; 1] = [(Prefix::Any, Prefix::B, Tag::Any)];
    const IOB2_INSIDE_PATTERNS: [Pattern; 2] = [
        (Prefix::B, Prefix::I, Tag::Same),
        (Prefix::I, Prefix::I, Tag::Same),
    ];
    const IOB2_END_PATTERNS: [Pattern; 6] = [
        (Prefix::I, Prefix::O, Tag::Any),
        (Prefix::I, Prefix::I, Tag::Diff),
        (Prefix::I, Prefix::B, Tag::Any),
        (Prefix::B, Prefix::O, Tag::Any),
        (Prefix::B, Prefix::I, Tag::Diff),
        (Prefix::B, Prefix::B, Tag::Any),
    ];

    const IOE2_ALLOWED_PREFIXES: [Prefix; 3] = [Prefix::I, Prefix::O, Prefix::E];
    const IOE2_START_PATTERNS: [Pattern; 6] = [
        (Prefix::O, Prefix::I, Tag::Any),
        (Prefix::O, Prefix::E, Tag::Any),
        (Prefix::E, Prefix::I, Tag::Any),
        (Prefix::E, Prefix::E, Tag::Any),
        (Prefix::I, Prefix::I, Tag::Diff),
        (Prefix::I, Prefix::E, Tag::Diff),
    ];
    const IOE2_INSIDE_PATTERNS: [Pattern; 2] = [
        (Prefix::I, Prefix::E, Tag::Same),
        (Prefix::I, Prefix::I, Tag::Same),
    ];
    const IOE2_END_PATTERNS: [Pattern; 1] = [(Prefix::E, Prefix::Any, Tag::Any)];

    const IOBES_ALLOWED_PREFIXES: [Prefix; 5] =
        [Prefix::I, Prefix::O, Prefix::E, Prefix::B, Prefix::S];
    const IOBES_START_PATTERNS: [Pattern; 2] = [
        (Prefix::Any, Prefix::B, Tag::Any),
        (Prefix::Any, Prefix::S, Tag::Any),
    ];
    const IOBES_INSIDE_PATTERNS: [Pattern; 4] = [
        (Prefix::B, Prefix::I, Tag::Same),
        (Prefix::B, Prefix::E, Tag::Same),
        (Prefix::I, Prefix::I, Tag::Same),
        (Prefix::I, Prefix::E, Tag::Same),
    ];
    const IOBES_END_PATTERNS: [Pattern; 2] = [
        (Prefix::S, Prefix::Any, Tag::Any),
        (Prefix::E, Prefix::Any, Tag::Any),
    ];

    const BILOU_ALLOWED_PREFIXES: [Prefix; 5] =
        [Prefix::I, Prefix::O, Prefix::U, Prefix::B, Prefix::L];
    const BILOU_START_PATTERNS: [Pattern; 2] = [
        (Prefix::Any, Prefix::B, Tag::Any),
        (Prefix::Any, Prefix::U, Tag::Any),
    ];
    const BILOU_INSIDE_PATTERNS: [Pattern; 4] = [
        (Prefix::B, Prefix::I, Tag::Same),
        (Prefix::B, Prefix::L, Tag::Same),
        (Prefix::I, Prefix::I, Tag::Same),
        (Prefix::I, Prefix::L, Tag::Same),
    ];
    const BILOU_END_PATTERNS: [Pattern; 2] = [
        (Prefix::U, Prefix::Any, Tag::Any),
        (Prefix::L, Prefix::Any, Tag::Any),
    ];

    pub(crate) fn allowed_prefixes(&self) -> &'static [Prefix] {
        match self {
            Self::IOB1 => &Self::IOB1_ALLOWED_PREFIXES,
            Self::IOE1 => &Self::IOE1_ALLOWED_PREFIXES,
            Self::IOB2 => &Self::IOB2_ALLOWED_PREFIXES,
            Self::IOE2 => &Self::IOE2_ALLOWED_PREFIXES,
            Self::IOBES => &Self::IOBES_ALLOWED_PREFIXES,
            Self::BILOU => &Self::BILOU_ALLOWED_PREFIXES,
        }
    }
    fn start_patterns(&self) -> &'static [Pattern] {
        match self {
            Self::IOB1 => &Self::IOB1_START_PATTERNS,
            Self::IOE1 => &Self::IOE1_START_PATTERNS,
            Self::IOB2 => &Self::IOB2_START_PATTERNS,
            Self::IOE2 => &Self::IOE2_START_PATTERNS,
            Self::IOBES => &Self::IOBES_START_PATTERNS,
            Self::BILOU => &Self::BILOU_START_PATTERNS,
        }
    }
    fn inside_patterns(&self) -> &'static [Pattern] {
        match self {
            Self::IOB1 => &Self::IOB1_INSIDE_PATTERNS,
            Self::IOE1 => &Self::IOE1_INSIDE_PATTERNS,
            Self::IOB2 => &Self::IOB2_INSIDE_PATTERNS,
            Self::IOE2 => &Self::IOE2_INSIDE_PATTERNS,
            Self::IOBES => &Self::IOBES_INSIDE_PATTERNS,
            Self::BILOU => &Self::BILOU_INSIDE_PATTERNS,
        }
    }
    fn end_patterns(&self) -> &'static [Pattern] {
        match self {
            Self::IOB1 => &Self::IOB1_END_PATTERNS,
            Self::IOE1 => &Self::IOE1_END_PATTERNS,
            Self::IOB2 => &Self::IOB2_END_PATTERNS,
            Self::IOE2 => &Self::IOE2_END_PATTERNS,
            Self::IOBES => &Self::IOBES_END_PATTERNS,
            Self::BILOU => &Self::BILOU_END_PATTERNS,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown scheme {0:?}, expected one of IOB1, IOE1, IOB2, IOE2, IOBES or BILOU")]
pub struct UnknownScheme(pub String);

impl FromStr for SchemeType {
    type Err = UnknownScheme;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IOB1" => Ok(Self::IOB1),
            "IOE1" => Ok(Self::IOE1),
            "IOB2" | "BIO" => Ok(Self::IOB2),
            "IOE2" => Ok(Self::IOE2),
            "IOBES" => Ok(Self::IOBES),
            "BILOU" => Ok(Self::BILOU),
            _ => Err(UnknownScheme(String::from(s))),
        }
    }
}

impl Display for SchemeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
