use crate::datastructure::Sentences;
use crate::entity::schemes::{InnerToken, ParsingError, Prefix, SchemeType};
use crate::entity::Entities;
use ahash::AHashSet;
use enum_iterator::all;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AutoDetectError {
    #[error("the tags are ambiguous, they parse under every one of {0:?}")]
    TooManySchemesParsed(BTreeSet<SchemeType>),
    #[error("no scheme could be parsed from the tags")]
    NoSchemeParsed,
    #[error(transparent)]
    Parsing(#[from] ParsingError),
}

/// This impl block contains the logic of the auto-detect feature.
impl SchemeType {
    /// Finds the scheme used by `sentences`. Every scheme that fails to parse a sentence strictly
    /// is discarded. When several survive, the set of prefixes in use decides between IOB2, IOE2,
    /// IOBES and BILOU; anything still ambiguous is reported as such.
    pub fn try_auto_detect<S: AsRef<str>>(
        sentences: &Sentences<S>,
    ) -> Result<SchemeType, AutoDetectError> {
        let prefixes = used_prefixes(sentences)?;
        let mut possible_schemes: BTreeSet<SchemeType> = all::<SchemeType>().collect();
        for sentence in sentences.iter_vec() {
            if possible_schemes.len() <= 1 {
                break;
            }
            let single = Sentences::from(vec![sentence.iter().collect::<Vec<_>>()]);
            possible_schemes.retain(|scheme| Entities::try_from_strict(&single, *scheme).is_ok());
        }
        debug!(?possible_schemes, ?prefixes, "schemes surviving strict parsing");
        match possible_schemes.len() {
            0 => Err(AutoDetectError::NoSchemeParsed),
            1 => possible_schemes
                .pop_first()
                .ok_or(AutoDetectError::NoSchemeParsed),
            _ => match Self::detect_by_prefix(&prefixes) {
                Some(scheme) if possible_schemes.contains(&scheme) => Ok(scheme),
                _ => Err(AutoDetectError::TooManySchemesParsed(possible_schemes)),
            },
        }
    }

    fn detect_by_prefix(prefixes: &AHashSet<Prefix>) -> Option<SchemeType> {
        let only = |allowed: &[Prefix]| prefixes.iter().all(|p| allowed.contains(p));
        let has = |p: Prefix| prefixes.contains(&p);
        if has(Prefix::B) && !has(Prefix::E) && only(&[Prefix::I, Prefix::O, Prefix::B]) {
            Some(SchemeType::IOB2)
        } else if has(Prefix::E) && only(&[Prefix::I, Prefix::O, Prefix::E]) {
            Some(SchemeType::IOE2)
        } else if has(Prefix::B)
            && has(Prefix::E)
            && only(&[Prefix::I, Prefix::O, Prefix::B, Prefix::E, Prefix::S])
        {
            Some(SchemeType::IOBES)
        } else if has(Prefix::B)
            && has(Prefix::L)
            && only(&[Prefix::I, Prefix::O, Prefix::B, Prefix::L, Prefix::U])
        {
            Some(SchemeType::BILOU)
        } else {
            None
        }
    }
}

fn used_prefixes<S: AsRef<str>>(
    sentences: &Sentences<S>,
) -> Result<AHashSet<Prefix>, ParsingError> {
    sentences
        .iter()
        .map(|t| InnerToken::try_new(t.as_ref()).map(|inner| inner.prefix))
        .collect()
}
