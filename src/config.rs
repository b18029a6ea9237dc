/*
 * This modules contains the `EvalConfig` struct, which implements the default trait, and its
 * builder. The config is passed to the `evaluate` function and mirrors the options of the CoNLL
 * scorer.
*/
use crate::entity::SchemeType;
use crate::format::{Delimiter, OutputReader};
use crate::metrics::DivByZeroStrat;
use either::Either as LeftOrRight;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io::BufRead;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("raw tags carry no prefix and cannot be parsed under the {0} scheme")]
    IncompatibleOptions(SchemeType),
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
/// Options of an evaluation. The default reproduces the CoNLL-2003 scorer run without flags.
pub struct EvalConfig {
    /// Tags carry no prefix (`-r`). Every tag other than `o_tag` is its own chunk type.
    pub raw: bool,
    /// Tag marking tokens outside of any chunk in raw mode (`-o`).
    pub o_tag: String,
    /// Lines whose first field equals this are sentence boundaries (`-b`).
    pub boundary: String,
    /// Separator between the fields of a line (`-d`).
    pub delimiter: Delimiter,
    /// This parameter specifies the `SchemeType` used. `None` chunks the tags the lenient way of
    /// the CoNLL scorer; a scheme extracts the entities strictly. If you don't know what scheme
    /// you are using, you can try to detect it using `SchemeType::try_auto_detect`.
    pub scheme: Option<SchemeType>,
    /// This parameter describe what to do when we encounter a division by zero when computing
    /// precision and recall. The CoNLL scorer replaces the results by 0.
    pub zero_division: DivByZeroStrat,
    /// Ignore the `-DOCSTART-` sentinels instead of scoring them as `O O` tokens.
    pub skip_docstart: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            raw: false,
            o_tag: String::from("O"),
            boundary: String::from("-X-"),
            delimiter: Delimiter::Tab,
            scheme: None,
            zero_division: DivByZeroStrat::ReplaceBy0,
            skip_docstart: false,
        }
    }
}

impl EvalConfig {
    /// Reader of an output file following the delimiter and boundary of this config.
    pub fn output_reader<R: BufRead>(&self, reader: R) -> OutputReader<R> {
        OutputReader::new(reader, self.delimiter).with_boundary(self.boundary.as_str())
    }
}

impl Display for EvalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Raw tags: {} (outside tag {:?})\n Sentence boundary: {:?}\n Delimiter: {}\n Optional scheme used: {:?}\n Strategy when encountering a division by zero: {}\n Skipping document sentinels: {}",
            self.raw,
            self.o_tag,
            self.boundary,
            self.delimiter,
            self.scheme,
            self.zero_division,
            self.skip_docstart
        )
    }
}

/// This builder can be used to build and customize an `EvalConfig` stucture.
pub struct EvalConfigBuilder<ZeroDiv>
where
    ZeroDiv: Into<DivByZeroStrat>,
{
    raw: bool,
    o_tag: String,
    boundary: String,
    delimiter: Delimiter,
    scheme: Option<SchemeType>,
    zero_division: LeftOrRight<ZeroDiv, DivByZeroStrat>,
    skip_docstart: bool,
}

impl Default for EvalConfigBuilder<DivByZeroStrat> {
    fn default() -> Self {
        Self::new()
    }
}

impl<ZeroDiv> EvalConfigBuilder<ZeroDiv>
where
    ZeroDiv: Into<DivByZeroStrat>,
{
    pub fn new() -> Self {
        let defaults = EvalConfig::default();
        Self {
            raw: defaults.raw,
            o_tag: defaults.o_tag,
            boundary: defaults.boundary,
            delimiter: defaults.delimiter,
            scheme: defaults.scheme,
            zero_division: LeftOrRight::Right(defaults.zero_division),
            skip_docstart: defaults.skip_docstart,
        }
    }
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }
    pub fn o_tag<S: Into<String>>(mut self, o_tag: S) -> Self {
        self.o_tag = o_tag.into();
        self
    }
    pub fn boundary<S: Into<String>>(mut self, boundary: S) -> Self {
        self.boundary = boundary.into();
        self
    }
    pub fn delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }
    pub fn scheme(mut self, scheme: Option<SchemeType>) -> Self {
        self.scheme = scheme;
        self
    }
    pub fn division_by_zero(mut self, division_by_zero: ZeroDiv) -> Self {
        self.zero_division = LeftOrRight::Left(division_by_zero);
        self
    }
    pub fn skip_docstart(mut self, skip_docstart: bool) -> Self {
        self.skip_docstart = skip_docstart;
        self
    }
    /// Fails when raw tags are combined with a scheme.
    pub fn build(self) -> Result<EvalConfig, ConfigError> {
        if let (true, Some(scheme)) = (self.raw, self.scheme) {
            return Err(ConfigError::IncompatibleOptions(scheme));
        }
        Ok(EvalConfig {
            raw: self.raw,
            o_tag: self.o_tag,
            boundary: self.boundary,
            delimiter: self.delimiter,
            scheme: self.scheme,
            zero_division: self.zero_division.either_into(),
            skip_docstart: self.skip_docstart,
        })
    }
}
