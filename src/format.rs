/**
Reading, writing and validating prediction output files.

Each line of an output file holds four fields, `index word gold_tag predicted_tag`, separated by a
tab. Sentences are separated by a blank line and every document starts with the sentinel line
`1 -DOCSTART- O O`.
*/
use itertools::multizip;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io::{self, BufRead, Lines, Write};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Word used by the document sentinel.
pub const DOCSTART: &str = "-DOCSTART-";

/// Exact text of the document sentinel line.
pub const SENTINEL_LINE: &str = "1\t-DOCSTART-\tO\tO";

const FIELD_COUNT: usize = 4;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("line {line}: expected 4 fields, found {found}")]
    FieldCount { line: usize, found: usize },
    #[error("line {line}: invalid token index {value:?}")]
    InvalidIndex { line: usize, value: String },
    #[error("line {line}: malformed document sentinel {text:?}, expected \"1 -DOCSTART- O O\"")]
    MalformedSentinel { line: usize, text: String },
    #[error("sentence has {words} words, {gold} gold tags and {predicted} predicted tags")]
    RaggedSentence {
        words: usize,
        gold: usize,
        predicted: usize,
    },
    #[error("unknown delimiter {0:?}, expected one of `tab`, `space` or `whitespace`")]
    UnknownDelimiter(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// How the fields of a line are separated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Delimiter {
    /// A single tab character.
    #[default]
    Tab,
    /// A single space character.
    Space,
    /// Any run of whitespace.
    Whitespace,
}

impl Delimiter {
    fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Self::Tab => line.split('\t').collect(),
            Self::Space => line.split(' ').collect(),
            Self::Whitespace => line.split_whitespace().collect(),
        }
    }
}

impl FromStr for Delimiter {
    type Err = FormatError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "\t" => return Ok(Self::Tab),
            " " => return Ok(Self::Space),
            _ => (),
        };
        match s.to_lowercase().as_str() {
            "tab" => Ok(Self::Tab),
            "space" => Ok(Self::Space),
            "whitespace" | "ws" => Ok(Self::Whitespace),
            _ => Err(FormatError::UnknownDelimiter(String::from(s))),
        }
    }
}

impl Display for Delimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Tab => "tab",
            Self::Space => "space",
            Self::Whitespace => "whitespace",
        };
        write!(f, "{}", name)
    }
}

/// One token of an output file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRecord {
    /// 1-based position of the token in its sentence.
    pub index: usize,
    pub word: String,
    pub gold: String,
    pub predicted: String,
}

/// A parsed line of an output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Record(OutputRecord),
    /// The `1 -DOCSTART- O O` sentinel.
    DocStart,
    /// Sentence boundary.
    Blank,
}

impl Line {
    /// Parses a single line. `line` is the 1-based line number used in error messages.
    pub fn parse(text: &str, line: usize, delimiter: Delimiter) -> Result<Self, FormatError> {
        if text.trim().is_empty() {
            return Ok(Line::Blank);
        }
        let fields = delimiter.split(text);
        if fields.len() != FIELD_COUNT {
            return Err(FormatError::FieldCount {
                line,
                found: fields.len(),
            });
        }
        if fields[1] == DOCSTART {
            return match (fields[0], fields[2], fields[3]) {
                ("1", "O", "O") => Ok(Line::DocStart),
                _ => Err(FormatError::MalformedSentinel {
                    line,
                    text: String::from(text),
                }),
            };
        }
        let index = fields[0]
            .parse::<usize>()
            .map_err(|_| FormatError::InvalidIndex {
                line,
                value: String::from(fields[0]),
            })?;
        Ok(Line::Record(OutputRecord {
            index,
            word: String::from(fields[1]),
            gold: String::from(fields[2]),
            predicted: String::from(fields[3]),
        }))
    }
}

/// Iterator over the parsed lines of an output file, yielding `(line_number, line)` pairs.
pub struct OutputReader<R> {
    lines: Lines<R>,
    line_number: usize,
    delimiter: Delimiter,
    boundary: Option<String>,
}

impl<R: BufRead> OutputReader<R> {
    pub fn new(reader: R, delimiter: Delimiter) -> Self {
        OutputReader {
            lines: reader.lines(),
            line_number: 0,
            delimiter,
            boundary: None,
        }
    }

    /// Lines whose first field equals `boundary` are read as sentence boundaries.
    pub fn with_boundary<S: Into<String>>(mut self, boundary: S) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    fn is_boundary(&self, text: &str) -> bool {
        match &self.boundary {
            Some(boundary) => self.delimiter.split(text).first() == Some(&boundary.as_str()),
            None => false,
        }
    }
}

impl<R: BufRead> Iterator for OutputReader<R> {
    type Item = Result<(usize, Line), FormatError>;
    fn next(&mut self) -> Option<Self::Item> {
        let text = match self.lines.next()? {
            Ok(text) => text,
            Err(e) => return Some(Err(FormatError::from(e))),
        };
        self.line_number += 1;
        if self.is_boundary(&text) {
            return Some(Ok((self.line_number, Line::Blank)));
        }
        Some(Line::parse(&text, self.line_number, self.delimiter).map(|l| (self.line_number, l)))
    }
}

/// A document of an output file: the sentences found between two sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputDocument {
    pub sentences: Vec<Vec<OutputRecord>>,
}

impl OutputDocument {
    pub fn token_count(&self) -> usize {
        self.sentences.iter().map(|s| s.len()).sum()
    }
}

/// Reads a whole output file into documents. Records found before the first sentinel form an
/// implicit first document.
pub fn read_documents<R: BufRead>(
    reader: R,
    delimiter: Delimiter,
) -> Result<Vec<OutputDocument>, FormatError> {
    read_output(OutputReader::new(reader, delimiter))
}

/// Same as `read_documents`, with the lines coming from an already configured reader, such as
/// one that knows the sentence boundary marker.
pub fn read_output<R: BufRead>(
    lines: OutputReader<R>,
) -> Result<Vec<OutputDocument>, FormatError> {
    let mut documents = Vec::new();
    let mut current: Option<OutputDocument> = None;
    let mut sentence: Vec<OutputRecord> = Vec::new();
    for item in lines {
        let (_, line) = item?;
        match line {
            Line::DocStart => {
                flush_sentence(&mut current, &mut sentence);
                if let Some(document) = current.take() {
                    documents.push(document);
                }
                current = Some(OutputDocument::default());
            }
            Line::Blank => flush_sentence(&mut current, &mut sentence),
            Line::Record(record) => sentence.push(record),
        }
    }
    flush_sentence(&mut current, &mut sentence);
    if let Some(document) = current {
        documents.push(document);
    }
    Ok(documents)
}

fn flush_sentence(current: &mut Option<OutputDocument>, sentence: &mut Vec<OutputRecord>) {
    if sentence.is_empty() {
        return;
    }
    current
        .get_or_insert_with(OutputDocument::default)
        .sentences
        .push(std::mem::take(sentence));
}

/// Counts found while validating an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormatSummary {
    pub documents: usize,
    pub sentences: usize,
    pub tokens: usize,
}

impl Display for FormatSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} documents, {} sentences, {} tokens",
            self.documents, self.sentences, self.tokens
        )
    }
}

/// Validates a whole output file. Every non-blank line must have exactly four fields and every
/// line using the `-DOCSTART-` word must be the exact sentinel.
pub fn check<R: BufRead>(reader: R, delimiter: Delimiter) -> Result<FormatSummary, FormatError> {
    check_output(OutputReader::new(reader, delimiter))
}

/// Validates the lines of an already configured reader.
pub fn check_output<R: BufRead>(lines: OutputReader<R>) -> Result<FormatSummary, FormatError> {
    let documents = read_output(lines)?;
    let summary = FormatSummary {
        documents: documents.len(),
        sentences: documents.iter().map(|d| d.sentences.len()).sum(),
        tokens: documents.iter().map(OutputDocument::token_count).sum(),
    };
    debug!(%summary, "output file is well formed");
    Ok(summary)
}

/// Writes predictions in the output file format.
pub struct OutputWriter<W: Write> {
    inner: W,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(inner: W) -> Self {
        OutputWriter { inner }
    }

    /// Writes the document sentinel followed by a blank line.
    pub fn start_document(&mut self) -> io::Result<()> {
        writeln!(self.inner, "{}", SENTINEL_LINE)?;
        writeln!(self.inner)
    }

    /// Writes one sentence with 1-based indices, followed by a blank line.
    pub fn write_sentence<S: AsRef<str>>(
        &mut self,
        words: &[S],
        gold: &[S],
        predicted: &[S],
    ) -> Result<(), FormatError> {
        if words.len() != gold.len() || words.len() != predicted.len() {
            return Err(FormatError::RaggedSentence {
                words: words.len(),
                gold: gold.len(),
                predicted: predicted.len(),
            });
        }
        for (i, (word, gold_tag, predicted_tag)) in multizip((words, gold, predicted)).enumerate()
        {
            writeln!(
                self.inner,
                "{}\t{}\t{}\t{}",
                i + 1,
                word.as_ref(),
                gold_tag.as_ref(),
                predicted_tag.as_ref()
            )?;
        }
        writeln!(self.inner)?;
        Ok(())
    }

    /// Flushes and gives back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
