/*!
This library scores named-entity-recognition prediction files the way the CoNLL-2003 scorer
(`conlleval`, `conll03eval.v2`) does, and keeps the results table built from those scores.

# Output files
A prediction output file holds one token per line, `index word gold_tag predicted_tag`, separated
by tabs. Sentences are separated by blank lines and every document starts with the sentinel line
`1 -DOCSTART- O O`. The `format` module reads, writes and validates these files.

# Chunking
* Lenient (the default): chunks are found by comparing each tag with the previous one, exactly
    like the CoNLL scorer. An `I-` tag following an `O` opens a chunk.
* Strict: given a `SchemeType`, entities are extracted the SeqEval way and tags that do not fit
    the scheme are rejected. The supported schemes are IOB1, IOB2, IOE1, IOE2, IOBES and BILOU.

# Terminology
* A chunk (or phrase) is a span of tokens sharing one entity type, such as `LOC` or `PER`.
* Found correct chunks are the chunks of the gold tags, found guessed chunks the ones of the
    predicted tags, and a correct chunk appears in both with the same boundaries and type.
* The report gives the token accuracy, then precision, recall and FB1 (F1) overall and per type,
    all in percent.

# Example
```rust
use nerscore::{evaluate, EvalConfig};

let output = "1\t-DOCSTART-\tO\tO

1\tEU\tB-ORG\tB-ORG
2\trejects\tO\tO
3\tGerman\tB-MISC\tB-MISC
4\tcall\tO\tB-MISC
";
let reporter = evaluate(output.as_bytes(), &EvalConfig::default()).unwrap();
let expected = "processed 5 tokens with 2 phrases; found: 3 phrases; correct: 2.
accuracy:  80.00%; precision:  66.67%; recall: 100.00%; FB1:  80.00
             MISC: precision:  50.00%; recall: 100.00%; FB1:  66.67  2
              ORG: precision: 100.00%; recall: 100.00%; FB1: 100.00  1
";
assert_eq!(reporter.to_string(), expected);
```
*/

mod chunker;
mod config;
mod datastructure;
mod entity;
mod error;
pub mod format;
mod metrics;
mod reporter;
pub mod results;
pub mod selection;

use format::{Delimiter, Line};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

// The public api starts here
pub use chunker::{
    count_lenient, count_strict, end_of_chunk, start_of_chunk, ChunkCounter, ChunkCounts,
    TypeCounts,
};

pub use config::{ConfigError, EvalConfig, EvalConfigBuilder};

pub use datastructure::Sentences;

pub use entity::{
    AutoDetectError, ConversionError, Entities, Entity, InvalidToken, ParsingError, SchemeType,
    UnknownScheme,
};

pub use error::{NerScoreError, Result};

pub use metrics::{
    f1, score, ComputationError, DivByZeroStrat, Metric, ParsingDivisionByZeroStrategyError,
};

pub use reporter::{
    Average, AverageMetrics, AverageParsingError, ClassMetrics, Reporter, ScoreParseError,
    ScoreSummary,
};

/// Counts the tokens and chunks of an output file.
///
/// Without a scheme the lines are streamed through a `ChunkCounter`. With a scheme, the gold and
/// predicted columns are collected into sentences and their entities are extracted strictly; a
/// document sentinel then forms a sentence of its own.
pub fn count_chunks<R: BufRead>(reader: R, config: &EvalConfig) -> Result<ChunkCounts> {
    let lines = config.output_reader(reader);
    match config.scheme {
        None => {
            let mut counter =
                ChunkCounter::new(config.raw, config.o_tag.as_str(), config.boundary.as_str());
            for item in lines {
                match item?.1 {
                    Line::Record(record) => counter.push_tags(&record.gold, &record.predicted),
                    Line::Blank => counter.push_boundary(),
                    Line::DocStart if config.skip_docstart => {}
                    Line::DocStart => counter.push_outside(),
                }
            }
            Ok(counter.finish())
        }
        Some(scheme) => {
            let (gold, predicted) = collect_sentences(lines, !config.skip_docstart)?;
            debug!(sentences = gold.sentence_count(), %scheme, "counting chunks strictly");
            Ok(count_strict(&gold, &predicted, scheme)?)
        }
    }
}

/// Gold and predicted columns, split into sentences.
type Columns = (Sentences<String>, Sentences<String>);

fn collect_sentences<I>(lines: I, keep_docstart: bool) -> Result<Columns>
where
    I: Iterator<Item = std::result::Result<(usize, Line), format::FormatError>>,
{
    let mut gold = Sentences::new();
    let mut predicted = Sentences::new();
    for item in lines {
        match item?.1 {
            Line::Record(record) => {
                gold.push(record.gold);
                predicted.push(record.predicted);
            }
            Line::Blank => {
                gold.close_sentence();
                predicted.close_sentence();
            }
            Line::DocStart => {
                gold.close_sentence();
                predicted.close_sentence();
                if keep_docstart {
                    gold.push(String::from("O"));
                    predicted.push(String::from("O"));
                    gold.close_sentence();
                    predicted.close_sentence();
                }
            }
        }
    }
    gold.close_sentence();
    predicted.close_sentence();
    Ok((gold, predicted))
}

/// Main entrypoint of the library. Scores an output file and returns the report, which prints
/// like the CoNLL-2003 scorer.
///
/// * `reader`: the output file, such as `std::io::stdin().lock()`
/// * `config`: options of the scorer.
pub fn evaluate<R: BufRead>(reader: R, config: &EvalConfig) -> Result<Reporter> {
    let counts = count_chunks(reader, config)?;
    debug!(
        tokens = counts.tokens,
        phrases = counts.found_correct,
        found = counts.found_guessed,
        correct = counts.correct_chunks,
        "counted chunks"
    );
    Ok(score(&counts, config.zero_division)?)
}

/// Same as `evaluate`, reading the output file at `path`.
pub fn evaluate_file<P: AsRef<Path>>(path: P, config: &EvalConfig) -> Result<Reporter> {
    let file = File::open(path.as_ref())?;
    debug!(path = %path.as_ref().display(), "evaluating output file");
    evaluate(BufReader::new(file), config)
}

/// Detects the tagging scheme of the gold column of an output file. Document sentinels are
/// ignored.
pub fn detect_scheme<R: BufRead>(reader: R, delimiter: Delimiter) -> Result<SchemeType> {
    let lines = format::OutputReader::new(reader, delimiter);
    let (gold, _) = collect_sentences(lines, false)?;
    debug!(tokens = gold.len(), "detecting the scheme of the gold tags");
    Ok(SchemeType::try_auto_detect(&gold)?)
}
