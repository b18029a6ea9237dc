/**
This modules prints the scores the way the CoNLL-2003 scorer prints them, so the output can be
diffed against it, and parses the summary line back.
*/
use crate::results::Split;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{Display, Write};
use std::hash::Hash;
use std::str::FromStr;
use thiserror::Error;

/// The reporter holds the overall counts, the metrics of every entity type and the averages. It
/// is built by `metrics::score`.
///
/// Its `Display` implementation reproduces the scorer's report:
///
/// ```text
/// processed 21 tokens with 6 phrases; found: 7 phrases; correct: 4.
/// accuracy:  85.71%; precision:  57.14%; recall:  66.67%; FB1:  61.54
///               LOC: precision:  50.00%; recall: 100.00%; FB1:  66.67  2
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Reporter {
    pub tokens: usize,
    /// Chunks in the gold tags.
    pub phrases: usize,
    /// Chunks in the predicted tags.
    pub found: usize,
    pub correct: usize,
    /// Token accuracy, absent when no token was processed.
    pub accuracy: Option<f64>,
    pub overall: ClassMetrics,
    pub classes: BTreeSet<ClassMetrics>,
    pub averages: Vec<AverageMetrics>,
}

impl Reporter {
    pub(crate) fn insert(&mut self, metrics: ClassMetrics) -> bool {
        self.classes.insert(metrics)
    }

    pub fn class(&self, name: &str) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.class == name)
    }

    pub fn average(&self, average: Average) -> Option<&AverageMetrics> {
        self.averages.iter().find(|a| a.average == average)
    }

    /// The four numbers of the summary line, `None` when no token was processed.
    pub fn summary(&self) -> Option<ScoreSummary> {
        Some(ScoreSummary {
            accuracy: self.accuracy?,
            precision: self.overall.precision,
            recall: self.overall.recall,
            f1: self.overall.fscore,
        })
    }

    /// The `processed ...` line, followed by the `accuracy: ...` line when tokens were scored.
    fn write_overall<W: Write>(&self, out: &mut W) -> std::fmt::Result {
        writeln!(
            out,
            "processed {} tokens with {} phrases; found: {} phrases; correct: {}.",
            self.tokens, self.phrases, self.found, self.correct
        )?;
        if let Some(accuracy) = self.accuracy {
            writeln!(
                out,
                "accuracy: {:6.2}%; precision: {:6.2}%; recall: {:6.2}%; FB1: {:6.2}",
                accuracy, self.overall.precision, self.overall.recall, self.overall.fscore
            )?;
        }
        Ok(())
    }

    /// Output of the scorer's `-l` option: the overall lines, then the LaTeX table in place of
    /// the per-type lines.
    pub fn latex_report(&self) -> String {
        let mut out = String::new();
        let _ = self.write_overall(&mut out);
        out.push_str(&self.to_latex());
        out
    }

    /// The LaTeX table printed by the scorer's `-l` option.
    pub fn to_latex(&self) -> String {
        let mut out = String::from("        & Precision &  Recall  & F$_{\\beta=1} \\\\\\hline");
        for c in self.classes.iter() {
            let _ = write!(
                out,
                "\n{:<7} &  {:6.2}\\% & {:6.2}\\% & {:6.2} \\\\",
                c.class, c.precision, c.recall, c.fscore
            );
        }
        out.push_str("\\hline\n");
        let _ = writeln!(
            out,
            "Overall &  {:6.2}\\% & {:6.2}\\% & {:6.2} \\\\\\hline",
            self.overall.precision, self.overall.recall, self.overall.fscore
        );
        out
    }
}

impl Display for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_overall(f)?;
        for c in self.classes.iter() {
            writeln!(f, "{}", c)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
/// Metrics of a single entity type. Two `ClassMetrics` are equal when they describe the same
/// type.
pub struct ClassMetrics {
    /// The type, such as "PER", "LOC", "MISC", etc.
    pub class: String,
    pub precision: f64,
    pub recall: f64,
    pub fscore: f64,
    /// Chunks of this type in the predicted tags.
    pub found: usize,
    /// Chunks of this type in the gold tags.
    pub support: usize,
    pub correct: usize,
}

impl PartialEq for ClassMetrics {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class
    }
}
impl Eq for ClassMetrics {}

impl Hash for ClassMetrics {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.class.hash(state);
    }
}

impl PartialOrd for ClassMetrics {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassMetrics {
    fn cmp(&self, other: &Self) -> Ordering {
        self.class.cmp(&other.class)
    }
}

/// One line of the per type table.
impl Display for ClassMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:>17}: precision: {:6.2}%; recall: {:6.2}%; FB1: {:6.2}  {}",
            self.class, self.precision, self.recall, self.fscore, self.found
        )
    }
}

/// Enumeration of the averages computed over the entity types. &str can be parsed to create an
/// `Average`.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Serialize, Deserialize)]
pub enum Average {
    Micro,
    Macro,
    Weighted,
}

impl Display for Average {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str_content = match self {
            Self::Micro => "Overall_Micro",
            Self::Macro => "Overall_Macro",
            Self::Weighted => "Overall_Weighted",
        };
        write!(f, "{}", str_content)
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("impossible to parse {0:?} into an average")]
pub struct AverageParsingError(pub String);

impl FromStr for Average {
    type Err = AverageParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "micro" | "overall_micro" => Ok(Average::Micro),
            "macro" | "overall_macro" => Ok(Average::Macro),
            "weighted" | "overall_weighted" => Ok(Average::Weighted),
            _ => Err(AverageParsingError(String::from(s))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AverageMetrics {
    pub average: Average,
    pub precision: f64,
    pub recall: f64,
    pub fscore: f64,
    pub support: usize,
}

impl Display for AverageMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {:.2}, {:.2}, {:.2}, {}",
            self.average, self.precision, self.recall, self.fscore, self.support
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ScoreParseError {
    #[error("no `accuracy: ...` line found in the score report")]
    MissingScoreLine,
    #[error("expected 4 `name: value` fields in {0:?}")]
    MalformedLine(String),
    #[error("invalid number {0:?} in the score report")]
    InvalidNumber(String),
}

/// The accuracy, precision, recall and F1 of the summary line, all in percent.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ScoreSummary {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ScoreSummary {
    /// The line appended to the results file, such as
    /// `dev acc: 97.50%, precision: 88.00%, recall: 87.00%, F1: 87.50%`.
    pub fn summary_line(&self, split: Split) -> String {
        format!(
            "{} acc: {:.2}%, precision: {:.2}%, recall: {:.2}%, F1: {:.2}%",
            split.key(),
            self.accuracy,
            self.precision,
            self.recall,
            self.f1
        )
    }
}

/// Parses the text printed by the scorer (or by `Reporter`'s `Display`). Only the
/// `accuracy: ...; precision: ...; recall: ...; FB1: ...` line is read.
impl FromStr for ScoreSummary {
    type Err = ScoreParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with("accuracy:"))
            .ok_or(ScoreParseError::MissingScoreLine)?;
        let values = line
            .split(';')
            .map(|field| {
                let (_, value) = field
                    .split_once(':')
                    .ok_or_else(|| ScoreParseError::MalformedLine(String::from(line)))?;
                let value = value.trim().trim_end_matches('%');
                value
                    .parse::<f64>()
                    .map_err(|_| ScoreParseError::InvalidNumber(String::from(value)))
            })
            .collect::<Result<Vec<f64>, _>>()?;
        match values.as_slice() {
            [accuracy, precision, recall, f1] => Ok(ScoreSummary {
                accuracy: *accuracy,
                precision: *precision,
                recall: *recall,
                f1: *f1,
            }),
            _ => Err(ScoreParseError::MalformedLine(String::from(line))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    fn metrics(
        class: &str,
        precision: f64,
        recall: f64,
        fscore: f64,
        found: usize,
    ) -> ClassMetrics {
        ClassMetrics {
            class: String::from(class),
            precision,
            recall,
            fscore,
            found,
            support: 1,
            correct: 1,
        }
    }

    fn build_reporter() -> Reporter {
        let mut reporter = Reporter {
            tokens: 21,
            phrases: 6,
            found: 7,
            correct: 4,
            accuracy: Some(100.0 * 18.0 / 21.0),
            overall: metrics("Overall", 400.0 / 7.0, 200.0 / 3.0, 800.0 / 13.0, 7),
            ..Default::default()
        };
        reporter.insert(metrics("PER", 0.0, 0.0, 0.0, 1));
        reporter.insert(metrics("LOC", 50.0, 100.0, 200.0 / 3.0, 2));
        reporter
    }

    #[test]
    fn test_display_matches_scorer() {
        let expected = "processed 21 tokens with 6 phrases; found: 7 phrases; correct: 4.
accuracy:  85.71%; precision:  57.14%; recall:  66.67%; FB1:  61.54
              LOC: precision:  50.00%; recall: 100.00%; FB1:  66.67  2
              PER: precision:   0.00%; recall:   0.00%; FB1:   0.00  1
";
        assert_eq!(build_reporter().to_string(), expected);
    }

    #[test]
    fn test_latex_report_keeps_overall_lines() {
        let expected = r"processed 21 tokens with 6 phrases; found: 7 phrases; correct: 4.
accuracy:  85.71%; precision:  57.14%; recall:  66.67%; FB1:  61.54
        & Precision &  Recall  & F$_{\beta=1} \\\hline
LOC     &   50.00\% & 100.00\% &  66.67 \\
PER     &    0.00\% &   0.00\% &   0.00 \\\hline
Overall &   57.14\% &  66.67\% &  61.54 \\\hline
";
        assert_eq!(build_reporter().latex_report(), expected);
    }

    #[test]
    fn test_display_without_tokens() {
        let reporter = Reporter::default();
        assert_eq!(
            reporter.to_string(),
            "processed 0 tokens with 0 phrases; found: 0 phrases; correct: 0.\n"
        );
        assert_eq!(reporter.summary(), None);
    }

    #[test]
    fn test_latex() {
        let expected = "        & Precision &  Recall  & F$_{\\beta=1} \\\\\\hline
LOC     &   50.00\\% & 100.00\\% &  66.67 \\\\
PER     &    0.00\\% &   0.00\\% &   0.00 \\\\\\hline
Overall &   57.14\\% &  66.67\\% &  61.54 \\\\\\hline
";
        assert_eq!(build_reporter().to_latex(), expected);
    }

    #[test]
    fn test_summary_round_trip_through_text() {
        let reporter = build_reporter();
        let parsed: ScoreSummary = reporter.to_string().parse().unwrap();
        assert_eq!(
            parsed,
            ScoreSummary {
                accuracy: 85.71,
                precision: 57.14,
                recall: 66.67,
                f1: 61.54
            }
        );
    }

    #[test]
    fn test_summary_line() {
        let summary = ScoreSummary {
            accuracy: 97.5,
            precision: 88.0,
            recall: 87.004,
            f1: 87.5,
        };
        assert_eq!(
            summary.summary_line(Split::Dev),
            "dev acc: 97.50%, precision: 88.00%, recall: 87.00%, F1: 87.50%"
        );
    }

    #[rstest]
    #[case("", ScoreParseError::MissingScoreLine)]
    #[case(
        "accuracy:  85.71%; precision:  57.14%",
        ScoreParseError::MalformedLine(String::from("accuracy:  85.71%; precision:  57.14%"))
    )]
    #[case(
        "accuracy:  85.71%; precision:  x%; recall: 1%; FB1: 1",
        ScoreParseError::InvalidNumber(String::from("x"))
    )]
    fn test_summary_parse_errors(#[case] input: &str, #[case] expected: ScoreParseError) {
        assert_eq!(input.parse::<ScoreSummary>().unwrap_err(), expected);
    }

    #[rstest]
    #[case("micro", Average::Micro)]
    #[case("Overall_Macro", Average::Macro)]
    #[case("WEIGHTED", Average::Weighted)]
    fn test_average_from_str(#[case] input: &str, #[case] expected: Average) {
        assert_eq!(input.parse::<Average>().unwrap(), expected);
    }

    #[test]
    fn test_classes_are_sorted_and_unique() {
        let mut reporter = build_reporter();
        assert!(!reporter.insert(metrics("LOC", 1.0, 1.0, 1.0, 1)));
        let names: Vec<&str> = reporter.classes.iter().map(|c| c.class.as_str()).collect();
        assert_eq!(names, vec!["LOC", "PER"]);
    }
}
