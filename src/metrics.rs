use crate::chunker::ChunkCounts;
use crate::reporter::{Average, AverageMetrics, ClassMetrics, Reporter};
use itertools::multizip;
use ndarray::{prelude::*, Zip};
use ndarray_stats::{errors::MultiInputError, SummaryStatisticsExt};
use num::Float;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
/// How do we handle a division by zero? The CoNLL scorer prints `0.00` for a score whose
/// denominator is zero, which is what `ReplaceBy0` does.
pub enum DivByZeroStrat {
    /// The score is `0`.
    #[default]
    ReplaceBy0,
    /// The score is `100%`. A warning is emitted.
    ReplaceBy1,
    /// Returns an error
    ReturnError,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("could not parse {0:?} into a division by zero strategy, expected `replaceby0`, `replaceby1` or `error`")]
pub struct ParsingDivisionByZeroStrategyError(pub String);

impl FromStr for DivByZeroStrat {
    type Err = ParsingDivisionByZeroStrategyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "replaceby0" | "replacebyzero" | "zero" | "0" => Ok(DivByZeroStrat::ReplaceBy0),
            "replaceby1" | "replacebyone" | "one" | "1" => Ok(DivByZeroStrat::ReplaceBy1),
            "returnerror" | "error" => Ok(DivByZeroStrat::ReturnError),
            _ => Err(ParsingDivisionByZeroStrategyError(String::from(s))),
        }
    }
}

impl Display for DivByZeroStrat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Metric {
    Precision,
    Recall,
    FScore,
}
impl Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Error, Clone)]
/// Failures that can happen while turning chunk counts into scores.
pub enum ComputationError {
    #[error("division by zero while computing the {metric} of {class}")]
    DivisionByZero { metric: Metric, class: String },
    #[error(transparent)]
    Input(#[from] MultiInputError),
}

/// Percentage `100 * numerator / denominator`, element-wise. Zero denominators are handled
/// according to `zero_division`.
///
/// * `classes`: name of each element, used in the warning and the error.
fn prf_divide(
    numerator: ArrayView1<f64>,
    denominator: ArrayView1<f64>,
    metric: Metric,
    classes: &[&str],
    zero_division: DivByZeroStrat,
) -> Result<Array1<f64>, ComputationError> {
    let zero_mask = denominator.mapv(|d| d == 0.0);
    let mut result = Zip::from(&numerator)
        .and(&denominator)
        .map_collect(|n, d| if *d == 0.0 { 0.0 } else { 100.0 * n / d });
    let Some(first_zero) = zero_mask.iter().position(|z| *z) else {
        return Ok(result);
    };
    let class = classes.get(first_zero).copied().unwrap_or("Overall");
    match zero_division {
        DivByZeroStrat::ReplaceBy0 => Ok(result),
        DivByZeroStrat::ReplaceBy1 => {
            warn!(%metric, class, "division by zero, the score is set to 100");
            Zip::from(&mut result)
                .and(&zero_mask)
                .for_each(|r, is_zero| {
                    if *is_zero {
                        *r = 100.0
                    }
                });
            Ok(result)
        }
        DivByZeroStrat::ReturnError => Err(ComputationError::DivisionByZero {
            metric,
            class: String::from(class),
        }),
    }
}

/// Harmonic mean of precision and recall, `0` when both are `0`.
pub fn f1<F: Float>(precision: F, recall: F) -> F {
    let denominator = precision + recall;
    if denominator == F::zero() {
        F::zero()
    } else {
        (F::one() + F::one()) * precision * recall / denominator
    }
}

/// Precision, recall and F1 arrays.
type Prf = (Array1<f64>, Array1<f64>, Array1<f64>);

fn precision_recall_fscore(
    correct: &Array1<f64>,
    found_guessed: &Array1<f64>,
    found_correct: &Array1<f64>,
    classes: &[&str],
    zero_division: DivByZeroStrat,
) -> Result<Prf, ComputationError> {
    let precision = prf_divide(
        correct.view(),
        found_guessed.view(),
        Metric::Precision,
        classes,
        zero_division,
    )?;
    let recall = prf_divide(
        correct.view(),
        found_correct.view(),
        Metric::Recall,
        classes,
        zero_division,
    )?;
    let fscore = Zip::from(&precision)
        .and(&recall)
        .map_collect(|p, r| f1(*p, *r));
    Ok((precision, recall, fscore))
}

/// Turns chunk counts into the full report: per type scores, the overall (micro averaged)
/// scores, the token accuracy and the macro and support weighted averages.
pub fn score(
    counts: &ChunkCounts,
    zero_division: DivByZeroStrat,
) -> Result<Reporter, ComputationError> {
    let classes: Vec<&str> = counts.per_type.keys().map(String::as_str).collect();
    let correct: Array1<f64> = counts
        .per_type
        .values()
        .map(|c| c.correct_chunks as f64)
        .collect();
    let found_guessed: Array1<f64> = counts
        .per_type
        .values()
        .map(|c| c.found_guessed as f64)
        .collect();
    let found_correct: Array1<f64> = counts
        .per_type
        .values()
        .map(|c| c.found_correct as f64)
        .collect();

    let (precision, recall, fscore) = precision_recall_fscore(
        &correct,
        &found_guessed,
        &found_correct,
        &classes,
        zero_division,
    )?;

    let (micro_p, micro_r, micro_f) = precision_recall_fscore(
        &array![counts.correct_chunks as f64],
        &array![counts.found_guessed as f64],
        &array![counts.found_correct as f64],
        &["Overall"],
        zero_division,
    )?;
    let overall = ClassMetrics {
        class: String::from("Overall"),
        precision: micro_p[0],
        recall: micro_r[0],
        fscore: micro_f[0],
        found: counts.found_guessed,
        support: counts.found_correct,
        correct: counts.correct_chunks,
    };

    let mut reporter = Reporter {
        tokens: counts.tokens,
        phrases: counts.found_correct,
        found: counts.found_guessed,
        correct: counts.correct_chunks,
        accuracy: (counts.tokens > 0)
            .then(|| 100.0 * counts.correct_tags as f64 / counts.tokens as f64),
        overall,
        ..Default::default()
    };

    for (class, p, r, f, c) in multizip((
        classes.iter(),
        precision.iter(),
        recall.iter(),
        fscore.iter(),
        counts.per_type.values(),
    )) {
        reporter.insert(ClassMetrics {
            class: String::from(*class),
            precision: *p,
            recall: *r,
            fscore: *f,
            found: c.found_guessed,
            support: c.found_correct,
            correct: c.correct_chunks,
        });
    }

    reporter.averages.push(AverageMetrics {
        average: Average::Micro,
        precision: micro_p[0],
        recall: micro_r[0],
        fscore: micro_f[0],
        support: counts.found_correct,
    });
    reporter.averages.push(AverageMetrics {
        average: Average::Macro,
        precision: precision.mean().unwrap_or(0.0),
        recall: recall.mean().unwrap_or(0.0),
        fscore: fscore.mean().unwrap_or(0.0),
        support: counts.found_correct,
    });
    reporter.averages.push(weighted_average(
        &precision,
        &recall,
        &fscore,
        &found_correct,
        zero_division,
    )?);
    Ok(reporter)
}

/// Averages weighted by the number of gold chunks of each type.
fn weighted_average(
    precision: &Array1<f64>,
    recall: &Array1<f64>,
    fscore: &Array1<f64>,
    weights: &Array1<f64>,
    zero_division: DivByZeroStrat,
) -> Result<AverageMetrics, ComputationError> {
    let support = weights.sum() as usize;
    if support == 0 {
        let value = match zero_division {
            DivByZeroStrat::ReplaceBy0 => 0.0,
            DivByZeroStrat::ReplaceBy1 => {
                warn!(average = %Average::Weighted, "no gold chunks, the scores are set to 100");
                100.0
            }
            DivByZeroStrat::ReturnError => {
                return Err(ComputationError::DivisionByZero {
                    metric: Metric::FScore,
                    class: Average::Weighted.to_string(),
                })
            }
        };
        return Ok(AverageMetrics {
            average: Average::Weighted,
            precision: value,
            recall: value,
            fscore: value,
            support,
        });
    }
    Ok(AverageMetrics {
        average: Average::Weighted,
        precision: precision.weighted_mean(weights)?,
        recall: recall.weighted_mean(weights)?,
        fscore: fscore.weighted_mean(weights)?,
        support,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::TypeCounts;
    use quickcheck::{QuickCheck, TestResult};
    use rstest::rstest;

    pub trait CloseEnough {
        fn are_close(&self, other: &Self, eps: f64) -> bool;
    }

    impl CloseEnough for ClassMetrics {
        fn are_close(&self, other: &Self, eps: f64) -> bool {
            self == other
                && (self.precision - other.precision).abs() < eps
                && (self.recall - other.recall).abs() < eps
                && (self.fscore - other.fscore).abs() < eps
                && self.found == other.found
                && self.support == other.support
        }
    }

    fn counts(
        types: &[(&str, usize, usize, usize)],
        tokens: usize,
        correct_tags: usize,
    ) -> ChunkCounts {
        let mut counts = ChunkCounts {
            tokens,
            correct_tags,
            ..Default::default()
        };
        for (name, correct_chunks, found_correct, found_guessed) in types {
            counts.correct_chunks += correct_chunks;
            counts.found_correct += found_correct;
            counts.found_guessed += found_guessed;
            counts.per_type.insert(
                String::from(*name),
                TypeCounts {
                    correct_chunks: *correct_chunks,
                    found_correct: *found_correct,
                    found_guessed: *found_guessed,
                },
            );
        }
        counts
    }

    #[test]
    fn test_prf_divide() {
        let result = prf_divide(
            array![1., 2., 0.].view(),
            array![2., 4., 0.].view(),
            Metric::Precision,
            &["A", "B", "C"],
            DivByZeroStrat::ReplaceBy0,
        )
        .unwrap();
        assert_eq!(result, array![50., 50., 0.]);
    }

    #[test]
    fn test_prf_divide_replace_by_1() {
        let result = prf_divide(
            array![1., 0.].view(),
            array![4., 0.].view(),
            Metric::Recall,
            &["A", "B"],
            DivByZeroStrat::ReplaceBy1,
        )
        .unwrap();
        assert_eq!(result, array![25., 100.]);
    }

    #[test]
    fn test_prf_divide_return_error() {
        let err = prf_divide(
            array![1., 0.].view(),
            array![4., 0.].view(),
            Metric::Recall,
            &["A", "B"],
            DivByZeroStrat::ReturnError,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ComputationError::DivisionByZero { metric: Metric::Recall, ref class } if class == "B"
        ));
    }

    #[rstest]
    #[case(50.0, 100.0, 66.666_666)]
    #[case(0.0, 0.0, 0.0)]
    #[case(100.0, 100.0, 100.0)]
    fn test_f1(#[case] precision: f64, #[case] recall: f64, #[case] expected: f64) {
        assert!((f1(precision, recall) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_score() {
        let counts = counts(
            &[
                ("LOC", 1, 1, 2),
                ("MISC", 1, 2, 2),
                ("ORG", 2, 2, 2),
                ("PER", 0, 1, 1),
            ],
            21,
            18,
        );
        let reporter = score(&counts, DivByZeroStrat::ReplaceBy0).unwrap();
        assert!((reporter.accuracy.unwrap() - 85.714_285).abs() < 1e-4);
        assert!((reporter.overall.precision - 57.142_857).abs() < 1e-4);
        assert!((reporter.overall.recall - 66.666_666).abs() < 1e-4);
        assert!((reporter.overall.fscore - 61.538_461).abs() < 1e-4);
        let expected_loc = ClassMetrics {
            class: String::from("LOC"),
            precision: 50.0,
            recall: 100.0,
            fscore: 66.666_666,
            found: 2,
            support: 1,
            correct: 1,
        };
        assert!(reporter.class("LOC").unwrap().are_close(&expected_loc, 1e-4));
        let macro_average = reporter.average(Average::Macro).unwrap();
        assert!((macro_average.precision - 50.0).abs() < 1e-9);
        let weighted = reporter.average(Average::Weighted).unwrap();
        // (1 * 100 + 2 * 50 + 2 * 100 + 1 * 0) / 6
        assert!((weighted.recall - 66.666_666).abs() < 1e-4);
        assert_eq!(weighted.support, 6);
    }

    #[test]
    fn test_score_without_tokens() {
        let reporter = score(&ChunkCounts::default(), DivByZeroStrat::ReplaceBy0).unwrap();
        assert_eq!(reporter.accuracy, None);
        assert_eq!(reporter.overall.fscore, 0.0);
        assert!(reporter.classes.is_empty());
    }

    #[test]
    fn test_score_return_error() {
        let counts = counts(&[("PER", 0, 1, 0)], 3, 2);
        let err = score(&counts, DivByZeroStrat::ReturnError).unwrap_err();
        assert!(matches!(
            err,
            ComputationError::DivisionByZero { metric: Metric::Precision, .. }
        ));
    }

    #[test]
    fn test_property_scores_are_percentages() {
        fn property(raw: Vec<(u8, u8, u8)>) -> TestResult {
            let types: Vec<(String, usize, usize, usize)> = raw
                .iter()
                .enumerate()
                .map(|(i, (a, b, c))| {
                    let correct = *a.min(b).min(c) as usize;
                    (format!("T{}", i), correct, *b as usize, *c as usize)
                })
                .collect();
            let borrowed: Vec<(&str, usize, usize, usize)> = types
                .iter()
                .map(|(n, a, b, c)| (n.as_str(), *a, *b, *c))
                .collect();
            let reporter = match score(&counts(&borrowed, 10, 5), DivByZeroStrat::ReplaceBy1) {
                Ok(r) => r,
                Err(_) => return TestResult::failed(),
            };
            let in_range = |v: f64| (0.0..=100.0 + 1e-9).contains(&v);
            let classes_ok = reporter
                .classes
                .iter()
                .all(|c| in_range(c.precision) && in_range(c.recall) && in_range(c.fscore));
            let averages_ok = reporter
                .averages
                .iter()
                .all(|a| in_range(a.precision) && in_range(a.recall) && in_range(a.fscore));
            TestResult::from_bool(classes_ok && averages_ok && reporter.averages.len() == 3)
        }
        QuickCheck::new()
            .tests(500)
            .quickcheck(property as fn(Vec<(u8, u8, u8)>) -> TestResult);
    }

    #[rstest]
    #[case("replaceby0", DivByZeroStrat::ReplaceBy0)]
    #[case("ReplaceBy1", DivByZeroStrat::ReplaceBy1)]
    #[case("error", DivByZeroStrat::ReturnError)]
    fn test_div_by_zero_from_str(#[case] input: &str, #[case] expected: DivByZeroStrat) {
        assert_eq!(input.parse::<DivByZeroStrat>().unwrap(), expected);
    }
}
