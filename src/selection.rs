/**
Which epoch each reported score comes from. The Dev score is the one of the final epoch, the Test
score is the one of the epoch with the best Dev F1.
*/
use crate::reporter::ScoreSummary;
use serde::{Deserialize, Serialize};
use serde_jsonlines::json_lines;
use std::fmt::{self, Display};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Scores measured at the end of one training epoch. Test is only evaluated when Dev improves,
/// hence the `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub dev: ScoreSummary,
    #[serde(default)]
    pub test: Option<ScoreSummary>,
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("the training history is empty")]
    EmptyHistory,
    #[error("epoch {epoch} follows epoch {previous}, epochs must be strictly increasing")]
    NonMonotonicEpoch { previous: usize, epoch: usize },
    #[error("epoch {0} has the best Dev F1 but no Test score")]
    MissingTest(usize),
    #[error("the Dev file comes from epoch {found}, expected the final epoch {expected}")]
    DevNotFinal { expected: usize, found: usize },
    #[error("the Test file comes from epoch {found}, expected the best Dev epoch {expected}")]
    TestNotBestDev { expected: usize, found: usize },
    #[error("could not read the training history")]
    Io(#[from] io::Error),
}

/// The pair of scores that end up in the results table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportedScores {
    pub dev_epoch: usize,
    pub dev: ScoreSummary,
    pub test_epoch: usize,
    pub test: ScoreSummary,
}

impl Display for ReportedScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Dev  (epoch {}): F1 {:.2}%",
            self.dev_epoch, self.dev.f1
        )?;
        write!(
            f,
            "Test (epoch {}): F1 {:.2}%",
            self.test_epoch, self.test.f1
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingHistory {
    epochs: Vec<EpochRecord>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the record of the next epoch.
    pub fn push(&mut self, record: EpochRecord) -> Result<(), SelectionError> {
        if let Some(previous) = self.epochs.last() {
            if record.epoch <= previous.epoch {
                return Err(SelectionError::NonMonotonicEpoch {
                    previous: previous.epoch,
                    epoch: record.epoch,
                });
            }
        }
        self.epochs.push(record);
        Ok(())
    }

    pub fn epochs(&self) -> &[EpochRecord] {
        &self.epochs
    }

    pub fn final_epoch(&self) -> Option<&EpochRecord> {
        self.epochs.last()
    }

    /// The epoch with the highest Dev F1. On ties the earliest epoch wins, since Test is only
    /// re-evaluated on a strict improvement.
    pub fn best_dev_epoch(&self) -> Option<&EpochRecord> {
        self.epochs.iter().fold(None, |best, record| match best {
            Some(b) if b.dev.f1 >= record.dev.f1 => Some(b),
            _ => Some(record),
        })
    }

    pub fn reported(&self) -> Result<ReportedScores, SelectionError> {
        let last = self.final_epoch().ok_or(SelectionError::EmptyHistory)?;
        let best = self.best_dev_epoch().ok_or(SelectionError::EmptyHistory)?;
        let test = best.test.ok_or(SelectionError::MissingTest(best.epoch))?;
        debug!(dev_epoch = last.epoch, test_epoch = best.epoch, "selected epochs");
        Ok(ReportedScores {
            dev_epoch: last.epoch,
            dev: last.dev,
            test_epoch: best.epoch,
            test,
        })
    }

    /// Checks that a Dev file captured at `dev_epoch` and a Test file captured at `test_epoch`
    /// follow the selection rule.
    pub fn check_pairing(&self, dev_epoch: usize, test_epoch: usize) -> Result<(), SelectionError> {
        let last = self.final_epoch().ok_or(SelectionError::EmptyHistory)?;
        if dev_epoch != last.epoch {
            return Err(SelectionError::DevNotFinal {
                expected: last.epoch,
                found: dev_epoch,
            });
        }
        let best = self.best_dev_epoch().ok_or(SelectionError::EmptyHistory)?;
        if test_epoch != best.epoch {
            return Err(SelectionError::TestNotBestDev {
                expected: best.epoch,
                found: test_epoch,
            });
        }
        Ok(())
    }

    /// Reads a JSON Lines history, one `EpochRecord` per line.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SelectionError> {
        let mut history = TrainingHistory::new();
        for record in json_lines::<EpochRecord, _>(path.as_ref())? {
            history.push(record?)?;
        }
        debug!(
            path = %path.as_ref().display(),
            epochs = history.epochs.len(),
            "loaded training history"
        );
        Ok(history)
    }
}

impl TryFrom<Vec<EpochRecord>> for TrainingHistory {
    type Error = SelectionError;
    fn try_from(value: Vec<EpochRecord>) -> Result<Self, Self::Error> {
        let mut history = TrainingHistory::new();
        for record in value {
            history.push(record)?;
        }
        Ok(history)
    }
}
