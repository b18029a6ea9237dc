/**
The results table: one F1 score per (model, split) with the document count and a link to the
prediction file it was computed from. Records are kept in a JSON Lines ledger.
*/
use crate::reporter::ScoreSummary;
use serde::{Deserialize, Serialize};
use serde_jsonlines::{append_json_lines, json_lines};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Write as FmtWrite};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Split {
    Dev,
    Test,
}

impl Split {
    /// Lowercase name, used in summary lines.
    pub fn key(&self) -> &'static str {
        match self {
            Split::Dev => "dev",
            Split::Test => "test",
        }
    }
}

impl Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown split {0:?}, expected `dev` or `test`")]
pub struct UnknownSplit(pub String);

impl FromStr for Split {
    type Err = UnknownSplit;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "valid" | "validation" => Ok(Split::Dev),
            "test" => Ok(Split::Test),
            _ => Err(UnknownSplit(String::from(s))),
        }
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("F1 score {0} is not a percentage in [0, 100]")]
    F1OutOfRange(f64),
    #[error("could not read or write the results ledger")]
    Io(#[from] io::Error),
}

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub model: String,
    pub split: Split,
    pub documents: usize,
    pub f1: f64,
    /// Prediction file the score was computed from.
    pub output: PathBuf,
}

impl RunRecord {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(
        model: S,
        split: Split,
        documents: usize,
        f1: f64,
        output: P,
    ) -> Result<Self, RecordError> {
        if !f1.is_finite() || !(0.0..=100.0).contains(&f1) {
            return Err(RecordError::F1OutOfRange(f1));
        }
        Ok(RunRecord {
            model: model.into(),
            split,
            documents,
            f1,
            output: output.into(),
        })
    }
}

/// Records keyed by (model, split). Inserting a record for an existing key replaces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTable {
    records: BTreeMap<(String, Split), RunRecord>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record previously stored under the same key, if any.
    pub fn upsert(&mut self, record: RunRecord) -> Option<RunRecord> {
        self.records
            .insert((record.model.clone(), record.split), record)
    }

    pub fn get(&self, model: &str, split: Split) -> Option<&RunRecord> {
        self.records.get(&(String::from(model), split))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunRecord> {
        self.records.values()
    }

    /// Reads a ledger. Later lines override earlier ones for the same (model, split). Records
    /// with an invalid F1 are rejected.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RecordError> {
        let mut table = ResultsTable::new();
        for record in json_lines::<RunRecord, _>(path.as_ref())? {
            let record = record?;
            let record = RunRecord::new(
                record.model,
                record.split,
                record.documents,
                record.f1,
                record.output,
            )?;
            table.upsert(record);
        }
        debug!(path = %path.as_ref().display(), records = table.len(), "loaded results ledger");
        Ok(table)
    }

    /// Appends a record to a ledger, creating the file when needed.
    pub fn append<P: AsRef<Path>>(path: P, record: &RunRecord) -> Result<(), RecordError> {
        append_json_lines(path.as_ref(), [record])?;
        info!(
            path = %path.as_ref().display(),
            model = %record.model,
            split = %record.split,
            f1 = record.f1,
            "appended run record"
        );
        Ok(())
    }

    /// Markdown table, sorted by model then split.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("| Model | Split | #Docs | F1 | Output |\n");
        out.push_str("| --- | --- | --- | --- | --- |\n");
        for r in self.iter() {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {:.2} | [{}]({}) |",
                r.model,
                r.split,
                r.documents,
                r.f1,
                r.output
                    .file_name()
                    .map(|n| n.to_string_lossy())
                    .unwrap_or_else(|| r.output.to_string_lossy()),
                r.output.display()
            );
        }
        out
    }
}

impl FromIterator<RunRecord> for ResultsTable {
    fn from_iter<T: IntoIterator<Item = RunRecord>>(iter: T) -> Self {
        let mut table = ResultsTable::new();
        for record in iter {
            table.upsert(record);
        }
        table
    }
}

/// Appends `summary` as a single line to a plain text results file, creating it when needed.
pub fn append_summary<P: AsRef<Path>>(
    path: P,
    split: Split,
    summary: &ScoreSummary,
) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;
    writeln!(file, "{}", summary.summary_line(split))?;
    info!(path = %path.as_ref().display(), %split, "appended score summary");
    Ok(())
}
