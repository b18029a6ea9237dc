//! nerscore CLI
//!
//! Scores prediction output files like the CoNLL-2003 scorer and maintains the results table.

#![forbid(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use nerscore::format::{self, Delimiter, OutputReader};
use nerscore::results::{append_summary, ResultsTable, RunRecord, Split};
use nerscore::selection::TrainingHistory;
use nerscore::{
    detect_scheme, evaluate, DivByZeroStrat, EvalConfig, EvalConfigBuilder, Reporter, SchemeType,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// CoNLL-2003 scorer and results table for NER prediction files
#[derive(Parser, Debug)]
#[command(name = "nerscore", author, version, about, long_about = None)]
struct Cli {
    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score an output file (stdin when no file is given) and print the report
    Eval(EvalArgs),
    /// Validate the format of output files
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Field separator: tab, space or whitespace
        #[arg(short, long, default_value_t = Delimiter::Tab)]
        delimiter: Delimiter,
        /// First field marking a sentence boundary
        #[arg(short, long, default_value = "-X-")]
        boundary: String,
    },
    /// Detect the tagging scheme of the gold column
    Detect {
        file: PathBuf,
        /// Field separator: tab, space or whitespace
        #[arg(short, long, default_value_t = Delimiter::Tab)]
        delimiter: Delimiter,
    },
    /// Score an output file and append the result to the ledger
    Record(RecordArgs),
    /// Print the results table in markdown
    Table {
        /// JSON Lines results ledger
        #[arg(long)]
        ledger: PathBuf,
    },
    /// Print the Dev and Test scores selected from a training history
    Select {
        /// JSON Lines training history, one epoch per line
        #[arg(long)]
        history: PathBuf,
        /// Epoch the Dev file was captured at
        #[arg(long, requires = "test_epoch")]
        dev_epoch: Option<usize>,
        /// Epoch the Test file was captured at
        #[arg(long, requires = "dev_epoch")]
        test_epoch: Option<usize>,
    },
}

#[derive(Args, Debug)]
struct EvalArgs {
    /// Output file, defaults to stdin
    file: Option<PathBuf>,
    #[command(flatten)]
    scoring: ScoringArgs,
    /// Print the LaTeX table in place of the per-type lines
    #[arg(short = 'l', long, conflicts_with = "json")]
    latex: bool,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
    /// Append the summary line to this results file
    #[arg(long, requires = "split")]
    result_file: Option<PathBuf>,
    /// Split named in the summary line
    #[arg(long)]
    split: Option<Split>,
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// JSON Lines results ledger
    #[arg(long)]
    ledger: PathBuf,
    #[arg(long)]
    model: String,
    #[arg(long)]
    split: Split,
    file: PathBuf,
    #[command(flatten)]
    scoring: ScoringArgs,
}

/// Options of the scorer.
#[derive(Args, Debug)]
struct ScoringArgs {
    /// Tags carry no prefix
    #[arg(short, long)]
    raw: bool,
    /// Outside tag used with --raw
    #[arg(short, long, default_value = "O")]
    o_tag: String,
    /// First field marking a sentence boundary
    #[arg(short, long, default_value = "-X-")]
    boundary: String,
    /// Field separator: tab, space or whitespace
    #[arg(short, long, default_value_t = Delimiter::Tab)]
    delimiter: Delimiter,
    /// Extract entities strictly with this scheme instead of the lenient chunking
    #[arg(long)]
    scheme: Option<SchemeType>,
    /// What to do on a division by zero: replaceby0, replaceby1 or error
    #[arg(long, default_value_t = DivByZeroStrat::ReplaceBy0)]
    zero_division: DivByZeroStrat,
    /// Do not score the -DOCSTART- sentinels
    #[arg(long)]
    skip_docstart: bool,
}

impl ScoringArgs {
    fn config(&self) -> Result<EvalConfig> {
        let config = EvalConfigBuilder::default()
            .raw(self.raw)
            .o_tag(self.o_tag.as_str())
            .boundary(self.boundary.as_str())
            .delimiter(self.delimiter)
            .scheme(self.scheme)
            .division_by_zero(self.zero_division)
            .skip_docstart(self.skip_docstart)
            .build()?;
        debug!(%config, "scorer configuration");
        Ok(config)
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn score_file(path: &Path, config: &EvalConfig) -> Result<Reporter> {
    evaluate(open(path)?, config).with_context(|| format!("failed to score {}", path.display()))
}

fn run_eval<R: BufRead, W: Write>(args: &EvalArgs, stdin: R, out: &mut W) -> Result<()> {
    let config = args.scoring.config()?;
    let reporter = match &args.file {
        Some(path) => score_file(path, &config)?,
        None => evaluate(stdin, &config).context("failed to score stdin")?,
    };
    if args.latex {
        write!(out, "{}", reporter.latex_report())?;
    } else if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&reporter)?)?;
    } else {
        write!(out, "{}", reporter)?;
    }
    if let (Some(path), Some(split)) = (&args.result_file, args.split) {
        let Some(summary) = reporter.summary() else {
            bail!("no token was scored, there is no summary to append");
        };
        append_summary(path, split, &summary)
            .with_context(|| format!("failed to append to {}", path.display()))?;
    }
    Ok(())
}

fn run_check<W: Write>(
    files: &[PathBuf],
    delimiter: Delimiter,
    boundary: &str,
    out: &mut W,
) -> Result<()> {
    for path in files {
        let lines = OutputReader::new(open(path)?, delimiter).with_boundary(boundary);
        let summary = format::check_output(lines)
            .with_context(|| format!("{} is not a valid output file", path.display()))?;
        writeln!(out, "{}: {}", path.display(), summary)?;
    }
    Ok(())
}

fn run_record<W: Write>(args: &RecordArgs, out: &mut W) -> Result<()> {
    let config = args.scoring.config()?;
    let file = args.file.as_path();
    // Same reader as the scorer, so both accept the same files.
    let documents = format::check_output(config.output_reader(open(file)?))
        .with_context(|| format!("{} is not a valid output file", file.display()))?
        .documents;
    let reporter = score_file(file, &config)?;
    let record = RunRecord::new(
        args.model.as_str(),
        args.split,
        documents,
        reporter.overall.fscore,
        file,
    )?;
    ResultsTable::append(&args.ledger, &record)
        .with_context(|| format!("failed to append to {}", args.ledger.display()))?;
    writeln!(
        out,
        "{} {}: {} documents, F1 {:.2}",
        record.model, record.split, record.documents, record.f1
    )?;
    Ok(())
}

fn run_table<W: Write>(ledger: &Path, out: &mut W) -> Result<()> {
    let table = ResultsTable::load(ledger)
        .with_context(|| format!("failed to load {}", ledger.display()))?;
    info!(records = table.len(), "loaded results table");
    write!(out, "{}", table.to_markdown())?;
    Ok(())
}

fn run_select<W: Write>(
    history: &Path,
    dev_epoch: Option<usize>,
    test_epoch: Option<usize>,
    out: &mut W,
) -> Result<()> {
    let history = TrainingHistory::load(history)
        .with_context(|| format!("failed to load {}", history.display()))?;
    let reported = history.reported()?;
    writeln!(out, "{}", reported)?;
    if let (Some(dev_epoch), Some(test_epoch)) = (dev_epoch, test_epoch) {
        history.check_pairing(dev_epoch, test_epoch)?;
        writeln!(
            out,
            "Dev epoch {dev_epoch} and Test epoch {test_epoch} follow the selection rule"
        )?;
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut out = io::stdout().lock();
    match cli.command {
        Command::Eval(args) => run_eval(&args, io::stdin().lock(), &mut out),
        Command::Check {
            files,
            delimiter,
            boundary,
        } => run_check(&files, delimiter, &boundary, &mut out),
        Command::Detect { file, delimiter } => {
            let scheme = detect_scheme(open(&file)?, delimiter)
                .with_context(|| format!("failed to detect the scheme of {}", file.display()))?;
            writeln!(out, "{}", scheme)?;
            Ok(())
        }
        Command::Record(args) => run_record(&args, &mut out),
        Command::Table { ledger } => run_table(&ledger, &mut out),
        Command::Select {
            history,
            dev_epoch,
            test_epoch,
        } => run_select(&history, dev_epoch, test_epoch, &mut out),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;
    use nerscore::selection::EpochRecord;
    use nerscore::ScoreSummary;
    use serde_jsonlines::write_json_lines;
    use std::fs;
    use tempfile::tempdir;

    const OUTPUT: &str = "tests/data/output.txt";

    const EXPECTED_REPORT: &str = "processed 21 tokens with 6 phrases; found: 7 phrases; correct: 4.
accuracy:  85.71%; precision:  57.14%; recall:  66.67%; FB1:  61.54
              LOC: precision:  50.00%; recall: 100.00%; FB1:  66.67  2
             MISC: precision:  50.00%; recall:  50.00%; FB1:  50.00  2
              ORG: precision: 100.00%; recall: 100.00%; FB1: 100.00  2
              PER: precision:   0.00%; recall:   0.00%; FB1:   0.00  1
";

    const BOUNDARY_OUTPUT: &str = "1\tEU\tB-ORG\tB-ORG\n-X-\t-X-\tO\tO\n1\tParis\tB-LOC\tB-LOC\n";

    fn parse(args: &[&str]) -> Command {
        let mut argv = vec!["nerscore"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    fn eval_args(args: &[&str]) -> EvalArgs {
        let mut argv = vec!["eval"];
        argv.extend_from_slice(args);
        let Command::Eval(args) = parse(&argv) else {
            panic!("expected the eval command");
        };
        args
    }

    fn record_args(args: &[&str]) -> RecordArgs {
        let mut argv = vec!["record"];
        argv.extend_from_slice(args);
        let Command::Record(args) = parse(&argv) else {
            panic!("expected the record command");
        };
        args
    }

    fn summary(f1: f64) -> ScoreSummary {
        ScoreSummary {
            accuracy: 95.0,
            precision: f1,
            recall: f1,
            f1,
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_eval_flags() {
        let args = eval_args(&["-r", "-o", "NONE", "-d", "space", "--zero-division", "error"]);
        assert!(args.file.is_none());
        let config = args.scoring.config().unwrap();
        assert!(config.raw);
        assert_eq!(config.o_tag, "NONE");
        assert_eq!(config.delimiter, Delimiter::Space);
        assert_eq!(config.zero_division, DivByZeroStrat::ReturnError);
    }

    #[test]
    fn test_raw_with_scheme_fails() {
        let args = eval_args(&["-r", "--scheme", "IOB2", "out.txt"]);
        assert!(args.scoring.config().is_err());
    }

    #[test]
    fn test_result_file_requires_split() {
        assert!(Cli::try_parse_from(["nerscore", "eval", "--result-file", "r.txt"]).is_err());
    }

    #[test]
    fn test_eval_file() {
        let mut out = Vec::new();
        run_eval(&eval_args(&[OUTPUT]), io::empty(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), EXPECTED_REPORT);
    }

    #[test]
    fn test_eval_latex_keeps_overall_lines() {
        let mut out = Vec::new();
        run_eval(&eval_args(&["-l", OUTPUT]), io::empty(), &mut out).unwrap();
        let expected = r"processed 21 tokens with 6 phrases; found: 7 phrases; correct: 4.
accuracy:  85.71%; precision:  57.14%; recall:  66.67%; FB1:  61.54
        & Precision &  Recall  & F$_{\beta=1} \\\hline
LOC     &   50.00\% & 100.00\% &  66.67 \\
MISC    &   50.00\% &  50.00\% &  50.00 \\
ORG     &  100.00\% & 100.00\% & 100.00 \\
PER     &    0.00\% &   0.00\% &   0.00 \\\hline
Overall &   57.14\% &  66.67\% &  61.54 \\\hline
";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_eval_stdin_appends_summary() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("results.txt");
        let results_arg = results.to_str().unwrap();
        let stdin = fs::read(OUTPUT).unwrap();
        let args = eval_args(&["--result-file", results_arg, "--split", "test"]);

        let mut out = Vec::new();
        run_eval(&args, stdin.as_slice(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), EXPECTED_REPORT);
        run_eval(&args, stdin.as_slice(), &mut Vec::new()).unwrap();

        let line = "test acc: 85.71%, precision: 57.14%, recall: 66.67%, F1: 61.54%\n";
        assert_eq!(fs::read_to_string(&results).unwrap(), line.repeat(2));
    }

    #[test]
    fn test_eval_empty_stdin_has_no_summary() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("results.txt");
        let args = eval_args(&["--result-file", results.to_str().unwrap(), "--split", "dev"]);
        assert!(run_eval(&args, io::empty(), &mut Vec::new()).is_err());
        assert!(!results.exists());
    }

    #[test]
    fn test_check_honours_boundary() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("boundary.txt");
        fs::write(&file, BOUNDARY_OUTPUT).unwrap();

        let mut out = Vec::new();
        run_check(&[file.clone()], Delimiter::Tab, "-X-", &mut out).unwrap();
        let expected = format!("{}: 1 documents, 2 sentences, 2 tokens\n", file.display());
        assert_eq!(String::from_utf8(out).unwrap(), expected);

        assert!(run_check(&[file], Delimiter::Tab, "-B-", &mut Vec::new()).is_err());
    }

    #[test]
    fn test_record_then_table() {
        let dir = tempdir().unwrap();
        let ledger = dir.path().join("results.jsonl");
        let file = dir.path().join("boundary.txt");
        fs::write(&file, BOUNDARY_OUTPUT).unwrap();
        let ledger_arg = ledger.to_str().unwrap();
        let file_arg = file.to_str().unwrap();

        let mut out = Vec::new();
        let args = record_args(&[
            "--ledger", ledger_arg, "--model", "SeqIE", "--split", "dev", file_arg,
        ]);
        run_record(&args, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "SeqIE Dev: 1 documents, F1 100.00\n"
        );

        let args = record_args(&[
            "--ledger", ledger_arg, "--model", "GraphIE", "--split", "test", OUTPUT,
        ]);
        run_record(&args, &mut Vec::new()).unwrap();

        let mut out = Vec::new();
        run_table(&ledger, &mut out).unwrap();
        let expected = format!(
            "| Model | Split | #Docs | F1 | Output |
| --- | --- | --- | --- | --- |
| GraphIE | Test | 2 | 61.54 | [output.txt]({OUTPUT}) |
| SeqIE | Dev | 1 | 100.00 | [boundary.txt]({}) |
",
            file.display()
        );
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_record_rejects_invalid_file() {
        let dir = tempdir().unwrap();
        let ledger = dir.path().join("results.jsonl");
        let file = dir.path().join("bad.txt");
        fs::write(&file, "1\tEU\tB-ORG\n").unwrap();
        let args = record_args(&[
            "--ledger",
            ledger.to_str().unwrap(),
            "--model",
            "SeqIE",
            "--split",
            "dev",
            file.to_str().unwrap(),
        ]);
        assert!(run_record(&args, &mut Vec::new()).is_err());
        assert!(!ledger.exists());
    }

    #[test]
    fn test_select() {
        let dir = tempdir().unwrap();
        let history = dir.path().join("history.jsonl");
        let epochs = [
            EpochRecord {
                epoch: 1,
                dev: summary(80.0),
                test: Some(summary(78.0)),
            },
            EpochRecord {
                epoch: 2,
                dev: summary(85.0),
                test: Some(summary(84.0)),
            },
            EpochRecord {
                epoch: 3,
                dev: summary(83.0),
                test: None,
            },
        ];
        write_json_lines(&history, &epochs).unwrap();

        let mut out = Vec::new();
        run_select(&history, Some(3), Some(2), &mut out).unwrap();
        let expected = "Dev  (epoch 3): F1 83.00%
Test (epoch 2): F1 84.00%
Dev epoch 3 and Test epoch 2 follow the selection rule
";
        assert_eq!(String::from_utf8(out).unwrap(), expected);

        assert!(run_select(&history, Some(3), Some(3), &mut Vec::new()).is_err());
        assert!(run_select(&history, Some(2), Some(2), &mut Vec::new()).is_err());
    }
}
