//! Hook for the external prediction executable.
//!
//! The executable is an opaque collaborator driven through files in a working
//! directory: for instrument `c` it reads `historique_c.csv` and writes
//! `prediction_c_init.txt` and `prediction_c_corr.txt` (one number per line).
//! Nothing here is fatal: a missing executable or input file skips the run and
//! a non-zero exit is logged.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::process::Command;

use crate::core::{HistoricalSeries, PulseError};
use crate::news::NewsBoard;
use crate::refresh::PriceService;

/// Default executable name, resolved inside the working directory.
pub const DEFAULT_PREDICTOR: &str = "mon_ia_c.exe";

/// Outcome of one [`PredictionRunner::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// The executable or its input CSV is missing.
    Skipped,
    /// The process could not be spawned or exited non-zero.
    Failed,
}

#[derive(Debug, Clone)]
pub struct PredictionRunner {
    executable: PathBuf,
    work_dir: PathBuf,
}

impl PredictionRunner {
    /// `executable` is resolved relative to `work_dir` unless absolute.
    pub fn new(executable: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        let executable = executable.into();
        let executable = if executable.is_absolute() {
            executable
        } else {
            work_dir.join(executable)
        };
        Self {
            executable,
            work_dir,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn history_csv(&self, company: &str) -> PathBuf {
        self.work_dir.join(format!("historique_{company}.csv"))
    }

    pub fn initial_output(&self, company: &str) -> PathBuf {
        self.work_dir.join(format!("prediction_{company}_init.txt"))
    }

    pub fn corrected_output(&self, company: &str) -> PathBuf {
        self.work_dir.join(format!("prediction_{company}_corr.txt"))
    }

    /// Writes the predictor's input for `company`.
    ///
    /// Header `jour,prix,score`, then one row per close: its index, the close,
    /// and `avg_score` repeated. An empty series writes nothing.
    ///
    /// # Errors
    ///
    /// CSV encoding or I/O errors creating the file.
    pub async fn export_history(
        &self,
        company: &str,
        series: &HistoricalSeries,
        avg_score: f64,
    ) -> Result<bool, PulseError> {
        if series.is_empty() {
            tracing::debug!(company, "no history to export");
            return Ok(false);
        }
        let path = self.history_csv(company);
        tokio::fs::write(&path, history_csv(series, avg_score)?).await?;
        tracing::debug!(company, path = %path.display(), rows = series.len(), "history exported");
        Ok(true)
    }

    /// Runs the executable for `company`.
    #[tracing::instrument(skip(self), fields(exe = %self.executable.display()))]
    pub async fn run(&self, company: &str) -> RunOutcome {
        let csv = self.history_csv(company);
        if !tokio::fs::try_exists(&self.executable).await.unwrap_or(false) {
            tracing::debug!("predictor executable not found");
            return RunOutcome::Skipped;
        }
        if !tokio::fs::try_exists(&csv).await.unwrap_or(false) {
            tracing::debug!(csv = %csv.display(), "history csv not found");
            return RunOutcome::Skipped;
        }

        let output = Command::new(&self.executable)
            .arg(&csv)
            .arg(self.initial_output(company))
            .arg(self.corrected_output(company))
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                tracing::info!("prediction generated");
                RunOutcome::Completed
            }
            Ok(out) => {
                tracing::error!(
                    status = %out.status,
                    stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                    "predictor failed"
                );
                RunOutcome::Failed
            }
            Err(e) => {
                tracing::error!(error = %e, "predictor could not be started");
                RunOutcome::Failed
            }
        }
    }

    /// The corrected prediction for `company`.
    ///
    /// Blank lines are ignored. A missing file, or any line that is not a
    /// number, yields an empty list.
    pub async fn read_predictions(&self, company: &str) -> Vec<f64> {
        let path = self.corrected_output(company);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "cannot read predictions");
                }
                return Vec::new();
            }
        };
        match parse_predictions(&raw) {
            Some(values) => values,
            None => {
                tracing::warn!(path = %path.display(), "malformed prediction file");
                Vec::new()
            }
        }
    }

    /// Predictions for every company in `companies`.
    pub async fn read_all<'a, I>(&self, companies: I) -> BTreeMap<String, Vec<f64>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = BTreeMap::new();
        for c in companies {
            out.insert(c.to_string(), self.read_predictions(c).await);
        }
        out
    }

    /// Exports history and runs the predictor for every instrument, in order.
    ///
    /// # Errors
    ///
    /// Local faults loading history; per-instrument export or run failures are
    /// logged and skipped.
    pub async fn run_all(&self, prices: &PriceService, board: &NewsBoard) -> Result<(), PulseError> {
        let history = prices.history().await?;
        let avg = board.average_score().await;
        for name in prices.instruments().names() {
            let Some(series) = history.get(name) else {
                continue;
            };
            match self.export_history(name, series, avg).await {
                Ok(true) => {
                    self.run(name).await;
                }
                Ok(false) => {}
                Err(e) => tracing::warn!(company = name, error = %e, "history export failed"),
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct HistoryRow {
    jour: usize,
    prix: f64,
    score: f64,
}

fn history_csv(series: &HistoricalSeries, avg_score: f64) -> Result<Vec<u8>, PulseError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(["jour", "prix", "score"])?;
    for (jour, &prix) in series.values.iter().enumerate() {
        wtr.serialize(HistoryRow {
            jour,
            prix,
            score: avg_score,
        })?;
    }
    wtr.into_inner().map_err(|e| PulseError::Io(e.into_error()))
}

fn parse_predictions(raw: &str) -> Option<Vec<f64>> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.parse::<f64>().ok())
        .collect()
}
