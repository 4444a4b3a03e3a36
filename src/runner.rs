use crate::config::Config;
use crate::errors::ExchangeError;
use crate::exchanges::{self, Exchange};
use crate::fetcher;
use crate::snapshot::SnapshotWriter;
use std::fmt;
use std::path::PathBuf;

/// What happened to one exchange during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
    Saved { rows: usize },
    /// The exchange answered but produced no rows.
    Empty,
    FetchFailed(String),
    WriteFailed(String),
}

impl ExchangeOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ExchangeOutcome::FetchFailed(_) | ExchangeOutcome::WriteFailed(_)
        )
    }
}

impl fmt::Display for ExchangeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeOutcome::Saved { rows } => write!(f, "saved {rows} rows"),
            ExchangeOutcome::Empty => write!(f, "no rows"),
            ExchangeOutcome::FetchFailed(reason) => write!(f, "fetch failed: {reason}"),
            ExchangeOutcome::WriteFailed(reason) => write!(f, "write failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub timestamp: i64,
    pub outcomes: Vec<(&'static str, ExchangeOutcome)>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }

    #[cfg(test)]
    pub fn outcome(&self, name: &str) -> Option<&ExchangeOutcome> {
        self.outcomes
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn log_summary(&self) {
        for (name, outcome) in &self.outcomes {
            if outcome.is_failure() {
                tracing::warn!(exchange = name, timestamp = self.timestamp, "[{name}] {outcome}");
            } else {
                tracing::info!(exchange = name, timestamp = self.timestamp, "[{name}] {outcome}");
            }
        }
        tracing::info!(
            "run {} finished: {} exchanges, {} failed",
            self.timestamp,
            self.outcomes.len(),
            self.failures()
        );
    }
}

struct Target {
    exchange: Box<dyn Exchange>,
    path: PathBuf,
}

/// Drives one collection pass: every exchange is fetched and saved on its
/// own, so a failure in one never stops the rest.
pub struct Runner {
    targets: Vec<Target>,
    writer: SnapshotWriter,
}

impl Runner {
    pub fn new(writer: SnapshotWriter) -> Self {
        Self {
            targets: Vec::new(),
            writer,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ExchangeError> {
        let runner = exchanges::from_config(config)?.into_iter().fold(
            Self::new(SnapshotWriter::new(config.snapshot_mode)),
            |runner, exchange| {
                let path = config.snapshot_path(exchange.protocol());
                runner.with_exchange(exchange, path)
            },
        );
        Ok(runner)
    }

    pub fn with_exchange(mut self, exchange: Box<dyn Exchange>, path: PathBuf) -> Self {
        self.targets.push(Target { exchange, path });
        self
    }

    /// Runs every exchange in order. Every row written in this pass carries
    /// `timestamp`.
    pub async fn run(&self, timestamp: i64) -> RunReport {
        let mut outcomes = Vec::with_capacity(self.targets.len());

        for target in &self.targets {
            let outcome = self.run_exchange(target, timestamp).await;
            outcomes.push((target.exchange.name(), outcome));
        }

        RunReport {
            timestamp,
            outcomes,
        }
    }

    async fn run_exchange(&self, target: &Target, timestamp: i64) -> ExchangeOutcome {
        let name = target.exchange.name();

        let rows = match fetcher::fetch_funding(target.exchange.as_ref()).await {
            Ok(rows) => rows,
            Err(e) => return ExchangeOutcome::FetchFailed(e.to_string()),
        };

        if rows.is_empty() {
            tracing::warn!("[{name}] returned no rows, nothing to save");
            return ExchangeOutcome::Empty;
        }

        match self
            .writer
            .write(&target.path, target.exchange.protocol(), &rows, timestamp)
        {
            Ok(rows) => {
                tracing::info!("[{name}] appended {rows} rows to {}", target.path.display());
                ExchangeOutcome::Saved { rows }
            }
            Err(e) => {
                tracing::error!("[{name}] failed to save {}: {e}", target.path.display());
                ExchangeOutcome::WriteFailed(e.to_string())
            }
        }
    }
}
