use crate::candidates::CandidateId;
use crate::error::RfResult;
use crate::mutator::WorkerReport;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub round: usize,
    pub candidate: CandidateId,
    pub weight: u64,
    pub outcome: String,
    pub detail: String,
    pub elapsed_ms: u64,
}

/// Append-only CSV log with one row per dispatched candidate.
pub struct RoundLedger {
    writer: csv::Writer<std::fs::File>,
}

impl RoundLedger {
    pub fn open<P: AsRef<Path>>(path: P) -> RfResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        let needs_header = file.metadata()?.len() == 0;

        let writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        Ok(Self { writer })
    }

    pub fn record(&mut self, round: usize, weight: u64, report: &WorkerReport) -> RfResult<()> {
        let detail = if report.outcome.is_commit() {
            String::new()
        } else {
            report.outcome.to_string()
        };
        self.writer.serialize(HistoryRow {
            round,
            candidate: report.id,
            weight,
            outcome: report.outcome.label().to_string(),
            detail,
            elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        })?;
        Ok(())
    }

    pub fn flush(&mut self) -> RfResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

pub fn read_history<P: AsRef<Path>>(path: P) -> RfResult<Vec<HistoryRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
