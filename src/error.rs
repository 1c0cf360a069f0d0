use crate::candidates::CandidateId;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to obtain a score for one (problem, solution) pair.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("could not start score oracle: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("score oracle exited with {}", describe_code(*.0))]
    ExitStatus(Option<i32>),

    #[error("score oracle timed out after {0:?}")]
    TimedOut(Duration),

    #[error("score oracle output is not an integer: {0:?}")]
    Unparseable(String),
}

/// A single mutation attempt that produced nothing worth committing.
#[derive(Error, Debug)]
pub enum MutationFailure {
    #[error("could not start mutator: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("mutator exited with {}", describe_code(*.0))]
    ExitStatus(Option<i32>),

    #[error("mutator timed out after {0:?}")]
    TimedOut(Duration),

    #[error("mutator produced no output")]
    EmptyOutput,

    #[error("could not stage mutator output: {0}")]
    Staging(#[from] StoreError),

    #[error("mutator output could not be scored: {0}")]
    Unscorable(#[source] OracleError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("atomic replace of candidate {id} failed: {source}")]
    Persist {
        id: CandidateId,
        #[source]
        source: std::io::Error,
    },

    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

#[derive(Error, Debug)]
pub enum RefineError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("History Ledger Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Store Error: {0}")]
    Store(#[from] StoreError),

    #[error("Worker Pool Error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("no candidates found in '{}'", .0.display())]
    NoCandidates(PathBuf),
}

pub type RfResult<T> = Result<T, RefineError>;

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("status {}", c),
        None => "no status (killed by signal)".to_string(),
    }
}
