use crate::candidates::CandidateId;
use crate::config::MutatorParams;
use crate::error::{MutationFailure, StoreError};
use crate::oracle::ScoreOracle;
use crate::process::{CommandRunner, Invocation, Termination};
use crate::store::{SolutionStore, StagedSolution};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum::IntoStaticStr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// What became of one dispatched candidate.
#[derive(Debug, Error, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum WorkerOutcome {
    #[error("committed")]
    Committed,

    /// Verify mode only: the mutator's output scored below the stored one.
    #[error("rejected ({candidate} < {current})")]
    Rejected { current: i64, candidate: i64 },

    #[error("mutation failed: {0}")]
    Failed(#[from] MutationFailure),

    #[error("commit failed: {0}")]
    StoreFailed(StoreError),
}

impl WorkerOutcome {
    pub fn label(&self) -> &'static str {
        self.into()
    }

    pub fn is_commit(&self) -> bool {
        matches!(self, WorkerOutcome::Committed)
    }
}

#[derive(Debug)]
pub struct WorkerReport {
    pub id: CandidateId,
    pub outcome: WorkerOutcome,
    pub elapsed: Duration,
}

/// Runs the external mutator for one candidate at a time.
///
/// The mutator gets the current solution path as its only positional
/// argument and the problem definition on stdin; whatever it prints is
/// staged and, on a clean exit, renamed over the stored solution.
#[derive(Clone)]
pub struct MutationWorker {
    runner: Arc<dyn CommandRunner>,
    store: Arc<SolutionStore>,
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    verifier: Option<ScoreOracle>,
}

impl MutationWorker {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        store: Arc<SolutionStore>,
        params: &MutatorParams,
    ) -> Self {
        Self {
            runner,
            store,
            program: params.mutator_program.clone(),
            args: params.mutator_arg.clone(),
            timeout: params.mutator_timeout_secs.map(Duration::from_secs),
            verifier: None,
        }
    }

    /// Only commit output that the oracle scores at least as high as the
    /// stored solution.
    pub fn with_verifier(mut self, oracle: ScoreOracle) -> Self {
        self.verifier = Some(oracle);
        self
    }

    /// Runs the mutator once and leaves the result staged.
    ///
    /// On failure the staging file is already gone and the stored solution
    /// has not been touched.
    pub fn mutate(&self, id: CandidateId, problem: &Path) -> Result<StagedSolution, MutationFailure> {
        let staged = self.store.stage(id)?;
        let current = self.store.current_solution(id);

        let invocation = Invocation::new(&self.program)
            .args(self.args.iter().cloned())
            .arg(current.to_string_lossy())
            .stdin_from(problem)
            .stdout_to(staged.path())
            .timeout(self.timeout);

        let result = match self.runner.run(&invocation) {
            Err(e) => Err(MutationFailure::Spawn(e)),
            Ok(output) => match output.termination {
                Termination::Exited(Some(0)) => match staged.is_empty() {
                    Ok(false) => Ok(()),
                    Ok(true) => Err(MutationFailure::EmptyOutput),
                    Err(source) => Err(MutationFailure::Staging(StoreError::Io {
                        path: staged.path().to_path_buf(),
                        source,
                    })),
                },
                Termination::Exited(code) => Err(MutationFailure::ExitStatus(code)),
                Termination::TimedOut(limit) => Err(MutationFailure::TimedOut(limit)),
            },
        };

        match result {
            Ok(()) => Ok(staged),
            Err(failure) => {
                discard(staged);
                Err(failure)
            }
        }
    }

    /// One full unit of work: mutate, optionally verify, then commit or
    /// discard. Never panics on a misbehaving mutator.
    pub fn refine(&self, id: CandidateId, problem: &Path) -> WorkerReport {
        let start = Instant::now();
        let outcome = self.refine_inner(id, problem);
        let elapsed = start.elapsed();

        match &outcome {
            WorkerOutcome::Committed => info!("✅ [{}] committed in {:.1?}", id, elapsed),
            WorkerOutcome::Rejected { .. } => info!("↩️  [{}] {}", id, outcome),
            WorkerOutcome::Failed(_) | WorkerOutcome::StoreFailed(_) => {
                warn!("❌ [{}] {}", id, outcome)
            }
        }

        WorkerReport {
            id,
            outcome,
            elapsed,
        }
    }

    fn refine_inner(&self, id: CandidateId, problem: &Path) -> WorkerOutcome {
        let staged = match self.mutate(id, problem) {
            Ok(s) => s,
            Err(failure) => return WorkerOutcome::Failed(failure),
        };

        if let Some(oracle) = &self.verifier {
            if let Some(rejection) = self.verify(oracle, id, problem, &staged) {
                discard(staged);
                return rejection;
            }
        }

        match self.store.commit(staged) {
            Ok(path) => {
                debug!("[{}] now at {}", id, path.display());
                WorkerOutcome::Committed
            }
            Err(e) => WorkerOutcome::StoreFailed(e),
        }
    }

    /// Returns the outcome to report when the staged output must not be
    /// committed, or `None` when it may go in.
    fn verify(
        &self,
        oracle: &ScoreOracle,
        id: CandidateId,
        problem: &Path,
        staged: &StagedSolution,
    ) -> Option<WorkerOutcome> {
        let candidate = match oracle.score(problem, staged.path()) {
            Ok(s) => s,
            Err(e) => {
                warn!("[{}] mutator output could not be scored: {}", id, e);
                return Some(WorkerOutcome::Failed(MutationFailure::Unscorable(e)));
            }
        };

        let current_path: PathBuf = self.store.current_solution(id);
        match oracle.score(problem, &current_path) {
            Ok(current) if candidate < current => {
                Some(WorkerOutcome::Rejected { current, candidate })
            }
            Ok(_) => None,
            Err(e) => {
                debug!("[{}] stored solution unscorable ({}); accepting output", id, e);
                None
            }
        }
    }
}

fn discard(staged: StagedSolution) {
    let id = staged.id();
    if let Err(e) = staged.discard() {
        warn!("[{}] could not remove staging file: {}", id, e);
    }
}
