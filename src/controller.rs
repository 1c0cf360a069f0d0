use crate::candidates::{CandidateId, IdFilter};
use crate::config::{Config, RefineParams};
use crate::error::{OracleError, RefineError, RfResult};
use crate::history::RoundLedger;
use crate::mutator::{MutationWorker, WorkerOutcome, WorkerReport};
use crate::oracle::{self, ScoreOracle};
use crate::process::CommandRunner;
use crate::selector::{self, WeightMap};
use crate::store::SolutionStore;
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum::Display;
use tracing::{debug, info, warn};

const IDLE_SLICE: Duration = Duration::from_millis(100);

/// Thread pool that bounds how many external programs run at once.
pub fn worker_pool(jobs: usize) -> RfResult<rayon::ThreadPool> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|i| format!("refine-{}", i))
        .build()?;
    Ok(pool)
}

/// Scores each id's stored solution on `pool`, in `ids` order.
pub fn score_candidates(
    pool: &rayon::ThreadPool,
    oracle: &ScoreOracle,
    store: &SolutionStore,
    params: &RefineParams,
    ids: &[CandidateId],
) -> Vec<(CandidateId, Result<i64, OracleError>)> {
    pool.install(|| {
        ids.par_iter()
            .map(|&id| {
                let score = oracle.score(&params.problem_path(id), &store.current_solution(id));
                (id, score)
            })
            .collect()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Phase {
    Scoring,
    Dispatching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RoundStatus {
    /// Workers ran for every id in the batch.
    Dispatched,
    /// No candidate had positive weight; nothing was dispatched.
    Empty,
    /// A stop was requested after scoring; nothing was dispatched.
    Interrupted,
}

#[derive(Debug)]
pub struct RoundReport {
    pub round: usize,
    pub weights: WeightMap,
    pub batch: Vec<CandidateId>,
    pub status: RoundStatus,
    pub workers: Vec<WorkerReport>,
    pub elapsed: Duration,
}

impl RoundReport {
    pub fn commits(&self) -> usize {
        self.workers.iter().filter(|w| w.outcome.is_commit()).count()
    }

    pub fn rejections(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| matches!(w.outcome, WorkerOutcome::Rejected { .. }))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.workers.len() - self.commits() - self.rejections()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub rounds: usize,
    pub empty_rounds: usize,
    pub commits: usize,
    pub rejections: usize,
    pub failures: usize,
}

impl RunSummary {
    fn absorb(&mut self, report: &RoundReport) {
        match report.status {
            RoundStatus::Interrupted => return,
            RoundStatus::Empty => self.empty_rounds += 1,
            RoundStatus::Dispatched => {}
        }
        self.rounds += 1;
        self.commits += report.commits();
        self.rejections += report.rejections();
        self.failures += report.failures();
    }
}

/// Receives every finished round.
/// Returning `false` ends the loop after that round.
pub trait RoundObserver {
    fn on_round(&self, report: &RoundReport) -> bool;
}

impl<F: Fn(&RoundReport) -> bool> RoundObserver for F {
    fn on_round(&self, report: &RoundReport) -> bool {
        self(report)
    }
}

/// Drives score → select → mutate rounds over a fixed candidate set.
pub struct RefinementLoop {
    params: RefineParams,
    store: Arc<SolutionStore>,
    oracle: ScoreOracle,
    worker: MutationWorker,
    candidates: Vec<CandidateId>,
    pool: rayon::ThreadPool,
    jobs: usize,
    rng: fastrand::Rng,
    ledger: Option<RoundLedger>,
    round: usize,
}

impl RefinementLoop {
    pub fn new(
        config: &Config,
        target_dir: &Path,
        filter: &IdFilter,
        runner: Arc<dyn CommandRunner>,
    ) -> RfResult<Self> {
        config.validate()?;
        let params = config.refine.clone();

        let store = Arc::new(SolutionStore::open(target_dir, &params.extension)?);
        let swept = store.sweep_stale();
        if swept > 0 {
            warn!("🧹 Removed {} stale staging files from {}", swept, target_dir.display());
        }

        let candidates = store.discover(filter)?;
        if candidates.is_empty() {
            return Err(RefineError::NoCandidates(target_dir.to_path_buf()));
        }
        for &id in &candidates {
            let problem = params.problem_path(id);
            if !problem.is_file() {
                warn!("⚠️  [{}] no problem definition at {}", id, problem.display());
            }
        }

        let jobs = params.jobs();
        let pool = worker_pool(jobs)?;

        let oracle = ScoreOracle::new(runner.clone(), &config.oracle);
        let mut worker = MutationWorker::new(runner, store.clone(), &config.mutator);
        if params.verify_before_commit {
            worker = worker.with_verifier(oracle.clone());
        }

        let rng = match params.seed {
            Some(s) => fastrand::Rng::with_seed(s),
            None => fastrand::Rng::new(),
        };

        let ledger = match &params.history {
            Some(path) => Some(RoundLedger::open(path)?),
            None => None,
        };

        info!(
            "🧭 {} candidates ({}) in {} | {} parallel mutators",
            candidates.len(),
            filter,
            target_dir.display(),
            jobs
        );

        Ok(Self {
            params,
            store,
            oracle,
            worker,
            candidates,
            pool,
            jobs,
            rng,
            ledger,
            round: 0,
        })
    }

    pub fn candidates(&self) -> &[CandidateId] {
        &self.candidates
    }

    pub fn store(&self) -> &SolutionStore {
        &self.store
    }

    /// Fresh weight map for every known candidate.
    pub fn score_all(&self) -> WeightMap {
        score_candidates(&self.pool, &self.oracle, &self.store, &self.params, &self.candidates)
            .into_iter()
            .map(|(id, score)| (id, oracle::weight_of(&self.store.current_solution(id), score)))
            .collect()
    }

    fn dispatch(&self, batch: &[CandidateId]) -> Vec<WorkerReport> {
        let worker = &self.worker;
        let params = &self.params;

        // One id per task so every selected candidate gets its own thread.
        self.pool.install(|| {
            batch
                .par_iter()
                .with_max_len(1)
                .map(|&id| worker.refine(id, &params.problem_path(id)))
                .collect()
        })
    }

    pub fn run_round(&mut self, stop: &AtomicBool) -> RoundReport {
        self.round += 1;
        let round = self.round;
        let start = Instant::now();

        debug!("round {} | {}", round, Phase::Scoring);
        let weights = self.score_all();
        let eligible = selector::eligible_count(&weights);
        let batch = selector::select_batch(&weights, self.jobs, &mut self.rng);

        if batch.is_empty() {
            warn!(
                "💤 Round {} | no candidate has a positive weight; skipping dispatch",
                round
            );
            return RoundReport {
                round,
                weights,
                batch,
                status: RoundStatus::Empty,
                workers: Vec::new(),
                elapsed: start.elapsed(),
            };
        }

        info!(
            "🎯 Round {} | eligible {}/{} | batch {:?}",
            round,
            eligible,
            self.candidates.len(),
            batch
        );

        if stop.load(Ordering::SeqCst) {
            info!("🛑 Round {} | stop requested before dispatch", round);
            return RoundReport {
                round,
                weights,
                batch,
                status: RoundStatus::Interrupted,
                workers: Vec::new(),
                elapsed: start.elapsed(),
            };
        }

        debug!("round {} | {}", round, Phase::Dispatching);
        let workers = self.dispatch(&batch);

        let report = RoundReport {
            round,
            weights,
            batch,
            status: RoundStatus::Dispatched,
            workers,
            elapsed: start.elapsed(),
        };
        self.record(&report);

        info!(
            "🏁 Round {} | {} committed, {} rejected, {} failed | {:.1?}",
            round,
            report.commits(),
            report.rejections(),
            report.failures(),
            report.elapsed
        );
        report
    }

    fn record(&mut self, report: &RoundReport) {
        let Some(ledger) = self.ledger.as_mut() else {
            return;
        };
        for w in &report.workers {
            let weight = report.weights.get(&w.id).copied().unwrap_or(0);
            if let Err(e) = ledger.record(report.round, weight, w) {
                warn!("could not write history row: {}", e);
            }
        }
        if let Err(e) = ledger.flush() {
            warn!("could not flush history: {}", e);
        }
    }

    /// Runs rounds until `stop` is set, the observer declines, or the
    /// configured round limit is reached. An in-flight round always finishes.
    pub fn run<O: RoundObserver>(&mut self, stop: &AtomicBool, observer: O) -> RunSummary {
        let mut summary = RunSummary::default();

        loop {
            if stop.load(Ordering::SeqCst) {
                info!("🛑 Stop requested; leaving refinement loop");
                break;
            }
            if let Some(max) = self.params.max_rounds {
                if summary.rounds >= max {
                    info!("Reached round limit ({})", max);
                    break;
                }
            }

            let report = self.run_round(stop);
            summary.absorb(&report);

            if !observer.on_round(&report) {
                break;
            }
            if report.status == RoundStatus::Empty {
                self.idle(stop);
            }
        }

        summary
    }

    fn idle(&self, stop: &AtomicBool) {
        let deadline = Instant::now() + self.params.idle_backoff();
        while !stop.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(IDLE_SLICE.min(deadline - now));
        }
    }
}
