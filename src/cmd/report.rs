use crate::reports::{self, ScoreRow};
use clap::Args;
use refinery::candidates::IdFilter;
use refinery::config::Config;
use refinery::controller;
use refinery::error::{RefineError, RfResult};
use refinery::oracle::{weight_from_score, ScoreOracle};
use refinery::process::SystemRunner;
use refinery::selector::{self, WeightMap};
use refinery::store::SolutionStore;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    pub target_dir: PathBuf,

    #[arg(long, default_value = "all")]
    pub ids: IdFilter,

    #[command(flatten)]
    pub config: Config,
}

pub fn run(args: &ReportArgs, config: Config) -> RfResult<()> {
    let store = SolutionStore::open(&args.target_dir, &config.refine.extension)?;
    let oracle = ScoreOracle::new(Arc::new(SystemRunner), &config.oracle);

    let ids = store.discover(&args.ids)?;
    if ids.is_empty() {
        return Err(RefineError::NoCandidates(args.target_dir.clone()));
    }

    let pool = controller::worker_pool(config.refine.jobs())?;
    let scores = controller::score_candidates(&pool, &oracle, &store, &config.refine, &ids);

    let weights: WeightMap = scores
        .iter()
        .map(|(id, res)| (*id, res.as_ref().map_or(0, |&s| weight_from_score(s))))
        .collect();
    let shares = selector::first_draw_shares(&weights);

    let rows: Vec<ScoreRow> = scores
        .into_iter()
        .map(|(id, res)| ScoreRow {
            id,
            weight: weights.get(&id).copied().unwrap_or(0),
            share: shares.get(&id).copied().unwrap_or(0.0),
            score: res.map_err(|e| e.to_string()),
        })
        .collect();

    reports::print_score_report(&rows, config.refine.jobs());
    Ok(())
}
