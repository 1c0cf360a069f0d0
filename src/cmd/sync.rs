use crate::reports;
use clap::Args;
use refinery::candidates::IdFilter;
use refinery::config::Config;
use refinery::error::RfResult;
use refinery::oracle::ScoreOracle;
use refinery::process::SystemRunner;
use refinery::store::SolutionStore;
use refinery::sync::sync_from_pool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Local solution directory to update
    pub target_dir: PathBuf,

    /// Shared directory of best-known solutions
    #[arg(long)]
    pub pool: PathBuf,

    #[arg(long, default_value = "all")]
    pub ids: IdFilter,

    #[command(flatten)]
    pub config: Config,
}

pub fn run(args: &SyncArgs, config: Config) -> RfResult<()> {
    let extension = &config.refine.extension;
    let local = SolutionStore::open(&args.target_dir, extension)?;
    let pool = SolutionStore::open(&args.pool, extension)?;
    let oracle = ScoreOracle::new(Arc::new(SystemRunner), &config.oracle);

    info!(
        "🔄 Syncing {} <- {}",
        args.target_dir.display(),
        args.pool.display()
    );
    let report = sync_from_pool(&pool, &local, &oracle, &config.refine, &args.ids)?;

    reports::print_sync_report(&report);
    Ok(())
}
