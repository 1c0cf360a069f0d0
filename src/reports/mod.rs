mod tables;

use refinery::candidates::CandidateId;
use refinery::controller::RunSummary;
use tracing::info;

pub use self::tables::{score_report as print_score_report, sync_report as print_sync_report};

pub struct ScoreRow {
    pub id: CandidateId,
    pub score: Result<i64, String>,
    pub weight: u64,
    pub share: f64,
}

pub fn print_run_summary(summary: &RunSummary) {
    info!("=== 🏆 RUN SUMMARY ===");
    info!(
        "Rounds: {} ({} empty) | Commits: {} | Rejected: {} | Failed: {}",
        summary.rounds,
        summary.empty_rounds,
        summary.commits,
        summary.rejections,
        summary.failures
    );
}
