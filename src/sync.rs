//! Pulls better solutions from a shared pool into the local store.

use crate::candidates::{CandidateId, IdFilter};
use crate::config::RefineParams;
use crate::error::RfResult;
use crate::oracle::ScoreOracle;
use crate::store::SolutionStore;
use strum::{Display, IntoStaticStr};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SyncAction {
    /// Pool solution replaced the local one.
    Synced,
    /// Local solution is at least as good.
    Kept,
    /// Pool solution could not be scored or copied.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEntry {
    pub id: CandidateId,
    pub local: Option<i64>,
    pub pool: Option<i64>,
    pub action: SyncAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub entries: Vec<SyncEntry>,
    /// Sum of `local - pool` over candidates that kept their local
    /// solution: how far ahead of the pool this store is.
    pub net_delta: i64,
}

impl SyncReport {
    pub fn synced(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.action == SyncAction::Synced)
            .count()
    }
}

/// For every pool solution, replace the local candidate when the pool
/// scores strictly higher or the local candidate is missing or unscorable.
pub fn sync_from_pool(
    pool: &SolutionStore,
    local: &SolutionStore,
    oracle: &ScoreOracle,
    params: &RefineParams,
    filter: &IdFilter,
) -> RfResult<SyncReport> {
    let mut report = SyncReport::default();

    for id in pool.discover(filter)? {
        let problem = params.problem_path(id);

        let pool_score = match oracle.score(&problem, &pool.current_solution(id)) {
            Ok(s) => s,
            Err(e) => {
                warn!("⚠️  [{}] pool solution unscorable: {}", id, e);
                report.entries.push(SyncEntry {
                    id,
                    local: None,
                    pool: None,
                    action: SyncAction::Skipped,
                });
                continue;
            }
        };

        let local_score = if local.contains(id) {
            match oracle.score(&problem, &local.current_solution(id)) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!("⚠️  [{}] local solution unscorable: {}", id, e);
                    None
                }
            }
        } else {
            None
        };

        let action = match local_score {
            Some(mine) if mine >= pool_score => {
                info!("[{}] keeping local: {} >= {} (+{})", id, mine, pool_score, mine - pool_score);
                report.net_delta += mine - pool_score;
                SyncAction::Kept
            }
            _ => {
                let replaced = local
                    .stage_copy_of(id, &pool.current_solution(id))
                    .and_then(|staged| local.commit(staged));
                match replaced {
                    Ok(_) => {
                        info!(
                            "🔄 [{}] syncing: {} -> {}",
                            id,
                            local_score.map_or("-".to_string(), |s| s.to_string()),
                            pool_score
                        );
                        SyncAction::Synced
                    }
                    Err(e) => {
                        warn!("❌ [{}] could not sync: {}", id, e);
                        SyncAction::Skipped
                    }
                }
            }
        };

        report.entries.push(SyncEntry {
            id,
            local: local_score,
            pool: Some(pool_score),
            action,
        });
    }

    Ok(report)
}
