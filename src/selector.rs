use crate::candidates::CandidateId;
use fastrand::Rng;
use std::collections::BTreeMap;

pub type WeightMap = BTreeMap<CandidateId, u64>;

/// Draws up to `size` distinct ids, each draw proportional to weight.
///
/// Sampling is sequential: every draw picks from the ids still in the pool
/// using their original weights, and the winner leaves the pool before the
/// next draw. Zero-weight ids never enter the pool. The pool is walked in
/// ascending id order, so a seeded `rng` gives a reproducible batch.
pub fn select_batch(weights: &WeightMap, size: usize, rng: &mut Rng) -> Vec<CandidateId> {
    let mut pool: Vec<(CandidateId, u64)> = weights
        .iter()
        .filter(|(_, w)| **w > 0)
        .map(|(&id, &w)| (id, w))
        .collect();

    let size = size.min(pool.len());
    let mut batch = Vec::with_capacity(size);

    for _ in 0..size {
        let total: u128 = pool.iter().map(|&(_, w)| w as u128).sum();
        let mut ticket = rng.u128(0..total);

        let mut chosen = pool.len() - 1;
        for (i, &(_, w)) in pool.iter().enumerate() {
            if ticket < w as u128 {
                chosen = i;
                break;
            }
            ticket -= w as u128;
        }

        let (id, _) = pool.remove(chosen);
        batch.push(id);
    }

    batch
}

/// Number of ids that can be drawn at all.
pub fn eligible_count(weights: &WeightMap) -> usize {
    weights.values().filter(|&&w| w > 0).count()
}

/// Probability that each id wins the first draw.
pub fn first_draw_shares(weights: &WeightMap) -> BTreeMap<CandidateId, f64> {
    let total: u128 = weights.values().map(|&w| w as u128).sum();
    weights
        .iter()
        .map(|(&id, &w)| {
            let share = if total == 0 {
                0.0
            } else {
                w as f64 / total as f64
            };
            (id, share)
        })
        .collect()
}
