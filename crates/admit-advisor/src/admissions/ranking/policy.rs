use std::cmp::Ordering;

use super::super::domain::{ScoredCandidate, SubGroup};
use super::SubGroupRecommendations;

/// Tier dominates; probability breaks ties within a tier.
pub fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.tier
        .cmp(&a.tier)
        .then_with(|| b.probability.cmp(&a.probability))
}

/// Stable sort by [`compare_candidates`]; equal candidates keep catalog order.
pub fn sort_candidates(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(compare_candidates);
}

/// Tops up sub-groups that natural matches left short of `limit`.
///
/// `ranked` is the full sorted candidate list and `placed` flags which of its
/// positions already sit in a group. Unplaced candidates are handed out in rank
/// order, cycling ga → na → da and skipping groups that are already full, until
/// every group is full or candidates run out. Placed copies are marked
/// `redistributed`.
pub fn fill_underfilled_groups(
    groups: &mut SubGroupRecommendations,
    ranked: &[ScoredCandidate],
    placed: &[bool],
    limit: usize,
) -> usize {
    let cycle = SubGroup::ordered();
    let mut cursor = 0usize;
    let mut redistributed = 0usize;

    for (candidate, _) in ranked
        .iter()
        .zip(placed.iter())
        .filter(|(_, already_placed)| !**already_placed)
    {
        let Some(offset) =
            (0..cycle.len()).find(|step| groups.get(cycle[(cursor + step) % cycle.len()]).len() < limit)
        else {
            break;
        };

        let group = cycle[(cursor + offset) % cycle.len()];
        let mut copy = candidate.clone();
        copy.redistributed = true;
        groups.get_mut(group).push(copy);
        redistributed += 1;
        cursor = (cursor + offset + 1) % cycle.len();
    }

    redistributed
}
