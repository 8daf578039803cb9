//! ABOUTME: Heuristic neighbor selection and overflow re-pruning (§4.D "Insert" steps 3-4)

use crate::geometry::Candidate;
use noema_core::{DistanceMetric, NounId, Result};
use noema_storage::CacheTier;

/// From `candidates` (any order), keep at most `m`, preferring ones that
/// are not "dominated" by an already-selected neighbor: a candidate is
/// admitted only if, for every neighbor already chosen, the candidate is
/// strictly closer to the query than it is to that neighbor. This is the
/// heuristic pruning rule, not plain top-`m`-by-distance — it spreads
/// edges across directions instead of clustering them around the
/// single closest existing neighbor.
pub async fn select_neighbors_heuristic(
    cache: &CacheTier,
    distance: DistanceMetric,
    candidates: &[Candidate],
    m: usize,
) -> Result<Vec<NounId>> {
    let mut ordered = candidates.to_vec();
    ordered.sort();

    let mut selected: Vec<(NounId, Vec<f32>)> = Vec::with_capacity(m);
    for candidate in ordered {
        if selected.len() >= m {
            break;
        }
        let Some(noun) = cache.get_noun(&candidate.id).await? else {
            continue;
        };
        let dominated = selected
            .iter()
            .any(|(_, selected_vec)| distance.distance(&noun.vector, selected_vec) <= candidate.distance);
        if !dominated {
            selected.push((candidate.id, noun.vector));
        }
    }
    Ok(selected.into_iter().map(|(id, _)| id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use noema_core::{Noun, Role};
    use noema_storage::cache::CacheSizing;
    use noema_storage::MemoryAdapter;
    use std::sync::Arc;

    #[tokio::test]
    async fn keeps_at_most_m_candidates() {
        let storage = Arc::new(MemoryAdapter::new());
        let cache = CacheTier::new(storage, CacheSizing::from_budget(1 << 20, Role::Hybrid, 64));
        for (id, x) in [("a", 0.0), ("b", 1.0), ("c", 2.0), ("d", 100.0)] {
            cache.put_noun(&Noun::new(NounId::from(id), vec![x])).await.unwrap();
        }
        let candidates = vec![
            Candidate::new(0.0, NounId::from("a")),
            Candidate::new(1.0, NounId::from("b")),
            Candidate::new(2.0, NounId::from("c")),
            Candidate::new(100.0, NounId::from("d")),
        ];
        let selected = select_neighbors_heuristic(&cache, DistanceMetric::Euclidean, &candidates, 2)
            .await
            .unwrap();
        assert_eq!(selected.len(), 2);
    }
}
