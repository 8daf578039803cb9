//! ABOUTME: Greedy 1-best descent and ef-width beam search over a single HNSW layer

use crate::geometry::Candidate;
use noema_core::{DistanceMetric, NounId, Result};
use noema_storage::CacheTier;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

/// Descend one layer from `entry`, moving to a strictly closer neighbor
/// until none exists (§4.D "Insert" step 2, "Query" step 1).
pub async fn greedy_descend(
    cache: &CacheTier,
    distance: DistanceMetric,
    query: &[f32],
    entry: Candidate,
    level: u8,
) -> Result<Candidate> {
    let mut best = entry;
    loop {
        let Some(node) = cache.get_noun(&best.id).await? else {
            return Ok(best);
        };
        let mut improved = false;
        for neighbor_id in node.neighbors_at(level) {
            let Some(neighbor) = cache.get_noun(neighbor_id).await? else {
                continue;
            };
            let d = distance.distance(query, &neighbor.vector);
            if d < best.distance {
                best = Candidate::new(d, neighbor_id.clone());
                improved = true;
            }
        }
        if !improved {
            return Ok(best);
        }
    }
}

/// Beam search of width `ef` over a single layer, seeded by `entry_points`
/// (§4.D "Insert" step 3, "Query" step 2). Unresolved neighbor ids (an
/// orphan from a crashed insert) are skipped rather than failing the
/// search (§4.D "Failure semantics").
pub async fn search_layer(
    cache: &CacheTier,
    distance: DistanceMetric,
    query: &[f32],
    entry_points: &[NounId],
    ef: usize,
    level: u8,
) -> Result<Vec<Candidate>> {
    let ef = ef.max(1);
    let mut visited: HashSet<NounId> = entry_points.iter().cloned().collect();
    let mut candidates: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
    let mut results: BinaryHeap<Candidate> = BinaryHeap::new();

    for id in entry_points {
        let Some(node) = cache.get_noun(id).await? else {
            continue;
        };
        let d = distance.distance(query, &node.vector);
        let c = Candidate::new(d, id.clone());
        candidates.push(Reverse(c.clone()));
        results.push(c);
    }
    while results.len() > ef {
        results.pop();
    }

    while let Some(Reverse(current)) = candidates.pop() {
        if results.len() >= ef {
            if let Some(worst) = results.peek() {
                if current.distance > worst.distance {
                    break;
                }
            }
        }

        let Some(node) = cache.get_noun(&current.id).await? else {
            continue;
        };
        for neighbor_id in node.neighbors_at(level) {
            if !visited.insert(neighbor_id.clone()) {
                continue;
            }
            let Some(neighbor) = cache.get_noun(neighbor_id).await? else {
                continue;
            };
            let d = distance.distance(query, &neighbor.vector);
            let worse_than_all = results.len() >= ef
                && results.peek().is_some_and(|worst| d >= worst.distance);
            if !worse_than_all {
                let c = Candidate::new(d, neighbor_id.clone());
                candidates.push(Reverse(c.clone()));
                results.push(c);
                while results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    let mut sorted = results.into_sorted_vec();
    sorted.truncate(ef);
    Ok(sorted)
}
