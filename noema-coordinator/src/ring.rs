//! ABOUTME: Consistent-hash ring assigning partitions to live writers (§4.F)

use noema_core::InstanceId;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const VIRTUAL_NODES_PER_WRITER: u32 = 64;

fn hash_point(input: &str) -> u64 {
    let digest = Sha256::digest(input.as_bytes());
    u64::from_be_bytes(digest[0..8].try_into().expect("sha256 digest is at least 8 bytes"))
}

/// Build a ring from `writers` and assign each of `partition_count`
/// partitions to the writer whose nearest virtual node (clockwise) owns
/// the partition's hash point. Deterministic: the same writer set and
/// partition count always produce the same assignment, so every
/// instance can recompute it without coordination once it observes the
/// writer set (e.g. via the manifest).
#[must_use]
pub fn assign_partitions(writers: &[InstanceId], partition_count: u32) -> BTreeMap<u32, InstanceId> {
    let mut assignments = BTreeMap::new();
    if writers.is_empty() || partition_count == 0 {
        return assignments;
    }

    let mut ring: Vec<(u64, &InstanceId)> = Vec::with_capacity(writers.len() as usize * VIRTUAL_NODES_PER_WRITER as usize);
    for writer in writers {
        for vnode in 0..VIRTUAL_NODES_PER_WRITER {
            let point = hash_point(&format!("{}#{vnode}", writer.0));
            ring.push((point, writer));
        }
    }
    ring.sort_by_key(|(point, _)| *point);

    for partition in 0..partition_count {
        let point = hash_point(&format!("partition-{partition}"));
        let owner = ring
            .iter()
            .find(|(p, _)| *p >= point)
            .or_else(|| ring.first())
            .map(|(_, writer)| (*writer).clone())
            .expect("ring is non-empty");
        assignments.insert(partition, owner);
    }
    assignments
}
