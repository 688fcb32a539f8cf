//! Contiguous partitioning of the candidate list

/// Split `candidates` into exactly `units` contiguous shards of
/// `ceil(total / units)` candidates; trailing shards may be shorter or empty.
pub fn partition<T>(candidates: Vec<T>, units: usize) -> Vec<Vec<T>> {
    let units = units.max(1);
    let chunk = candidates.len().div_ceil(units);
    let mut rest = candidates.into_iter();
    (0..units)
        .map(|_| rest.by_ref().take(chunk).collect())
        .collect()
}

/// Shard sizes [`partition`] would produce for `total` candidates
pub fn shard_sizes(total: usize, units: usize) -> Vec<usize> {
    let units = units.max(1);
    let chunk = total.div_ceil(units);
    (0..units)
        .map(|i| total.saturating_sub(i * chunk).min(chunk))
        .collect()
}
