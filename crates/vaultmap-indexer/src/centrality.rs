//! Weighted PageRank centrality

use tokio_util::sync::CancellationToken;
use vaultmap_core::{CentralityConfig, Result, VaultError};

/// Weighted PageRank over `n` nodes and `(source, target, weight)` edges,
/// normalized by the maximum score into `[floor, 1]`.
///
/// Each iteration passes `damping` of a node's score along its out-edges in
/// proportion to weight. The rest, plus the whole score of nodes without
/// outgoing weight, is spread uniformly. Stops after `max_iterations` or once
/// the L1 change drops below `tolerance`.
pub fn weighted_pagerank(
    n: usize,
    edges: &[(usize, usize, f64)],
    config: &CentralityConfig,
    cancel: &CancellationToken,
) -> Result<Vec<f64>> {
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut out_weight = vec![0.0_f64; n];
    for &(source, _, weight) in edges {
        out_weight[source] += weight.max(0.0);
    }

    let uniform = 1.0 / n as f64;
    let mut scores = vec![uniform; n];
    let mut next = vec![0.0_f64; n];

    for iteration in 0..config.max_iterations {
        if cancel.is_cancelled() {
            return Err(VaultError::Canceled);
        }

        let dangling: f64 = scores
            .iter()
            .zip(&out_weight)
            .filter(|(_, w)| **w <= 0.0)
            .map(|(s, _)| *s)
            .sum();
        let total: f64 = scores.iter().sum();
        let base = ((1.0 - config.damping) * total + config.damping * dangling) / n as f64;
        next.fill(base);

        for &(source, target, weight) in edges {
            if out_weight[source] > 0.0 {
                next[target] += config.damping * scores[source] * weight.max(0.0) / out_weight[source];
            }
        }

        let delta: f64 = scores.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        std::mem::swap(&mut scores, &mut next);
        if delta < config.tolerance {
            tracing::trace!(iteration, delta, "centrality converged");
            break;
        }
    }

    let max = scores.iter().copied().fold(0.0_f64, f64::max);
    let floor = config.floor.clamp(0.0, 1.0);
    Ok(scores
        .into_iter()
        .map(|s| if max > 0.0 { (s / max).clamp(floor, 1.0) } else { 1.0 })
        .collect())
}
