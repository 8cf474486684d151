//! Force-directed layout
//!
//! Repulsion between every pair falls off with the squared distance;
//! attraction along edges grows with `ln(d / k)` and is scaled by weight.
//! Each node moves by its net force times the temperature, clamped to the
//! temperature, and the temperature decays geometrically after every pass.
//! The iteration count is fixed.
//!
//! Forces on node `i` are always summed over `j` in ascending index order, so
//! the sequential, parallel and grid-binned paths produce identical bits.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use vaultmap_core::{Graph, LayoutConfig, LayoutWarning, NodeId, Position, Result, VaultError};

use crate::grid::SpatialGrid;

/// Positions keyed by node id, plus any non-fatal warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOutcome {
    pub positions: BTreeMap<NodeId, Position>,
    pub warnings: Vec<LayoutWarning>,
    pub iterations: usize,
}

/// Graph reduced to dense indices in node id order.
#[derive(Debug, Clone, Default)]
pub struct LayoutInput {
    pub ids: Vec<NodeId>,
    /// Undirected neighbour lists with edge weight, built from directed edges.
    pub adjacency: Vec<Vec<(usize, f64)>>,
}

impl LayoutInput {
    pub fn from_graph(graph: &Graph) -> Self {
        let mut ids: Vec<NodeId> = graph.all_nodes().map(|n| n.id.clone()).collect();
        ids.sort();
        let index: BTreeMap<&NodeId, usize> = ids.iter().enumerate().map(|(i, id)| (id, i)).collect();

        let mut edges: Vec<(usize, usize, f64)> = graph
            .all_edges()
            .filter_map(|e| Some((*index.get(&e.source_id)?, *index.get(&e.target_id)?, e.weight)))
            .collect();
        edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)).then(a.2.total_cmp(&b.2)));

        Self::from_edges(ids, &edges)
    }

    pub fn from_edges(ids: Vec<NodeId>, edges: &[(usize, usize, f64)]) -> Self {
        let mut adjacency = vec![Vec::new(); ids.len()];
        for &(s, t, w) in edges {
            if s != t && s < ids.len() && t < ids.len() {
                adjacency[s].push((t, w));
                adjacency[t].push((s, w));
            }
        }
        Self { ids, adjacency }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn run(&self, graph: &Graph, cancel: &CancellationToken, on_iteration: impl FnMut(usize)) -> Result<LayoutOutcome> {
        self.run_input(&LayoutInput::from_graph(graph), cancel, on_iteration)
    }

    pub fn run_input(
        &self,
        input: &LayoutInput,
        cancel: &CancellationToken,
        mut on_iteration: impl FnMut(usize),
    ) -> Result<LayoutOutcome> {
        let cfg = &self.config;
        if cfg.grid_binning && cfg.repulsion_cutoff.is_none() {
            return Err(VaultError::Layout("grid binning requires a repulsion cutoff".to_string()));
        }

        let n = input.len();
        let mut positions = self.initial_positions(n);
        let mut warnings = Vec::new();
        let mut temperature = cfg.initial_temperature;
        let mut completed = 0;

        if n > 1 {
            let mut forces = vec![(0.0, 0.0); n];
            for iteration in 0..cfg.iterations {
                if cancel.is_cancelled() {
                    return Err(VaultError::Canceled);
                }

                self.compute_forces(input, &positions, &mut forces);
                for (p, &(fx, fy)) in positions.iter_mut().zip(&forces) {
                    let (mut dx, mut dy) = (fx * temperature, fy * temperature);
                    let len = (dx * dx + dy * dy).sqrt();
                    if len > temperature {
                        dx *= temperature / len;
                        dy *= temperature / len;
                    }
                    p.x += dx;
                    p.y += dy;
                }

                let diverged = positions.iter().filter(|p| !p.is_finite()).count();
                if diverged > 0 {
                    tracing::warn!(iteration, nodes = diverged, "layout diverged; using seeded placement");
                    warnings.push(LayoutWarning::Diverged { iteration, nodes: diverged });
                    positions = self.initial_positions(n);
                    break;
                }

                temperature *= cfg.cooling_rate;
                completed = iteration + 1;
                on_iteration(completed);
            }
            recenter(&mut positions);
        }

        Ok(LayoutOutcome {
            positions: input.ids.iter().cloned().zip(positions).collect(),
            warnings,
            iterations: completed,
        })
    }

    /// Seeded scatter over a square whose side grows with `sqrt(n)`, assigned
    /// in node id order. A single node sits at the origin.
    pub fn initial_positions(&self, n: usize) -> Vec<Position> {
        if n <= 1 {
            return vec![Position::default(); n];
        }
        let half = self.config.optimal_distance * (n as f64).sqrt() / 2.0;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        (0..n)
            .map(|_| Position::new(rng.gen_range(-half..half), rng.gen_range(-half..half)))
            .collect()
    }

    fn compute_forces(&self, input: &LayoutInput, positions: &[Position], forces: &mut [(f64, f64)]) {
        let n = positions.len();
        let parallel = n >= self.config.parallel_threshold;
        let cutoff = self.config.repulsion_cutoff;

        if let (true, Some(cutoff)) = (self.config.grid_binning, cutoff) {
            let grid = SpatialGrid::build(positions, cutoff);
            let force = |i: usize, scratch: &mut Vec<usize>| {
                grid.candidates(&positions[i], scratch);
                self.force_on(i, input, positions, scratch.iter().copied())
            };
            if parallel {
                forces
                    .par_iter_mut()
                    .enumerate()
                    .for_each_init(Vec::new, |scratch, (i, f)| *f = force(i, scratch));
            } else {
                let mut scratch = Vec::new();
                for (i, f) in forces.iter_mut().enumerate() {
                    *f = force(i, &mut scratch);
                }
            }
            return;
        }

        if parallel {
            forces
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, f)| *f = self.force_on(i, input, positions, 0..n));
        } else {
            for (i, f) in forces.iter_mut().enumerate() {
                *f = self.force_on(i, input, positions, 0..n);
            }
        }
    }

    /// Net force on node `i`. `others` must be ascending and contain every
    /// node within the repulsion cutoff.
    fn force_on(
        &self,
        i: usize,
        input: &LayoutInput,
        positions: &[Position],
        others: impl Iterator<Item = usize>,
    ) -> (f64, f64) {
        let k = self.config.optimal_distance;
        let min_d = self.config.min_distance;
        let p = positions[i];
        let (mut fx, mut fy) = (0.0, 0.0);

        for j in others {
            if j == i {
                continue;
            }
            let q = positions[j];
            let (dx, dy) = (p.x - q.x, p.y - q.y);
            let d = (dx * dx + dy * dy).sqrt();
            if self.config.repulsion_cutoff.is_some_and(|c| d > c) {
                continue;
            }
            let (ux, uy) = if d > 0.0 { (dx / d, dy / d) } else { separation_direction(i, j) };
            let clamped = d.max(min_d);
            let magnitude = (k / clamped) * (k / clamped);
            fx += ux * magnitude;
            fy += uy * magnitude;
        }

        for &(j, weight) in &input.adjacency[i] {
            let q = positions[j];
            let (dx, dy) = (q.x - p.x, q.y - p.y);
            let d = (dx * dx + dy * dy).sqrt();
            if d <= 0.0 {
                continue;
            }
            let magnitude = weight * (d.max(min_d) / k).ln();
            fx += dx / d * magnitude;
            fy += dy / d * magnitude;
        }

        (fx, fy)
    }
}

/// Unit vector pushing `i` away from a coincident `j`; opposite for `(j, i)`.
fn separation_direction(i: usize, j: usize) -> (f64, f64) {
    const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;
    let (lo, hi) = if i < j { (i, j) } else { (j, i) };
    let angle = (lo as f64 * 31.0 + hi as f64) * GOLDEN_ANGLE;
    let (s, c) = angle.sin_cos();
    if i < j { (c, s) } else { (-c, -s) }
}

fn recenter(positions: &mut [Position]) {
    if positions.is_empty() {
        return;
    }
    let n = positions.len() as f64;
    let cx = positions.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = positions.iter().map(|p| p.y).sum::<f64>() / n;
    for p in positions.iter_mut() {
        p.x -= cx;
        p.y -= cy;
    }
}
