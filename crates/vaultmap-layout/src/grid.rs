//! Uniform grid for cutoff-bounded neighbour queries

use std::collections::HashMap;

use vaultmap_core::Position;

/// Buckets node indices by cell. With `cell_size >= cutoff`, every node within
/// `cutoff` of another lies in one of the 3x3 cells around it.
#[derive(Debug)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    pub fn build(positions: &[Position], cell_size: f64) -> Self {
        let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (i, p) in positions.iter().enumerate() {
            cells.entry(cell_of(p, cell_size)).or_default().push(i);
        }
        Self { cell_size, cells }
    }

    /// Candidate neighbours of `position`, ascending by index. Includes the
    /// node itself when it is part of the grid.
    pub fn candidates(&self, position: &Position, out: &mut Vec<usize>) {
        out.clear();
        let (cx, cy) = cell_of(position, self.cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(bucket) = self.cells.get(&(cx.saturating_add(dx), cy.saturating_add(dy))) {
                    out.extend_from_slice(bucket);
                }
            }
        }
        out.sort_unstable();
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}

fn cell_of(p: &Position, cell_size: f64) -> (i64, i64) {
    ((p.x / cell_size).floor() as i64, (p.y / cell_size).floor() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_everything_within_cell_size() {
        let positions: Vec<Position> = (0..50)
            .map(|i| Position::new((i * 37 % 101) as f64 - 50.0, (i * 53 % 97) as f64 - 48.0))
            .collect();
        let cutoff = 15.0;
        let grid = SpatialGrid::build(&positions, cutoff);
        let mut found = Vec::new();

        for (i, p) in positions.iter().enumerate() {
            grid.candidates(p, &mut found);
            assert!(found.windows(2).all(|w| w[0] < w[1]));
            assert!(found.contains(&i));
            for (j, q) in positions.iter().enumerate() {
                let d = ((p.x - q.x).powi(2) + (p.y - q.y).powi(2)).sqrt();
                if d <= cutoff {
                    assert!(found.contains(&j), "{j} within cutoff of {i} but not a candidate");
                }
            }
        }
        assert!(grid.occupied_cells() > 1);
    }
}
