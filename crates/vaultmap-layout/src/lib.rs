//! vaultmap layout: deterministic force-directed placement

pub mod engine;
pub mod grid;


pub use engine::{LayoutEngine, LayoutInput, LayoutOutcome};
pub use grid::SpatialGrid;
