//! Run progress reporting

use serde::Serialize;

/// Pipeline stage a run is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Queued,
    ReadingFiles,
    Parsing,
    Building,
    Layout,
    Caching,
    Finished,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunProgress {
    pub stage: Stage,
    pub documents_total: usize,
    pub documents_processed: usize,
    pub layout_iterations: usize,
    pub layout_iterations_total: usize,
}

impl RunProgress {
    /// Rough completion in `[0, 1]`; parsing and layout weigh equally.
    pub fn fraction(&self) -> f64 {
        let ratio = |done: usize, total: usize| if total == 0 { 1.0 } else { done as f64 / total as f64 };
        match self.stage {
            Stage::Queued | Stage::ReadingFiles => 0.0,
            Stage::Parsing => 0.5 * ratio(self.documents_processed, self.documents_total),
            Stage::Building => 0.5,
            Stage::Layout => 0.5 + 0.5 * ratio(self.layout_iterations, self.layout_iterations_total),
            Stage::Caching | Stage::Finished => 1.0,
        }
    }
}

/// Layout progress is published about this many times per run.
pub const LAYOUT_PROGRESS_UPDATES: usize = 100;

/// Whether iteration `done` of `total` should be published.
pub(crate) fn layout_update_due(done: usize, total: usize) -> bool {
    let step = (total / LAYOUT_PROGRESS_UPDATES).max(1);
    done % step == 0 || done == total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_by_stage() {
        let mut progress = RunProgress::default();
        assert_eq!(progress.fraction(), 0.0);

        progress.stage = Stage::Parsing;
        progress.documents_total = 4;
        progress.documents_processed = 2;
        assert_eq!(progress.fraction(), 0.25);

        progress.stage = Stage::Layout;
        progress.layout_iterations_total = 10;
        progress.layout_iterations = 10;
        assert_eq!(progress.fraction(), 1.0);
    }

    #[test]
    fn layout_updates_are_throttled() {
        let published: Vec<usize> = (1..=1000).filter(|&i| layout_update_due(i, 1000)).collect();
        assert_eq!(published.len(), LAYOUT_PROGRESS_UPDATES);
        assert_eq!(published.first(), Some(&10));
        assert_eq!(published.last(), Some(&1000));

        let uneven = (1..=1055).filter(|&i| layout_update_due(i, 1055)).count();
        assert_eq!(uneven, 106);
        assert!((1..=40).all(|i| layout_update_due(i, 40)));
    }
}
