use crate::domain::strategy::scorer::StrategyAllocation;

/// Picks the top-N scored strategies above a floor and renormalizes their
/// weights to sum to 1. An empty result means the cycle is a HOLD.
pub struct PortfolioScheduler {
    pub top_n: usize,
    pub min_score: f64,
}

impl Default for PortfolioScheduler {
    fn default() -> Self {
        Self { top_n: 3, min_score: 0.45 }
    }
}

impl PortfolioScheduler {
    pub fn new(top_n: usize, min_score: f64) -> Self {
        Self { top_n, min_score }
    }

    /// `allocations` must already be sorted by score descending, as
    /// produced by [`crate::domain::strategy::scorer::score`].
    pub fn allocate(&self, allocations: &[StrategyAllocation]) -> Vec<StrategyAllocation> {
        let filtered: Vec<&StrategyAllocation> = allocations.iter().filter(|a| a.score >= self.min_score).collect();
        if filtered.is_empty() {
            return Vec::new();
        }
        let selected: Vec<StrategyAllocation> = filtered.into_iter().take(self.top_n).cloned().collect();
        let total: f64 = selected.iter().map(|a| a.score).sum();
        let total = if total == 0.0 { 1.0 } else { total };
        selected
            .into_iter()
            .map(|mut a| {
                a.weight = a.score / total;
                a
            })
            .collect()
    }
}
