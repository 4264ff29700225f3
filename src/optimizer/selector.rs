//! Weighted-random plan selection
//!
//! Given costs c_i with maximum M:
//!
//! - benefit_i = 1 - c_i / M, in [0, 1]
//! - w_i = sqrt(1 + benefit_i), in [1, sqrt 2]
//! - p_i = w_i / sum(w)
//!
//! Lower cost always gets at least the probability of higher cost, while the
//! bounded weight range keeps every candidate in play. Degenerate cost sets
//! (all zero, non-finite, negative) fall back to a uniform draw.
//!
//! The random source is always supplied by the caller, so a fixed seed gives
//! a fixed sequence of choices.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use super::generator::CandidatePlan;

/// Stateless selector; randomness comes from the caller
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanSelector;

impl PlanSelector {
    pub fn new() -> Self {
        Self
    }

    /// Selection probabilities for `costs`, in input order
    pub fn probabilities_for_costs(&self, costs: &[f64]) -> Vec<f64> {
        if costs.is_empty() {
            return Vec::new();
        }
        let uniform = vec![1.0 / costs.len() as f64; costs.len()];

        if costs.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return uniform;
        }
        let max_cost = costs.iter().copied().fold(0.0_f64, f64::max);
        if max_cost <= 0.0 {
            return uniform;
        }

        let weights: Vec<f64> = costs
            .iter()
            .map(|c| (1.0 + (1.0 - c / max_cost)).sqrt())
            .collect();
        let total: f64 = weights.iter().sum();
        weights.into_iter().map(|w| w / total).collect()
    }

    /// Selection probabilities for `plans`, in input order
    pub fn probabilities(&self, plans: &[CandidatePlan]) -> Vec<f64> {
        let costs: Vec<f64> = plans.iter().map(|p| p.estimated_cost).collect();
        self.probabilities_for_costs(&costs)
    }

    /// Draw an index into `costs`; `None` only when `costs` is empty
    pub fn select_index<R: Rng + ?Sized>(&self, costs: &[f64], rng: &mut R) -> Option<usize> {
        if costs.is_empty() {
            return None;
        }
        let probabilities = self.probabilities_for_costs(costs);
        match WeightedIndex::new(&probabilities) {
            Ok(dist) => Some(dist.sample(rng)),
            Err(_) => Some(rng.gen_range(0..costs.len())),
        }
    }

    /// Draw one plan; `None` only when `plans` is empty
    pub fn select<'a, R: Rng + ?Sized>(
        &self,
        plans: &'a [CandidatePlan],
        rng: &mut R,
    ) -> Option<&'a CandidatePlan> {
        let costs: Vec<f64> = plans.iter().map(|p| p.estimated_cost).collect();
        self.select_index(&costs, rng).map(|i| &plans[i])
    }
}
