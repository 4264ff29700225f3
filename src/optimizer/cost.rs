//! Heuristic cost model
//!
//! cost = 1.0
//!      × penalty for each construct in the original query
//!        (join 2.0, group by 1.5, order by 1.3, distinct 1.2)
//!      × discount for each hint on the candidate
//!        (index 0.7, materialized 0.6, parallel 0.5, sort 0.4)
//!
//! Constructs are read from the submitted query, never from the hinted text.
//! Each factor applies at most once. Every discount is below 1.0, so adding
//! a hint never raises the cost.

use super::generator::{CandidatePlan, Hint};
use super::query::QueryFeatures;

pub const BASELINE_COST: f64 = 1.0;

pub const JOIN_PENALTY: f64 = 2.0;
pub const GROUP_BY_PENALTY: f64 = 1.5;
pub const ORDER_BY_PENALTY: f64 = 1.3;
pub const DISTINCT_PENALTY: f64 = 1.2;

/// Multiplicative discount for a hint
pub fn hint_discount(hint: Hint) -> f64 {
    match hint {
        Hint::Index => 0.7,
        Hint::Materialized => 0.6,
        Hint::Parallel => 0.5,
        Hint::Sort => 0.4,
    }
}

/// Pure cost function over candidate plans
#[derive(Debug, Default, Clone, Copy)]
pub struct CostEstimator;

impl CostEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Estimate a plan's cost. Never fails; unusable input scores `BASELINE_COST`.
    pub fn estimate(&self, plan: &CandidatePlan) -> f64 {
        if plan.query.trim().is_empty() {
            return BASELINE_COST;
        }

        let features = QueryFeatures::detect(&plan.query);
        let mut cost = BASELINE_COST;

        if features.has_join {
            cost *= JOIN_PENALTY;
        }
        if features.has_group_by {
            cost *= GROUP_BY_PENALTY;
        }
        if features.has_order_by {
            cost *= ORDER_BY_PENALTY;
        }
        if features.has_distinct {
            cost *= DISTINCT_PENALTY;
        }

        for hint in &plan.hints {
            cost *= hint_discount(*hint);
        }

        if cost.is_finite() && cost >= 0.0 {
            cost
        } else {
            BASELINE_COST
        }
    }

    /// Fill in `estimated_cost` on every plan
    pub fn annotate(&self, plans: &mut [CandidatePlan]) {
        for plan in plans.iter_mut() {
            plan.estimated_cost = self.estimate(plan);
        }
    }
}
