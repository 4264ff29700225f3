//! Candidate plan generation
//!
//! Rules, applied in this order for every query:
//!
//! 1. Base plan (no hints)
//! 2. Index-hinted variant
//! 3. Materialized-view variant, only if the query joins
//! 4. Parallel-execution variant
//! 5. Specialized-sort variant, only if the query has `ORDER BY`
//!
//! Hints are optimizer-hint comments and never change what a query returns.
//! Index, materialized and parallel share one block right after the first
//! `SELECT`; the sort hint sits right after the first `ORDER BY`. Plan text is
//! always re-rendered from the original query and the hint set, so applying a
//! hint twice is a no-op.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::query::{order_by_anchor, select_anchor, QueryFeatures};

/// Advisory hint attached to a candidate plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hint {
    Index,
    Materialized,
    Parallel,
    Sort,
}

impl Hint {
    /// Marker keyword inside the hint comment
    pub fn marker(&self) -> &'static str {
        match self {
            Hint::Index => "INDEX",
            Hint::Materialized => "MATERIALIZED",
            Hint::Parallel => "PARALLEL",
            Hint::Sort => "SORT",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Hint::Index => "index",
            Hint::Materialized => "materialized",
            Hint::Parallel => "parallel",
            Hint::Sort => "sort",
        }
    }

    /// Whether the marker belongs in the block after `SELECT`
    fn is_select_scoped(&self) -> bool {
        !matches!(self, Hint::Sort)
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One advisory-annotated rewrite of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePlan {
    /// Position in the generated list
    pub id: usize,
    /// Query text as submitted
    pub query: String,
    /// Tables the query references
    pub tables: Vec<String>,
    /// Hints in canonical order
    pub hints: BTreeSet<Hint>,
    /// Query text with hint markers applied
    pub text: String,
    /// Heuristic cost; zero until estimated
    pub estimated_cost: f64,
}

impl CandidatePlan {
    /// Plan with no hints
    pub fn base(id: usize, query: &str, tables: &[String]) -> Self {
        Self {
            id,
            query: query.to_string(),
            tables: tables.to_vec(),
            hints: BTreeSet::new(),
            text: query.to_string(),
            estimated_cost: 0.0,
        }
    }

    /// Copy of this plan with `hint` added (no-op if already present)
    pub fn with_hint(mut self, hint: Hint) -> Self {
        self.add_hint(hint);
        self
    }

    /// Add a hint in place and re-render the text
    pub fn add_hint(&mut self, hint: Hint) {
        if self.hints.insert(hint) {
            self.text = render(&self.query, &self.hints);
        }
    }

    pub fn has_hint(&self, hint: Hint) -> bool {
        self.hints.contains(&hint)
    }

    /// Strategy label: `base`, `index`, `index+parallel`, ...
    pub fn strategy_name(&self) -> String {
        if self.hints.is_empty() {
            return "base".to_string();
        }
        self.hints
            .iter()
            .map(Hint::as_str)
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Whether any table is shared with `other`
    pub fn shares_table_with(&self, other: &CandidatePlan) -> bool {
        self.tables.iter().any(|t| other.tables.contains(t))
    }
}

/// Render `query` with markers for `hints`
pub fn render(query: &str, hints: &BTreeSet<Hint>) -> String {
    if hints.is_empty() {
        return query.to_string();
    }

    let sort_anchor = if hints.contains(&Hint::Sort) {
        order_by_anchor(query)
    } else {
        None
    };

    // A sort hint without an ORDER BY has nowhere to go but the select block
    let select_hints: Vec<&str> = hints
        .iter()
        .filter(|h| h.is_select_scoped() || (**h == Hint::Sort && sort_anchor.is_none()))
        .map(Hint::marker)
        .collect();

    let mut inserts: Vec<(usize, String)> = Vec::with_capacity(2);
    if let Some(at) = sort_anchor {
        inserts.push((at, format!(" /*+ {} */", Hint::Sort.marker())));
    }
    if !select_hints.is_empty() {
        let block = select_hints.join(" ");
        match select_anchor(query) {
            Some(at) => inserts.push((at, format!(" /*+ {} */", block))),
            None => inserts.push((0, format!("/*+ {} */ ", block))),
        }
    }

    // Insert back to front so earlier offsets stay valid
    inserts.sort_by(|a, b| b.0.cmp(&a.0));
    let mut text = query.to_string();
    for (at, marker) in inserts {
        text.insert_str(at, &marker);
    }
    text
}

/// Deterministic candidate generation
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanGenerator;

impl PlanGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Produce the ordered, non-empty candidate list for a query
    pub fn generate(&self, query: &str, tables: &[String]) -> Vec<CandidatePlan> {
        let features = QueryFeatures::detect(query);

        let mut variants: Vec<Option<Hint>> = vec![None, Some(Hint::Index)];
        if features.has_join {
            variants.push(Some(Hint::Materialized));
        }
        variants.push(Some(Hint::Parallel));
        if features.has_order_by {
            variants.push(Some(Hint::Sort));
        }

        variants
            .into_iter()
            .enumerate()
            .map(|(id, hint)| {
                let plan = CandidatePlan::base(id, query, tables);
                match hint {
                    Some(h) => plan.with_hint(h),
                    None => plan,
                }
            })
            .collect()
    }
}
