//! Query-plan optimizer
//!
//! Sits between callers and a storage backend. For each query it generates
//! hinted candidate plans, costs them, draws one with probability that favours
//! cheaper plans, and memoizes results by a fingerprint of query text and
//! arguments.
//!
//! # Components
//!
//! - `ResultCache`: TTL-bounded, LRU-capped memo of results and decisions
//! - `PlanGenerator`: base plan plus one variant per applicable hint
//! - `CostEstimator`: deterministic heuristic cost per candidate
//! - `PlanSelector`: weighted random draw over candidates
//! - `CorrelationLedger`: shares the index hint across related queries
//!
//! `Optimizer` wires them together and owns all state; there is no global.

mod backend;
mod cache;
mod clock;
mod config;
mod correlation;
mod cost;
mod errors;
mod fingerprint;
mod generator;
mod optimizer;
mod query;
mod selector;

pub use backend::{Row, StorageBackend, StoreError};
pub use cache::{CacheEntry, CacheLookup, CacheStats, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::OptimizerConfig;
pub use correlation::{
    CorrelationEntry, CorrelationKey, CorrelationLedger, CorrelationOutcome, CorrelationSide,
};
pub use cost::{hint_discount, CostEstimator, BASELINE_COST};
pub use errors::{OptimizerError, OptimizerErrorCode, OptimizerResult};
pub use fingerprint::{normalize_query, QueryFingerprint};
pub use generator::{render, CandidatePlan, Hint, PlanGenerator};
pub use optimizer::{OptimizedQuery, Optimizer};
pub use query::{referenced_tables, validate_query, validate_tables, QueryFeatures};
pub use selector::PlanSelector;
