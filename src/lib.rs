//! planopt - query-plan caching and optimization
//!
//! An `Optimizer` memoizes query results by fingerprint, picks among hinted
//! plan variants with cost-weighted randomness, and lets related queries share
//! index hints.

pub mod cli;
pub mod observability;
pub mod optimizer;
