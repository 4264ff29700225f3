//! Optimizer facade
//!
//! `cached_query` path:
//!
//! 1. Validate the query text (rejections are never cached)
//! 2. Result cache lookup by (query, arguments) fingerprint
//! 3. On miss: reuse a memoized plan decision, or generate, cost and draw one
//! 4. Execute the selected text on the backend, without any lock held
//! 5. Store the rows unless a concurrent caller already did
//!
//! Backend failures are returned as-is and leave the result cache untouched.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::Value;

use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

use super::backend::{Row, StorageBackend};
use super::cache::{CacheLookup, CacheStats, ResultCache};
use super::clock::{Clock, SystemClock};
use super::config::OptimizerConfig;
use super::correlation::{CorrelationLedger, CorrelationOutcome, CorrelationSide};
use super::cost::CostEstimator;
use super::errors::{OptimizerError, OptimizerResult};
use super::fingerprint::QueryFingerprint;
use super::generator::{render, CandidatePlan, Hint, PlanGenerator};
use super::query::{referenced_tables, validate_query, validate_tables};
use super::selector::PlanSelector;

/// The decision made for one query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizedQuery {
    /// Query text with the chosen hint markers
    pub selected_query_text: String,
    pub estimated_cost: f64,
    /// How many candidates were considered
    pub candidate_count: usize,
    /// `base`, `index`, `parallel`, ...
    pub strategy_name: String,
    pub plan: CandidatePlan,
}

impl OptimizedQuery {
    fn new(plan: CandidatePlan, candidate_count: usize) -> Self {
        Self {
            selected_query_text: plan.text.clone(),
            estimated_cost: plan.estimated_cost,
            candidate_count,
            strategy_name: plan.strategy_name(),
            plan,
        }
    }
}

/// Memoized plan decision. Only the hint set is kept; the text is always
/// re-rendered against the caller's own query.
#[derive(Debug, Clone)]
struct PlanChoice {
    id: usize,
    hints: BTreeSet<Hint>,
    candidate_count: usize,
}

/// Query-plan optimizer owning its caches
pub struct Optimizer<B: StorageBackend> {
    config: OptimizerConfig,
    backend: B,
    generator: PlanGenerator,
    estimator: CostEstimator,
    selector: PlanSelector,
    results: ResultCache<Vec<Row>>,
    plans: ResultCache<PlanChoice>,
    ledger: CorrelationLedger,
    rng: Mutex<StdRng>,
    metrics: MetricsRegistry,
}

impl<B: StorageBackend> Optimizer<B> {
    /// Create an optimizer using wall-clock time
    pub fn new(config: OptimizerConfig, backend: B) -> OptimizerResult<Self> {
        Self::with_clock(config, backend, Arc::new(SystemClock))
    }

    /// Create an optimizer with an explicit time source
    pub fn with_clock(
        config: OptimizerConfig,
        backend: B,
        clock: Arc<dyn Clock>,
    ) -> OptimizerResult<Self> {
        config.validate()?;

        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            results: ResultCache::new(config.result_cache_capacity, clock.clone()),
            plans: ResultCache::new(config.plan_cache_capacity, clock),
            ledger: CorrelationLedger::new(config.correlation_capacity),
            rng: Mutex::new(rng),
            metrics: MetricsRegistry::new(),
            generator: PlanGenerator::new(),
            estimator: CostEstimator::new(),
            selector: PlanSelector::new(),
            config,
            backend,
        })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn result_cache_stats(&self) -> CacheStats {
        self.results.stats()
    }

    pub fn correlation_count(&self) -> usize {
        self.ledger.len()
    }

    fn emit(&self, event: Event, fields: &[(&str, &str)]) {
        if self.config.log_decisions {
            log_event_with_fields(event, fields);
        }
    }

    fn reject(&self, err: OptimizerError) -> OptimizerError {
        self.metrics.increment_queries_rejected();
        self.emit(Event::QueryRejected, &[("reason", &err.to_string())]);
        err
    }

    fn validate(&self, query: &str, tables: &[String]) -> OptimizerResult<()> {
        validate_query(query)
            .and_then(|_| validate_tables(tables))
            .map_err(|e| self.reject(e))
    }

    /// Generate and cost candidates (no validation)
    fn costed_candidates(&self, query: &str, tables: &[String]) -> Vec<CandidatePlan> {
        let mut plans = self.generator.generate(query, tables);
        self.estimator.annotate(&mut plans);
        self.metrics.add_plans_generated(plans.len() as u64);
        plans
    }

    fn choose<R: Rng + ?Sized>(
        &self,
        query: &str,
        tables: &[String],
        rng: &mut R,
    ) -> OptimizedQuery {
        let plans = self.costed_candidates(query, tables);
        let count = plans.len();
        let chosen = self
            .selector
            .select(&plans, rng)
            .cloned()
            .unwrap_or_else(|| CandidatePlan::base(0, query, tables));

        self.metrics.increment_plans_selected();
        let decision = OptimizedQuery::new(chosen, count);
        self.emit(
            Event::PlanSelected,
            &[
                ("strategy", &decision.strategy_name),
                ("cost", &decision.estimated_cost.to_string()),
                ("candidates", &count.to_string()),
            ],
        );
        decision
    }

    fn choose_seeded(&self, query: &str, tables: &[String]) -> OptimizedQuery {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        self.choose(query, tables, &mut *rng)
    }

    /// All costed candidates for a query, in generation order
    pub fn candidates(&self, query: &str, tables: &[String]) -> OptimizerResult<Vec<CandidatePlan>> {
        self.validate(query, tables)?;
        Ok(self.costed_candidates(query, tables))
    }

    /// Choose a strategy without executing anything
    pub fn optimize(&self, query: &str, tables: &[String]) -> OptimizerResult<OptimizedQuery> {
        self.validate(query, tables)?;
        Ok(self.choose_seeded(query, tables))
    }

    /// `optimize` with a caller-owned random source
    pub fn optimize_with_rng<R: Rng + ?Sized>(
        &self,
        query: &str,
        tables: &[String],
        rng: &mut R,
    ) -> OptimizerResult<OptimizedQuery> {
        self.validate(query, tables)?;
        Ok(self.choose(query, tables, rng))
    }

    /// Plan decision for a query, memoized for `plan_ttl_seconds`
    fn plan_for(&self, query: &str, tables: &[String]) -> OptimizedQuery {
        let key = QueryFingerprint::for_plan(query, tables);
        if let CacheLookup::Hit(choice) = self.plans.get(&key) {
            let decision = self.apply_choice(query, tables, &choice);
            self.metrics.increment_plans_reused();
            self.emit(Event::PlanReused, &[("strategy", &decision.strategy_name)]);
            return decision;
        }

        let decision = self.choose_seeded(query, tables);
        let choice = PlanChoice {
            id: decision.plan.id,
            hints: decision.plan.hints.clone(),
            candidate_count: decision.candidate_count,
        };
        let stored = self
            .plans
            .put_if_vacant(key, choice, self.config.plan_ttl_seconds);
        self.apply_choice(query, tables, &stored)
    }

    fn apply_choice(&self, query: &str, tables: &[String], choice: &PlanChoice) -> OptimizedQuery {
        let mut plan = CandidatePlan::base(choice.id, query, tables);
        plan.hints = choice.hints.clone();
        plan.text = render(query, &plan.hints);
        plan.estimated_cost = self.estimator.estimate(&plan);
        OptimizedQuery::new(plan, choice.candidate_count)
    }

    /// Full path: cache check, optimize, execute, store
    pub fn cached_query(
        &self,
        query: &str,
        args: &[Value],
        ttl_seconds: u64,
    ) -> OptimizerResult<Vec<Row>> {
        self.validate(query, &[])?;

        let fingerprint = QueryFingerprint::new(query, args);
        let fp_text = fingerprint.to_string();

        if let CacheLookup::Hit(rows) = self.results.get(&fingerprint) {
            self.metrics.increment_cache_hits();
            self.emit(Event::CacheHit, &[("fingerprint", &fp_text)]);
            return Ok(rows);
        }
        self.metrics.increment_cache_misses();
        self.emit(Event::CacheMiss, &[("fingerprint", &fp_text)]);

        let tables = referenced_tables(query);
        let decision = self.plan_for(query, &tables);

        let rows = match self.backend.execute(&decision.selected_query_text, args) {
            Ok(rows) => rows,
            Err(e) => {
                self.metrics.increment_store_failures();
                self.emit(
                    Event::StoreFailed,
                    &[("fingerprint", &fp_text), ("error", e.message())],
                );
                return Err(OptimizerError::StoreExecution(e));
            }
        };

        self.metrics.increment_queries_executed();
        self.emit(
            Event::QueryExecuted,
            &[
                ("fingerprint", &fp_text),
                ("rows", &rows.len().to_string()),
                ("strategy", &decision.strategy_name),
            ],
        );
        Ok(self.results.put_if_vacant(fingerprint, rows, ttl_seconds))
    }

    /// `cached_query` with the configured default TTL
    pub fn cached_query_default(&self, query: &str, args: &[Value]) -> OptimizerResult<Vec<Row>> {
        self.cached_query(query, args, self.config.default_ttl_seconds)
    }

    /// Resolve two queries together, sharing the index hint from A to B.
    /// Returns the selected texts in argument order.
    pub fn entangle(
        &self,
        query_a: &str,
        tables_a: &[String],
        query_b: &str,
        tables_b: &[String],
    ) -> OptimizerResult<(String, String)> {
        let outcome = self.entangle_plans(query_a, tables_a, query_b, tables_b)?;
        Ok((outcome.plan_a.text, outcome.plan_b.text))
    }

    /// `entangle` returning full plans and what happened
    pub fn entangle_plans(
        &self,
        query_a: &str,
        tables_a: &[String],
        query_b: &str,
        tables_b: &[String],
    ) -> OptimizerResult<CorrelationOutcome> {
        self.validate(query_a, tables_a)?;
        self.validate(query_b, tables_b)?;

        let a = CorrelationSide::new(
            QueryFingerprint::for_plan(query_a, tables_a),
            query_a,
            tables_a,
        );
        let b = CorrelationSide::new(
            QueryFingerprint::for_plan(query_b, tables_b),
            query_b,
            tables_b,
        );

        let outcome = self
            .ledger
            .entangle(a, b, |q, t| self.choose_seeded(q, t).plan);

        let pair = format!("{}:{}", a.fingerprint, b.fingerprint);
        if outcome.reused {
            self.metrics.increment_correlations_reused();
            self.emit(Event::CorrelationReused, &[("pair", &pair)]);
        } else if outcome.recorded {
            self.metrics.increment_correlations_created();
            self.emit(Event::CorrelationCreated, &[("pair", &pair)]);
        }
        if outcome.hint_propagated {
            self.metrics.increment_hints_propagated();
            self.emit(Event::HintPropagated, &[("pair", &pair), ("hint", "index")]);
        }
        Ok(outcome)
    }

    /// Forget the memoized result for one (query, arguments) pair
    pub fn invalidate(&self, query: &str, args: &[Value]) -> bool {
        self.results.remove(&QueryFingerprint::new(query, args))
    }

    /// Drop all memoized results and plan decisions; correlations stay
    pub fn clear_caches(&self) {
        self.results.clear();
        self.plans.clear();
    }

    /// Reclaim expired result and plan entries
    pub fn purge_expired(&self) -> usize {
        self.results.purge_expired() + self.plans.purge_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::backend::StoreError;
    use crate::optimizer::clock::ManualClock;
    use crate::optimizer::generator::Hint;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that counts calls and echoes the text it was given
    #[derive(Default)]
    struct EchoBackend {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StorageBackend for EchoBackend {
        fn execute(&self, query: &str, args: &[Value]) -> Result<Vec<Row>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoreError::new("disk on fire").with_code("XX000"));
            }
            Ok(vec![json!({ "query": query, "args": args })])
        }
    }

    fn optimizer(seed: u64) -> (Arc<ManualClock>, Optimizer<EchoBackend>) {
        let clock = Arc::new(ManualClock::starting_now());
        let opt = Optimizer::with_clock(
            OptimizerConfig::seeded(seed),
            EchoBackend::default(),
            clock.clone(),
        )
        .unwrap();
        (clock, opt)
    }

    const Q: &str = "SELECT * FROM orders WHERE id = $1";

    #[test]
    fn test_optimize_reports_decision() {
        let (_clock, opt) = optimizer(1);
        let decision = opt.optimize(Q, &["orders".to_string()]).unwrap();

        assert_eq!(decision.candidate_count, 3);
        assert!(["base", "index", "parallel"].contains(&decision.strategy_name.as_str()));
        assert_eq!(decision.selected_query_text, decision.plan.text);
        assert_eq!(decision.estimated_cost, decision.plan.estimated_cost);
    }

    #[test]
    fn test_same_seed_same_decisions() {
        let (_c1, a) = optimizer(99);
        let (_c2, b) = optimizer(99);
        for _ in 0..50 {
            assert_eq!(
                a.optimize(Q, &[]).unwrap().strategy_name,
                b.optimize(Q, &[]).unwrap().strategy_name
            );
        }
    }

    #[test]
    fn test_rejects_empty_query_before_cache() {
        let (_clock, opt) = optimizer(1);
        let err = opt.cached_query("  ", &[], 60).unwrap_err();

        assert!(matches!(err, OptimizerError::InvalidQuery(_)));
        assert_eq!(opt.backend().calls.load(Ordering::SeqCst), 0);
        assert_eq!(opt.result_cache_stats().misses, 0);
        assert_eq!(opt.metrics().snapshot().queries_rejected, 1);
    }

    #[test]
    fn test_rejects_empty_table_name() {
        let (_clock, opt) = optimizer(1);
        assert!(opt.optimize(Q, &["".to_string()]).is_err());
    }

    #[test]
    fn test_second_call_hits_cache() {
        let (_clock, opt) = optimizer(1);
        let first = opt.cached_query(Q, &[json!(5)], 60).unwrap();
        let second = opt.cached_query(Q, &[json!(5)], 60).unwrap();

        assert_eq!(first, second);
        assert_eq!(opt.backend().calls.load(Ordering::SeqCst), 1);
        let snap = opt.metrics().snapshot();
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.cache_misses, 1);
    }

    #[test]
    fn test_expiry_reexecutes() {
        let (clock, opt) = optimizer(1);
        opt.cached_query(Q, &[json!(5)], 60).unwrap();
        clock.advance(Duration::seconds(61));
        opt.cached_query(Q, &[json!(5)], 60).unwrap();

        assert_eq!(opt.backend().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_string_and_number_args_do_not_share_entry() {
        let (_clock, opt) = optimizer(1);
        opt.cached_query(Q, &[json!(5)], 60).unwrap();
        opt.cached_query(Q, &[json!("5")], 60).unwrap();

        assert_eq!(opt.backend().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backend_receives_selected_text() {
        let (_clock, opt) = optimizer(3);
        let rows = opt.cached_query(Q, &[json!(1)], 60).unwrap();
        let sent = rows[0]["query"].as_str().unwrap().to_string();

        let candidates = opt.candidates(Q, &["orders".to_string()]).unwrap();
        assert!(candidates.iter().any(|p| p.text == sent));
        assert_eq!(rows[0]["args"], json!([1]));
    }

    #[test]
    fn test_plan_decision_reused_across_arguments() {
        let (_clock, opt) = optimizer(3);
        let a = opt.cached_query(Q, &[json!(1)], 60).unwrap();
        let b = opt.cached_query(Q, &[json!(2)], 60).unwrap();

        assert_eq!(a[0]["query"], b[0]["query"]);
        assert_eq!(opt.metrics().snapshot().plans_reused, 1);
    }

    #[test]
    fn test_store_failure_propagates_and_is_not_cached() {
        let clock = Arc::new(ManualClock::starting_now());
        let backend = EchoBackend {
            fail: true,
            ..Default::default()
        };
        let opt = Optimizer::with_clock(OptimizerConfig::seeded(1), backend, clock).unwrap();

        let err = opt.cached_query(Q, &[json!(1)], 60).unwrap_err();
        assert_eq!(err.store_error().and_then(|e| e.code()), Some("XX000"));

        opt.cached_query(Q, &[json!(1)], 60).unwrap_err();
        assert_eq!(opt.backend().calls.load(Ordering::SeqCst), 2);
        assert_eq!(opt.metrics().snapshot().store_failures, 2);
    }

    #[test]
    fn test_invalidate_forces_reexecution() {
        let (_clock, opt) = optimizer(1);
        opt.cached_query(Q, &[json!(5)], 60).unwrap();
        assert!(opt.invalidate(Q, &[json!(5)]));
        opt.cached_query(Q, &[json!(5)], 60).unwrap();

        assert_eq!(opt.backend().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_entangle_is_idempotent() {
        let (_clock, opt) = optimizer(11);
        let t = vec!["orders".to_string()];
        let qb = "SELECT status FROM orders WHERE customer_id = $1";

        let first = opt.entangle(Q, &t, qb, &t).unwrap();
        let second = opt.entangle(Q, &t, qb, &t).unwrap();

        assert_eq!(first, second);
        assert_eq!(opt.correlation_count(), 1);
        assert_eq!(opt.metrics().snapshot().correlations_reused, 1);
    }

    #[test]
    fn test_entangle_propagation_follows_plan_a() {
        let t = vec!["orders".to_string()];
        let qb = "SELECT status FROM orders WHERE customer_id = $1";

        // Across many seeds, whenever A lands on the index hint, B carries it too
        for seed in 0..40 {
            let (_clock, opt) = optimizer(seed);
            let outcome = opt.entangle_plans(Q, &t, qb, &t).unwrap();
            if outcome.plan_a.has_hint(Hint::Index) {
                assert!(outcome.plan_b.has_hint(Hint::Index), "seed {}", seed);
            }
        }
    }

    #[test]
    fn test_clear_caches() {
        let (_clock, opt) = optimizer(1);
        opt.cached_query(Q, &[json!(5)], 60).unwrap();
        opt.clear_caches();
        opt.cached_query(Q, &[json!(5)], 60).unwrap();
        assert_eq!(opt.backend().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_purge_expired() {
        let (clock, opt) = optimizer(1);
        opt.cached_query(Q, &[json!(5)], 10).unwrap();
        clock.advance(Duration::seconds(400));
        // One result entry plus one plan decision
        assert_eq!(opt.purge_expired(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = OptimizerConfig {
            plan_cache_capacity: 0,
            ..Default::default()
        };
        assert!(Optimizer::new(config, EchoBackend::default()).is_err());
    }
}
