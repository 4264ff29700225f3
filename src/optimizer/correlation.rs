//! Cross-query hint sharing
//!
//! When a caller pairs two queries that touch a common table, both are
//! resolved once and the pair is remembered. If the first query's plan
//! carries the index hint and the second's does not, the second plan gets
//! it too. Only the index hint moves, and only from first to second.
//!
//! Entries are never invalidated. The ledger is size-capped; at capacity the
//! oldest pair is forgotten.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use super::cost::CostEstimator;
use super::fingerprint::QueryFingerprint;
use super::generator::{CandidatePlan, Hint};

/// Unordered pair of fingerprints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    low: QueryFingerprint,
    high: QueryFingerprint,
}

impl CorrelationKey {
    pub fn new(a: QueryFingerprint, b: QueryFingerprint) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn contains(&self, fingerprint: &QueryFingerprint) -> bool {
        self.low == *fingerprint || self.high == *fingerprint
    }
}

/// Stored resolution of one pair
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationEntry {
    pub key: CorrelationKey,
    /// Fingerprint that played the "A" role when the entry was created
    pub fingerprint_a: QueryFingerprint,
    pub plan_for_a: CandidatePlan,
    pub plan_for_b: CandidatePlan,
}

impl CorrelationEntry {
    /// Plans ordered so the first belongs to `first`
    fn plans_for(&self, first: &QueryFingerprint) -> (CandidatePlan, CandidatePlan) {
        if *first == self.fingerprint_a {
            (self.plan_for_a.clone(), self.plan_for_b.clone())
        } else {
            (self.plan_for_b.clone(), self.plan_for_a.clone())
        }
    }
}

/// One side of an entangle request
#[derive(Debug, Clone, Copy)]
pub struct CorrelationSide<'a> {
    pub fingerprint: QueryFingerprint,
    pub query: &'a str,
    pub tables: &'a [String],
}

impl<'a> CorrelationSide<'a> {
    pub fn new(fingerprint: QueryFingerprint, query: &'a str, tables: &'a [String]) -> Self {
        Self {
            fingerprint,
            query,
            tables,
        }
    }
}

/// What `entangle` did
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationOutcome {
    pub plan_a: CandidatePlan,
    pub plan_b: CandidatePlan,
    /// Stored pair returned without resolving
    pub reused: bool,
    /// Index hint copied from A to B
    pub hint_propagated: bool,
    /// Pair stored in the ledger (false when the queries share no table)
    pub recorded: bool,
}

struct LedgerInner {
    entries: HashMap<CorrelationKey, CorrelationEntry>,
    order: VecDeque<CorrelationKey>,
}

/// Remembers resolved query pairs
pub struct CorrelationLedger {
    inner: Mutex<LedgerInner>,
    capacity: usize,
}

impl CorrelationLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LedgerInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stored entry for a pair, if any
    pub fn get(&self, a: QueryFingerprint, b: QueryFingerprint) -> Option<CorrelationEntry> {
        self.lock().entries.get(&CorrelationKey::new(a, b)).cloned()
    }

    /// Resolve a pair of queries, sharing the index hint from A to B.
    ///
    /// `resolve` runs the normal generate/estimate/select path for one query.
    /// It is called without the ledger lock held.
    pub fn entangle<F>(
        &self,
        a: CorrelationSide<'_>,
        b: CorrelationSide<'_>,
        mut resolve: F,
    ) -> CorrelationOutcome
    where
        F: FnMut(&str, &[String]) -> CandidatePlan,
    {
        let key = CorrelationKey::new(a.fingerprint, b.fingerprint);

        if let Some(entry) = self.lock().entries.get(&key) {
            let (plan_a, plan_b) = entry.plans_for(&a.fingerprint);
            return CorrelationOutcome {
                plan_a,
                plan_b,
                reused: true,
                hint_propagated: false,
                recorded: true,
            };
        }

        let plan_a = resolve(a.query, a.tables);
        let mut plan_b = resolve(b.query, b.tables);

        if !plan_a.shares_table_with(&plan_b) {
            return CorrelationOutcome {
                plan_a,
                plan_b,
                reused: false,
                hint_propagated: false,
                recorded: false,
            };
        }

        let hint_propagated = plan_a.has_hint(Hint::Index) && !plan_b.has_hint(Hint::Index);
        if hint_propagated {
            plan_b.add_hint(Hint::Index);
            plan_b.estimated_cost = CostEstimator::new().estimate(&plan_b);
        }

        let mut guard = self.lock();
        let inner = &mut *guard;
        if let Some(existing) = inner.entries.get(&key) {
            // Lost a race: the first stored pair wins
            let (plan_a, plan_b) = existing.plans_for(&a.fingerprint);
            return CorrelationOutcome {
                plan_a,
                plan_b,
                reused: true,
                hint_propagated: false,
                recorded: true,
            };
        }

        while inner.entries.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }

        inner.entries.insert(
            key,
            CorrelationEntry {
                key,
                fingerprint_a: a.fingerprint,
                plan_for_a: plan_a.clone(),
                plan_for_b: plan_b.clone(),
            },
        );
        inner.order.push_back(key);

        CorrelationOutcome {
            plan_a,
            plan_b,
            reused: false,
            hint_propagated,
            recorded: true,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
