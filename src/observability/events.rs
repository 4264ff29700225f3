//! Observable optimizer events

use std::fmt;

use super::logger::Severity;

/// Events the optimizer can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,

    // Result cache
    CacheHit,
    CacheMiss,

    // Planning
    /// Candidates generated, costed and one drawn
    PlanSelected,
    /// Memoized plan decision reused
    PlanReused,

    // Execution
    QueryExecuted,
    QueryRejected,
    StoreFailed,

    // Correlation
    CorrelationCreated,
    CorrelationReused,
    HintPropagated,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::CacheHit => "CACHE_HIT",
            Event::CacheMiss => "CACHE_MISS",
            Event::PlanSelected => "PLAN_SELECTED",
            Event::PlanReused => "PLAN_REUSED",
            Event::QueryExecuted => "QUERY_EXECUTED",
            Event::QueryRejected => "QUERY_REJECTED",
            Event::StoreFailed => "STORE_FAILED",
            Event::CorrelationCreated => "CORRELATION_CREATED",
            Event::CorrelationReused => "CORRELATION_REUSED",
            Event::HintPropagated => "HINT_PROPAGATED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::QueryRejected => Severity::Warn,
            Event::StoreFailed => Severity::Error,
            Event::ConfigLoaded | Event::CorrelationCreated | Event::HintPropagated => {
                Severity::Info
            }
            _ => Severity::Trace,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_upper_snake() {
        let events = [
            Event::ConfigLoaded,
            Event::CacheHit,
            Event::CacheMiss,
            Event::PlanSelected,
            Event::PlanReused,
            Event::QueryExecuted,
            Event::QueryRejected,
            Event::StoreFailed,
            Event::CorrelationCreated,
            Event::CorrelationReused,
            Event::HintPropagated,
        ];
        for event in events {
            assert!(event
                .as_str()
                .chars()
                .all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_failures_log_loud() {
        assert_eq!(Event::StoreFailed.severity(), Severity::Error);
        assert_eq!(Event::QueryRejected.severity(), Severity::Warn);
        assert_eq!(Event::CacheHit.severity(), Severity::Trace);
    }
}
