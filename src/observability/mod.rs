//! Observability for the optimizer
//!
//! - Structured JSON log lines (`Logger`)
//! - Typed events (`Event`)
//! - Monotonic counters (`MetricsRegistry`)
//!
//! Observability is passive: nothing here feeds back into caching or plan
//! selection.
//!
//! ```ignore
//! use planopt::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::PlanSelected, &[("strategy", "index")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
