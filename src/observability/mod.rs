//! Observability for label storage
//!
//! Structured JSON logging of typed lifecycle events.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on device I/O
//! 3. No background threads
//! 4. Deterministic field order
//!
//! # Usage
//!
//! ```ignore
//! use nvlabel::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::IndexSelected, &[("position", "1"), ("seq", "3")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity, LOG_ENV};

#[cfg(test)]
pub(crate) use logger::capture_events;

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
