//! In-process, synchronous, singleton event bus with priority-tagged
//! events, error isolation, latency percentiles, and a bounded history
//! ring (spec §4.5). Grounded in
//! `original_source/backend/app/shared/event_bus.py`; the "handler
//! identity" used by the Python original (function object equality) is
//! expressed here as an explicit caller-supplied handler id string, since
//! Rust closures are not comparable.

mod bus;
pub mod names;

pub use bus::{BusMetrics, EventBus, Handler, HandlerFn};
