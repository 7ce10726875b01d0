use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::config::EventBusSettings;
use crate::types::{Event, EventPriority};

/// A subscriber callback. Returning `Err` is treated as the handler
/// throwing — the bus isolates the error, logs it, and continues
/// delivering to subsequent handlers (spec §4.5 error isolation).
pub type HandlerFn = dyn Fn(&Event) -> Result<(), String> + Send + Sync;

/// A registered handler: an identity (for idempotent subscribe/unsubscribe)
/// plus the callback itself.
#[derive(Clone)]
pub struct Handler {
    pub id: String,
    pub callback: Arc<HandlerFn>,
}

impl Handler {
    pub fn new(id: impl Into<String>, callback: Arc<HandlerFn>) -> Self {
        Handler {
            id: id.into(),
            callback,
        }
    }
}

/// Metrics snapshot returned by `EventBus::metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct BusMetrics {
    pub events_emitted: u64,
    pub events_delivered: u64,
    pub handler_errors: u64,
    pub total_handler_time_ms: f64,
    pub total_emission_time_ms: f64,
    pub event_types: HashMap<String, u64>,
    pub handler_latency_p50: f64,
    pub handler_latency_p95: f64,
    pub handler_latency_p99: f64,
    pub emission_latency_p50: f64,
    pub emission_latency_p95: f64,
    pub emission_latency_p99: f64,
}

struct BusState {
    subscribers: HashMap<String, Vec<Handler>>,
    events_emitted: u64,
    events_delivered: u64,
    handler_errors: u64,
    total_handler_time_ms: f64,
    total_emission_time_ms: f64,
    event_types: HashMap<String, u64>,
    handler_latencies: VecDeque<f64>,
    emission_latencies: VecDeque<f64>,
    history: VecDeque<Event>,
}

impl BusState {
    fn new() -> Self {
        BusState {
            subscribers: HashMap::new(),
            events_emitted: 0,
            events_delivered: 0,
            handler_errors: 0,
            total_handler_time_ms: 0.0,
            total_emission_time_ms: 0.0,
            event_types: HashMap::new(),
            handler_latencies: VecDeque::new(),
            emission_latencies: VecDeque::new(),
            history: VecDeque::new(),
        }
    }
}

/// The event bus. All mutable state (subscriber map, metrics counters,
/// latency rings, history ring) lives behind a single `Mutex`, matching
/// spec §5's "guarded by a single bus-level lock". The lock is held only
/// for short bookkeeping sections — handler invocation happens *outside*
/// the lock, so a handler that emits its own event (recursive delivery)
/// does not deadlock.
pub struct EventBus {
    state: Mutex<BusState>,
    settings: EventBusSettings,
}

static GLOBAL: OnceLock<EventBus> = OnceLock::new();

impl EventBus {
    pub fn new(settings: EventBusSettings) -> Self {
        EventBus {
            state: Mutex::new(BusState::new()),
            settings,
        }
    }

    /// The process-wide singleton, lazily initialized on first use
    /// (spec §5, §9: "lazy init on first use, thread-safe; no teardown
    /// other than process exit").
    pub fn global() -> &'static EventBus {
        GLOBAL.get_or_init(|| EventBus::new(EventBusSettings::default()))
    }

    /// Subscribe `handler` to `event_type`. Idempotent per `(event_type,
    /// handler.id)` pair.
    pub fn subscribe(&self, event_type: &str, handler: Handler) {
        let mut state = self.state.lock().expect("event bus mutex poisoned");
        let handlers = state.subscribers.entry(event_type.to_string()).or_default();
        if !handlers.iter().any(|h| h.id == handler.id) {
            tracing::info!(event_type, handler = %handler.id, "subscribed handler");
            handlers.push(handler);
        }
    }

    /// Unsubscribe the handler identified by `handler_id` from `event_type`.
    pub fn unsubscribe(&self, event_type: &str, handler_id: &str) {
        let mut state = self.state.lock().expect("event bus mutex poisoned");
        if let Some(handlers) = state.subscribers.get_mut(event_type) {
            handlers.retain(|h| h.id != handler_id);
            tracing::info!(event_type, handler = handler_id, "unsubscribed handler");
        }
    }

    /// Emit `event_type` synchronously: every subscriber runs, in
    /// registration order, on the calling thread before this call
    /// returns. A handler that returns `Err` is isolated — it is
    /// counted in `handler_errors` and logged, and subsequent handlers
    /// still run.
    pub fn emit(
        &self,
        event_type: &str,
        data: serde_json::Map<String, serde_json::Value>,
        priority: EventPriority,
    ) -> Event {
        let event = Event {
            name: event_type.to_string(),
            data,
            priority,
            correlation_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        };

        let handlers = {
            let mut state = self.state.lock().expect("event bus mutex poisoned");
            state.events_emitted += 1;
            *state.event_types.entry(event_type.to_string()).or_insert(0) += 1;
            push_bounded(&mut state.history, event.clone(), self.settings.history_capacity);
            state
                .subscribers
                .get(event_type)
                .cloned()
                .unwrap_or_default()
        };

        tracing::debug!(
            event_type,
            priority = ?event.priority,
            correlation_id = %event.correlation_id,
            "emitting event"
        );

        let emission_start = Instant::now();

        for handler in &handlers {
            let handler_start = Instant::now();
            let result = (handler.callback)(&event);
            let duration_ms = handler_start.elapsed().as_secs_f64() * 1000.0;

            let mut state = self.state.lock().expect("event bus mutex poisoned");
            match result {
                Ok(()) => {
                    state.events_delivered += 1;
                    state.total_handler_time_ms += duration_ms;
                    push_bounded(
                        &mut state.handler_latencies,
                        duration_ms,
                        self.settings.latency_sample_capacity,
                    );
                }
                Err(err) => {
                    state.handler_errors += 1;
                    tracing::error!(
                        event_type,
                        handler = %handler.id,
                        priority = ?event.priority,
                        error = %err,
                        "event handler error"
                    );
                }
            }
            drop(state);

            if duration_ms > self.settings.slow_handler_threshold_ms {
                tracing::warn!(
                    event_type,
                    handler = %handler.id,
                    duration_ms,
                    "slow event handler detected"
                );
            }
        }

        let total_emission_ms = emission_start.elapsed().as_secs_f64() * 1000.0;
        {
            let mut state = self.state.lock().expect("event bus mutex poisoned");
            state.total_emission_time_ms += total_emission_ms;
            push_bounded(
                &mut state.emission_latencies,
                total_emission_ms,
                self.settings.latency_sample_capacity,
            );
        }

        tracing::debug!(
            event_type,
            handlers = handlers.len(),
            total_emission_ms,
            "event emission completed"
        );

        event
    }

    pub fn metrics(&self) -> BusMetrics {
        let state = self.state.lock().expect("event bus mutex poisoned");
        BusMetrics {
            events_emitted: state.events_emitted,
            events_delivered: state.events_delivered,
            handler_errors: state.handler_errors,
            total_handler_time_ms: state.total_handler_time_ms,
            total_emission_time_ms: state.total_emission_time_ms,
            event_types: state.event_types.clone(),
            handler_latency_p50: percentile(&state.handler_latencies, 0.50),
            handler_latency_p95: percentile(&state.handler_latencies, 0.95),
            handler_latency_p99: percentile(&state.handler_latencies, 0.99),
            emission_latency_p50: percentile(&state.emission_latencies, 0.50),
            emission_latency_p95: percentile(&state.emission_latencies, 0.95),
            emission_latency_p99: percentile(&state.emission_latencies, 0.99),
        }
    }

    pub fn history(&self, limit: usize) -> Vec<Event> {
        let state = self.state.lock().expect("event bus mutex poisoned");
        let len = state.history.len();
        let start = len.saturating_sub(limit);
        state.history.iter().skip(start).cloned().collect()
    }

    /// Test/reset helper: clear subscribers for `event_type`, or all
    /// subscribers if `None`.
    pub fn clear_subscribers(&self, event_type: Option<&str>) {
        let mut state = self.state.lock().expect("event bus mutex poisoned");
        match event_type {
            Some(name) => {
                state.subscribers.remove(name);
            }
            None => state.subscribers.clear(),
        }
    }

    pub fn reset_metrics(&self) {
        let mut state = self.state.lock().expect("event bus mutex poisoned");
        state.events_emitted = 0;
        state.events_delivered = 0;
        state.handler_errors = 0;
        state.total_handler_time_ms = 0.0;
        state.total_emission_time_ms = 0.0;
        state.event_types.clear();
        state.handler_latencies.clear();
        state.emission_latencies.clear();
    }

    pub fn clear_history(&self) {
        let mut state = self.state.lock().expect("event bus mutex poisoned");
        state.history.clear();
    }
}

fn push_bounded<T>(deque: &mut VecDeque<T>, value: T, capacity: usize) {
    if deque.len() >= capacity {
        deque.pop_front();
    }
    deque.push_back(value);
}

/// Exact-index percentile over the retained window, matching the
/// Python original's `sorted[int(n * p)]` (no interpolation).
fn percentile(samples: &VecDeque<f64>, p: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = samples.iter().copied().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    let idx = ((n as f64) * p) as usize;
    let idx = idx.min(n - 1);
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn handler(id: &str, cb: impl Fn(&Event) -> Result<(), String> + Send + Sync + 'static) -> Handler {
        Handler::new(id, Arc::new(cb))
    }

    #[test]
    fn subscribe_is_idempotent_per_handler_id() {
        let bus = EventBus::new(EventBusSettings::default());
        bus.subscribe("test.event", handler("h1", |_| Ok(())));
        bus.subscribe("test.event", handler("h1", |_| Ok(())));
        let data = serde_json::Map::new();
        bus.emit("test.event", data, EventPriority::Normal);
        assert_eq!(bus.metrics().events_delivered, 1);
    }

    // Scenario E: error isolation (spec §8 scenario E).
    #[test]
    fn error_isolation_counts_errors_and_still_runs_later_handlers() {
        let bus = EventBus::new(EventBusSettings::default());
        let good_count = Arc::new(AtomicU64::new(0));
        let good_count2 = good_count.clone();

        bus.subscribe("test.event", handler("h_bad", |_| Err("boom".to_string())));
        bus.subscribe(
            "test.event",
            handler("h_good", move |_| {
                good_count2.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        for _ in 0..100 {
            bus.emit("test.event", serde_json::Map::new(), EventPriority::Normal);
        }

        assert_eq!(good_count.load(Ordering::SeqCst), 100);
        let metrics = bus.metrics();
        assert_eq!(metrics.handler_errors, 100);
        assert_eq!(metrics.events_delivered, 100);
    }

    // Invariant 8: ordering (spec §8, invariant 8).
    #[test]
    fn handlers_run_in_subscription_order() {
        let bus = EventBus::new(EventBusSettings::default());
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let order1 = order.clone();
        let order2 = order.clone();

        bus.subscribe(
            "order.event",
            handler("h1", move |_| {
                order1.lock().unwrap().push("h1");
                Ok(())
            }),
        );
        bus.subscribe(
            "order.event",
            handler("h2", move |_| {
                order2.lock().unwrap().push("h2");
                Ok(())
            }),
        );

        bus.emit("order.event", serde_json::Map::new(), EventPriority::Normal);
        assert_eq!(*order.lock().unwrap(), vec!["h1", "h2"]);
    }

    #[test]
    fn recursive_emit_from_handler_completes_before_outer_returns() {
        let bus = Arc::new(EventBus::new(EventBusSettings::default()));
        let inner_bus = bus.clone();
        let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_inner = seen.clone();
        let seen_outer = seen.clone();

        bus.subscribe(
            "inner.event",
            handler("inner", move |_| {
                seen_inner.lock().unwrap().push("inner");
                Ok(())
            }),
        );
        bus.subscribe(
            "outer.event",
            handler("outer", move |_| {
                inner_bus.emit("inner.event", serde_json::Map::new(), EventPriority::Normal);
                seen_outer.lock().unwrap().push("outer");
                Ok(())
            }),
        );

        bus.emit("outer.event", serde_json::Map::new(), EventPriority::Normal);
        assert_eq!(*seen.lock().unwrap(), vec!["inner", "outer"]);
    }

    #[test]
    fn history_is_bounded_and_returns_most_recent() {
        let mut settings = EventBusSettings::default();
        settings.history_capacity = 3;
        let bus = EventBus::new(settings);
        for i in 0..5 {
            let mut data = serde_json::Map::new();
            data.insert("i".to_string(), serde_json::json!(i));
            bus.emit("ring.event", data, EventPriority::Normal);
        }
        let history = bus.history(10);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].data.get("i").unwrap(), &serde_json::json!(2));
        assert_eq!(history[2].data.get("i").unwrap(), &serde_json::json!(4));
    }

    #[test]
    fn unsubscribe_removes_only_named_handler() {
        let bus = EventBus::new(EventBusSettings::default());
        let count = Arc::new(AtomicU64::new(0));
        let count2 = count.clone();
        bus.subscribe(
            "t",
            handler("h1", move |_| {
                count2.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        bus.unsubscribe("t", "h1");
        bus.emit("t", serde_json::Map::new(), EventPriority::Normal);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reset_metrics_and_clear_history_are_test_helpers() {
        let bus = EventBus::new(EventBusSettings::default());
        bus.emit("t", serde_json::Map::new(), EventPriority::Normal);
        bus.reset_metrics();
        bus.clear_history();
        let metrics = bus.metrics();
        assert_eq!(metrics.events_emitted, 0);
        assert_eq!(bus.history(10).len(), 0);
    }
}
