// crates/deskflow-audit/src/publisher.rs
// ============================================================================
// Module: Bounded Audit Publisher
// Description: Non-blocking fan-in queue in front of a concrete sink.
// Purpose: Keep slow audit destinations off the request path.
// Dependencies: deskflow-core, tokio
// ============================================================================

//! ## Overview
//! The publisher decouples request handling from audit IO: `record` enqueues
//! onto a bounded queue and returns immediately, a background task drains
//! into the wrapped sink. When the queue is full the oldest pending event is
//! dropped and counted, keeping the newest events and never blocking the
//! request. Dropped events are visible through
//! [`BoundedAuditPublisher::dropped`] so operators can size the queue.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use deskflow_core::AuditEvent;
use deskflow_core::interfaces::AuditSink;
use tokio::sync::Notify;

// ============================================================================
// SECTION: Publisher
// ============================================================================

/// Default queue capacity.
const DEFAULT_QUEUE_CAPACITY: usize = 1_024;

/// Non-blocking audit publisher over a bounded drop-oldest queue.
///
/// # Invariants
/// - `record` never blocks and never fails the request path.
/// - On overflow the oldest pending event is dropped and counted; delivery
///   order of the surviving events is preserved.
pub struct BoundedAuditPublisher {
    /// Pending events awaiting the drain task.
    queue: Arc<Mutex<VecDeque<AuditEvent>>>,
    /// Wakeup for the drain task.
    notify: Arc<Notify>,
    /// Queue capacity.
    capacity: usize,
    /// Events dropped because the queue was full.
    dropped: AtomicU64,
}

impl BoundedAuditPublisher {
    /// Spawns a publisher draining into `sink` with the default capacity.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(sink: Arc<dyn AuditSink>) -> Arc<Self> {
        Self::spawn_with_capacity(sink, DEFAULT_QUEUE_CAPACITY)
    }

    /// Spawns a publisher with an explicit queue capacity.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn_with_capacity(sink: Arc<dyn AuditSink>, capacity: usize) -> Arc<Self> {
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let notify = Arc::new(Notify::new());
        let drain_queue = Arc::clone(&queue);
        let drain_notify = Arc::clone(&notify);
        tokio::spawn(async move {
            loop {
                drain_notify.notified().await;
                loop {
                    let event = {
                        let mut pending =
                            drain_queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                        pending.pop_front()
                    };
                    match event {
                        Some(event) => sink.record(&event),
                        None => break,
                    }
                }
            }
        });
        Arc::new(Self {
            queue,
            notify,
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        })
    }

    /// Returns the number of events dropped due to a full queue.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl AuditSink for BoundedAuditPublisher {
    fn record(&self, event: &AuditEvent) {
        {
            let mut pending =
                self.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if pending.len() >= self.capacity {
                pending.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            pending.push_back(event.clone());
        }
        self.notify.notify_one();
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "tests assert on known-good values")]

    use std::time::Duration;

    use deskflow_core::AgentName;
    use deskflow_core::AuditDecision;
    use deskflow_core::RunAuditParams;
    use deskflow_core::TraceId;

    use super::*;

    struct CollectingSink {
        events: Mutex<Vec<AuditEvent>>,
    }

    impl CollectingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
            })
        }

        fn actors(&self) -> Vec<String> {
            self.events.lock().unwrap().iter().map(|event| event.actor.clone()).collect()
        }
    }

    impl AuditSink for CollectingSink {
        fn record(&self, event: &AuditEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn event_for(actor: &str) -> AuditEvent {
        AuditEvent::run_summary(RunAuditParams {
            trace_id: TraceId::new("df-0-1"),
            actor: actor.to_string(),
            agent: AgentName::new("helpdesk"),
            decision: AuditDecision::Ok,
            reason: None,
            used_tools: Vec::new(),
        })
    }

    #[tokio::test]
    async fn queued_events_reach_the_wrapped_sink_in_order() {
        let sink = CollectingSink::new();
        let publisher = BoundedAuditPublisher::spawn(Arc::clone(&sink) as Arc<dyn AuditSink>);
        publisher.record(&event_for("first"));
        publisher.record(&event_for("second"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.actors(), vec!["first".to_string(), "second".to_string()]);
        assert_eq!(publisher.dropped(), 0);
    }

    #[tokio::test]
    async fn overflow_drops_the_oldest_pending_events() {
        let sink = CollectingSink::new();
        let publisher = BoundedAuditPublisher::spawn_with_capacity(
            Arc::clone(&sink) as Arc<dyn AuditSink>,
            2,
        );
        // On a current-thread runtime the drain task cannot run between
        // these synchronous calls, so overflow handling is deterministic.
        publisher.record(&event_for("a"));
        publisher.record(&event_for("b"));
        publisher.record(&event_for("c"));
        publisher.record(&event_for("d"));
        assert_eq!(publisher.dropped(), 2);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.actors(), vec!["c".to_string(), "d".to_string()]);
    }
}
