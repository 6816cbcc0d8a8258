//! In-process counters and tracing helpers.
//!
//! Counters are plain atomics behind a process-wide `Lazy`, recorded at the
//! same points an exporter would hook: query execution, pool leases, and
//! transaction outcomes. `snapshot()` reads them all at once for logging or
//! test assertions.

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "metrics")]
pub static METRICS: Lazy<PoolsideMetrics> = Lazy::new(PoolsideMetrics::default);

#[cfg(feature = "metrics")]
#[derive(Debug, Default)]
pub struct PoolsideMetrics {
    queries_total: AtomicU64,
    queries_failed: AtomicU64,
    connections_acquired: AtomicU64,
    connections_released: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,
}

#[cfg(feature = "metrics")]
impl PoolsideMetrics {
    pub fn record_query(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query_error(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_acquire(&self) {
        self.connections_acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_release(&self) {
        self.connections_released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rollback(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter at once.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_total: self.queries_total.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            connections_acquired: self.connections_acquired.load(Ordering::Relaxed),
            connections_released: self.connections_released.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.transactions_rolled_back.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values.
#[cfg(feature = "metrics")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queries_total: u64,
    pub queries_failed: u64,
    pub connections_acquired: u64,
    pub connections_released: u64,
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
}

/// Span constructors for the hot paths, plus a subscriber that bridges span
/// events into `log`.
#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;
    use tracing_subscriber::layer::{Context, SubscriberExt};

    pub fn acquire_connection_span() -> Span {
        tracing::debug_span!("pool.acquire")
    }

    pub fn begin_transaction_span() -> Span {
        tracing::debug_span!("tx.begin")
    }

    pub fn commit_transaction_span() -> Span {
        tracing::debug_span!("tx.commit")
    }

    pub fn rollback_transaction_span() -> Span {
        tracing::debug_span!("tx.rollback")
    }

    pub fn execute_query_span(sql: &str) -> Span {
        tracing::debug_span!("db.execute", sql = %summarize(sql))
    }

    // Statements can embed large literal payloads; spans carry a prefix.
    fn summarize(sql: &str) -> String {
        const MAX_CHARS: usize = 120;
        if sql.chars().count() <= MAX_CHARS {
            return sql.to_string();
        }
        let prefix: String = sql.chars().take(MAX_CHARS).collect();
        format!("{prefix}...")
    }

    struct LogBridge;

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for LogBridge {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            if visitor.0.is_empty() {
                return;
            }

            let level = *event.metadata().level();
            let log_level = if level == tracing::Level::ERROR {
                log::Level::Error
            } else if level == tracing::Level::WARN {
                log::Level::Warn
            } else if level == tracing::Level::INFO {
                log::Level::Info
            } else if level == tracing::Level::DEBUG {
                log::Level::Debug
            } else {
                log::Level::Trace
            };
            log::log!(target: event.metadata().target(), log_level, "{}", visitor.0);
        }
    }

    struct MessageVisitor(String);

    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            use std::fmt::Write;
            if field.name() == "message" {
                let _ = write!(self.0, "{value:?}");
            }
        }
    }

    /// Install the log-bridge subscriber as the global default.
    ///
    /// A no-op when a global subscriber is already set, so demos and tests
    /// can call it unconditionally.
    pub fn init() {
        let subscriber = tracing_subscriber::registry().with(LogBridge);
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            log::debug!("global tracing subscriber already installed");
        }
    }

}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_into_snapshots() {
        let before = METRICS.snapshot();
        METRICS.record_query();
        METRICS.record_query_error();
        METRICS.record_acquire();
        METRICS.record_release();
        METRICS.record_commit();
        METRICS.record_rollback();
        let after = METRICS.snapshot();

        assert!(after.queries_total > before.queries_total);
        assert!(after.queries_failed > before.queries_failed);
        assert!(after.connections_acquired > before.connections_acquired);
        assert!(after.connections_released > before.connections_released);
        assert!(after.transactions_committed > before.transactions_committed);
        assert!(after.transactions_rolled_back > before.transactions_rolled_back);
    }
}
