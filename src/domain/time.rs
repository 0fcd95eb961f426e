use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Monotonic-enough UTC time source. Market data timestamps are milliseconds
/// since epoch; business/operational rows use seconds since epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;

    fn now_s(&self) -> i64 {
        self.now_ms() / 1_000
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Deterministic clock for tests: starts at a fixed instant and only moves
/// when explicitly advanced.
#[derive(Debug, Clone)]
pub struct TestClock {
    millis: Arc<AtomicI64>,
}

impl TestClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.millis.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set_ms(&self, value_ms: i64) {
        self.millis.store(value_ms, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
