//! In-memory fake of one family's rule list

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use order_engine::{BackendError, RuleBackend, RulePosition};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tracks how many threads are inside a backend mutation at once.
///
/// Share one gauge across several [`FakeBackend`]s to observe
/// cross-family parallelism; a per-backend gauge observes same-family
/// serialization.
#[derive(Debug, Default)]
pub struct WalkGauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl WalkGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    /// Highest number of concurrent mutations observed so far.
    pub fn max_concurrent(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

struct GaugeGuard<'a>(&'a WalkGauge);

impl<'a> GaugeGuard<'a> {
    fn enter(gauge: &'a WalkGauge) -> Self {
        gauge.enter();
        Self(gauge)
    }
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.exit();
    }
}

/// One family's rule list, held in memory. Index = order - 1.
///
/// `set_order` mimics the remote API: the rule is lifted out and
/// reinserted at the requested position, and every other rule's order
/// shifts accordingly — list contiguity is the backend's job, not the
/// caller's.
pub struct FakeBackend {
    rules: Mutex<Vec<(i64, u8)>>,
    scripted_enumerate: Mutex<VecDeque<String>>,
    scripted_set_order: Mutex<VecDeque<String>>,
    always_fail_set_order: Mutex<Option<String>>,
    drop_after_set: Mutex<Option<i64>>,
    askew: Mutex<Option<i64>>,
    hold: Mutex<Duration>,
    gauge: Arc<WalkGauge>,
    enumerate_calls: AtomicU32,
    set_order_calls: AtomicU32,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::with_gauge(&[], WalkGauge::new())
    }

    /// Seed the list with `(id, rank)` pairs; orders are assigned 1..n
    /// in the given sequence.
    pub fn with_rules(rules: &[(i64, u8)]) -> Self {
        Self::with_gauge(rules, WalkGauge::new())
    }

    /// Same as [`FakeBackend::with_rules`] but observing mutations on a
    /// shared gauge.
    pub fn with_gauge(rules: &[(i64, u8)], gauge: Arc<WalkGauge>) -> Self {
        Self {
            rules: Mutex::new(rules.to_vec()),
            scripted_enumerate: Mutex::new(VecDeque::new()),
            scripted_set_order: Mutex::new(VecDeque::new()),
            always_fail_set_order: Mutex::new(None),
            drop_after_set: Mutex::new(None),
            askew: Mutex::new(None),
            hold: Mutex::new(Duration::ZERO),
            gauge,
            enumerate_calls: AtomicU32::new(0),
            set_order_calls: AtomicU32::new(0),
        }
    }

    /// Append a new rule at the tail, as a resource create at the
    /// neutral position would.
    pub fn create(&self, id: i64, order: i64, rank: u8) {
        let mut rules = lock(&self.rules);
        let index = (order.clamp(1, rules.len() as i64 + 1) - 1) as usize;
        rules.insert(index, (id, rank));
    }

    /// Rule ids in list order.
    pub fn orders(&self) -> Vec<i64> {
        lock(&self.rules).iter().map(|&(id, _)| id).collect()
    }

    /// Fail the next `enumerate` call with `message`.
    pub fn script_enumerate_failure(&self, message: &str) {
        lock(&self.scripted_enumerate).push_back(message.to_string());
    }

    /// Fail the next `set_order` call with `message`. Scripted failures
    /// queue up and are consumed one per call.
    pub fn script_set_order_failure(&self, message: &str) {
        lock(&self.scripted_set_order).push_back(message.to_string());
    }

    /// Fail every `set_order` call with `message` until cleared.
    pub fn fail_set_order_always(&self, message: &str) {
        *lock(&self.always_fail_set_order) = Some(message.to_string());
    }

    /// Clear scripted and standing failures.
    pub fn clear_failures(&self) {
        lock(&self.scripted_enumerate).clear();
        lock(&self.scripted_set_order).clear();
        *lock(&self.always_fail_set_order) = None;
    }

    /// Delete `id` from the list after its next successful `set_order`,
    /// so the verification read finds nothing.
    pub fn drop_after_set_order(&self, id: i64) {
        *lock(&self.drop_after_set) = Some(id);
    }

    /// Make the next `set_order` settle the rule at `order` instead of
    /// the requested position.
    pub fn settle_askew_at(&self, order: i64) {
        *lock(&self.askew) = Some(order);
    }

    /// Sleep this long inside every `set_order`, simulating a slow
    /// backend so concurrent mutations can be observed on the gauge.
    pub fn set_hold(&self, hold: Duration) {
        *lock(&self.hold) = hold;
    }

    pub fn enumerate_calls(&self) -> u32 {
        self.enumerate_calls.load(Ordering::SeqCst)
    }

    pub fn set_order_calls(&self) -> u32 {
        self.set_order_calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent `set_order` calls observed.
    pub fn max_concurrent_walks(&self) -> usize {
        self.gauge.max_concurrent()
    }

    fn snapshot(&self) -> Vec<RulePosition> {
        lock(&self.rules)
            .iter()
            .enumerate()
            .map(|(index, &(id, rank))| RulePosition {
                id,
                order: index as i64 + 1,
                rank,
            })
            .collect()
    }
}

impl RuleBackend for FakeBackend {
    fn enumerate(&self) -> Result<Vec<RulePosition>, BackendError> {
        self.enumerate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = lock(&self.scripted_enumerate).pop_front() {
            return Err(BackendError::new(message));
        }
        Ok(self.snapshot())
    }

    fn set_order(&self, id: i64, order: i64, rank: u8) -> Result<(), BackendError> {
        self.set_order_calls.fetch_add(1, Ordering::SeqCst);
        let _walk = GaugeGuard::enter(&self.gauge);

        if let Some(message) = lock(&self.scripted_set_order).pop_front() {
            return Err(BackendError::new(message));
        }
        if let Some(message) = lock(&self.always_fail_set_order).clone() {
            return Err(BackendError::new(message));
        }

        // Simulate request latency with the gauge held but the list
        // unlocked, as a real in-flight HTTP call would behave.
        let hold = *lock(&self.hold);
        if !hold.is_zero() {
            std::thread::sleep(hold);
        }

        let mut rules = lock(&self.rules);
        let Some(index) = rules.iter().position(|&(rule_id, _)| rule_id == id) else {
            return Err(BackendError::new(format!("rule {id} does not exist")));
        };
        let target = lock(&self.askew).take().unwrap_or(order);
        let entry = rules.remove(index);
        let new_index = (target.clamp(1, rules.len() as i64 + 1) - 1) as usize;
        rules.insert(new_index, (entry.0, rank));

        let mut drop_after = lock(&self.drop_after_set);
        if *drop_after == Some(id) {
            drop_after.take();
            rules.retain(|&(rule_id, _)| rule_id != id);
        }
        Ok(())
    }

    fn read_position(&self, id: i64) -> Result<Option<RulePosition>, BackendError> {
        Ok(self.snapshot().into_iter().find(|r| r.id == id))
    }
}
