//! Trailing-edge debouncing keyed per field.
//!
//! Every call to [`Debouncer::settle`] takes a fresh ticket for its key and
//! waits out the window. Only the call still holding the newest ticket when
//! its window ends resolves to `true`; earlier calls resolve to `false` and
//! their callers skip the work.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug)]
pub struct Debouncer<K> {
    window: Duration,
    counter: AtomicU64,
    tickets: Mutex<HashMap<K, u64>>,
}

impl<K: Eq + Hash + Clone> Debouncer<K> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            counter: AtomicU64::new(0),
            tickets: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait out the window for `key`. Returns `true` if no newer call for the
    /// same key arrived (and nobody cancelled it) in the meantime.
    pub async fn settle(&self, key: K) -> bool {
        let ticket = self.arm(key.clone());
        self.wait(&key, ticket).await
    }

    /// Take a ticket for `key` now, superseding any earlier one. Pair with
    /// [`Debouncer::wait`] when the ticket must be ordered with other
    /// synchronous work before the wait is spawned.
    pub fn arm(&self, key: K) -> u64 {
        let ticket = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().insert(key, ticket);
        ticket
    }

    /// Wait out the window, then report whether `ticket` is still the newest
    /// for `key`.
    pub async fn wait(&self, key: &K, ticket: u64) -> bool {
        if !self.window.is_zero() {
            tokio::time::sleep(self.window).await;
        }
        self.take_if_current(key, ticket)
    }

    /// Drop the pending call for `key`, if any.
    pub fn cancel(&self, key: &K) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn cancel_all(&self) {
        self.lock().clear();
    }

    /// Number of keys with a call waiting out its window.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, u64>> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_if_current(&self, key: &K, ticket: u64) -> bool {
        let mut tickets = self.lock();
        if tickets.get(key) == Some(&ticket) {
            tickets.remove(key);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn only_trailing_call_fires() {
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(100)));

        let first = tokio::spawn({
            let debouncer = Arc::clone(&debouncer);
            async move { debouncer.settle("email").await }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        let second = tokio::spawn({
            let debouncer = Arc::clone(&debouncer);
            async move { debouncer.settle("email").await }
        });

        assert!(!first.await.unwrap());
        assert!(second.await.unwrap());
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_outside_the_window_both_fire() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        assert!(debouncer.settle("email").await);
        assert!(debouncer.settle("email").await);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(50)));
        let a = tokio::spawn({
            let debouncer = Arc::clone(&debouncer);
            async move { debouncer.settle("a").await }
        });
        let b = tokio::spawn({
            let debouncer = Arc::clone(&debouncer);
            async move { debouncer.settle("b").await }
        });
        assert!(a.await.unwrap());
        assert!(b.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_pending_call() {
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(50)));
        let pending = tokio::spawn({
            let debouncer = Arc::clone(&debouncer);
            async move { debouncer.settle("a").await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(debouncer.cancel(&"a"));
        assert!(!pending.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn armed_tickets_supersede_in_call_order() {
        let debouncer = Debouncer::new(Duration::from_millis(20));
        let first = debouncer.arm("a");
        let second = debouncer.arm("a");
        assert!(!debouncer.wait(&"a", first).await);
        assert!(debouncer.wait(&"a", second).await);
    }

    #[tokio::test]
    async fn zero_window_fires_immediately() {
        let debouncer = Debouncer::new(Duration::ZERO);
        assert!(debouncer.settle(1_u32).await);
    }
}
