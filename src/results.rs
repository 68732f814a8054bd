use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::ResultCounters;

/// Shared run counters, incremented from any listener or connection task.
///
/// Clones share the same counters. Only totals matter, so all increments use
/// relaxed ordering; `snapshot` is taken once the run has reached reporting.
#[derive(Clone, Debug, Default)]
pub struct ResultAggregator {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    tcp_listeners: AtomicU64,
    udp_listeners: AtomicU64,
    tcp_requests_received: AtomicU64,
    udp_requests_received: AtomicU64,
    tcp_responses_received: AtomicU64,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_tcp_listener(&self) {
        self.inner.tcp_listeners.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_udp_listener(&self) {
        self.inner.udp_listeners.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tcp_request(&self) {
        self.inner.tcp_requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_udp_request(&self) {
        self.inner.udp_requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tcp_response(&self) {
        self.inner.tcp_responses_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ResultCounters {
        ResultCounters {
            tcp_listeners: self.inner.tcp_listeners.load(Ordering::Relaxed),
            udp_listeners: self.inner.udp_listeners.load(Ordering::Relaxed),
            tcp_requests_received: self.inner.tcp_requests_received.load(Ordering::Relaxed),
            udp_requests_received: self.inner.udp_requests_received.load(Ordering::Relaxed),
            tcp_responses_received: self.inner.tcp_responses_received.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(ResultAggregator::new().snapshot(), ResultCounters::default());
    }

    #[test]
    fn clones_share_counters() {
        let a = ResultAggregator::new();
        let b = a.clone();
        a.increment_tcp_listener();
        b.increment_udp_listener();
        b.increment_udp_request();
        b.increment_udp_request();
        a.increment_tcp_response();

        let snap = a.snapshot();
        assert_eq!(snap.tcp_listeners, 1);
        assert_eq!(snap.udp_listeners, 1);
        assert_eq!(snap.tcp_requests_received, 0);
        assert_eq!(snap.udp_requests_received, 2);
        assert_eq!(snap.tcp_responses_received, 1);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let agg = ResultAggregator::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let agg = agg.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        agg.increment_tcp_request();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(agg.snapshot().tcp_requests_received, 8_000);
    }
}
