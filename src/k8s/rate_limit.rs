//! Client-side QPS/burst enforcement (§4.1(b)).
//!
//! Token-bucket style: `burst` capacity, refilled at `qps` tokens/sec,
//! same `Mutex`-guarded small-struct shape as `circuit.rs`'s
//! `CircuitBreaker`. `KubeFacade`'s typed accessors hand out
//! `RateLimitedApi<T>` instead of a bare `kube::Api<T>` so the limit is
//! enforced wherever remediators act on the facade's handles directly
//! (`k8s.deployments(ns).patch(...)`), not only on calls routed through a
//! facade method.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct BucketState {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

/// Shared limiter a `KubeFacade` and every `RateLimitedApi` it hands out
/// draw from.
#[derive(Clone)]
pub struct RateLimiter(Arc<Mutex<BucketState>>);

impl RateLimiter {
    pub fn new(qps: f32, burst: i32) -> Self {
        let capacity = (burst.max(1)) as f64;
        Self(Arc::new(Mutex::new(BucketState {
            tokens: capacity,
            capacity,
            refill_per_sec: qps.max(0.0) as f64,
            last_refill: Instant::now(),
        })))
    }

    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.0.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * state.refill_per_sec).min(state.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else if state.refill_per_sec > 0.0 {
                    Some(Duration::from_secs_f64(((1.0 - state.tokens) / state.refill_per_sec).max(0.0)))
                } else {
                    // qps configured as 0: refill disabled, poll rather than
                    // block forever.
                    Some(Duration::from_millis(50))
                }
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}
