//! Collapsing of duplicate in-flight reads.
//!
//! A [`RequestCoalescer`] maps a key to one pending result. The first caller
//! for a key starts the request; callers arriving while it is pending (or
//! within a short grace delay after it settles) subscribe to the same result
//! instead of issuing their own. After the grace delay the slot is cleared so
//! a deliberate refresh is not answered with a stale result.
//!
//! Slots carry a generation number: a delayed clear only removes the slot it
//! was scheduled for, never a newer request under the same key.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::ApiError;

/// A pending result shared among subscribers.
pub type PendingResult<V> = Shared<BoxFuture<'static, Result<V, ApiError>>>;

struct Slot<V: Clone> {
    generation: u64,
    result: PendingResult<V>,
}

struct Slots<K, V: Clone> {
    next_generation: u64,
    by_key: HashMap<K, Slot<V>>,
}

/// Shares one pending result per key among concurrent callers.
pub struct RequestCoalescer<K, V: Clone> {
    slots: Arc<Mutex<Slots<K, V>>>,
    grace: Duration,
}

impl<K, V: Clone> Clone for RequestCoalescer<K, V> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            grace: self.grace,
        }
    }
}

impl<K, V> RequestCoalescer<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a coalescer whose slots clear `grace` after settling.
    ///
    /// A zero grace clears the slot as soon as the result is available.
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_generation: 0,
                by_key: HashMap::new(),
            })),
            grace,
        }
    }

    /// Run `request` under `key`, or join the pending request for `key`.
    ///
    /// `request` is only called when no slot exists for the key. The pending
    /// result is driven by whichever subscriber polls it, so dropping the
    /// caller that started it does not cancel it for the others.
    ///
    /// # Errors
    ///
    /// Returns the shared request's error to every subscriber.
    pub async fn run<F, Fut>(&self, key: K, request: F) -> Result<V, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let pending = {
            let mut slots = self.slots.lock();
            if let Some(slot) = slots.by_key.get(&key) {
                debug!(key = ?key, "Joining in-flight request");
                slot.result.clone()
            } else {
                let generation = slots.next_generation;
                slots.next_generation += 1;

                let settle = self.settle_hook(key.clone(), generation);
                let request = request();
                let result = async move {
                    let result = request.await;
                    settle();
                    result
                }
                .boxed()
                .shared();

                slots.by_key.insert(
                    key,
                    Slot {
                        generation,
                        result: result.clone(),
                    },
                );
                result
            }
        };

        pending.await
    }

    /// The pending result for `key`, if one is in flight or within its grace
    /// delay.
    #[must_use]
    pub fn subscribe(&self, key: &K) -> Option<PendingResult<V>> {
        self.slots
            .lock()
            .by_key
            .get(key)
            .map(|slot| slot.result.clone())
    }

    /// Drop the slot for `key` so the next call starts a fresh request.
    pub fn clear(&self, key: &K) {
        self.slots.lock().by_key.remove(key);
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, key: &K) -> bool {
        self.slots.lock().by_key.contains_key(key)
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.slots.lock().by_key.is_empty()
    }

    /// Build the callback that runs when the request settles.
    ///
    /// It clears the slot immediately for a zero grace, otherwise schedules
    /// the clear on the runtime. Either way only the slot with the matching
    /// generation is removed.
    fn settle_hook(&self, key: K, generation: u64) -> Box<dyn FnOnce() + Send> {
        let slots = Arc::clone(&self.slots);
        let grace = self.grace;
        Box::new(move || {
            if grace.is_zero() {
                remove_generation(&slots, &key, generation);
            } else {
                tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    remove_generation(&slots, &key, generation);
                });
            }
        })
    }
}

fn remove_generation<K: Eq + Hash, V: Clone>(
    slots: &Mutex<Slots<K, V>>,
    key: &K,
    generation: u64,
) {
    let mut slots = slots.lock();
    if slots
        .by_key
        .get(key)
        .is_some_and(|slot| slot.generation == generation)
    {
        slots.by_key.remove(key);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_request(
        calls: &Arc<AtomicUsize>,
        delay: Duration,
        value: u32,
    ) -> impl Future<Output = Result<u32, ApiError>> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_request() {
        let coalescer = RequestCoalescer::<String, u32>::new(Duration::from_millis(50));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = coalescer.run("cart-1".to_string(), || {
            counting_request(&calls, Duration::from_millis(20), 1)
        });
        let second = coalescer.run("cart-1".to_string(), || {
            counting_request(&calls, Duration::from_millis(20), 2)
        });
        let (a, b) = tokio::join!(first, second);

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_call_after_grace_starts_fresh_request() {
        let coalescer = RequestCoalescer::<String, u32>::new(Duration::from_millis(30));
        let calls = Arc::new(AtomicUsize::new(0));

        let key = "cart-1".to_string();
        coalescer
            .run(key.clone(), || counting_request(&calls, Duration::ZERO, 1))
            .await
            .unwrap();

        // Within the grace delay the settled result is still shared.
        let shared = coalescer
            .run(key.clone(), || counting_request(&calls, Duration::ZERO, 2))
            .await
            .unwrap();
        assert_eq!(shared, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!coalescer.is_pending(&key));

        let fresh = coalescer
            .run(key, || counting_request(&calls, Duration::ZERO, 3))
            .await
            .unwrap();
        assert_eq!(fresh, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_grace_clears_on_settle() {
        let coalescer = RequestCoalescer::<String, u32>::new(Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));

        coalescer
            .run("k".to_string(), || counting_request(&calls, Duration::ZERO, 1))
            .await
            .unwrap();
        assert!(coalescer.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let coalescer = RequestCoalescer::<String, u32>::new(Duration::from_millis(50));
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            coalescer.run("a".to_string(), || counting_request(
                &calls,
                Duration::from_millis(10),
                1
            )),
            coalescer.run("b".to_string(), || counting_request(
                &calls,
                Duration::from_millis(10),
                2
            )),
        );
        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_shared_and_cleared() {
        let coalescer = RequestCoalescer::<String, u32>::new(Duration::ZERO);
        let failing = || async {
            Err(ApiError::Status {
                status: 503,
                body: "down".to_string(),
            })
        };

        let (a, b) = tokio::join!(
            coalescer.run("k".to_string(), failing),
            coalescer.run("k".to_string(), failing),
        );
        assert_eq!(a.unwrap_err(), b.unwrap_err());
        assert!(coalescer.is_empty());
    }

    #[tokio::test]
    async fn test_stale_clear_does_not_remove_newer_slot() {
        let coalescer = RequestCoalescer::<String, u32>::new(Duration::from_millis(40));
        let calls = Arc::new(AtomicUsize::new(0));
        let key = "k".to_string();

        coalescer
            .run(key.clone(), || counting_request(&calls, Duration::ZERO, 1))
            .await
            .unwrap();
        // Manual clear, then a new long request under the same key.
        coalescer.clear(&key);
        let slow = coalescer.run(key.clone(), || {
            counting_request(&calls, Duration::from_millis(120), 2)
        });
        let probe = async {
            // The first slot's delayed clear fires at ~40ms; the new slot survives it.
            tokio::time::sleep(Duration::from_millis(80)).await;
            coalescer.is_pending(&key)
        };
        let (value, still_pending) = tokio::join!(slow, probe);

        assert_eq!(value.unwrap(), 2);
        assert!(still_pending);
    }

    #[tokio::test]
    async fn test_subscribe_joins_pending() {
        let coalescer = RequestCoalescer::<String, u32>::new(Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));
        let key = "k".to_string();
        assert!(coalescer.subscribe(&key).is_none());

        let run = coalescer.run(key.clone(), || {
            counting_request(&calls, Duration::from_millis(20), 9)
        });
        let join = async {
            tokio::task::yield_now().await;
            coalescer.subscribe(&key).unwrap().await
        };
        let (a, b) = tokio::join!(run, join);
        assert_eq!(a.unwrap(), 9);
        assert_eq!(b.unwrap(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
