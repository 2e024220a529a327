//! Inventory fetch coordination.
//!
//! When a visitor changes filters quickly, several table requests for the
//! same session can be in flight at once. [`QueryController`] makes the
//! newest one win: starting a fetch cancels the previous fetch for that key,
//! and a fetch that finishes after being superseded is reported as
//! [`Fetch::Superseded`] instead of its result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;

/// Outcome of a coordinated fetch.
#[derive(Debug, PartialEq, Eq)]
pub enum Fetch<T> {
    /// The fetch finished and is still the newest for its key.
    Completed(T),
    /// A newer fetch for the same key started first; the result was dropped.
    Superseded,
}

/// A running fetch's claim on its key.
#[derive(Debug)]
pub struct Ticket {
    key: String,
    generation: u64,
    cancel: Arc<Notify>,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    cancel: Arc<Notify>,
}

/// Last-write-wins coordinator, keyed per session.
#[derive(Debug, Clone, Default)]
pub struct QueryController {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl QueryController {
    /// Claim `key` for a new fetch, cancelling whatever held it.
    pub fn begin(&self, key: &str) -> Ticket {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let cancel = Arc::new(Notify::new());

        let generation = match slots.get_mut(key) {
            Some(slot) => {
                // notify_one stores a permit, so a fetch that has not yet
                // reached its select still sees the cancellation.
                slot.cancel.notify_one();
                slot.generation += 1;
                slot.cancel = Arc::clone(&cancel);
                slot.generation
            }
            None => {
                slots.insert(
                    key.to_string(),
                    Slot {
                        generation: 1,
                        cancel: Arc::clone(&cancel),
                    },
                );
                1
            }
        };

        Ticket {
            key: key.to_string(),
            generation,
            cancel,
        }
    }

    /// Whether `ticket` is still the newest claim on its key.
    #[must_use]
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(&ticket.key)
            .is_some_and(|slot| slot.generation == ticket.generation)
    }

    /// Release the key if `ticket` still holds it.
    pub fn finish(&self, ticket: &Ticket) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(&ticket.key)
            .is_some_and(|slot| slot.generation == ticket.generation)
        {
            slots.remove(&ticket.key);
        }
    }

    /// Run `fetch` as the newest fetch for `key`.
    ///
    /// The future is dropped as soon as a newer fetch for the same key
    /// begins.
    ///
    /// # Errors
    ///
    /// Returns the fetch's own error if it fails while still current.
    /// Errors from superseded fetches are discarded.
    pub async fn run<T, E, F>(&self, key: &str, fetch: F) -> Result<Fetch<T>, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let ticket = self.begin(key);

        let outcome = tokio::select! {
            biased;
            () = ticket.cancel.notified() => None,
            result = fetch => Some(result),
        };

        let current = self.is_current(&ticket);
        self.finish(&ticket);

        match outcome {
            Some(result) if current => result.map(Fetch::Completed),
            _ => {
                tracing::debug!(key, generation = ticket.generation, "Dropped superseded inventory fetch");
                Ok(Fetch::Superseded)
            }
        }
    }

    /// Number of keys with a fetch in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn test_single_fetch_completes() {
        let controller = QueryController::default();
        let result: Result<_, ()> = controller.run("s1", async { Ok(7) }).await;
        assert_eq!(result, Ok(Fetch::Completed(7)));
        assert_eq!(controller.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_newer_fetch_supersedes_older() {
        let controller = QueryController::default();
        let (release_old, old_gate) = oneshot::channel::<()>();

        let old = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .run("session-a", async move {
                        let _ = old_gate.await;
                        Ok::<_, ()>("page one, stale")
                    })
                    .await
            })
        };

        // Let the old fetch reach its select before the new one starts.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let new = controller
            .run("session-a", async { Ok::<_, ()>("page one, fresh") })
            .await;
        let _ = release_old.send(());

        assert_eq!(new, Ok(Fetch::Completed("page one, fresh")));
        assert_eq!(old.await.unwrap(), Ok(Fetch::Superseded));
        assert_eq!(controller.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_late_response_is_dropped_even_if_it_finishes_first() {
        let controller = QueryController::default();

        let stale = controller.begin("session-b");
        let fresh = controller.begin("session-b");

        assert!(!controller.is_current(&stale));
        assert!(controller.is_current(&fresh));

        // The stale ticket was notified when the fresh one began.
        tokio::time::timeout(Duration::from_millis(100), stale.cancel.notified())
            .await
            .unwrap();

        controller.finish(&stale);
        assert_eq!(controller.in_flight(), 1, "stale finish must not release the key");
        controller.finish(&fresh);
        assert_eq!(controller.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let controller = QueryController::default();
        let a = controller.begin("a");
        let b = controller.begin("b");
        assert!(controller.is_current(&a));
        assert!(controller.is_current(&b));
    }

    #[tokio::test]
    async fn test_errors_of_current_fetch_propagate() {
        let controller = QueryController::default();
        let result: Result<Fetch<()>, &str> = controller.run("c", async { Err("boom") }).await;
        assert_eq!(result, Err("boom"));
    }
}
