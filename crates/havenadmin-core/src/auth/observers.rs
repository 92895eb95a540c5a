use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::SessionState;

type Observer = Arc<dyn Fn(&SessionState) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    observers: Vec<(u64, Observer)>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // A panicking observer runs outside the lock, so poisoning cannot leave
    // the list half-updated
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Callbacks interested in session state changes.
#[derive(Default)]
pub(crate) struct Observers {
    registry: Arc<Mutex<Registry>>,
}

impl Observers {
    pub(crate) fn add(&self, observer: Observer) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.observers.push((id, observer));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Invoke every observer with `state`. The list is snapshotted first so
    /// observers may subscribe or unsubscribe from inside the callback.
    pub(crate) fn notify(&self, state: &SessionState) {
        let snapshot: Vec<Observer> = lock(&self.registry)
            .observers
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();
        for observer in snapshot {
            observer(state);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.registry).observers.len()
    }
}

/// Handle for a registered observer. Dropping it, or calling
/// `unsubscribe`, deregisters the observer.
#[must_use = "dropping a Subscription immediately unsubscribes the observer"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).observers.retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
