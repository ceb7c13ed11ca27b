//! In-flight guard.
//!
//! Tracks which bindings are currently under evaluation. Acquisition is a
//! non-blocking test-and-set; the returned lease releases the id when it is
//! dropped, so release happens on every exit path including panics.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

/// Set of binding ids under evaluation. Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` in-flight. Returns `None` immediately if it already is.
    pub fn try_acquire(&self, id: Uuid) -> Option<InFlightLease> {
        if self.lock().insert(id) {
            Some(InFlightLease {
                id,
                ids: Arc::clone(&self.ids),
            })
        } else {
            None
        }
    }

    /// Whether a lease for `id` is currently held.
    pub fn is_in_flight(&self, id: Uuid) -> bool {
        self.lock().contains(&id)
    }

    /// Number of leases currently held.
    pub fn in_flight_count(&self) -> usize {
        self.lock().len()
    }

    // A poisoned set is still consistent: every mutation is a single insert
    // or remove.
    fn lock(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.ids.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Exclusive claim on one binding id.
#[derive(Debug)]
pub struct InFlightLease {
    id: Uuid,
    ids: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlightLease {
    /// The binding this lease claims.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for InFlightLease {
    fn drop(&mut self) {
        let mut ids = self.ids.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        ids.remove(&self.id);
    }
}
