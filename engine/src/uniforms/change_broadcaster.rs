//! Hill Value Change Broadcaster
//!
//! Tracks whether the terrain-shape uniforms changed since every consumer
//! last caught up.
//!
//! A producer (any code path that writes a hill value) calls
//! [`ChangeBroadcaster::broadcast_change`]. Each consumer registered with
//! [`ChangeBroadcaster::register_listener`] reprocesses the new shape and then
//! calls [`ChangeBroadcaster::acknowledge`]. The broadcaster reports dirty
//! until *all* consumers have acknowledged, so consumers can be added without
//! the producer knowing about them.
//!
//! # Example
//!
//! ```
//! use hills_engine::uniforms::ChangeBroadcaster;
//!
//! let mut changes = ChangeBroadcaster::new();
//! changes.register_listener("terrain_surface");
//! changes.register_listener("water_reflection");
//!
//! changes.broadcast_change();
//! assert!(changes.is_dirty());
//!
//! changes.acknowledge("terrain_surface").unwrap();
//! assert!(changes.is_dirty()); // still waiting on the second consumer
//!
//! changes.acknowledge("water_reflection").unwrap();
//! assert!(!changes.is_dirty());
//! ```

use std::collections::BTreeMap;

use crate::error::UnknownListenerError;

/// Per-listener progress through the current change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerState {
    /// Has processed the latest broadcast (or none happened yet).
    Acknowledged,
    /// A broadcast happened that this listener has not processed.
    Pending,
}

/// Dirty/acknowledge barrier over terrain-shape changes.
///
/// The global dirty flag is derived from the listener states, never stored,
/// so it cannot drift from them.
///
/// # Thread Safety
///
/// Not thread-safe. If registration or acknowledgment ever moves off the
/// frame thread, wrap the broadcaster in a mutex.
#[derive(Clone, Debug, Default)]
pub struct ChangeBroadcaster {
    listeners: BTreeMap<String, ListenerState>,
    broadcasts: u64,
}

impl ChangeBroadcaster {
    /// Create a broadcaster with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: BTreeMap::new(),
            broadcasts: 0,
        }
    }

    /// Register a consumer. It starts acknowledged, so it does nothing until
    /// the first broadcast.
    ///
    /// Registering an id again resets it to acknowledged.
    pub fn register_listener(&mut self, id: &str) {
        self.listeners
            .insert(id.to_string(), ListenerState::Acknowledged);
        log::debug!("[ChangeBroadcaster] registered listener `{id}`");
    }

    /// Stop tracking a consumer. Returns whether it was registered.
    pub fn unregister_listener(&mut self, id: &str) -> bool {
        self.listeners.remove(id).is_some()
    }

    /// Mark every registered listener as pending.
    pub fn broadcast_change(&mut self) {
        for state in self.listeners.values_mut() {
            *state = ListenerState::Pending;
        }
        self.broadcasts += 1;
    }

    /// Record that `id` has processed the latest change.
    ///
    /// Returns `Ok(true)` when this acknowledgment was the last one
    /// outstanding, i.e. the broadcaster just went from dirty to clean.
    ///
    /// An unregistered `id` is logged and rejected without touching any
    /// state.
    pub fn acknowledge(&mut self, id: &str) -> Result<bool, UnknownListenerError> {
        let was_dirty = self.is_dirty();
        let Some(state) = self.listeners.get_mut(id) else {
            let err = UnknownListenerError(id.to_string());
            log::error!("[ChangeBroadcaster] {err}");
            return Err(err);
        };
        *state = ListenerState::Acknowledged;
        Ok(was_dirty && !self.is_dirty())
    }

    /// True iff at least one registered listener has not acknowledged the
    /// latest change.
    pub fn is_dirty(&self) -> bool {
        self.listeners
            .values()
            .any(|state| *state == ListenerState::Pending)
    }

    /// True iff `id` is registered and still pending.
    pub fn is_listener_dirty(&self, id: &str) -> bool {
        self.listener_state(id) == Some(ListenerState::Pending)
    }

    pub fn listener_state(&self, id: &str) -> Option<ListenerState> {
        self.listeners.get(id).copied()
    }

    /// Number of listeners still pending.
    pub fn pending_count(&self) -> usize {
        self.listeners
            .values()
            .filter(|state| **state == ListenerState::Pending)
            .count()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Total number of broadcasts since creation.
    pub fn broadcast_count(&self) -> u64 {
        self.broadcasts
    }
}
