//! Typed lifecycle events published while a response body is being read.
//!
//! Events arrive in the order `Start → (Data | Progress)* → End`. Delivery is
//! best-effort: listeners run inline on the reading task and cannot apply
//! back-pressure.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use bytes::Bytes;

/// Discriminant used to subscribe to one event variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Headers received, body not yet read.
    Start,
    /// A body chunk arrived.
    Data,
    /// Cumulative byte count changed.
    Progress,
    /// Body fully drained.
    End,
}

/// Lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    /// Headers received, body not yet read.
    Start,
    /// A body chunk arrived.
    Data {
        /// The chunk as received from the transport.
        chunk: Bytes,
    },
    /// Bytes observed so far.
    Progress {
        /// Cumulative body size.
        total_bytes: u64,
    },
    /// Body fully drained.
    End {
        /// Final body size.
        total_bytes: u64,
    },
}

impl ResponseEvent {
    /// The variant's discriminant.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start => EventKind::Start,
            Self::Data { .. } => EventKind::Data,
            Self::Progress { .. } => EventKind::Progress,
            Self::End { .. } => EventKind::End,
        }
    }
}

type Listener = Arc<dyn Fn(&ResponseEvent) + Send + Sync>;

#[derive(Default)]
struct EmitterState {
    next_id: u64,
    listeners: Vec<(u64, EventKind, Listener)>,
}

/// Per-response publish/subscribe hub.
#[derive(Default)]
pub(crate) struct EventEmitter {
    state: Arc<Mutex<EmitterState>>,
}

impl EventEmitter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&ResponseEvent) + Send + Sync + 'static,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let id = state.next_id;
        state.next_id += 1;
        state.listeners.push((id, kind, Arc::new(listener)));
        Subscription {
            id,
            state: Arc::downgrade(&self.state),
        }
    }

    /// Delivers `event` to the listeners subscribed at the time of the call.
    pub(crate) fn emit(&self, event: &ResponseEvent) {
        let kind = event.kind();
        let listeners: Vec<Listener> = {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state
                .listeners
                .iter()
                .filter(|(_, k, _)| *k == kind)
                .map(|(_, _, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in listeners {
            listener(event);
        }
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .state
            .lock()
            .map(|state| state.listeners.len())
            .unwrap_or_default();
        f.debug_struct("EventEmitter")
            .field("listener_count", &count)
            .finish()
    }
}

/// Handle returned by [`Response::on`](crate::Response::on).
///
/// Dropping the handle keeps the listener; call [`dispose`](Self::dispose)
/// to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    state: Weak<Mutex<EmitterState>>,
}

impl Subscription {
    /// Removes the listener. Idempotent.
    pub fn dispose(&self) {
        if let Some(state) = self.state.upgrade() {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.listeners.retain(|(id, _, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for EmitterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitterState")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
