//! Per-key in-flight load slot.
//!
//! The first caller to miss on a key registers a [`Flight`] and becomes its
//! leader; everyone else who misses on the same key while it is registered
//! parks on the flight's condvar and receives the leader's result.
//!
//! ```text
//!   Loading ──complete(Ok | Err)──► Done(result)   waiters clone result
//!      │
//!      └────abandon()─────────────► Abandoned      waiters retry get()
//! ```

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
enum FlightState<V, E> {
    Loading,
    Done(Result<V, E>),
    Abandoned,
}

#[derive(Debug)]
pub(crate) struct Flight<V, E> {
    state: Mutex<FlightState<V, E>>,
    cv: Condvar,
}

impl<V, E> Flight<V, E>
where
    V: Clone,
    E: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(FlightState::Loading),
            cv: Condvar::new(),
        }
    }

    /// Publishes the leader's result and wakes every waiter.
    pub(crate) fn complete(&self, result: Result<V, E>) {
        *self.state.lock() = FlightState::Done(result);
        self.cv.notify_all();
    }

    /// Wakes waiters without a result; used when the leader panicked.
    pub(crate) fn abandon(&self) {
        *self.state.lock() = FlightState::Abandoned;
        self.cv.notify_all();
    }

    /// Blocks until the flight settles. `None` means the leader gave up and
    /// the caller should start over.
    pub(crate) fn wait(&self) -> Option<Result<V, E>> {
        let mut state = self.state.lock();
        while matches!(*state, FlightState::Loading) {
            self.cv.wait(&mut state);
        }
        match &*state {
            FlightState::Done(result) => Some(result.clone()),
            FlightState::Abandoned | FlightState::Loading => None,
        }
    }

    pub(crate) fn is_loading(&self) -> bool {
        matches!(*self.state.lock(), FlightState::Loading)
    }
}

/// Outcome of trying to register a flight for a key.
pub(crate) enum FlightRole<V, E> {
    Leader(std::sync::Arc<Flight<V, E>>),
    Waiter(std::sync::Arc<Flight<V, E>>),
}
