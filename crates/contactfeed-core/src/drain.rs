//! Completion counter for one subscription generation
//!
//! A [`CompletionCounter`] is created with the number of relays a subscription was opened on
//! and counts down once per end-of-stored-events signal. It is never re-armed: opening the
//! same subscription name again creates a new counter.

use tokio::sync::watch;

/// Counter state observed by waiters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterState {
    /// Signals still outstanding
    Pending(usize),
    /// Every relay has signaled
    Drained,
    /// Released without draining (close or shutdown)
    Aborted,
}

impl CounterState {
    /// Whether waiters have been released
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending(_))
    }
}

/// Result of waiting on a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every relay signaled end of stored events
    Drained,
    /// The subscription was never opened; nothing to wait for
    NotOpened,
    /// The subscription was closed or the coordinator shut down first
    Aborted,
    /// The caller's deadline elapsed
    TimedOut,
}

impl DrainOutcome {
    /// Whether the wait ended because every relay finished
    pub fn is_drained(&self) -> bool {
        matches!(self, Self::Drained | Self::NotOpened)
    }
}

/// One-shot countdown released at zero or on abort
#[derive(Debug)]
pub struct CompletionCounter {
    state: watch::Sender<CounterState>,
}

impl CompletionCounter {
    /// Creates a counter expecting `expected` signals. A zero count starts drained.
    pub fn new(expected: usize) -> Self {
        let initial = if expected == 0 {
            CounterState::Drained
        } else {
            CounterState::Pending(expected)
        };
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    /// Current state
    pub fn state(&self) -> CounterState {
        *self.state.borrow()
    }

    /// Signals still outstanding
    pub fn remaining(&self) -> usize {
        match self.state() {
            CounterState::Pending(n) => n,
            CounterState::Drained | CounterState::Aborted => 0,
        }
    }

    /// Decrements the counter.
    ///
    /// Returns `true` only for the call that moves the counter to [`CounterState::Drained`].
    /// Signals after the counter settled have no effect.
    pub fn signal(&self) -> bool {
        let mut released = false;
        self.state.send_if_modified(|state| match state {
            CounterState::Pending(1) => {
                *state = CounterState::Drained;
                released = true;
                true
            }
            CounterState::Pending(n) => {
                *n -= 1;
                false
            }
            CounterState::Drained | CounterState::Aborted => false,
        });
        released
    }

    /// Releases waiters with [`CounterState::Aborted`] unless already drained.
    ///
    /// Returns `true` if this call aborted the counter.
    pub fn abort(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_settled() {
                return false;
            }
            *state = CounterState::Aborted;
            true
        })
    }

    /// Waits until the counter is drained or aborted
    pub async fn wait(&self) -> CounterState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(CounterState::is_settled).await {
            Ok(state) => *state,
            // The sender lives in `self`, so this arm is unreachable while borrowed
            Err(_) => CounterState::Aborted,
        }
    }
}
