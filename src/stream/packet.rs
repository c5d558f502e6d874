//! Reference stream implementation
//!
//! `PacketStream` carries the lifecycle of a stream without any media
//! pipeline. It is what the manager is exercised with, and a starting point
//! for wrapping a real pipeline.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::signal::StateSignal;
use super::state::StreamState;
use super::ManagedStream;

/// How a close request completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// `close()` goes through Closing to Closed before returning
    Immediate,
    /// `close()` stops at Closing; [`PacketStream::finish_close`] completes it
    Deferred,
}

/// Stream with a name, a state machine and a state-change signal
pub struct PacketStream {
    /// Stream name
    name: String,

    /// Current state
    state: Mutex<StreamState>,

    /// Close behavior
    close_mode: CloseMode,

    /// Number of close requests received
    close_requests: AtomicU32,

    /// State-change observers
    signal: StateSignal<PacketStream>,
}

impl PacketStream {
    /// Create an active stream that closes immediately
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_close_mode(name, CloseMode::Immediate)
    }

    /// Create an active stream with the given close behavior
    pub fn with_close_mode(name: impl Into<String>, close_mode: CloseMode) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(StreamState::Active),
            close_mode,
            close_requests: AtomicU32::new(0),
            signal: StateSignal::new(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Get the close behavior
    pub fn close_mode(&self) -> CloseMode {
        self.close_mode
    }

    /// Get the number of close requests received so far
    pub fn close_requests(&self) -> u32 {
        self.close_requests.load(Ordering::Relaxed)
    }

    /// Move to `new_state` and notify observers
    ///
    /// Returns `false` without notifying if the stream is already in
    /// `new_state` or already closed. The state lock is released before
    /// observers run.
    pub fn set_state(&self, new_state: StreamState) -> bool {
        let old_state = {
            let mut state = self.lock_state();
            if *state == new_state {
                return false;
            }
            if state.is_terminal() {
                tracing::warn!(
                    stream = %self.name,
                    requested = %new_state,
                    "Transition out of closed state refused"
                );
                return false;
            }
            std::mem::replace(&mut *state, new_state)
        };

        tracing::debug!(
            stream = %self.name,
            from = %old_state,
            to = %new_state,
            "Stream state change"
        );

        self.signal.emit(self, new_state, old_state);
        true
    }

    /// Complete a deferred close
    pub fn finish_close(&self) -> bool {
        self.set_state(StreamState::Closed)
    }
}

impl ManagedStream for PacketStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> StreamState {
        *self.lock_state()
    }

    fn close(&self) {
        self.close_requests.fetch_add(1, Ordering::Relaxed);
        self.set_state(StreamState::Closing);

        if self.close_mode == CloseMode::Immediate {
            self.set_state(StreamState::Closed);
        }
    }

    fn state_change(&self) -> &StateSignal<Self> {
        &self.signal
    }
}

impl std::fmt::Debug for PacketStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketStream")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("close_mode", &self.close_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::stream::ListenerId;

    fn transitions(stream: &PacketStream) -> Arc<Mutex<Vec<(StreamState, StreamState)>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&log);
        stream
            .state_change()
            .connect(ListenerId::next(), 0, move |_, new, old| {
                out.lock().unwrap().push((new, old));
            });
        log
    }

    #[test]
    fn test_immediate_close() {
        let stream = PacketStream::new("cam1");
        let log = transitions(&stream);

        assert_eq!(stream.state(), StreamState::Active);
        stream.close();

        assert_eq!(stream.state(), StreamState::Closed);
        assert_eq!(stream.close_requests(), 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (StreamState::Closing, StreamState::Active),
                (StreamState::Closed, StreamState::Closing),
            ]
        );
    }

    #[test]
    fn test_deferred_close() {
        let stream = PacketStream::with_close_mode("cam1", CloseMode::Deferred);

        stream.close();
        assert_eq!(stream.state(), StreamState::Closing);

        assert!(stream.finish_close());
        assert_eq!(stream.state(), StreamState::Closed);
        assert!(!stream.finish_close());
    }

    #[test]
    fn test_closed_is_terminal() {
        let stream = PacketStream::new("cam1");
        let log = transitions(&stream);

        stream.close();
        assert!(!stream.set_state(StreamState::Active));
        stream.close();

        assert_eq!(stream.state(), StreamState::Closed);
        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(stream.close_requests(), 2);
    }

    #[test]
    fn test_sender_is_self() {
        let stream = PacketStream::new("cam1");
        let name = Arc::new(Mutex::new(String::new()));
        let out = Arc::clone(&name);

        stream
            .state_change()
            .connect(ListenerId::next(), 0, move |sender, _, _| {
                *out.lock().unwrap() = sender.name().to_owned();
            });
        stream.set_state(StreamState::Closing);

        assert_eq!(*name.lock().unwrap(), "cam1");
    }
}
