//! Stream lifecycle state

/// Externally visible lifecycle state of a managed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// Stream is running
    Active,
    /// Close was requested, teardown in progress
    Closing,
    /// Stream is closed (terminal)
    Closed,
}

impl StreamState {
    /// Check if this is the terminal state
    pub fn is_terminal(&self) -> bool {
        *self == StreamState::Closed
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StreamState::Active => "active",
            StreamState::Closing => "closing",
            StreamState::Closed => "closed",
        };
        f.write_str(s)
    }
}
