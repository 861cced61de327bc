//! Connection state machine of the resilient channel.

/// Where a [`crate::ResilientChannel`] stands with its broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No usable connection; the next publish reconnects.
    Disconnected,
    /// Provisioning the connection; `attempt` is 1-based.
    Connecting { attempt: u32 },
    /// Connection and both streams are ready.
    Connected,
    /// Shut down; no further publishes are accepted.
    Closed,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: &ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Disconnected, Connecting { attempt }) => *attempt == 1,
            (Connected, Connecting { attempt }) => *attempt == 1,
            (Connecting { attempt: from }, Connecting { attempt: to }) => *to == from + 1,
            (Connecting { .. }, Connected) => true,
            (Connecting { .. }, Disconnected) => true,
            _ => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}
