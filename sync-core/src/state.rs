//! Session state machine for PeerSync.
//!
//! Tracks whether a peer link is up and decides which side effects the
//! coordinator must run when the link layer reports a change. The state
//! machine takes events as input and produces a new state plus a list of
//! actions; it never touches the filesystem or the network itself.

/// Session state - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No peer link.
    #[default]
    Disconnected,
    /// Peer link established.
    Connected {
        /// Address of the peer at the other end of the link.
        peer_address: String,
    },
}

/// Events reported by the link layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A link to `peer_address` is up.
    Established {
        /// Address of the peer.
        peer_address: String,
    },
    /// The link is gone.
    Terminated,
}

/// Side effects the coordinator performs, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Stop the inbound listener.
    StopServer,
    /// Delete the synchronized folder and everything in it.
    RemoveFolder,
    /// Create the synchronized folder empty.
    PrepareFolder,
    /// Start the inbound listener.
    StartServer,
    /// Re-enumerate the folder and publish the listing.
    PublishListing,
}

impl SessionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller is responsible
    /// for executing the returned actions in order.
    pub fn on_event(self, event: LinkEvent) -> (Self, Vec<SessionAction>) {
        use SessionAction::*;

        match (self, event) {
            (Self::Disconnected, LinkEvent::Established { peer_address }) => (
                Self::Connected { peer_address },
                vec![PrepareFolder, StartServer, PublishListing],
            ),

            // A second "established" replaces the session: the old listener
            // and folder go away before the new ones are created.
            (Self::Connected { .. }, LinkEvent::Established { peer_address }) => (
                Self::Connected { peer_address },
                vec![
                    StopServer,
                    RemoveFolder,
                    PrepareFolder,
                    StartServer,
                    PublishListing,
                ],
            ),

            (Self::Connected { .. }, LinkEvent::Terminated) => (
                Self::Disconnected,
                vec![StopServer, RemoveFolder, PublishListing],
            ),

            (Self::Disconnected, LinkEvent::Terminated) => (Self::Disconnected, vec![]),
        }
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Address of the connected peer, if any.
    pub fn peer_address(&self) -> Option<&str> {
        match self {
            Self::Connected { peer_address } => Some(peer_address),
            Self::Disconnected => None,
        }
    }
}
