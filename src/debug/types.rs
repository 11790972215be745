//! Common types for debugging functionality.

use std::fmt;

use crate::core::{DebuggerException, RelocatedAddress};
use crate::protocol::DebuggerReply;

/// Debug session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No handshake yet
    #[default]
    Disconnected,
    /// Authenticated, waiting for target information
    Connected,
    /// Target information known, no process attached
    Ready,
    /// Attached to a target process
    Attached,
    /// Process gone or connection lost
    Terminated,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Ready => "ready",
            Self::Attached => "attached",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Debug event received from the debug client
#[derive(Debug, Clone)]
pub enum DebugEvent {
    /// A reply was applied to the process model
    ReplyReceived { id: u32, reply: DebuggerReply },
    /// The debug client reported a failed request
    ErrorReply {
        id: u32,
        reply: &'static str,
        code: u32,
    },
    /// Exception raised in the debuggee
    Exception {
        tid: u64,
        address: RelocatedAddress,
        exception: DebuggerException,
    },
    /// A reply could not be decoded and was dropped
    MessageDropped { command: &'static str, reason: String },
    /// The debug client closed the connection
    ConnectionClosed,
}

impl DebugEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReplyReceived { .. } => "reply",
            Self::ErrorReply { .. } => "error reply",
            Self::Exception { .. } => "exception",
            Self::MessageDropped { .. } => "dropped message",
            Self::ConnectionClosed => "connection closed",
        }
    }
}

/// Observer of session-level debug events.
pub trait DebugEventListener: Send + Sync {
    fn handle(&self, event: &DebugEvent);
}

impl<F> DebugEventListener for F
where
    F: Fn(&DebugEvent) + Send + Sync,
{
    fn handle(&self, event: &DebugEvent) {
        self(event)
    }
}
