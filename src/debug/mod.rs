//! Debug module - Debugger session on top of the wire protocol.
//!
//! Provides:
//! - Connection handshake and reply dispatch
//! - Breakpoint bookkeeping
//! - Command encoding with capability checks
//! - Session-level debug events

pub mod breakpoints;
pub mod connection;
pub mod session;
pub mod types;

pub use breakpoints::{BreakpointManager, BreakpointStatus};
pub use connection::DebugConnection;
pub use session::DebuggerSession;
pub use types::{DebugEvent, DebugEventListener, SessionState};
