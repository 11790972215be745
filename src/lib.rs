//! navidbg - Debug client wire protocol and target process model
//!
//! Talks to an out-of-process debug client over a binary packet protocol
//! with embedded XML documents and keeps a consistent model of the
//! debuggee: threads, modules, memory layout, registers and breakpoints.
//!
//! ```no_run
//! use std::net::TcpStream;
//! use navidbg::{DebuggerSession, SessionConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = TcpStream::connect("127.0.0.1:2222")?;
//! let mut reader = stream.try_clone()?;
//! let mut session = DebuggerSession::new(stream, SessionConfig::default());
//! session.run(&mut reader)?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod core;
pub mod debug;
pub mod error;
pub mod listener;
pub mod protocol;
pub mod ui;

pub use crate::config::SessionConfig;
pub use crate::core::{ProcessEvent, ProcessManager, ProcessManagerListener};
pub use crate::debug::{DebugEvent, DebugEventListener, DebuggerSession, SessionState};
pub use crate::error::{PacketError, ParseError, ProcessError, SessionError};
pub use crate::listener::ListenerProvider;
pub use crate::protocol::{DebuggerReply, Packet};
