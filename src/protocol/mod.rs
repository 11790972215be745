//! Protocol module - Debug client wire protocol
//!
//! Binary packet framing, command identifiers, typed replies and the XML
//! parsers for documents embedded in replies.

pub mod command;
pub mod packet;
pub mod parsers;
pub mod reply;

pub use command::{BreakpointKind, CommandType};
pub use packet::{read_authentication, Argument, Packet, PacketHeader, AUTHENTICATION_MAGIC};
pub use reply::{BreakpointResult, DebuggerReply, ReplyResult, StopReport};
