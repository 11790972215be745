//! Error taxonomy for the protocol layer and the process model.
//!
//! Each layer owns one error enum. Messages carry the stable error-code
//! prefixes that end up in the logs.

use thiserror::Error;

use crate::core::RelocatedAddress;

/// A single reply document could not be turned into a typed value.
///
/// Recoverable per message: the session logs and drops the offending reply,
/// except for the initial target information which is fatal.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("E00060: Malformed XML in reply: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("E00061: {element} message does not have a '{attribute}' attribute")]
    MissingAttribute { element: String, attribute: String },

    #[error("E00062: {context} message does not have a '{element}' node")]
    MissingElement { context: String, element: String },

    #[error("E00063: Invalid {what} value '{value}'")]
    InvalidNumber { what: String, value: String },

    #[error("E00064: Unknown {what} '{value}'")]
    UnknownValue { what: &'static str, value: String },

    #[error("E00065: Memory string has odd length {0}")]
    OddLengthMemory(usize),

    #[error("E00066: Invalid memory string: {0}")]
    InvalidMemory(#[from] hex::FromHexError),

    #[error("E00067: Reply payload is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("E00070: {0}")]
    Invalid(String),
}

/// Framing and decoding failures of the binary packet layer.
#[derive(Error, Debug)]
pub enum PacketError {
    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("E00080: Debug client did not authenticate (received {0:02x?})")]
    Authentication([u8; 4]),

    #[error("E00081: Unknown argument type {0}")]
    UnknownArgumentType(u32),

    #[error("E00082: Argument of type {kind} has invalid length {length}")]
    ArgumentLength { kind: &'static str, length: u32 },

    #[error("E00083: Argument length {length} exceeds the maximum of {max} bytes")]
    Oversized { length: u32, max: u32 },

    #[error("IE01085: Received unknown message {0}")]
    UnknownReply(u32),

    #[error("E00084: Reply {reply} has an unexpected argument layout: {reason}")]
    Layout { reply: &'static str, reason: String },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Contract violations of the process model.
///
/// These indicate that the debug client stream and the model went out of
/// sync and are surfaced instead of healed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("IE00757: Module '{name}' can not be added twice")]
    DuplicateModule { name: String },

    #[error("IE00759: Module '{name}' was not part of this process")]
    UnknownModule { name: String },

    #[error("IE00369: Unknown thread {tid}")]
    UnknownThread { tid: u64 },
}

/// Failures of the debugger session state machine.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("E00090: Target information could not be decoded: {0}")]
    Handshake(#[source] PacketError),

    #[error("E00091: Debugger is not attached to a target process")]
    NotAttached,

    #[error("E00092: Debug client does not support {0}")]
    Unsupported(&'static str),

    #[error("E00093: Operation '{operation}' is invalid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("E00094: Breakpoint limit of {limit} reached")]
    BreakpointLimit { limit: u32 },

    #[error("E00095: Address {0} is not mapped in the target process")]
    Unmapped(RelocatedAddress),

    #[error(transparent)]
    Packet(#[from] PacketError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        SessionError::Packet(PacketError::Io(e))
    }
}
