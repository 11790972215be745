//! Core module - Target process model
//!
//! Everything the debugger knows about the debuggee: target description,
//! threads, modules, memory layout, register snapshots and the simulated
//! memory store. `ProcessManager` ties them together.

pub mod address;
pub mod memory;
pub mod module;
pub mod process;
pub mod registers;
pub mod target;
pub mod thread;

// Re-export common types
pub use address::RelocatedAddress;
pub use memory::{Memory, MemoryError, MemoryMap, MemorySection};
pub use module::MemoryModule;
pub use process::{ProcessEvent, ProcessManager, ProcessManagerListener};
pub use registers::{RegisterRole, RegisterValue, RegisterValues, ThreadRegisters};
pub use target::{
    DebuggerException, DebuggerOptions, DebuggerOptionsBuilder, ExceptionHandlingAction,
    RegisterDescription, TargetInformation,
};
pub use thread::{TargetProcessThread, ThreadEvent, ThreadListener, ThreadState};
