//! Target architecture and debug client capabilities.
//!
//! Built once per session from the initial handshake reply and replaced
//! wholesale on reconnect. Nothing in here is mutable after construction.

use std::fmt;
use std::num::NonZeroU32;

/// What the debug client does when the debuggee raises an exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionHandlingAction {
    Continue,
    Halt,
    Ignore,
}

impl ExceptionHandlingAction {
    /// Decode the numeric wire encoding (0, 1, 2).
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Continue),
            1 => Some(Self::Halt),
            2 => Some(Self::Ignore),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Continue => 0,
            Self::Halt => 1,
            Self::Ignore => 2,
        }
    }
}

impl fmt::Display for ExceptionHandlingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Continue => "continue",
            Self::Halt => "halt",
            Self::Ignore => "ignore",
        };
        f.write_str(s)
    }
}

/// A platform-specific exception the debug client knows about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebuggerException {
    pub name: String,
    pub code: u64,
    pub action: ExceptionHandlingAction,
}

impl DebuggerException {
    pub fn new(name: impl Into<String>, code: u64, action: ExceptionHandlingAction) -> Self {
        Self {
            name: name.into(),
            code,
            action,
        }
    }
}

/// Capabilities of the connected debug client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerOptions {
    can_detach: bool,
    can_attach: bool,
    can_terminate: bool,
    can_memmap: bool,
    stack_available: bool,
    can_validate_memory: bool,
    can_halt: bool,
    halt_before_communicating: bool,
    can_multithread: bool,
    can_software_breakpoints: bool,
    breakpoint_counter: NonZeroU32,
    page_size: u32,
    exceptions: Vec<DebuggerException>,
    can_break_on_module_load: bool,
    can_break_on_module_unload: bool,
    can_trace_counts: bool,
}

impl DebuggerOptions {
    pub fn builder() -> DebuggerOptionsBuilder {
        DebuggerOptionsBuilder::default()
    }

    pub fn can_detach(&self) -> bool {
        self.can_detach
    }

    pub fn can_attach(&self) -> bool {
        self.can_attach
    }

    pub fn can_terminate(&self) -> bool {
        self.can_terminate
    }

    pub fn can_memmap(&self) -> bool {
        self.can_memmap
    }

    pub fn stack_available(&self) -> bool {
        self.stack_available
    }

    pub fn can_validate_memory(&self) -> bool {
        self.can_validate_memory
    }

    pub fn can_halt(&self) -> bool {
        self.can_halt
    }

    /// The debuggee must be halted before any other command is sent.
    pub fn must_halt_before_communicating(&self) -> bool {
        self.halt_before_communicating
    }

    pub fn can_multithread(&self) -> bool {
        self.can_multithread
    }

    pub fn can_software_breakpoints(&self) -> bool {
        self.can_software_breakpoints
    }

    /// Maximum number of simultaneously set breakpoints.
    pub fn breakpoint_counter(&self) -> u32 {
        self.breakpoint_counter.get()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn exceptions(&self) -> &[DebuggerException] {
        &self.exceptions
    }

    /// Known exception with the given code, if the client announced one.
    pub fn exception(&self, code: u64) -> Option<&DebuggerException> {
        self.exceptions.iter().find(|e| e.code == code)
    }

    pub fn can_break_on_module_load(&self) -> bool {
        self.can_break_on_module_load
    }

    pub fn can_break_on_module_unload(&self) -> bool {
        self.can_break_on_module_unload
    }

    pub fn can_trace_counts(&self) -> bool {
        self.can_trace_counts
    }
}

impl Default for DebuggerOptions {
    fn default() -> Self {
        DebuggerOptionsBuilder::default().build()
    }
}

/// Builder for [`DebuggerOptions`]; unset flags keep conservative defaults.
#[derive(Debug, Clone)]
pub struct DebuggerOptionsBuilder {
    options: DebuggerOptions,
}

impl Default for DebuggerOptionsBuilder {
    fn default() -> Self {
        Self {
            options: DebuggerOptions {
                can_detach: true,
                can_attach: true,
                can_terminate: true,
                can_memmap: true,
                stack_available: true,
                can_validate_memory: true,
                can_halt: false,
                halt_before_communicating: false,
                can_multithread: true,
                can_software_breakpoints: true,
                breakpoint_counter: NonZeroU32::MAX,
                page_size: 0,
                exceptions: Vec::new(),
                can_break_on_module_load: false,
                can_break_on_module_unload: false,
                can_trace_counts: true,
            },
        }
    }
}

macro_rules! flag_setters {
    ($($name:ident),* $(,)?) => {
        $(
            pub fn $name(mut self, value: bool) -> Self {
                self.options.$name = value;
                self
            }
        )*
    };
}

impl DebuggerOptionsBuilder {
    flag_setters!(
        can_detach,
        can_attach,
        can_terminate,
        can_memmap,
        stack_available,
        can_validate_memory,
        can_halt,
        can_multithread,
        can_software_breakpoints,
        can_break_on_module_load,
        can_break_on_module_unload,
        can_trace_counts,
    );

    pub fn can_halt_before_communicating(mut self, value: bool) -> Self {
        self.options.halt_before_communicating = value;
        self
    }

    pub fn breakpoint_counter(mut self, value: NonZeroU32) -> Self {
        self.options.breakpoint_counter = value;
        self
    }

    pub fn page_size(mut self, value: u32) -> Self {
        self.options.page_size = value;
        self
    }

    pub fn add_exception(mut self, exception: DebuggerException) -> Self {
        self.options.exceptions.push(exception);
        self
    }

    pub fn build(self) -> DebuggerOptions {
        self.options
    }
}

/// Name and layout of one register of the target platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegisterDescription {
    pub name: String,
    /// Size in bytes; one of 0, 1, 2, 4 or 8.
    pub size: u8,
    pub editable: bool,
}

impl RegisterDescription {
    pub const VALID_SIZES: [u8; 5] = [0, 1, 2, 4, 8];

    /// Returns `None` when `size` is not a register width the protocol knows.
    pub fn new(name: impl Into<String>, size: u8, editable: bool) -> Option<Self> {
        Self::VALID_SIZES.contains(&size).then(|| Self {
            name: name.into(),
            size,
            editable,
        })
    }
}

/// Immutable snapshot of the target architecture for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInformation {
    address_size: NonZeroU32,
    registers: Vec<RegisterDescription>,
    options: DebuggerOptions,
}

impl TargetInformation {
    pub fn new(
        address_size: NonZeroU32,
        registers: Vec<RegisterDescription>,
        options: DebuggerOptions,
    ) -> Self {
        Self {
            address_size,
            registers,
            options,
        }
    }

    /// Address width as reported by the debug client (e.g. 32 or 64).
    pub fn address_size(&self) -> u32 {
        self.address_size.get()
    }

    pub fn registers(&self) -> &[RegisterDescription] {
        &self.registers
    }

    /// Index of a register in the description list, as used by set-register.
    pub fn register_index(&self, name: &str) -> Option<usize> {
        self.registers
            .iter()
            .position(|r| r.name.eq_ignore_ascii_case(name))
    }

    pub fn debugger_options(&self) -> &DebuggerOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_are_conservative() {
        let options = DebuggerOptions::default();
        assert!(options.can_detach());
        assert!(!options.can_halt());
        assert!(!options.can_break_on_module_load());
        assert_eq!(options.breakpoint_counter(), u32::MAX);
        assert_eq!(options.page_size(), 0);
        assert!(options.exceptions().is_empty());
    }

    #[test]
    fn builder_records_exceptions_in_order() {
        let options = DebuggerOptions::builder()
            .can_halt(true)
            .add_exception(DebuggerException::new("Access violation", 0xC0000005, ExceptionHandlingAction::Halt))
            .add_exception(DebuggerException::new("Breakpoint", 0x80000003, ExceptionHandlingAction::Ignore))
            .build();

        assert!(options.can_halt());
        assert_eq!(options.exceptions().len(), 2);
        assert_eq!(options.exception(0x80000003).map(|e| e.name.as_str()), Some("Breakpoint"));
        assert!(options.exception(1).is_none());
    }

    #[test]
    fn register_description_rejects_odd_sizes() {
        assert!(RegisterDescription::new("eax", 4, true).is_some());
        assert!(RegisterDescription::new("weird", 3, false).is_none());
    }

    #[test]
    fn handling_action_codes() {
        assert_eq!(ExceptionHandlingAction::from_code(1), Some(ExceptionHandlingAction::Halt));
        assert_eq!(ExceptionHandlingAction::from_code(3), None);
        assert_eq!(ExceptionHandlingAction::Ignore.code(), 2);
    }
}
