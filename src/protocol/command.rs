//! Numeric identifiers of commands and replies on the wire.

use std::fmt;

macro_rules! command_types {
    ($($variant:ident = $value:literal => $name:literal,)*) => {
        /// Command (debugger to client) and reply (client to debugger) identifiers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum CommandType {
            $($variant = $value,)*
        }

        impl CommandType {
            pub const ALL: &'static [CommandType] = &[$(CommandType::$variant,)*];

            pub fn from_u32(value: u32) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// Protocol name as used in the debug client's logs.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }
    };
}

command_types! {
    SetBreakpoint = 1 => "CMD_SETBP",
    SetEchoBreakpoint = 2 => "CMD_SETBPE",
    SetStepBreakpoint = 3 => "CMD_SETBPS",
    RemoveBreakpoint = 4 => "CMD_REMBP",
    RemoveEchoBreakpoint = 5 => "CMD_REMBPE",
    RemoveStepBreakpoint = 6 => "CMD_REMBPS",
    ReadMemory = 7 => "CMD_READ_MEMORY",
    Registers = 8 => "CMD_REGISTERS",
    Resume = 9 => "CMD_RESUME",
    Detach = 10 => "CMD_DETACH",
    BreakpointHit = 14 => "RESP_BP_HIT",
    EchoBreakpointHit = 15 => "RESP_BPE_HIT",
    StepBreakpointHit = 16 => "RESP_BPS_HIT",
    ReadMemorySuccess = 17 => "RESP_READ_MEMORY_SUCCESS",
    RegistersSuccess = 18 => "RESP_REGISTERS_SUCCESS",
    ResumeSuccess = 19 => "RESP_RESUME_SUCCESS",
    AttachError = 23 => "RESP_ATTACH_ERROR",
    AttachSuccess = 24 => "RESP_ATTACH_SUCCESS",
    BreakpointSetSuccess = 25 => "RESP_BP_SET_SUCCESS",
    BreakpointSetError = 26 => "RESP_BP_SET_ERROR",
    ResumeError = 27 => "RESP_RESUME_ERROR",
    EchoBreakpointSetSuccess = 28 => "RESP_BPE_SET_SUCCESS",
    EchoBreakpointSetError = 29 => "RESP_BPE_SET_ERROR",
    BreakpointRemoveSuccess = 30 => "RESP_BP_REM_SUCCESS",
    BreakpointRemoveError = 31 => "RESP_BP_REM_ERROR",
    DetachSuccess = 32 => "RESP_DETACH_SUCCESS",
    DetachError = 33 => "RESP_DETACH_ERROR",
    RegistersError = 34 => "RESP_REGISTERS_ERROR",
    ReadMemoryError = 35 => "RESP_READ_MEMORY_ERROR",
    Terminate = 36 => "CMD_TERMINATE",
    TerminateSuccess = 37 => "RESP_TERMINATE_SUCCESS",
    TerminateError = 38 => "RESP_TERMINATE_ERROR",
    EchoBreakpointRemoveSuccess = 39 => "RESP_BPE_REM_SUCCESS",
    EchoBreakpointRemoveError = 40 => "RESP_BPE_REM_ERROR",
    StepBreakpointSetSuccess = 41 => "RESP_BPS_SET_SUCCESS",
    StepBreakpointSetError = 42 => "RESP_BPS_SET_ERROR",
    StepBreakpointRemoveSuccess = 43 => "RESP_BPS_REM_SUCCESS",
    StepBreakpointRemoveError = 44 => "RESP_BPS_REM_ERROR",
    Info = 45 => "RESP_INFO",
    SetRegister = 46 => "CMD_SET_REGISTER",
    SetRegisterSuccess = 47 => "RESP_SET_REGISTER_SUCCESS",
    SetRegisterError = 48 => "RESP_SET_REGISTER_ERROR",
    SingleStep = 49 => "CMD_SINGLE_STEP",
    SingleStepSuccess = 50 => "RESP_SINGLE_STEP_SUCCESS",
    SingleStepError = 51 => "RESP_SINGLE_STEP_ERROR",
    ValidMemory = 52 => "CMD_VALID_MEMORY",
    ValidMemorySuccess = 53 => "RESP_VALID_MEMORY_SUCCESS",
    ValidMemoryError = 54 => "RESP_VALID_MEMORY_ERROR",
    ThreadCreated = 55 => "RESP_THREAD_CREATED",
    ThreadClosed = 56 => "RESP_THREAD_CLOSED",
    Search = 57 => "CMD_SEARCH",
    SearchSuccess = 58 => "RESP_SEARCH_SUCCESS",
    SearchError = 59 => "RESP_SEARCH_ERROR",
    MemoryMap = 60 => "CMD_MEMMAP",
    MemoryMapSuccess = 61 => "RESP_MEMMAP_SUCCESS",
    MemoryMapError = 62 => "RESP_MEMMAP_ERROR",
    ProcessClosed = 63 => "RESP_PROCESS_CLOSED",
    ExceptionOccurred = 64 => "RESP_EXCEPTION_OCCURED",
    Halt = 65 => "CMD_HALT",
    HaltSuccess = 66 => "RESP_HALTED_SUCCESS",
    HaltError = 67 => "RESP_HALTED_ERROR",
    RequestTarget = 68 => "RESP_REQUEST_TARGET",
    ListProcesses = 69 => "CMD_LIST_PROCESSES",
    ListProcessesSuccess = 70 => "RESP_LIST_PROCESSES_SUCCESS",
    CancelTargetSelection = 71 => "CMD_CANCEL_TARGET_SELECTION",
    CancelTargetSelectionSuccess = 72 => "RESP_CANCEL_TARGET_SELECTION_SUCCESS",
    SelectProcess = 73 => "CMD_SELECT_PROCESS",
    SelectProcessSuccess = 74 => "RESP_SELECT_PROCESS_SUCCESS",
    SelectProcessError = 75 => "RESP_SELECT_PROCESS_ERROR",
    ListFiles = 76 => "CMD_LIST_FILES",
    ListFilesPath = 77 => "CMD_LIST_FILES_PATH",
    ListFilesSuccess = 78 => "RESP_LIST_FILES_SUCCESS",
    ListFilesError = 79 => "RESP_LIST_FILES_ERROR",
    SelectFile = 80 => "CMD_SELECT_FILE",
    SelectFileSuccess = 81 => "RESP_SELECT_FILE_SUCC",
    SelectFileError = 82 => "RESP_SELECT_FILE_ERR",
    ModuleLoaded = 83 => "RESP_MODULE_LOADED",
    ModuleUnloaded = 84 => "RESP_MODULE_UNLOADED",
    ResumeThread = 85 => "CMD_RESUME_THREAD",
    ResumeThreadSuccess = 86 => "RESP_RESUME_THREAD_SUCC",
    ResumeThreadError = 87 => "RESP_RESUME_THREAD_ERR",
    SuspendThread = 88 => "CMD_SUSPEND_THREAD",
    SuspendThreadSuccess = 89 => "RESP_SUSPEND_THREAD_SUCC",
    SuspendThreadError = 90 => "RESP_SUSPEND_THREAD_ERR",
    SetActiveThread = 91 => "CMD_SET_ACTIVE_THREAD",
    SetActiveThreadSuccess = 92 => "RESP_SET_ACTIVE_THREAD_SUCC",
    SetActiveThreadError = 93 => "RESP_SET_ACTIVE_THREAD_ERR",
    SetBreakpointCondition = 94 => "CMD_SET_BREAKPOINT_CONDITION",
    SetBreakpointConditionSuccess = 95 => "RESP_SET_BREAKPOINT_CONDITION_SUCC",
    SetBreakpointConditionError = 96 => "RESP_SET_BREAKPOINT_CONDITION_ERR",
    WriteMemory = 97 => "CMD_WRITE_MEMORY",
    WriteMemorySuccess = 98 => "RESP_WRITE_MEMORY_SUCC",
    WriteMemoryError = 99 => "RESP_WRITE_MEMORY_ERR",
    SetExceptions = 100 => "CMD_SET_EXCEPTIONS",
    SetExceptionsSuccess = 101 => "RESP_SET_EXCEPTIONS_SUCC",
    SetExceptionsError = 102 => "RESP_SET_EXCEPTIONS_ERR",
    SetDebuggerEventSettings = 103 => "CMD_SET_DEBUGGER_EVENT_SETTINGS",
    SetDebuggerEventSettingsSuccess = 104 => "RESP_SET_DEBUGGER_EVENT_SETTINGS_SUCC",
    SetDebuggerEventSettingsError = 105 => "RESP_SET_DEBUG_EVENT_SETTINGS_ERR",
    QueryDebuggerEventSettings = 106 => "RESP_QUERY_DEBUGGER_EVENT_SETTINGS",
    ProcessStart = 107 => "RESP_PROCESS_START",
}

impl CommandType {
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Name of a raw identifier; unknown values are reported as invalid packets.
    pub fn name_of(value: u32) -> &'static str {
        Self::from_u32(value).map_or("ERROR_INVALID_PACKET", Self::name)
    }

    /// Identifiers sent by the debug client rather than by the debugger.
    pub fn is_reply(self) -> bool {
        self.name().starts_with("RESP_")
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The three breakpoint flavours the debug client manages separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BreakpointKind {
    /// Halts the target when hit
    Regular,
    /// Reports the hit and continues immediately
    Echo,
    /// Temporary breakpoint used for stepping
    Step,
}

impl BreakpointKind {
    pub const ALL: [BreakpointKind; 3] = [Self::Regular, Self::Echo, Self::Step];

    pub fn set_command(self) -> CommandType {
        match self {
            Self::Regular => CommandType::SetBreakpoint,
            Self::Echo => CommandType::SetEchoBreakpoint,
            Self::Step => CommandType::SetStepBreakpoint,
        }
    }

    pub fn remove_command(self) -> CommandType {
        match self {
            Self::Regular => CommandType::RemoveBreakpoint,
            Self::Echo => CommandType::RemoveEchoBreakpoint,
            Self::Step => CommandType::RemoveStepBreakpoint,
        }
    }
}

impl fmt::Display for BreakpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regular => f.write_str("breakpoint"),
            Self::Echo => f.write_str("echo breakpoint"),
            Self::Step => f.write_str("step breakpoint"),
        }
    }
}
