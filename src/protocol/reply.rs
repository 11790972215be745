//! Typed replies of the debug client
//!
//! `DebuggerReply::from_packet` checks the argument layout of a reply and
//! runs the XML parsers on embedded documents. Error replies decode to the
//! same variant as their success counterpart with `Err(code)`.

use crate::core::{
    MemoryMap, MemoryModule, MemorySection, RegisterValues, RelocatedAddress, TargetInformation,
    ThreadState,
};
use crate::error::PacketError;
use crate::protocol::parsers::{
    self, parse_exception, parse_module, parse_process_start, parse_register_values,
    parse_target_information, ExceptionReport, ProcessStart,
};
use crate::protocol::{Argument, BreakpointKind, CommandType, Packet};

/// Success payload or the error code sent by the debug client.
pub type ReplyResult<T> = Result<T, u32>;

/// Suspension caused by a breakpoint or a completed single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    pub tid: u64,
    /// Where the thread stopped; taken from the program counter when the
    /// reply does not carry it explicitly.
    pub address: Option<RelocatedAddress>,
    pub registers: RegisterValues,
}

/// Per-address outcome of a breakpoint set or remove request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointResult {
    pub address: RelocatedAddress,
    /// Zero on success
    pub error: u32,
}

/// One decoded reply.
#[derive(Debug, Clone)]
pub enum DebuggerReply {
    Info(TargetInformation),
    RequestTarget,
    Attach(ReplyResult<()>),
    Detach(ReplyResult<()>),
    Terminate(ReplyResult<()>),
    ProcessClosed,
    ProcessStart(ProcessStart),
    Resume(ReplyResult<()>),
    Halt(ReplyResult<()>),
    SingleStep(ReplyResult<StopReport>),
    BreakpointHit {
        kind: BreakpointKind,
        report: StopReport,
    },
    BreakpointsSet {
        kind: BreakpointKind,
        result: ReplyResult<Vec<BreakpointResult>>,
    },
    BreakpointsRemoved {
        kind: BreakpointKind,
        result: ReplyResult<Vec<BreakpointResult>>,
    },
    Registers(ReplyResult<RegisterValues>),
    SetRegister(ReplyResult<(u64, u32)>),
    ReadMemory(ReplyResult<(RelocatedAddress, Vec<u8>)>),
    WriteMemory(ReplyResult<()>),
    MemoryMap(ReplyResult<MemoryMap>),
    ValidMemory(ReplyResult<(RelocatedAddress, RelocatedAddress)>),
    Search(ReplyResult<RelocatedAddress>),
    ThreadCreated {
        tid: u64,
        state: ThreadState,
    },
    ThreadClosed {
        tid: u64,
    },
    ResumeThread(ReplyResult<u64>),
    SuspendThread(ReplyResult<u64>),
    SetActiveThread(ReplyResult<u64>),
    ModuleLoaded(MemoryModule),
    ModuleUnloaded(MemoryModule),
    ExceptionOccurred(ExceptionReport),
    BreakpointConditionSet(ReplyResult<()>),
    SetExceptions(ReplyResult<()>),
    SetDebuggerEventSettings(ReplyResult<()>),
    /// Target selection and settings replies that carry nothing the process
    /// model uses
    Other {
        command: CommandType,
        result: ReplyResult<()>,
    },
}

impl DebuggerReply {
    pub fn from_packet(packet: &Packet) -> Result<Self, PacketError> {
        use CommandType as C;

        let command = packet
            .command_type()
            .filter(|c| c.is_reply())
            .ok_or(PacketError::UnknownReply(packet.command))?;
        let mut args = Arguments::new(command.name(), &packet.arguments);

        let reply = match command {
            C::Info => Self::Info(parse_target_information(args.data()?)?),
            C::RequestTarget => Self::RequestTarget,
            C::AttachSuccess => Self::Attach(Ok(())),
            C::AttachError => Self::Attach(Err(args.error_code())),
            C::DetachSuccess => Self::Detach(Ok(())),
            C::DetachError => Self::Detach(Err(args.error_code())),
            C::TerminateSuccess => Self::Terminate(Ok(())),
            C::TerminateError => Self::Terminate(Err(args.error_code())),
            C::ProcessClosed => Self::ProcessClosed,
            C::ProcessStart => Self::ProcessStart(parse_process_start(args.data()?)?),
            C::ResumeSuccess => Self::Resume(Ok(())),
            C::ResumeError => Self::Resume(Err(args.error_code())),
            C::HaltSuccess => Self::Halt(Ok(())),
            C::HaltError => Self::Halt(Err(args.error_code())),
            C::SingleStepSuccess => Self::SingleStep(Ok(args.stop_report()?)),
            C::SingleStepError => Self::SingleStep(Err(args.error_code())),
            C::BreakpointHit => Self::hit(BreakpointKind::Regular, &mut args)?,
            C::EchoBreakpointHit => Self::hit(BreakpointKind::Echo, &mut args)?,
            C::StepBreakpointHit => Self::hit(BreakpointKind::Step, &mut args)?,
            C::BreakpointSetSuccess => Self::set(BreakpointKind::Regular, Ok(args.breakpoints()?)),
            C::BreakpointSetError => Self::set(BreakpointKind::Regular, Err(args.error_code())),
            C::EchoBreakpointSetSuccess => Self::set(BreakpointKind::Echo, Ok(args.breakpoints()?)),
            C::EchoBreakpointSetError => Self::set(BreakpointKind::Echo, Err(args.error_code())),
            C::StepBreakpointSetSuccess => Self::set(BreakpointKind::Step, Ok(args.breakpoints()?)),
            C::StepBreakpointSetError => Self::set(BreakpointKind::Step, Err(args.error_code())),
            C::BreakpointRemoveSuccess => Self::removed(BreakpointKind::Regular, Ok(args.breakpoints()?)),
            C::BreakpointRemoveError => Self::removed(BreakpointKind::Regular, Err(args.error_code())),
            C::EchoBreakpointRemoveSuccess => Self::removed(BreakpointKind::Echo, Ok(args.breakpoints()?)),
            C::EchoBreakpointRemoveError => Self::removed(BreakpointKind::Echo, Err(args.error_code())),
            C::StepBreakpointRemoveSuccess => Self::removed(BreakpointKind::Step, Ok(args.breakpoints()?)),
            C::StepBreakpointRemoveError => Self::removed(BreakpointKind::Step, Err(args.error_code())),
            C::RegistersSuccess => Self::Registers(Ok(parse_register_values(args.data()?)?)),
            C::RegistersError => Self::Registers(Err(args.error_code())),
            C::SetRegisterSuccess => {
                let tid = args.integer()?;
                let index = args.value()?;
                Self::SetRegister(Ok((tid, index)))
            }
            C::SetRegisterError => Self::SetRegister(Err(args.error_code())),
            C::ReadMemorySuccess => {
                let address = args.address()?;
                let data = args.data()?.to_vec();
                Self::ReadMemory(Ok((address, data)))
            }
            C::ReadMemoryError => Self::ReadMemory(Err(args.error_code())),
            C::WriteMemorySuccess => Self::WriteMemory(Ok(())),
            C::WriteMemoryError => Self::WriteMemory(Err(args.error_code())),
            C::MemoryMapSuccess => Self::MemoryMap(Ok(args.memory_map()?)),
            C::MemoryMapError => Self::MemoryMap(Err(args.error_code())),
            C::ValidMemorySuccess => {
                let start = args.address()?;
                let end = args.address()?;
                Self::ValidMemory(Ok((start, end)))
            }
            C::ValidMemoryError => Self::ValidMemory(Err(args.error_code())),
            C::SearchSuccess => Self::Search(Ok(args.address()?)),
            C::SearchError => Self::Search(Err(args.error_code())),
            C::ThreadCreated => {
                let tid = args.integer()?;
                let code = args.value()?;
                let state = parsers::process_start::parse_thread_state(code)?;
                Self::ThreadCreated { tid, state }
            }
            C::ThreadClosed => Self::ThreadClosed {
                tid: args.integer()?,
            },
            C::ResumeThreadSuccess => Self::ResumeThread(Ok(args.integer()?)),
            C::ResumeThreadError => Self::ResumeThread(Err(args.error_code())),
            C::SuspendThreadSuccess => Self::SuspendThread(Ok(args.integer()?)),
            C::SuspendThreadError => Self::SuspendThread(Err(args.error_code())),
            C::SetActiveThreadSuccess => Self::SetActiveThread(Ok(args.integer()?)),
            C::SetActiveThreadError => Self::SetActiveThread(Err(args.error_code())),
            C::ModuleLoaded => Self::ModuleLoaded(parse_module(args.data()?)?),
            C::ModuleUnloaded => Self::ModuleUnloaded(parse_module(args.data()?)?),
            C::ExceptionOccurred => Self::ExceptionOccurred(parse_exception(args.data()?)?),
            C::SetBreakpointConditionSuccess => Self::BreakpointConditionSet(Ok(())),
            C::SetBreakpointConditionError => Self::BreakpointConditionSet(Err(args.error_code())),
            C::SetExceptionsSuccess => Self::SetExceptions(Ok(())),
            C::SetExceptionsError => Self::SetExceptions(Err(args.error_code())),
            C::SetDebuggerEventSettingsSuccess => Self::SetDebuggerEventSettings(Ok(())),
            C::SetDebuggerEventSettingsError => {
                Self::SetDebuggerEventSettings(Err(args.error_code()))
            }
            C::SelectProcessError | C::ListFilesError | C::SelectFileError => Self::Other {
                command,
                result: Err(args.error_code()),
            },
            other => Self::Other {
                command: other,
                result: Ok(()),
            },
        };
        Ok(reply)
    }

    fn hit(kind: BreakpointKind, args: &mut Arguments<'_>) -> Result<Self, PacketError> {
        Ok(Self::BreakpointHit {
            kind,
            report: args.stop_report()?,
        })
    }

    fn set(kind: BreakpointKind, result: ReplyResult<Vec<BreakpointResult>>) -> Self {
        Self::BreakpointsSet { kind, result }
    }

    fn removed(kind: BreakpointKind, result: ReplyResult<Vec<BreakpointResult>>) -> Self {
        Self::BreakpointsRemoved { kind, result }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Info(_) => "target information",
            Self::RequestTarget => "target request",
            Self::Attach(_) => "attach",
            Self::Detach(_) => "detach",
            Self::Terminate(_) => "terminate",
            Self::ProcessClosed => "process closed",
            Self::ProcessStart(_) => "process start",
            Self::Resume(_) => "resume",
            Self::Halt(_) => "halt",
            Self::SingleStep(_) => "single step",
            Self::BreakpointHit { .. } => "breakpoint hit",
            Self::BreakpointsSet { .. } => "breakpoints set",
            Self::BreakpointsRemoved { .. } => "breakpoints removed",
            Self::Registers(_) => "registers",
            Self::SetRegister(_) => "set register",
            Self::ReadMemory(_) => "read memory",
            Self::WriteMemory(_) => "write memory",
            Self::MemoryMap(_) => "memory map",
            Self::ValidMemory(_) => "valid memory",
            Self::Search(_) => "search",
            Self::ThreadCreated { .. } => "thread created",
            Self::ThreadClosed { .. } => "thread closed",
            Self::ResumeThread(_) => "resume thread",
            Self::SuspendThread(_) => "suspend thread",
            Self::SetActiveThread(_) => "set active thread",
            Self::ModuleLoaded(_) => "module loaded",
            Self::ModuleUnloaded(_) => "module unloaded",
            Self::ExceptionOccurred(_) => "exception",
            Self::BreakpointConditionSet(_) => "breakpoint condition",
            Self::SetExceptions(_) => "set exceptions",
            Self::SetDebuggerEventSettings(_) => "debugger event settings",
            Self::Other { command, .. } => command.name(),
        }
    }

    /// Error code of a failed request, if this reply reports one.
    pub fn error_code(&self) -> Option<u32> {
        match self {
            Self::Attach(Err(c))
            | Self::Detach(Err(c))
            | Self::Terminate(Err(c))
            | Self::Resume(Err(c))
            | Self::Halt(Err(c))
            | Self::SingleStep(Err(c))
            | Self::BreakpointsSet { result: Err(c), .. }
            | Self::BreakpointsRemoved { result: Err(c), .. }
            | Self::Registers(Err(c))
            | Self::SetRegister(Err(c))
            | Self::ReadMemory(Err(c))
            | Self::WriteMemory(Err(c))
            | Self::MemoryMap(Err(c))
            | Self::ValidMemory(Err(c))
            | Self::Search(Err(c))
            | Self::ResumeThread(Err(c))
            | Self::SuspendThread(Err(c))
            | Self::SetActiveThread(Err(c))
            | Self::BreakpointConditionSet(Err(c))
            | Self::SetExceptions(Err(c))
            | Self::SetDebuggerEventSettings(Err(c))
            | Self::Other { result: Err(c), .. } => Some(*c),
            _ => None,
        }
    }
}

/// Sequential reader over the arguments of one reply.
struct Arguments<'a> {
    reply: &'static str,
    remaining: std::slice::Iter<'a, Argument>,
}

impl<'a> Arguments<'a> {
    fn new(reply: &'static str, arguments: &'a [Argument]) -> Self {
        Self {
            reply,
            remaining: arguments.iter(),
        }
    }

    fn layout(&self, reason: impl Into<String>) -> PacketError {
        PacketError::Layout {
            reply: self.reply,
            reason: reason.into(),
        }
    }

    fn next(&mut self, expected: &str) -> Result<&'a Argument, PacketError> {
        self.remaining
            .next()
            .ok_or_else(|| self.layout(format!("missing {expected} argument")))
    }

    fn value(&mut self) -> Result<u32, PacketError> {
        match self.next("value")? {
            Argument::Value(v) => Ok(*v),
            other => Err(self.layout(format!("expected value, found {}", other.kind()))),
        }
    }

    /// Value or long; thread ids come as either depending on the client.
    fn integer(&mut self) -> Result<u64, PacketError> {
        match self.next("integer")? {
            Argument::Value(v) => Ok(u64::from(*v)),
            Argument::Long(v) => Ok(*v),
            other => Err(self.layout(format!("expected integer, found {}", other.kind()))),
        }
    }

    fn address(&mut self) -> Result<RelocatedAddress, PacketError> {
        match self.next("address")? {
            Argument::Address(a) => Ok(RelocatedAddress(*a)),
            other => Err(self.layout(format!("expected address, found {}", other.kind()))),
        }
    }

    fn data(&mut self) -> Result<&'a [u8], PacketError> {
        match self.next("data")? {
            Argument::Data(d) => Ok(d),
            other => Err(self.layout(format!("expected data, found {}", other.kind()))),
        }
    }

    fn peek(&self) -> Option<&'a Argument> {
        self.remaining.clone().next()
    }

    /// Error replies carry an optional error code.
    fn error_code(&self) -> u32 {
        match self.peek() {
            Some(Argument::Value(code)) => *code,
            Some(Argument::Long(code)) => *code as u32,
            _ => 0,
        }
    }

    /// Thread id, optional stop address, register document.
    fn stop_report(&mut self) -> Result<StopReport, PacketError> {
        let tid = self.integer()?;
        let mut address = match self.peek() {
            Some(Argument::Address(_)) => Some(self.address()?),
            _ => None,
        };
        let registers = parse_register_values(self.data()?)?;
        if address.is_none() {
            address = registers
                .thread(tid)
                .and_then(|t| t.program_counter())
                .and_then(|pc| pc.value_u64())
                .map(RelocatedAddress);
        }
        Ok(StopReport {
            tid,
            address,
            registers,
        })
    }

    /// Count followed by address/error-code pairs. Some clients send a
    /// single bare address instead.
    fn breakpoints(&mut self) -> Result<Vec<BreakpointResult>, PacketError> {
        if let Some(Argument::Address(_)) = self.peek() {
            let address = self.address()?;
            return Ok(vec![BreakpointResult { address, error: 0 }]);
        }
        let count = self.value()?;
        (0..count)
            .map(|_| -> Result<BreakpointResult, PacketError> {
                let address = self.address()?;
                let error = self.value()?;
                Ok(BreakpointResult { address, error })
            })
            .collect()
    }

    /// Start/end address pairs, optionally preceded by a count.
    fn memory_map(&mut self) -> Result<MemoryMap, PacketError> {
        if let Some(Argument::Value(_)) = self.peek() {
            self.value()?;
        }
        let mut sections = Vec::new();
        while self.peek().is_some() {
            let start = self.address()?;
            let end = self.address()?;
            let section = MemorySection::new(start, end).map_err(|e| self.layout(e.to_string()))?;
            sections.push(section);
        }
        MemoryMap::new(sections).map_err(|e| self.layout(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(command: CommandType, arguments: Vec<Argument>) -> Packet {
        Packet::new(command, 0, arguments)
    }

    const REGISTERS: &str = r#"<Registers><Thread id="5"><Register name="eip" value="401000" memory="" pc="true"/></Thread></Registers>"#;

    #[test]
    fn breakpoint_hit_takes_address_from_program_counter() {
        let reply = DebuggerReply::from_packet(&packet(
            CommandType::BreakpointHit,
            vec![Argument::Value(5), Argument::Data(REGISTERS.as_bytes().to_vec())],
        ))
        .unwrap();
        match reply {
            DebuggerReply::BreakpointHit { kind, report } => {
                assert_eq!(kind, BreakpointKind::Regular);
                assert_eq!(report.tid, 5);
                assert_eq!(report.address, Some(RelocatedAddress(0x401000)));
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn single_step_with_explicit_address() {
        let reply = DebuggerReply::from_packet(&packet(
            CommandType::SingleStepSuccess,
            vec![
                Argument::Value(5),
                Argument::Address(0x401005),
                Argument::Data(REGISTERS.as_bytes().to_vec()),
            ],
        ))
        .unwrap();
        let DebuggerReply::SingleStep(Ok(report)) = reply else {
            panic!("expected single step");
        };
        assert_eq!(report.address, Some(RelocatedAddress(0x401005)));
    }

    #[test]
    fn breakpoint_set_pairs() {
        let reply = DebuggerReply::from_packet(&packet(
            CommandType::EchoBreakpointSetSuccess,
            vec![
                Argument::Value(2),
                Argument::Address(0x1000),
                Argument::Value(0),
                Argument::Address(0x2000),
                Argument::Value(5),
            ],
        ))
        .unwrap();
        let DebuggerReply::BreakpointsSet { kind, result: Ok(results) } = reply else {
            panic!("expected breakpoint set reply");
        };
        assert_eq!(kind, BreakpointKind::Echo);
        assert_eq!(results[1], BreakpointResult { address: RelocatedAddress(0x2000), error: 5 });
    }

    #[test]
    fn error_replies_carry_code() {
        let reply =
            DebuggerReply::from_packet(&packet(CommandType::DetachError, vec![Argument::Value(7)]))
                .unwrap();
        assert_eq!(reply.error_code(), Some(7));
        assert!(matches!(reply, DebuggerReply::Detach(Err(7))));
    }

    #[test]
    fn memory_map_sections() {
        let reply = DebuggerReply::from_packet(&packet(
            CommandType::MemoryMapSuccess,
            vec![
                Argument::Address(0x2000),
                Argument::Address(0x2fff),
                Argument::Address(0x1000),
                Argument::Address(0x1fff),
            ],
        ))
        .unwrap();
        let DebuggerReply::MemoryMap(Ok(map)) = reply else {
            panic!("expected memory map");
        };
        assert_eq!(map.len(), 2);
        assert_eq!(map.sections()[0].start(), RelocatedAddress(0x1000));
    }

    #[test]
    fn wrong_layout_is_reported() {
        let err = DebuggerReply::from_packet(&packet(
            CommandType::ReadMemorySuccess,
            vec![Argument::Value(1)],
        ))
        .unwrap_err();
        assert!(matches!(err, PacketError::Layout { reply: "RESP_READ_MEMORY_SUCCESS", .. }));
    }

    #[test]
    fn commands_are_not_replies() {
        let err = DebuggerReply::from_packet(&packet(CommandType::Halt, vec![])).unwrap_err();
        assert!(matches!(err, PacketError::UnknownReply(65)));

        let raw = Packet { command: 12, id: 0, arguments: vec![] };
        assert!(matches!(
            DebuggerReply::from_packet(&raw),
            Err(PacketError::UnknownReply(12))
        ));
    }
}
