//! Debugger session - applies debug client replies to the process model
//!
//! One session per connection. A single reader drives `pump`/`run`; the
//! `ProcessManager` is shared so other threads can observe it while the
//! session writes.

use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::core::{
    DebuggerException, ExceptionHandlingAction, MemoryModule, ProcessManager, RegisterValues,
    RelocatedAddress, TargetInformation, TargetProcessThread, ThreadState,
};
use crate::debug::breakpoints::{BreakpointManager, BreakpointStatus};
use crate::debug::connection::DebugConnection;
use crate::debug::types::{DebugEvent, DebugEventListener, SessionState};
use crate::error::{PacketError, ProcessError, SessionError};
use crate::listener::ListenerProvider;
use crate::protocol::{
    read_authentication, BreakpointKind, CommandType, DebuggerReply, Packet, StopReport,
};

pub struct DebuggerSession<W: Write> {
    config: SessionConfig,
    state: SessionState,
    connection: DebugConnection<W>,
    process: Arc<ProcessManager>,
    breakpoints: BreakpointManager,
    listeners: ListenerProvider<dyn DebugEventListener>,
}

impl<W: Write> DebuggerSession<W> {
    pub fn new(writer: W, config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Disconnected,
            connection: DebugConnection::new(writer),
            process: Arc::new(ProcessManager::new()),
            breakpoints: BreakpointManager::new(),
            listeners: ListenerProvider::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Shared handle to the process model.
    pub fn process(&self) -> Arc<ProcessManager> {
        Arc::clone(&self.process)
    }

    pub fn breakpoints(&self) -> &BreakpointManager {
        &self.breakpoints
    }

    pub fn connection(&self) -> &DebugConnection<W> {
        &self.connection
    }

    pub fn add_listener(&self, listener: &Arc<dyn DebugEventListener>) {
        self.listeners.add_listener(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DebugEventListener>) {
        self.listeners.remove_listener(listener);
    }

    // ------------------------------------------------------------------
    // Incoming
    // ------------------------------------------------------------------

    /// Consume the authentication magic, if configured, and start listening.
    pub fn handshake(&mut self, reader: &mut impl Read) -> Result<(), SessionError> {
        if self.state != SessionState::Disconnected {
            return Err(self.invalid("handshake"));
        }
        if self.config.expect_authentication {
            if let Err(e) = read_authentication(reader) {
                self.state = SessionState::Terminated;
                return Err(e.into());
            }
        }
        self.state = SessionState::Connected;
        log::info!("Connected to debug client");
        Ok(())
    }

    /// Read and apply one packet. Returns `false` once the client has
    /// closed the connection.
    pub fn pump(&mut self, reader: &mut impl Read) -> Result<bool, SessionError> {
        if self.state == SessionState::Disconnected {
            self.handshake(reader)?;
        }
        match Packet::read_from(reader, self.config.max_packet_size) {
            Ok(packet) => {
                self.handle_packet(&packet)?;
                Ok(true)
            }
            Err(PacketError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                self.connection_closed();
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply packets until the connection closes.
    ///
    /// Contract violations of the process model are logged and the session
    /// keeps going; transport and handshake failures end it.
    pub fn run(&mut self, reader: &mut impl Read) -> Result<(), SessionError> {
        loop {
            match self.pump(reader) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(SessionError::Process(e)) => log::error!("{}", e),
                Err(e) => return Err(e),
            }
        }
    }

    /// Decode and apply one packet.
    ///
    /// A reply that cannot be decoded is logged and dropped, except for the
    /// target information which the session cannot do without.
    pub fn handle_packet(&mut self, packet: &Packet) -> Result<(), SessionError> {
        match DebuggerReply::from_packet(packet) {
            Ok(reply) => self.handle_reply(packet.id, reply),
            Err(e) if packet.command == CommandType::Info.code() => {
                log::error!("{}", e);
                self.state = SessionState::Terminated;
                Err(SessionError::Handshake(e))
            }
            Err(e) => {
                let command = CommandType::name_of(packet.command);
                log::warn!("Dropping {} (id {}): {}", command, packet.id, e);
                self.emit(DebugEvent::MessageDropped {
                    command,
                    reason: e.to_string(),
                });
                Ok(())
            }
        }
    }

    /// Apply a decoded reply to the process model and forward it to the
    /// debug event listeners.
    pub fn handle_reply(&mut self, id: u32, reply: DebuggerReply) -> Result<(), SessionError> {
        log::debug!("Handling {} reply (id {})", reply.name(), id);

        if let Some(code) = reply.error_code() {
            log::warn!("Debug client reported error {} for {} (id {})", code, reply.name(), id);
            self.emit(DebugEvent::ErrorReply {
                id,
                reply: reply.name(),
                code,
            });
        }

        let result = self.apply(&reply);
        self.emit(DebugEvent::ReplyReceived { id, reply });
        result
    }

    fn apply(&mut self, reply: &DebuggerReply) -> Result<(), SessionError> {
        match reply {
            DebuggerReply::Info(information) => self.target_information(information.clone()),
            DebuggerReply::RequestTarget => {
                log::info!("Debug client asks for a target process");
            }
            DebuggerReply::Attach(Ok(())) => {
                self.process.set_attached(true);
                self.state = SessionState::Attached;
            }
            DebuggerReply::Detach(Ok(())) | DebuggerReply::Terminate(Ok(())) => {
                self.reset_target_process();
                self.state = SessionState::Terminated;
            }
            DebuggerReply::ProcessClosed => {
                log::info!("Target process closed");
                self.reset_target_process();
                self.state = SessionState::Terminated;
            }
            DebuggerReply::ProcessStart(start) => {
                self.process.add_module(Arc::new(start.module.clone()))?;
                let thread = Arc::new(TargetProcessThread::new(start.thread.tid, start.thread.state));
                self.process.add_thread(Arc::clone(&thread));
                self.process.set_active_thread(Some(thread))?;
            }
            DebuggerReply::Resume(Ok(())) => {
                for thread in self.process.threads() {
                    thread.set_state(ThreadState::Running);
                }
                self.breakpoints.resumed();
            }
            DebuggerReply::Halt(Ok(())) => {
                for thread in self.process.threads() {
                    thread.set_state(ThreadState::Suspended);
                }
                self.refresh_registers()?;
            }
            DebuggerReply::SingleStep(Ok(report)) => self.stopped(report)?,
            DebuggerReply::BreakpointHit { kind, report } => {
                if *kind == BreakpointKind::Echo {
                    // Echo breakpoints only record registers; the thread keeps running.
                    self.apply_registers(&report.registers);
                } else {
                    self.stopped(report)?;
                }
                self.breakpoints.hit(*kind, report.address);
            }
            DebuggerReply::BreakpointsSet {
                kind,
                result: Ok(results),
            } => self.breakpoints.apply_set_results(*kind, results),
            DebuggerReply::BreakpointsRemoved {
                kind,
                result: Ok(results),
            } => self.breakpoints.apply_remove_results(*kind, results),
            DebuggerReply::Registers(Ok(values)) => self.apply_registers(values),
            DebuggerReply::SetRegister(Ok(_)) => self.refresh_registers()?,
            DebuggerReply::ReadMemory(Ok((address, data))) => {
                self.process.memory().store(address.value(), data);
            }
            DebuggerReply::MemoryMap(Ok(map)) => self.process.set_memory_map(map.clone()),
            DebuggerReply::ThreadCreated { tid, state } => {
                if self.process.thread(*tid).is_some() {
                    log::warn!("Thread {} was reported twice", tid);
                } else {
                    self.process
                        .add_thread(Arc::new(TargetProcessThread::new(*tid, *state)));
                }
            }
            DebuggerReply::ThreadClosed { tid } => self.thread_closed(*tid)?,
            DebuggerReply::ResumeThread(Ok(tid)) => {
                if let Some(thread) = self.known_thread(*tid) {
                    thread.set_state(ThreadState::Running);
                }
            }
            DebuggerReply::SuspendThread(Ok(tid)) => {
                if let Some(thread) = self.known_thread(*tid) {
                    thread.set_state(ThreadState::Suspended);
                    self.refresh_registers()?;
                }
            }
            DebuggerReply::SetActiveThread(Ok(tid)) => {
                if let Some(thread) = self.known_thread(*tid) {
                    self.process.set_active_thread(Some(thread))?;
                }
            }
            DebuggerReply::ModuleLoaded(module) => {
                self.process.add_module(Arc::new(module.clone()))?;
            }
            DebuggerReply::ModuleUnloaded(module) => self.module_unloaded(module)?,
            DebuggerReply::ExceptionOccurred(report) => {
                let exception = self.known_exception(report.code, &report.name);
                if let Some(thread) = self.known_thread(report.tid) {
                    thread.set_state(ThreadState::Suspended);
                    thread.set_current_address(Some(report.address));
                }
                self.process.add_exception_event(exception.clone());
                self.emit(DebugEvent::Exception {
                    tid: report.tid,
                    address: report.address,
                    exception,
                });
            }
            // Failed requests and replies without process state.
            _ => {}
        }
        Ok(())
    }

    fn target_information(&mut self, information: TargetInformation) {
        self.process.set_target_information(information);
        if matches!(self.state, SessionState::Disconnected | SessionState::Connected) {
            self.state = SessionState::Ready;
        }
        log::info!("Received target information");
    }

    /// A thread stopped on a breakpoint or after a single step.
    fn stopped(&mut self, report: &StopReport) -> Result<(), SessionError> {
        let Some(thread) = self.known_thread(report.tid) else {
            return Ok(());
        };
        thread.set_state(ThreadState::Suspended);
        self.apply_registers(&report.registers);
        if report.address.is_some() {
            thread.set_current_address(report.address);
        }
        self.process.set_active_thread(Some(thread))?;
        Ok(())
    }

    fn apply_registers(&self, values: &RegisterValues) {
        for registers in values {
            let Some(thread) = self.known_thread(registers.tid()) else {
                continue;
            };
            let pc = registers
                .program_counter()
                .and_then(|pc| pc.value_u64())
                .map(RelocatedAddress);
            thread.set_register_values(registers.registers().to_vec());
            if pc.is_some() {
                thread.set_current_address(pc);
            }
        }
    }

    fn thread_closed(&mut self, tid: u64) -> Result<(), SessionError> {
        let Some(thread) = self.known_thread(tid) else {
            return Ok(());
        };
        let active = self
            .process
            .active_thread()
            .is_some_and(|t| Arc::ptr_eq(&t, &thread));
        if active {
            self.process.set_active_thread(None)?;
        }
        self.process.remove_thread(&thread);
        Ok(())
    }

    fn module_unloaded(&mut self, module: &MemoryModule) -> Result<(), SessionError> {
        match self.process.find_module(module.base_address(), module.name()) {
            Some(tracked) => self.process.remove_module(&tracked)?,
            None if self.config.strict_module_unload => {
                return Err(ProcessError::UnknownModule {
                    name: module.name().to_string(),
                }
                .into())
            }
            None => self.process.remove_non_existing_module(Arc::new(module.clone())),
        }
        Ok(())
    }

    fn known_thread(&self, tid: u64) -> Option<Arc<TargetProcessThread>> {
        let thread = self.process.thread(tid);
        if thread.is_none() {
            log::warn!("Debug client reported unknown thread {}", tid);
        }
        thread
    }

    fn known_exception(&self, code: u64, name: &str) -> DebuggerException {
        self.process
            .target_information()
            .and_then(|info| info.debugger_options().exception(code).cloned())
            .unwrap_or_else(|| DebuggerException::new(name, code, ExceptionHandlingAction::Halt))
    }

    /// Forget the process: memory, threads, modules, attachment and all but
    /// the regular breakpoints, which become inactive.
    fn reset_target_process(&mut self) {
        self.process.reset();
        self.breakpoints.reset();
    }

    fn refresh_registers(&mut self) -> Result<(), SessionError> {
        if self.config.refresh_registers_on_suspend && self.state == SessionState::Attached {
            self.connection.read_registers()?;
        }
        Ok(())
    }

    fn connection_closed(&mut self) {
        log::info!("Debug client closed the connection");
        if self.process.is_attached() {
            self.reset_target_process();
        }
        self.state = SessionState::Terminated;
        self.emit(DebugEvent::ConnectionClosed);
    }

    fn emit(&self, event: DebugEvent) {
        self.listeners
            .notify(event.kind(), |listener| listener.handle(&event));
    }

    // ------------------------------------------------------------------
    // Outgoing
    // ------------------------------------------------------------------

    pub fn read_memory(&mut self, address: RelocatedAddress, size: u32) -> Result<u32, SessionError> {
        self.require_attached("read memory")?;
        let map = self.process.memory_map();
        if !map.is_empty() && map.section(address).is_none() {
            return Err(SessionError::Unmapped(address));
        }
        Ok(self.connection.read_memory(address, size)?)
    }

    pub fn write_memory(&mut self, address: RelocatedAddress, data: &[u8]) -> Result<u32, SessionError> {
        self.require_attached("write memory")?;
        Ok(self.connection.write_memory(address, data)?)
    }

    /// Ask the client to set breakpoints; already tracked addresses are skipped.
    pub fn set_breakpoints(
        &mut self,
        kind: BreakpointKind,
        addresses: &[RelocatedAddress],
    ) -> Result<u32, SessionError> {
        let info = self.require_attached("set breakpoints")?;
        let options = info.debugger_options();
        if !options.can_software_breakpoints() {
            return Err(SessionError::Unsupported("software breakpoints"));
        }

        let new: Vec<RelocatedAddress> = addresses
            .iter()
            .copied()
            .filter(|a| {
                !matches!(
                    self.breakpoints.status(kind, *a),
                    Some(BreakpointStatus::Enabled | BreakpointStatus::Active | BreakpointStatus::Hit)
                )
            })
            .collect();

        // Breakpoints still being deleted keep their slot.
        let slots = new
            .iter()
            .filter(|a| self.breakpoints.status(kind, **a) != Some(BreakpointStatus::Deleting))
            .count();
        let limit = options.breakpoint_counter();
        if (self.breakpoints.count(kind) + slots) as u64 > u64::from(limit) {
            return Err(SessionError::BreakpointLimit { limit });
        }

        for address in &new {
            if !self.breakpoints.add(kind, *address) {
                self.breakpoints.set_status(kind, *address, BreakpointStatus::Enabled);
            }
        }
        Ok(self.connection.set_breakpoints(kind, &new)?)
    }

    pub fn remove_breakpoints(
        &mut self,
        kind: BreakpointKind,
        addresses: &[RelocatedAddress],
    ) -> Result<u32, SessionError> {
        self.require_attached("remove breakpoints")?;
        for address in addresses {
            self.breakpoints.set_status(kind, *address, BreakpointStatus::Deleting);
        }
        Ok(self.connection.remove_breakpoints(kind, addresses)?)
    }

    pub fn resume(&mut self) -> Result<u32, SessionError> {
        self.require_attached("resume")?;
        Ok(self.connection.resume()?)
    }

    /// Step the active thread by one instruction.
    pub fn single_step(&mut self) -> Result<u32, SessionError> {
        self.require_attached("single step")?;
        let thread = self.process.active_thread().ok_or(SessionError::InvalidState {
            operation: "single step",
            state: "no active thread",
        })?;
        Ok(self.connection.single_step(thread.tid())?)
    }

    pub fn halt(&mut self) -> Result<u32, SessionError> {
        let info = self.require_attached("halt")?;
        if !info.debugger_options().can_halt() {
            return Err(SessionError::Unsupported("halting the target"));
        }
        Ok(self.connection.halt()?)
    }

    pub fn detach(&mut self) -> Result<u32, SessionError> {
        let info = self.require_attached("detach")?;
        if !info.debugger_options().can_detach() {
            return Err(SessionError::Unsupported("detaching"));
        }
        Ok(self.connection.detach()?)
    }

    pub fn terminate(&mut self) -> Result<u32, SessionError> {
        let info = self.require_attached("terminate")?;
        if !info.debugger_options().can_terminate() {
            return Err(SessionError::Unsupported("terminating the target"));
        }
        Ok(self.connection.terminate()?)
    }

    pub fn read_registers(&mut self) -> Result<u32, SessionError> {
        self.require_attached("read registers")?;
        Ok(self.connection.read_registers()?)
    }

    pub fn request_memory_map(&mut self) -> Result<u32, SessionError> {
        let info = self.require_attached("request memory map")?;
        if !info.debugger_options().can_memmap() {
            return Err(SessionError::Unsupported("memory maps"));
        }
        Ok(self.connection.request_memory_map()?)
    }

    /// Change an editable register of thread `tid`.
    pub fn set_register(&mut self, tid: u64, register: &str, value: u64) -> Result<u32, SessionError> {
        let info = self.require_attached("set register")?;
        let index = info
            .register_index(register)
            .ok_or(SessionError::Unsupported("unknown register"))?;
        if !info.registers()[index].editable {
            return Err(SessionError::Unsupported("editing this register"));
        }
        Ok(self.connection.set_register(tid, index as u32, value)?)
    }

    pub fn resume_thread(&mut self, tid: u64) -> Result<u32, SessionError> {
        self.require_thread("resume thread", tid)?;
        Ok(self.connection.resume_thread(tid)?)
    }

    pub fn suspend_thread(&mut self, tid: u64) -> Result<u32, SessionError> {
        self.require_thread("suspend thread", tid)?;
        Ok(self.connection.suspend_thread(tid)?)
    }

    pub fn set_active_thread(&mut self, tid: u64) -> Result<u32, SessionError> {
        self.require_thread("set active thread", tid)?;
        Ok(self.connection.set_active_thread(tid)?)
    }

    pub fn validate_memory(&mut self, address: RelocatedAddress) -> Result<u32, SessionError> {
        let info = self.require_attached("validate memory")?;
        if !info.debugger_options().can_validate_memory() {
            return Err(SessionError::Unsupported("memory validation"));
        }
        Ok(self.connection.validate_memory(address)?)
    }

    pub fn search(
        &mut self,
        start: RelocatedAddress,
        end: RelocatedAddress,
        pattern: &[u8],
    ) -> Result<u32, SessionError> {
        self.require_attached("search")?;
        Ok(self.connection.search(start, end, pattern)?)
    }

    /// Send the handling actions of all known exceptions.
    pub fn set_exceptions(&mut self, exceptions: &[DebuggerException]) -> Result<u32, SessionError> {
        self.require_attached("set exceptions")?;
        Ok(self.connection.set_exceptions(exceptions)?)
    }

    fn require_attached(&self, operation: &'static str) -> Result<Arc<TargetInformation>, SessionError> {
        let info = self
            .process
            .target_information()
            .ok_or_else(|| self.invalid(operation))?;
        if self.state != SessionState::Attached || !self.process.is_attached() {
            return Err(SessionError::NotAttached);
        }
        Ok(info)
    }

    fn require_thread(&self, operation: &'static str, tid: u64) -> Result<(), SessionError> {
        let info = self.require_attached(operation)?;
        if !info.debugger_options().can_multithread() {
            return Err(SessionError::Unsupported("thread control"));
        }
        if self.process.thread(tid).is_none() {
            return Err(ProcessError::UnknownThread { tid }.into());
        }
        Ok(())
    }

    fn invalid(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            operation,
            state: self.state.name(),
        }
    }
}
