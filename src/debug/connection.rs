//! Command channel to the debug client
//!
//! Encodes commands into packets and hands out packet ids. Replies carry the
//! id of the command they answer.

use std::io::Write;

use crate::core::{DebuggerException, RelocatedAddress};
use crate::error::PacketError;
use crate::protocol::{Argument, BreakpointKind, CommandType, Packet};

pub struct DebugConnection<W: Write> {
    writer: W,
    next_id: u32,
}

impl<W: Write> DebugConnection<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, next_id: 1 }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Send a command and return the packet id it was sent with.
    pub fn send(&mut self, command: CommandType, arguments: Vec<Argument>) -> Result<u32, PacketError> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);

        let packet = Packet::new(command, id, arguments);
        packet.write_to(&mut self.writer)?;
        self.writer.flush()?;

        log::debug!("Sent {} (id {})", command, id);
        Ok(id)
    }

    pub fn set_breakpoints(
        &mut self,
        kind: BreakpointKind,
        addresses: &[RelocatedAddress],
    ) -> Result<u32, PacketError> {
        self.send(kind.set_command(), Self::address_list(addresses))
    }

    pub fn remove_breakpoints(
        &mut self,
        kind: BreakpointKind,
        addresses: &[RelocatedAddress],
    ) -> Result<u32, PacketError> {
        self.send(kind.remove_command(), Self::address_list(addresses))
    }

    pub fn read_memory(&mut self, address: RelocatedAddress, size: u32) -> Result<u32, PacketError> {
        self.send(
            CommandType::ReadMemory,
            vec![Argument::Address(address.value()), Argument::Value(size)],
        )
    }

    pub fn write_memory(&mut self, address: RelocatedAddress, data: &[u8]) -> Result<u32, PacketError> {
        self.send(
            CommandType::WriteMemory,
            vec![Argument::Address(address.value()), Argument::Data(data.to_vec())],
        )
    }

    pub fn read_registers(&mut self) -> Result<u32, PacketError> {
        self.send(CommandType::Registers, Vec::new())
    }

    pub fn set_register(&mut self, tid: u64, index: u32, value: u64) -> Result<u32, PacketError> {
        self.send(
            CommandType::SetRegister,
            vec![Argument::Long(tid), Argument::Value(index), Argument::Address(value)],
        )
    }

    pub fn resume(&mut self) -> Result<u32, PacketError> {
        self.send(CommandType::Resume, Vec::new())
    }

    pub fn single_step(&mut self, tid: u64) -> Result<u32, PacketError> {
        self.send(CommandType::SingleStep, vec![Argument::Long(tid)])
    }

    pub fn halt(&mut self) -> Result<u32, PacketError> {
        self.send(CommandType::Halt, Vec::new())
    }

    pub fn detach(&mut self) -> Result<u32, PacketError> {
        self.send(CommandType::Detach, Vec::new())
    }

    pub fn terminate(&mut self) -> Result<u32, PacketError> {
        self.send(CommandType::Terminate, Vec::new())
    }

    pub fn request_memory_map(&mut self) -> Result<u32, PacketError> {
        self.send(CommandType::MemoryMap, Vec::new())
    }

    pub fn resume_thread(&mut self, tid: u64) -> Result<u32, PacketError> {
        self.send(CommandType::ResumeThread, vec![Argument::Long(tid)])
    }

    pub fn suspend_thread(&mut self, tid: u64) -> Result<u32, PacketError> {
        self.send(CommandType::SuspendThread, vec![Argument::Long(tid)])
    }

    pub fn set_active_thread(&mut self, tid: u64) -> Result<u32, PacketError> {
        self.send(CommandType::SetActiveThread, vec![Argument::Long(tid)])
    }

    pub fn validate_memory(&mut self, address: RelocatedAddress) -> Result<u32, PacketError> {
        self.send(CommandType::ValidMemory, vec![Argument::Address(address.value())])
    }

    pub fn search(
        &mut self,
        start: RelocatedAddress,
        end: RelocatedAddress,
        pattern: &[u8],
    ) -> Result<u32, PacketError> {
        self.send(
            CommandType::Search,
            vec![
                Argument::Address(start.value()),
                Argument::Address(end.value()),
                Argument::Data(pattern.to_vec()),
            ],
        )
    }

    /// Count followed by exception code and handling action pairs.
    pub fn set_exceptions(&mut self, exceptions: &[DebuggerException]) -> Result<u32, PacketError> {
        let mut arguments = Vec::with_capacity(1 + exceptions.len() * 2);
        arguments.push(Argument::Value(exceptions.len() as u32));
        for exception in exceptions {
            arguments.push(Argument::Long(exception.code));
            arguments.push(Argument::Value(exception.action.code()));
        }
        self.send(CommandType::SetExceptions, arguments)
    }

    fn address_list(addresses: &[RelocatedAddress]) -> Vec<Argument> {
        let mut arguments = Vec::with_capacity(1 + addresses.len());
        arguments.push(Argument::Value(addresses.len() as u32));
        arguments.extend(addresses.iter().map(|a| Argument::Address(a.value())));
        arguments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn ids_increase_per_command() {
        let mut connection = DebugConnection::new(Vec::new());
        assert_eq!(connection.halt().unwrap(), 1);
        assert_eq!(connection.resume().unwrap(), 2);

        let mut cursor = Cursor::new(connection.into_writer());
        let first = Packet::read_from(&mut cursor, 1024).unwrap();
        let second = Packet::read_from(&mut cursor, 1024).unwrap();
        assert_eq!(first.command_type(), Some(CommandType::Halt));
        assert_eq!(second.id, 2);
    }

    #[test]
    fn breakpoint_command_layout() {
        let mut connection = DebugConnection::new(Vec::new());
        connection
            .set_breakpoints(BreakpointKind::Echo, &[RelocatedAddress(0x10), RelocatedAddress(0x20)])
            .unwrap();
        let packet = Packet::read_from(&mut Cursor::new(connection.into_writer()), 1024).unwrap();
        assert_eq!(packet.command_type(), Some(CommandType::SetEchoBreakpoint));
        assert_eq!(
            packet.arguments,
            vec![Argument::Value(2), Argument::Address(0x10), Argument::Address(0x20)]
        );
    }
}
