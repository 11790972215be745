//! Binary framing of debug client packets
//!
//! A packet is a header of three big-endian `u32` (command, packet id,
//! argument count) followed by the arguments. Every argument starts with a
//! big-endian `u32` payload length and a big-endian `u32` type tag.

use std::io::{Read, Write};

use crate::error::PacketError;
use crate::protocol::CommandType;

/// Sent by the debug client before anything else.
pub const AUTHENTICATION_MAGIC: [u8; 4] = *b"NAVI";

const TYPE_ADDRESS: u32 = 0;
const TYPE_VALUE: u32 = 1;
const TYPE_DATA: u32 = 2;
const TYPE_LONG: u32 = 3;

/// Fixed-size part of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub command: u32,
    pub id: u32,
    pub argument_count: u32,
}

impl PacketHeader {
    pub const SIZE: usize = 12;

    pub fn read_from(reader: &mut impl Read) -> Result<Self, PacketError> {
        Ok(Self {
            command: read_u32(reader)?,
            id: read_u32(reader)?,
            argument_count: read_u32(reader)?,
        })
    }

    pub fn write_to(&self, writer: &mut impl Write) -> Result<(), PacketError> {
        writer.write_all(&self.command.to_be_bytes())?;
        writer.write_all(&self.id.to_be_bytes())?;
        writer.write_all(&self.argument_count.to_be_bytes())?;
        Ok(())
    }
}

/// One typed packet argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// 64-bit address, sent as high and low 32-bit halves
    Address(u64),
    Value(u32),
    Data(Vec<u8>),
    Long(u64),
}

impl Argument {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Address(_) => "address",
            Self::Value(_) => "value",
            Self::Data(_) => "data",
            Self::Long(_) => "long",
        }
    }

    fn read_from(reader: &mut impl Read, max_size: u32) -> Result<Self, PacketError> {
        let length = read_u32(reader)?;
        let tag = read_u32(reader)?;

        let expect = |kind: &'static str, size: u32| {
            if length == size {
                Ok(())
            } else {
                Err(PacketError::ArgumentLength { kind, length })
            }
        };

        match tag {
            TYPE_ADDRESS => {
                expect("address", 8)?;
                let high = u64::from(read_u32(reader)?);
                let low = u64::from(read_u32(reader)?);
                Ok(Self::Address((high << 32) | low))
            }
            TYPE_VALUE => {
                expect("value", 4)?;
                Ok(Self::Value(read_u32(reader)?))
            }
            TYPE_LONG => {
                expect("long", 8)?;
                let mut buf = [0u8; 8];
                reader.read_exact(&mut buf)?;
                Ok(Self::Long(u64::from_be_bytes(buf)))
            }
            TYPE_DATA => {
                if length > max_size {
                    return Err(PacketError::Oversized {
                        length,
                        max: max_size,
                    });
                }
                let mut data = vec![0u8; length as usize];
                reader.read_exact(&mut data)?;
                Ok(Self::Data(data))
            }
            other => Err(PacketError::UnknownArgumentType(other)),
        }
    }

    fn write_to(&self, writer: &mut impl Write) -> Result<(), PacketError> {
        match self {
            Self::Address(address) => {
                write_header(writer, 8, TYPE_ADDRESS)?;
                writer.write_all(&((address >> 32) as u32).to_be_bytes())?;
                writer.write_all(&(*address as u32).to_be_bytes())?;
            }
            Self::Value(value) => {
                write_header(writer, 4, TYPE_VALUE)?;
                writer.write_all(&value.to_be_bytes())?;
            }
            Self::Data(data) => {
                let length = u32::try_from(data.len()).map_err(|_| PacketError::Oversized {
                    length: u32::MAX,
                    max: u32::MAX,
                })?;
                write_header(writer, length, TYPE_DATA)?;
                writer.write_all(data)?;
            }
            Self::Long(value) => {
                write_header(writer, 8, TYPE_LONG)?;
                writer.write_all(&value.to_be_bytes())?;
            }
        }
        Ok(())
    }
}

/// A complete command or reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub command: u32,
    pub id: u32,
    pub arguments: Vec<Argument>,
}

impl Packet {
    pub fn new(command: CommandType, id: u32, arguments: Vec<Argument>) -> Self {
        Self {
            command: command.code(),
            id,
            arguments,
        }
    }

    pub fn command_type(&self) -> Option<CommandType> {
        CommandType::from_u32(self.command)
    }

    pub fn header(&self) -> PacketHeader {
        PacketHeader {
            command: self.command,
            id: self.id,
            argument_count: self.arguments.len() as u32,
        }
    }

    /// Read one packet; data arguments longer than `max_size` are refused.
    pub fn read_from(reader: &mut impl Read, max_size: u32) -> Result<Self, PacketError> {
        let header = PacketHeader::read_from(reader)?;
        log::trace!(
            "Received {} (id {}, {} arguments)",
            CommandType::name_of(header.command),
            header.id,
            header.argument_count
        );

        let mut arguments = Vec::with_capacity(header.argument_count.min(64) as usize);
        for _ in 0..header.argument_count {
            arguments.push(Argument::read_from(reader, max_size)?);
        }

        Ok(Self {
            command: header.command,
            id: header.id,
            arguments,
        })
    }

    pub fn write_to(&self, writer: &mut impl Write) -> Result<(), PacketError> {
        self.header().write_to(writer)?;
        for argument in &self.arguments {
            argument.write_to(writer)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut out);
        out
    }
}

/// Consume the authentication magic at the start of a connection.
pub fn read_authentication(reader: &mut impl Read) -> Result<(), PacketError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != AUTHENTICATION_MAGIC {
        return Err(PacketError::Authentication(magic));
    }
    log::debug!("Debug client authenticated");
    Ok(())
}

fn read_u32(reader: &mut impl Read) -> Result<u32, PacketError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn write_header(writer: &mut impl Write, length: u32, tag: u32) -> Result<(), PacketError> {
    writer.write_all(&length.to_be_bytes())?;
    writer.write_all(&tag.to_be_bytes())?;
    Ok(())
}
