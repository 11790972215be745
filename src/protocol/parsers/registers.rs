//! Register values parser
//!
//! ```xml
//! <Registers>
//!   <Thread id="1000">
//!     <Register name="eax" value="000000ff" memory="41414141" pc="true"/>
//!   </Thread>
//! </Registers>
//! ```
//!
//! Register values and memory are hexadecimal, thread ids decimal. The
//! `pc`/`sp` attributes only matter by their presence.

use num_bigint::BigUint;
use roxmltree::Node;

use super::{attribute, elements, has_name, number_attribute, optional_attribute, parse_document};
use crate::core::{RegisterRole, RegisterValue, RegisterValues, ThreadRegisters};
use crate::error::ParseError;

pub fn parse_register_values(data: &[u8]) -> Result<RegisterValues, ParseError> {
    let document = parse_document(data)?;
    let threads = elements(document.root_element())
        .filter(|node| has_name(*node, "thread"))
        .map(parse_thread)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RegisterValues::new(threads))
}

/// Decode a string of hex digit pairs into bytes.
///
/// Odd-length strings are rejected rather than truncated.
pub fn parse_memory_string(memory: &str) -> Result<Vec<u8>, ParseError> {
    let memory = memory.trim();
    if memory.len() % 2 != 0 {
        return Err(ParseError::OddLengthMemory(memory.len()));
    }
    Ok(hex::decode(memory)?)
}

fn parse_thread(node: Node<'_, '_>) -> Result<ThreadRegisters, ParseError> {
    let tid: u64 = number_attribute(node, "id")?;
    let registers = elements(node)
        .filter(|n| has_name(*n, "register"))
        .map(parse_register)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ThreadRegisters::new(tid, registers))
}

fn parse_register(node: Node<'_, '_>) -> Result<RegisterValue, ParseError> {
    let name = attribute(node, "name")?;
    let raw_value = attribute(node, "value")?;
    let value = BigUint::parse_bytes(raw_value.trim().as_bytes(), 16).ok_or_else(|| {
        ParseError::InvalidNumber {
            what: format!("register {name}"),
            value: raw_value.to_string(),
        }
    })?;
    let memory = match optional_attribute(node, "memory") {
        Some(memory) => parse_memory_string(memory)?,
        None => Vec::new(),
    };

    let is_pc = optional_attribute(node, "pc").is_some();
    let is_sp = optional_attribute(node, "sp").is_some();
    let role = match (is_pc, is_sp) {
        (true, true) => {
            return Err(ParseError::Invalid(format!(
                "Register '{name}' can not be program counter and stack pointer"
            )))
        }
        (true, false) => RegisterRole::ProgramCounter,
        (false, true) => RegisterRole::StackPointer,
        (false, false) => RegisterRole::General,
    };

    Ok(RegisterValue::new(name, value, &memory, role))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_strings() {
        assert_eq!(parse_memory_string("41414141").unwrap(), vec![0x41; 4]);
        assert_eq!(parse_memory_string("").unwrap(), Vec::<u8>::new());
        assert!(matches!(
            parse_memory_string("4141414"),
            Err(ParseError::OddLengthMemory(7))
        ));
        assert!(matches!(
            parse_memory_string("zz"),
            Err(ParseError::InvalidMemory(_))
        ));
    }

    #[test]
    fn multiple_threads_and_stack_pointer() {
        let xml = r#"<Registers>
            <Thread id="1"><Register name="esp" value="12ff00" memory="" sp="true"/></Thread>
            <Thread id="2"><Register name="eip" value="401000" memory="c3" pc="true"/></Thread>
        </Registers>"#;
        let values = parse_register_values(xml.as_bytes()).unwrap();
        assert_eq!(values.threads().len(), 2);
        let sp = values.thread(1).and_then(|t| t.stack_pointer()).unwrap();
        assert_eq!(sp.value_u64(), Some(0x12ff00));
        let pc = values.thread(2).and_then(|t| t.program_counter()).unwrap();
        assert_eq!(pc.memory(), &[0xc3]);
    }

    #[test]
    fn pc_and_sp_together_are_rejected() {
        let xml = r#"<Registers><Thread id="1"><Register name="x" value="0" pc="" sp=""/></Thread></Registers>"#;
        assert!(parse_register_values(xml.as_bytes()).is_err());
    }

    #[test]
    fn bad_value_is_rejected() {
        let xml = r#"<Registers><Thread id="1"><Register name="eax" value="xyz" memory=""/></Thread></Registers>"#;
        assert!(matches!(
            parse_register_values(xml.as_bytes()),
            Err(ParseError::InvalidNumber { .. })
        ));
    }
}
