//! Target information (handshake) parser
//!
//! ```xml
//! <info>
//!   <registers><register name="eax" size="4" editable="true"/></registers>
//!   <size>32</size>
//!   <options><option name="detach" value="true"/></options>
//! </info>
//! ```

use std::num::NonZeroU32;

use roxmltree::Node;

use super::{attribute, elements, has_name, number_attribute, parse_bool, parse_document, parse_number};
use crate::core::{
    DebuggerException, DebuggerOptions, DebuggerOptionsBuilder, ExceptionHandlingAction,
    RegisterDescription, TargetInformation,
};
use crate::error::ParseError;

/// Capability keys the debug client may announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionKey {
    Detach,
    Attach,
    Terminate,
    Halt,
    HaltBeforeCommunicating,
    PageSize,
    Memmap,
    HasStack,
    ValidMemory,
    Multithread,
    SoftwareBreakpoints,
    BreakpointCount,
    BreakOnModuleLoad,
    BreakOnModuleUnload,
    TraceCount,
    Exception,
}

impl OptionKey {
    const KEYS: [(&'static str, OptionKey); 16] = [
        ("detach", OptionKey::Detach),
        ("attach", OptionKey::Attach),
        ("terminate", OptionKey::Terminate),
        ("halt", OptionKey::Halt),
        ("haltBeforeCommunicating", OptionKey::HaltBeforeCommunicating),
        ("pageSize", OptionKey::PageSize),
        ("memmap", OptionKey::Memmap),
        ("hasstack", OptionKey::HasStack),
        ("validmemory", OptionKey::ValidMemory),
        ("multithread", OptionKey::Multithread),
        ("softwareBreakpoints", OptionKey::SoftwareBreakpoints),
        ("breakpointCount", OptionKey::BreakpointCount),
        ("canBreakOnModuleLoad", OptionKey::BreakOnModuleLoad),
        ("canBreakOnModuleUnLoad", OptionKey::BreakOnModuleUnload),
        ("canTraceCount", OptionKey::TraceCount),
        ("exception", OptionKey::Exception),
    ];

    fn lookup(name: &str) -> Option<Self> {
        Self::KEYS
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, option)| *option)
    }
}

/// Parse the target information reply sent right after connecting.
pub fn parse_target_information(data: &[u8]) -> Result<TargetInformation, ParseError> {
    let document = parse_document(data)?;
    let root = document.root_element();

    let mut address_size = None;
    let mut registers = None;
    let mut options = None;

    for node in elements(root) {
        if has_name(node, "registers") {
            registers = Some(parse_registers(node)?);
        } else if has_name(node, "size") {
            let text = node.text().unwrap_or_default();
            let size: u32 = parse_number("address size", text)?;
            address_size = Some(NonZeroU32::new(size).ok_or_else(|| ParseError::InvalidNumber {
                what: "address size".to_string(),
                value: text.to_string(),
            })?);
        } else if has_name(node, "options") {
            options = Some(parse_options(node)?);
        } else {
            return Err(ParseError::Invalid(format!(
                "Found unknown node '{}' in target information string",
                node.tag_name().name()
            )));
        }
    }

    let address_size = address_size.ok_or_else(|| missing("size"))?;
    let registers = registers.ok_or_else(|| missing("registers"))?;
    let options = options.ok_or_else(|| missing("options"))?;

    log::debug!(
        "Target information: {} bit addresses, {} registers",
        address_size,
        registers.len()
    );
    Ok(TargetInformation::new(address_size, registers, options))
}

fn missing(element: &str) -> ParseError {
    ParseError::MissingElement {
        context: "target information".to_string(),
        element: element.to_string(),
    }
}

fn parse_registers(node: Node<'_, '_>) -> Result<Vec<RegisterDescription>, ParseError> {
    elements(node)
        .map(|register| {
            let name = attribute(register, "name")?;
            let size: u8 = number_attribute(register, "size")?;
            let editable = parse_bool("editable flag", attribute(register, "editable")?)?;
            RegisterDescription::new(name, size, editable).ok_or_else(|| {
                ParseError::Invalid(format!("Register '{name}' has invalid size {size}"))
            })
        })
        .collect()
}

fn parse_options(node: Node<'_, '_>) -> Result<DebuggerOptions, ParseError> {
    let mut builder = DebuggerOptions::builder();

    for option in elements(node) {
        let name = attribute(option, "name")?;
        let key = OptionKey::lookup(name).ok_or_else(|| ParseError::UnknownValue {
            what: "debugger option",
            value: name.to_string(),
        })?;
        builder = apply_option(builder, key, option)?;
    }

    Ok(builder.build())
}

fn apply_option(
    builder: DebuggerOptionsBuilder,
    key: OptionKey,
    option: Node<'_, '_>,
) -> Result<DebuggerOptionsBuilder, ParseError> {
    let flag = || parse_bool("option value", attribute(option, "value")?);

    Ok(match key {
        OptionKey::Detach => builder.can_detach(flag()?),
        OptionKey::Attach => builder.can_attach(flag()?),
        OptionKey::Terminate => builder.can_terminate(flag()?),
        OptionKey::Halt => builder.can_halt(flag()?),
        OptionKey::HaltBeforeCommunicating => builder.can_halt_before_communicating(flag()?),
        OptionKey::Memmap => builder.can_memmap(flag()?),
        OptionKey::HasStack => builder.stack_available(flag()?),
        OptionKey::ValidMemory => builder.can_validate_memory(flag()?),
        OptionKey::Multithread => builder.can_multithread(flag()?),
        OptionKey::SoftwareBreakpoints => builder.can_software_breakpoints(flag()?),
        OptionKey::BreakOnModuleLoad => builder.can_break_on_module_load(flag()?),
        OptionKey::BreakOnModuleUnload => builder.can_break_on_module_unload(flag()?),
        OptionKey::TraceCount => builder.can_trace_counts(flag()?),
        OptionKey::PageSize => builder.page_size(number_attribute(option, "value")?),
        OptionKey::BreakpointCount => {
            let count: u32 = number_attribute(option, "value")?;
            let count = NonZeroU32::new(count).ok_or_else(|| ParseError::InvalidNumber {
                what: "breakpoint count".to_string(),
                value: count.to_string(),
            })?;
            builder.breakpoint_counter(count)
        }
        OptionKey::Exception => builder.add_exception(parse_exception_option(option)?),
    })
}

fn parse_exception_option(option: Node<'_, '_>) -> Result<DebuggerException, ParseError> {
    let name = attribute(option, "exceptionName")?;
    let code: u64 = number_attribute(option, "exceptionCode")?;
    let action_code: u32 = number_attribute(option, "handlingAction")?;
    let action = ExceptionHandlingAction::from_code(action_code).ok_or_else(|| {
        ParseError::UnknownValue {
            what: "exception handling action",
            value: action_code.to_string(),
        }
    })?;
    Ok(DebuggerException::new(name, code, action))
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = r#"<info>
        <registers>
            <register name="EAX" size="4" editable="true"/>
            <register name="EFLAGS" size="4" editable="false"/>
        </registers>
        <size>32</size>
        <options>
            <option name="detach" value="true"/>
            <option name="hasStack" value="false"/>
            <option name="breakpointCount" value="4"/>
            <option name="pageSize" value="4096"/>
            <option name="exception" exceptionName="Access violation" exceptionCode="3221225477" handlingAction="1"/>
        </options>
    </info>"#;

    #[test]
    fn parses_full_handshake() {
        let info = parse_target_information(INFO.as_bytes()).unwrap();
        assert_eq!(info.address_size(), 32);
        assert_eq!(info.registers().len(), 2);
        assert!(!info.registers()[1].editable);

        let options = info.debugger_options();
        assert!(options.can_detach());
        assert!(!options.stack_available());
        assert_eq!(options.breakpoint_counter(), 4);
        assert_eq!(options.page_size(), 4096);
        assert_eq!(
            options.exception(0xC000_0005).map(|e| e.action),
            Some(ExceptionHandlingAction::Halt)
        );
    }

    #[test]
    fn unknown_option_is_fatal() {
        let xml = "<info><registers/><size>32</size><options><option name=\"teleport\" value=\"true\"/></options></info>";
        let err = parse_target_information(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::UnknownValue { what: "debugger option", .. }));
    }

    #[test]
    fn zero_address_size_is_rejected() {
        let xml = "<info><registers/><size>0</size><options/></info>";
        assert!(parse_target_information(xml.as_bytes()).is_err());
    }

    #[test]
    fn missing_subtrees_are_rejected() {
        let no_options = "<info><registers/><size>32</size></info>";
        assert!(matches!(
            parse_target_information(no_options.as_bytes()),
            Err(ParseError::MissingElement { .. })
        ));
        let no_registers = "<info><size>32</size><options/></info>";
        assert!(parse_target_information(no_registers.as_bytes()).is_err());
    }

    #[test]
    fn unknown_node_is_rejected() {
        let xml = "<info><registers/><size>32</size><options/><color/></info>";
        assert!(matches!(
            parse_target_information(xml.as_bytes()),
            Err(ParseError::Invalid(_))
        ));
    }
}
