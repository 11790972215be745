//! Process start parser
//!
//! ```xml
//! <processStart>
//!   <module name="calc.exe" path="C:\calc.exe" address="16777216" size="126976"/>
//!   <thread threadId="1234" threadState="1"/>
//! </processStart>
//! ```

use super::module::parse_module_node;
use super::{number_attribute, parse_document, single_child};
use crate::core::{MemoryModule, ThreadState};
use crate::error::ParseError;

/// Initial thread reported at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadDescriptor {
    pub tid: u64,
    pub state: ThreadState,
}

/// Main module and initial thread of a freshly started process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStart {
    pub module: MemoryModule,
    pub thread: ThreadDescriptor,
}

pub fn parse_process_start(data: &[u8]) -> Result<ProcessStart, ParseError> {
    let document = parse_document(data)?;
    let root = document.root_element();

    let module = parse_module_node(single_child(root, "module")?)?;

    let thread = single_child(root, "thread")?;
    let tid: u64 = number_attribute(thread, "threadId")?;
    let state = parse_thread_state(number_attribute(thread, "threadState")?)?;

    Ok(ProcessStart {
        module,
        thread: ThreadDescriptor { tid, state },
    })
}

pub(crate) fn parse_thread_state(code: u32) -> Result<ThreadState, ParseError> {
    ThreadState::from_code(code).ok_or_else(|| ParseError::UnknownValue {
        what: "thread state",
        value: code.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_module_and_thread() {
        let xml = r#"<processStart>
            <module name="calc.exe" path="C:\calc.exe" address="16777216" size="126976"/>
            <thread threadId="1234" threadState="1"/>
        </processStart>"#;
        let start = parse_process_start(xml.as_bytes()).unwrap();
        assert_eq!(start.module.name(), "calc.exe");
        assert_eq!(start.thread.tid, 1234);
        assert_eq!(start.thread.state, ThreadState::Suspended);
    }

    #[test]
    fn missing_thread_is_fatal() {
        let xml = r#"<processStart><module name="a" path="b" address="1" size="2"/></processStart>"#;
        assert!(matches!(
            parse_process_start(xml.as_bytes()),
            Err(ParseError::MissingElement { .. })
        ));
    }

    #[test]
    fn unknown_thread_state_is_fatal() {
        let xml = r#"<processStart>
            <module name="a" path="b" address="1" size="2"/>
            <thread threadId="1" threadState="7"/>
        </processStart>"#;
        assert!(matches!(
            parse_process_start(xml.as_bytes()),
            Err(ParseError::UnknownValue { what: "thread state", .. })
        ));
    }
}
