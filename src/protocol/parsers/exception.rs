//! Exception report parser
//!
//! `<exception_raised threadId="1234" address="4198400" exceptionCode="3221225477" exceptionName="Access violation"/>`

use super::module::parse_address;
use super::{attribute, number_attribute, parse_document};
use crate::core::RelocatedAddress;
use crate::error::ParseError;

/// An exception raised by the debuggee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionReport {
    pub tid: u64,
    pub address: RelocatedAddress,
    pub code: u64,
    pub name: String,
}

pub fn parse_exception(data: &[u8]) -> Result<ExceptionReport, ParseError> {
    let document = parse_document(data)?;
    let node = document.root_element();

    Ok(ExceptionReport {
        tid: number_attribute(node, "threadId")?,
        address: parse_address("exception address", attribute(node, "address")?)?,
        code: number_attribute(node, "exceptionCode")?,
        name: attribute(node, "exceptionName")?.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_report() {
        let xml = r#"<exception_raised threadId="1234" address="4198400" exceptionCode="3221225477" exceptionName="Access violation"/>"#;
        let report = parse_exception(xml.as_bytes()).unwrap();
        assert_eq!(report.tid, 1234);
        assert_eq!(report.address, RelocatedAddress(0x401000));
        assert_eq!(report.code, 0xC000_0005);
        assert_eq!(report.name, "Access violation");
    }
}
