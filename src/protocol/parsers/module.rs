//! Memory module parser
//!
//! `<module name="kernel32.dll" path="C:\..." address="2088763392" size="1032192"/>`

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use roxmltree::Node;

use super::{attribute, has_name, number_attribute, parse_document};
use crate::core::{MemoryModule, RelocatedAddress};
use crate::error::ParseError;

pub fn parse_module(data: &[u8]) -> Result<MemoryModule, ParseError> {
    let document = parse_document(data)?;
    let root = document.root_element();
    if !has_name(root, "module") {
        return Err(ParseError::MissingElement {
            context: "module".to_string(),
            element: "module".to_string(),
        });
    }
    parse_module_node(root)
}

pub(crate) fn parse_module_node(node: Node<'_, '_>) -> Result<MemoryModule, ParseError> {
    let name = attribute(node, "name")?;
    let path = attribute(node, "path")?;
    let address = parse_address("module address", attribute(node, "address")?)?;
    let size: u64 = number_attribute(node, "size")?;
    Ok(MemoryModule::new(name, path, address, size))
}

/// Decimal address of arbitrary length that must fit the 64-bit space.
pub(crate) fn parse_address(what: &str, value: &str) -> Result<RelocatedAddress, ParseError> {
    BigUint::parse_bytes(value.trim().as_bytes(), 10)
        .and_then(|v| v.to_u64())
        .map(RelocatedAddress)
        .ok_or_else(|| ParseError::InvalidNumber {
            what: what.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_module() {
        let xml = r#"<module name="ntdll.dll" path="C:\Windows\ntdll.dll" address="2088763392" size="720896"/>"#;
        let module = parse_module(xml.as_bytes()).unwrap();
        assert_eq!(module.name(), "ntdll.dll");
        assert_eq!(module.base_address(), RelocatedAddress(0x7C80_0000));
        assert_eq!(module.size(), 720896);
    }

    #[test]
    fn address_must_fit_64_bits() {
        assert!(parse_address("a", "18446744073709551615").is_ok());
        assert!(parse_address("a", "18446744073709551616").is_err());
        assert!(parse_address("a", "0x1000").is_err());
    }

    #[test]
    fn missing_path() {
        let xml = r#"<module name="a" address="1" size="1"/>"#;
        assert!(matches!(
            parse_module(xml.as_bytes()),
            Err(ParseError::MissingAttribute { .. })
        ));
    }
}
