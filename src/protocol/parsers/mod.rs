//! XML message parsers
//!
//! Each parser turns one complete reply document into one typed value, or
//! fails with a [`ParseError`]. Nothing is partially constructed.
//!
//! Element and attribute names are compared case-insensitively; the debug
//! client is not consistent about casing (`hasStack`, `Registers`).

pub mod exception;
pub mod module;
pub mod process_start;
pub mod registers;
pub mod target_info;

pub use exception::{parse_exception, ExceptionReport};
pub use module::parse_module;
pub use process_start::{parse_process_start, ProcessStart, ThreadDescriptor};
pub use registers::{parse_memory_string, parse_register_values};
pub use target_info::parse_target_information;

use std::str::FromStr;

use roxmltree::{Document, Node};

use crate::error::ParseError;

/// Decode the payload and parse it as a single XML document.
///
/// Trailing NUL terminators and whitespace sent by C clients are ignored.
pub(crate) fn parse_document(data: &[u8]) -> Result<Document<'_>, ParseError> {
    let text = std::str::from_utf8(data)?;
    let text = text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());
    Ok(Document::parse(text)?)
}

/// Element children of `node`, skipping text and comments.
pub(crate) fn elements<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

pub(crate) fn has_name(node: Node<'_, '_>, name: &str) -> bool {
    node.tag_name().name().eq_ignore_ascii_case(name)
}

/// Exactly one child element called `name`.
pub(crate) fn single_child<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> Result<Node<'a, 'input>, ParseError> {
    let mut matches = elements(node).filter(|n| has_name(*n, name));
    let first = matches.next().ok_or_else(|| ParseError::MissingElement {
        context: node.tag_name().name().to_string(),
        element: name.to_string(),
    })?;
    if matches.next().is_some() {
        return Err(ParseError::Invalid(format!(
            "{} message contains more than one '{}' node",
            node.tag_name().name(),
            name
        )));
    }
    Ok(first)
}

pub(crate) fn optional_attribute<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name().eq_ignore_ascii_case(name))
        .map(|a| a.value())
}

pub(crate) fn attribute<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, ParseError> {
    optional_attribute(node, name).ok_or_else(|| ParseError::MissingAttribute {
        element: node.tag_name().name().to_string(),
        attribute: name.to_string(),
    })
}

pub(crate) fn parse_number<T: FromStr>(what: &str, value: &str) -> Result<T, ParseError> {
    value.trim().parse().map_err(|_| ParseError::InvalidNumber {
        what: what.to_string(),
        value: value.to_string(),
    })
}

/// Decimal attribute value.
pub(crate) fn number_attribute<T: FromStr>(node: Node<'_, '_>, name: &str) -> Result<T, ParseError> {
    parse_number(name, attribute(node, name)?)
}

pub(crate) fn parse_bool(what: &'static str, value: &str) -> Result<bool, ParseError> {
    match value.trim() {
        v if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
        v if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
        other => Err(ParseError::UnknownValue {
            what,
            value: other.to_string(),
        }),
    }
}
