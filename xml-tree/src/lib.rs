//! Owned XML element trees for configuration exports.
//!
//! [`parse`] turns a document into an [`XmlNode`] tree. The tree helpers
//! (`entries`, `members`, `text_of`) follow the PAN-OS export layout where every
//! named collection is a list of `<entry name="...">` elements and every list
//! value is a `<member>` element.

pub mod parser;
pub mod tree;

pub use parser::{parse, parse_file, ParseError};
pub use tree::XmlNode;
