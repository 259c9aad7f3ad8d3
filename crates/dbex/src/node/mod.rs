//! Streaming node model over a hierarchical backup document.
//!
//! A document is read through a [`NodeParser`] cursor and written through a
//! [`NodeCreator`]. Neither ever materializes a tree:
//!
//! - the parser is positioned on one node at a time, either the entry into an
//!   element (`is_closed() == false`) or the exit from it (`is_closed() == true`);
//!   [`NodeParser::next_node`] moves exactly one step and the borrow checker
//!   keeps callers from holding on to a node across that step
//! - the creator appends nodes, attributes and content in document order
//!
//! The concrete format is XML ([`XmlNodeReader`], [`XmlNodeWriter`]); the
//! pipelines only see the traits.

pub mod codec;
pub mod elements;
pub mod reader;
pub mod row;
pub mod writer;

pub use reader::XmlNodeReader;
pub use writer::XmlNodeWriter;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{BackupError, Result};

/// Forward-only cursor over a node stream.
pub trait NodeParser: Send {
    /// Name of the current node; empty once the document is exhausted.
    fn name(&self) -> &str;

    /// Whether the cursor sits on the close of the current element.
    fn is_closed(&self) -> bool;

    /// Attribute of the current (open) node, escape-decoded.
    fn attribute(&self, key: &str) -> Option<&str>;

    /// Human readable position in the underlying document.
    fn location(&self) -> String;

    /// Advance one step. Returns `false` at the end of the document.
    fn next_node(&mut self) -> Result<bool>;

    /// Consume the text content of the current open leaf.
    ///
    /// Returns `None` for a nil leaf. Afterwards the cursor sits on the leaf's
    /// close node. Fails with [`BackupError::IllegalState`] anywhere else.
    fn content_as_string(&mut self) -> Result<Option<String>>;

    /// Skip the current open element with everything inside it, text
    /// included, leaving the cursor on its close node.
    fn skip_element(&mut self) -> Result<()>;

    fn required_attribute(&self, key: &str) -> Result<&str> {
        self.attribute(key).ok_or_else(|| {
            BackupError::parse(
                format!("Required attribute {} not found in node {}", key, describe(self)),
                self.location(),
            )
        })
    }

    fn content_as_bool(&mut self) -> Result<Option<bool>> {
        Ok(self.content_as_string()?.map(|s| codec::parse_bool(&s)))
    }

    fn content_as_integer(&mut self) -> Result<Option<i64>> {
        self.content_as_string()?
            .map(|s| {
                codec::parse_integer(&s).ok_or_else(|| {
                    BackupError::parse(format!("'{}' is not a valid integer.", s), self.location())
                })
            })
            .transpose()
    }

    fn content_as_decimal(&mut self) -> Result<Option<Decimal>> {
        self.content_as_string()?
            .map(|s| {
                codec::parse_decimal(&s).ok_or_else(|| {
                    BackupError::parse(format!("'{}' is not a valid number.", s), self.location())
                })
            })
            .transpose()
    }

    fn content_as_date(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.content_as_string()?
            .map(|s| {
                codec::parse_date(&s).ok_or_else(|| {
                    BackupError::parse(format!("'{}' is not a valid date.", s), self.location())
                })
            })
            .transpose()
    }
}

/// Append-only, single-pass document writer.
pub trait NodeCreator: Send {
    /// Open a child element of the current element.
    fn add_node(&mut self, name: &str) -> Result<()>;

    /// Add an attribute to the element just opened.
    fn add_attribute(&mut self, key: &str, value: &str) -> Result<()>;

    /// Set the text of the element just opened; `None` writes the nil marker.
    fn set_content_string(&mut self, value: Option<&str>) -> Result<()>;

    /// Close the current element.
    fn close_entity(&mut self) -> Result<()>;

    fn set_content_bool(&mut self, value: Option<bool>) -> Result<()> {
        self.set_content_string(value.map(codec::format_bool))
    }

    fn set_content_integer(&mut self, value: Option<i64>) -> Result<()> {
        self.set_content_string(value.map(|v| v.to_string()).as_deref())
    }

    fn set_content_decimal(&mut self, value: Option<&Decimal>) -> Result<()> {
        self.set_content_string(value.map(codec::format_decimal).as_deref())
    }

    fn set_content_date(&mut self, value: Option<&DateTime<Utc>>) -> Result<()> {
        self.set_content_string(value.map(codec::format_date).as_deref())
    }
}

/// `<name>` for an open node, `</name>` for a closed one.
pub fn describe<P: NodeParser + ?Sized>(node: &P) -> String {
    if node.is_closed() {
        format!("</{}>", node.name())
    } else {
        format!("<{}>", node.name())
    }
}

/// Fail unless the cursor is on the entry of element `name`.
pub fn check_start_node(node: &dyn NodeParser, name: &str) -> Result<()> {
    check_node(node, name, false)
}

/// Fail unless the cursor is on the close of element `name`.
pub fn check_end_node(node: &dyn NodeParser, name: &str) -> Result<()> {
    check_node(node, name, true)
}

fn check_node(node: &dyn NodeParser, name: &str, closed: bool) -> Result<()> {
    if node.name() != name {
        return Err(BackupError::parse(
            format!("{} is not named '{}' as expected", describe(node), name),
            node.location(),
        ));
    }
    if node.is_closed() != closed {
        return Err(BackupError::parse(
            format!("{} is not closed ({}) as expected", describe(node), closed),
            node.location(),
        ));
    }
    Ok(())
}

/// True when the cursor is on the entry of element `name`.
pub fn is_start(node: &dyn NodeParser, name: &str) -> bool {
    node.name() == name && !node.is_closed()
}
