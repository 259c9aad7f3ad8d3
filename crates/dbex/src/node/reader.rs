//! XML implementation of [`NodeParser`] on top of `quick-xml`.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::codec;
use super::elements::XSI_NAMESPACE;
use super::{describe, NodeParser};
use crate::error::{BackupError, Result};

/// The node under the cursor.
#[derive(Debug, Default)]
struct Position {
    name: String,
    closed: bool,
    attributes: Vec<(String, String)>,
}

/// Pull parser producing one [`NodeParser`] step per element boundary.
///
/// Whitespace between tags, comments and processing instructions are
/// skipped. Self-closing elements yield an entry step followed by a
/// synthesized close step.
pub struct XmlNodeReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    current: Position,
    /// Close step owed for a self-closing element.
    pending_close: Option<String>,
    /// `nil` attribute key, `xsi:nil` unless the root binds another prefix.
    nil_key: String,
    finished: bool,
}

/// Raw step read from the XML stream.
enum Step {
    Open {
        name: String,
        attributes: Vec<(String, String)>,
        empty: bool,
    },
    Close(String),
    Text(String),
    Eof,
}

impl<R: BufRead + Send> XmlNodeReader<R> {
    /// Create a reader positioned on the root element.
    pub fn new(input: R) -> Result<Self> {
        let mut reader = Self {
            reader: Reader::from_reader(input),
            buf: Vec::new(),
            current: Position::default(),
            pending_close: None,
            nil_key: "xsi:nil".to_string(),
            finished: false,
        };

        if !reader.next_node()? {
            return Err(BackupError::parse("Document has no root element.", reader.location()));
        }
        if let Some(prefix) = reader
            .current
            .attributes
            .iter()
            .find(|(key, value)| key.starts_with("xmlns:") && value == XSI_NAMESPACE)
            .map(|(key, _)| key["xmlns:".len()..].to_string())
        {
            reader.nil_key = format!("{}:nil", prefix);
        }
        Ok(reader)
    }

    fn read_step(&mut self) -> Result<Step> {
        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| BackupError::parse(e.to_string(), self.reader.buffer_position().to_string()))?;

            let step = match event {
                Event::Start(e) => Self::open_step(&e, false)?,
                Event::Empty(e) => Self::open_step(&e, true)?,
                Event::End(e) => Step::Close(utf8(e.name().as_ref())?),
                Event::Text(t) => Step::Text(t.unescape().map_err(xml_error)?.into_owned()),
                Event::CData(c) => Step::Text(utf8(&c.into_inner())?),
                Event::Eof => Step::Eof,
                Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => continue,
            };
            return Ok(step);
        }
    }

    fn open_step(start: &BytesStart<'_>, empty: bool) -> Result<Step> {
        let name = utf8(start.name().as_ref())?;
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(xml_error)?;
            let key = utf8(attribute.key.as_ref())?;
            let value = attribute.unescape_value().map_err(xml_error)?;
            let value = codec::unescape(&value).map_err(BackupError::Xml)?.into_owned();
            attributes.push((key, value));
        }
        Ok(Step::Open {
            name,
            attributes,
            empty,
        })
    }

    fn is_nil(&self) -> bool {
        self.attribute(&self.nil_key) == Some("true")
    }

    fn require_open(&self, operation: &str) -> Result<()> {
        if self.finished || self.current.closed {
            return Err(BackupError::IllegalState(format!(
                "{} requires an open node, the cursor is on {}",
                operation,
                describe(self)
            )));
        }
        Ok(())
    }

    fn close_current(&mut self) {
        self.current.closed = true;
        self.current.attributes.clear();
    }
}

impl<R: BufRead + Send> NodeParser for XmlNodeReader<R> {
    fn name(&self) -> &str {
        &self.current.name
    }

    fn is_closed(&self) -> bool {
        self.current.closed
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.current
            .attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn location(&self) -> String {
        format!("byte {}", self.reader.buffer_position())
    }

    fn next_node(&mut self) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }
        if let Some(name) = self.pending_close.take() {
            self.current = Position {
                name,
                closed: true,
                attributes: Vec::new(),
            };
            return Ok(true);
        }

        loop {
            match self.read_step()? {
                Step::Open {
                    name,
                    attributes,
                    empty,
                } => {
                    if empty {
                        self.pending_close = Some(name.clone());
                    }
                    self.current = Position {
                        name,
                        closed: false,
                        attributes,
                    };
                    return Ok(true);
                }
                Step::Close(name) => {
                    self.current = Position {
                        name,
                        closed: true,
                        attributes: Vec::new(),
                    };
                    return Ok(true);
                }
                Step::Text(text) if text.trim().is_empty() => continue,
                Step::Text(_) => {
                    return Err(BackupError::parse(
                        "Unable to find start or end tag, or end of document.",
                        self.location(),
                    ))
                }
                Step::Eof => {
                    self.finished = true;
                    self.current = Position::default();
                    self.current.closed = true;
                    return Ok(false);
                }
            }
        }
    }

    fn content_as_string(&mut self) -> Result<Option<String>> {
        self.require_open("Reading content")?;
        let nil = self.is_nil();
        let name = self.current.name.clone();

        if self.pending_close.take().is_some() {
            self.close_current();
            return Ok(if nil { None } else { Some(String::new()) });
        }

        let mut text = String::new();
        loop {
            match self.read_step()? {
                Step::Text(t) => text.push_str(&t),
                Step::Close(end) if end == name => break,
                Step::Close(end) => {
                    return Err(BackupError::parse(
                        format!("Unexpected </{}> while reading the content of <{}>", end, name),
                        self.location(),
                    ))
                }
                Step::Open { name: child, .. } => {
                    return Err(BackupError::parse(
                        format!("Unexpected <{}> while reading the content of <{}>", child, name),
                        self.location(),
                    ))
                }
                Step::Eof => {
                    return Err(BackupError::parse(
                        format!("Document ended inside <{}>", name),
                        self.location(),
                    ))
                }
            }
        }
        self.close_current();

        if nil {
            return Ok(None);
        }
        let decoded = codec::unescape(&text)
            .map_err(|e| BackupError::parse(e, self.location()))?
            .into_owned();
        Ok(Some(decoded))
    }

    fn skip_element(&mut self) -> Result<()> {
        self.require_open("Skipping an element")?;
        if self.pending_close.take().is_none() {
            let mut depth = 1usize;
            while depth > 0 {
                match self.read_step()? {
                    Step::Open { empty: false, .. } => depth += 1,
                    Step::Open { empty: true, .. } | Step::Text(_) => {}
                    Step::Close(_) => depth -= 1,
                    Step::Eof => {
                        return Err(BackupError::parse(
                            format!("Document ended inside <{}>", self.current.name),
                            self.location(),
                        ))
                    }
                }
            }
        }
        self.close_current();
        Ok(())
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| BackupError::Xml(e.to_string()))
}

fn xml_error(e: impl std::fmt::Display) -> BackupError {
    BackupError::Xml(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(xml: &str) -> XmlNodeReader<&[u8]> {
        XmlNodeReader::new(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_positions_on_root() {
        let node = reader(r#"<?xml version="1.0"?><backup xmlns="urn:x"></backup>"#);
        assert_eq!(node.name(), "backup");
        assert!(!node.is_closed());
    }

    #[test]
    fn test_walks_open_and_close_steps() {
        let mut node = reader("<backup>\n  <table name=\"T\">\n    <column name=\"C\"/>\n  </table>\n</backup>");
        let mut steps = vec![describe(&node)];
        while node.next_node().unwrap() {
            steps.push(describe(&node));
        }
        assert_eq!(
            steps,
            vec!["<backup>", "<table>", "<column>", "</column>", "</table>", "</backup>"]
        );
        assert!(!node.next_node().unwrap());
    }

    #[test]
    fn test_attributes_are_decoded() {
        let mut node = reader(r#"<backup><meta key="a &amp; b" value="x\u0001\\y"/></backup>"#);
        node.next_node().unwrap();
        assert_eq!(node.attribute("key"), Some("a & b"));
        assert_eq!(node.required_attribute("value").unwrap(), "x\u{1}\\y");
        let err = node.required_attribute("missing").unwrap_err();
        assert!(err.to_string().contains("Required attribute missing not found in node <meta>"));
    }

    #[test]
    fn test_nil_and_empty_string_are_distinct() {
        let mut node = reader(
            r#"<backup xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><row><string xsi:nil="true"/><string/><string></string><string>a&lt;b</string></row></backup>"#,
        );
        node.next_node().unwrap();
        node.next_node().unwrap();
        assert_eq!(node.content_as_string().unwrap(), None);
        assert!(node.is_closed());
        node.next_node().unwrap();
        assert_eq!(node.content_as_string().unwrap(), Some(String::new()));
        node.next_node().unwrap();
        assert_eq!(node.content_as_string().unwrap(), Some(String::new()));
        node.next_node().unwrap();
        assert_eq!(node.content_as_string().unwrap(), Some("a<b".to_string()));
        assert_eq!(describe(&node), "</string>");
        node.next_node().unwrap();
        assert_eq!(describe(&node), "</row>");
    }

    #[test]
    fn test_custom_xsi_prefix() {
        let mut node = reader(
            r#"<backup xmlns:i="http://www.w3.org/2001/XMLSchema-instance"><integer i:nil="true"></integer></backup>"#,
        );
        node.next_node().unwrap();
        assert_eq!(node.content_as_integer().unwrap(), None);
    }

    #[test]
    fn test_typed_content() {
        let mut node = reader(
            "<backup><boolean>TRUE</boolean><integer>-12</integer><double>1.25</double><timestamp>2020-01-02T03:04:05.006Z</timestamp><integer>x</integer></backup>",
        );
        node.next_node().unwrap();
        assert_eq!(node.content_as_bool().unwrap(), Some(true));
        node.next_node().unwrap();
        assert_eq!(node.content_as_integer().unwrap(), Some(-12));
        node.next_node().unwrap();
        assert_eq!(node.content_as_decimal().unwrap().map(|d| d.to_string()), Some("1.25".into()));
        node.next_node().unwrap();
        let date = node.content_as_date().unwrap().unwrap();
        assert_eq!(codec::format_date(&date), "2020-01-02T03:04:05.006Z");
        node.next_node().unwrap();
        assert!(matches!(node.content_as_integer(), Err(BackupError::Parse { .. })));
    }

    #[test]
    fn test_content_on_closed_node_is_illegal() {
        let mut node = reader("<backup><table></table></backup>");
        node.next_node().unwrap();
        node.next_node().unwrap();
        assert!(node.is_closed());
        assert!(matches!(node.content_as_string(), Err(BackupError::IllegalState(_))));
    }

    #[test]
    fn test_stray_text_is_a_parse_error() {
        let mut node = reader("<backup>oops<table/></backup>");
        let err = node.next_node().unwrap_err();
        assert!(err.to_string().contains("Unable to find start or end tag"));
        assert!(err.to_string().contains("Location: byte"));
    }

    #[test]
    fn test_child_inside_leaf_is_a_parse_error() {
        let mut node = reader("<backup><string>a<b/></string></backup>");
        node.next_node().unwrap();
        assert!(matches!(node.content_as_string(), Err(BackupError::Parse { .. })));
    }

    #[test]
    fn test_skip_element_with_text() {
        let mut node = reader("<backup><extra a=\"1\"><x>text</x><y/></extra><table/></backup>");
        node.next_node().unwrap();
        node.skip_element().unwrap();
        assert_eq!(describe(&node), "</extra>");
        node.next_node().unwrap();
        assert_eq!(describe(&node), "<table>");
        node.skip_element().unwrap();
        assert_eq!(describe(&node), "</table>");
        node.next_node().unwrap();
        assert_eq!(describe(&node), "</backup>");
    }

    #[test]
    fn test_skips_comments() {
        let mut node = reader("<backup><!-- note --><table/></backup>");
        node.next_node().unwrap();
        assert_eq!(node.name(), "table");
    }
}
