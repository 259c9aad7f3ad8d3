//! XML implementation of [`NodeCreator`] on top of `quick-xml`.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::codec;
use super::elements::XSI_NAMESPACE;
use super::NodeCreator;
use crate::error::{BackupError, Result};

/// Streaming XML writer.
///
/// The start tag of the most recent node is held back until its first child
/// or its content arrives, so that attributes can still be added and so that
/// content-less and nil elements are written self-closing.
pub struct XmlNodeWriter<W: Write> {
    writer: Writer<W>,
    namespace: String,
    /// Names of the open elements, innermost last.
    open: Vec<String>,
    /// Start tag not yet written.
    pending: Option<BytesStart<'static>>,
}

impl<W: Write + Send> XmlNodeWriter<W> {
    /// Start a UTF-8 document whose root element declares `namespace`.
    pub fn new(output: W, namespace: impl Into<String>) -> Result<Self> {
        let mut writer = Writer::new(output);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;
        Ok(Self {
            writer,
            namespace: namespace.into(),
            open: Vec::new(),
            pending: None,
        })
    }

    /// Check that every element was closed and hand back the output.
    pub fn finish(mut self) -> Result<W> {
        if let Some(name) = self.open.last() {
            return Err(BackupError::IllegalState(format!(
                "Element <{}> was never closed",
                name
            )));
        }
        self.writer.get_mut().flush()?;
        Ok(self.writer.into_inner())
    }

    fn flush_pending(&mut self) -> Result<()> {
        if let Some(start) = self.pending.take() {
            self.writer.write_event(Event::Start(start)).map_err(xml_error)?;
        }
        Ok(())
    }

    fn pending_mut(&mut self, operation: &str) -> Result<&mut BytesStart<'static>> {
        let current = self.open.last().cloned().unwrap_or_default();
        self.pending.as_mut().ok_or_else(|| {
            BackupError::IllegalState(format!(
                "{} must directly follow add_node (current element: <{}>)",
                operation, current
            ))
        })
    }
}

impl<W: Write + Send> NodeCreator for XmlNodeWriter<W> {
    fn add_node(&mut self, name: &str) -> Result<()> {
        self.flush_pending()?;
        let mut start = BytesStart::new(name.to_string());
        if self.open.is_empty() {
            start.push_attribute(("xmlns", self.namespace.as_str()));
            start.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
        }
        self.open.push(name.to_string());
        self.pending = Some(start);
        Ok(())
    }

    fn add_attribute(&mut self, key: &str, value: &str) -> Result<()> {
        let escaped = codec::escape(value);
        self.pending_mut("add_attribute")?
            .push_attribute((key, escaped.as_ref()));
        Ok(())
    }

    fn set_content_string(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            None => {
                self.pending_mut("set_content")?
                    .push_attribute(("xsi:nil", "true"));
            }
            Some("") => {
                self.pending_mut("set_content")?;
            }
            Some(text) => {
                let start = self.pending_mut("set_content")?.clone();
                self.pending = None;
                self.writer.write_event(Event::Start(start)).map_err(xml_error)?;
                let escaped = codec::escape(text);
                self.writer
                    .write_event(Event::Text(BytesText::new(&escaped)))
                    .map_err(xml_error)?;
            }
        }
        Ok(())
    }

    fn close_entity(&mut self) -> Result<()> {
        let name = self
            .open
            .pop()
            .ok_or_else(|| BackupError::IllegalState("No open element to close".to_string()))?;
        match self.pending.take() {
            Some(start) => self.writer.write_event(Event::Empty(start)),
            None => self.writer.write_event(Event::End(BytesEnd::new(name))),
        }
        .map_err(xml_error)?;
        Ok(())
    }
}

fn xml_error(e: impl std::fmt::Display) -> BackupError {
    BackupError::Xml(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::elements::DEFAULT_NAMESPACE;

    fn written(build: impl FnOnce(&mut XmlNodeWriter<Vec<u8>>) -> Result<()>) -> String {
        let mut writer = XmlNodeWriter::new(Vec::new(), DEFAULT_NAMESPACE).unwrap();
        build(&mut writer).unwrap();
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_root_declares_namespaces() {
        let xml = written(|w| {
            w.add_node("backup")?;
            w.close_entity()
        });
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="UTF-8"?><backup xmlns="http://www.atlassian.com/ao" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"/>"#
        );
    }

    #[test]
    fn test_content_nil_and_empty() {
        let xml = written(|w| {
            w.add_node("backup")?;
            w.add_node("string")?;
            w.set_content_string(Some("a<b"))?;
            w.close_entity()?;
            w.add_node("string")?;
            w.set_content_string(None)?;
            w.close_entity()?;
            w.add_node("string")?;
            w.set_content_string(Some(""))?;
            w.close_entity()?;
            w.close_entity()
        });
        assert!(xml.contains("<string>a&lt;b</string>"));
        assert!(xml.contains(r#"<string xsi:nil="true"/>"#));
        assert!(xml.ends_with("<string/></backup>"));
    }

    #[test]
    fn test_attributes_are_escaped() {
        let xml = written(|w| {
            w.add_node("backup")?;
            w.add_node("meta")?;
            w.add_attribute("key", "a&b")?;
            w.add_attribute("value", "bell\u{7}")?;
            w.close_entity()?;
            w.close_entity()
        });
        assert!(xml.contains(r#"<meta key="a&amp;b" value="bell\u0007"/>"#));
    }

    #[test]
    fn test_typed_content() {
        let xml = written(|w| {
            w.add_node("backup")?;
            w.add_node("integer")?;
            w.set_content_integer(Some(-5))?;
            w.close_entity()?;
            w.add_node("boolean")?;
            w.set_content_bool(Some(false))?;
            w.close_entity()?;
            w.close_entity()
        });
        assert!(xml.contains("<integer>-5</integer><boolean>false</boolean>"));
    }

    #[test]
    fn test_attribute_after_content_is_illegal() {
        let mut writer = XmlNodeWriter::new(Vec::new(), DEFAULT_NAMESPACE).unwrap();
        writer.add_node("backup").unwrap();
        writer.add_node("string").unwrap();
        writer.set_content_string(Some("x")).unwrap();
        assert!(matches!(
            writer.add_attribute("late", "1"),
            Err(BackupError::IllegalState(_))
        ));
    }

    #[test]
    fn test_unclosed_document_is_rejected() {
        let mut writer = XmlNodeWriter::new(Vec::new(), DEFAULT_NAMESPACE).unwrap();
        writer.add_node("backup").unwrap();
        assert!(writer.finish().is_err());
        let mut writer = XmlNodeWriter::new(Vec::new(), DEFAULT_NAMESPACE).unwrap();
        assert!(writer.close_entity().is_err());
    }
}
