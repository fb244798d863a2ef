//! XML utilities for the SpreadsheetML parts of an `.xlsx` package
//! Provides a reader wrapper, attribute and text helpers, and a writer used to patch worksheets

use crate::error::GeocodeSheetError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use quick_xml::Writer;
use std::borrow::Cow;
use std::io::BufRead;
use std::io::Write;
use std::str::FromStr;
use thiserror::Error;

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),

    #[error("Parse attribute value '{0}' failed")]
    ParseAttributeValueError(String),
}

/// XML reader wrapper configured for spreadsheet parsing
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Creates a new XML reader; empty elements are reported as a start/end pair
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        let buffer = Vec::with_capacity(1024);
        XmlReader { reader, buffer }
    }

    /// Reads the next XML event from the reader
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, GeocodeSheetError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(GeocodeSheetError::XmlError(error)),
        }
    }
}

/// XML writer that re-emits events, used to splice new content into an existing part
pub(crate) struct XmlWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> XmlWriter<W> {
    pub(crate) fn new(inner: W) -> XmlWriter<W> {
        XmlWriter { writer: Writer::new(inner) }
    }

    /// Writes a single event unchanged
    pub(crate) fn write<'a>(&mut self, event: Event<'a>) -> Result<(), GeocodeSheetError> {
        self.writer.write_event(event)?;
        Ok(())
    }

    /// Writes `<name attributes...>text</name>`; an empty text still produces both tags
    pub(crate) fn write_text_element(&mut self, start: BytesStart<'_>, text: &str) -> Result<(), GeocodeSheetError> {
        let end = start.to_end().into_owned();
        self.write(Event::Start(start))?;
        if !text.is_empty() {
            self.write(Event::Text(BytesText::new(text)))?;
        }
        self.write(Event::End(end))
    }

    pub(crate) fn write_end(&mut self, name: &str) -> Result<(), GeocodeSheetError> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    pub(crate) fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

/// Helper trait for XML attributes providing convenient value extraction and parsing
pub(crate) trait XmlAttributeHelper<'a> {
    /// Gets the unescaped attribute value as a string
    fn get_value(&self) -> Result<Cow<'a, str>, GeocodeSheetError>;

    /// Parses the attribute value to the specified type
    fn parse_value<T: FromStr>(&self) -> Result<T, GeocodeSheetError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, GeocodeSheetError> {
        Ok(self.unescape_value()?)
    }

    fn parse_value<T: FromStr>(&self) -> Result<T, GeocodeSheetError> {
        self.get_value()?
            .parse()
            .map_err(|_| match std::str::from_utf8(&self.value) {
                Ok(value) => GeocodeSheetError::XmlHelperError(XmlError::ParseAttributeValueError(value.to_string())),
                Err(error) => GeocodeSheetError::StringEncodingError(error),
            })
    }
}

/// Helper trait for XML nodes providing attribute access methods
pub(crate) trait XmlNodeHelper<'a> {
    /// Gets an attribute value by name
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, GeocodeSheetError>;

    /// Parses an attribute value to the specified type
    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, GeocodeSheetError>;

    /// Copies the element with the named attributes removed
    fn without_attributes(&self, names: &[&str]) -> Result<BytesStart<'static>, GeocodeSheetError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, GeocodeSheetError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.get_value())
            .transpose()
    }

    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, GeocodeSheetError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.parse_value())
            .transpose()
    }

    fn without_attributes(&self, names: &[&str]) -> Result<BytesStart<'static>, GeocodeSheetError> {
        let mut copy = self.to_owned();
        copy.clear_attributes();
        for result in self.attributes() {
            let attribute = result?;
            if !names.iter().any(|name| attribute.key.as_ref() == name.as_bytes()) {
                copy.push_attribute(attribute);
            }
        }
        Ok(copy)
    }
}

/// Helper trait for building text content from XML events
pub(crate) trait XmlTextContextHelper {
    /// Appends text content from BytesRef event (handles entities and character references)
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), GeocodeSheetError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), GeocodeSheetError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = if let Some(hex) = number.strip_prefix('x') {
                u32::from_str_radix(hex, 16)?
            } else {
                number.parse::<u32>()?
            };
            if let Some(character) = std::char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }

        Ok(())
    }
}

#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_entities_and_character_references() -> Result<(), GeocodeSheetError> {
        let xml = r#"<t>Tom &amp; Jerry &#x4E2D;&#25991;</t>"#;
        let mut reader = XmlReader::new(Cursor::new(xml.as_bytes()));
        let mut text = String::new();
        match_xml_events!(reader => {
            Event::Text(event) => text.push_str(&event.xml_content()?),
            Event::GeneralRef(event) => text.push_bytes_ref(&event)?,
        });
        assert_eq!(text, "Tom & Jerry 中文");
        Ok(())
    }

    #[test]
    fn unknown_entity_is_an_error() {
        let xml = r#"<t>&bogus;</t>"#;
        let mut reader = XmlReader::new(Cursor::new(xml.as_bytes()));
        let mut text = String::new();
        let result: Result<(), GeocodeSheetError> = (|| {
            match_xml_events!(reader => {
                Event::GeneralRef(event) => text.push_bytes_ref(&event)?,
            });
            Ok(())
        })();
        assert!(matches!(
            result,
            Err(GeocodeSheetError::XmlHelperError(XmlError::ParseEntityError(_)))
        ));
    }

    #[test]
    fn parses_attribute_values() -> Result<(), GeocodeSheetError> {
        let xml = r#"<row r="12" spans="1:3" ht="15"/>"#;
        let mut reader = XmlReader::new(Cursor::new(xml.as_bytes()));
        let mut row = None;
        let mut stripped = None;
        match_xml_events!(reader => {
            Event::Start(event) => {
                row = event.parse_attribute_value::<usize>("r")?;
                stripped = Some(event.without_attributes(&["spans"])?);
            }
        });
        assert_eq!(row, Some(12));
        let stripped = stripped.unwrap();
        assert!(stripped.try_get_attribute("spans").unwrap().is_none());
        assert_eq!(stripped.get_attribute_value("ht")?.as_deref(), Some("15"));
        Ok(())
    }

    #[test]
    fn writer_escapes_text() {
        let mut writer = XmlWriter::new(Vec::new());
        writer
            .write_text_element(BytesStart::new("t"), "a < b & c")
            .unwrap();
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(xml, "<t>a &lt; b &amp; c</t>");
    }
}
