//! Event reading over the XML parts of an `.xlsx` container.
use crate::error::PivotSheetError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Unknown entity '&{0};'")]
    ParseEntityError(String),

    #[error("Attribute {0}=\"{1}\" has an unexpected value")]
    ParseAttributeValueError(String, String),
}

/// Pull reader with one reused event buffer.
///
/// Empty elements are expanded into start and end events, and end tag names
/// are not checked, since hand-edited parts are common in pivot exports.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(source: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.check_end_names = false;
        config.check_comments = false;
        config.trim_text(false);
        XmlReader {
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// The next event, `None` once the part is exhausted.
    pub(crate) fn next_event(&'_ mut self) -> Result<Option<Event<'_>>, PivotSheetError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

/// Attribute access on a start tag, values unescaped.
pub(crate) trait XmlElementExt<'a> {
    fn attr(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, PivotSheetError>;

    /// Matches on the local part of the key, so `r:id` is found as `id`.
    fn attr_by_local_name(&'a self, local_name: &str) -> Result<Option<Cow<'a, str>>, PivotSheetError>;

    fn parse_attr<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, PivotSheetError>;
}

impl<'a> XmlElementExt<'a> for BytesStart<'a> {
    fn attr(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, PivotSheetError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.unescape_value()?)),
            None => Ok(None),
        }
    }

    fn attr_by_local_name(&'a self, local_name: &str) -> Result<Option<Cow<'a, str>>, PivotSheetError> {
        for attribute in self.attributes() {
            let attribute = attribute?;
            if attribute.key.local_name().as_ref() == local_name.as_bytes() {
                return Ok(Some(attribute.unescape_value()?));
            }
        }
        Ok(None)
    }

    fn parse_attr<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, PivotSheetError> {
        let Some(value) = self.attr(name)? else {
            return Ok(None);
        };
        match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(XmlError::ParseAttributeValueError(name.to_owned(), value.into_owned()))?,
        }
    }
}

/// Appends the text of an entity or character reference such as `&amp;` or `&#x41;`.
pub(crate) fn push_entity(text: &mut String, entity: &BytesRef) -> Result<(), PivotSheetError> {
    let name = entity.xml_content()?;
    if let Some(code) = name.strip_prefix('#') {
        let character = match code.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        }
        .and_then(char::from_u32);
        match character {
            Some(character) => text.push(character),
            None => Err(XmlError::ParseEntityError(name.to_string()))?,
        }
    } else if let Some(resolved) = resolve_xml_entity(&name) {
        text.push_str(resolved);
    } else {
        Err(XmlError::ParseEntityError(name.to_string()))?;
    }
    Ok(())
}

/// Loops over the events of an [`XmlReader`] until the end of the part,
/// ignoring events no arm matches.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(event) = $reader.next_event()? {
            match event {
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_xml_events;
    use std::io::Cursor;

    fn reader(xml: &str) -> XmlReader<Cursor<&[u8]>> {
        XmlReader::new(Cursor::new(xml.as_bytes()))
    }

    #[test]
    fn attributes_and_entities() -> Result<(), PivotSheetError> {
        let mut reader = reader(r#"<sheet xmlns:r="rel" name="WIP &amp; Waste" r:id="rId3" s=" 12 ">x&#65;&#x42;&lt;</sheet>"#);
        let mut name = String::new();
        let mut id = String::new();
        let mut style = None::<usize>;
        let mut text = String::new();
        match_xml_events!(reader => {
            Event::Start(event) => {
                name = event.attr("name")?.unwrap_or_default().into_owned();
                id = event.attr_by_local_name("id")?.unwrap_or_default().into_owned();
                style = event.parse_attr("s")?;
                assert!(event.attr("missing")?.is_none());
            }
            Event::Text(event) => text.push_str(&event.xml_content()?),
            Event::GeneralRef(event) => push_entity(&mut text, &event)?,
        });
        assert_eq!(name, "WIP & Waste");
        assert_eq!(id, "rId3");
        assert_eq!(style, Some(12));
        assert_eq!(text, "xAB<");
        Ok(())
    }

    #[test]
    fn bad_values_are_errors() -> Result<(), PivotSheetError> {
        let mut reader = reader(r#"<c s="bold">&nbsp;</c>"#);
        let mut errors = Vec::new();
        match_xml_events!(reader => {
            Event::Start(event) => errors.push(event.parse_attr::<usize>("s").unwrap_err().to_string()),
            Event::GeneralRef(event) => errors.push(push_entity(&mut String::new(), &event).unwrap_err().to_string()),
        });
        assert_eq!(errors, vec![
            "Attribute s=\"bold\" has an unexpected value".to_owned(),
            "Unknown entity '&nbsp;'".to_owned(),
        ]);
        Ok(())
    }
}
