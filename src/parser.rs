//! Lenient markup parsing.
//!
//! Ad servers hand back anything from well-formed VAST to truncated XML or a
//! full HTML error page, so parsing never insists on a valid tree. Every
//! element is recorded in document order under its lowercased local name,
//! with lowercased attribute names and the concatenated text of its
//! descendants. Mismatched or stray end tags are tolerated; elements still
//! open at end of input are closed implicitly.

use crate::error::DocumentError;
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;

/// One element of a parsed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
}

impl Element {
    /// Lowercased local name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of the named attribute, matched case-insensitively
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Text content of the element and all its descendants
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Document-ordered index of every element in a response body
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Markup {
    elements: Vec<Element>,
}

impl Markup {
    /// All elements with the given name, in document order
    pub fn elements_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + use<'a, 'n> {
        self.elements
            .iter()
            .filter(move |element| element.name.eq_ignore_ascii_case(name))
    }

    /// First element with the given name
    pub fn first(&self, name: &str) -> Option<&Element> {
        self.elements
            .iter()
            .find(|element| element.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.first(name).is_some()
    }
}

/// Parse a response body into a [`Markup`] index.
///
/// Only a body that fails before yielding a single element is an error;
/// anything after the first element that the tokenizer rejects truncates the
/// index at that point instead.
pub fn parse_markup(body: &str) -> Result<Markup, DocumentError> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);
    reader.check_end_names(false);

    let mut buf = Vec::new();
    let mut elements: Vec<Element> = Vec::new();
    // Indices of elements whose end tag has not been seen yet
    let mut open: Vec<usize> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                elements.push(read_element(e));
                open.push(elements.len() - 1);
            }
            Ok(Event::Empty(ref e)) => {
                elements.push(read_element(e));
            }
            Ok(Event::End(ref e)) => {
                let name = lowercase(e.local_name().as_ref());
                // A stray end tag with no open counterpart is ignored
                if let Some(pos) = open.iter().rposition(|&idx| elements[idx].name == name) {
                    open.truncate(pos);
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                append_text(&mut elements, &open, &text);
            }
            Ok(Event::CData(e)) => {
                append_text(&mut elements, &open, &String::from_utf8_lossy(&e));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                if elements.is_empty() {
                    return Err(DocumentError::Unparseable(e.to_string()));
                }
                debug!(
                    "Stopping at malformed markup after {} elements: {}",
                    elements.len(),
                    e
                );
                break;
            }
            _ => (),
        }
        buf.clear();
    }

    Ok(Markup { elements })
}

fn read_element(start: &BytesStart) -> Element {
    let mut attributes = Vec::new();

    // html_attributes accepts unquoted and valueless attributes; broken ones are skipped
    for attr in start.html_attributes().flatten() {
        let key = lowercase(attr.key.local_name().as_ref());
        let value = attr
            .unescape_value()
            .map(Cow::into_owned)
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        attributes.push((key, value));
    }

    Element {
        name: lowercase(start.local_name().as_ref()),
        attributes,
        text: String::new(),
    }
}

fn append_text(elements: &mut [Element], open: &[usize], text: &str) {
    for &idx in open {
        elements[idx].text.push_str(text);
    }
}

fn lowercase(name: &[u8]) -> String {
    String::from_utf8_lossy(name).to_ascii_lowercase()
}
