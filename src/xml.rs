//! Small XML element tree built on `quick-xml`
//!
//! WFS responses are small documents that are inspected by path
//! (`FeatureTypeList/FeatureType/Name`), so they are read into an owned tree
//! instead of being matched event by event. Element and attribute names keep
//! their prefix; the namespace URI of each element is resolved from the
//! `xmlns` declarations in scope.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;

use crate::error::{HarnessError, HarnessResult};

pub mod ns {
    pub const WFS: &str = "http://www.opengis.net/wfs";
    pub const OWS: &str = "http://www.opengis.net/ows";
    pub const OGC: &str = "http://www.opengis.net/ogc";
    pub const GML: &str = "http://www.opengis.net/gml";
    pub const XSD: &str = "http://www.w3.org/2001/XMLSchema";
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
    pub const XLINK: &str = "http://www.w3.org/1999/xlink";
    pub const FARMOS: &str = "https://farmos.org/wfs";
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Qualified name as written in the document
    pub name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>, scopes: &[HashMap<String, String>]) -> HarnessResult<(Self, HashMap<String, String>)> {
        let name = String::from_utf8_lossy(start.name().as_ref()).to_string();

        let mut attributes = Vec::new();
        let mut declared = HashMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| HarnessError::Xml(format!("Invalid attribute: {}", e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| HarnessError::Xml(format!("Invalid attribute value: {}", e)))?
                .to_string();

            if key == "xmlns" {
                declared.insert(String::new(), value.clone());
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declared.insert(prefix.to_string(), value.clone());
            }
            attributes.push((key, value));
        }

        let prefix = name.split_once(':').map(|(p, _)| p).unwrap_or("");
        let namespace = declared
            .get(prefix)
            .cloned()
            .or_else(|| scopes.iter().rev().find_map(|s| s.get(prefix).cloned()));

        Ok((
            Self {
                name,
                namespace,
                attributes,
                children: Vec::new(),
                text: String::new(),
            },
            declared,
        ))
    }

    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(p, _)| p)
    }

    /// Whether this element has the given local name (and namespace, if one is given)
    pub fn is(&self, namespace: Option<&str>, local_name: &str) -> bool {
        self.local_name() == local_name
            && namespace.is_none_or(|ns| self.namespace.as_deref() == Some(ns))
    }

    /// Attribute value by qualified or local name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .or_else(|| self.attributes.iter().find(|(k, _)| local(k) == name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// First child with the given local name
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.local_name() == local_name)
    }

    pub fn children_named<'a, 'n>(
        &'a self,
        local_name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + use<'a, 'n> {
        self.children.iter().filter(move |c| c.local_name() == local_name)
    }

    /// First element reached by a `/`-separated path of local names, relative to this element
    pub fn find(&self, path: &str) -> Option<&Element> {
        self.find_all(path).into_iter().next()
    }

    /// All elements reached by a `/`-separated path of local names
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let mut current = vec![self];
        for step in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            current = current
                .into_iter()
                .flat_map(|e| e.children_named(step))
                .collect();
        }
        current
    }

    /// Text of the element at `path`, if present
    pub fn find_text(&self, path: &str) -> Option<&str> {
        self.find(path).map(|e| e.text())
    }

    /// Depth-first search over all descendants
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack: Vec<&Element> = self.children.iter().rev().collect();
        while let Some(e) = stack.pop() {
            out.push(e);
            stack.extend(e.children.iter().rev());
        }
        out
    }
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, l)| l).unwrap_or(name)
}

/// Parse a complete document and return its root element
pub fn parse(xml: &str) -> HarnessResult<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut scopes: Vec<HashMap<String, String>> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let (element, declared) = Element::from_start(e, &scopes)?;
                scopes.push(declared);
                stack.push(element);
            }
            Ok(Event::Empty(ref e)) => {
                let (element, _) = Element::from_start(e, &scopes)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| HarnessError::Xml(format!("Invalid text: {}", e)))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                scopes.pop();
                let element = stack
                    .pop()
                    .ok_or_else(|| HarnessError::Xml("Unbalanced end tag".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(HarnessError::Xml(format!(
                    "XML parse error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(HarnessError::Xml("Unexpected end of document".to_string()));
    }

    root.ok_or_else(|| HarnessError::Xml("Document has no root element".to_string()))
}

/// Thin wrapper over `quick_xml::Writer` producing an indented UTF-8 document
pub struct XmlWriter {
    writer: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub fn new() -> HarnessResult<Self> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_err)?;
        Ok(Self { writer })
    }

    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> HarnessResult<()> {
        let mut start = BytesStart::new(name);
        for attr in attributes {
            start.push_attribute(*attr);
        }
        self.writer.write_event(Event::Start(start)).map_err(write_err)
    }

    pub fn end(&mut self, name: &str) -> HarnessResult<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(write_err)
    }

    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> HarnessResult<()> {
        let mut start = BytesStart::new(name);
        for attr in attributes {
            start.push_attribute(*attr);
        }
        self.writer.write_event(Event::Empty(start)).map_err(write_err)
    }

    /// `<name attrs>text</name>` with the text escaped
    pub fn text_element(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> HarnessResult<()> {
        self.start(name, attributes)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_err)?;
        self.end(name)
    }

    pub fn finish(self) -> HarnessResult<String> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| HarnessError::Xml(format!("Writer produced invalid UTF-8: {}", e)))
    }
}

fn write_err(e: impl std::fmt::Display) -> HarnessError {
    HarnessError::Xml(format!("XML write error: {}", e))
}
