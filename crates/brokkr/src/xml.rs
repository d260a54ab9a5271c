//! Owned xml tree used for both urdf and mjcf documents.
//!
//! The tree is built from [`quick_xml`] events and keeps everything the
//! conversion tools do not touch (comments, whitespace, attribute order), so a
//! document survives a read/write cycle mostly unchanged. The xml declaration
//! is always written as `<?xml version="1.0" encoding="utf-8"?>` and elements
//! without children are always written self-closing.

use std::{fmt, fs, path::Path};

use quick_xml::{
    Reader, Writer,
    events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event},
};
use thiserror::Error;

use crate::error::{Error, Result};

/// Reasons an xml document can fail to parse.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error("closing tag `</{0}>` without matching opening tag")]
    UnexpectedEnd(String),

    #[error("element `<{0}>` is never closed")]
    Unclosed(String),

    #[error("document has no root element")]
    NoRoot,

    #[error("document has more than one root element")]
    MultipleRoots,
}

impl From<quick_xml::events::attributes::AttrError> for ParseError {
    fn from(value: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(value.into())
    }
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Unescaped character data.
    Text(String),
    Comment(String),
    CData(String),
    ProcessingInstruction(String),
    DocType(String),
}

/// An element with ordered attributes and child nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder style variant of [`Element::set_attr`].
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(index).1)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Direct child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First direct child element with the given tag name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    /// Index into [`Element::children`] of the first child element with the given tag name.
    #[must_use]
    pub fn child_index(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, Node::Element(element) if element.name == name))
    }

    pub fn push(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }

    pub fn insert(&mut self, index: usize, element: Element) {
        self.children.insert(index, Node::Element(element));
    }

    /// All elements in the subtree rooted at `self` in document order, including `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// All elements with the given tag name in the subtree rooted at `self`, in document order.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.descendants().filter(move |element| element.name == name)
    }

    /// Call `f` on every element in the subtree in document order, including `self`.
    pub fn for_each_descendant_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        f(self);
        for node in &mut self.children {
            if let Node::Element(element) = node {
                element.for_each_descendant_mut(f);
            }
        }
    }

    fn from_start(start: &BytesStart) -> std::result::Result<Self, ParseError> {
        let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));

        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            element.attributes.push((key, value));
        }

        Ok(element)
    }

    fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> fmt::Result {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            return write_event(writer, Event::Empty(start));
        }

        write_event(writer, Event::Start(start))?;
        for child in &self.children {
            child.write(writer)?;
        }
        write_event(writer, Event::End(BytesEnd::new(self.name.as_str())))
    }
}

impl Node {
    fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> fmt::Result {
        match self {
            Node::Element(element) => element.write(writer),
            Node::Text(text) => write_event(writer, Event::Text(BytesText::new(text))),
            Node::Comment(comment) => {
                write_event(writer, Event::Comment(BytesText::from_escaped(comment)))
            }
            Node::CData(data) => write_event(writer, Event::CData(BytesCData::new(data))),
            Node::ProcessingInstruction(content) => {
                write_event(writer, Event::PI(BytesPI::new(content.as_str())))
            }
            Node::DocType(doctype) => {
                write_event(writer, Event::DocType(BytesText::from_escaped(doctype)))
            }
        }
    }
}

/// Pre-order iterator over an element subtree, see [`Element::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.elements().collect::<Vec<_>>().into_iter().rev());
        Some(element)
    }
}

/// A parsed xml document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Comments, processing instructions and doctype before the root element.
    pub prolog: Vec<Node>,
    pub root: Element,
    /// Comments and processing instructions after the root element.
    pub epilog: Vec<Node>,
}

impl Document {
    #[must_use]
    pub fn new(root: Element) -> Self {
        Self {
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }

    pub fn parse(xml: &str) -> std::result::Result<Self, ParseError> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root = None;

        loop {
            let node = match reader.read_event()? {
                Event::Start(start) => {
                    stack.push(Element::from_start(&start)?);
                    continue;
                }
                Event::End(end) => stack.pop().map(Node::Element).ok_or_else(|| {
                    ParseError::UnexpectedEnd(String::from_utf8_lossy(end.name().as_ref()).into())
                })?,
                Event::Empty(start) => Node::Element(Element::from_start(&start)?),
                Event::Text(text) => Node::Text(text.unescape()?.into_owned()),
                Event::CData(data) => Node::CData(lossy(&data)),
                Event::Comment(comment) => Node::Comment(lossy(&comment)),
                Event::PI(content) => Node::ProcessingInstruction(lossy(&content)),
                Event::DocType(doctype) => Node::DocType(lossy(&doctype)),
                Event::Decl(_) => continue,
                Event::Eof => break,
            };

            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
                continue;
            }

            match node {
                Node::Element(element) if root.is_none() => root = Some(element),
                Node::Element(_) => return Err(ParseError::MultipleRoots),
                Node::Text(text) if text.trim().is_empty() => {}
                other if root.is_none() => prolog.push(other),
                other => epilog.push(other),
            }
        }

        if let Some(unclosed) = stack.pop() {
            return Err(ParseError::Unclosed(unclosed.name));
        }

        Ok(Self {
            prolog,
            root: root.ok_or(ParseError::NoRoot)?,
            epilog,
        })
    }

    /// Read and parse the document at `path`.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path).map_err(Error::io(path))?;
        Self::parse(&xml).map_err(Error::xml(path))
    }

    /// Serialize the document to `path`, replacing any existing file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_string()).map_err(Error::io(path))
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut writer = Writer::new(Vec::new());
        let newline = || Event::Text(BytesText::from_escaped("\n"));

        write_event(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
        )?;
        write_event(&mut writer, newline())?;

        for node in &self.prolog {
            node.write(&mut writer)?;
            write_event(&mut writer, newline())?;
        }

        self.root.write(&mut writer)?;
        write_event(&mut writer, newline())?;

        for node in &self.epilog {
            node.write(&mut writer)?;
            write_event(&mut writer, newline())?;
        }

        f.write_str(&String::from_utf8_lossy(&writer.into_inner()))
    }
}

fn write_event<W: std::io::Write>(writer: &mut Writer<W>, event: Event<'_>) -> fmt::Result {
    writer.write_event(event).map_err(|_| fmt::Error)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
