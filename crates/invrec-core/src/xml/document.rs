//! A small owned element tree over quick-xml events.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::warn;

use crate::error::ImportError;
use crate::selector::SelectorSource;

const UTF8_BOM: &str = "\u{feff}";

/// One XML element with its attributes, direct text and children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written (`cbc:ID`).
    pub name: String,
    /// Local name without prefix (`ID`).
    pub local: String,
    /// Attributes by qualified name, in document order.
    pub attributes: Vec<(String, String)>,
    /// Concatenated direct text and CDATA content.
    pub text: String,
    pub children: Vec<XmlElement>,
}

/// A parsed document and the non-fatal problems met while parsing it.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    pub root: XmlElement,
    pub warnings: Vec<String>,
}

impl XmlDocument {
    /// Parse raw bytes.
    ///
    /// Invalid UTF-8 is decoded lossily; entity problems in text are kept
    /// raw and reported as warnings. Structural errors are fatal.
    pub fn parse(bytes: &[u8]) -> Result<Self, ImportError> {
        let mut warnings = Vec::new();
        let text = match std::str::from_utf8(bytes) {
            Ok(s) => Cow::Borrowed(s),
            Err(_) => {
                warnings.push("Document is not valid UTF-8; invalid bytes replaced".to_string());
                String::from_utf8_lossy(bytes)
            }
        };
        let text = text.trim_start_matches(UTF8_BOM).trim_start();

        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader.read_event().map_err(|e| ImportError::MalformedXml {
                reason: format!("at byte {}: {}", reader.error_position(), e),
            })?;

            match event {
                Event::Start(start) => {
                    stack.push(element_from(&start, &mut warnings));
                }
                Event::Empty(start) => {
                    let element = element_from(&start, &mut warnings);
                    attach(element, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| ImportError::MalformedXml {
                        reason: "unexpected closing tag".to_string(),
                    })?;
                    attach(element, &mut stack, &mut root)?;
                }
                Event::Text(t) => {
                    if let Some(current) = stack.last_mut() {
                        match t.unescape() {
                            Ok(s) => current.text.push_str(&s),
                            Err(e) => {
                                warnings.push(format!("Unescape problem in <{}>: {}", current.name, e));
                                current.text.push_str(&String::from_utf8_lossy(&t));
                            }
                        }
                    }
                }
                Event::CData(c) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(ImportError::MalformedXml {
                reason: format!("unclosed element <{}>", open.name),
            });
        }

        for warning in &warnings {
            warn!("{}", warning);
        }

        let root = root.ok_or(ImportError::EmptyDocument)?;
        Ok(Self { root, warnings })
    }
}

fn element_from(start: &BytesStart<'_>, warnings: &mut Vec<String>) -> XmlElement {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let local = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        match attr {
            Ok(attr) => {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = match attr.unescape_value() {
                    Ok(v) => v.into_owned(),
                    Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
                };
                attributes.push((key, value));
            }
            Err(e) => warnings.push(format!("Skipped malformed attribute on <{}>: {}", name, e)),
        }
    }

    XmlElement {
        name,
        local,
        attributes,
        ..Default::default()
    }
}

fn attach(
    element: XmlElement,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
) -> Result<(), ImportError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(ImportError::MalformedXml {
                reason: format!("second root element <{}>", element.name),
            });
        }
    }
    Ok(())
}

impl XmlElement {
    /// Attribute value by local name (prefix ignored).
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.rsplit(':').next() == Some(local) && !key.starts_with("xmlns"))
            .map(|(_, value)| value.as_str())
    }

    /// Namespace prefix of the tag, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Namespace URI bound to this element's own prefix (or the default namespace).
    pub fn namespace(&self) -> Option<&str> {
        let key = match self.prefix() {
            Some(prefix) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        };
        self.attributes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Values of all `xmlns` / `xmlns:*` declarations on this element.
    pub fn namespace_declarations(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(|(k, _)| k == "xmlns" || k.starts_with("xmlns:"))
            .map(|(_, v)| v.as_str())
    }

    /// Direct children with the given local name.
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.local == local)
    }

    /// Outermost descendants with the given local name, in document order.
    ///
    /// Matches nested inside a match are not returned.
    pub fn descendants_named<'a>(&'a self, local: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        for child in &self.children {
            child.collect_named(local, &mut found);
        }
        found
    }

    fn collect_named<'a>(&'a self, local: &str, found: &mut Vec<&'a XmlElement>) {
        if self.local == local {
            found.push(self);
            return;
        }
        for child in &self.children {
            child.collect_named(local, found);
        }
    }

    fn first_descendant_value(&self, step: &Step<'_>, rest: &[Step<'_>], attr: Option<&str>) -> Option<String> {
        self.children.iter().find_map(|child| {
            let here = step
                .matches(child)
                .then(|| child.path_value(rest, attr))
                .flatten();
            here.or_else(|| child.first_descendant_value(step, rest, attr))
        })
    }

    fn path_value(&self, rest: &[Step<'_>], attr: Option<&str>) -> Option<String> {
        match rest.split_first() {
            None => self.own_value(attr),
            Some((step, tail)) => self
                .children
                .iter()
                .filter(|child| step.matches(child))
                .find_map(|child| child.path_value(tail, attr)),
        }
    }

    fn own_value(&self, attr: Option<&str>) -> Option<String> {
        let value = match attr {
            Some(name) => self.attr(name)?,
            None => self.text.as_str(),
        };
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    }
}

/// One path step: a local name, optionally qualified by `[B/C=value]`.
#[derive(Debug)]
struct Step<'a> {
    local: &'a str,
    predicate: Option<(Vec<Step<'a>>, &'a str)>,
}

impl<'a> Step<'a> {
    fn parse(segment: &'a str) -> Self {
        let qualified = segment
            .split_once('[')
            .and_then(|(local, rest)| Some((local, rest.strip_suffix(']')?.split_once('=')?)));

        match qualified {
            Some((local, (path, value))) => Step {
                local,
                predicate: Some((
                    path.split('/').filter(|s| !s.is_empty()).map(Step::parse).collect(),
                    value.trim(),
                )),
            },
            None => Step {
                local: segment,
                predicate: None,
            },
        }
    }

    fn matches(&self, element: &XmlElement) -> bool {
        element.local == self.local
            && self
                .predicate
                .as_ref()
                .is_none_or(|(path, value)| element.path_value(path, None).as_deref() == Some(*value))
    }
}

/// Split a path on `/`, leaving slashes inside predicates alone.
fn steps(path: &str) -> Vec<Step<'_>> {
    let mut steps = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in path.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                if idx > start {
                    steps.push(Step::parse(&path[start..idx]));
                }
                start = idx + 1;
            }
            _ => {}
        }
    }
    if path.len() > start {
        steps.push(Step::parse(&path[start..]));
    }
    steps
}

/// Selector grammar, matched on local names:
///
/// - `A/B/C` finds `A` anywhere below the node, then follows direct children;
/// - `/A/B` anchors `A` to a direct child of the node;
/// - `A[B/C=v]` only accepts an `A` whose child path `B/C` reads `v`;
/// - a trailing `@attr` reads an attribute of the final element;
/// - a bare `@attr` reads the node's own attribute.
///
/// The first path that yields non-empty text wins.
impl SelectorSource for XmlElement {
    fn select(&self, selector: &str) -> Option<String> {
        let (path, attr) = match selector.rsplit_once('@') {
            Some((path, attr)) => (path, Some(attr)),
            None => (selector, None),
        };
        let anchored = path.starts_with('/');
        let steps = steps(path);

        let Some((first, rest)) = steps.split_first() else {
            return self.own_value(attr);
        };

        if anchored {
            self.children
                .iter()
                .filter(|child| first.matches(child))
                .find_map(|child| child.path_value(rest, attr))
        } else {
            self.first_descendant_value(first, rest, attr)
        }
    }
}
