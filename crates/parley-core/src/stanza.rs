//! Stanza element trees
//!
//! Stanzas reach this crate already parsed by the transport. They are modeled
//! as a small element tree with attributes, text content and children, plus a
//! builder for the outbound direction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Namespaces
// ----------------------------------------------------------------------------

/// Protocol namespaces understood by the interpreter and composer
pub mod ns {
    pub const CLIENT: &str = "jabber:client";
    pub const CHAT_STATES: &str = "http://jabber.org/protocol/chatstates";
    pub const CHAT_MARKERS: &str = "urn:xmpp:chat-markers:0";
    pub const RECEIPTS: &str = "urn:xmpp:receipts";
    pub const STICKERS: &str = "urn:xmpp:stickers:0";
    pub const CARBONS: &str = "urn:xmpp:carbons:2";
    pub const FORWARD: &str = "urn:xmpp:forward:0";
    pub const DELAY: &str = "urn:xmpp:delay";
}

// ----------------------------------------------------------------------------
// Element
// ----------------------------------------------------------------------------

/// One element of a stanza tree
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Element {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(default)]
    attrs: BTreeMap<String, String>,
    #[serde(default)]
    children: Vec<Element>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    text: String,
}

impl Element {
    /// Create an element with no namespace
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create an element in a namespace
    pub fn with_ns<N: Into<String>, S: Into<String>>(name: N, namespace: S) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    /// Shorthand for a top-level `message` stanza
    pub fn message() -> Self {
        Self::new("message")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Attribute value, if present
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Concatenated text content of this element
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Builder: set an attribute
    pub fn attr_set<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Builder: set text content
    pub fn text_set<T: Into<String>>(mut self, text: T) -> Self {
        self.text = text.into();
        self
    }

    /// Builder: append a child element
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Depth-first descendants in document order, excluding self
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// First descendant with the given name
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.descendants().find(|el| el.name == name)
    }

    /// First descendant whose name is one of `names`, in document order
    pub fn find_any(&self, names: &[&str]) -> Option<&Element> {
        self.descendants().find(|el| names.contains(&el.name.as_str()))
    }

    /// True when any descendant has the given name
    pub fn has(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// First direct child with the given name and namespace
    pub fn get_child(&self, name: &str, namespace: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|el| el.name == name && el.namespace.as_deref() == Some(namespace))
    }
}

/// Iterator over the descendants of an element
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}
