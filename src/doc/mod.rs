// src/doc/mod.rs

//! Schemaless attribute/child document trees.
//!
//! Every document the server touches -- wire requests and responses,
//! `server.cfg`, per-add-on `addon.cfg` metadata, and the pack files
//! themselves -- is one of these trees: a map of typed attributes plus
//! an ordered sequence of tagged child nodes. The text codec lives in
//! [`text`]; gzip framing on top of it lives in `crate::pack`.

pub mod text;

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub use text::{parse, write};

/// Errors from the document text codec.
#[derive(Error, Debug)]
pub enum DocError {
    #[error("unexpected end of document")]
    UnexpectedEof,

    #[error("line {line}: unclosed [{tag}]")]
    UnclosedTag { tag: String, line: usize },

    #[error("line {line}: [/{found}] does not close [{expected}]")]
    MismatchedClose {
        expected: String,
        found: String,
        line: usize,
    },

    #[error("line {line}: malformed attribute")]
    BadAttribute { line: usize },

    #[error("line {line}: invalid base64 in bytes literal")]
    BadBytes { line: usize },

    #[error("line {line}: unexpected character '{found}'")]
    UnexpectedChar { found: char, line: usize },
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Text content, if this value is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer coercion: ints, integral text, and floats truncate.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean coercion: accepts `yes`/`no`, `true`/`false` and `1`/`0` text.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(n) => Some(*n != 0),
            Value::Text(s) => match s.trim() {
                "yes" | "true" | "1" => Some(true),
                "no" | "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// True when the value carries no content at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Render the value as display text regardless of its type.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => if *b { "yes" } else { "no" }.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD.encode(b)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Int(n as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

/// One node of a document tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    pub attributes: BTreeMap<String, Value>,
    pub children: Vec<(String, Node)>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw attribute lookup.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Attribute as text, empty string when absent or non-text.
    pub fn attr_str(&self, key: &str) -> &str {
        self.attributes
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Attribute rendered to text regardless of type, empty when absent.
    pub fn attr_text(&self, key: &str) -> String {
        self.attributes
            .get(key)
            .map(Value::to_text)
            .unwrap_or_default()
    }

    pub fn attr_int(&self, key: &str, default: i64) -> i64 {
        self.attributes
            .get(key)
            .and_then(Value::as_int)
            .unwrap_or(default)
    }

    pub fn attr_bool(&self, key: &str, default: bool) -> bool {
        self.attributes
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// Unix-epoch timestamp attribute; same coercion rules as integers.
    pub fn attr_timestamp(&self, key: &str, default: i64) -> i64 {
        self.attr_int(key, default)
    }

    /// True when the attribute is absent or carries no content.
    pub fn attr_empty(&self, key: &str) -> bool {
        self.attributes.get(key).map_or(true, Value::is_empty)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn remove_attr(&mut self, key: &str) {
        self.attributes.remove(key);
    }

    pub fn remove_attrs(&mut self, keys: &[&str]) {
        for key in keys {
            self.attributes.remove(*key);
        }
    }

    /// Copy the named attributes from another node, skipping absent ones.
    pub fn copy_attrs(&mut self, from: &Node, keys: &[&str]) {
        for key in keys {
            if let Some(v) = from.attr(key) {
                self.attributes.insert((*key).to_string(), v.clone());
            }
        }
    }

    /// First child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&Node> {
        self.children
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, n)| n)
    }

    pub fn child_mut(&mut self, tag: &str) -> Option<&mut Node> {
        self.children
            .iter_mut()
            .find(|(t, _)| t == tag)
            .map(|(_, n)| n)
    }

    /// All children with the given tag, in document order.
    pub fn children<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Node> {
        self.children
            .iter()
            .filter(move |(t, _)| t == tag)
            .map(|(_, n)| n)
    }

    pub fn has_child(&self, tag: &str) -> bool {
        self.children.iter().any(|(t, _)| t == tag)
    }

    /// Append an empty child and return a mutable reference to it.
    pub fn add_child(&mut self, tag: impl Into<String>) -> &mut Node {
        self.children.push((tag.into(), Node::new()));
        let (_, node) = self.children.last_mut().unwrap();
        node
    }

    pub fn push_child(&mut self, tag: impl Into<String>, node: Node) {
        self.children.push((tag.into(), node));
    }

    pub fn clear_children(&mut self, tag: &str) {
        self.children.retain(|(t, _)| t != tag);
    }

    /// Drop children with the given tag for which the predicate holds.
    pub fn remove_children<F>(&mut self, tag: &str, mut pred: F)
    where
        F: FnMut(&Node) -> bool,
    {
        self.children.retain(|(t, n)| t != tag || !pred(n));
    }

    /// Splice all attributes and children of another tree into this one.
    pub fn append(&mut self, other: Node) {
        self.attributes.extend(other.attributes);
        self.children.extend(other.children);
    }

    /// True when the node has neither attributes nor children.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }
}
