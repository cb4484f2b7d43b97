//! Valve KeyValues trees and their binary and text encodings.

pub mod binary;
pub mod text;

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvValue {
    String(String),
    Int(i32),
    Node(KvNode),
}

impl KvValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KvValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            KvValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&KvNode> {
        match self {
            KvValue::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Textual form of a leaf. Nodes have none and render as an empty string.
    pub fn to_text(&self) -> String {
        match self {
            KvValue::String(value) => value.clone(),
            KvValue::Int(value) => value.to_string(),
            KvValue::Node(_) => String::new(),
        }
    }
}

impl fmt::Display for KvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KvValue::String(value) => f.write_str(value),
            KvValue::Int(value) => write!(f, "{value}"),
            KvValue::Node(node) => write!(f, "{{{} entries}}", node.len()),
        }
    }
}

impl From<&str> for KvValue {
    fn from(value: &str) -> Self {
        KvValue::String(value.to_string())
    }
}

impl From<String> for KvValue {
    fn from(value: String) -> Self {
        KvValue::String(value)
    }
}

impl From<i32> for KvValue {
    fn from(value: i32) -> Self {
        KvValue::Int(value)
    }
}

impl From<KvNode> for KvValue {
    fn from(value: KvNode) -> Self {
        KvValue::Node(value)
    }
}

/// Ordered key/value mapping. Keys compare ordinally; re-inserting a key
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvNode {
    entries: Vec<(String, KvValue)>,
}

impl KvNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the "array" shape: children keyed `"0"`, `"1"`, ...
    pub fn from_array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = KvNode>,
    {
        let mut node = KvNode::new();
        for (index, item) in items.into_iter().enumerate() {
            node.entries.push((index.to_string(), KvValue::Node(item)));
        }
        node
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<KvValue>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<KvValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<KvValue> {
        let index = self.entries.iter().position(|(existing, _)| existing == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, key: &str) -> Option<&KvValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    /// Lookup for data written by tools that disagree on key casing.
    pub fn get_ignore_case(&self, key: &str) -> Option<&KvValue> {
        self.get(key).or_else(|| {
            self.entries
                .iter()
                .find(|(existing, _)| existing.eq_ignore_ascii_case(key))
                .map(|(_, value)| value)
        })
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(KvValue::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(KvValue::as_int)
    }

    pub fn get_node(&self, key: &str) -> Option<&KvNode> {
        self.get(key).and_then(KvValue::as_node)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KvValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Child nodes in insertion order, skipping leaves. Numbered keys are
    /// not required to be contiguous.
    pub fn array_items(&self) -> impl Iterator<Item = &KvNode> {
        self.entries.iter().filter_map(|(_, value)| value.as_node())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for KvNode
where
    K: Into<String>,
    V: Into<KvValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut node = KvNode::new();
        for (key, value) in iter {
            node.insert(key, value);
        }
        node
    }
}

impl<'a> IntoIterator for &'a KvNode {
    type Item = (&'a str, &'a KvValue);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a KvValue)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_overwrites_in_place() {
        let mut node = KvNode::new();
        node.insert("a", "1");
        node.insert("b", 2);
        node.insert("a", "3");
        let keys: Vec<&str> = node.keys().collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(node.get_str("a"), Some("3"));
        assert_eq!(node.get_int("b"), Some(2));
    }

    #[test]
    fn keys_are_case_sensitive() {
        let node = KvNode::new().with("AppName", "x").with("appname", "y");
        assert_eq!(node.len(), 2);
        assert_eq!(node.get_str("AppName"), Some("x"));
        assert_eq!(node.get_str("appname"), Some("y"));
        assert_eq!(node.get("APPNAME"), None);
    }

    #[test]
    fn ignore_case_prefers_exact_match() {
        let node = KvNode::new().with("exe", "lower").with("Exe", "exact");
        assert_eq!(node.get_ignore_case("Exe").and_then(KvValue::as_str), Some("exact"));
        assert_eq!(node.get_ignore_case("EXE").and_then(KvValue::as_str), Some("lower"));
    }

    #[test]
    fn array_helpers_number_children() {
        let array = KvNode::from_array([
            KvNode::new().with("name", "first"),
            KvNode::new().with("name", "second"),
        ]);
        assert_eq!(array.keys().collect::<Vec<_>>(), ["0", "1"]);
        let names: Vec<&str> = array
            .array_items()
            .filter_map(|item| item.get_str("name"))
            .collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn remove_returns_value() {
        let mut node: KvNode = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(node.remove("a"), Some(KvValue::from("1")));
        assert_eq!(node.remove("a"), None);
        assert_eq!(node.len(), 1);
    }
}
