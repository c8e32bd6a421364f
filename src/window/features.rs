//! Window-open feature tokenizer
//!
//! Turns the free-form `features` argument of `window.open` into an ordered
//! map of lowercase names to lowercase values.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Ordered map of feature name to value.
///
/// Insertion order is preserved; setting an existing name updates its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureMap {
    entries: Vec<(String, String)>,
}

impl FeatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Remove `name`, returning its value if it was present
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FeatureMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FeatureMap::new();
        for (name, value) in iter {
            map.set(name, value);
        }
        map
    }
}

impl Serialize for FeatureMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

fn is_feature_separator(c: char) -> bool {
    c.is_ascii_whitespace() || c == '=' || c == ','
}

/// Legacy aliases for feature names
pub fn normalize_feature_name(name: &str) -> &str {
    match name {
        "screenx" => "left",
        "screeny" => "top",
        "innerwidth" => "width",
        "innerheight" => "height",
        other => other,
    }
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn is_eof(&self) -> bool {
        self.rest.is_empty()
    }

    fn skip_while(&mut self, pred: impl Fn(char) -> bool) {
        self.rest = self.rest.trim_start_matches(pred);
    }

    fn consume_until(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let end = self.rest.find(pred).unwrap_or(self.rest.len());
        let (taken, rest) = self.rest.split_at(end);
        self.rest = rest;
        taken
    }
}

/// Tokenize a window-open feature string
pub fn tokenize_features(features: &str) -> FeatureMap {
    let mut map = FeatureMap::new();
    let mut cursor = Cursor { rest: features };

    while !cursor.is_eof() {
        cursor.skip_while(is_feature_separator);

        let name = cursor.consume_until(is_feature_separator).to_ascii_lowercase();
        let name = normalize_feature_name(&name).to_string();

        // Whitespace and any run of '=' lead up to the value; ',' ends the
        // feature. "a==b" therefore yields a=b.
        cursor.skip_while(|c| c.is_ascii_whitespace());
        cursor.skip_while(|c| c.is_ascii_whitespace() || c == '=');

        let value = cursor.consume_until(is_feature_separator).to_ascii_lowercase();

        if !name.is_empty() {
            map.set(name, value);
        }
    }

    map
}
