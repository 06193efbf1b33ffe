// src/models/attr_map.rs

//! Ordered multimap of resolved attribute values.

use serde::Serialize;

/// Values of one attribute plus its merge policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttrValues {
    pub values: Vec<String>,
    /// Replace existing values on merge instead of appending
    pub replace: bool,
}

impl AttrValues {
    pub fn new(values: Vec<String>, replace: bool) -> Self {
        Self { values, replace }
    }
}

/// Attribute name to values, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttrValueMap {
    entries: Vec<(String, AttrValues)>,
}

impl AttrValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map with a single attribute.
    pub fn single(name: &str, values: Vec<String>, replace: bool) -> Self {
        let mut map = Self::new();
        map.add(name, values, replace);
        map
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == name)
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.position(name)
            .map(|i| self.entries[i].1.values.as_slice())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, v)| (key.as_str(), v.values.as_slice()))
    }

    /// Add values under `name`; replaces when `replace` is set or the key is new.
    pub fn add(&mut self, name: &str, values: Vec<String>, replace: bool) {
        match self.position(name) {
            Some(i) if !replace => self.entries[i].1.values.extend(values),
            Some(i) => self.entries[i].1 = AttrValues::new(values, replace),
            None => self
                .entries
                .push((name.to_string(), AttrValues::new(values, replace))),
        }
    }

    /// Merge another map: appends, unless the incoming entry asks for replacement.
    pub fn merge(&mut self, other: AttrValueMap) {
        for (name, incoming) in other.entries {
            match self.position(&name) {
                Some(i) if incoming.replace => self.entries[i].1 = incoming,
                Some(i) => self.entries[i].1.values.extend(incoming.values),
                None => self.entries.push((name, incoming)),
            }
        }
    }

    /// Deduplicate the values of `name`, first occurrence wins.
    pub fn dedup(&mut self, name: &str) {
        if let Some(i) = self.position(name) {
            let mut seen = std::collections::HashSet::new();
            self.entries[i]
                .1
                .values
                .retain(|value| seen.insert(value.clone()));
        }
    }
}
