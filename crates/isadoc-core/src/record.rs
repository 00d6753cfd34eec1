// ABOUTME: Defines InstructionRecord, the immutable description of one ISA instruction.
// ABOUTME: Holds identity, encoding, access rules and prose, plus the ordered AccessMap.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors raised when a record does not have the shape the emitter requires.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("instruction record '{0}' has no description entries")]
    NoDescriptions(String),
}

/// One entry of the instruction's `description` sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionEntry {
    pub id: String,
    pub normative: bool,
    /// Prose that may contain the two-character `\n` escape marker.
    pub text: String,
}

impl DescriptionEntry {
    pub fn new(id: impl Into<String>, normative: bool, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            normative,
            text: text.into(),
        }
    }
}

/// A named operand field inside the instruction encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingVariable {
    pub name: String,
    /// Bit range, e.g. `19-15`.
    pub location: String,
}

impl EncodingVariable {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }
}

/// The `encoding` block: a fixed-width match pattern plus its operand fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encoding {
    /// Bit pattern string; `-` marks a don't-care bit.
    #[serde(rename = "match")]
    pub match_pattern: String,
    #[serde(default)]
    pub variables: Vec<EncodingVariable>,
}

/// Privilege-mode to access-string mapping that keeps caller insertion order.
///
/// Nothing is sorted, synthesized or deduplicated; the emitter writes the
/// entries exactly as they were pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessMap {
    entries: Vec<(String, String)>,
}

impl AccessMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mode. A repeated mode name is kept as a second entry.
    pub fn push(&mut self, mode: impl Into<String>, access: impl Into<String>) {
        self.entries.push((mode.into(), access.into()));
    }

    /// Look up the first entry for `mode`.
    pub fn get(&self, mode: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(m, _)| m == mode)
            .map(|(_, a)| a.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(m, a)| (m.as_str(), a.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AccessMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = AccessMap::new();
        for (mode, access) in iter {
            map.push(mode, access);
        }
        map
    }
}

impl Serialize for AccessMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (mode, access) in &self.entries {
            map.serialize_entry(mode, access)?;
        }
        map.end()
    }
}

struct AccessMapVisitor;

impl<'de> Visitor<'de> for AccessMapVisitor {
    type Value = AccessMap;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a mapping from privilege mode to access string")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<AccessMap, A::Error> {
        let mut map = AccessMap::new();
        while let Some((mode, value)) = access.next_entry::<String, String>()? {
            map.push(mode, value);
        }
        Ok(map)
    }
}

impl<'de> Deserialize<'de> for AccessMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AccessMapVisitor)
    }
}

/// Everything the emitter needs to write one instruction document.
///
/// Built once by a loader, handed to the emitter by reference, then dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionRecord {
    pub schema: String,
    pub kind: String,
    pub name: String,
    pub long_name: String,
    pub descriptions: Vec<DescriptionEntry>,
    pub defined_by: String,
    pub assembly: String,
    pub encoding: Encoding,
    pub access: AccessMap,
    pub data_independent_timing: bool,
    /// Pseudocode; may be empty. Uses the same `\n` escape marker as descriptions.
    pub operation: String,
}

impl InstructionRecord {
    /// Check the one structural rule the output schema depends on:
    /// at least one description entry.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.descriptions.is_empty() {
            return Err(RecordError::NoDescriptions(self.name.clone()));
        }
        Ok(())
    }
}
