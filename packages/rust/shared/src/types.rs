//! Core domain types for opws builds.

use std::collections::HashSet;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::{BuildError, Result};

/// Bundle key holding the build timestamp in the global bundle.
pub const BUILD_TIMESTAMP_KEY: &str = "BUILD_TIMESTAMP";

/// Path segment appended to the dataset tag for every build.
pub const LATEST_SEGMENT: &str = "latest";

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A parsed document, restricted to the JSON value model.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<Value>),
    Map(Map),
}

impl Value {
    /// Borrow the map if this value is one.
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => map.serialize(serializer),
        }
    }
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

/// An insertion-ordered string map whose keys are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Map {
    entries: Vec<(String, Value)>,
    keys: HashSet<String>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Returns the rejected key if it is already present.
    pub fn try_insert(&mut self, key: String, value: Value) -> std::result::Result<(), String> {
        if !self.keys.insert(key.clone()) {
            return Err(key);
        }
        self.entries.push((key, value));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Map {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            out.serialize_entry(key, value)?;
        }
        out.end()
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// An aggregate of member values, keyed by member name.
///
/// Members keep the order they were inserted in; aggregators insert them sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    name: String,
    members: Map,
}

impl Bundle {
    /// Create an empty bundle. `name` is used in diagnostics only.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Map::new(),
        }
    }

    /// Add a member, failing if the name is already taken.
    pub fn insert(&mut self, member: impl Into<String>, value: Value) -> Result<()> {
        self.members
            .try_insert(member.into(), value)
            .map_err(|name| BuildError::DuplicateMember {
                bundle: self.name.clone(),
                name,
            })
    }

    pub fn get(&self, member: &str) -> Option<&Value> {
        self.members.get(member)
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.keys()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Consume the bundle, yielding it as a map value for the enclosing level.
    pub fn into_value(self) -> Value {
        Value::Map(self.members)
    }
}

impl Serialize for Bundle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.members.serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// BuildVersion
// ---------------------------------------------------------------------------

/// The `<tag>/latest` namespace every artifact of one build lives under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildVersion {
    tag: String,
    segment: String,
}

impl BuildVersion {
    pub fn from_tag(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let segment = format!("{tag}/{LATEST_SEGMENT}");
        Self { tag, segment }
    }

    /// The dataset version tag, e.g. `v0.1`.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn as_str(&self) -> &str {
        &self.segment
    }

    /// Absolute path of an artifact as published, e.g. `/v0.1/latest/profiles/a.jsonp`.
    pub fn virtual_path(&self, relative: &str) -> String {
        format!("/{}/{}", self.segment, relative)
    }
}

impl std::fmt::Display for BuildVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segment)
    }
}

// ---------------------------------------------------------------------------
// Representations
// ---------------------------------------------------------------------------

/// One published form of an item or bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    /// The input bytes, unchanged.
    Raw,
    /// Canonical compact JSON.
    Json,
    /// JSON wrapped in the JSONP callback envelope.
    Jsonp,
}

impl Representation {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Raw => "yaml",
            Self::Json => "json",
            Self::Jsonp => "jsonp",
        }
    }
}

/// Which representations are emitted at which level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputToggles {
    pub json_slices: bool,
    pub jsonp_slices: bool,
    pub raw_slices: bool,
    pub json_bundles: bool,
    pub jsonp_bundles: bool,
}

impl OutputToggles {
    /// Everything on.
    pub fn all() -> Self {
        Self {
            json_slices: true,
            jsonp_slices: true,
            raw_slices: true,
            json_bundles: true,
            jsonp_bundles: true,
        }
    }

    /// Whether documents have to be parsed at all.
    pub fn needs_parse(&self) -> bool {
        self.json_slices || self.jsonp_slices || self.json_bundles || self.jsonp_bundles
    }
}

impl Default for OutputToggles {
    fn default() -> Self {
        Self::all()
    }
}
