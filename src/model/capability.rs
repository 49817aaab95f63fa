//! Capability tags and the applied-capability bitset
//!
//! Every enricher produces exactly one capability. A photo records which
//! capabilities have already been applied as a fixed-size bitset so the
//! "already applied" check stays O(1).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The kind of fact an enricher attaches to a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Metadata,
    Thumbnail,
    Preview,
    Analyze,
    Duplicate,
    Face,
    Tag,
    Category,
    Caption,
    Color,
    Adult,
    ObjectProperty,
    Nsfw,
}

impl Capability {
    /// All capabilities in bit order.
    pub const ALL: [Capability; 13] = [
        Capability::Metadata,
        Capability::Thumbnail,
        Capability::Preview,
        Capability::Analyze,
        Capability::Duplicate,
        Capability::Face,
        Capability::Tag,
        Capability::Category,
        Capability::Caption,
        Capability::Color,
        Capability::Adult,
        Capability::ObjectProperty,
        Capability::Nsfw,
    ];

    /// The single bit this capability occupies in a [`CapabilitySet`].
    pub const fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// Canonical snake_case name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Thumbnail => "thumbnail",
            Self::Preview => "preview",
            Self::Analyze => "analyze",
            Self::Duplicate => "duplicate",
            Self::Face => "face",
            Self::Tag => "tag",
            Self::Category => "category",
            Self::Caption => "caption",
            Self::Color => "color",
            Self::Adult => "adult",
            Self::ObjectProperty => "object_property",
            Self::Nsfw => "nsfw",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a capability name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown capability: '{0}'")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    /// Case-insensitive; `-` and `_` are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == normalized)
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

/// A set of capabilities backed by a `u32` bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u32);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build a set from a raw bitmask (bits outside the known range are dropped).
    pub fn from_bits(bits: u32) -> Self {
        let known = Capability::ALL.iter().fold(0, |acc, c| acc | c.bit());
        Self(bits & known)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// True if every capability in `other` is also in `self`.
    pub fn contains_all(self, other: CapabilitySet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub fn remove(&mut self, capability: Capability) {
        self.0 &= !capability.bit();
    }

    pub fn union(self, other: CapabilitySet) -> Self {
        Self(self.0 | other.0)
    }

    pub fn intersection(self, other: CapabilitySet) -> Self {
        Self(self.0 & other.0)
    }

    pub fn difference(self, other: CapabilitySet) -> Self {
        Self(self.0 & !other.0)
    }

    /// Iterate capabilities in bit order.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }

    /// Parse a list of names, failing on the first unknown one.
    pub fn parse_names<I, S>(names: I) -> Result<Self, UnknownCapability>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|n| n.as_ref().parse::<Capability>())
            .collect()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        let mut set = Self::empty();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl From<Capability> for CapabilitySet {
    fn from(capability: Capability) -> Self {
        Self(capability.bit())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.iter().map(Capability::name).collect();
        f.write_str(&names.join(" | "))
    }
}

impl Serialize for CapabilitySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for CapabilitySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<Capability>::deserialize(deserializer)?;
        Ok(names.into_iter().collect())
    }
}
