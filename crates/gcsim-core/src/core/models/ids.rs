use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a B-cell lineage member.
///
/// Mutated copies keep the identifier of the cell they were derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub u64);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AntigenId(pub u32);

/// Label of a capsular serotype (e.g. "6B", "23F").
///
/// Serotypes order lexicographically, which gives every per-serotype map in the
/// simulation a reproducible iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Serotype(String);

impl Serotype {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Serotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Serotype {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for Serotype {
    fn from(label: String) -> Self {
        Self(label)
    }
}
