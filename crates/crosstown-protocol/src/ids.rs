use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Data IDs are strings used in YAML files (human-readable, stable across versions)
pub type DataId = String;

/// Runtime IDs are integers compiled at board-load (fast, deterministic)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeId<T> {
    pub raw: u16,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> RuntimeId<T> {
    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.raw as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonopolyTag;

pub type MonopolyId = RuntimeId<MonopolyTag>;

/// Player ID is a simple index (max 8 players)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u8);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Cell on the board: 0..=39 is the ring, 40..=56 the spokes (44 is the start/center).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldIndex(pub u8);

impl FieldIndex {
    pub const START: FieldIndex = FieldIndex(44);
    pub const COUNT: usize = 57;
    pub const RING_LEN: u8 = 40;

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        (self.0 as usize) < Self::COUNT
    }

    #[inline]
    pub const fn is_ring(self) -> bool {
        self.0 < Self::RING_LEN
    }

    /// Cells 40..=56, center included.
    #[inline]
    pub const fn is_spoke(self) -> bool {
        self.0 >= Self::RING_LEN && (self.0 as usize) < Self::COUNT
    }
}

impl fmt::Display for FieldIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Currency amount in cents.
pub type Money = i64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_index_ranges() {
        assert!(FieldIndex(0).is_ring());
        assert!(FieldIndex(39).is_ring());
        assert!(!FieldIndex(40).is_ring());
        assert!(FieldIndex(40).is_spoke());
        assert!(FieldIndex::START.is_spoke());
        assert!(FieldIndex(56).is_spoke());
        assert!(!FieldIndex(57).is_valid());
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&(PlayerId(3), FieldIndex(44), MonopolyId::new(7))).unwrap();
        assert_eq!(json, "[3,44,7]");
    }
}
