//! P/T 网静态结构元素：库所、迁移与标识.
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::net::ids::PlaceId;
use crate::net::index_vec::IndexVec;
use crate::util::open_table::KeyHasher;

pub type Weight = u64;

/// 迁移的前集/后集：库所下标序列，允许重复（多条弧连接同一库所）.
pub type PlaceList = SmallVec<[PlaceId; 4]>;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct Place {
    pub name: String,
    #[serde(default)]
    pub tokens: Weight,
}

impl Place {
    pub fn new(name: impl Into<String>, tokens: Weight) -> Self {
        Self {
            name: name.into(),
            tokens,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Transition {
    /// 标签，不要求唯一.
    pub name: String,
    #[serde(default)]
    pub preset: PlaceList,
    #[serde(default)]
    pub postset: PlaceList,
}

impl Transition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            preset: PlaceList::new(),
            postset: PlaceList::new(),
        }
    }

    pub fn with_arcs(
        name: impl Into<String>,
        preset: impl IntoIterator<Item = PlaceId>,
        postset: impl IntoIterator<Item = PlaceId>,
    ) -> Self {
        Self {
            name: name.into(),
            preset: preset.into_iter().collect(),
            postset: postset.into_iter().collect(),
        }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("name", &self.name)
            .field("preset", &self.preset)
            .field("postset", &self.postset)
            .finish()
    }
}

/// 标识：每个库所的 token 数，按库所下标排列.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Marking(pub IndexVec<PlaceId, Weight>);

impl Marking {
    pub fn new(initial: IndexVec<PlaceId, Weight>) -> Self {
        Self(initial)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, &Weight)> {
        self.0.iter_enumerated()
    }

    pub fn get(&self, place: PlaceId) -> Option<Weight> {
        self.0.get(place).copied()
    }

    pub fn tokens(&self, place: PlaceId) -> Weight {
        self.0[place]
    }

    pub fn tokens_mut(&mut self, place: PlaceId) -> &mut Weight {
        &mut self.0[place]
    }

    pub fn into_inner(self) -> IndexVec<PlaceId, Weight> {
        self.0
    }
}

impl From<Vec<Weight>> for Marking {
    fn from(tokens: Vec<Weight>) -> Self {
        Self(IndexVec::from(tokens))
    }
}

impl Hash for Marking {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for value in self.0.iter() {
            value.hash(state);
        }
    }
}

impl fmt::Debug for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// Marking hash and equality for [`crate::util::OpenTable`].
///
/// Jenkins one-at-a-time over the marking length followed by every token
/// count in place order, each as eight little-endian bytes. Equal markings
/// hash identically; permuting token counts across places changes the hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkingKeys;

impl MarkingKeys {
    fn mix(mut hash: u64, word: u64) -> u64 {
        for byte in word.to_le_bytes() {
            hash = hash.wrapping_add(u64::from(byte));
            hash = hash.wrapping_add(hash << 10);
            hash ^= hash >> 6;
        }
        hash
    }
}

impl KeyHasher<Marking> for MarkingKeys {
    fn hash_key(&self, key: &Marking) -> u64 {
        let mut hash = Self::mix(0, key.len() as u64);
        for tokens in key.0.iter() {
            hash = Self::mix(hash, *tokens);
        }
        hash = hash.wrapping_add(hash << 3);
        hash ^= hash >> 11;
        hash.wrapping_add(hash << 15)
    }

    fn eq_keys(&self, left: &Marking, right: &Marking) -> bool {
        left.0.as_slice() == right.0.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marking_copy_is_independent() {
        let original = Marking::from(vec![1, 0, 2]);
        let mut copy = original.clone();
        assert_eq!(copy, original);

        *copy.tokens_mut(PlaceId::new(0)) = 5;
        assert_eq!(original.tokens(PlaceId::new(0)), 1);
        assert_ne!(copy, original);
    }

    #[test]
    fn marking_hash_is_consistent_with_equality() {
        let keys = MarkingKeys;
        let a = Marking::from(vec![3, 0, 1]);
        let b = Marking::from(vec![3, 0, 1]);
        assert!(keys.eq_keys(&a, &b));
        assert_eq!(keys.hash_key(&a), keys.hash_key(&b));
    }

    #[test]
    fn marking_hash_is_order_and_length_sensitive() {
        let keys = MarkingKeys;
        let a = Marking::from(vec![1, 0]);
        let swapped = Marking::from(vec![0, 1]);
        let longer = Marking::from(vec![1, 0, 0]);

        assert!(!keys.eq_keys(&a, &swapped));
        assert_ne!(keys.hash_key(&a), keys.hash_key(&swapped));
        assert!(!keys.eq_keys(&a, &longer));
        assert_ne!(keys.hash_key(&a), keys.hash_key(&longer));
    }

    #[test]
    fn transition_deserializes_from_plain_place_indices() {
        let json = r#"{"name":"t","preset":[0,0,2],"postset":[1]}"#;
        let transition: Transition = serde_json::from_str(json).unwrap();
        assert_eq!(transition.name, "t");
        assert_eq!(
            transition.preset.as_slice(),
            &[PlaceId::new(0), PlaceId::new(0), PlaceId::new(2)]
        );
        assert_eq!(transition.postset.as_slice(), &[PlaceId::new(1)]);
    }
}
