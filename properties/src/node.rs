//! Per-kind storage cells
//!
//! Most kinds only ever hold a single parameterless value, so a node starts
//! out storing that value inline. The first parameterized id of the kind
//! promotes the node to an ordered map keyed by full [`PropertyId`]. Promotion
//! is one-way: a promoted node stays promoted for the rest of its life, even
//! if its map later becomes empty.

use crate::id::PropertyId;
use crate::kind::PropertyKind;
use crate::value::PropertyValue;
use std::collections::BTreeMap;

/// Result of a combined lookup-and-write
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SetOutcome {
    /// Value stored under the id before the write
    pub old: Option<PropertyValue>,
    /// True if the id had no value before the write
    pub was_added: bool,
    /// True if the id was added or its raw bits changed
    pub has_changed: bool,
}

impl SetOutcome {
    fn added() -> Self {
        Self {
            old: None,
            was_added: true,
            has_changed: true,
        }
    }

    fn replaced(old: PropertyValue, new: PropertyValue) -> Self {
        Self {
            old: Some(old),
            was_added: false,
            has_changed: old != new,
        }
    }
}

/// Storage for every value of a single kind
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyNode {
    /// Single value of the kind's parameterless id
    Inline(PropertyValue),
    /// Every id of the kind, in id order
    Promoted(BTreeMap<PropertyId, PropertyValue>),
}

impl PropertyNode {
    /// Creates the node for the first value of a kind
    pub(crate) fn new(id: PropertyId, value: PropertyValue) -> Self {
        if id.has_params() {
            Self::Promoted(BTreeMap::from([(id, value)]))
        } else {
            Self::Inline(value)
        }
    }

    /// Number of values held
    pub fn len(&self) -> usize {
        match self {
            Self::Inline(_) => 1,
            Self::Promoted(map) => map.len(),
        }
    }

    /// Only a promoted node whose entries were all removed is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_promoted(&self) -> bool {
        matches!(self, Self::Promoted(_))
    }

    pub(crate) fn get(&self, id: &PropertyId) -> Option<PropertyValue> {
        match self {
            Self::Inline(value) if !id.has_params() => Some(*value),
            Self::Inline(_) => None,
            Self::Promoted(map) => map.get(id).copied(),
        }
    }

    /// Writes a value, promoting an inline node if `id` is parameterized
    pub(crate) fn upsert(&mut self, id: PropertyId, value: PropertyValue) -> SetOutcome {
        match self {
            Self::Inline(existing) if !id.has_params() => {
                let old = std::mem::replace(existing, value);
                SetOutcome::replaced(old, value)
            }
            Self::Inline(existing) => {
                let implicit = PropertyId::new(id.kind());
                let existing = *existing;
                *self = Self::Promoted(BTreeMap::from([(implicit, existing), (id, value)]));
                SetOutcome::added()
            }
            Self::Promoted(map) => match map.insert(id, value) {
                Some(old) => SetOutcome::replaced(old, value),
                None => SetOutcome::added(),
            },
        }
    }

    /// Iterates the node's `(id, value)` pairs in id order
    pub fn iter(&self, kind: PropertyKind) -> impl Iterator<Item = (PropertyId, PropertyValue)> + '_ {
        let inline = match self {
            Self::Inline(value) => Some((PropertyId::new(kind), *value)),
            Self::Promoted(_) => None,
        };
        let promoted = match self {
            Self::Promoted(map) => Some(map.iter().map(|(id, value)| (*id, *value))),
            Self::Inline(_) => None,
        };

        inline.into_iter().chain(promoted.into_iter().flatten())
    }
}
