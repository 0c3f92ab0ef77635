//! Filtered traversal of a [`PropertyStore`]
//!
//! The iterator walks kinds in the store's hash order, and inside a promoted
//! node walks ids in ascending order. It borrows the store, so the store
//! cannot be mutated while a traversal is in flight.
//!
//! Kind and prefix filters look their node up directly instead of scanning.
//! Prefix filters start an ordered range scan at the prefix id itself (the
//! smallest id sharing that prefix) and stop at the first id that no longer
//! matches, since matching ids are contiguous in id order.

use crate::id::PropertyId;
use crate::kind::PropertyKind;
use crate::node::PropertyNode;
use crate::store::PropertyStore;
use crate::value::PropertyValue;
use std::collections::{btree_map, hash_map};
use std::iter::FusedIterator;

/// Selects which pairs a [`RangeIterator`] yields
#[derive(Clone, Copy)]
pub enum RangeFilter<'a> {
    All,
    Kind(PropertyKind),
    /// Ids of the prefix's kind starting with all of its parameters
    Prefix(PropertyId),
    Kinds(&'a [PropertyKind]),
    Predicate(&'a dyn Fn(PropertyKind) -> bool),
}

impl RangeFilter<'_> {
    fn admits(&self, kind: PropertyKind) -> bool {
        match self {
            Self::All => true,
            Self::Kind(filter) => *filter == kind,
            Self::Prefix(prefix) => prefix.kind() == kind,
            Self::Kinds(kinds) => kinds.contains(&kind),
            Self::Predicate(predicate) => predicate(kind),
        }
    }

    /// True if parameterless ids are excluded
    fn requires_params(&self) -> bool {
        matches!(self, Self::Prefix(prefix) if prefix.has_params())
    }

    fn prefix(&self) -> Option<&PropertyId> {
        match self {
            Self::Prefix(prefix) => Some(prefix),
            _ => None,
        }
    }
}

enum Cursor<'a> {
    Scan(hash_map::Iter<'a, PropertyKind, PropertyNode>),
    Single(Option<(&'a PropertyKind, &'a PropertyNode)>),
}

/// Lazy, restartable `(PropertyId, PropertyValue)` sequence over one store
pub struct RangeIterator<'a> {
    store: &'a PropertyStore,
    filter: RangeFilter<'a>,
    cursor: Cursor<'a>,
    inner: Option<btree_map::Range<'a, PropertyId, PropertyValue>>,
}

impl<'a> RangeIterator<'a> {
    pub fn new(store: &'a PropertyStore, filter: RangeFilter<'a>) -> Self {
        Self {
            store,
            cursor: Self::start(store, &filter),
            filter,
            inner: None,
        }
    }

    /// Rewinds to the first pair, keeping the filter
    pub fn reset(&mut self) {
        self.cursor = Self::start(self.store, &self.filter);
        self.inner = None;
    }

    pub fn filter(&self) -> &RangeFilter<'a> {
        &self.filter
    }

    fn start(store: &'a PropertyStore, filter: &RangeFilter<'a>) -> Cursor<'a> {
        match filter {
            RangeFilter::Kind(kind) => Cursor::Single(store.nodes().get_key_value(kind)),
            RangeFilter::Prefix(prefix) => {
                Cursor::Single(store.nodes().get_key_value(&prefix.kind()))
            }
            _ => Cursor::Scan(store.nodes().iter()),
        }
    }

    fn next_node(&mut self) -> Option<(PropertyKind, &'a PropertyNode)> {
        let filter = &self.filter;
        let (kind, node) = match &mut self.cursor {
            Cursor::Single(slot) => slot.take()?,
            Cursor::Scan(nodes) => nodes.find(|(kind, _)| filter.admits(**kind))?,
        };
        Some((*kind, node))
    }
}

impl Iterator for RangeIterator<'_> {
    type Item = (PropertyId, PropertyValue);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(inner) = &mut self.inner {
                if let Some((id, value)) = inner.next() {
                    match self.filter.prefix() {
                        Some(prefix) if !id.matches_prefix(prefix) => self.inner = None,
                        _ => return Some((*id, *value)),
                    }
                    continue;
                }
                self.inner = None;
            }

            let (kind, node) = self.next_node()?;
            match node {
                PropertyNode::Inline(value) => {
                    if !self.filter.requires_params() {
                        return Some((PropertyId::new(kind), *value));
                    }
                }
                PropertyNode::Promoted(map) => {
                    self.inner = Some(match self.filter.prefix() {
                        Some(prefix) => map.range(*prefix..),
                        None => map.range(..),
                    });
                }
            }
        }
    }
}

impl FusedIterator for RangeIterator<'_> {}
