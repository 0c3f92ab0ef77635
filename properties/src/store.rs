//! The property store
//!
//! Maps each [`PropertyKind`] to a [`PropertyNode`] and keeps a running count
//! of stored values, so `len()` never walks the nodes. A store is owned by a
//! single entity (or prototype, or overlay) and is not synchronized; callers
//! that share one across threads lock around the owner.
//!
//! Every operation is total. A missing id is reported as `None`, never as an
//! error, because game code routinely queries properties an entity may not
//! have.

use crate::id::PropertyId;
use crate::iter::{RangeFilter, RangeIterator};
use crate::kind::{PropertyKind, PropertyRegistry};
use crate::node::{PropertyNode, SetOutcome};
use crate::value::PropertyValue;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

/// Sparse, compound-keyed attribute container
#[derive(Clone, Default)]
pub struct PropertyStore {
    nodes: HashMap<PropertyKind, PropertyNode>,
    count: usize,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            count: 0,
        }
    }

    /// Creates a store holding `base` with every pair of `overlay` applied on top
    ///
    /// Used to build an entity's properties from its prototype defaults plus
    /// per-instance overrides.
    pub fn flattened(base: &PropertyStore, overlay: &PropertyStore) -> Self {
        let mut store = base.clone();
        store.flatten(overlay);
        store
    }

    /// Number of stored values across all kinds
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, id: PropertyId) -> Option<PropertyValue> {
        self.nodes.get(&id.kind())?.get(&id)
    }

    pub fn contains(&self, id: PropertyId) -> bool {
        self.get(id).is_some()
    }

    /// Writes a value and reports whether the store changed
    ///
    /// Returns true if the id was newly added or its raw bits changed.
    pub fn set(&mut self, id: PropertyId, value: PropertyValue) -> bool {
        self.get_set(id, value).has_changed
    }

    /// Writes a value and returns what was there before, in one lookup
    pub fn get_set(&mut self, id: PropertyId, value: PropertyValue) -> SetOutcome {
        let outcome = match self.nodes.entry(id.kind()) {
            Entry::Vacant(entry) => {
                entry.insert(PropertyNode::new(id, value));
                SetOutcome {
                    old: None,
                    was_added: true,
                    has_changed: true,
                }
            }
            Entry::Occupied(mut entry) => entry.get_mut().upsert(id, value),
        };

        if outcome.was_added {
            self.count += 1;
        }

        outcome
    }

    /// Removes a value, returning it if it was present
    ///
    /// Removing the parameterless value of an inline node drops the node.
    /// A promoted node keeps existing (and stays promoted) even when its last
    /// entry is removed.
    pub fn remove(&mut self, id: PropertyId) -> Option<PropertyValue> {
        let node = self.nodes.get_mut(&id.kind())?;

        let removed = match node {
            PropertyNode::Inline(value) => {
                if id.has_params() {
                    return None;
                }
                let value = *value;
                self.nodes.remove(&id.kind());
                Some(value)
            }
            PropertyNode::Promoted(map) => map.remove(&id),
        };

        if removed.is_some() {
            self.count -= 1;
        }

        removed
    }

    /// Drops every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.count = 0;
    }

    /// Storage cell of a kind, if the kind was ever written
    pub fn node(&self, kind: PropertyKind) -> Option<&PropertyNode> {
        self.nodes.get(&kind)
    }

    /// Number of values stored under a kind
    pub fn kind_len(&self, kind: PropertyKind) -> usize {
        self.nodes.get(&kind).map_or(0, PropertyNode::len)
    }

    /// Kinds that currently own a node, in no particular order
    pub fn kinds(&self) -> impl Iterator<Item = PropertyKind> + '_ {
        self.nodes.keys().copied()
    }

    /// Applies every pair of `overlay` on top of this store
    pub fn flatten(&mut self, overlay: &PropertyStore) {
        for (id, value) in overlay.iter() {
            self.set(id, value);
        }
    }

    pub(crate) fn nodes(&self) -> &HashMap<PropertyKind, PropertyNode> {
        &self.nodes
    }

    /// Iterates every `(id, value)` pair
    pub fn iter(&self) -> RangeIterator<'_> {
        RangeIterator::new(self, RangeFilter::All)
    }

    /// Iterates the values of a single kind in id order
    pub fn iter_kind(&self, kind: PropertyKind) -> RangeIterator<'_> {
        RangeIterator::new(self, RangeFilter::Kind(kind))
    }

    /// Iterates ids of `prefix`'s kind that start with all of its parameters
    pub fn iter_prefix(&self, prefix: PropertyId) -> RangeIterator<'_> {
        RangeIterator::new(self, RangeFilter::Prefix(prefix))
    }

    /// Iterates the values of the listed kinds
    pub fn iter_kinds<'a>(&'a self, kinds: &'a [PropertyKind]) -> RangeIterator<'a> {
        RangeIterator::new(self, RangeFilter::Kinds(kinds))
    }

    /// Iterates the values of every kind accepted by `predicate`
    pub fn iter_filtered<'a>(
        &'a self,
        predicate: &'a dyn Fn(PropertyKind) -> bool,
    ) -> RangeIterator<'a> {
        RangeIterator::new(self, RangeFilter::Predicate(predicate))
    }

    /// Pairs sorted by id, independent of hash order
    pub fn sorted_pairs(&self) -> Vec<(PropertyId, PropertyValue)> {
        let mut pairs: Vec<_> = self.iter().collect();
        pairs.sort_unstable_by_key(|(id, _)| *id);
        pairs
    }

    /// Human-readable rendering using registry names and data types
    pub fn display<'a>(&'a self, registry: &'a dyn PropertyRegistry) -> StoreDisplay<'a> {
        StoreDisplay {
            store: self,
            registry,
        }
    }
}

impl PartialEq for PropertyStore {
    /// Stores are equal when they hold the same pairs, regardless of node
    /// layout.
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count && self.iter().all(|(id, value)| other.get(id) == Some(value))
    }
}

impl Eq for PropertyStore {}

impl fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.sorted_pairs()).finish()
    }
}

impl FromIterator<(PropertyId, PropertyValue)> for PropertyStore {
    fn from_iter<I: IntoIterator<Item = (PropertyId, PropertyValue)>>(iter: I) -> Self {
        let mut store = PropertyStore::new();
        store.extend(iter);
        store
    }
}

impl Extend<(PropertyId, PropertyValue)> for PropertyStore {
    fn extend<I: IntoIterator<Item = (PropertyId, PropertyValue)>>(&mut self, iter: I) {
        for (id, value) in iter {
            self.set(id, value);
        }
    }
}

/// See [`PropertyStore::display`]
pub struct StoreDisplay<'a> {
    store: &'a PropertyStore,
    registry: &'a dyn PropertyRegistry,
}

impl fmt::Display for StoreDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, value) in self.store.sorted_pairs() {
            match self.registry.info(id.kind()) {
                Some(info) => {
                    write!(f, "{}", info.name)?;
                    if id.has_params() {
                        write!(f, "{:?}", id.params())?;
                    }
                    writeln!(f, " = {}", info.format_value(value))?;
                }
                None => writeln!(f, "{} = {:?}", id, value)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{PropertyDataType, PropertyInfo, PropertyInfoTable};

    const HEALTH: PropertyKind = PropertyKind(1);
    const LEVEL: PropertyKind = PropertyKind(2);
    const BONUS: PropertyKind = PropertyKind(3);

    fn int(value: i64) -> PropertyValue {
        PropertyValue::from_i64(value)
    }

    fn count_matches(store: &PropertyStore) -> bool {
        store.len() == store.nodes().values().map(PropertyNode::len).sum::<usize>()
    }

    #[test]
    fn test_empty_store() {
        let store = PropertyStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.get(PropertyId::new(HEALTH)), None);
        assert!(store.node(HEALTH).is_none());
    }

    #[test]
    fn test_set_then_get() {
        let mut store = PropertyStore::new();
        assert!(store.set(PropertyId::new(HEALTH), int(100)));
        assert!(store.set(PropertyId::with_param(BONUS, 4), int(3)));

        assert_eq!(store.get(PropertyId::new(HEALTH)), Some(int(100)));
        assert_eq!(store.get(PropertyId::with_param(BONUS, 4)), Some(int(3)));
        assert_eq!(store.get(PropertyId::with_param(BONUS, 5)), None);
        assert_eq!(store.get(PropertyId::new(BONUS)), None);
        assert_eq!(store.len(), 2);
        assert!(count_matches(&store));
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut store = PropertyStore::new();
        assert!(store.set(PropertyId::new(LEVEL), int(1)));
        assert!(!store.set(PropertyId::new(LEVEL), int(1)));
        assert_eq!(store.len(), 1);

        assert!(store.set(PropertyId::with_param(BONUS, 1), int(2)));
        assert!(!store.set(PropertyId::with_param(BONUS, 1), int(2)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_overwrite_does_not_change_count() {
        let mut store = PropertyStore::new();
        store.set(PropertyId::new(LEVEL), int(1));
        assert!(store.set(PropertyId::new(LEVEL), int(2)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(PropertyId::new(LEVEL)), Some(int(2)));
    }

    #[test]
    fn test_get_set_outcomes() {
        let mut store = PropertyStore::new();

        let first = store.get_set(PropertyId::new(HEALTH), int(10));
        assert_eq!(first.old, None);
        assert!(first.was_added);
        assert!(first.has_changed);

        let same = store.get_set(PropertyId::new(HEALTH), int(10));
        assert_eq!(same.old, Some(int(10)));
        assert!(!same.was_added);
        assert!(!same.has_changed);

        let changed = store.get_set(PropertyId::new(HEALTH), int(4));
        assert_eq!(changed.old, Some(int(10)));
        assert!(!changed.was_added);
        assert!(changed.has_changed);
    }

    #[test]
    fn test_promotion_scenario() {
        let mut store = PropertyStore::new();

        store.set(PropertyId::new(HEALTH), int(100));
        assert_eq!(store.len(), 1);
        assert!(!store.node(HEALTH).unwrap().is_promoted());

        store.set(PropertyId::with_param(HEALTH, 5), int(7));
        assert_eq!(store.len(), 2);
        assert!(store.node(HEALTH).unwrap().is_promoted());
        assert_eq!(store.kind_len(HEALTH), 2);
        assert_eq!(store.get(PropertyId::new(HEALTH)), Some(int(100)));

        assert_eq!(store.remove(PropertyId::with_param(HEALTH, 5)), Some(int(7)));
        assert_eq!(store.len(), 1);
        assert!(store.node(HEALTH).unwrap().is_promoted());
        assert!(count_matches(&store));
    }

    #[test]
    fn test_remove_inline() {
        let mut store = PropertyStore::new();
        store.set(PropertyId::new(LEVEL), int(3));

        // Inline nodes cannot service a parameterized removal
        assert_eq!(store.remove(PropertyId::with_param(LEVEL, 0)), None);
        assert_eq!(store.len(), 1);

        assert_eq!(store.remove(PropertyId::new(LEVEL)), Some(int(3)));
        assert_eq!(store.len(), 0);
        assert!(store.node(LEVEL).is_none());
        assert_eq!(store.remove(PropertyId::new(LEVEL)), None);
    }

    #[test]
    fn test_emptied_promoted_node_is_retained() {
        let mut store = PropertyStore::new();
        store.set(PropertyId::with_param(BONUS, 1), int(1));
        store.remove(PropertyId::with_param(BONUS, 1));

        let node = store.node(BONUS).unwrap();
        assert!(node.is_promoted());
        assert!(node.is_empty());
        assert!(store.is_empty());
        assert_eq!(store.iter().count(), 0);

        // Writing the parameterless id goes into the retained map
        store.set(PropertyId::new(BONUS), int(8));
        assert!(store.node(BONUS).unwrap().is_promoted());
        assert_eq!(store.len(), 1);
        assert!(count_matches(&store));
    }

    #[test]
    fn test_remove_missing() {
        let mut store = PropertyStore::new();
        assert_eq!(store.remove(PropertyId::new(HEALTH)), None);
        store.set(PropertyId::with_param(BONUS, 1), int(1));
        assert_eq!(store.remove(PropertyId::with_param(BONUS, 2)), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut store = PropertyStore::new();
        store.set(PropertyId::new(HEALTH), int(1));
        store.set(PropertyId::with_param(BONUS, 1), int(1));
        store.clear();
        assert!(store.is_empty());
        assert!(store.node(BONUS).is_none());
        assert_eq!(store.kinds().count(), 0);
    }

    #[test]
    fn test_flatten_overlays_values() {
        let base: PropertyStore = [
            (PropertyId::new(HEALTH), int(100)),
            (PropertyId::new(LEVEL), int(1)),
        ]
        .into_iter()
        .collect();
        let overlay: PropertyStore = [
            (PropertyId::new(LEVEL), int(5)),
            (PropertyId::with_param(BONUS, 2), int(3)),
        ]
        .into_iter()
        .collect();

        let merged = PropertyStore::flattened(&base, &overlay);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get(PropertyId::new(HEALTH)), Some(int(100)));
        assert_eq!(merged.get(PropertyId::new(LEVEL)), Some(int(5)));
        assert_eq!(merged.get(PropertyId::with_param(BONUS, 2)), Some(int(3)));
        // Base is untouched
        assert_eq!(base.get(PropertyId::new(LEVEL)), Some(int(1)));
    }

    #[test]
    fn test_equality_ignores_layout() {
        let mut promoted = PropertyStore::new();
        promoted.set(PropertyId::with_param(HEALTH, 1), int(1));
        promoted.remove(PropertyId::with_param(HEALTH, 1));
        promoted.set(PropertyId::new(HEALTH), int(50));

        let mut inline = PropertyStore::new();
        inline.set(PropertyId::new(HEALTH), int(50));

        assert_eq!(promoted, inline);

        inline.set(PropertyId::new(HEALTH), int(51));
        assert_ne!(promoted, inline);
    }

    #[test]
    fn test_display_uses_registry() {
        let registry = PropertyInfoTable::new()
            .with(PropertyInfo::new(HEALTH, "Health", PropertyDataType::Integer))
            .with(PropertyInfo::new(BONUS, "Bonus", PropertyDataType::Real).with_params(1));

        let mut store = PropertyStore::new();
        store.set(PropertyId::new(HEALTH), int(20));
        store.set(PropertyId::with_param(BONUS, 2), PropertyValue::from_f32(0.5));
        store.set(PropertyId::new(LEVEL), int(3));

        let text = store.display(&registry).to_string();
        assert_eq!(text, "Health = 20\n#2 = PropertyValue(0x3)\nBonus[2] = 0.500\n");
    }

    #[test]
    fn test_random_operations_match_ordered_map() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        use std::collections::BTreeMap;

        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut store = PropertyStore::new();
        let mut model: BTreeMap<PropertyId, PropertyValue> = BTreeMap::new();
        let kinds = [HEALTH, LEVEL, BONUS];

        for _ in 0..2_000 {
            let kind = kinds[rng.gen_range(0..kinds.len())];
            let params: Vec<i32> = (0..rng.gen_range(0..=2))
                .map(|_| rng.gen_range(-2..=2))
                .collect();
            let id = PropertyId::with_params(kind, &params).unwrap();

            if rng.gen_bool(0.7) {
                let value = int(rng.gen_range(0..4));
                let outcome = store.get_set(id, value);
                let old = model.insert(id, value);
                assert_eq!(outcome.old, old);
                assert_eq!(outcome.was_added, old.is_none());
                assert_eq!(outcome.has_changed, old != Some(value));
            } else {
                assert_eq!(store.remove(id), model.remove(&id));
            }

            assert_eq!(store.len(), model.len());
            assert!(count_matches(&store));
        }

        let expected: Vec<_> = model.iter().map(|(id, value)| (*id, *value)).collect();
        assert_eq!(store.sorted_pairs(), expected);

        for kind in kinds {
            for p0 in -2..=2 {
                let prefix = PropertyId::with_param(kind, p0);
                let found: Vec<_> = store.iter_prefix(prefix).collect();
                let wanted: Vec<_> = model
                    .iter()
                    .filter(|(id, _)| id.matches_prefix(&prefix))
                    .map(|(id, value)| (*id, *value))
                    .collect();
                assert_eq!(found, wanted, "prefix {}", prefix);
            }
        }
    }
}
