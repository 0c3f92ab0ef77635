//! Server-side entities and property change tracking
//!
//! Every write to an entity's properties goes through
//! [`PropertyStore::get_set`], so a change is recorded only when a value was
//! added or its bits actually changed. The recorded changes are drained once
//! per tick and replicated to clients.

use properties::{PropertyId, PropertyKind, PropertyRegistry, PropertyStore, PropertyValue};
use shared::kinds;
use shared::{EntityId, PrototypeId};

/// A single effective property write
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PropertyChange {
    pub id: PropertyId,
    pub old: Option<PropertyValue>,
    pub new: PropertyValue,
}

impl PropertyChange {
    pub fn was_added(&self) -> bool {
        self.old.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub prototype: PrototypeId,
    /// Tick at which a dead entity comes back
    pub respawn_at: Option<u32>,
    properties: PropertyStore,
    changes: Vec<PropertyChange>,
}

impl Entity {
    /// Creates an entity from its prototype defaults plus per-instance overrides
    pub fn new(
        id: EntityId,
        prototype: PrototypeId,
        defaults: &PropertyStore,
        overrides: &PropertyStore,
    ) -> Self {
        Self {
            id,
            prototype,
            respawn_at: None,
            properties: PropertyStore::flattened(defaults, overrides),
            changes: Vec::new(),
        }
    }

    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    pub fn property(&self, id: PropertyId) -> Option<PropertyValue> {
        self.properties.get(id)
    }

    /// Value of `id`, or the registry default of its kind if absent
    pub fn property_or_default(&self, id: PropertyId) -> PropertyValue {
        self.property(id)
            .unwrap_or_else(|| kinds::registry().default_value(id.kind()))
    }

    /// Integer value of a parameterless kind
    pub fn int(&self, kind: PropertyKind) -> i64 {
        self.property_or_default(PropertyId::new(kind)).as_i64()
    }

    /// Boolean value of a parameterless kind
    pub fn flag(&self, kind: PropertyKind) -> bool {
        self.property_or_default(PropertyId::new(kind)).as_bool()
    }

    /// Sum of the real values stored under ids starting with `prefix`
    pub fn real_sum(&self, prefix: PropertyId) -> f32 {
        self.properties
            .iter_prefix(prefix)
            .map(|(_, value)| value.as_f32())
            .sum()
    }

    /// Writes a property, recording the change if there was one
    pub fn set_property(&mut self, id: PropertyId, value: PropertyValue) -> bool {
        let outcome = self.properties.get_set(id, value);
        if outcome.has_changed {
            self.changes.push(PropertyChange {
                id,
                old: outcome.old,
                new: value,
            });
        }
        outcome.has_changed
    }

    /// Adds `delta` to an integer property and returns the new value
    pub fn add_int(&mut self, id: PropertyId, delta: i64) -> i64 {
        let current = self.property_or_default(id).as_i64();
        let updated = current.saturating_add(delta);
        self.set_property(id, PropertyValue::from_i64(updated));
        updated
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn take_changes(&mut self) -> Vec<PropertyChange> {
        std::mem::take(&mut self.changes)
    }
}

/// Final value of every id touched by `changes`, later writes winning
pub fn changes_to_store(changes: &[PropertyChange]) -> PropertyStore {
    changes.iter().map(|change| (change.id, change.new)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::prototypes::{PrototypeLibrary, AVATAR};

    fn test_entity() -> Entity {
        let library = PrototypeLibrary::builtin();
        Entity::new(
            EntityId(1),
            AVATAR,
            library.defaults(AVATAR).unwrap(),
            &PropertyStore::new(),
        )
    }

    #[test]
    fn test_entity_starts_from_defaults() {
        let entity = test_entity();
        assert_eq!(entity.int(kinds::HEALTH), 150);
        assert_eq!(entity.int(kinds::CHARACTER_LEVEL), 1);
        assert!(!entity.flag(kinds::DEAD));
        assert!(!entity.has_changes());
    }

    #[test]
    fn test_overrides_apply_on_top() {
        let library = PrototypeLibrary::builtin();
        let overrides: PropertyStore = [(
            PropertyId::new(kinds::CHARACTER_LEVEL),
            PropertyValue::from_i64(7),
        )]
        .into_iter()
        .collect();

        let entity = Entity::new(
            EntityId(2),
            AVATAR,
            library.defaults(AVATAR).unwrap(),
            &overrides,
        );
        assert_eq!(entity.int(kinds::CHARACTER_LEVEL), 7);
        assert_eq!(entity.int(kinds::HEALTH), 150);
    }

    #[test]
    fn test_only_effective_writes_are_recorded() {
        let mut entity = test_entity();

        assert!(!entity.set_property(PropertyId::new(kinds::HEALTH), PropertyValue::from_i64(150)));
        assert!(!entity.has_changes());

        assert!(entity.set_property(PropertyId::new(kinds::HEALTH), PropertyValue::from_i64(120)));
        assert!(entity.set_property(
            PropertyId::with_param(kinds::DAMAGE_TAKEN, 4),
            PropertyValue::from_i64(30)
        ));

        let changes = entity.take_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].old, Some(PropertyValue::from_i64(150)));
        assert!(!changes[0].was_added());
        assert!(changes[1].was_added());
        assert!(!entity.has_changes());
    }

    #[test]
    fn test_absent_kinds_use_registry_defaults() {
        let empty = PropertyStore::new();
        let mut entity = Entity::new(EntityId(3), AVATAR, &empty, &empty);

        assert_eq!(entity.int(kinds::CHARACTER_LEVEL), 1);
        assert_eq!(entity.int(kinds::HEALTH), 0);
        assert!(!entity.flag(kinds::DEAD));
        assert_eq!(
            entity.property_or_default(PropertyId::new(kinds::MOVEMENT_SPEED)),
            PropertyValue::from_f32(1.0)
        );

        assert_eq!(entity.add_int(PropertyId::new(kinds::CHARACTER_LEVEL), 1), 2);
    }

    #[test]
    fn test_add_int() {
        let mut entity = test_entity();
        let id = PropertyId::new(kinds::EXPERIENCE);
        assert_eq!(entity.add_int(id, 25), 25);
        assert_eq!(entity.add_int(id, -5), 20);
        assert_eq!(entity.int(kinds::EXPERIENCE), 20);
    }

    #[test]
    fn test_real_sum_over_prefix() {
        let mut entity = test_entity();
        entity.set_property(
            PropertyId::with_param2(kinds::STAT_BONUS, 0, 0),
            PropertyValue::from_f32(1.5),
        );
        entity.set_property(
            PropertyId::with_param2(kinds::STAT_BONUS, 0, 1),
            PropertyValue::from_f32(2.0),
        );
        entity.set_property(
            PropertyId::with_param2(kinds::STAT_BONUS, 1, 0),
            PropertyValue::from_f32(10.0),
        );

        let sum = entity.real_sum(PropertyId::with_param(kinds::STAT_BONUS, 0));
        assert!((sum - 3.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_changes_to_store_keeps_last_write() {
        let mut entity = test_entity();
        let id = PropertyId::new(kinds::HEALTH);
        entity.set_property(id, PropertyValue::from_i64(100));
        entity.set_property(id, PropertyValue::from_i64(90));

        let store = changes_to_store(&entity.take_changes());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(id), Some(PropertyValue::from_i64(90)));
    }
}
