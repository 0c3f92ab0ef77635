//! Client-side replicas of server entities

use log::{debug, warn};
use properties::{PropertyId, PropertyKind, PropertyRegistry, PropertyStore};
use shared::kinds;
use shared::{apply_properties, EntityId, PrototypeId, PrototypeLibrary, ProtocolError};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Replica {
    pub id: EntityId,
    pub prototype: PrototypeId,
    pub properties: PropertyStore,
    /// Server tick of the newest delta applied
    pub last_tick: u32,
}

impl Replica {
    /// Integer value of a parameterless kind, falling back to the registry
    /// default
    pub fn int(&self, kind: PropertyKind) -> i64 {
        self.properties
            .get(PropertyId::new(kind))
            .unwrap_or_else(|| kinds::registry().default_value(kind))
            .as_i64()
    }

    pub fn is_dead(&self) -> bool {
        self.properties
            .get(PropertyId::new(kinds::DEAD))
            .unwrap_or_else(|| kinds::registry().default_value(kinds::DEAD))
            .as_bool()
    }
}

/// Every entity the server has told us about
#[derive(Debug)]
pub struct ReplicaWorld {
    prototypes: PrototypeLibrary,
    entities: HashMap<EntityId, Replica>,
}

impl Default for ReplicaWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicaWorld {
    pub fn new() -> Self {
        Self {
            prototypes: PrototypeLibrary::builtin(),
            entities: HashMap::new(),
        }
    }

    /// Creates (or replaces) a replica from its prototype defaults plus the
    /// spawn payload
    pub fn apply_spawn(
        &mut self,
        entity: EntityId,
        prototype: PrototypeId,
        payload: &[u8],
    ) -> Result<(), ProtocolError> {
        let mut properties = self
            .prototypes
            .defaults(prototype)
            .ok_or(ProtocolError::UnknownPrototype(prototype))?
            .clone();
        let applied = apply_properties(&mut properties, payload)?;

        debug!(
            "Spawned {:?} ({:?}) with {} overridden properties",
            entity, prototype, applied
        );
        self.entities.insert(
            entity,
            Replica {
                id: entity,
                prototype,
                properties,
                last_tick: 0,
            },
        );
        Ok(())
    }

    /// Applies a tick's changes to a replica
    ///
    /// Deltas for unknown entities and deltas older than the newest one
    /// applied are ignored. A replica whose delta fails to decode can no
    /// longer be trusted and is dropped. Later deltas for it are ignored
    /// until a reconnect delivers a fresh spawn.
    pub fn apply_delta(
        &mut self,
        tick: u32,
        entity: EntityId,
        payload: &[u8],
    ) -> Result<usize, ProtocolError> {
        let Some(replica) = self.entities.get_mut(&entity) else {
            debug!("Delta for unknown entity {:?}", entity);
            return Ok(0);
        };
        if tick < replica.last_tick {
            debug!(
                "Stale delta for {:?}: tick {} < {}",
                entity, tick, replica.last_tick
            );
            return Ok(0);
        }

        match apply_properties(&mut replica.properties, payload) {
            Ok(applied) => {
                replica.last_tick = tick;
                Ok(applied)
            }
            Err(e) => {
                warn!("Dropping replica {:?}: {}", entity, e);
                self.entities.remove(&entity);
                Err(e)
            }
        }
    }

    pub fn destroy(&mut self, entity: EntityId) -> bool {
        self.entities.remove(&entity).is_some()
    }

    pub fn get(&self, entity: EntityId) -> Option<&Replica> {
        self.entities.get(&entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Replica> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Lowest-id living entity other than `avatar`
    pub fn pick_target(&self, avatar: EntityId) -> Option<EntityId> {
        self.entities
            .values()
            .filter(|replica| replica.id != avatar && !replica.is_dead())
            .map(|replica| replica.id)
            .min()
    }

    /// One line per property, for logging
    pub fn describe(&self, entity: EntityId) -> Option<String> {
        let replica = self.entities.get(&entity)?;
        Some(format!(
            "{:?} ({:?}): {}",
            entity,
            replica.prototype,
            replica.properties.display(kinds::registry())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use properties::PropertyValue;
    use shared::encode_properties;
    use shared::prototypes::{AVATAR, TRAINING_DUMMY};

    fn spawn_payload(prototype: PrototypeId, overrides: &[(PropertyId, PropertyValue)]) -> Vec<u8> {
        let library = PrototypeLibrary::builtin();
        let defaults = library.defaults(prototype).unwrap();
        let mut store = defaults.clone();
        store.extend(overrides.iter().copied());
        encode_properties(&store, Some(defaults)).unwrap()
    }

    fn delta(changes: &[(PropertyId, PropertyValue)]) -> Vec<u8> {
        let store: PropertyStore = changes.iter().copied().collect();
        encode_properties(&store, None).unwrap()
    }

    #[test]
    fn test_spawn_from_defaults() {
        let mut world = ReplicaWorld::new();
        let payload = spawn_payload(
            AVATAR,
            &[(PropertyId::new(kinds::HEALTH), PropertyValue::from_i64(90))],
        );

        world.apply_spawn(EntityId(1), AVATAR, &payload).unwrap();

        let replica = world.get(EntityId(1)).unwrap();
        assert_eq!(replica.int(kinds::HEALTH), 90);
        assert_eq!(replica.int(kinds::HEALTH_MAX), 150);
        assert_eq!(replica.int(kinds::CHARACTER_LEVEL), 1);
    }

    #[test]
    fn test_absent_kinds_use_registry_defaults() {
        let replica = Replica {
            id: EntityId(1),
            prototype: AVATAR,
            properties: PropertyStore::new(),
            last_tick: 0,
        };
        assert_eq!(replica.int(kinds::CHARACTER_LEVEL), 1);
        assert_eq!(replica.int(kinds::EXPERIENCE), 0);
        assert!(!replica.is_dead());
    }

    #[test]
    fn test_spawn_unknown_prototype() {
        let mut world = ReplicaWorld::new();
        let result = world.apply_spawn(EntityId(1), PrototypeId(50), &[0]);
        assert!(matches!(
            result,
            Err(ProtocolError::UnknownPrototype(PrototypeId(50)))
        ));
        assert!(world.is_empty());
    }

    #[test]
    fn test_delta_updates_replica() {
        let mut world = ReplicaWorld::new();
        world
            .apply_spawn(EntityId(2), TRAINING_DUMMY, &spawn_payload(TRAINING_DUMMY, &[]))
            .unwrap();

        let applied = world
            .apply_delta(
                5,
                EntityId(2),
                &delta(&[
                    (PropertyId::new(kinds::HEALTH), PropertyValue::from_i64(488)),
                    (
                        PropertyId::with_param(kinds::DAMAGE_TAKEN, 1),
                        PropertyValue::from_i64(12),
                    ),
                ]),
            )
            .unwrap();

        assert_eq!(applied, 2);
        let replica = world.get(EntityId(2)).unwrap();
        assert_eq!(replica.int(kinds::HEALTH), 488);
        assert_eq!(replica.int(kinds::HEALTH_MAX), 500);
        assert_eq!(replica.last_tick, 5);
        assert_eq!(
            replica
                .properties
                .get(PropertyId::with_param(kinds::DAMAGE_TAKEN, 1)),
            Some(PropertyValue::from_i64(12))
        );
    }

    #[test]
    fn test_stale_and_orphan_deltas_are_ignored() {
        let mut world = ReplicaWorld::new();
        world
            .apply_spawn(EntityId(2), TRAINING_DUMMY, &spawn_payload(TRAINING_DUMMY, &[]))
            .unwrap();

        let newer = delta(&[(PropertyId::new(kinds::HEALTH), PropertyValue::from_i64(400))]);
        let older = delta(&[(PropertyId::new(kinds::HEALTH), PropertyValue::from_i64(450))]);
        world.apply_delta(10, EntityId(2), &newer).unwrap();
        assert_eq!(world.apply_delta(9, EntityId(2), &older).unwrap(), 0);
        assert_eq!(world.get(EntityId(2)).unwrap().int(kinds::HEALTH), 400);

        assert_eq!(world.apply_delta(11, EntityId(99), &newer).unwrap(), 0);
    }

    #[test]
    fn test_corrupt_delta_drops_replica() {
        let mut world = ReplicaWorld::new();
        world
            .apply_spawn(EntityId(2), TRAINING_DUMMY, &spawn_payload(TRAINING_DUMMY, &[]))
            .unwrap();

        assert!(world.apply_delta(1, EntityId(2), &[4, 8, 1]).is_err());
        assert!(world.get(EntityId(2)).is_none());

        let later = delta(&[(PropertyId::new(kinds::HEALTH), PropertyValue::from_i64(400))]);
        assert_eq!(world.apply_delta(2, EntityId(2), &later).unwrap(), 0);
        assert!(world.get(EntityId(2)).is_none());

        world
            .apply_spawn(EntityId(2), TRAINING_DUMMY, &spawn_payload(TRAINING_DUMMY, &[]))
            .unwrap();
        assert_eq!(world.apply_delta(3, EntityId(2), &later).unwrap(), 1);
    }

    #[test]
    fn test_pick_target_skips_dead_and_self() {
        let mut world = ReplicaWorld::new();
        world
            .apply_spawn(EntityId(1), AVATAR, &spawn_payload(AVATAR, &[]))
            .unwrap();
        world
            .apply_spawn(
                EntityId(2),
                TRAINING_DUMMY,
                &spawn_payload(
                    TRAINING_DUMMY,
                    &[(PropertyId::new(kinds::DEAD), PropertyValue::from_bool(true))],
                ),
            )
            .unwrap();
        world
            .apply_spawn(EntityId(3), TRAINING_DUMMY, &spawn_payload(TRAINING_DUMMY, &[]))
            .unwrap();

        assert_eq!(world.pick_target(EntityId(1)), Some(EntityId(3)));

        world.destroy(EntityId(3));
        assert_eq!(world.pick_target(EntityId(1)), None);
    }

    #[test]
    fn test_describe_uses_property_names() {
        let mut world = ReplicaWorld::new();
        world
            .apply_spawn(EntityId(1), AVATAR, &spawn_payload(AVATAR, &[]))
            .unwrap();

        let description = world.describe(EntityId(1)).unwrap();
        assert!(description.contains("Health"));
        assert!(world.describe(EntityId(7)).is_none());
    }
}
