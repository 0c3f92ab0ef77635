//! Prototypes and their default property stores
//!
//! A prototype carries only the properties it overrides. Its default store is
//! the parent's default store with those overrides applied, computed once
//! when the prototype is inserted. Entities start from (and replicate against)
//! the default store of their prototype.

use crate::kinds;
use crate::ProtocolError;
use log::{debug, error};
use properties::{PropertyId, PropertyStore, PropertyValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrototypeId(pub u64);

pub const CREATURE: PrototypeId = PrototypeId(1);
pub const AVATAR: PrototypeId = PrototypeId(2);
pub const TRAINING_DUMMY: PrototypeId = PrototypeId(3);

#[derive(Clone, Debug)]
pub struct Prototype {
    pub id: PrototypeId,
    pub name: String,
    pub parent: Option<PrototypeId>,
    /// Overrides on top of the parent's defaults
    pub properties: PropertyStore,
}

impl Prototype {
    pub fn new(id: PrototypeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            properties: PropertyStore::new(),
        }
    }

    pub fn with_parent(mut self, parent: PrototypeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_property(mut self, id: PropertyId, value: PropertyValue) -> Self {
        self.properties.set(id, value);
        self
    }
}

/// Prototypes indexed by id, with their flattened default stores
#[derive(Clone, Debug, Default)]
pub struct PrototypeLibrary {
    prototypes: HashMap<PrototypeId, Prototype>,
    defaults: HashMap<PrototypeId, PropertyStore>,
}

impl PrototypeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The prototypes every server and client ships with
    pub fn builtin() -> Self {
        let int = PropertyValue::from_i64;
        let mut library = Self::new();

        let prototypes = [
            Prototype::new(CREATURE, "Creature")
                .with_property(PropertyId::new(kinds::HEALTH), int(100))
                .with_property(PropertyId::new(kinds::HEALTH_MAX), int(100))
                .with_property(PropertyId::new(kinds::CHARACTER_LEVEL), int(1))
                .with_property(PropertyId::new(kinds::HEALTH_REGEN), int(1))
                .with_property(PropertyId::new(kinds::ATTACK_DAMAGE), int(10))
                .with_property(
                    PropertyId::new(kinds::MOVEMENT_SPEED),
                    PropertyValue::from_f32(1.0),
                ),
            Prototype::new(AVATAR, "Avatar")
                .with_parent(CREATURE)
                .with_property(PropertyId::new(kinds::HEALTH), int(150))
                .with_property(PropertyId::new(kinds::HEALTH_MAX), int(150))
                .with_property(PropertyId::new(kinds::ATTACK_DAMAGE), int(12))
                .with_property(
                    PropertyId::new(kinds::MOVEMENT_SPEED),
                    PropertyValue::from_f32(1.2),
                ),
            Prototype::new(TRAINING_DUMMY, "TrainingDummy")
                .with_parent(CREATURE)
                .with_property(PropertyId::new(kinds::HEALTH), int(500))
                .with_property(PropertyId::new(kinds::HEALTH_MAX), int(500))
                .with_property(PropertyId::new(kinds::HEALTH_REGEN), int(25))
                .with_property(PropertyId::new(kinds::ATTACK_DAMAGE), int(0))
                .with_property(
                    PropertyId::new(kinds::MOVEMENT_SPEED),
                    PropertyValue::from_f32(0.0),
                ),
        ];

        for prototype in prototypes {
            // Parents are listed before children, so this cannot fail
            if let Err(e) = library.insert(prototype) {
                error!("Invalid builtin prototype: {}", e);
            }
        }

        library
    }

    /// Adds a prototype, flattening its parent's defaults under its overrides
    ///
    /// The parent must already be present.
    pub fn insert(&mut self, prototype: Prototype) -> Result<(), ProtocolError> {
        if self.prototypes.contains_key(&prototype.id) {
            return Err(ProtocolError::DuplicatePrototype(prototype.id));
        }

        let defaults = match prototype.parent {
            Some(parent) => {
                let base = self
                    .defaults
                    .get(&parent)
                    .ok_or(ProtocolError::UnknownPrototype(parent))?;
                PropertyStore::flattened(base, &prototype.properties)
            }
            None => prototype.properties.clone(),
        };

        debug!(
            "Registered prototype {} ({:?}) with {} default properties",
            prototype.name,
            prototype.id,
            defaults.len()
        );
        self.defaults.insert(prototype.id, defaults);
        self.prototypes.insert(prototype.id, prototype);
        Ok(())
    }

    pub fn get(&self, id: PrototypeId) -> Option<&Prototype> {
        self.prototypes.get(&id)
    }

    /// Flattened default store of a prototype
    pub fn defaults(&self, id: PrototypeId) -> Option<&PropertyStore> {
        self.defaults.get(&id)
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_builtin_library() {
        let library = PrototypeLibrary::builtin();
        assert_eq!(library.len(), 3);
        assert_eq!(library.get(AVATAR).unwrap().name, "Avatar");
        assert_eq!(library.get(AVATAR).unwrap().parent, Some(CREATURE));
    }

    #[test]
    fn test_defaults_inherit_from_parent() {
        let library = PrototypeLibrary::builtin();
        let avatar = library.defaults(AVATAR).unwrap();

        assert_eq!(
            avatar.get(PropertyId::new(kinds::HEALTH)),
            Some(PropertyValue::from_i64(150))
        );
        // Inherited unchanged from the creature
        assert_eq!(
            avatar.get(PropertyId::new(kinds::HEALTH_REGEN)),
            Some(PropertyValue::from_i64(1))
        );
        assert_approx_eq!(
            avatar
                .get(PropertyId::new(kinds::MOVEMENT_SPEED))
                .unwrap()
                .as_f32(),
            1.2,
            f32::EPSILON
        );
        assert_eq!(avatar.len(), library.defaults(CREATURE).unwrap().len());
        // Overrides only hold what differs
        assert_eq!(library.get(AVATAR).unwrap().properties.len(), 4);
    }

    #[test]
    fn test_unknown_parent() {
        let mut library = PrototypeLibrary::new();
        let orphan = Prototype::new(PrototypeId(10), "Orphan").with_parent(PrototypeId(99));
        assert!(matches!(
            library.insert(orphan),
            Err(ProtocolError::UnknownPrototype(PrototypeId(99)))
        ));
        assert!(library.is_empty());
    }

    #[test]
    fn test_duplicate_prototype() {
        let mut library = PrototypeLibrary::builtin();
        assert!(matches!(
            library.insert(Prototype::new(CREATURE, "Again")),
            Err(ProtocolError::DuplicatePrototype(CREATURE))
        ));
        assert!(library.defaults(PrototypeId(42)).is_none());
    }
}
