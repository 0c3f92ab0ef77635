//! Built-in property kinds shared by server and client
//!
//! Both ends must agree on this table: the codec uses it to pick value
//! encodings, and an unknown kind on the wire aborts the decode.

use properties::{PropertyDataType, PropertyInfo, PropertyInfoTable, PropertyKind, PropertyValue};
use std::sync::OnceLock;

pub const HEALTH: PropertyKind = PropertyKind(1);
pub const HEALTH_MAX: PropertyKind = PropertyKind(2);
pub const CHARACTER_LEVEL: PropertyKind = PropertyKind(3);
pub const EXPERIENCE: PropertyKind = PropertyKind(4);
pub const MOVEMENT_SPEED: PropertyKind = PropertyKind(5);
pub const DEAD: PropertyKind = PropertyKind(6);
pub const INVULNERABLE: PropertyKind = PropertyKind(7);
/// Parameterized by attacker entity
pub const DAMAGE_TAKEN: PropertyKind = PropertyKind(8);
/// Parameterized by stat and bonus source
pub const STAT_BONUS: PropertyKind = PropertyKind(9);
pub const LAST_ATTACKER: PropertyKind = PropertyKind(10);
pub const SPAWN_TIME: PropertyKind = PropertyKind(11);
pub const HEALTH_REGEN: PropertyKind = PropertyKind(12);
pub const ATTACK_DAMAGE: PropertyKind = PropertyKind(13);
/// Parameterized by victim prototype
pub const KILLS: PropertyKind = PropertyKind(14);

/// Stat parameter values for [`STAT_BONUS`]
pub mod stat {
    use properties::PropertyParam;

    pub const ATTACK: PropertyParam = 0;
    pub const REGEN: PropertyParam = 1;
}

/// Bonus source parameter values for [`STAT_BONUS`]
pub mod source {
    use properties::PropertyParam;

    pub const LEVEL: PropertyParam = 0;
    pub const REST: PropertyParam = 1;
}

fn build_registry() -> PropertyInfoTable {
    PropertyInfoTable::new()
        .with(PropertyInfo::new(HEALTH, "Health", PropertyDataType::Integer))
        .with(PropertyInfo::new(HEALTH_MAX, "HealthMax", PropertyDataType::Integer))
        .with(
            PropertyInfo::new(CHARACTER_LEVEL, "CharacterLevel", PropertyDataType::Integer)
                .with_default(PropertyValue::from_i64(1)),
        )
        .with(PropertyInfo::new(EXPERIENCE, "Experience", PropertyDataType::Integer))
        .with(
            PropertyInfo::new(MOVEMENT_SPEED, "MovementSpeed", PropertyDataType::Real)
                .with_default(PropertyValue::from_f32(1.0)),
        )
        .with(PropertyInfo::new(DEAD, "Dead", PropertyDataType::Boolean))
        .with(PropertyInfo::new(INVULNERABLE, "Invulnerable", PropertyDataType::Boolean))
        .with(PropertyInfo::new(DAMAGE_TAKEN, "DamageTaken", PropertyDataType::Integer).with_params(1))
        .with(PropertyInfo::new(STAT_BONUS, "StatBonus", PropertyDataType::Real).with_params(2))
        .with(PropertyInfo::new(LAST_ATTACKER, "LastAttacker", PropertyDataType::EntityId))
        .with(PropertyInfo::new(SPAWN_TIME, "SpawnTime", PropertyDataType::Time))
        .with(PropertyInfo::new(HEALTH_REGEN, "HealthRegen", PropertyDataType::Integer))
        .with(PropertyInfo::new(ATTACK_DAMAGE, "AttackDamage", PropertyDataType::Integer))
        .with(PropertyInfo::new(KILLS, "Kills", PropertyDataType::Integer).with_params(1))
}

/// Process-wide registry of the built-in kinds
pub fn registry() -> &'static PropertyInfoTable {
    static REGISTRY: OnceLock<PropertyInfoTable> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}
