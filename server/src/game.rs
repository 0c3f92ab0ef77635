use crate::entity::{changes_to_store, Entity};
use log::{debug, info, warn};
use properties::{PropertyId, PropertyParam, PropertyStore, PropertyValue};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::kinds::{self, source, stat};
use shared::prototypes::{PrototypeLibrary, AVATAR, TRAINING_DUMMY};
use shared::{EntityId, PlayerAction, PrototypeId, ProtocolError};
use std::collections::HashMap;

pub const CRITICAL_CHANCE: f64 = 0.1;
pub const RESPAWN_TICKS: u32 = 100;
/// Health regeneration is applied once per this many ticks
pub const REGEN_INTERVAL_TICKS: u32 = 20;
pub const EXPERIENCE_PER_LEVEL: i64 = 100;
/// Experience for a kill, multiplied by the victim's level
pub const KILL_EXPERIENCE: i64 = 40;
pub const LEVEL_ATTACK_BONUS: f32 = 2.0;
pub const LEVEL_HEALTH_BONUS: i64 = 10;
pub const REST_REGEN_BONUS: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Ignored,
    Hit {
        damage: i64,
        critical: bool,
        killed: bool,
    },
    Rested,
}

/// Ids past the parameter range get no per-entity tally
fn entity_param(id: EntityId) -> Option<PropertyParam> {
    let param = PropertyParam::try_from(id.0).ok();
    if param.is_none() {
        warn!("{:?} does not fit a property parameter", id);
    }
    param
}

fn prototype_param(id: PrototypeId) -> Option<PropertyParam> {
    let param = PropertyParam::try_from(id.0).ok();
    if param.is_none() {
        warn!("{:?} does not fit a property parameter", id);
    }
    param
}

const fn rest_bonus_id() -> PropertyId {
    PropertyId::with_param2(kinds::STAT_BONUS, stat::REGEN, source::REST)
}

pub struct GameState {
    pub tick: u32,
    entities: HashMap<EntityId, Entity>,
    prototypes: PrototypeLibrary,
    next_entity_id: u64,
    rng: StdRng,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic combat rolls, for tests and replays
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            tick: 0,
            entities: HashMap::new(),
            prototypes: PrototypeLibrary::builtin(),
            next_entity_id: 1,
            rng,
        }
    }

    pub fn prototypes(&self) -> &PrototypeLibrary {
        &self.prototypes
    }

    /// Creates an entity from a prototype's defaults plus `overrides`
    pub fn spawn(
        &mut self,
        prototype: PrototypeId,
        overrides: &PropertyStore,
    ) -> Result<EntityId, ProtocolError> {
        let defaults = self
            .prototypes
            .defaults(prototype)
            .ok_or(ProtocolError::UnknownPrototype(prototype))?;

        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;

        let entity = Entity::new(id, prototype, defaults, overrides);
        debug!(
            "Spawned {:?} from {:?} with {} properties",
            id,
            prototype,
            entity.properties().len()
        );
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Spawns the avatar a newly connected client will control
    pub fn add_player(&mut self, client_id: u32, spawn_time_ms: i64) -> Result<EntityId, ProtocolError> {
        let overrides: PropertyStore = [(
            PropertyId::new(kinds::SPAWN_TIME),
            PropertyValue::from_time_ms(spawn_time_ms),
        )]
        .into_iter()
        .collect();

        let id = self.spawn(AVATAR, &overrides)?;
        info!("Added avatar {:?} for client {}", id, client_id);
        Ok(id)
    }

    pub fn spawn_training_dummy(&mut self) -> Result<EntityId, ProtocolError> {
        self.spawn(TRAINING_DUMMY, &PropertyStore::new())
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        info!("Removed entity {:?}", id);
        Some(entity)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn apply_action(&mut self, actor: EntityId, action: &PlayerAction) -> ActionOutcome {
        match *action {
            PlayerAction::Attack { target } => self.attack(actor, target),
            PlayerAction::Rest => self.rest(actor),
        }
    }

    fn attack(&mut self, attacker: EntityId, target: EntityId) -> ActionOutcome {
        if attacker == target {
            return ActionOutcome::Ignored;
        }

        let Some(source) = self.entities.get(&attacker) else {
            return ActionOutcome::Ignored;
        };
        if source.flag(kinds::DEAD) {
            return ActionOutcome::Ignored;
        }
        let bonus = source.real_sum(PropertyId::with_param(kinds::STAT_BONUS, stat::ATTACK));
        let base = (source.int(kinds::ATTACK_DAMAGE) + bonus.round() as i64).max(0);

        let Some(victim) = self.entities.get_mut(&target) else {
            warn!("{:?} attacked unknown entity {:?}", attacker, target);
            return ActionOutcome::Ignored;
        };
        if victim.flag(kinds::DEAD) || victim.flag(kinds::INVULNERABLE) {
            return ActionOutcome::Ignored;
        }

        let critical = self.rng.gen_bool(CRITICAL_CHANCE);
        let damage = if critical { base * 2 } else { base };

        let health = (victim.int(kinds::HEALTH) - damage).max(0);
        victim.set_property(
            PropertyId::new(kinds::HEALTH),
            PropertyValue::from_i64(health),
        );
        if let Some(param) = entity_param(attacker) {
            victim.add_int(PropertyId::with_param(kinds::DAMAGE_TAKEN, param), damage);
        }
        victim.set_property(
            PropertyId::new(kinds::LAST_ATTACKER),
            PropertyValue::from_ref_id(attacker.0),
        );

        let killed = health == 0;
        let victim_prototype = victim.prototype;
        let victim_level = victim.int(kinds::CHARACTER_LEVEL).max(1);
        if killed {
            victim.set_property(PropertyId::new(kinds::DEAD), PropertyValue::from_bool(true));
            victim.respawn_at = Some(self.tick + RESPAWN_TICKS);
            info!("{:?} was killed by {:?}", target, attacker);
        }

        if let Some(source) = self.entities.get_mut(&attacker) {
            // Fighting ends a rest
            if source
                .property(rest_bonus_id())
                .is_some_and(|bonus| bonus.as_f32() != 0.0)
            {
                source.set_property(rest_bonus_id(), PropertyValue::from_f32(0.0));
            }
            if killed {
                reward_kill(source, victim_prototype, victim_level);
            }
        }

        ActionOutcome::Hit {
            damage,
            critical,
            killed,
        }
    }

    fn rest(&mut self, actor: EntityId) -> ActionOutcome {
        match self.entities.get_mut(&actor) {
            Some(entity) if !entity.flag(kinds::DEAD) => {
                entity.set_property(rest_bonus_id(), PropertyValue::from_f32(REST_REGEN_BONUS));
                ActionOutcome::Rested
            }
            _ => ActionOutcome::Ignored,
        }
    }

    /// Advances one tick: respawns and health regeneration
    pub fn update(&mut self) {
        self.tick += 1;
        let regen_tick = self.tick % REGEN_INTERVAL_TICKS == 0;

        for entity in self.entities.values_mut() {
            if entity.flag(kinds::DEAD) {
                if entity.respawn_at.is_some_and(|at| at <= self.tick) {
                    revive(entity);
                }
                continue;
            }

            if !regen_tick {
                continue;
            }

            let bonus = entity.real_sum(PropertyId::with_param(kinds::STAT_BONUS, stat::REGEN));
            let regen = entity.int(kinds::HEALTH_REGEN) + bonus.round() as i64;
            let max = entity.int(kinds::HEALTH_MAX);
            let health = entity.int(kinds::HEALTH);
            if regen > 0 && health < max {
                entity.set_property(
                    PropertyId::new(kinds::HEALTH),
                    PropertyValue::from_i64((health + regen).min(max)),
                );
            }
        }
    }

    /// Drains the properties each entity changed since the last call
    pub fn collect_changes(&mut self) -> Vec<(EntityId, PropertyStore)> {
        let mut changed: Vec<(EntityId, PropertyStore)> = self
            .entities
            .values_mut()
            .filter(|entity| entity.has_changes())
            .map(|entity| (entity.id, changes_to_store(&entity.take_changes())))
            .collect();
        changed.sort_by_key(|(id, _)| *id);
        changed
    }
}

fn reward_kill(killer: &mut Entity, victim_prototype: PrototypeId, victim_level: i64) {
    if let Some(param) = prototype_param(victim_prototype) {
        killer.add_int(PropertyId::with_param(kinds::KILLS, param), 1);
    }
    let experience = killer.add_int(
        PropertyId::new(kinds::EXPERIENCE),
        KILL_EXPERIENCE * victim_level,
    );

    let current = killer.int(kinds::CHARACTER_LEVEL).max(1);
    let mut level = current;
    while experience >= level * EXPERIENCE_PER_LEVEL {
        level += 1;
    }
    if level == current {
        return;
    }

    killer.set_property(
        PropertyId::new(kinds::CHARACTER_LEVEL),
        PropertyValue::from_i64(level),
    );
    killer.set_property(
        PropertyId::with_param2(kinds::STAT_BONUS, stat::ATTACK, source::LEVEL),
        PropertyValue::from_f32((level - 1) as f32 * LEVEL_ATTACK_BONUS),
    );
    killer.add_int(
        PropertyId::new(kinds::HEALTH_MAX),
        (level - current) * LEVEL_HEALTH_BONUS,
    );
    info!("{:?} reached level {}", killer.id, level);
}

fn revive(entity: &mut Entity) {
    let max = entity.int(kinds::HEALTH_MAX);
    entity.set_property(PropertyId::new(kinds::DEAD), PropertyValue::from_bool(false));
    entity.set_property(PropertyId::new(kinds::HEALTH), PropertyValue::from_i64(max));
    entity.respawn_at = None;
    info!("{:?} respawned", entity.id);
}
