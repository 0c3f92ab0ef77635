//! Property kinds and the read-only registry describing them
//!
//! A [`PropertyKind`] is only a discriminant. Everything the engine needs to
//! know about it (how to encode its values, how many parameters it may carry,
//! how to print it) is looked up through a [`PropertyRegistry`]. The store
//! itself never interprets values; only the codec and the display helpers
//! consult the registry.

use crate::id::MAX_PARAMS;
use crate::value::PropertyValue;
use std::collections::HashMap;
use std::fmt;

/// Discriminant naming a class of entity attribute
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyKind(pub u16);

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Logical type of the values stored under a kind
///
/// Drives the wire encoding of values and their human-readable formatting.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyDataType {
    Boolean,
    Integer,
    Real,
    /// Milliseconds, signed
    Time,
    EntityId,
    Prototype,
    Asset,
}

/// Registry entry for a single property kind
#[derive(Clone, Debug)]
pub struct PropertyInfo {
    pub kind: PropertyKind,
    pub name: String,
    pub data_type: PropertyDataType,
    /// Maximum number of parameters ids of this kind may carry
    pub param_count: u8,
    /// Value assumed when an entity has no entry for this kind
    pub default: PropertyValue,
}

impl PropertyInfo {
    /// Creates a parameterless entry with a zero default
    pub fn new(kind: PropertyKind, name: impl Into<String>, data_type: PropertyDataType) -> Self {
        Self {
            kind,
            name: name.into(),
            data_type,
            param_count: 0,
            default: PropertyValue::ZERO,
        }
    }

    /// Declares how many parameters ids of this kind may carry
    ///
    /// Counts above the id capacity are clamped.
    pub fn with_params(mut self, count: u8) -> Self {
        self.param_count = count.min(MAX_PARAMS as u8);
        self
    }

    /// Sets the value assumed when an entity has no entry for this kind
    pub fn with_default(mut self, default: PropertyValue) -> Self {
        self.default = default;
        self
    }

    /// Renders a raw value according to this kind's data type
    pub fn format_value(&self, value: PropertyValue) -> String {
        match self.data_type {
            PropertyDataType::Boolean => value.as_bool().to_string(),
            PropertyDataType::Integer => value.as_i64().to_string(),
            PropertyDataType::Real => format!("{:.3}", value.as_f32()),
            PropertyDataType::Time => format!("{}ms", value.as_time_ms()),
            PropertyDataType::EntityId => format!("entity:{}", value.as_ref_id()),
            PropertyDataType::Prototype => format!("prototype:{}", value.as_ref_id()),
            PropertyDataType::Asset => format!("asset:{}", value.as_ref_id()),
        }
    }
}

/// Read-only source of property kind metadata
pub trait PropertyRegistry {
    fn info(&self, kind: PropertyKind) -> Option<&PropertyInfo>;

    fn contains(&self, kind: PropertyKind) -> bool {
        self.info(kind).is_some()
    }

    /// Value to assume when a store has no entry for `kind`
    fn default_value(&self, kind: PropertyKind) -> PropertyValue {
        self.info(kind).map_or(PropertyValue::ZERO, |info| info.default)
    }
}

/// Hash-map backed [`PropertyRegistry`]
#[derive(Clone, Debug, Default)]
pub struct PropertyInfoTable {
    infos: HashMap<PropertyKind, PropertyInfo>,
}

impl PropertyInfoTable {
    pub fn new() -> Self {
        Self {
            infos: HashMap::new(),
        }
    }

    /// Builder-style registration
    pub fn with(mut self, info: PropertyInfo) -> Self {
        self.register(info);
        self
    }

    /// Registers an entry, returning the one it replaced if any
    pub fn register(&mut self, info: PropertyInfo) -> Option<PropertyInfo> {
        self.infos.insert(info.kind, info)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&PropertyInfo> {
        self.infos.values().find(|info| info.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyInfo> {
        self.infos.values()
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

impl PropertyRegistry for PropertyInfoTable {
    fn info(&self, kind: PropertyKind) -> Option<&PropertyInfo> {
        self.infos.get(&kind)
    }
}
