//! Compound property keys
//!
//! A [`PropertyId`] is a kind plus up to [`MAX_PARAMS`] small signed
//! parameters. Ids are totally ordered by kind, then lexicographically by
//! parameter list, with a shorter list sorting before every list it prefixes.
//! That order makes all ids sharing a leading-parameter prefix contiguous,
//! which is what the range iterator relies on for prefix scans.

use crate::kind::PropertyKind;
use std::cmp::Ordering;
use std::fmt;

/// A single id parameter
pub type PropertyParam = i32;

/// Maximum number of parameters a [`PropertyId`] can carry
pub const MAX_PARAMS: usize = 4;

/// Compound key: a kind and an ordered parameter list
///
/// Unused parameter slots are always zero so the derived equality and hash
/// only depend on the kind and the used parameters.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct PropertyId {
    kind: PropertyKind,
    len: u8,
    params: [PropertyParam; MAX_PARAMS],
}

impl PropertyId {
    /// Parameterless id of `kind`
    pub const fn new(kind: PropertyKind) -> Self {
        Self {
            kind,
            len: 0,
            params: [0; MAX_PARAMS],
        }
    }

    pub const fn with_param(kind: PropertyKind, p0: PropertyParam) -> Self {
        Self {
            kind,
            len: 1,
            params: [p0, 0, 0, 0],
        }
    }

    pub const fn with_param2(kind: PropertyKind, p0: PropertyParam, p1: PropertyParam) -> Self {
        Self {
            kind,
            len: 2,
            params: [p0, p1, 0, 0],
        }
    }

    /// Builds an id from a parameter slice
    ///
    /// Returns `None` if more than [`MAX_PARAMS`] parameters are given.
    pub fn with_params(kind: PropertyKind, params: &[PropertyParam]) -> Option<Self> {
        if params.len() > MAX_PARAMS {
            return None;
        }

        let mut id = Self::new(kind);
        id.params[..params.len()].copy_from_slice(params);
        id.len = params.len() as u8;
        Some(id)
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    pub fn params(&self) -> &[PropertyParam] {
        &self.params[..self.len as usize]
    }

    pub fn param(&self, index: usize) -> Option<PropertyParam> {
        self.params().get(index).copied()
    }

    pub fn param_count(&self) -> usize {
        self.len as usize
    }

    pub fn has_params(&self) -> bool {
        self.len != 0
    }

    /// Returns true if this id has the kind of `prefix` and starts with all of
    /// its parameters. Trailing parameters are free.
    pub fn matches_prefix(&self, prefix: &PropertyId) -> bool {
        self.kind == prefix.kind && self.params().starts_with(prefix.params())
    }
}

impl From<PropertyKind> for PropertyId {
    fn from(kind: PropertyKind) -> Self {
        Self::new(kind)
    }
}

impl Ord for PropertyId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.params().cmp(other.params()))
    }
}

impl PartialOrd for PropertyId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId({}", self.kind)?;
        for param in self.params() {
            write!(f, ", {}", param)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.has_params() {
            write!(f, "[")?;
            for (i, param) in self.params().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", param)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
