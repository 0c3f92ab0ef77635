//! # Property Store
//!
//! Sparse, compound-keyed storage for the mutable attributes of simulated
//! entities (health, level, flags, per-source damage tallies and so on),
//! together with its filtered traversal and its network/persistence codec.
//!
//! ## Model
//!
//! - [`PropertyKind`] names a class of attribute. Its metadata (data type,
//!   name, parameter count) lives in a read-only [`PropertyRegistry`].
//! - [`PropertyId`] is a kind plus up to four integer parameters, so
//!   `DamageTaken[attacker]` and `StatBonus[stat, source]` are distinct keys
//!   of the same kind.
//! - [`PropertyValue`] is a raw 64-bit payload compared bitwise.
//! - [`PropertyStore`] maps each kind to a [`PropertyNode`]: a single inline
//!   value while the kind is only used without parameters, promoted to an
//!   ordered map once a parameterized id shows up.
//!
//! ## Traversal
//!
//! [`RangeIterator`] walks a store unfiltered, by kind, by kind and leading
//! parameters, by a set of kinds or by a kind predicate. It is lazy, can be
//! rewound with [`RangeIterator::reset`], and borrows the store so it cannot
//! be mutated mid-traversal.
//!
//! ## Encoding
//!
//! Stores are written against the [`Archive`] trait in one of two
//! [`ArchiveMode`]s. Persistent mode writes every pair. Replication mode
//! writes only the pairs that differ from a default store both ends already
//! hold, typically the defaults of the entity's prototype.
//!
//! ```rust
//! use properties::{
//!     ArchiveMode, PackArchive, PropertyDataType, PropertyId, PropertyInfo,
//!     PropertyInfoTable, PropertyKind, PropertyStore, PropertyValue, UnpackArchive,
//! };
//!
//! const LEVEL: PropertyKind = PropertyKind(1);
//! const HEALTH: PropertyKind = PropertyKind(2);
//!
//! let registry = PropertyInfoTable::new()
//!     .with(PropertyInfo::new(LEVEL, "Level", PropertyDataType::Integer))
//!     .with(PropertyInfo::new(HEALTH, "Health", PropertyDataType::Integer));
//!
//! let mut defaults = PropertyStore::new();
//! defaults.set(PropertyId::new(LEVEL), PropertyValue::from_i64(1));
//!
//! let mut store = defaults.clone();
//! store.set(PropertyId::new(HEALTH), PropertyValue::from_i64(50));
//!
//! let mut ar = PackArchive::new(ArchiveMode::Replication);
//! let written = store.encode(&mut ar, Some(&defaults), &registry).unwrap();
//! assert_eq!(written, 1);
//!
//! let bytes = ar.finish();
//! let mut replica = defaults.clone();
//! replica
//!     .decode(&mut UnpackArchive::new(&bytes[..], ArchiveMode::Replication), &registry)
//!     .unwrap();
//! assert_eq!(replica, store);
//! ```

pub mod archive;
mod codec;
pub mod error;
pub mod id;
pub mod iter;
pub mod kind;
pub mod node;
pub mod store;
pub mod value;

pub use archive::{Archive, ArchiveMode, PackArchive, UnpackArchive};
pub use error::{ArchiveError, CodecError, CorruptData};
pub use id::{PropertyId, PropertyParam, MAX_PARAMS};
pub use iter::{RangeFilter, RangeIterator};
pub use kind::{PropertyDataType, PropertyInfo, PropertyInfoTable, PropertyKind, PropertyRegistry};
pub use node::{PropertyNode, SetOutcome};
pub use store::{PropertyStore, StoreDisplay};
pub use value::PropertyValue;
