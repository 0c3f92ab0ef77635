//! Persistent and replication encodings of a [`PropertyStore`]
//!
//! Layout: `[count: varint] { [id] [value] }*`.
//!
//! An id is packed as a varint of `(kind << 3) | param_count` followed by each
//! parameter as a zig-zag varint. A value is encoded according to its kind's
//! registry data type, using the smallest natural representation.
//!
//! In replication mode only the pairs that differ from a default store are
//! written, and decoding leaves every id absent from the payload untouched.
//! Decoding always builds a scratch store and swaps it in on success, so a
//! failed decode never leaves a partially populated store behind.

use crate::archive::Archive;
use crate::error::{ArchiveError, CodecError, CorruptData};
use crate::id::{PropertyId, PropertyParam, MAX_PARAMS};
use crate::kind::{PropertyDataType, PropertyKind, PropertyRegistry};
use crate::store::PropertyStore;
use crate::value::PropertyValue;
use log::{debug, warn};

const PARAM_COUNT_BITS: u32 = 3;
const PARAM_COUNT_MASK: u64 = (1 << PARAM_COUNT_BITS) - 1;

impl PropertyStore {
    /// Encodes or decodes depending on the archive's direction
    ///
    /// `defaults` is only consulted when packing in replication mode.
    /// Returns the number of entries written or applied.
    pub fn serialize<A: Archive>(
        &mut self,
        ar: &mut A,
        defaults: Option<&PropertyStore>,
        registry: &dyn PropertyRegistry,
    ) -> Result<usize, CodecError> {
        if ar.is_packing() {
            self.encode(ar, defaults, registry)
        } else {
            self.decode(ar, registry)
        }
    }

    /// Writes the store into a packing archive
    ///
    /// Entries carrying more parameters than their kind declares are logged
    /// and left out, the same way decoding treats them, so the written count
    /// is what a receiver applies.
    pub fn encode<A: Archive>(
        &self,
        ar: &mut A,
        defaults: Option<&PropertyStore>,
        registry: &dyn PropertyRegistry,
    ) -> Result<usize, CodecError> {
        if !ar.is_packing() {
            return Err(ArchiveError::WrongDirection("packing").into());
        }

        let defaults = defaults.filter(|_| ar.is_replication());

        let mut entries = Vec::with_capacity(self.len());
        for (id, value) in self.iter() {
            if defaults.is_some_and(|defaults| defaults.get(id) == Some(value)) {
                continue;
            }

            let info = registry
                .info(id.kind())
                .ok_or(CodecError::UnregisteredKind(id.kind()))?;
            if id.param_count() > info.param_count as usize {
                warn!(
                    "Not encoding property {}: {} declares {} params, id has {}",
                    id,
                    info.name,
                    info.param_count,
                    id.param_count()
                );
                continue;
            }
            entries.push((id, value, info.data_type));
        }
        // Hash order is not stable across processes
        entries.sort_unstable_by_key(|(id, _, _)| *id);

        ar.write_varint(entries.len() as u64)?;
        for (id, value, data_type) in &entries {
            encode_id(ar, id)?;
            encode_value(ar, *data_type, *value)?;
        }

        debug!(
            "Encoded {} of {} properties ({:?})",
            entries.len(),
            self.len(),
            ar.mode()
        );
        Ok(entries.len())
    }

    /// Reads the store from an unpacking archive
    ///
    /// Persistent mode replaces the whole store. Replication mode applies the
    /// decoded entries on top of the current contents.
    pub fn decode<A: Archive>(
        &mut self,
        ar: &mut A,
        registry: &dyn PropertyRegistry,
    ) -> Result<usize, CodecError> {
        if ar.is_packing() {
            return Err(ArchiveError::WrongDirection("unpacking").into());
        }

        let declared = ar.read_varint()?;
        // Every entry takes at least two bytes
        if let Some(remaining) = ar.remaining() {
            if declared > (remaining / 2) as u64 {
                return Err(CorruptData::CountMismatch { declared, read: 0 }.into());
            }
        }

        let mut scratch = if ar.is_replication() {
            self.clone()
        } else {
            PropertyStore::new()
        };

        let mut applied = 0;
        for read in 0..declared {
            let entry = decode_entry(ar, registry).map_err(|err| match err {
                CodecError::Archive(ArchiveError::UnexpectedEof { .. }) => {
                    CorruptData::CountMismatch { declared, read }.into()
                }
                err => err,
            })?;

            if let Some((id, value)) = entry {
                scratch.set(id, value);
                applied += 1;
            }
        }

        *self = scratch;
        debug!("Decoded {} of {} properties ({:?})", applied, declared, ar.mode());
        Ok(applied)
    }
}

fn encode_id<A: Archive>(ar: &mut A, id: &PropertyId) -> Result<(), ArchiveError> {
    let packed = ((id.kind().0 as u64) << PARAM_COUNT_BITS) | id.param_count() as u64;
    ar.write_varint(packed)?;
    for param in id.params() {
        ar.write_zigzag(*param as i64)?;
    }
    Ok(())
}

fn decode_id<A: Archive>(ar: &mut A) -> Result<PropertyId, CodecError> {
    let packed = ar.read_varint()?;

    let kind = u16::try_from(packed >> PARAM_COUNT_BITS)
        .map_err(|_| CorruptData::KindOutOfRange(packed >> PARAM_COUNT_BITS))?;
    let count = (packed & PARAM_COUNT_MASK) as u8;
    if count as usize > MAX_PARAMS {
        return Err(CorruptData::ParamCount(count).into());
    }

    let mut params = [0; MAX_PARAMS];
    for param in params.iter_mut().take(count as usize) {
        let raw = ar.read_zigzag()?;
        *param = PropertyParam::try_from(raw).map_err(|_| CorruptData::ParamOutOfRange(raw))?;
    }

    PropertyId::with_params(PropertyKind(kind), &params[..count as usize])
        .ok_or_else(|| CorruptData::ParamCount(count).into())
}

fn encode_value<A: Archive>(
    ar: &mut A,
    data_type: PropertyDataType,
    value: PropertyValue,
) -> Result<(), ArchiveError> {
    match data_type {
        PropertyDataType::Boolean => ar.write_bool(value.as_bool()),
        PropertyDataType::Real => ar.write_f32(value.as_f32()),
        PropertyDataType::Integer | PropertyDataType::Time => ar.write_zigzag(value.as_i64()),
        PropertyDataType::EntityId | PropertyDataType::Prototype | PropertyDataType::Asset => {
            ar.write_varint(value.as_ref_id())
        }
    }
}

fn decode_value<A: Archive>(
    ar: &mut A,
    data_type: PropertyDataType,
) -> Result<PropertyValue, ArchiveError> {
    Ok(match data_type {
        PropertyDataType::Boolean => PropertyValue::from_bool(ar.read_bool()?),
        PropertyDataType::Real => PropertyValue::from_f32(ar.read_f32()?),
        PropertyDataType::Integer | PropertyDataType::Time => {
            PropertyValue::from_i64(ar.read_zigzag()?)
        }
        PropertyDataType::EntityId | PropertyDataType::Prototype | PropertyDataType::Asset => {
            PropertyValue::from_ref_id(ar.read_varint()?)
        }
    })
}

/// Reads one entry, returning `None` for entries that must be skipped
fn decode_entry<A: Archive>(
    ar: &mut A,
    registry: &dyn PropertyRegistry,
) -> Result<Option<(PropertyId, PropertyValue)>, CodecError> {
    let id = decode_id(ar)?;
    let info = registry
        .info(id.kind())
        .ok_or(CorruptData::UnknownKind(id.kind()))?;
    let value = decode_value(ar, info.data_type)?;

    if id.param_count() > info.param_count as usize {
        warn!(
            "Skipping property {}: {} declares {} params, payload has {}",
            id,
            info.name,
            info.param_count,
            id.param_count()
        );
        return Ok(None);
    }

    Ok(Some((id, value)))
}
