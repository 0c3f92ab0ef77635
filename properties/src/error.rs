use crate::kind::PropertyKind;
use thiserror::Error;

/// Failure of a primitive archive operation
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
pub enum ArchiveError {
    #[error("unexpected eof: expected {expected} bytes, found {found}")]
    UnexpectedEof { expected: usize, found: usize },
    #[error("varint does not fit in 64 bits")]
    VarIntOverflow,
    #[error("archive is not {0}")]
    WrongDirection(&'static str),
}

/// Decoded bytes do not describe a valid property store
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
pub enum CorruptData {
    #[error("declared {declared} entries but only {read} were readable")]
    CountMismatch { declared: u64, read: u64 },
    #[error("unknown property kind {0}")]
    UnknownKind(PropertyKind),
    #[error("property kind discriminant {0} is out of range")]
    KindOutOfRange(u64),
    #[error("property id carries {0} params")]
    ParamCount(u8),
    #[error("property param {0} is out of range")]
    ParamOutOfRange(i64),
}

/// Error returned by store encoding and decoding
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
pub enum CodecError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("corrupt property data: {0}")]
    CorruptData(#[from] CorruptData),
    #[error("cannot encode unregistered property kind {0}")]
    UnregisteredKind(PropertyKind),
}
