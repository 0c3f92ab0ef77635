//! Archive abstraction the store codec is written against
//!
//! An archive is either packing (encoding) or unpacking (decoding), and is in
//! either persistent or replication mode. The mode is a property of the
//! channel the bytes travel on; nothing in the byte stream records it, so both
//! ends must agree on it out of band.
//!
//! Integers are written as LEB128-style varints, signed values zig-zag encoded
//! first. Floats are 4 little-endian bytes.

use crate::error::ArchiveError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

const CONTINUE_BIT: u8 = 1 << 7;

/// What a store encoding contains
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArchiveMode {
    /// Every pair, for saving and loading
    Persistent,
    /// Only pairs differing from an agreed-upon default store
    Replication,
}

/// Primitive encode/decode surface used by the store codec
pub trait Archive {
    fn is_packing(&self) -> bool;

    fn mode(&self) -> ArchiveMode;

    fn write_varint(&mut self, value: u64) -> Result<(), ArchiveError>;
    fn read_varint(&mut self) -> Result<u64, ArchiveError>;

    fn write_f32(&mut self, value: f32) -> Result<(), ArchiveError>;
    fn read_f32(&mut self) -> Result<f32, ArchiveError>;

    fn write_bool(&mut self, value: bool) -> Result<(), ArchiveError>;
    fn read_bool(&mut self) -> Result<bool, ArchiveError>;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ArchiveError>;
    fn read_bytes(&mut self) -> Result<Vec<u8>, ArchiveError>;

    /// Bytes left to read, if known
    fn remaining(&self) -> Option<usize> {
        None
    }

    fn is_replication(&self) -> bool {
        self.mode() == ArchiveMode::Replication
    }

    fn write_zigzag(&mut self, value: i64) -> Result<(), ArchiveError> {
        self.write_varint(((value << 1) ^ (value >> 63)) as u64)
    }

    fn read_zigzag(&mut self) -> Result<i64, ArchiveError> {
        let raw = self.read_varint()?;
        Ok((raw >> 1) as i64 ^ -((raw & 1) as i64))
    }
}

/// Encoding archive backed by a growable buffer
#[derive(Debug)]
pub struct PackArchive {
    buf: BytesMut,
    mode: ArchiveMode,
}

impl PackArchive {
    pub fn new(mode: ArchiveMode) -> Self {
        Self {
            buf: BytesMut::new(),
            mode,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

impl Archive for PackArchive {
    fn is_packing(&self) -> bool {
        true
    }

    fn mode(&self) -> ArchiveMode {
        self.mode
    }

    fn write_varint(&mut self, mut value: u64) -> Result<(), ArchiveError> {
        loop {
            let mut byte = (value as u8) & !CONTINUE_BIT;
            value >>= 7;
            if value != 0 {
                byte |= CONTINUE_BIT;
            }

            self.buf.put_u8(byte);

            if value == 0 {
                return Ok(());
            }
        }
    }

    fn read_varint(&mut self) -> Result<u64, ArchiveError> {
        Err(ArchiveError::WrongDirection("unpacking"))
    }

    fn write_f32(&mut self, value: f32) -> Result<(), ArchiveError> {
        self.buf.put_f32_le(value);
        Ok(())
    }

    fn read_f32(&mut self) -> Result<f32, ArchiveError> {
        Err(ArchiveError::WrongDirection("unpacking"))
    }

    fn write_bool(&mut self, value: bool) -> Result<(), ArchiveError> {
        self.buf.put_u8(value as u8);
        Ok(())
    }

    fn read_bool(&mut self) -> Result<bool, ArchiveError> {
        Err(ArchiveError::WrongDirection("unpacking"))
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ArchiveError> {
        self.write_varint(bytes.len() as u64)?;
        self.buf.put_slice(bytes);
        Ok(())
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>, ArchiveError> {
        Err(ArchiveError::WrongDirection("unpacking"))
    }
}

/// Decoding archive over any [`Buf`]
#[derive(Debug)]
pub struct UnpackArchive<B> {
    buf: B,
    mode: ArchiveMode,
}

impl<B: Buf> UnpackArchive<B> {
    pub fn new(buf: B, mode: ArchiveMode) -> Self {
        Self { buf, mode }
    }

    pub fn into_inner(self) -> B {
        self.buf
    }

    fn ensure(&self, expected: usize) -> Result<(), ArchiveError> {
        if self.buf.remaining() < expected {
            return Err(ArchiveError::UnexpectedEof {
                expected,
                found: self.buf.remaining(),
            });
        }
        Ok(())
    }
}

impl<B: Buf> Archive for UnpackArchive<B> {
    fn is_packing(&self) -> bool {
        false
    }

    fn mode(&self) -> ArchiveMode {
        self.mode
    }

    fn write_varint(&mut self, _value: u64) -> Result<(), ArchiveError> {
        Err(ArchiveError::WrongDirection("packing"))
    }

    fn read_varint(&mut self) -> Result<u64, ArchiveError> {
        let mut value = 0u64;
        let mut shift = 0;

        loop {
            self.ensure(1)?;
            let byte = self.buf.get_u8();

            let bits = (byte & !CONTINUE_BIT) as u64;
            if shift == 63 && bits > 1 {
                return Err(ArchiveError::VarIntOverflow);
            }
            value |= bits << shift;

            if byte & CONTINUE_BIT == 0 {
                return Ok(value);
            }

            shift += 7;
            if shift > 63 {
                return Err(ArchiveError::VarIntOverflow);
            }
        }
    }

    fn write_f32(&mut self, _value: f32) -> Result<(), ArchiveError> {
        Err(ArchiveError::WrongDirection("packing"))
    }

    fn read_f32(&mut self) -> Result<f32, ArchiveError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32_le())
    }

    fn write_bool(&mut self, _value: bool) -> Result<(), ArchiveError> {
        Err(ArchiveError::WrongDirection("packing"))
    }

    fn read_bool(&mut self) -> Result<bool, ArchiveError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8() != 0)
    }

    fn write_bytes(&mut self, _bytes: &[u8]) -> Result<(), ArchiveError> {
        Err(ArchiveError::WrongDirection("packing"))
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>, ArchiveError> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| ArchiveError::UnexpectedEof {
            expected: usize::MAX,
            found: self.buf.remaining(),
        })?;
        self.ensure(len)?;

        let mut bytes = vec![0; len];
        self.buf.copy_to_slice(&mut bytes);
        Ok(bytes)
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.buf.remaining())
    }
}
