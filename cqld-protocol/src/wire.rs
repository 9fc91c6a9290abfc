//! Wire primitives: big-endian reads over a byte cursor and big-endian
//! writes into a growable body buffer.
//!
//! Every read advances the cursor by exactly the bytes it consumed, and only
//! on success. Length-prefixed readers reject lengths that do not fit the
//! remaining input; length-prefixed writers reject values that do not fit
//! the declared prefix width.

use crate::error::CodecError;
use bytes::{BufMut, BytesMut};
use std::collections::HashMap;

/// Read cursor over a frame body.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.buf.len() < n {
            return Err(CodecError::TruncatedInput {
                needed: n,
                remaining: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16, CodecError> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_be_bytes(raw))
    }

    /// Reads a 2-byte signed length followed by that many bytes of UTF-8.
    pub fn read_string(&mut self) -> Result<&'a str, CodecError> {
        let len = self.read_i16()?;
        if len < 0 {
            return Err(CodecError::MalformedLength(len as i64));
        }
        let raw = self.take(len as usize)?;
        std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Reads a 4-byte signed length followed by that many bytes of UTF-8.
    pub fn read_long_string(&mut self) -> Result<&'a str, CodecError> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(CodecError::MalformedLength(len as i64));
        }
        let raw = self.take(len as usize)?;
        std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Reads a 2-byte count of (string, string) pairs. Duplicate keys are
    /// accepted; the last occurrence wins.
    pub fn read_string_map(&mut self) -> Result<HashMap<String, String>, CodecError> {
        let n = self.read_u16()?;
        let mut map = HashMap::with_capacity(n as usize);
        for _ in 0..n {
            let key = self.read_string()?.to_owned();
            let value = self.read_string()?.to_owned();
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Reads a 2-byte count of strings.
    pub fn read_string_list(&mut self) -> Result<Vec<String>, CodecError> {
        let n = self.read_u16()?;
        let mut list = Vec::with_capacity(n as usize);
        for _ in 0..n {
            list.push(self.read_string()?.to_owned());
        }
        Ok(list)
    }

    /// Reads a 4-byte signed length followed by that many bytes. A negative
    /// length denotes a null value.
    pub fn read_bytes(&mut self) -> Result<Option<&'a [u8]>, CodecError> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(None);
        }
        Ok(Some(self.take(len as usize)?))
    }

    /// Reads a 2-byte signed length followed by that many bytes.
    pub fn read_short_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_i16()?;
        if len < 0 {
            return Err(CodecError::MalformedLength(len as i64));
        }
        self.take(len as usize)
    }

    /// Reads a 2-byte consistency level.
    pub fn read_consistency(&mut self) -> Result<Consistency, CodecError> {
        Consistency::from_wire(self.read_u16()?)
    }
}

/// Consistency levels as they appear on the wire. Their replication
/// semantics belong to the storage layer; only the encoding lives here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum Consistency {
    Any = 0x0000,
    #[default]
    One = 0x0001,
    Two = 0x0002,
    Three = 0x0003,
    Quorum = 0x0004,
    All = 0x0005,
    LocalQuorum = 0x0006,
    EachQuorum = 0x0007,
    Serial = 0x0008,
    LocalSerial = 0x0009,
    LocalOne = 0x000A,
}

impl Consistency {
    pub fn from_wire(value: u16) -> Result<Self, CodecError> {
        match value {
            0x0000 => Ok(Consistency::Any),
            0x0001 => Ok(Consistency::One),
            0x0002 => Ok(Consistency::Two),
            0x0003 => Ok(Consistency::Three),
            0x0004 => Ok(Consistency::Quorum),
            0x0005 => Ok(Consistency::All),
            0x0006 => Ok(Consistency::LocalQuorum),
            0x0007 => Ok(Consistency::EachQuorum),
            0x0008 => Ok(Consistency::Serial),
            0x0009 => Ok(Consistency::LocalSerial),
            0x000A => Ok(Consistency::LocalOne),
            other => Err(CodecError::UnknownConsistency(other)),
        }
    }

    pub fn to_wire(self) -> u16 {
        self as u16
    }
}

pub fn write_u8(buf: &mut BytesMut, v: u8) {
    buf.put_u8(v);
}

pub fn write_u16(buf: &mut BytesMut, v: u16) {
    buf.put_u16(v);
}

pub fn write_i16(buf: &mut BytesMut, v: i16) {
    buf.put_i16(v);
}

pub fn write_u32(buf: &mut BytesMut, v: u32) {
    buf.put_u32(v);
}

pub fn write_i32(buf: &mut BytesMut, v: i32) {
    buf.put_i32(v);
}

pub fn write_u64(buf: &mut BytesMut, v: u64) {
    buf.put_u64(v);
}

/// Writes a 2-byte length prefix followed by the string bytes.
pub fn write_string(buf: &mut BytesMut, s: &str) -> Result<(), CodecError> {
    if s.len() > i16::MAX as usize {
        return Err(CodecError::FieldTooLarge {
            len: s.len(),
            width: 16,
        });
    }
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
    Ok(())
}

/// Writes a 4-byte length prefix followed by the string bytes.
pub fn write_long_string(buf: &mut BytesMut, s: &str) -> Result<(), CodecError> {
    if s.len() > i32::MAX as usize {
        return Err(CodecError::FieldTooLarge {
            len: s.len(),
            width: 32,
        });
    }
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
    Ok(())
}

/// Writes a 2-byte count followed by each string.
pub fn write_string_list(buf: &mut BytesMut, list: &[&str]) -> Result<(), CodecError> {
    if list.len() > i16::MAX as usize {
        return Err(CodecError::FieldTooLarge {
            len: list.len(),
            width: 16,
        });
    }
    buf.put_u16(list.len() as u16);
    for s in list {
        write_string(buf, s)?;
    }
    Ok(())
}

/// Writes a 4-byte length prefix followed by the bytes.
pub fn write_bytes(buf: &mut BytesMut, b: &[u8]) -> Result<(), CodecError> {
    if b.len() > i32::MAX as usize {
        return Err(CodecError::FieldTooLarge {
            len: b.len(),
            width: 32,
        });
    }
    buf.put_u32(b.len() as u32);
    buf.put_slice(b);
    Ok(())
}

/// Writes a 2-byte length prefix followed by the bytes.
pub fn write_short_bytes(buf: &mut BytesMut, b: &[u8]) -> Result<(), CodecError> {
    if b.len() > i16::MAX as usize {
        return Err(CodecError::FieldTooLarge {
            len: b.len(),
            width: 16,
        });
    }
    buf.put_u16(b.len() as u16);
    buf.put_slice(b);
    Ok(())
}

/// Writes a 2-byte count of (string, string) pairs.
pub fn write_string_map(buf: &mut BytesMut, map: &[(&str, &str)]) -> Result<(), CodecError> {
    if map.len() > i16::MAX as usize {
        return Err(CodecError::FieldTooLarge {
            len: map.len(),
            width: 16,
        });
    }
    buf.put_u16(map.len() as u16);
    for &(key, value) in map {
        write_string(buf, key)?;
        write_string(buf, value)?;
    }
    Ok(())
}

/// Writes a multimap as a 2-byte key count, then per key the key string
/// followed by its value list.
///
/// Values are grouped by key; key order is the order in which each key is
/// first seen in `pairs`, and values keep their relative order per key.
pub fn write_string_multimap(buf: &mut BytesMut, pairs: &[(&str, &str)]) -> Result<(), CodecError> {
    let mut keys: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<&str>> = HashMap::new();
    for &(key, value) in pairs {
        grouped
            .entry(key)
            .or_insert_with(|| {
                keys.push(key);
                Vec::new()
            })
            .push(value);
    }
    if keys.len() > i16::MAX as usize {
        return Err(CodecError::FieldTooLarge {
            len: keys.len(),
            width: 16,
        });
    }
    buf.put_u16(keys.len() as u16);
    for key in keys {
        write_string(buf, key)?;
        write_string_list(buf, &grouped[key])?;
    }
    Ok(())
}

pub fn write_consistency(buf: &mut BytesMut, c: Consistency) {
    buf.put_u16(c.to_wire());
}
