//! The bidirectional binary (de)serialization helper.
//!
//! A [`Translator`] wraps either a write buffer or a read cursor and exposes
//! primitive encode/decode operations (`bool`, `byte`, `short`, `int`,
//! `long`, `double`, null-aware strings, raw byte blobs) plus generic
//! helpers for composite values, arrays, and dictionaries.
//!
//! Composite types implement [`Translatable`]. Unlike a single symmetric
//! `translate(translator)` method that mutates a parameterless-constructed
//! instance in place, `Translatable` splits into [`Translatable::write_to`]
//! (borrows `&self`) and [`Translatable::read_from`] (constructs a fresh
//! value) — Rust has no universal default-construct-then-populate idiom, and
//! most types here (e.g. [`buildmux_core::BuildRequestConfiguration`]) have
//! no [`Default`] impl. `Translator` itself still carries the read/write
//! direction, exactly as the single-method form would.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Either a write buffer being appended to, or a read cursor being consumed.
pub enum Translator<'a> {
    /// Encoding: primitives are appended to this buffer.
    Writing(&'a mut Vec<u8>),
    /// Decoding: primitives are consumed from this cursor.
    Reading(Cursor<&'a [u8]>),
}

impl<'a> Translator<'a> {
    /// A translator that writes into `buffer`.
    #[must_use]
    pub fn writer(buffer: &'a mut Vec<u8>) -> Self {
        Self::Writing(buffer)
    }

    /// A translator that reads from `bytes`.
    #[must_use]
    pub fn reader(bytes: &'a [u8]) -> Self {
        Self::Reading(Cursor::new(bytes))
    }

    /// Whether this translator is encoding.
    #[must_use]
    pub fn is_writing(&self) -> bool {
        matches!(self, Self::Writing(_))
    }

    /// Whether this translator is decoding.
    #[must_use]
    pub fn is_reading(&self) -> bool {
        !self.is_writing()
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        match self {
            Self::Writing(buf) => buf.write_u8(value).map_err(Error::from),
            Self::Reading(_) => Err(Error::malformed("write_u8 called on a reading translator")),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        match self {
            Self::Reading(cursor) => cursor.read_u8().map_err(Error::from),
            Self::Writing(_) => Err(Error::malformed("read_u8 called on a writing translator")),
        }
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        match self {
            Self::Writing(buf) => buf.write_u16::<BigEndian>(value).map_err(Error::from),
            Self::Reading(_) => Err(Error::malformed("write_u16 called on a reading translator")),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        match self {
            Self::Reading(cursor) => cursor.read_u16::<BigEndian>().map_err(Error::from),
            Self::Writing(_) => Err(Error::malformed("read_u16 called on a writing translator")),
        }
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        match self {
            Self::Writing(buf) => buf.write_i32::<BigEndian>(value).map_err(Error::from),
            Self::Reading(_) => Err(Error::malformed("write_i32 called on a reading translator")),
        }
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        match self {
            Self::Reading(cursor) => cursor.read_i32::<BigEndian>().map_err(Error::from),
            Self::Writing(_) => Err(Error::malformed("read_i32 called on a writing translator")),
        }
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        match self {
            Self::Writing(buf) => buf.write_u32::<BigEndian>(value).map_err(Error::from),
            Self::Reading(_) => Err(Error::malformed("write_u32 called on a reading translator")),
        }
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        match self {
            Self::Reading(cursor) => cursor.read_u32::<BigEndian>().map_err(Error::from),
            Self::Writing(_) => Err(Error::malformed("read_u32 called on a writing translator")),
        }
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        match self {
            Self::Writing(buf) => buf.write_i64::<BigEndian>(value).map_err(Error::from),
            Self::Reading(_) => Err(Error::malformed("write_i64 called on a reading translator")),
        }
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        match self {
            Self::Reading(cursor) => cursor.read_i64::<BigEndian>().map_err(Error::from),
            Self::Writing(_) => Err(Error::malformed("read_i64 called on a writing translator")),
        }
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        match self {
            Self::Writing(buf) => buf.write_u64::<BigEndian>(value).map_err(Error::from),
            Self::Reading(_) => Err(Error::malformed("write_u64 called on a reading translator")),
        }
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        match self {
            Self::Reading(cursor) => cursor.read_u64::<BigEndian>().map_err(Error::from),
            Self::Writing(_) => Err(Error::malformed("read_u64 called on a writing translator")),
        }
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        match self {
            Self::Writing(buf) => buf.write_f64::<BigEndian>(value).map_err(Error::from),
            Self::Reading(_) => Err(Error::malformed("write_f64 called on a reading translator")),
        }
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        match self {
            Self::Reading(cursor) => cursor.read_f64::<BigEndian>().map_err(Error::from),
            Self::Writing(_) => Err(Error::malformed("read_f64 called on a writing translator")),
        }
    }

    /// Write a length-prefixed, raw byte blob.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.write_u32(u32::try_from(value.len()).unwrap_or(u32::MAX))?;
        match self {
            Self::Writing(buf) => {
                buf.extend_from_slice(value);
                Ok(())
            }
            Self::Reading(_) => Err(Error::malformed("write_bytes called on a reading translator")),
        }
    }

    /// Read a length-prefixed, raw byte blob.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32()? as usize;
        match self {
            Self::Reading(cursor) => {
                let mut buf = vec![0u8; len];
                std::io::Read::read_exact(cursor, &mut buf).map_err(Error::from)?;
                Ok(buf)
            }
            Self::Writing(_) => Err(Error::malformed("read_bytes called on a writing translator")),
        }
    }

    /// Write a non-null string (UTF-8, length-prefixed).
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Read a non-null string.
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| Error::malformed(format!("invalid utf-8 string: {e}")))
    }

    /// Write a null-aware string: a presence flag, then the string if present.
    pub fn write_opt_string(&mut self, value: Option<&str>) -> Result<()> {
        self.write_bool(value.is_some())?;
        if let Some(value) = value {
            self.write_string(value)?;
        }
        Ok(())
    }

    /// Read a null-aware string.
    pub fn read_opt_string(&mut self) -> Result<Option<String>> {
        if self.read_bool()? {
            Ok(Some(self.read_string()?))
        } else {
            Ok(None)
        }
    }

    /// Write a [`Translatable`] value.
    pub fn write<T: Translatable>(&mut self, value: &T) -> Result<()> {
        value.write_to(self)
    }

    /// Read a [`Translatable`] value.
    pub fn read<T: Translatable>(&mut self) -> Result<T> {
        T::read_from(self)
    }

    /// Write an array of [`Translatable`] values.
    pub fn write_vec<T: Translatable>(&mut self, values: &[T]) -> Result<()> {
        self.write_u32(u32::try_from(values.len()).unwrap_or(u32::MAX))?;
        for value in values {
            self.write(value)?;
        }
        Ok(())
    }

    /// Read an array of [`Translatable`] values.
    pub fn read_vec<T: Translatable>(&mut self) -> Result<Vec<T>> {
        let len = self.read_u32()?;
        (0..len).map(|_| self.read()).collect()
    }

    /// Write a list of plain strings.
    pub fn write_string_vec(&mut self, values: &[String]) -> Result<()> {
        self.write_u32(u32::try_from(values.len()).unwrap_or(u32::MAX))?;
        for value in values {
            self.write_string(value)?;
        }
        Ok(())
    }

    /// Read a list of plain strings.
    pub fn read_string_vec(&mut self) -> Result<Vec<String>> {
        let len = self.read_u32()?;
        (0..len).map(|_| self.read_string()).collect()
    }

    /// Write an ordered name/value pair list (e.g. task parameters).
    pub fn write_string_pairs(&mut self, values: &[(String, String)]) -> Result<()> {
        self.write_u32(u32::try_from(values.len()).unwrap_or(u32::MAX))?;
        for (key, value) in values {
            self.write_string(key)?;
            self.write_string(value)?;
        }
        Ok(())
    }

    /// Read an ordered name/value pair list.
    pub fn read_string_pairs(&mut self) -> Result<Vec<(String, String)>> {
        let len = self.read_u32()?;
        (0..len)
            .map(|_| Ok((self.read_string()?, self.read_string()?)))
            .collect()
    }

    /// Write a string-keyed dictionary in key order (the `BTreeMap` iteration
    /// order stands in for the teacher's "named comparer" dictionaries: a
    /// fixed, reproducible ordering rather than hash-bucket order).
    pub fn write_string_map(&mut self, map: &std::collections::BTreeMap<String, String>) -> Result<()> {
        self.write_string_pairs(&map.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Vec<_>>())
    }

    /// Read a string-keyed dictionary.
    pub fn read_string_map(&mut self) -> Result<std::collections::BTreeMap<String, String>> {
        Ok(self.read_string_pairs()?.into_iter().collect())
    }

    /// Write an optional [`Translatable`] value.
    pub fn write_opt<T: Translatable>(&mut self, value: Option<&T>) -> Result<()> {
        self.write_bool(value.is_some())?;
        if let Some(value) = value {
            self.write(value)?;
        }
        Ok(())
    }

    /// Read an optional [`Translatable`] value.
    pub fn read_opt<T: Translatable>(&mut self) -> Result<Option<T>> {
        if self.read_bool()? {
            Ok(Some(self.read()?))
        } else {
            Ok(None)
        }
    }
}

/// A type that knows how to serialize and deserialize itself through a
/// [`Translator`].
pub trait Translatable: Sized {
    /// Append this value's encoding to `translator` (which must be
    /// [`Translator::Writing`]).
    fn write_to(&self, translator: &mut Translator<'_>) -> Result<()>;

    /// Decode a value from `translator` (which must be
    /// [`Translator::Reading`]).
    fn read_from(translator: &mut Translator<'_>) -> Result<Self>;
}
