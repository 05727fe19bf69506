//! Binary serialization for [`UserRecord`].
//!
//! Format: `[Magic:4][Version:1][FieldCount:1]` then `FieldCount` fields, each
//! `[Tag:1][WireType:1][Payload]`. All integers are little-endian.
//!
//! | Tag | Field | Wire type |
//! |-----|-------|-----------|
//! | 1 | `id` | [`WIRE_U64`] |
//! | 2 | `favorite_numbers` | [`WIRE_U64_LIST`] |
//! | 3 | `favorite_colors` | [`WIRE_STR_LIST`] |
//!
//! Lists are `[Count:u32]` followed by the elements; strings are `[Len:u32][UTF-8]`.
//! Fields are written in ascending tag order. Decoders skip unknown tags whose
//! wire type they understand, so a later format version can add fields without
//! breaking older readers.

use std::str;

use isthmus_types::{BoundaryResult, ErrorEnvelope, UserRecord};
use thiserror::Error;

use crate::boundary;

/// Magic bytes identifying a serialized record.
pub const RECORD_MAGIC: [u8; 4] = *b"ISRC";

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

pub const TAG_ID: u8 = 1;
pub const TAG_FAVORITE_NUMBERS: u8 = 2;
pub const TAG_FAVORITE_COLORS: u8 = 3;

pub const WIRE_U64: u8 = 1;
pub const WIRE_U64_LIST: u8 = 2;
pub const WIRE_STR_LIST: u8 = 3;

const HEADER_SIZE: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("bad magic bytes {0:02x?}")]
    BadMagic([u8; 4]),
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),
    #[error("truncated input: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    #[error("field tag {tag} is out of order")]
    TagOrder { tag: u8 },
    #[error("field tag {tag} has wire type {wire}, expected {expected}")]
    WireMismatch { tag: u8, wire: u8, expected: u8 },
    #[error("unknown wire type {wire} for tag {tag}")]
    UnknownWireType { tag: u8, wire: u8 },
    #[error("missing required field tag {0}")]
    MissingField(u8),
    #[error("string at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),
    #[error("{0} trailing bytes after last field")]
    TrailingBytes(usize),
    #[error("field tag {tag} has length {len}, above the u32 prefix limit")]
    TooLong { tag: u8, len: usize },
}

impl From<CodecError> for ErrorEnvelope {
    fn from(error: CodecError) -> Self {
        match error {
            CodecError::TooLong { .. } => {
                ErrorEnvelope::binding(format!("cannot serialize record: {error}"))
            }
            _ => ErrorEnvelope::binding(format!("cannot deserialize record: {error}")),
        }
    }
}

fn length_prefix(tag: u8, len: usize) -> Result<[u8; 4], CodecError> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .map_err(|_| CodecError::TooLong { tag, len })
}

/// Encode a record; every failure is a `BindingViolation`.
pub fn serialize(record: &UserRecord) -> BoundaryResult<Vec<u8>> {
    encode(record).map_err(|e| boundary::report("serialize", ErrorEnvelope::from(e)))
}

/// Encode a record, keeping the structured [`CodecError`]. Fails only when a
/// list or string is too long for its `u32` length prefix.
pub fn encode(record: &UserRecord) -> Result<Vec<u8>, CodecError> {
    let colors_len: usize = record.favorite_colors.iter().map(|c| 4 + c.len()).sum();
    let mut out = Vec::with_capacity(
        HEADER_SIZE + 10 + 6 + record.favorite_numbers.len() * 8 + 6 + colors_len,
    );

    out.extend_from_slice(&RECORD_MAGIC);
    out.push(FORMAT_VERSION);
    out.push(3);

    out.push(TAG_ID);
    out.push(WIRE_U64);
    out.extend_from_slice(&record.id.to_le_bytes());

    out.push(TAG_FAVORITE_NUMBERS);
    out.push(WIRE_U64_LIST);
    out.extend_from_slice(&length_prefix(
        TAG_FAVORITE_NUMBERS,
        record.favorite_numbers.len(),
    )?);
    for n in &record.favorite_numbers {
        out.extend_from_slice(&n.to_le_bytes());
    }

    out.push(TAG_FAVORITE_COLORS);
    out.push(WIRE_STR_LIST);
    out.extend_from_slice(&length_prefix(
        TAG_FAVORITE_COLORS,
        record.favorite_colors.len(),
    )?);
    for color in &record.favorite_colors {
        out.extend_from_slice(&length_prefix(TAG_FAVORITE_COLORS, color.len())?);
        out.extend_from_slice(color.as_bytes());
    }

    Ok(out)
}

/// Decode a record; every failure is a `BindingViolation`.
pub fn deserialize(bytes: &[u8]) -> BoundaryResult<UserRecord> {
    decode(bytes).map_err(|e| {
        tracing::trace!(len = bytes.len(), "record decode failed");
        boundary::report("deserialize", ErrorEnvelope::from(e))
    })
}

/// Decode a record, keeping the structured [`CodecError`].
pub fn decode(bytes: &[u8]) -> Result<UserRecord, CodecError> {
    let mut reader = Reader::new(bytes);

    let magic: [u8; 4] = reader.array()?;
    if magic != RECORD_MAGIC {
        return Err(CodecError::BadMagic(magic));
    }
    let version = reader.u8()?;
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let field_count = reader.u8()?;

    let mut id = None;
    let mut favorite_numbers = None;
    let mut favorite_colors = None;
    let mut last_tag = 0u8;

    for _ in 0..field_count {
        let tag = reader.u8()?;
        let wire = reader.u8()?;
        if tag <= last_tag {
            return Err(CodecError::TagOrder { tag });
        }
        last_tag = tag;

        let expected = match tag {
            TAG_ID => Some(WIRE_U64),
            TAG_FAVORITE_NUMBERS => Some(WIRE_U64_LIST),
            TAG_FAVORITE_COLORS => Some(WIRE_STR_LIST),
            _ => None,
        };
        if let Some(expected) = expected
            && wire != expected
        {
            return Err(CodecError::WireMismatch {
                tag,
                wire,
                expected,
            });
        }

        match (tag, wire) {
            (TAG_ID, _) => id = Some(reader.u64()?),
            (TAG_FAVORITE_NUMBERS, _) => favorite_numbers = Some(reader.u64_list()?),
            (TAG_FAVORITE_COLORS, _) => favorite_colors = Some(reader.str_list()?),
            (_, WIRE_U64) => {
                reader.u64()?;
            }
            (_, WIRE_U64_LIST) => {
                reader.u64_list()?;
            }
            (_, WIRE_STR_LIST) => {
                reader.str_list()?;
            }
            (tag, wire) => return Err(CodecError::UnknownWireType { tag, wire }),
        }
    }

    if reader.remaining() > 0 {
        return Err(CodecError::TrailingBytes(reader.remaining()));
    }

    Ok(UserRecord {
        id: id.ok_or(CodecError::MissingField(TAG_ID))?,
        favorite_numbers: favorite_numbers.ok_or(CodecError::MissingField(TAG_FAVORITE_NUMBERS))?,
        favorite_colors: favorite_colors.ok_or(CodecError::MissingField(TAG_FAVORITE_COLORS))?,
    })
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < needed {
            return Err(CodecError::Truncated {
                offset: self.offset,
                needed,
            });
        }
        let slice = &self.data[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Read a list count and make sure the input can hold `count` elements of at
    /// least `min_size` bytes, so a corrupt count cannot trigger a huge allocation.
    fn count(&mut self, min_size: usize) -> Result<usize, CodecError> {
        let count = self.u32()? as usize;
        let needed = count.saturating_mul(min_size);
        if needed > self.remaining() {
            return Err(CodecError::Truncated {
                offset: self.offset,
                needed,
            });
        }
        Ok(count)
    }

    fn u64_list(&mut self) -> Result<Vec<u64>, CodecError> {
        let count = self.count(8)?;
        (0..count).map(|_| self.u64()).collect()
    }

    fn str_list(&mut self) -> Result<Vec<String>, CodecError> {
        let count = self.count(4)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let len = self.u32()? as usize;
            let start = self.offset;
            let bytes = self.take(len)?;
            let s = str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8(start))?;
            out.push(s.to_owned());
        }
        Ok(out)
    }
}
