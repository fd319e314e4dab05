// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::MisfitError;
use std::io::{Read, Write};

const INT_BYTES: usize = 4;
const DOUBLE_BYTES: usize = 8;

/// Growable byte buffer with typed little-endian primitives.
///
/// Writes always append at the end; reads consume from an internal cursor
/// that starts at zero. Every read checks the remaining length first and
/// reports truncation as [`MisfitError::MalformedBuffer`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BinaryBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl BinaryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            pos: 0,
        }
    }

    /// Wraps existing bytes for reading, cursor at the start.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn write_int(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a non-negative count or index as `int32`.
    pub fn write_len(&mut self, value: usize) -> Result<(), MisfitError> {
        let value = i32::try_from(value).map_err(|_| {
            MisfitError::invalid_input(format!("value {value} does not fit in an int32 field"))
        })?;
        self.write_int(value);
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) {
        self.data.push(u8::from(value));
    }

    pub fn write_string(&mut self, value: &str) -> Result<(), MisfitError> {
        self.write_len(value.len())?;
        self.data.extend_from_slice(value.as_bytes());
        Ok(())
    }

    pub fn write_double(&mut self, value: f64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a length prefix followed by every value in order.
    pub fn write_doubles(&mut self, values: &[f64]) -> Result<(), MisfitError> {
        self.write_len(values.len())?;
        self.data.reserve(values.len() * DOUBLE_BYTES);
        for value in values {
            self.write_double(*value);
        }
        Ok(())
    }

    fn take(&mut self, count: usize, what: &str) -> Result<&[u8], MisfitError> {
        if self.remaining() < count {
            return Err(MisfitError::malformed_buffer(format!(
                "truncated {what} at offset {}: need {count} bytes, {} remaining",
                self.pos,
                self.remaining()
            )));
        }
        let start = self.pos;
        self.pos += count;
        Ok(&self.data[start..self.pos])
    }

    pub fn read_int(&mut self) -> Result<i32, MisfitError> {
        let bytes = self.take(INT_BYTES, "int32")?;
        let mut raw = [0_u8; INT_BYTES];
        raw.copy_from_slice(bytes);
        Ok(i32::from_le_bytes(raw))
    }

    /// Reads an `int32` that must be a non-negative count or index.
    pub fn read_len(&mut self, what: &str) -> Result<usize, MisfitError> {
        let offset = self.pos;
        let value = self.read_int()?;
        usize::try_from(value).map_err(|_| {
            MisfitError::malformed_buffer(format!(
                "negative {what}={value} at offset {offset}"
            ))
        })
    }

    pub fn read_bool(&mut self) -> Result<bool, MisfitError> {
        let offset = self.pos;
        match self.take(1, "bool")?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(MisfitError::malformed_buffer(format!(
                "bool at offset {offset} must be 0 or 1; got {other}"
            ))),
        }
    }

    pub fn read_string(&mut self) -> Result<String, MisfitError> {
        let len = self.read_len("string length")?;
        let offset = self.pos;
        let bytes = self.take(len, "string")?.to_vec();
        String::from_utf8(bytes).map_err(|err| {
            MisfitError::malformed_buffer(format!("string at offset {offset} is not UTF-8: {err}"))
        })
    }

    pub fn read_double(&mut self) -> Result<f64, MisfitError> {
        let bytes = self.take(DOUBLE_BYTES, "double")?;
        let mut raw = [0_u8; DOUBLE_BYTES];
        raw.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(raw))
    }

    pub fn read_doubles(&mut self) -> Result<Vec<f64>, MisfitError> {
        let len = self.read_len("double sequence length")?;
        let needed = len.checked_mul(DOUBLE_BYTES).ok_or_else(|| {
            MisfitError::malformed_buffer(format!("double sequence length {len} overflows"))
        })?;
        if self.remaining() < needed {
            return Err(MisfitError::malformed_buffer(format!(
                "truncated double sequence at offset {}: need {needed} bytes, {} remaining",
                self.pos,
                self.remaining()
            )));
        }
        (0..len).map(|_| self.read_double()).collect()
    }

    /// Writes the whole buffer content to `stream`.
    pub fn stream_write<W: Write>(&self, stream: &mut W) -> Result<(), MisfitError> {
        stream
            .write_all(&self.data)
            .and_then(|()| stream.flush())
            .map_err(|err| MisfitError::storage_write(format!("buffer stream write failed: {err}")))
    }

    /// Reads `stream` to its end into a fresh buffer.
    pub fn stream_read<R: Read>(stream: &mut R) -> Result<Self, MisfitError> {
        let mut data = Vec::new();
        stream
            .read_to_end(&mut data)
            .map_err(|err| MisfitError::storage_read(format!("buffer stream read failed: {err}")))?;
        Ok(Self::from_bytes(data))
    }
}
