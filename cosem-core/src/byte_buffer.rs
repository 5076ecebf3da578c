//! Growable byte cursor used by every codec in the stack
//!
//! A `ByteBuffer` keeps a read `position` and a logical `size`. Reads never
//! move past `size`; a short read fails with [`DlmsError::NotEnoughData`] and
//! leaves `position` untouched so the caller can retry after appending more
//! bytes. Writes always append at `size` and grow the storage.

use crate::error::{DlmsError, DlmsResult};
use std::fmt;

/// Largest value that still fits in the one-byte object-count form
const SHORT_COUNT_MAX: usize = 0x80;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    data: Vec<u8>,
    position: usize,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            position: 0,
        }
    }

    /// Create a buffer holding a copy of `bytes`, positioned at the start.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the read cursor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if `position` is beyond the logical end.
    pub fn set_position(&mut self, position: usize) -> DlmsResult<()> {
        if position > self.data.len() {
            return Err(DlmsError::InvalidData(format!(
                "Position {} is beyond buffer size {}",
                position,
                self.data.len()
            )));
        }
        self.position = position;
        Ok(())
    }

    /// Logical end of the buffer
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Shrink or extend the logical end. New bytes are zero.
    pub fn set_size(&mut self, size: usize) {
        self.data.resize(size, 0);
        if self.position > size {
            self.position = size;
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Bytes between `position` and `size`
    pub fn available(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.position = 0;
    }

    /// Whole logical content, ignoring the read cursor
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Unread content
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.position..]
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Drop the consumed bytes and reset the cursor to zero.
    pub fn trim(&mut self) {
        if self.position == self.data.len() {
            self.data.clear();
        } else if self.position != 0 {
            self.data.drain(..self.position);
        }
        self.position = 0;
    }

    /// Move `count` bytes starting at `src` to the front of the buffer and
    /// make them the whole content.
    pub fn move_to_start(&mut self, src: usize, count: usize) -> DlmsResult<()> {
        let end = src
            .checked_add(count)
            .filter(|end| *end <= self.data.len())
            .ok_or(DlmsError::NotEnoughData {
                needed: src.saturating_add(count),
                available: self.data.len(),
            })?;
        self.data.copy_within(src..end, 0);
        self.data.truncate(count);
        self.position = 0;
        Ok(())
    }

    fn ensure(&self, width: usize) -> DlmsResult<()> {
        let available = self.available();
        if available < width {
            return Err(DlmsError::NotEnoughData {
                needed: width,
                available,
            });
        }
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> DlmsResult<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.position..self.position + N]);
        self.position += N;
        Ok(out)
    }

    pub fn get_u8(&mut self) -> DlmsResult<u8> {
        Ok(self.take::<1>()?[0])
    }

    /// Read a byte at `index` without moving the cursor.
    pub fn get_u8_at(&self, index: usize) -> DlmsResult<u8> {
        self.data
            .get(index)
            .copied()
            .ok_or(DlmsError::NotEnoughData {
                needed: index + 1,
                available: self.data.len(),
            })
    }

    pub fn get_u16(&mut self) -> DlmsResult<u16> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    pub fn get_u16_at(&self, index: usize) -> DlmsResult<u16> {
        if index + 2 > self.data.len() {
            return Err(DlmsError::NotEnoughData {
                needed: index + 2,
                available: self.data.len(),
            });
        }
        Ok(u16::from_be_bytes([self.data[index], self.data[index + 1]]))
    }

    pub fn get_u32(&mut self) -> DlmsResult<u32> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    pub fn get_u64(&mut self) -> DlmsResult<u64> {
        Ok(u64::from_be_bytes(self.take()?))
    }

    pub fn get_i8(&mut self) -> DlmsResult<i8> {
        Ok(i8::from_be_bytes(self.take()?))
    }

    pub fn get_i16(&mut self) -> DlmsResult<i16> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    pub fn get_i32(&mut self) -> DlmsResult<i32> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    pub fn get_i64(&mut self) -> DlmsResult<i64> {
        Ok(i64::from_be_bytes(self.take()?))
    }

    pub fn get_f32(&mut self) -> DlmsResult<f32> {
        Ok(f32::from_be_bytes(self.take()?))
    }

    pub fn get_f64(&mut self) -> DlmsResult<f64> {
        Ok(f64::from_be_bytes(self.take()?))
    }

    /// Fill `dst` from the buffer.
    pub fn get(&mut self, dst: &mut [u8]) -> DlmsResult<()> {
        self.ensure(dst.len())?;
        dst.copy_from_slice(&self.data[self.position..self.position + dst.len()]);
        self.position += dst.len();
        Ok(())
    }

    /// Read `len` bytes into a new vector.
    pub fn get_slice(&mut self, len: usize) -> DlmsResult<Vec<u8>> {
        self.ensure(len)?;
        let out = self.data[self.position..self.position + len].to_vec();
        self.position += len;
        Ok(out)
    }

    /// Read `len` bytes as an ASCII string. Non-ASCII bytes are replaced.
    pub fn get_string(&mut self, len: usize) -> DlmsResult<String> {
        let bytes = self.get_slice(len)?;
        Ok(bytes
            .into_iter()
            .map(|b| if b.is_ascii() { b as char } else { '?' })
            .collect())
    }

    /// Read `len` bytes as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` for malformed UTF-8; the cursor is left at the
    /// start of the string in that case.
    pub fn get_utf8_string(&mut self, len: usize) -> DlmsResult<String> {
        self.ensure(len)?;
        let text = std::str::from_utf8(&self.data[self.position..self.position + len])
            .map_err(|e| DlmsError::InvalidData(format!("Invalid UTF-8 string: {}", e)))?
            .to_string();
        self.position += len;
        Ok(text)
    }

    /// Read a variable-length object count.
    ///
    /// A first byte below `0x80` is the count itself; `0x81`, `0x82` and
    /// `0x84` announce a 1, 2 or 4 byte big-endian count.
    ///
    /// # Errors
    ///
    /// * `NotEnoughData` if the count is truncated (cursor is not moved)
    /// * `InvalidData("Invalid count")` for any other marker byte
    pub fn get_object_count(&mut self) -> DlmsResult<usize> {
        let start = self.position;
        let marker = self.get_u8()?;
        let result = match marker {
            0x00..=0x80 => return Ok(marker as usize),
            0x81 => self.get_u8().map(|v| v as usize),
            0x82 => self.get_u16().map(|v| v as usize),
            0x84 => self.get_u32().map(|v| v as usize),
            _ => {
                self.position = start;
                return Err(DlmsError::InvalidData("Invalid count".to_string()));
            }
        };
        if result.is_err() {
            self.position = start;
        }
        result
    }

    pub fn set_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Overwrite the byte at `index`, extending the buffer if needed.
    pub fn set_u8_at(&mut self, index: usize, value: u8) {
        if index >= self.data.len() {
            self.data.resize(index + 1, 0);
        }
        self.data[index] = value;
    }

    pub fn set_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Overwrite two bytes at `index`, extending the buffer if needed.
    pub fn set_u16_at(&mut self, index: usize, value: u16) {
        if index + 2 > self.data.len() {
            self.data.resize(index + 2, 0);
        }
        self.data[index..index + 2].copy_from_slice(&value.to_be_bytes());
    }

    pub fn set_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn set_u64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn set_i8(&mut self, value: i8) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn set_i16(&mut self, value: i16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn set_i32(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn set_i64(&mut self, value: i64) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn set_f32(&mut self, value: f32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn set_f64(&mut self, value: f64) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn set_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Insert `bytes` at `index`, shifting the tail.
    pub fn insert_slice(&mut self, index: usize, bytes: &[u8]) {
        let index = index.min(self.data.len());
        self.data.splice(index..index, bytes.iter().copied());
    }

    /// Append the unread part of `other` and mark it consumed.
    pub fn set_buffer(&mut self, other: &mut ByteBuffer) {
        self.data.extend_from_slice(other.remaining());
        other.position = other.data.len();
    }

    /// Append a variable-length object count.
    pub fn set_object_count(&mut self, count: usize) {
        if count < SHORT_COUNT_MAX {
            self.set_u8(count as u8);
        } else if count < 0x100 {
            self.set_u8(0x81);
            self.set_u8(count as u8);
        } else if count < 0x10000 {
            self.set_u8(0x82);
            self.set_u16(count as u16);
        } else {
            self.set_u8(0x84);
            self.set_u32(count as u32);
        }
    }

    /// Number of bytes `set_object_count(count)` writes.
    pub fn object_count_size(count: usize) -> usize {
        if count < SHORT_COUNT_MAX {
            1
        } else if count < 0x100 {
            2
        } else if count < 0x10000 {
            3
        } else {
            5
        }
    }

    /// Compare the unread bytes with `expected` and consume them on a match.
    pub fn compare(&mut self, expected: &[u8]) -> bool {
        if self.remaining().starts_with(expected) {
            self.position += expected.len();
            true
        } else {
            false
        }
    }

    /// Space separated upper-case hex of the whole content
    pub fn to_hex(&self) -> String {
        to_hex(&self.data)
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(data: &[u8]) -> Self {
        Self::from_slice(data)
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl PartialEq<[u8]> for ByteBuffer {
    fn eq(&self, other: &[u8]) -> bool {
        self.data == other
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteBuffer[{}/{}] {}", self.position, self.data.len(), self.to_hex())
    }
}

impl fmt::Display for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Render bytes as space separated upper-case hex.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse hex text. Spaces are ignored.
///
/// # Errors
///
/// Returns `InvalidData` for odd digit counts or non-hex characters.
pub fn from_hex(text: &str) -> DlmsResult<Vec<u8>> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(DlmsError::InvalidData(format!("Odd hex length: {}", text)));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair)
                .map_err(|_| DlmsError::InvalidData(format!("Invalid hex: {}", text)))?;
            u8::from_str_radix(s, 16)
                .map_err(|_| DlmsError::InvalidData(format!("Invalid hex: {}", text)))
        })
        .collect()
}
