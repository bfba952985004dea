//! Little-endian snapshot codec.
//!
//! Every on-disk and snapshot structure is written through [`SnapshotWriter`]
//! and read back with [`SnapshotReader`]:
//!
//! - `int`: 4 bytes, little endian
//! - `int64` / hash code: 8 bytes, little endian
//! - `char`: 1 byte
//! - byte blob / string: `int` length followed by the bytes
//! - int array: `int` length followed by the ints

use crate::error::CodecError;

/// Append-only byte buffer for snapshots.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SnapshotWriter {
    buf: Vec<u8>,
}

impl SnapshotWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_int(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_int64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_char(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    /// Length-prefixed byte blob.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_int(bytes.len() as i32);
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_string(&mut self, s: &str) {
        self.put_bytes(s.as_bytes());
    }

    pub fn put_ints(&mut self, values: &[i32]) {
        self.put_int(values.len() as i32);
        for &v in values {
            self.put_int(v);
        }
    }

    /// Raw bytes without a length prefix.
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over snapshot bytes.
#[derive(Debug, Clone)]
pub struct SnapshotReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SnapshotReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let available = self.data.len() - self.pos;
        if n > available {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: n,
                available,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn get_int(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn get_int64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub fn get_char(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.get_char()? != 0)
    }

    /// Reads an `int` length and checks it is non-negative.
    pub fn get_len(&mut self) -> Result<usize, CodecError> {
        let n = self.get_int()?;
        if n < 0 {
            return Err(CodecError::NegativeLength(n));
        }
        Ok(n as usize)
    }

    pub fn get_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let n = self.get_len()?;
        Ok(self.take(n)?.to_vec())
    }

    pub fn get_string(&mut self) -> Result<String, CodecError> {
        String::from_utf8(self.get_bytes()?).map_err(|_| CodecError::InvalidString)
    }

    pub fn get_ints(&mut self) -> Result<Vec<i32>, CodecError> {
        let n = self.get_len()?;
        (0..n).map(|_| self.get_int()).collect()
    }

    /// Raw bytes without a length prefix.
    pub fn get_raw(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        self.take(n)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_layout_is_little_endian() {
        let mut w = SnapshotWriter::new();
        w.put_int(0x0102_0304);
        assert_eq!(w.as_bytes(), &[4, 3, 2, 1]);
    }

    #[test]
    fn test_negative_values() {
        let mut w = SnapshotWriter::new();
        w.put_int(-2);
        w.put_int64(-1_448_047_776_469_843);
        let bytes = w.into_bytes();
        assert_eq!(&bytes[..4], &[0xFE, 0xFF, 0xFF, 0xFF]);
        let mut r = SnapshotReader::new(&bytes);
        assert_eq!(r.get_int().unwrap(), -2);
        assert_eq!(r.get_int64().unwrap(), -1_448_047_776_469_843);
        assert!(r.is_empty());
    }

    #[test]
    fn test_mixed_sequence() {
        let mut w = SnapshotWriter::new();
        w.put_char(b'X');
        w.put_bytes(&[9, 8, 7]);
        w.put_string("kombilo");
        w.put_ints(&[1, -1, 65536]);
        w.put_bool(true);
        let bytes = w.into_bytes();

        let mut r = SnapshotReader::new(&bytes);
        assert_eq!(r.get_char().unwrap(), b'X');
        assert_eq!(r.get_bytes().unwrap(), vec![9, 8, 7]);
        assert_eq!(r.get_string().unwrap(), "kombilo");
        assert_eq!(r.get_ints().unwrap(), vec![1, -1, 65536]);
        assert!(r.get_bool().unwrap());
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_truncated_input() {
        let mut r = SnapshotReader::new(&[1, 2, 3]);
        assert_eq!(
            r.get_int(),
            Err(CodecError::Truncated {
                offset: 0,
                needed: 4,
                available: 3
            })
        );
    }

    #[test]
    fn test_blob_length_beyond_data() {
        let mut w = SnapshotWriter::new();
        w.put_int(10);
        w.put_raw(&[1, 2]);
        let bytes = w.into_bytes();
        let mut r = SnapshotReader::new(&bytes);
        assert!(matches!(r.get_bytes(), Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn test_negative_length_rejected() {
        let mut w = SnapshotWriter::new();
        w.put_int(-5);
        let bytes = w.into_bytes();
        let mut r = SnapshotReader::new(&bytes);
        assert_eq!(r.get_bytes(), Err(CodecError::NegativeLength(-5)));
    }
}
