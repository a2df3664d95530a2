//! In-memory byte cursor the dialect readers consume.
//!
//! A [`ReadBuffer`] owns the bytes of one unit of the logical stream. Offsets
//! reported in errors and diagnostics are relative to the start of the unit.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use crate::error::FormatResult;

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Default)]
pub struct ReadBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl ReadBuffer {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    pub fn from_reader<R: Read>(mut reader: R) -> FormatResult<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self::new(data))
    }

    pub fn from_path(path: &Path) -> FormatResult<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves the cursor to an absolute offset, clamped to the end of input.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn byte_at(&self, pos: usize) -> Option<u8> {
        self.data.get(pos).copied()
    }

    pub fn advance(&mut self, count: usize) {
        self.seek(self.pos + count);
    }

    pub fn next_byte(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    pub fn starts_with(&self, token: &[u8]) -> bool {
        self.remaining().starts_with(token)
    }

    pub fn starts_with_at(&self, pos: usize, token: &[u8]) -> bool {
        self.data.get(pos..).is_some_and(|rest| rest.starts_with(token))
    }

    /// Consumes `token` if the remaining input begins with it.
    pub fn check_token(&mut self, token: &[u8]) -> bool {
        if self.starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    pub fn skip_bom_if_exists(&mut self) -> bool {
        self.check_token(UTF8_BOM)
    }

    pub fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    /// Up to `limit` bytes from `pos`, lossily decoded, for error messages.
    pub fn snippet(&self, pos: usize, limit: usize) -> String {
        let start = pos.min(self.data.len());
        let end = (start + limit).min(self.data.len());
        String::from_utf8_lossy(&self.data[start..end]).into_owned()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_bom_only_consumes_marker() {
        let mut buffer = ReadBuffer::new(b"\xEF\xBB\xBFid".to_vec());
        assert!(buffer.skip_bom_if_exists());
        assert_eq!(buffer.remaining(), b"id");
        assert!(!buffer.skip_bom_if_exists());
        assert_eq!(buffer.position(), 3);
    }

    #[test]
    fn check_token_is_all_or_nothing() {
        let mut buffer = ReadBuffer::new("<<row>>");
        assert!(!buffer.check_token(b"<<x"));
        assert_eq!(buffer.position(), 0);
        assert!(buffer.check_token(b"<<"));
        assert_eq!(buffer.remaining(), b"row>>");
    }

    #[test]
    fn seek_clamps_to_end() {
        let mut buffer = ReadBuffer::new("abc");
        buffer.seek(10);
        assert!(buffer.eof());
        assert_eq!(buffer.snippet(1, 5), "bc");
    }
}
