//! An owned, in-memory BLOB handle usable as a statement parameter or a
//! result-set value.
//!
//! The C++ original ties a BLOB handle to a save-back-on-drop streaming
//! API backed by the live wire connection; with no MySQL/PostgreSQL wire
//! protocol in scope here, a `Blob` is simply an owned byte buffer with a
//! cursor, which is all `dbc-relational`'s mock engine needs to round-trip.

use std::io::{self, Read, Write};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    data: Vec<u8>,
    position: usize,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Blob { data, position: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for Blob {
    fn from(data: Vec<u8>) -> Self {
        Blob::new(data)
    }
}

impl Read for Blob {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.position.min(self.data.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }
}

impl Write for Blob {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
