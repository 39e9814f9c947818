//! # Positioned File I/O
//!
//! The only place the block log touches raw file handles.
//!
//! Positioned reads and writes either transfer the full length or fail.
//! Short transfers and `EINTR` from the OS are retried here, advancing the
//! buffer and offset, and never reach the caller.

use std::fs::File;
use std::io::{self, ErrorKind};

#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(windows)]
use std::os::windows::fs::FileExt;

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    file.seek_read(buf, offset)
}

#[cfg(unix)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    file.write_at(buf, offset)
}

#[cfg(windows)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    file.seek_write(buf, offset)
}

/// Fill `buf` from `file` starting at `offset`.
///
/// Fails with `UnexpectedEof` if the file ends before `buf` is full.
pub fn pread_with_retry(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    while !buf.is_empty() {
        match read_at(file, buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("file ended at offset {offset} with {} bytes unread", buf.len()),
                ));
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Write all of `buf` to `file` starting at `offset`.
pub fn pwrite_with_retry(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    while !buf.is_empty() {
        match write_at(file, buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    format!("wrote 0 bytes at offset {offset}"),
                ));
            }
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Read exactly `size` bytes at `offset` into a new buffer.
pub fn read_bytes(file: &File, offset: u64, size: u64) -> io::Result<Vec<u8>> {
    let len = usize::try_from(size)
        .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "read size exceeds address space"))?;
    let mut buf = vec![0u8; len];
    pread_with_retry(file, &mut buf, offset)?;
    Ok(buf)
}

/// Read a little-endian `u64` at `offset`.
pub fn read_u64(file: &File, offset: u64) -> io::Result<u64> {
    let mut raw = [0u8; 8];
    pread_with_retry(file, &mut raw, offset)?;
    Ok(u64::from_le_bytes(raw))
}

/// Current size of `file` in bytes.
pub fn file_size(file: &File) -> io::Result<u64> {
    Ok(file.metadata()?.len())
}

/// Sequential reader over `[offset, end)` of a file.
///
/// Uses positioned reads, so it never moves the handle's cursor and can run
/// alongside positioned writes on the same handle.
#[derive(Debug)]
pub struct PositionedReader<'a> {
    file: &'a File,
    offset: u64,
    end: u64,
}

impl<'a> PositionedReader<'a> {
    /// Read from `offset` up to (not including) `end`.
    pub fn new(file: &'a File, offset: u64, end: u64) -> Self {
        Self { file, offset, end }
    }

    /// Offset of the next byte to be read from the file.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl io::Read for PositionedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.offset >= self.end {
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(self.end - self.offset).unwrap_or(usize::MAX));
        loop {
            match read_at(self.file, &mut buf[..want], self.offset) {
                Ok(n) => {
                    self.offset += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}
