//! Streaming file digests
//!
//! SHA-256 identifies whole files (baselines, targets, patch artifacts);
//! SHA-1 identifies fixed-size blocks inside the opatch builder. Files are
//! read in 1 MiB chunks so memory stays bounded regardless of APK size.

use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Chunk size for streaming file reads
pub const READ_CHUNK_BYTES: usize = 1024 * 1024;

/// Compute the SHA-256 digest of a file
pub fn sha256_file(path: &Path) -> io::Result<[u8; 32]> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

/// Compute the SHA-256 digest of a file as lowercase hex
pub fn sha256_hex_file(path: &Path) -> io::Result<String> {
    Ok(hex::encode(sha256_file(path)?))
}

/// Compute the SHA-1 digest of an in-memory block
pub fn sha1_block(block: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(block);
    hasher.finalize().into()
}

/// Incremental SHA-256 over written chunks
///
/// Used by appliers that stream output to disk and need the digest of what
/// they wrote without re-reading the file.
#[derive(Default)]
pub struct Sha256Writer {
    hasher: Sha256,
    written: u64,
}

impl Sha256Writer {
    /// Create an empty digest state
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb a chunk
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.written += chunk.len() as u64;
    }

    /// Total bytes absorbed so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Finish and return the digest
    pub fn finalize(self) -> [u8; 32] {
        self.hasher.finalize().into()
    }
}

/// Write adapter that feeds every byte through a SHA-256 state
///
/// Appliers stream their output through this so the final size and digest
/// checks never have to re-read the file they just wrote.
pub struct Sha256TeeWriter<W: io::Write> {
    inner: W,
    digest: Sha256Writer,
}

impl<W: io::Write> Sha256TeeWriter<W> {
    /// Wrap a writer
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            digest: Sha256Writer::new(),
        }
    }

    /// Unwrap, returning the writer, bytes written, and final digest
    pub fn finish(self) -> (W, u64, [u8; 32]) {
        let written = self.digest.written();
        (self.inner, written, self.digest.finalize())
    }
}

impl<W: io::Write> io::Write for Sha256TeeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.digest.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
