//! opatch header read/write

use super::error::{OpatchError, OpatchResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// `OPATCH1\0`
pub const MAGIC: [u8; 8] = *b"OPATCH1\0";

/// Fixed header that follows the magic, plus the two file digests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpatchHeader {
    /// Block granularity the patch was built with
    pub block_size: u32,
    /// Baseline size in bytes
    pub old_size: u64,
    /// Target size in bytes
    pub new_size: u64,
    /// SHA-256 of the baseline
    pub base_sha256: [u8; 32],
    /// SHA-256 of the target
    pub target_sha256: [u8; 32],
}

impl OpatchHeader {
    /// Read magic and header from the (decompressed) patch stream
    pub fn read<R: Read>(reader: &mut R) -> OpatchResult<Self> {
        let mut magic = [0u8; 8];
        reader
            .read_exact(&mut magic)
            .map_err(|_| OpatchError::Truncated { context: "magic" })?;
        if magic != MAGIC {
            return Err(OpatchError::BadMagic { actual: magic });
        }

        let block_size = reader
            .read_u32::<LittleEndian>()
            .map_err(|_| OpatchError::Truncated { context: "header" })?;
        let old_size = reader
            .read_u64::<LittleEndian>()
            .map_err(|_| OpatchError::Truncated { context: "header" })?;
        let new_size = reader
            .read_u64::<LittleEndian>()
            .map_err(|_| OpatchError::Truncated { context: "header" })?;

        let mut base_sha256 = [0u8; 32];
        let mut target_sha256 = [0u8; 32];
        reader
            .read_exact(&mut base_sha256)
            .map_err(|_| OpatchError::Truncated { context: "baseline digest" })?;
        reader
            .read_exact(&mut target_sha256)
            .map_err(|_| OpatchError::Truncated { context: "target digest" })?;

        Ok(Self {
            block_size,
            old_size,
            new_size,
            base_sha256,
            target_sha256,
        })
    }

    /// Write magic and header to the (to-be-compressed) patch stream
    pub fn write<W: Write>(&self, writer: &mut W) -> OpatchResult<()> {
        writer.write_all(&MAGIC)?;
        writer.write_u32::<LittleEndian>(self.block_size)?;
        writer.write_u64::<LittleEndian>(self.old_size)?;
        writer.write_u64::<LittleEndian>(self.new_size)?;
        writer.write_all(&self.base_sha256)?;
        writer.write_all(&self.target_sha256)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = OpatchHeader {
            block_size: 4096,
            old_size: 123,
            new_size: 456,
            base_sha256: [0xAB; 32],
            target_sha256: [0xCD; 32],
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), 8 + 4 + 8 + 8 + 32 + 32);
        assert_eq!(OpatchHeader::read(&mut buf.as_slice()).unwrap(), header);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buf = Vec::new();
        OpatchHeader {
            block_size: 1,
            old_size: 0,
            new_size: 0,
            base_sha256: [0; 32],
            target_sha256: [0; 32],
        }
        .write(&mut buf)
        .unwrap();
        buf[0] = b'X';
        assert!(matches!(
            OpatchHeader::read(&mut buf.as_slice()),
            Err(OpatchError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            OpatchHeader::read(&mut &MAGIC[..5]),
            Err(OpatchError::Truncated { context: "magic" })
        ));
        let mut buf = MAGIC.to_vec();
        buf.extend_from_slice(&[0u8; 3]);
        assert!(matches!(
            OpatchHeader::read(&mut buf.as_slice()),
            Err(OpatchError::Truncated { context: "header" })
        ));
    }
}
