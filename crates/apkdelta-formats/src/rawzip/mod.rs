//! Read-only, byte-exact ZIP structure access
//!
//! The `zip` crate decodes entry *contents*; this module reads entry
//! *structure*: central directory metadata, the raw on-disk span of each
//! local record, and the archive tail. Nothing here decompresses or rewrites
//! bytes, which is what makes the byte-exact `apkraw-1` format possible for
//! APKs whose v2/v3 signatures cover the central directory.
//!
//! # Structures read
//!
//! ```text
//! [local record 0] [local record 1] ... [local record N-1] [tail]
//!
//! local record = 30-byte local file header
//!              + filename + extra field
//!              + compressed payload
//!              + data descriptor (only when GPBF bit 3 is set):
//!                  12 bytes, or 16 when it opens with 0x08074B50
//!
//! tail = everything after the last local record:
//!        optional APK signing block, central directory, [Zip64 records], EOCD
//! ```
//!
//! The central directory is located by scanning backwards for the EOCD
//! record, validating the comment length against the scan position so a
//! stray signature inside the comment cannot fool the parser. Zip64
//! record counts and offsets are honored via the Zip64 EOCD locator and
//! per-entry extra fields.

use byteorder::{LittleEndian, ReadBytesExt};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

pub mod error;

pub use error::{RawZipError, RawZipResult};

const EOCD_SIG: u32 = 0x0605_4B50;
const CENTRAL_SIG: u32 = 0x0201_4B50;
const LOCAL_SIG: u32 = 0x0403_4B50;
const DESCRIPTOR_SIG: u32 = 0x0807_4B50;
const ZIP64_EOCD_SIG: u32 = 0x0606_4B50;
const ZIP64_LOCATOR_SIG: u32 = 0x0706_4B50;

const EOCD_MIN_SIZE: u64 = 22;
const ZIP64_LOCATOR_SIZE: u64 = 20;
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Metadata for one central directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    /// Entry name as stored (directories end in `/`)
    pub name: String,
    /// CRC-32 of the uncompressed payload
    pub crc32: u32,
    /// Compressed payload size in bytes
    pub compressed_size: u64,
    /// Uncompressed payload size in bytes
    pub uncompressed_size: u64,
    /// Compression method (0 = stored, 8 = deflated)
    pub method: u16,
    /// General purpose bit flags
    pub flags: u16,
    /// Offset of the local file header
    pub header_offset: u64,
}

impl ZipEntry {
    /// Whether this entry is a directory marker
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }
}

/// Raw byte span of one local record
#[derive(Debug, Clone)]
pub struct LocalRecord {
    /// The verbatim on-disk bytes: header, name, extra, payload, descriptor
    pub bytes: Vec<u8>,
    /// Offset of the first byte after the record
    pub end_offset: u64,
}

/// A ZIP file opened for raw structure access
#[derive(Debug)]
pub struct RawZip {
    file: File,
    file_size: u64,
    entries: Vec<ZipEntry>,
}

impl RawZip {
    /// Open and index a ZIP file
    pub fn open(path: &Path) -> RawZipResult<Self> {
        let mut file = File::open(path)?;
        let file_size = file.seek(SeekFrom::End(0))?;
        if file_size < EOCD_MIN_SIZE {
            return Err(RawZipError::TooSmall { size: file_size });
        }

        let eocd_offset = find_eocd(&mut file, file_size)?;
        let (cd_offset, cd_records) = read_directory_location(&mut file, eocd_offset)?;
        let entries = read_central_directory(&mut file, cd_offset, cd_records)?;

        Ok(Self {
            file,
            file_size,
            entries,
        })
    }

    /// All entries in central directory order
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Look up an entry by exact name
    pub fn entry(&self, name: &str) -> Option<&ZipEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Read the verbatim on-disk bytes of one local record
    ///
    /// Covers the 30-byte local file header, filename, extra field,
    /// compressed payload and, when GPBF bit 3 is set, the trailing data
    /// descriptor (12 bytes, or 16 when it begins with the optional
    /// `0x08074B50` signature).
    pub fn read_local_record(&mut self, entry: &ZipEntry) -> RawZipResult<LocalRecord> {
        let start = entry.header_offset;
        self.file.seek(SeekFrom::Start(start))?;

        let sig = self.file.read_u32::<LittleEndian>()?;
        if sig != LOCAL_SIG {
            return Err(RawZipError::BadSignature {
                structure: "local file header",
                offset: start,
                actual: sig,
            });
        }

        // Skip version, flags, method, mod time/date, crc, sizes.
        self.file.seek(SeekFrom::Current(22))?;
        let name_len = u64::from(self.file.read_u16::<LittleEndian>()?);
        let extra_len = u64::from(self.file.read_u16::<LittleEndian>()?);

        let data_start = start + 30 + name_len + extra_len;
        let data_end = data_start + entry.compressed_size;

        let descriptor_len = if entry.flags & 0x0008 != 0 {
            self.file.seek(SeekFrom::Start(data_end))?;
            let first = self.file.read_u32::<LittleEndian>()?;
            if first == DESCRIPTOR_SIG { 16 } else { 12 }
        } else {
            0
        };

        let end_offset = data_end + descriptor_len;
        if end_offset > self.file_size {
            return Err(RawZipError::TruncatedRecord {
                name: entry.name.clone(),
                offset: end_offset,
            });
        }

        self.file.seek(SeekFrom::Start(start))?;
        let mut bytes = vec![0u8; (end_offset - start) as usize];
        self.file.read_exact(&mut bytes).map_err(|_| {
            RawZipError::TruncatedRecord {
                name: entry.name.clone(),
                offset: start,
            }
        })?;

        Ok(LocalRecord { bytes, end_offset })
    }

    /// Offset of the first byte past the last non-directory local record
    ///
    /// Everything from here to EOF is the archive tail: signing block (if
    /// any), central directory, Zip64 records and EOCD.
    pub fn tail_start(&mut self) -> RawZipResult<u64> {
        let entries: Vec<ZipEntry> = self
            .entries
            .iter()
            .filter(|e| !e.is_dir())
            .cloned()
            .collect();
        let mut tail_start = 0u64;
        for entry in &entries {
            let record = self.read_local_record(entry)?;
            tail_start = tail_start.max(record.end_offset);
        }
        Ok(tail_start)
    }

    /// Read the archive tail verbatim
    pub fn tail_bytes(&mut self) -> RawZipResult<Vec<u8>> {
        let tail_start = self.tail_start()?;
        self.file.seek(SeekFrom::Start(tail_start))?;
        let mut tail = Vec::with_capacity((self.file_size - tail_start) as usize);
        self.file.read_to_end(&mut tail)?;
        Ok(tail)
    }

    /// Compute the structural zip-tree signature
    ///
    /// SHA-256 over `"<name>\t<crc32>\t<uncompressed_size>\t<method>\n"`
    /// lines for every non-directory entry, in filename-ascending order.
    /// Stable across repacks that reorder entries or change alignment
    /// padding but preserve content and compression choices.
    pub fn tree_signature(&self) -> String {
        let mut sorted: Vec<&ZipEntry> = self.entries.iter().filter(|e| !e.is_dir()).collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let mut hasher = Sha256::new();
        for entry in sorted {
            let line = format!(
                "{}\t{}\t{}\t{}\n",
                entry.name, entry.crc32, entry.uncompressed_size, entry.method
            );
            hasher.update(line.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Compute the zip-tree signature of a ZIP file on disk
pub fn tree_signature_hex(path: &Path) -> RawZipResult<String> {
    Ok(RawZip::open(path)?.tree_signature())
}

/// Scan backwards for the EOCD record, validating the comment length
fn find_eocd(file: &mut File, file_size: u64) -> RawZipResult<u64> {
    let max_comment = (file_size - EOCD_MIN_SIZE).min(u64::from(u16::MAX));
    let empty_comment_pos = file_size - EOCD_MIN_SIZE;

    for comment_len in 0..=max_comment {
        let pos = empty_comment_pos - comment_len;
        file.seek(SeekFrom::Start(pos))?;
        if file.read_u32::<LittleEndian>()? != EOCD_SIG {
            continue;
        }
        file.seek(SeekFrom::Start(pos + 20))?;
        let declared = u64::from(file.read_u16::<LittleEndian>()?);
        if declared == comment_len {
            return Ok(pos);
        }
    }
    Err(RawZipError::MissingEocd)
}

/// Read central directory offset and record count, following Zip64 if needed
fn read_directory_location(file: &mut File, eocd_offset: u64) -> RawZipResult<(u64, u64)> {
    file.seek(SeekFrom::Start(eocd_offset + 10))?;
    let cd_records = u64::from(file.read_u16::<LittleEndian>()?);
    let _cd_size = file.read_u32::<LittleEndian>()?;
    let cd_offset = u64::from(file.read_u32::<LittleEndian>()?);

    if cd_records != u64::from(u16::MAX) && cd_offset != u64::from(u32::MAX) {
        return Ok((cd_offset, cd_records));
    }

    // Zip64: the locator sits immediately before the EOCD record.
    if eocd_offset < ZIP64_LOCATOR_SIZE {
        return Err(RawZipError::MissingEocd);
    }
    let locator_offset = eocd_offset - ZIP64_LOCATOR_SIZE;
    file.seek(SeekFrom::Start(locator_offset))?;
    let sig = file.read_u32::<LittleEndian>()?;
    if sig != ZIP64_LOCATOR_SIG {
        return Err(RawZipError::BadSignature {
            structure: "Zip64 EOCD locator",
            offset: locator_offset,
            actual: sig,
        });
    }
    let _disk = file.read_u32::<LittleEndian>()?;
    let zip64_eocd_offset = file.read_u64::<LittleEndian>()?;

    file.seek(SeekFrom::Start(zip64_eocd_offset))?;
    let sig = file.read_u32::<LittleEndian>()?;
    if sig != ZIP64_EOCD_SIG {
        return Err(RawZipError::BadSignature {
            structure: "Zip64 EOCD record",
            offset: zip64_eocd_offset,
            actual: sig,
        });
    }
    // size(8) versions(4) disks(8) skipped; then records, size, offset.
    file.seek(SeekFrom::Current(20))?;
    let cd_records = file.read_u64::<LittleEndian>()?;
    let _cd_size = file.read_u64::<LittleEndian>()?;
    let cd_offset = file.read_u64::<LittleEndian>()?;
    Ok((cd_offset, cd_records))
}

/// Parse `cd_records` central directory headers starting at `cd_offset`
fn read_central_directory(
    file: &mut File,
    cd_offset: u64,
    cd_records: u64,
) -> RawZipResult<Vec<ZipEntry>> {
    let mut file = std::io::BufReader::new(file);
    file.seek(SeekFrom::Start(cd_offset))?;
    let mut entries = Vec::with_capacity(cd_records.min(65_536) as usize);

    for read in 0..cd_records {
        let record_offset = file.stream_position()?;
        let sig = match file.read_u32::<LittleEndian>() {
            Ok(sig) => sig,
            Err(_) => {
                return Err(RawZipError::TruncatedCentralDirectory {
                    expected: cd_records,
                    read,
                });
            }
        };
        if sig != CENTRAL_SIG {
            return Err(RawZipError::BadSignature {
                structure: "central directory header",
                offset: record_offset,
                actual: sig,
            });
        }

        file.seek(SeekFrom::Current(4))?; // versions made by / needed
        let flags = file.read_u16::<LittleEndian>()?;
        let method = file.read_u16::<LittleEndian>()?;
        file.seek(SeekFrom::Current(4))?; // mod time / date
        let crc32 = file.read_u32::<LittleEndian>()?;
        let compressed_size32 = file.read_u32::<LittleEndian>()?;
        let uncompressed_size32 = file.read_u32::<LittleEndian>()?;
        let name_len = usize::from(file.read_u16::<LittleEndian>()?);
        let extra_len = usize::from(file.read_u16::<LittleEndian>()?);
        let comment_len = usize::from(file.read_u16::<LittleEndian>()?);
        file.seek(SeekFrom::Current(8))?; // disk, internal attrs, external attrs
        let header_offset32 = file.read_u32::<LittleEndian>()?;

        let mut name_bytes = vec![0u8; name_len];
        file.read_exact(&mut name_bytes)?;
        let name = String::from_utf8_lossy(&name_bytes).into_owned();

        let mut extra = vec![0u8; extra_len];
        file.read_exact(&mut extra)?;
        file.seek(SeekFrom::Current(comment_len as i64))?;

        let (compressed_size, uncompressed_size, header_offset) = resolve_zip64_fields(
            &name,
            &extra,
            compressed_size32,
            uncompressed_size32,
            header_offset32,
        )?;

        entries.push(ZipEntry {
            name,
            crc32,
            compressed_size,
            uncompressed_size,
            method,
            flags,
            header_offset,
        });
    }

    Ok(entries)
}

/// Widen 32-bit central directory fields through the Zip64 extra field
fn resolve_zip64_fields(
    name: &str,
    extra: &[u8],
    compressed_size32: u32,
    uncompressed_size32: u32,
    header_offset32: u32,
) -> RawZipResult<(u64, u64, u64)> {
    let needs_zip64 = compressed_size32 == u32::MAX
        || uncompressed_size32 == u32::MAX
        || header_offset32 == u32::MAX;
    if !needs_zip64 {
        return Ok((
            u64::from(compressed_size32),
            u64::from(uncompressed_size32),
            u64::from(header_offset32),
        ));
    }

    let mut cursor = extra;
    while cursor.len() >= 4 {
        let id = u16::from_le_bytes([cursor[0], cursor[1]]);
        let len = usize::from(u16::from_le_bytes([cursor[2], cursor[3]]));
        let body = cursor.get(4..4 + len).ok_or_else(|| RawZipError::BadZip64Extra {
            name: name.to_string(),
        })?;
        if id == ZIP64_EXTRA_ID {
            // Fields appear, in order, only for the 32-bit values that overflowed.
            let mut reader = body;
            let mut take_u64 = |needed: bool, fallback: u32| -> RawZipResult<u64> {
                if !needed {
                    return Ok(u64::from(fallback));
                }
                reader
                    .read_u64::<LittleEndian>()
                    .map_err(|_| RawZipError::BadZip64Extra {
                        name: name.to_string(),
                    })
            };
            let uncompressed = take_u64(uncompressed_size32 == u32::MAX, uncompressed_size32)?;
            let compressed = take_u64(compressed_size32 == u32::MAX, compressed_size32)?;
            let offset = take_u64(header_offset32 == u32::MAX, header_offset32)?;
            return Ok((compressed, uncompressed, offset));
        }
        cursor = &cursor[4 + len..];
    }

    Err(RawZipError::BadZip64Extra {
        name: name.to_string(),
    })
}
