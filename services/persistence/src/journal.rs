//! File journal backend: append-only list files with checksums
//!
//! Every list key maps to one append-only file of framed records; every
//! scalar key maps to one small file replaced atomically.
//!
//! # Binary Format (per record)
//! ```text
//! [payload_len: u32]
//! [payload:     bytes]   // UTF-8 record text
//! [checksum:    u32]     // CRC32C over payload
//! ```
//!
//! A crash mid-append leaves a torn frame at the end of the file. Readers
//! ignore a torn tail; the next append truncates it before writing. A
//! complete frame with a bad checksum is corruption and is reported.

use crc32c::crc32c;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::error::StoreError;
use crate::list::ListBackend;

/// Upper bound on a single record; larger lengths indicate corruption.
pub const MAX_RECORD_LEN: usize = 4096;

const LEN_SIZE: usize = 4;
const CRC_SIZE: usize = 4;

// ── Framing ─────────────────────────────────────────────────────────

pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(LEN_SIZE + payload.len() + CRC_SIZE);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&crc32c(payload).to_le_bytes());
    buf
}

/// Result of scanning a list file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameScan {
    pub records: Vec<String>,
    /// Length of the valid prefix in bytes
    pub valid_len: u64,
    /// Trailing bytes after the valid prefix form an incomplete frame
    pub torn_tail: bool,
}

fn read_u32(data: &[u8], pos: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&data[pos..pos + 4]);
    u32::from_le_bytes(raw)
}

/// Decode every complete frame of `data`, validating checksums.
pub fn scan_frames(key: &str, data: &[u8]) -> Result<FrameScan, StoreError> {
    let corrupted = |offset: usize, detail: String| StoreError::Corrupted {
        key: key.to_string(),
        offset: offset as u64,
        detail,
    };

    let mut records = Vec::new();
    let mut pos = 0usize;
    while pos < data.len() {
        if data.len() - pos < LEN_SIZE {
            break;
        }
        let len = read_u32(data, pos) as usize;
        if len > MAX_RECORD_LEN {
            return Err(corrupted(pos, format!("implausible record length {}", len)));
        }
        let end = pos + LEN_SIZE + len + CRC_SIZE;
        if end > data.len() {
            break;
        }

        let payload = &data[pos + LEN_SIZE..pos + LEN_SIZE + len];
        let stored = read_u32(data, pos + LEN_SIZE + len);
        if crc32c(payload) != stored {
            return Err(corrupted(
                pos,
                format!("CRC32C mismatch, stored={:#010x}", stored),
            ));
        }
        let text = String::from_utf8(payload.to_vec())
            .map_err(|e| corrupted(pos, e.to_string()))?;
        records.push(text);
        pos = end;
    }

    Ok(FrameScan {
        records,
        valid_len: pos as u64,
        torn_tail: pos < data.len(),
    })
}

/// File-name-safe rendering of a key: anything outside `[A-Za-z0-9_-]`
/// becomes `%XX`.
pub fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Root directory; lists live in `lists/`, scalars in `values/`.
    pub dir: PathBuf,
    /// Fsync every append and scalar write.
    pub sync_writes: bool,
}

impl JournalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sync_writes: true,
        }
    }
}

// ── Backend ─────────────────────────────────────────────────────────

pub struct JournalBackend {
    config: JournalConfig,
    /// Verified end offset of every list file appended to by this process.
    /// The lock also serializes appends.
    tails: Mutex<HashMap<String, u64>>,
}

impl JournalBackend {
    /// Open the journal, creating the directory layout if needed.
    pub fn open(config: JournalConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(config.dir.join("lists"))?;
        fs::create_dir_all(config.dir.join("values"))?;
        Ok(Self {
            config,
            tails: Mutex::new(HashMap::new()),
        })
    }

    pub fn list_path(&self, key: &str) -> PathBuf {
        self.config
            .dir
            .join("lists")
            .join(format!("{}.log", escape_key(key)))
    }

    pub fn value_path(&self, key: &str) -> PathBuf {
        self.config
            .dir
            .join("values")
            .join(format!("{}.val", escape_key(key)))
    }

    /// Scan a list file and cut off a torn tail. Returns the valid length.
    fn repair_tail(&self, key: &str, path: &Path) -> Result<u64, StoreError> {
        let Some(data) = read_optional(path)? else {
            return Ok(0);
        };
        let scan = scan_frames(key, &data)?;
        if scan.torn_tail {
            warn!(
                key,
                valid_len = scan.valid_len,
                file_len = data.len(),
                "Truncating torn journal tail"
            );
            OpenOptions::new().write(true).open(path)?.set_len(scan.valid_len)?;
        }
        Ok(scan.valid_len)
    }

    fn append(&self, path: &Path, frame: &[u8], tail: u64) -> Result<u64, StoreError> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(frame)?;
        if self.config.sync_writes {
            file.sync_data()?;
        }
        Ok(tail + frame.len() as u64)
    }
}

impl ListBackend for JournalBackend {
    fn name(&self) -> &'static str {
        "journal"
    }

    fn rpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.list_path(key);
        let frame = encode_frame(value.as_bytes());

        let mut tails = self
            .tails
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "journal lock poisoned"))?;
        let tail = match tails.get(key) {
            Some(tail) => *tail,
            None => self.repair_tail(key, &path)?,
        };

        match self.append(&path, &frame, tail) {
            Ok(new_tail) => {
                tails.insert(key.to_string(), new_tail);
                Ok(())
            }
            Err(e) => {
                // Partial writes leave an unknown tail; rescan on next append
                tails.remove(key);
                Err(e)
            }
        }
    }

    fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let Some(data) = read_optional(&self.list_path(key))? else {
            return Ok(Vec::new());
        };
        let scan = scan_frames(key, &data)?;
        if scan.torn_tail {
            warn!(key, valid_len = scan.valid_len, "Ignoring torn journal tail");
        }
        Ok(scan.records)
    }

    /// Write-to-temp, fsync, rename.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.value_path(key);
        let tmp_path = path.with_extension("val.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(value.as_bytes())?;
            if self.config.sync_writes {
                file.sync_all()?;
            }
        }
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.value_path(key);
        match read_optional(&path)? {
            None => Ok(None),
            Some(data) => String::from_utf8(data)
                .map(Some)
                .map_err(|e| StoreError::Corrupted {
                    key: key.to_string(),
                    offset: 0,
                    detail: e.to_string(),
                }),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
