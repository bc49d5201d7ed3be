use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::Path,
};

use backdex_protocol::FileRecord;
use bincode::config;
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::StoreError;

/// Magic bytes at the start of `snapshot.bin`
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"BDXS";

pub const SNAPSHOT_VERSION: u32 = 1;

/// magic | version u32 | record count u64 | payload crc32 u32 (little-endian)
const SNAPSHOT_HEADER_LEN: usize = 4 + 4 + 8 + 4;

/// length u32 | crc32 u32 (big-endian)
const FRAME_HEADER_LEN: usize = 8;

/// One journaled mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEntry {
    Put(FileRecord),
    Delete(String),
}

fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

fn corrupt(path: &Path, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Write every record to `out` in snapshot format.
pub fn write_snapshot_to<'a, W, I>(out: W, records: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a FileRecord>,
{
    let records: Vec<&FileRecord> = records.into_iter().collect();
    let payload =
        bincode::serde::encode_to_vec(&records, config::standard()).map_err(io::Error::other)?;

    let mut writer = BufWriter::new(out);
    writer.write_all(&SNAPSHOT_MAGIC)?;
    writer.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
    writer.write_all(&(records.len() as u64).to_le_bytes())?;
    writer.write_all(&checksum(&payload).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Replace the snapshot at `path` atomically: temp file, fsync, rename, then
/// fsync the directory so the rename itself survives a crash.
pub fn write_snapshot_atomic<'a, I>(path: &Path, records: I) -> io::Result<()>
where
    I: IntoIterator<Item = &'a FileRecord>,
{
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let tmp = NamedTempFile::new_in(parent)?;
    write_snapshot_to(tmp.as_file(), records)?;
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| e.error)?;

    #[cfg(unix)]
    {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

/// Load a snapshot. A missing file is an empty index; anything unreadable
/// or inconsistent is `Corrupt`.
pub fn read_snapshot(path: &Path) -> Result<Vec<FileRecord>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    decode_snapshot(path, &bytes)
}

pub(crate) fn decode_snapshot(path: &Path, bytes: &[u8]) -> Result<Vec<FileRecord>, StoreError> {
    if bytes.len() < SNAPSHOT_HEADER_LEN {
        return Err(corrupt(path, "truncated header"));
    }

    let (header, payload) = bytes.split_at(SNAPSHOT_HEADER_LEN);
    if header[0..4] != SNAPSHOT_MAGIC {
        return Err(corrupt(path, "bad magic"));
    }

    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != SNAPSHOT_VERSION {
        return Err(corrupt(
            path,
            format!("format version {version}, expected {SNAPSHOT_VERSION}"),
        ));
    }

    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&header[8..16]);
    let count = u64::from_le_bytes(count_bytes);

    let crc = u32::from_le_bytes([header[16], header[17], header[18], header[19]]);
    if checksum(payload) != crc {
        return Err(corrupt(path, "checksum mismatch"));
    }

    let (records, _): (Vec<FileRecord>, usize) =
        bincode::serde::decode_from_slice(payload, config::standard())
            .map_err(|e| corrupt(path, e.to_string()))?;

    if records.len() as u64 != count {
        return Err(corrupt(
            path,
            format!("header says {count} records, payload has {}", records.len()),
        ));
    }

    Ok(records)
}

/// Encode one journal frame.
pub fn encode_frame(entry: &JournalEntry) -> io::Result<Vec<u8>> {
    let payload =
        bincode::serde::encode_to_vec(entry, config::standard()).map_err(io::Error::other)?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&checksum(&payload).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Result of scanning a journal's bytes.
#[derive(Debug)]
pub struct Replay {
    pub entries: Vec<JournalEntry>,
    /// Length of the intact prefix
    pub valid_len: usize,
    /// Why decoding stopped before the end, if it did
    pub torn: Option<String>,
}

/// Decode frames until the bytes run out or a frame fails validation.
pub fn decode_frames(bytes: &[u8]) -> Replay {
    let mut entries = Vec::new();
    let mut pos = 0;

    let torn = loop {
        let rest = &bytes[pos..];
        if rest.is_empty() {
            break None;
        }
        if rest.len() < FRAME_HEADER_LEN {
            break Some(format!("{} trailing bytes", rest.len()));
        }

        let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let crc = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]);
        let Some(payload) = rest.get(FRAME_HEADER_LEN..FRAME_HEADER_LEN + len) else {
            break Some(format!("frame at {pos} is cut short"));
        };
        if checksum(payload) != crc {
            break Some(format!("frame at {pos} fails its checksum"));
        }

        match bincode::serde::decode_from_slice::<JournalEntry, _>(payload, config::standard()) {
            Ok((entry, _)) => entries.push(entry),
            Err(e) => break Some(format!("frame at {pos} does not decode: {e}")),
        }
        pos += FRAME_HEADER_LEN + len;
    };

    Replay {
        entries,
        valid_len: pos,
        torn,
    }
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
