use anyhow::{Result, bail};
use bincode::config;
use serde::{Serialize, de::DeserializeOwned};
use std::io::{Read, Write};

/// Refuse to allocate for frames larger than this.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Serialize `msg` to a bincode payload (no framing).
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    Ok(bincode::serde::encode_to_vec(msg, config::standard())?)
}

/// Decode a bincode payload produced by [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (msg, _bytes_read): (T, usize) = bincode::serde::decode_from_slice(bytes, config::standard())?;
    Ok(msg)
}

/// Read a single length-prefixed bincode message from `reader`.
///
/// Wire format:
///   - 4-byte big-endian length (u32)
///   - that many bytes of bincode payload
pub fn read_message<R, T>(reader: &mut R) -> Result<T>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        bail!("frame of {len} bytes exceeds limit of {MAX_FRAME_LEN}");
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;

    decode(&buf)
}

/// Write a single length-prefixed bincode message to `writer`.
pub fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: Write,
    T: Serialize,
{
    let bytes = encode(msg)?;
    if bytes.len() > MAX_FRAME_LEN {
        bail!("message of {} bytes exceeds frame limit", bytes.len());
    }
    let len = bytes.len() as u32;

    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
