//! Varint framing for the status-query wire protocol. Packets are
//! `varint(length) + body`; strings are `varint(length) + utf8 bytes`.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

const MAX_VARINT_BYTES: u32 = 5;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("varint exceeds five bytes")]
    VarintTooLong,
    #[error("declared length {0} is negative")]
    NegativeLength(i32),
    #[error("declared length {declared} exceeds limit {limit}")]
    Oversized { declared: i32, limit: usize },
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
}

pub fn put_varint(buf: &mut Vec<u8>, value: i32) {
    let mut remaining = value as u32;
    loop {
        let mut byte = (remaining & 0x7f) as u8;
        remaining >>= 7;
        if remaining != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if remaining == 0 {
            break;
        }
    }
}

pub fn put_string(buf: &mut Vec<u8>, value: &str) {
    put_varint(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

/// Prefix `body` with its varint length.
pub fn frame(body: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(body.len() + MAX_VARINT_BYTES as usize);
    put_varint(&mut framed, body.len() as i32);
    framed.extend_from_slice(body);
    framed
}

pub async fn read_varint<R>(reader: &mut R) -> Result<i32, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut value: u32 = 0;
    for position in 0..MAX_VARINT_BYTES {
        let byte = reader.read_u8().await?;
        value |= u32::from(byte & 0x7f).wrapping_shl(7 * position);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(FrameError::VarintTooLong)
}

pub async fn read_string<R>(reader: &mut R, limit: usize) -> Result<String, FrameError>
where
    R: AsyncRead + Unpin,
{
    let declared = read_varint(reader).await?;
    if declared < 0 {
        return Err(FrameError::NegativeLength(declared));
    }
    let len = declared as usize;
    if len > limit {
        return Err(FrameError::Oversized { declared, limit });
    }

    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes).await?;
    String::from_utf8(bytes).map_err(|_| FrameError::InvalidUtf8)
}
