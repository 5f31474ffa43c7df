//! Frame codec
//!
//! ## Wire Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Len (4)  │ Code (1) │     Protobuf payload        │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//! `Len` is big-endian and counts the code byte plus the payload.

use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Length prefix plus message code
pub const HEADER_SIZE: usize = 5;

/// Largest frame accepted from a server (64 MB)
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageCode {
    ErrorResp = 0,
    PingReq = 1,
    PingResp = 2,
    GetServerInfoReq = 7,
    GetServerInfoResp = 8,
    GetReq = 9,
    GetResp = 10,
    PutReq = 11,
    PutResp = 12,
    DelReq = 13,
    DelResp = 14,
    ListBucketsReq = 15,
    ListBucketsResp = 16,
    ListKeysReq = 17,
    ListKeysResp = 18,
    GetBucketReq = 19,
    GetBucketResp = 20,
    SetBucketReq = 21,
    SetBucketResp = 22,
    MapRedReq = 23,
    MapRedResp = 24,
    IndexReq = 25,
    IndexResp = 26,
}

impl TryFrom<u8> for MessageCode {
    type Error = io::Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        use MessageCode::*;
        Ok(match code {
            0 => ErrorResp,
            1 => PingReq,
            2 => PingResp,
            7 => GetServerInfoReq,
            8 => GetServerInfoResp,
            9 => GetReq,
            10 => GetResp,
            11 => PutReq,
            12 => PutResp,
            13 => DelReq,
            14 => DelResp,
            15 => ListBucketsReq,
            16 => ListBucketsResp,
            17 => ListKeysReq,
            18 => ListKeysResp,
            19 => GetBucketReq,
            20 => GetBucketResp,
            21 => SetBucketReq,
            22 => SetBucketResp,
            23 => MapRedReq,
            24 => MapRedResp,
            25 => IndexReq,
            26 => IndexResp,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown message code {}", other),
                ))
            }
        })
    }
}

/// One decoded frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub code: MessageCode,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(code: MessageCode, payload: impl Into<Bytes>) -> Self {
        Self {
            code,
            payload: payload.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_u32(self.payload.len() as u32 + 1);
        buf.put_u8(self.code as u8);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Decode one complete frame from the front of `bytes`
    pub fn decode(bytes: &[u8]) -> io::Result<(Self, usize)> {
        if bytes.len() < HEADER_SIZE {
            return Err(invalid(format!(
                "incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        let len = check_length(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))?;
        let total = 4 + len;
        if bytes.len() < total {
            return Err(invalid(format!(
                "incomplete frame: expected {} bytes, got {}",
                total,
                bytes.len()
            )));
        }
        let code = MessageCode::try_from(bytes[4])?;
        let payload = Bytes::copy_from_slice(&bytes[HEADER_SIZE..total]);
        Ok((Self { code, payload }, total))
    }
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn check_length(len: u32) -> io::Result<usize> {
    if len == 0 {
        return Err(invalid("frame without message code".into()));
    }
    if len > MAX_FRAME_SIZE {
        return Err(invalid(format!(
            "frame too large: {} bytes (max {})",
            len, MAX_FRAME_SIZE
        )));
    }
    Ok(len as usize)
}

/// Read exactly one frame from a stream
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Frame> {
    let len = check_length(reader.read_u32().await?)?;
    let code = MessageCode::try_from(reader.read_u8().await?)?;
    let mut payload = vec![0u8; len - 1];
    reader.read_exact(&mut payload).await?;
    Ok(Frame::new(code, payload))
}
