use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    ebml::{ids, max_value_for_width, put_element, put_uint, MAX_VAR_INT_WIDTH},
    error::{ConfigurationError, EncodingOverflowError, Result},
};

const KEYFRAME_FLAG: u8 = 0x80;
const MAX_BLOCK_TRACK_NUMBER: u8 = 0x7F;

/// Encodes one SimpleBlock element.
///
/// The block header is a one-byte track number (marker bit set), a signed
/// 16-bit big-endian timestamp relative to the cluster, and a flags byte.
pub fn simple_block(
    track_number: u8,
    relative_timestamp: i16,
    keyframe: bool,
    payload: &[u8],
) -> Result<Bytes> {
    if track_number == 0 || track_number > MAX_BLOCK_TRACK_NUMBER {
        return Err(ConfigurationError::TrackNumberOutOfRange(u64::from(track_number)).into());
    }

    let len = 4 + payload.len() as u64;
    if len > max_value_for_width(MAX_VAR_INT_WIDTH) {
        return Err(EncodingOverflowError {
            value: len,
            width: MAX_VAR_INT_WIDTH,
        }
        .into());
    }

    let mut body = BytesMut::with_capacity(4 + payload.len());
    body.put_u8(0x80 | track_number);
    body.put_i16(relative_timestamp);
    body.put_u8(if keyframe { KEYFRAME_FLAG } else { 0x00 });
    body.put_slice(payload);

    let mut out = BytesMut::new();
    put_element(&mut out, &ids::SIMPLE_BLOCK, &body)?;
    Ok(out.freeze())
}

/// A cluster that still accepts blocks.
#[derive(Debug)]
pub(crate) struct OpenCluster {
    timecode: u64,
    body: BytesMut,
    blocks: usize,
}

impl OpenCluster {
    pub fn new(timecode: u64) -> Result<Self> {
        let mut body = BytesMut::new();
        put_uint(&mut body, &ids::TIMECODE, timecode)?;
        Ok(Self {
            timecode,
            body,
            blocks: 0,
        })
    }

    pub fn timecode(&self) -> u64 {
        self.timecode
    }

    /// Offset of `timestamp` from the cluster start, if a block can carry it.
    pub fn relative(&self, timestamp: u64) -> Option<i16> {
        let delta = i128::from(timestamp) - i128::from(self.timecode);
        i16::try_from(delta).ok()
    }

    pub fn push(&mut self, block: &[u8]) {
        self.body.put_slice(block);
        self.blocks += 1;
    }

    pub fn blocks(&self) -> usize {
        self.blocks
    }

    pub fn finish(self) -> Result<Bytes> {
        let mut out = BytesMut::new();
        put_element(&mut out, &ids::CLUSTER, &self.body)?;
        Ok(out.freeze())
    }
}
