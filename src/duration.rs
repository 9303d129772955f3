//! Duration repair for finished WebM files.
//!
//! Recorders that stream their output (a browser `MediaRecorder`, for one)
//! cannot know the duration when they write the Info element, so they leave
//! Duration out or write zero. [`patch_duration`] fixes that after the fact:
//! an existing Duration is overwritten in place, a missing one is inserted at
//! the end of Info with every enclosing size field adjusted.
//!
//! Patching is best effort. When the file does not have the expected layout
//! the original bytes are handed back untouched along with the reason.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, info, warn};

use crate::{
    ebml::{
        encode_var_int, encode_var_int_with_width, ids, put_float, reader::Children,
        reader::ElementHeader,
    },
    error::{ContainerStructureError, EncodingOverflowError, Result},
};

/// How far past the start of the Segment payload the Info element may begin.
pub const INFO_SEARCH_WINDOW: usize = 5000;

/// Duration ID (2 bytes), size byte, float64 payload.
pub const DURATION_ELEMENT_LEN: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    /// An existing Duration payload was overwritten. `offset` is where the
    /// payload starts.
    Updated { offset: usize },
    /// A Duration element was added at `offset` in the new buffer; the file
    /// grew by `inserted` bytes.
    Inserted { offset: usize, inserted: usize },
}

/// Result of a best-effort patch.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchedBuffer {
    pub data: Bytes,
    pub outcome: Result<PatchKind>,
}

impl PatchedBuffer {
    pub fn is_patched(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Finds the top-level Segment element.
pub fn locate_segment(buf: &[u8]) -> Result<ElementHeader, ContainerStructureError> {
    for element in Children::top_level(buf) {
        let element = element?;
        if element.is(&ids::SEGMENT) {
            return Ok(element);
        }
    }
    Err(ContainerStructureError::SegmentNotFound)
}

/// Finds the Info element among the Segment's children, giving up once the
/// children start more than [`INFO_SEARCH_WINDOW`] bytes into the Segment.
pub fn locate_segment_info(
    buf: &[u8],
    segment: &ElementHeader,
) -> Result<ElementHeader, ContainerStructureError> {
    let limit = segment.data_offset().saturating_add(INFO_SEARCH_WINDOW);
    for child in segment.children(buf) {
        let child = child?;
        if child.offset > limit {
            break;
        }
        if child.is(&ids::INFO) {
            return Ok(child);
        }
    }
    Err(ContainerStructureError::InfoNotFound {
        window: INFO_SEARCH_WINDOW,
    })
}

fn find_duration(
    buf: &[u8],
    info: &ElementHeader,
) -> Result<Option<ElementHeader>, ContainerStructureError> {
    for child in info.children(buf) {
        let child = child?;
        if child.is(&ids::DURATION) {
            return Ok(Some(child));
        }
    }
    Ok(None)
}

/// Reads the Duration stored in the file, in timestamp ticks (milliseconds
/// for files with the default timecode scale).
pub fn read_duration(buf: &[u8]) -> Result<Option<f64>> {
    let segment = locate_segment(buf)?;
    let info = locate_segment_info(buf, &segment)?;
    let Some(duration) = find_duration(buf, &info)? else {
        return Ok(None);
    };

    let payload = duration.payload(buf);
    let value = if let Ok(bytes) = <[u8; 8]>::try_from(payload) {
        f64::from_be_bytes(bytes)
    } else if let Ok(bytes) = <[u8; 4]>::try_from(payload) {
        f64::from(f32::from_be_bytes(bytes))
    } else {
        return Err(ContainerStructureError::UnsupportedDurationSize {
            offset: duration.offset,
            size: payload.len() as u64,
        }
        .into());
    };
    Ok(Some(value))
}

/// Writes `duration_ms` into the file, or explains why it could not.
pub fn try_patch_duration(buf: &[u8], duration_ms: f64) -> Result<(Bytes, PatchKind)> {
    let segment = locate_segment(buf)?;
    let info = locate_segment_info(buf, &segment)?;
    debug!(
        segment_offset = segment.offset,
        info_offset = info.offset,
        "Located Segment and Info"
    );

    match find_duration(buf, &info)? {
        Some(duration) => overwrite_duration(buf, &duration, duration_ms),
        None => insert_duration(buf, &segment, &info, duration_ms),
    }
}

/// Best-effort [`try_patch_duration`]: on failure `data` is a copy of `buf`.
#[tracing::instrument(skip(buf), fields(len = buf.len()))]
pub fn patch_duration(buf: &[u8], duration_ms: f64) -> PatchedBuffer {
    match try_patch_duration(buf, duration_ms) {
        Ok((data, kind)) => {
            info!(?kind, new_len = data.len(), "Duration patched");
            PatchedBuffer {
                data,
                outcome: Ok(kind),
            }
        }
        Err(e) => {
            warn!(error = %e, "Could not patch duration, keeping the original bytes");
            PatchedBuffer {
                data: Bytes::copy_from_slice(buf),
                outcome: Err(e),
            }
        }
    }
}

fn overwrite_duration(
    buf: &[u8],
    duration: &ElementHeader,
    duration_ms: f64,
) -> Result<(Bytes, PatchKind)> {
    let value: Vec<u8> = match duration.size {
        Some(8) => duration_ms.to_be_bytes().to_vec(),
        Some(4) => (duration_ms as f32).to_be_bytes().to_vec(),
        size => {
            return Err(ContainerStructureError::UnsupportedDurationSize {
                offset: duration.offset,
                size: size.unwrap_or_default(),
            }
            .into())
        }
    };

    let offset = duration.data_offset();
    let mut out = BytesMut::from(buf);
    out[offset..offset + value.len()].copy_from_slice(&value);

    Ok((out.freeze(), PatchKind::Updated { offset }))
}

/// Re-encodes a size field, keeping its width when the value still fits.
fn resize_field(value: u64, width: usize) -> Result<Vec<u8>, EncodingOverflowError> {
    encode_var_int_with_width(value, width).or_else(|_| encode_var_int(value))
}

fn insert_duration(
    buf: &[u8],
    segment: &ElementHeader,
    info: &ElementHeader,
    duration_ms: f64,
) -> Result<(Bytes, PatchKind)> {
    let info_size = info.size.ok_or(ContainerStructureError::UnknownSize {
        element: "Info",
        offset: info.offset,
    })?;

    let mut element = BytesMut::with_capacity(DURATION_ELEMENT_LEN);
    put_float(&mut element, &ids::DURATION, duration_ms)?;

    let info_field = resize_field(info_size + element.len() as u64, info.size_length)?;
    let info_growth = info_field.len() - info.size_length + element.len();

    // an unknown-sized Segment needs no update
    let segment_field = segment
        .size
        .map(|size| resize_field(size + info_growth as u64, segment.size_length))
        .transpose()?;
    let segment_growth = segment_field
        .as_ref()
        .map_or(0, |field| field.len() - segment.size_length);
    let inserted = info_growth + segment_growth;

    let mut out = BytesMut::with_capacity(buf.len() + inserted);
    out.put_slice(&buf[..segment.size_offset()]);
    match &segment_field {
        Some(field) => out.put_slice(field),
        None => out.put_slice(&buf[segment.size_offset()..segment.data_offset()]),
    }
    out.put_slice(&buf[segment.data_offset()..info.size_offset()]);
    out.put_slice(&info_field);
    out.put_slice(&buf[info.data_offset()..info.end]);
    let offset = out.len();
    out.put_slice(&element);
    out.put_slice(&buf[info.end..]);

    if info_field.len() != info.size_length {
        debug!(
            old_width = info.size_length,
            new_width = info_field.len(),
            "Info size field widened"
        );
    }

    Ok((out.freeze(), PatchKind::Inserted { offset, inserted }))
}
