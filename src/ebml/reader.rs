//! Size-driven element walking.
//!
//! Elements are located by reading each header and skipping the declared
//! payload length, never by scanning payload bytes for ID patterns. A master
//! written with the unknown size runs until the first element that can only
//! appear at its parent's level, or until the end of its parent.

use crate::error::ContainerStructureError;

use super::{decode_var_int, ids, VarInt};

/// Location of one element inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    /// Offset of the first ID byte.
    pub offset: usize,
    id: [u8; 4],
    pub id_length: usize,
    /// Declared payload size, `None` when the element uses the unknown size.
    pub size: Option<u64>,
    pub size_length: usize,
    /// Offset one past the last payload byte.
    pub end: usize,
}

impl ElementHeader {
    /// Reads the header at `offset`. `parent_end` bounds the element.
    pub fn read(
        buf: &[u8],
        offset: usize,
        parent_end: usize,
    ) -> Result<Self, ContainerStructureError> {
        let raw = RawHeader::read(buf, offset)?;
        let data_offset = raw.data_offset();
        if data_offset > parent_end {
            return Err(ContainerStructureError::Truncated { offset });
        }

        let mut header = ElementHeader {
            offset,
            id: raw.id,
            id_length: raw.id_length,
            size: None,
            size_length: raw.size.length,
            end: parent_end,
        };

        if raw.size.is_unknown() {
            if !ids::is_master(header.id()) {
                return Err(ContainerStructureError::UnknownSize {
                    element: header.name().unwrap_or("unnamed"),
                    offset,
                });
            }
            header.end = unknown_size_end(buf, raw.id(), data_offset, parent_end);
        } else {
            let end = raw
                .known_end()
                .filter(|end| *end <= parent_end)
                .ok_or(ContainerStructureError::Truncated { offset })?;
            header.size = Some(raw.size.value);
            header.end = end;
        }

        Ok(header)
    }

    pub fn id(&self) -> &[u8] {
        &self.id[..self.id_length]
    }

    pub fn is(&self, id: &[u8]) -> bool {
        self.id() == id
    }

    pub fn name(&self) -> Option<&'static str> {
        ids::name(self.id())
    }

    pub fn size_offset(&self) -> usize {
        self.offset + self.id_length
    }

    pub fn data_offset(&self) -> usize {
        self.size_offset() + self.size_length
    }

    pub fn payload<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.data_offset()..self.end]
    }

    pub fn children<'a>(&self, buf: &'a [u8]) -> Children<'a> {
        Children::new(buf, self.data_offset(), self.end)
    }
}

/// ID and size field of one element, without resolving where it ends.
struct RawHeader {
    offset: usize,
    id: [u8; 4],
    id_length: usize,
    size: VarInt,
}

impl RawHeader {
    fn read(buf: &[u8], offset: usize) -> Result<Self, ContainerStructureError> {
        let first = *buf
            .get(offset)
            .ok_or(ContainerStructureError::Truncated { offset })?;
        let id_length = first.leading_zeros() as usize + 1;
        if id_length > 4 {
            return Err(ContainerStructureError::InvalidVarInt { offset });
        }

        let id_bytes = buf
            .get(offset..offset + id_length)
            .ok_or(ContainerStructureError::Truncated { offset })?;
        let mut id = [0u8; 4];
        id[..id_length].copy_from_slice(id_bytes);

        let size = decode_var_int(buf, offset + id_length)?;
        Ok(Self {
            offset,
            id,
            id_length,
            size,
        })
    }

    fn id(&self) -> &[u8] {
        &self.id[..self.id_length]
    }

    fn data_offset(&self) -> usize {
        self.offset + self.id_length + self.size.length
    }

    fn known_end(&self) -> Option<usize> {
        usize::try_from(self.size.value)
            .ok()
            .and_then(|len| self.data_offset().checked_add(len))
    }
}

/// Scans forward from `start` for the first ID that closes an unknown-sized
/// `id`. Nested unknown-sized masters are entered rather than resolved, so the
/// scan is a single flat pass. A header that fails to parse ends the search;
/// the error surfaces again when the children are walked.
fn unknown_size_end(buf: &[u8], id: &[u8], start: usize, parent_end: usize) -> usize {
    let stops = upper_level_ids(id);
    let end = parent_end.min(buf.len());
    let mut pos = start;
    while pos < end {
        let Ok(raw) = RawHeader::read(buf, pos) else {
            break;
        };
        if stops.contains(&raw.id()) {
            return pos;
        }
        pos = if raw.size.is_unknown() {
            raw.data_offset()
        } else {
            match raw.known_end() {
                Some(next) if next <= end => next,
                _ => break,
            }
        };
    }
    parent_end
}

/// IDs that end an unknown-sized element when met among its children.
fn upper_level_ids(id: &[u8]) -> &'static [&'static [u8]] {
    const SEGMENT_LEVEL: &[&[u8]] = &[
        &ids::CLUSTER,
        &ids::CUES,
        &ids::TAGS,
        &ids::INFO,
        &ids::TRACKS,
        &ids::SEEK_HEAD,
        &ids::SEGMENT,
        &ids::EBML,
    ];
    const TOP_LEVEL: &[&[u8]] = &[&ids::SEGMENT, &ids::EBML];

    if id == ids::SEGMENT {
        TOP_LEVEL
    } else {
        SEGMENT_LEVEL
    }
}

/// Sibling elements between two offsets.
///
/// Stops after the first error.
#[derive(Debug, Clone)]
pub struct Children<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
    failed: bool,
}

impl<'a> Children<'a> {
    pub fn new(buf: &'a [u8], start: usize, end: usize) -> Self {
        Self {
            buf,
            pos: start,
            end: end.min(buf.len()),
            failed: false,
        }
    }

    /// Top-level elements of a whole file.
    pub fn top_level(buf: &'a [u8]) -> Self {
        Self::new(buf, 0, buf.len())
    }
}

impl Iterator for Children<'_> {
    type Item = Result<ElementHeader, ContainerStructureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.end {
            return None;
        }

        match ElementHeader::read(self.buf, self.pos, self.end) {
            Ok(header) => {
                self.pos = header.end;
                Some(Ok(header))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::ebml::{put_element, put_uint, UNKNOWN_SIZE};

    #[test]
    fn walks_siblings_by_declared_size() {
        let mut buf = BytesMut::new();
        // a payload that happens to contain the Cluster ID must be skipped
        put_element(&mut buf, &ids::VOID, &ids::CLUSTER).unwrap();
        put_uint(&mut buf, &ids::TRACK_NUMBER, 1).unwrap();

        let headers: Vec<_> = Children::top_level(&buf)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(headers.len(), 2);
        assert!(headers[0].is(&ids::VOID));
        assert_eq!(headers[0].payload(&buf), &ids::CLUSTER);
        assert!(headers[1].is(&ids::TRACK_NUMBER));
        assert_eq!(headers[1].offset, 6);
        assert_eq!(headers[1].data_offset(), 8);
        assert_eq!(headers[1].size, Some(1));
    }

    #[test]
    fn unknown_sized_cluster_ends_at_next_cluster() {
        let mut buf = BytesMut::new();
        for _ in 0..2 {
            buf.extend_from_slice(&ids::CLUSTER);
            buf.extend_from_slice(&UNKNOWN_SIZE);
            put_uint(&mut buf, &ids::TIMECODE, 0).unwrap();
            put_element(&mut buf, &ids::SIMPLE_BLOCK, &[0x81, 0, 0, 0x80]).unwrap();
        }

        let clusters: Vec<_> = Children::top_level(&buf)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].size, None);
        assert_eq!(clusters[0].end, clusters[1].offset);
        assert_eq!(clusters[1].end, buf.len());
        assert_eq!(clusters[0].children(&buf).count(), 2);
    }

    #[test]
    fn unknown_sized_segment_spans_unknown_sized_clusters() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&ids::SEGMENT);
        buf.extend_from_slice(&UNKNOWN_SIZE);
        for timecode in 0..3 {
            buf.extend_from_slice(&ids::CLUSTER);
            buf.extend_from_slice(&UNKNOWN_SIZE);
            put_uint(&mut buf, &ids::TIMECODE, timecode).unwrap();
        }
        let second_segment = buf.len();
        buf.extend_from_slice(&ids::SEGMENT);
        buf.extend_from_slice(&UNKNOWN_SIZE);

        let segments: Vec<_> = Children::top_level(&buf)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].end, second_segment);

        let clusters: Vec<_> = segments[0]
            .children(&buf)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[2].end, second_segment);
    }

    #[test]
    fn truncated_element_is_an_error() {
        let mut buf = BytesMut::new();
        put_element(&mut buf, &ids::VOID, &[0; 10]).unwrap();
        let cut = &buf[..6];

        let mut children = Children::top_level(cut);
        assert_eq!(
            children.next(),
            Some(Err(ContainerStructureError::Truncated { offset: 0 }))
        );
        assert_eq!(children.next(), None);
    }

    #[test]
    fn unknown_size_only_for_masters() {
        let buf = [0xD7, 0xFF, 0x01];
        assert_eq!(
            ElementHeader::read(&buf, 0, buf.len()),
            Err(ContainerStructureError::UnknownSize {
                element: "TrackNumber",
                offset: 0
            })
        );
    }

    #[test]
    fn rejects_overlong_id() {
        let buf = [0x08, 0x00, 0x00, 0x00, 0x00, 0x80];
        assert_eq!(
            ElementHeader::read(&buf, 0, buf.len()),
            Err(ContainerStructureError::InvalidVarInt { offset: 0 })
        );
    }
}
