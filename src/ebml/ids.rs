//! Element IDs of the WebM subset this crate reads and writes.
//!
//! IDs are kept as the literal bytes that appear in the stream, marker bits
//! included.

pub const EBML: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];
pub const EBML_VERSION: [u8; 2] = [0x42, 0x86];
pub const EBML_READ_VERSION: [u8; 2] = [0x42, 0xF7];
pub const EBML_MAX_ID_LENGTH: [u8; 2] = [0x42, 0xF2];
pub const EBML_MAX_SIZE_LENGTH: [u8; 2] = [0x42, 0xF3];
pub const DOC_TYPE: [u8; 2] = [0x42, 0x82];
pub const DOC_TYPE_VERSION: [u8; 2] = [0x42, 0x87];
pub const DOC_TYPE_READ_VERSION: [u8; 2] = [0x42, 0x85];

pub const SEGMENT: [u8; 4] = [0x18, 0x53, 0x80, 0x67];
pub const SEEK_HEAD: [u8; 4] = [0x11, 0x4D, 0x9B, 0x74];
pub const VOID: [u8; 1] = [0xEC];

pub const INFO: [u8; 4] = [0x15, 0x49, 0xA9, 0x66];
pub const TIMECODE_SCALE: [u8; 3] = [0x2A, 0xD7, 0xB1];
pub const MUXING_APP: [u8; 2] = [0x4D, 0x80];
pub const WRITING_APP: [u8; 2] = [0x57, 0x41];
pub const DURATION: [u8; 2] = [0x44, 0x89];

pub const TRACKS: [u8; 4] = [0x16, 0x54, 0xAE, 0x6B];
pub const TRACK_ENTRY: [u8; 1] = [0xAE];
pub const TRACK_NUMBER: [u8; 1] = [0xD7];
pub const TRACK_UID: [u8; 2] = [0x73, 0xC5];
pub const TRACK_TYPE: [u8; 1] = [0x83];
pub const CODEC_ID: [u8; 1] = [0x86];
pub const CODEC_PRIVATE: [u8; 2] = [0x63, 0xA2];
pub const VIDEO: [u8; 1] = [0xE0];
pub const PIXEL_WIDTH: [u8; 1] = [0xB0];
pub const PIXEL_HEIGHT: [u8; 1] = [0xBA];
pub const AUDIO: [u8; 1] = [0xE1];
pub const SAMPLING_FREQUENCY: [u8; 1] = [0xB5];
pub const CHANNELS: [u8; 1] = [0x9F];

pub const CLUSTER: [u8; 4] = [0x1F, 0x43, 0xB6, 0x75];
pub const TIMECODE: [u8; 1] = [0xE7];
pub const SIMPLE_BLOCK: [u8; 1] = [0xA3];
pub const BLOCK_GROUP: [u8; 1] = [0xA0];
pub const CUES: [u8; 4] = [0x1C, 0x53, 0xBB, 0x6B];
pub const TAGS: [u8; 4] = [0x12, 0x54, 0xC3, 0x67];

/// IDs whose payload is a list of child elements.
const MASTERS: [&[u8]; 10] = [
    &EBML,
    &SEGMENT,
    &SEEK_HEAD,
    &INFO,
    &TRACKS,
    &TRACK_ENTRY,
    &VIDEO,
    &AUDIO,
    &CLUSTER,
    &BLOCK_GROUP,
];

pub fn is_master(id: &[u8]) -> bool {
    MASTERS.contains(&id)
}

/// Human readable name for the IDs above, used when dumping a file.
pub fn name(id: &[u8]) -> Option<&'static str> {
    let name = match id {
        [0x1A, 0x45, 0xDF, 0xA3] => "EBML",
        [0x42, 0x86] => "EBMLVersion",
        [0x42, 0xF7] => "EBMLReadVersion",
        [0x42, 0xF2] => "EBMLMaxIDLength",
        [0x42, 0xF3] => "EBMLMaxSizeLength",
        [0x42, 0x82] => "DocType",
        [0x42, 0x87] => "DocTypeVersion",
        [0x42, 0x85] => "DocTypeReadVersion",
        [0x18, 0x53, 0x80, 0x67] => "Segment",
        [0x11, 0x4D, 0x9B, 0x74] => "SeekHead",
        [0xEC] => "Void",
        [0x15, 0x49, 0xA9, 0x66] => "Info",
        [0x2A, 0xD7, 0xB1] => "TimecodeScale",
        [0x4D, 0x80] => "MuxingApp",
        [0x57, 0x41] => "WritingApp",
        [0x44, 0x89] => "Duration",
        [0x16, 0x54, 0xAE, 0x6B] => "Tracks",
        [0xAE] => "TrackEntry",
        [0xD7] => "TrackNumber",
        [0x73, 0xC5] => "TrackUID",
        [0x83] => "TrackType",
        [0x86] => "CodecID",
        [0x63, 0xA2] => "CodecPrivate",
        [0xE0] => "Video",
        [0xB0] => "PixelWidth",
        [0xBA] => "PixelHeight",
        [0xE1] => "Audio",
        [0xB5] => "SamplingFrequency",
        [0x9F] => "Channels",
        [0x1F, 0x43, 0xB6, 0x75] => "Cluster",
        [0xE7] => "Timecode",
        [0xA3] => "SimpleBlock",
        [0xA0] => "BlockGroup",
        [0x1C, 0x53, 0xBB, 0x6B] => "Cues",
        [0x12, 0x54, 0xC3, 0x67] => "Tags",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_cover_masters() {
        for id in MASTERS {
            assert!(name(id).is_some(), "{id:02X?} has no name");
        }
        assert_eq!(name(&DURATION), Some("Duration"));
        assert_eq!(name(&[0x99]), None);
    }
}
