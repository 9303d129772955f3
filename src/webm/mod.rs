//! Incremental WebM writer.
//!
//! The writer goes through `Empty -> HeaderEmitted -> Appending -> Finalized`.
//! The header (EBML header, Segment start, Info, Tracks) is produced once;
//! every video frame then opens its own Cluster, and audio frames are added
//! to the most recent one. The open cluster is held back until the next video
//! frame or [`WebmWriter::finalize`] so that its size is exact.

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, trace};
use typed_builder::TypedBuilder;

use crate::{
    ebml::{ids, put_element, put_string, put_uint, UNKNOWN_SIZE},
    error::{ConfigurationError, Result, SequenceError},
};

use block::{simple_block, OpenCluster};
use tracks::{audio_track_entry, video_track_entry};

pub mod block;
pub mod tracks;

pub use tracks::{AudioConfig, VideoConfig, AUDIO_TRACK_NUMBER, VIDEO_TRACK_NUMBER};

/// Nanoseconds per timestamp tick. Ticks are milliseconds.
pub const TIMECODE_SCALE_NS: u64 = 1_000_000;

pub const MIME_TYPE: &str = "video/webm";

const DOC_TYPE: &str = "webm";
const DOC_TYPE_VERSION: u64 = 4;
const DOC_TYPE_READ_VERSION: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct WriterOptions {
    #[builder(default = env!("CARGO_PKG_NAME").to_owned(), setter(into))]
    pub muxing_app: String,
    #[builder(default = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")).to_owned(), setter(into))]
    pub writing_app: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// One encoded frame as handed over by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Milliseconds since the start of the recording.
    pub timestamp_ms: u64,
    pub data: &'a [u8],
    pub is_keyframe: bool,
}

impl<'a> Frame<'a> {
    pub fn key(timestamp_ms: u64, data: &'a [u8]) -> Self {
        Self {
            timestamp_ms,
            data,
            is_keyframe: true,
        }
    }

    pub fn delta(timestamp_ms: u64, data: &'a [u8]) -> Self {
        Self {
            timestamp_ms,
            data,
            is_keyframe: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Empty,
    HeaderEmitted,
    Appending,
    Finalized,
}

#[derive(Debug)]
pub struct WebmWriter {
    options: WriterOptions,
    state: WriterState,
    chunks: Vec<Bytes>,
    has_audio: bool,
    cluster: Option<OpenCluster>,
    last_video_timestamp: Option<u64>,
    last_timestamp: Option<u64>,
    clusters: usize,
}

impl Default for WebmWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl WebmWriter {
    pub fn new() -> Self {
        Self::with_options(WriterOptions::default())
    }

    pub fn with_options(options: WriterOptions) -> Self {
        Self {
            options,
            state: WriterState::Empty,
            chunks: Vec::new(),
            has_audio: false,
            cluster: None,
            last_video_timestamp: None,
            last_timestamp: None,
            clusters: 0,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Highest frame timestamp seen so far.
    pub fn last_timestamp_ms(&self) -> Option<u64> {
        self.last_timestamp
    }

    /// Emits the file preamble. Must be called exactly once, before any frame.
    pub fn generate_header(
        &mut self,
        video: &VideoConfig,
        audio: Option<&AudioConfig>,
    ) -> Result<Bytes> {
        if self.state != WriterState::Empty {
            return Err(SequenceError::HeaderAlreadyGenerated.into());
        }

        video.validate()?;
        if let Some(audio) = audio {
            audio.validate()?;
        }

        let mut tracks = video_track_entry(video)?;
        if let Some(audio) = audio {
            tracks.extend_from_slice(&audio_track_entry(audio)?);
        }

        let mut segment = BytesMut::new();
        put_element(&mut segment, &ids::INFO, &self.segment_info()?)?;
        put_element(&mut segment, &ids::TRACKS, &tracks)?;

        let mut header = ebml_header()?;
        header.extend_from_slice(&ids::SEGMENT);
        header.extend_from_slice(&UNKNOWN_SIZE);
        header.extend_from_slice(&segment);
        let header = header.freeze();

        info!(
            width = video.width,
            height = video.height,
            video_codec = %video.codec_id,
            audio_codec = audio.map(|audio| audio.codec_id.as_str()),
            header_len = header.len(),
            "WebM header generated"
        );

        self.has_audio = audio.is_some();
        self.chunks.push(header.clone());
        self.state = WriterState::HeaderEmitted;
        Ok(header)
    }

    /// Opens a new cluster at the frame's timestamp and writes the frame into it.
    pub fn add_video_frame(&mut self, frame: Frame<'_>) -> Result<()> {
        self.ensure_appendable()?;

        if let Some(previous) = self.last_video_timestamp {
            if frame.timestamp_ms < previous {
                return Err(SequenceError::TimestampRegression {
                    previous,
                    current: frame.timestamp_ms,
                }
                .into());
            }
        }

        let block = simple_block(VIDEO_TRACK_NUMBER, 0, frame.is_keyframe, frame.data)?;
        self.open_cluster(frame.timestamp_ms)?;
        self.push_block(&block, frame.timestamp_ms)?;
        self.last_video_timestamp = Some(frame.timestamp_ms);
        Ok(())
    }

    /// Adds an audio block to the open cluster, or to a fresh one when the
    /// timestamp cannot be expressed relative to it.
    pub fn add_audio_frame(&mut self, frame: Frame<'_>) -> Result<()> {
        self.ensure_appendable()?;
        if !self.has_audio {
            return Err(ConfigurationError::UnknownTrack(AUDIO_TRACK_NUMBER).into());
        }

        let relative = self
            .cluster
            .as_ref()
            .and_then(|cluster| cluster.relative(frame.timestamp_ms));
        let block = simple_block(
            AUDIO_TRACK_NUMBER,
            relative.unwrap_or_default(),
            frame.is_keyframe,
            frame.data,
        )?;
        if relative.is_none() {
            debug!(
                timestamp_ms = frame.timestamp_ms,
                "Audio frame outside the open cluster, starting a new one"
            );
            self.open_cluster(frame.timestamp_ms)?;
        }

        self.push_block(&block, frame.timestamp_ms)
    }

    /// Routes a frame by track number.
    pub fn add_frame(&mut self, track_number: u8, frame: Frame<'_>) -> Result<()> {
        match track_number {
            VIDEO_TRACK_NUMBER => self.add_video_frame(frame),
            AUDIO_TRACK_NUMBER => self.add_audio_frame(frame),
            other => Err(ConfigurationError::UnknownTrack(other).into()),
        }
    }

    /// Closes the open cluster and returns the whole file.
    pub fn finalize(&mut self) -> Result<Bytes> {
        match self.state {
            WriterState::Empty => return Err(SequenceError::HeaderNotGenerated.into()),
            WriterState::Finalized => return Err(SequenceError::Finalized.into()),
            WriterState::HeaderEmitted | WriterState::Appending => {}
        }

        self.close_cluster()?;

        let chunks = std::mem::take(&mut self.chunks);
        let total = chunks.iter().map(Bytes::len).sum();
        let mut out = BytesMut::with_capacity(total);
        for chunk in &chunks {
            out.extend_from_slice(chunk);
        }

        self.state = WriterState::Finalized;
        info!(
            bytes = total,
            clusters = self.clusters,
            last_timestamp_ms = self.last_timestamp,
            "WebM finalized"
        );
        Ok(out.freeze())
    }

    fn ensure_appendable(&self) -> Result<()> {
        match self.state {
            WriterState::Empty => Err(SequenceError::HeaderNotGenerated.into()),
            WriterState::Finalized => Err(SequenceError::Finalized.into()),
            WriterState::HeaderEmitted | WriterState::Appending => Ok(()),
        }
    }

    fn segment_info(&self) -> Result<BytesMut> {
        let mut info = BytesMut::new();
        put_uint(&mut info, &ids::TIMECODE_SCALE, TIMECODE_SCALE_NS)?;
        put_string(&mut info, &ids::MUXING_APP, &self.options.muxing_app)?;
        put_string(&mut info, &ids::WRITING_APP, &self.options.writing_app)?;
        Ok(info)
    }

    fn open_cluster(&mut self, timecode: u64) -> Result<()> {
        self.close_cluster()?;
        self.cluster = Some(OpenCluster::new(timecode)?);
        self.clusters += 1;
        Ok(())
    }

    fn close_cluster(&mut self) -> Result<()> {
        if let Some(cluster) = self.cluster.take() {
            trace!(
                timecode = cluster.timecode(),
                blocks = cluster.blocks(),
                "Closing cluster"
            );
            self.chunks.push(cluster.finish()?);
        }
        Ok(())
    }

    /// Appends an encoded block to the cluster opened for it.
    fn push_block(&mut self, block: &[u8], timestamp_ms: u64) -> Result<()> {
        let Some(cluster) = self.cluster.as_mut() else {
            return Err(SequenceError::HeaderNotGenerated.into());
        };
        cluster.push(block);

        self.last_timestamp = Some(
            self.last_timestamp
                .map_or(timestamp_ms, |last| last.max(timestamp_ms)),
        );
        self.state = WriterState::Appending;
        Ok(())
    }
}

fn ebml_header() -> Result<BytesMut> {
    let mut body = BytesMut::new();
    put_uint(&mut body, &ids::EBML_VERSION, 1)?;
    put_uint(&mut body, &ids::EBML_READ_VERSION, 1)?;
    put_uint(&mut body, &ids::EBML_MAX_ID_LENGTH, 4)?;
    put_uint(&mut body, &ids::EBML_MAX_SIZE_LENGTH, 8)?;
    put_string(&mut body, &ids::DOC_TYPE, DOC_TYPE)?;
    put_uint(&mut body, &ids::DOC_TYPE_VERSION, DOC_TYPE_VERSION)?;
    put_uint(&mut body, &ids::DOC_TYPE_READ_VERSION, DOC_TYPE_READ_VERSION)?;

    let mut out = BytesMut::new();
    put_element(&mut out, &ids::EBML, &body)?;
    Ok(out)
}
