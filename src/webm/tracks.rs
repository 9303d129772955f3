use bytes::{Bytes, BytesMut};
use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::{
    ebml::{ids, put_element, put_float, put_string, put_uint},
    error::{ConfigurationError, Result},
};

pub const VIDEO_TRACK_NUMBER: u8 = 1;
pub const AUDIO_TRACK_NUMBER: u8 = 2;

pub const DEFAULT_VIDEO_CODEC: &str = "V_VP9";
pub const DEFAULT_AUDIO_CODEC: &str = "A_OPUS";

const TRACK_TYPE_VIDEO: u64 = 1;
const TRACK_TYPE_AUDIO: u64 = 2;

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_owned()
}

fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_owned()
}

#[derive(Debug, Clone, PartialEq, TypedBuilder, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConfig {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[builder(default = default_video_codec(), setter(into))]
    #[serde(default = "default_video_codec")]
    pub codec_id: String,
    #[builder(default, setter(strip_option, into))]
    #[serde(skip)]
    pub codec_private: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, TypedBuilder, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfig {
    #[serde(default)]
    pub sample_rate: f64,
    #[serde(default, alias = "numberOfChannels")]
    pub channels: u8,
    #[builder(default = default_audio_codec(), setter(into))]
    #[serde(default = "default_audio_codec")]
    pub codec_id: String,
    #[builder(default, setter(strip_option, into))]
    #[serde(skip)]
    pub codec_private: Option<Bytes>,
}

impl VideoConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigurationError::MissingDimensions {
                width: self.width,
                height: self.height,
            });
        }
        validate_codec_id(&self.codec_id, VIDEO_TRACK_NUMBER)
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(ConfigurationError::InvalidSampleRate(self.sample_rate));
        }
        if self.channels == 0 {
            return Err(ConfigurationError::MissingChannels);
        }
        validate_codec_id(&self.codec_id, AUDIO_TRACK_NUMBER)
    }
}

fn validate_codec_id(codec_id: &str, track_number: u8) -> Result<(), ConfigurationError> {
    if codec_id.is_empty() || !codec_id.is_ascii() {
        return Err(ConfigurationError::InvalidCodecId { track_number });
    }
    Ok(())
}

/// Fields shared by every TrackEntry. The UID is the track number.
fn put_track_common(
    buf: &mut BytesMut,
    track_number: u8,
    track_type: u64,
    codec_id: &str,
    codec_private: Option<&Bytes>,
) -> Result<()> {
    put_uint(buf, &ids::TRACK_NUMBER, u64::from(track_number))?;
    put_uint(buf, &ids::TRACK_UID, u64::from(track_number))?;
    put_uint(buf, &ids::TRACK_TYPE, track_type)?;
    put_string(buf, &ids::CODEC_ID, codec_id)?;
    if let Some(private) = codec_private {
        put_element(buf, &ids::CODEC_PRIVATE, private)?;
    }
    Ok(())
}

pub(crate) fn video_track_entry(config: &VideoConfig) -> Result<BytesMut> {
    let mut video = BytesMut::new();
    put_uint(&mut video, &ids::PIXEL_WIDTH, u64::from(config.width))?;
    put_uint(&mut video, &ids::PIXEL_HEIGHT, u64::from(config.height))?;

    let mut entry = BytesMut::new();
    put_track_common(
        &mut entry,
        VIDEO_TRACK_NUMBER,
        TRACK_TYPE_VIDEO,
        &config.codec_id,
        config.codec_private.as_ref(),
    )?;
    put_element(&mut entry, &ids::VIDEO, &video)?;

    let mut out = BytesMut::new();
    put_element(&mut out, &ids::TRACK_ENTRY, &entry)?;
    Ok(out)
}

pub(crate) fn audio_track_entry(config: &AudioConfig) -> Result<BytesMut> {
    let mut audio = BytesMut::new();
    put_float(&mut audio, &ids::SAMPLING_FREQUENCY, config.sample_rate)?;
    put_uint(&mut audio, &ids::CHANNELS, u64::from(config.channels))?;

    let mut entry = BytesMut::new();
    put_track_common(
        &mut entry,
        AUDIO_TRACK_NUMBER,
        TRACK_TYPE_AUDIO,
        &config.codec_id,
        config.codec_private.as_ref(),
    )?;
    put_element(&mut entry, &ids::AUDIO, &audio)?;

    let mut out = BytesMut::new();
    put_element(&mut out, &ids::TRACK_ENTRY, &entry)?;
    Ok(out)
}
