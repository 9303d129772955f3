use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use clap::Args;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    duration::{patch_duration, PatchKind},
    naming::{recording_file_name, with_extension},
    webm::{AudioConfig, Frame, VideoConfig, WebmWriter, MIME_TYPE},
};

#[derive(Debug, Clone, Args)]
pub struct MuxArgs {
    /// JSON manifest listing the track configs and the encoded frame files
    #[arg(short, long, env = "WEBM_CAPTURE_MANIFEST")]
    pub manifest: PathBuf,

    /// Output file, defaults to a timestamped name in the current directory.
    /// The extension is forced to `.webm`.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the last frame timestamp into the Duration field
    #[arg(long)]
    pub fix_duration: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub video: VideoConfig,
    #[serde(default)]
    pub audio: Option<AudioConfig>,
    pub frames: Vec<ManifestFrame>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFrame {
    pub track: u8,
    pub timestamp_ms: u64,
    /// Encoded payload, relative to the manifest's directory.
    pub file: PathBuf,
    #[serde(default)]
    pub keyframe: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MuxReport {
    pub output: PathBuf,
    pub mime_type: &'static str,
    pub frames: usize,
    pub bytes: usize,
    pub patch: Option<PatchKind>,
}

pub async fn run(args: MuxArgs) -> anyhow::Result<MuxReport> {
    let manifest_text = tokio::fs::read_to_string(&args.manifest)
        .await
        .with_context(|| format!("reading manifest {}", args.manifest.display()))?;
    let manifest: Manifest =
        serde_json::from_str(&manifest_text).context("parsing manifest")?;
    let base = args.manifest.parent().unwrap_or(Path::new("."));

    let mut writer = WebmWriter::new();
    writer
        .generate_header(&manifest.video, manifest.audio.as_ref())
        .context("generating header")?;

    for frame in &manifest.frames {
        let path = base.join(&frame.file);
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading frame {}", path.display()))?;
        debug!(track = frame.track, timestamp_ms = frame.timestamp_ms, len = data.len(), "Frame");

        let encoded = Frame {
            timestamp_ms: frame.timestamp_ms,
            data: &data,
            is_keyframe: frame.keyframe,
        };
        writer
            .add_frame(frame.track, encoded)
            .with_context(|| format!("adding frame {}", path.display()))?;
    }

    let last_timestamp = writer.last_timestamp_ms();
    let mut data = writer.finalize().context("finalizing")?;

    let mut patch = None;
    if args.fix_duration {
        let patched = patch_duration(&data, last_timestamp.unwrap_or_default() as f64);
        patch = patched.outcome.ok();
        data = patched.data;
    }

    let output = match args.output {
        Some(output) => PathBuf::from(with_extension(&output.to_string_lossy(), "webm")),
        None => PathBuf::from(recording_file_name(&Local::now())),
    };
    tokio::fs::write(&output, &data)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    info!(
        ?output,
        mime_type = MIME_TYPE,
        frames = manifest.frames.len(),
        bytes = data.len(),
        "Muxed"
    );
    Ok(MuxReport {
        output,
        mime_type: MIME_TYPE,
        frames: manifest.frames.len(),
        bytes: data.len(),
        patch,
    })
}
