use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::{info, warn};

use crate::{
    duration::{patch_duration, PatchKind},
    naming::with_duration_suffix,
};

#[derive(Debug, Clone, Args)]
pub struct FixDurationArgs {
    /// WebM file to repair
    pub input: PathBuf,

    /// Length of the recording in milliseconds
    #[arg(short, long, env = "WEBM_CAPTURE_DURATION_MS")]
    pub duration_ms: f64,

    /// Where to write the result, defaults to the input name with the duration appended
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Fail instead of writing the unpatched bytes when the file cannot be repaired
    #[arg(long, env = "WEBM_CAPTURE_STRICT")]
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixDurationReport {
    pub output: PathBuf,
    pub bytes: usize,
    /// `None` when the file was written without a patch.
    pub patch: Option<PatchKind>,
}

fn default_output(input: &std::path::Path, duration_ms: f64) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording.webm".to_owned());
    input.with_file_name(with_duration_suffix(&file_name, duration_ms))
}

pub async fn run(args: FixDurationArgs) -> anyhow::Result<FixDurationReport> {
    let FixDurationArgs {
        input,
        duration_ms,
        output,
        strict,
    } = args;

    let data = tokio::fs::read(&input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    info!(?input, len = data.len(), duration_ms, "Fixing duration");

    let patched = patch_duration(&data, duration_ms);
    let patch = match patched.outcome {
        Ok(kind) => Some(kind),
        Err(e) if strict => {
            return Err(anyhow::Error::new(e)
                .context(format!("cannot fix duration of {}", input.display())));
        }
        Err(e) => {
            warn!(error = %e, "Writing the recording without a duration");
            None
        }
    };

    let output = output.unwrap_or_else(|| default_output(&input, duration_ms));
    tokio::fs::write(&output, &patched.data)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    info!(?output, bytes = patched.data.len(), "Recording written");
    Ok(FixDurationReport {
        output,
        bytes: patched.data.len(),
        patch,
    })
}
