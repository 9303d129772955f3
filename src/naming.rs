//! File names for finished recordings.

use chrono::{DateTime, TimeZone};

/// Appends the recording length to a `.webm` file name, e.g.
/// `clip.webm` -> `clip_1m5s.webm`.
pub fn with_duration_suffix(file_name: &str, duration_ms: f64) -> String {
    let seconds = (duration_ms.max(0.0) / 1000.0).floor() as u64;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    let time = if hours > 0 {
        format!("{hours}h{}m{}s", minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{minutes}m{}s", seconds % 60)
    } else {
        format!("{seconds}s")
    };

    let base = file_name.strip_suffix(".webm").unwrap_or(file_name);
    format!("{base}_{time}.webm")
}

/// Makes sure `base` ends in `.<format>`, replacing any other extension.
pub fn with_extension(base: &str, format: &str) -> String {
    let extension = format!(".{format}");
    if base.ends_with(&extension) {
        return base.to_owned();
    }

    // only the last path component can carry the extension
    let name_start = base.rfind('/').map_or(0, |slash| slash + 1);
    let stem = match base[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &base[..name_start + dot],
        _ => base,
    };
    format!("{stem}{extension}")
}

/// Default name for a recording started at `started`.
pub fn recording_file_name<Tz: TimeZone>(started: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("recording_{}.webm", started.format("%Y-%m-%d_%H-%M-%S"))
}
