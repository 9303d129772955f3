use std::{io::Cursor, path::PathBuf};

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tracing::{error, info};
use webm_iterable::{
    matroska_spec::{Master, MatroskaSpec},
    WebmIterator,
};

use crate::{
    duration::read_duration,
    ebml::{ids, reader::Children, reader::ElementHeader},
    error::ContainerStructureError,
};

#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    /// WebM file to dump
    pub input: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Also parse the file with webm-iterable and report what it saw
    #[arg(long)]
    pub verify: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementNode {
    pub name: String,
    pub id: String,
    pub offset: usize,
    /// `None` for elements written with the unknown size.
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Verification {
    pub tags: usize,
    pub clusters: usize,
    pub blocks: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectReport {
    pub elements: Vec<ElementNode>,
    pub duration: Option<f64>,
    /// Where the size-driven walk stopped, if it could not finish.
    pub walk_error: Option<String>,
    pub verification: Option<Verification>,
}

/// Walks the whole file, descending into master elements.
pub fn element_tree(buf: &[u8]) -> (Vec<ElementNode>, Option<ContainerStructureError>) {
    let mut error = None;
    let nodes = collect(buf, Children::top_level(buf), &mut error);
    (nodes, error)
}

fn collect(
    buf: &[u8],
    children: Children<'_>,
    error: &mut Option<ContainerStructureError>,
) -> Vec<ElementNode> {
    let mut nodes = Vec::new();
    for header in children {
        let header = match header {
            Ok(header) => header,
            Err(e) => {
                error.get_or_insert(e);
                break;
            }
        };

        let children = if ids::is_master(header.id()) {
            collect(buf, header.children(buf), error)
        } else {
            Vec::new()
        };

        nodes.push(ElementNode {
            name: header.name().unwrap_or("Unknown").to_owned(),
            id: header.id().iter().map(|byte| format!("{byte:02X}")).collect(),
            offset: header.offset,
            size: header.size,
            value: describe(&header, header.payload(buf)),
            children,
        });
    }
    nodes
}

fn be_uint(payload: &[u8]) -> u64 {
    payload
        .iter()
        .take(8)
        .fold(0, |acc, byte| (acc << 8) | u64::from(*byte))
}

fn be_float(payload: &[u8]) -> Option<f64> {
    match payload.len() {
        4 => <[u8; 4]>::try_from(payload)
            .ok()
            .map(|bytes| f64::from(f32::from_be_bytes(bytes))),
        8 => <[u8; 8]>::try_from(payload).ok().map(f64::from_be_bytes),
        _ => None,
    }
}

fn describe(header: &ElementHeader, payload: &[u8]) -> Option<String> {
    let value = match header.name()? {
        "EBMLVersion" | "EBMLReadVersion" | "EBMLMaxIDLength" | "EBMLMaxSizeLength"
        | "DocTypeVersion" | "DocTypeReadVersion" | "TimecodeScale" | "TrackNumber"
        | "TrackUID" | "TrackType" | "PixelWidth" | "PixelHeight" | "Channels" | "Timecode" => {
            be_uint(payload).to_string()
        }
        "DocType" | "MuxingApp" | "WritingApp" | "CodecID" => {
            String::from_utf8_lossy(payload).into_owned()
        }
        "Duration" | "SamplingFrequency" => be_float(payload)?.to_string(),
        "SimpleBlock" => describe_block(payload)?,
        "CodecPrivate" | "Void" => format!("{} bytes", payload.len()),
        _ => return None,
    };
    Some(value)
}

fn describe_block(payload: &[u8]) -> Option<String> {
    let &[track, hi, lo, flags, ..] = payload else {
        return None;
    };
    Some(format!(
        "track {} at {:+}ms, {}, {} bytes",
        track & 0x7F,
        i16::from_be_bytes([hi, lo]),
        if flags & 0x80 != 0 { "key" } else { "delta" },
        payload.len() - 4
    ))
}

/// Runs webm-iterable over the buffer and counts what it reports.
pub fn verify(buf: &[u8]) -> Verification {
    let mut verification = Verification::default();
    for tag in WebmIterator::new(Cursor::new(buf), &[]) {
        match tag {
            Ok(MatroskaSpec::Cluster(Master::Start)) => verification.clusters += 1,
            Ok(MatroskaSpec::SimpleBlock(_)) => verification.blocks += 1,
            Ok(_) => {}
            Err(e) => {
                error!(?e, "webm-iterable rejected the file");
                verification.error = Some(format!("{e:?}"));
                break;
            }
        }
        verification.tags += 1;
    }
    verification
}

pub fn inspect(buf: &[u8], run_verify: bool) -> InspectReport {
    let (elements, walk_error) = element_tree(buf);
    InspectReport {
        elements,
        duration: read_duration(buf).ok().flatten(),
        walk_error: walk_error.map(|e| e.to_string()),
        verification: run_verify.then(|| verify(buf)),
    }
}

fn render(nodes: &[ElementNode], depth: usize, out: &mut String) {
    for node in nodes {
        let size = node
            .size
            .map_or_else(|| "unknown".to_owned(), |size| size.to_string());
        out.push_str(&format!(
            "{:indent$}{} [{}] @{} size={}",
            "",
            node.name,
            node.id,
            node.offset,
            size,
            indent = depth * 2
        ));
        if let Some(value) = &node.value {
            out.push_str(&format!(" = {value}"));
        }
        out.push('\n');
        render(&node.children, depth + 1, out);
    }
}

impl InspectReport {
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        render(&self.elements, 0, &mut out);
        match self.duration {
            Some(duration) => out.push_str(&format!("duration: {duration}ms\n")),
            None => out.push_str("duration: not set\n"),
        }
        if let Some(e) = &self.walk_error {
            out.push_str(&format!("walk stopped: {e}\n"));
        }
        if let Some(verification) = &self.verification {
            out.push_str(&format!(
                "webm-iterable: {} tags, {} clusters, {} blocks",
                verification.tags, verification.clusters, verification.blocks
            ));
            if let Some(e) = &verification.error {
                out.push_str(&format!(", error: {e}"));
            }
            out.push('\n');
        }
        out
    }
}

pub async fn run(args: InspectArgs) -> anyhow::Result<InspectReport> {
    let data = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("reading {}", args.input.display()))?;
    info!(input = ?args.input, len = data.len(), "Inspecting");

    let report = inspect(&data, args.verify);
    if args.json {
        let json = serde_json::to_string_pretty(&report).context("serializing report")?;
        println!("{json}");
    } else {
        print!("{}", report.to_text());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webm::{Frame, VideoConfig, WebmWriter};

    fn sample() -> bytes::Bytes {
        let mut writer = WebmWriter::new();
        let video = VideoConfig::builder().width(64).height(48).build();
        writer.generate_header(&video, None).unwrap();
        writer.add_video_frame(Frame::key(0, &[9, 9])).unwrap();
        writer.add_video_frame(Frame::delta(40, &[8])).unwrap();
        writer.finalize().unwrap()
    }

    #[test]
    fn tree_mirrors_file_layout() {
        let file = sample();
        let (tree, error) = element_tree(&file);
        assert_eq!(error, None);

        let top: Vec<_> = tree.iter().map(|node| node.name.as_str()).collect();
        assert_eq!(top, ["EBML", "Segment"]);

        let segment: Vec<_> = tree[1]
            .children
            .iter()
            .map(|node| node.name.as_str())
            .collect();
        assert_eq!(segment, ["Info", "Tracks", "Cluster", "Cluster"]);
        assert_eq!(tree[1].size, None);

        let doc_type = tree[0]
            .children
            .iter()
            .find(|node| node.name == "DocType")
            .unwrap();
        assert_eq!(doc_type.value.as_deref(), Some("webm"));

        let block = &tree[1].children[3].children[1];
        assert_eq!(block.name, "SimpleBlock");
        assert_eq!(block.value.as_deref(), Some("track 1 at +0ms, delta, 1 bytes"));
    }

    #[test]
    fn text_report_mentions_duration() {
        let report = inspect(&sample(), false);
        let text = report.to_text();
        assert!(text.contains("Segment [18538067]"));
        assert!(text.contains("duration: not set"));
        assert_eq!(report.verification, None);
    }

    #[test]
    fn garbage_stops_the_walk() {
        let (tree, error) = element_tree(&[0x00, 0x01]);
        assert!(tree.is_empty());
        assert_eq!(error, Some(ContainerStructureError::InvalidVarInt { offset: 0 }));
    }
}
