use webm_capture::{
    commands::{
        fix_duration::{self, FixDurationArgs},
        inspect::{self, InspectArgs},
        mux::{self, MuxArgs},
    },
    duration::read_duration,
    Frame, PatchKind, VideoConfig, WebmWriter,
};

fn recording() -> bytes::Bytes {
    let mut writer = WebmWriter::new();
    let video = VideoConfig::builder().width(800).height(600).build();
    writer.generate_header(&video, None).unwrap();
    writer.add_video_frame(Frame::key(0, &[1, 2, 3])).unwrap();
    writer.add_video_frame(Frame::delta(500, &[4])).unwrap();
    writer.finalize().unwrap()
}

#[tokio::test]
async fn fix_duration_writes_next_to_the_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("clip.webm");
    std::fs::write(&input, recording()).unwrap();

    let report = fix_duration::run(FixDurationArgs {
        input: input.clone(),
        duration_ms: 65_000.0,
        output: None,
        strict: false,
    })
    .await
    .unwrap();

    assert_eq!(report.output, dir.path().join("clip_1m5s.webm"));
    assert!(matches!(report.patch, Some(PatchKind::Inserted { .. })));

    let written = std::fs::read(&report.output).unwrap();
    assert_eq!(written.len(), report.bytes);
    assert_eq!(read_duration(&written).unwrap(), Some(65_000.0));
}

#[tokio::test]
async fn fix_duration_keeps_unrepairable_files_unless_strict() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.webm");
    std::fs::write(&input, [0x1A, 0x45, 0xDF, 0xA3, 0x80]).unwrap();
    let output = dir.path().join("out.webm");

    let report = fix_duration::run(FixDurationArgs {
        input: input.clone(),
        duration_ms: 1000.0,
        output: Some(output.clone()),
        strict: false,
    })
    .await
    .unwrap();
    assert_eq!(report.patch, None);
    assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&input).unwrap());

    let strict = fix_duration::run(FixDurationArgs {
        input,
        duration_ms: 1000.0,
        output: Some(dir.path().join("strict.webm")),
        strict: true,
    })
    .await;
    assert!(strict.is_err());
    assert!(!dir.path().join("strict.webm").exists());
}

#[tokio::test]
async fn inspect_reports_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("clip.webm");
    std::fs::write(&input, recording()).unwrap();

    let report = inspect::run(InspectArgs {
        input,
        json: true,
        verify: true,
    })
    .await
    .unwrap();

    assert_eq!(report.elements.len(), 2);
    assert_eq!(report.walk_error, None);
    assert_eq!(report.duration, None);
    let verification = report.verification.unwrap();
    assert_eq!(verification.clusters, 2);
    assert_eq!(verification.blocks, 2);
}

#[tokio::test]
async fn mux_builds_a_file_from_a_manifest() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("frames")).unwrap();
    std::fs::write(dir.path().join("frames/v0.bin"), [0x10; 20]).unwrap();
    std::fs::write(dir.path().join("frames/a0.bin"), [0x20; 6]).unwrap();
    std::fs::write(dir.path().join("frames/v1.bin"), [0x11; 5]).unwrap();

    let manifest = dir.path().join("manifest.json");
    std::fs::write(
        &manifest,
        r#"{
            "video": { "width": 1280, "height": 720 },
            "audio": { "sampleRate": 48000, "numberOfChannels": 2 },
            "frames": [
                { "track": 1, "timestampMs": 0, "file": "frames/v0.bin", "keyframe": true },
                { "track": 2, "timestampMs": 10, "file": "frames/a0.bin", "keyframe": true },
                { "track": 1, "timestampMs": 33, "file": "frames/v1.bin" }
            ]
        }"#,
    )
    .unwrap();

    let report = mux::run(MuxArgs {
        manifest,
        output: Some(dir.path().join("out.mkv")),
        fix_duration: true,
    })
    .await
    .unwrap();

    assert_eq!(report.output, dir.path().join("out.webm"));
    assert_eq!(report.mime_type, "video/webm");
    assert_eq!(report.frames, 3);
    assert!(report.patch.is_some());

    let written = std::fs::read(&report.output).unwrap();
    assert_eq!(read_duration(&written).unwrap(), Some(33.0));

    let verification = inspect::verify(&written);
    assert_eq!(verification.error, None);
    assert_eq!(verification.clusters, 2);
    assert_eq!(verification.blocks, 3);
}

#[tokio::test]
async fn mux_rejects_unknown_tracks() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("f.bin"), [0; 4]).unwrap();
    let manifest = dir.path().join("manifest.json");
    std::fs::write(
        &manifest,
        r#"{
            "video": { "width": 320, "height": 240 },
            "frames": [ { "track": 2, "timestampMs": 0, "file": "f.bin" } ]
        }"#,
    )
    .unwrap();

    let result = mux::run(MuxArgs {
        manifest,
        output: Some(dir.path().join("out.webm")),
        fix_duration: false,
    })
    .await;
    assert!(result.is_err());
}
