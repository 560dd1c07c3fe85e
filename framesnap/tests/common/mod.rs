// NOTE: every test will complain about the functions it doesn't use
#![allow(unused)]

use std::{path::PathBuf, process::Stdio, sync::Once};

pub const TEST_VIDEO_FRAMES: usize = 250;
pub const TEST_VIDEO_LENGTH_SEC: u64 = 10;
pub const TEST_VIDEO_FPS: u64 = 25;

/// Returns cargo's tmpdir
pub fn cargo_tmpdir() -> PathBuf {
    PathBuf::from(option_env!("CARGO_TARGET_TMPDIR").expect("no cargo tmpdir???"))
}

/// A 10 second, 25 fps, test pattern video. Created once per test binary, under a name
/// unique to it.
pub fn create_test_video(name: &str) -> PathBuf {
    let tmpvideo = cargo_tmpdir().join(format!("{name}.mkv"));

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let lavfi = format!("testsrc=duration={TEST_VIDEO_LENGTH_SEC}:rate={TEST_VIDEO_FPS}");
        run_ffmpeg(&["-f", "lavfi", "-i", lavfi.as_str(), path_str(&tmpvideo)]);
    });

    tmpvideo
}

/// A stream copy of a test video, cut so that it starts between two keyframes. The
/// first keyframe is therefore not at the start of the stream.
pub fn create_cut_video(name: &str) -> PathBuf {
    let source = cargo_tmpdir().join(format!("{name}_source.mkv"));
    let cut = cargo_tmpdir().join(format!("{name}.mkv"));

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let lavfi = format!("testsrc=duration={TEST_VIDEO_LENGTH_SEC}:rate={TEST_VIDEO_FPS}");
        run_ffmpeg(&["-f", "lavfi", "-i", lavfi.as_str(), "-g", "25", path_str(&source)]);
        run_ffmpeg(&[
            "-i",
            path_str(&source),
            "-ss",
            "0.52",
            "-c",
            "copy",
            "-copyinkf",
            path_str(&cut),
        ]);
    });

    cut
}

fn path_str(path: &std::path::Path) -> &str {
    path.as_os_str().to_str().expect("no probs, probably")
}

fn run_ffmpeg(args: &[&str]) {
    let output = args.last().expect("has an output file");
    std::fs::remove_file(output).ok();
    let status = std::process::Command::new("ffmpeg")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .status()
        .expect("failed to execute ffmpeg");
    assert!(status.success(), "ffmpeg failed on {args:?}");
}

pub fn float_cmp(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}
