mod common;

use std::time::Duration;

use common::{
    create_cut_video, create_test_video, float_cmp, TEST_VIDEO_FRAMES,
    TEST_VIDEO_LENGTH_SEC,
};
use framesnap::frame_extractor::{self, init_ffmpeg, FrameExtractor};

fn test_video() -> std::path::PathBuf {
    create_test_video("frame_extractor_test")
}

#[test]
fn test_total_frames() -> frame_extractor::Result<()> {
    let mut frames = FrameExtractor::new(test_video())?;
    let mut count = 0;
    while frames.next()?.is_some() {
        count += 1;
        assert!(count <= TEST_VIDEO_FRAMES);
    }
    assert_eq!(TEST_VIDEO_FRAMES, count);
    Ok(())
}

#[test]
fn test_length() -> frame_extractor::Result<()> {
    let frames = FrameExtractor::new(test_video())?;
    assert!(float_cmp(
        TEST_VIDEO_LENGTH_SEC as f64,
        frames.length().as_secs_f64(),
        0.1
    ));
    Ok(())
}

#[test]
fn test_seeking_at_eof() -> frame_extractor::Result<()> {
    let mut frames = FrameExtractor::new(test_video())?;

    frames.seek_forward(Duration::from_secs(TEST_VIDEO_LENGTH_SEC - 1))?;
    while frames.next()?.is_some() {}

    frames.seek_forward(Duration::from_secs(1))?;
    assert!(frames.next()?.is_none());

    frames.seek_to_beginning()?;
    let (ts, _) = frames.next()?.expect("the first frame");
    assert_eq!(Duration::ZERO, ts.to_duration());
    Ok(())
}

#[test]
fn test_frame_at_start() -> frame_extractor::Result<()> {
    let mut frames = FrameExtractor::new(test_video())?;
    let (ts, img) = frames.frame_at(Duration::ZERO)?.expect("the first frame");
    assert_eq!(Duration::ZERO, ts.to_duration());
    assert!(img.width() > 0 && img.height() > 0);
    Ok(())
}

#[test]
fn test_frame_at_middle() -> frame_extractor::Result<()> {
    let mut frames = FrameExtractor::new(test_video())?;
    let (ts, _) = frames
        .frame_at(Duration::from_millis(4_530))?
        .expect("a middle frame");
    // the frame on screen at 4.53s, with one every 40ms
    assert!(float_cmp(4.52, ts.to_duration().as_secs_f64(), 0.001), "{ts}");

    let (ts, _) = frames
        .frame_at(Duration::from_millis(4_560))?
        .expect("an exact frame");
    assert!(float_cmp(4.56, ts.to_duration().as_secs_f64(), 0.001), "{ts}");
    Ok(())
}

#[test]
fn test_starts_without_keyframe() -> frame_extractor::Result<()> {
    let mut frames = FrameExtractor::new(create_cut_video("frame_extractor_test_cut"))?;

    assert!(frames.frame_at(Duration::ZERO)?.is_some());

    let length = frames.length();
    let (ts, _) = frames.frame_at(length)?.expect("the last frame");
    assert!(ts.to_duration() <= length);
    Ok(())
}

#[test]
fn test_init_keeps_first_level() -> frame_extractor::Result<()> {
    let first = init_ffmpeg(log::LevelFilter::Warn)?;
    assert_eq!(first, init_ffmpeg(log::LevelFilter::Trace)?);
    FrameExtractor::new(test_video())?;
    assert_eq!(first, init_ffmpeg(log::LevelFilter::Off)?);
    Ok(())
}

#[test]
fn test_frame_at_end_is_last_frame() -> frame_extractor::Result<()> {
    let mut frames = FrameExtractor::new(test_video())?;
    let length = frames.length();

    let (ts, _) = frames.frame_at(length)?.expect("the last frame");
    assert!(float_cmp(9.96, ts.to_duration().as_secs_f64(), 0.001), "{ts}");

    let (ts, _) = frames
        .frame_at(length + Duration::from_secs(5))?
        .expect("still the last frame");
    assert!(float_cmp(9.96, ts.to_duration().as_secs_f64(), 0.001), "{ts}");

    // going backwards works as well
    let (ts, _) = frames.frame_at(Duration::from_secs(1))?.expect("a frame");
    assert!(float_cmp(1.0, ts.to_duration().as_secs_f64(), 0.001), "{ts}");
    Ok(())
}
