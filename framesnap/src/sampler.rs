use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{self, Context};
use image::{ImageFormat, RgbImage};
use snaps_common::bin_common::termination::Cookie;
use snaps_common::utils::{fsutils, math};

use crate::frame_extractor::{self, FrameExtractor, Timestamp};

/// Something frames can be requested from by time.
pub trait FrameSource {
    fn length(&self) -> Duration;

    /// The frame nearest to `at`, see [`FrameExtractor::frame_at`].
    fn frame_at(
        &mut self,
        at: Duration,
    ) -> frame_extractor::Result<Option<(Timestamp, RgbImage)>>;
}

impl FrameSource for FrameExtractor {
    fn length(&self) -> Duration {
        FrameExtractor::length(self)
    }

    fn frame_at(
        &mut self,
        at: Duration,
    ) -> frame_extractor::Result<Option<(Timestamp, RgbImage)>> {
        FrameExtractor::frame_at(self, at)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SampleError {
    #[error("No frame could be decoded near {}", human(.0))]
    NoFrame(Duration),
    #[error("Interrupted after {0} frames")]
    Interrupted(usize),
    #[error("The prefix {0:?} does not make a valid file name")]
    BadPrefix(String),
    #[error("Must take at least one frame")]
    NoSamples,
}

fn human(dur: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*dur)
}

#[derive(Debug, Clone)]
pub struct SnapOptions {
    pub num: usize,
    pub prefix: String,
    pub format: ImageFormat,
    pub start: Duration,
    /// Defaults to the end of the video
    pub stop: Option<Duration>,
}

impl Default for SnapOptions {
    fn default() -> Self {
        Self {
            num: 12,
            prefix: "img".to_string(),
            format: ImageFormat::Png,
            start: Duration::ZERO,
            stop: None,
        }
    }
}

impl SnapOptions {
    pub fn filename(&self, index: usize) -> String {
        let ext = self.format.extensions_str().first().copied().unwrap_or("img");
        format!("{}_{}.{}", self.prefix, index, ext)
    }

    pub fn validate(&self) -> Result<(), SampleError> {
        if self.num == 0 {
            return Err(SampleError::NoSamples);
        }
        if !fsutils::is_basename(self.filename(0)) {
            return Err(SampleError::BadPrefix(self.prefix.clone()));
        }
        Ok(())
    }
}

/// A written frame
#[derive(Debug, Clone)]
pub struct Snap {
    pub index: usize,
    pub requested: Duration,
    pub actual: Timestamp,
    pub path: PathBuf,
}

/// `num` evenly spaced points in time between `start` and `stop`, both included.
pub fn snap_times(start: Duration, stop: Duration, num: usize) -> Vec<Duration> {
    let stop = stop.max(start);
    math::linspace(start.as_secs_f64(), stop.as_secs_f64(), num)
        .into_iter()
        .map(|secs| Duration::from_secs_f64(secs).clamp(start, stop))
        .collect()
}

/// Writes `options.num` evenly spaced frames of `source` into `outdir`, which must
/// exist. Existing files with the same names are overwritten.
pub fn sample(
    source: &mut impl FrameSource,
    outdir: &Path,
    options: &SnapOptions,
    cookie: &Cookie,
) -> eyre::Result<Vec<Snap>> {
    options.validate()?;

    let length = source.length();
    let start = options.start.min(length);
    let stop = options.stop.unwrap_or(length).min(length);
    let times = snap_times(start, stop, options.num);
    log::debug!(
        "Taking {} frames between {} and {} of a {} long video",
        times.len(),
        humantime::Duration::from(start),
        humantime::Duration::from(stop.max(start)),
        humantime::Duration::from(length)
    );

    let mut snaps = Vec::with_capacity(times.len());
    for (index, requested) in times.into_iter().enumerate() {
        if cookie.is_terminating() {
            return Err(SampleError::Interrupted(index).into());
        }

        let (actual, img) = source
            .frame_at(requested)?
            .ok_or(SampleError::NoFrame(requested))?;

        let path = outdir.join(options.filename(index));
        img.save_with_format(&path, options.format)
            .wrap_err_with(|| format!("Failed to write {path:?}"))?;
        log::info!("Wrote {} ({})", path.display(), actual);

        snaps.push(Snap {
            index,
            requested,
            actual,
            path,
        });
    }

    Ok(snaps)
}
