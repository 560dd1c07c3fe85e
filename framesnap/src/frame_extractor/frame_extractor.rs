extern crate ffmpeg_next as ffmpeg;

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use super::timestamp::Timestamp;

use color_eyre::eyre::{self, Context};
use ffmpeg::codec::Context as CodecContext;
use ffmpeg::decoder::Video as DecoderVideo;
use ffmpeg::format::context::Input as FormatContext;
use ffmpeg::format::{input_with_dictionary, Pixel};
use ffmpeg::frame::Video as FrameVideo;
use ffmpeg::media::Type;
use ffmpeg::software::scaling::context::Context as ScalingContext;
use ffmpeg::util::log as ffmpeglog;
use ffmpeg::{Dictionary, Packet as CodecPacket, Rational, Rescale};
use ffmpeg_sys_next::{AV_NOPTS_VALUE, AV_TIME_BASE_Q};
use image::RgbImage;

pub type Result<T> = eyre::Result<T>;

static FFMPEG_INITIALIZED: OnceLock<std::result::Result<log::LevelFilter, ffmpeg::Error>> =
    OnceLock::new();

/// Initializes ffmpeg and returns the log level ffmpeg ended up with. ffmpeg writes its
/// own messages directly to stderr, `level` decides how chatty it is.
///
/// Only the first call has any effect, and [`FrameExtractor::new`] makes one with
/// [`log::LevelFilter::Error`]. Call this before creating any extractor to pick another
/// level.
pub fn init_ffmpeg(level: log::LevelFilter) -> Result<log::LevelFilter> {
    match FFMPEG_INITIALIZED.get_or_init(|| {
        ffmpeg::init()?;
        ffmpeglog::set_level(match level {
            log::LevelFilter::Off => ffmpeglog::Level::Quiet,
            log::LevelFilter::Error => ffmpeglog::Level::Error,
            log::LevelFilter::Warn => ffmpeglog::Level::Warning,
            log::LevelFilter::Info => ffmpeglog::Level::Info,
            log::LevelFilter::Debug => ffmpeglog::Level::Verbose,
            log::LevelFilter::Trace => ffmpeglog::Level::Debug,
        });
        Ok(level)
    }) {
        Ok(active) => {
            if *active != level {
                log::debug!(
                    "ffmpeg is already initialized with log level {active}, ignoring {level}"
                );
            }
            Ok(*active)
        }
        Err(e) => Err(e).wrap_err("Failed to initialize ffmpeg"),
    }
}

/// Decodes the frames of the best video stream of a file.
pub struct FrameExtractor {
    video: PathBuf,

    // ffmpeg contexts
    ictx: FormatContext,
    decoder: DecoderVideo,
    converter: ScalingContext,

    // internal timestamp bookkeeping
    seek_target_timestamp: i64,
    cur_timestamp: i64,
    // the latest frame at or before `seek_target_timestamp`, i.e., the one on screen then
    tail: Option<FrameVideo>,

    // constants/metadata
    end_timestamp: i64,
    first_timestamp: i64,
    timebase: Rational,
    video_stream_index: usize,
    orientation: Orientation,
}

impl FrameExtractor {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        init_ffmpeg(log::LevelFilter::Error)?;
        let path = path.as_ref();

        let options = {
            let mut options = Dictionary::new();
            options.set("analyzeduration", "10M");
            options.set("probesize", "5M");
            options
        };
        let mut ictx = input_with_dictionary(&path, options)
            .wrap_err_with(|| format!("Failed to open the file {path:?}"))?;

        let video = ictx
            .streams()
            .best(Type::Video)
            .ok_or(eyre::eyre!("No video stream in {path:?}"))?;

        let video_stream_index = video.index();
        eyre::ensure!(
            video.start_time() != AV_NOPTS_VALUE,
            "Does not have a start time"
        );
        let first_timestamp = video.start_time();
        let timebase = video.time_base();
        let length = if video.duration() == AV_NOPTS_VALUE {
            eyre::ensure!(
                ictx.duration() != AV_NOPTS_VALUE,
                "Does not have a duration"
            );
            ictx.duration().rescale(AV_TIME_BASE_Q, timebase)
        } else {
            video.duration()
        };
        eyre::ensure!(length >= 0, "The duration is negative");
        let end_timestamp = first_timestamp + length;

        let orientation = get_orientation(&video).unwrap_or_else(|| {
            log::warn!("Got a weird orientation angle, ignoring ({})", path.display());
            Orientation::Normal
        });

        let decoder = CodecContext::from_parameters(video.parameters())
            .wrap_err("No codec found")?
            .decoder()
            .video()
            .wrap_err("No codec found, of type video (?)")?;

        let converter = pixel_converter(&decoder)?;

        ictx.streams_mut()
            .filter(|stream| stream.index() != video_stream_index)
            .for_each(|mut stream| stream_set_discard_all(&mut stream));

        Ok(Self {
            video: path.to_path_buf(),
            ictx,
            decoder,
            converter,
            seek_target_timestamp: first_timestamp,
            cur_timestamp: first_timestamp,
            tail: None,
            end_timestamp,
            first_timestamp,
            timebase,
            video_stream_index,
            orientation,
        })
    }

    /// The next frame in presentation order, or `None` at the end of the stream.
    pub fn next(&mut self) -> Result<Option<(Timestamp, RgbImage)>> {
        self.decode(false)
    }

    /// The frame on screen at `at`, counted from the start of the video. That is the
    /// last frame whose timestamp is not after `at`, so asking for the length gives the
    /// last frame. If the first decodable frame comes after `at`, that one is returned
    /// instead. `None` only if no frame could be decoded at all after seeking.
    pub fn frame_at(&mut self, at: Duration) -> Result<Option<(Timestamp, RgbImage)>> {
        let target = (self.first_timestamp + Timestamp::floor_in(at, self.timebase))
            .clamp(self.first_timestamp, self.end_timestamp);

        self.seek_internal(target).wrap_err_with(|| {
            format!(
                "Failed when seeking to {}",
                humantime::Duration::from(at)
            )
        })?;
        self.decode(true)
    }

    pub fn seek_forward(&mut self, dur: Duration) -> Result<()> {
        if dur.is_zero() {
            return Ok(());
        }

        let target = self.cur_timestamp
            + Timestamp::from_duration(dur).timestamp(self.timebase);
        self.seek_internal(target).wrap_err_with(|| {
            format!(
                "Failed when trying to seek forward {} from {}",
                humantime::Duration::from(dur),
                Timestamp::new(self.cur_timestamp, self.timebase, self.first_timestamp)
            )
        })
    }

    pub fn seek_to_beginning(&mut self) -> Result<()> {
        self.seek_internal(self.first_timestamp).wrap_err_with(|| {
            format!(
                "Failed to seek to the beginning at {}",
                self.first_timestamp
            )
        })
    }

    /// The duration of the video stream, or of the whole file if the stream doesn't
    /// know.
    pub fn length(&self) -> Duration {
        Timestamp::new(self.end_timestamp, self.timebase, self.first_timestamp)
            .to_duration()
    }

    /// When `on_screen`, returns the last frame not after the seek target instead of the
    /// first one at or after it.
    fn decode(&mut self, on_screen: bool) -> Result<Option<(Timestamp, RgbImage)>> {
        loop {
            loop {
                let mut frame = FrameVideo::empty();
                // avcodec_receive_frame
                // https://ffmpeg.org/doxygen/trunk/group__lavc__decoding.html#ga11e6542c4e66d3028668788a1a74217c
                match self.decoder.receive_frame(&mut frame) {
                    Ok(()) => (),
                    Err(ffmpeg::Error::Other {
                        errno: libc::EAGAIN,
                    }) => break,
                    Err(ffmpeg::Error::Eof) => {
                        return match self.tail.take() {
                            Some(tail) if on_screen => self.convert(&tail).map(Some),
                            _ => Ok(None),
                        };
                    }
                    Err(e) => {
                        return Err(e)
                            .wrap_err("Decoder error when receiving a frame from it");
                    }
                }

                let Some(ts) = frame.timestamp() else {
                    log::warn!(
                        "Frame doesn't have a timestamp somewhere after: {} ({})",
                        self.current(),
                        self.video.display()
                    );
                    continue;
                };
                self.cur_timestamp = ts;

                if on_screen {
                    match ts.cmp(&self.seek_target_timestamp) {
                        Ordering::Less => {
                            self.tail = Some(frame);
                            continue;
                        }
                        Ordering::Equal => {
                            self.tail = None;
                            return self.convert(&frame).map(Some);
                        }
                        Ordering::Greater => {
                            let shown = self.tail.take().unwrap_or(frame);
                            if let Some(shown_ts) = shown.timestamp() {
                                self.cur_timestamp = shown_ts;
                            }
                            return self.convert(&shown).map(Some);
                        }
                    }
                }

                if ts < self.seek_target_timestamp {
                    continue;
                }
                return self.convert(&frame).map(Some);
            }

            loop {
                // http://ffmpeg.org/doxygen/trunk/group__lavf__decoding.html#ga4fdb3084415a82e3810de6ee60e46a61
                let mut packet = CodecPacket::empty();
                match packet.read(&mut self.ictx) {
                    Ok(()) if packet.stream() == self.video_stream_index => {
                        match self.decoder.send_packet(&packet) {
                            Ok(()) => break,
                            Err(e) => {
                                log::error!(
                                    "Failed to decode frame: {} ({})",
                                    e,
                                    self.video.display()
                                );
                                continue;
                            }
                        }
                    }
                    Ok(()) => continue,
                    Err(ffmpeg::Error::Eof) => {
                        self.decoder
                            .send_eof()
                            .wrap_err("Failed to send EOF to the decoder")?;
                        break;
                    }
                    Err(e) => {
                        eyre::bail!("Failed to read a packet from the stream: {e}");
                    }
                }
            }
        }
    }

    fn convert(&mut self, frame: &FrameVideo) -> Result<(Timestamp, RgbImage)> {
        let mut converted = FrameVideo::empty();
        self.converter
            .run(frame, &mut converted)
            .wrap_err("Failed to convert the decoded frame")?;
        let img = undo_rotation(create_rust_image(&converted)?, self.orientation);

        let ts = frame.timestamp().unwrap_or(self.cur_timestamp);
        Ok((Timestamp::new(ts, self.timebase, self.first_timestamp), img))
    }

    fn current(&self) -> Timestamp {
        Timestamp::new(self.cur_timestamp, self.timebase, self.first_timestamp)
    }

    /// Seeks to a keyframe at or before `target`. If there is no such keyframe, which
    /// happens when the stream starts on a non-keyframe, seeks to whichever keyframe is
    /// closest.
    fn seek_internal(&mut self, target: i64) -> Result<()> {
        if let Err(e) = seek(&mut self.ictx, self.video_stream_index, target, ..=target) {
            log::debug!(
                "No keyframe before {}, seeking anywhere instead: {} ({})",
                Timestamp::new(target, self.timebase, self.first_timestamp),
                e,
                self.video.display()
            );
            seek(&mut self.ictx, self.video_stream_index, target, ..)
                .wrap_err("Failed to seek")?;
        }
        self.decoder.flush();
        self.seek_target_timestamp = target;
        self.tail = None;
        Ok(())
    }
}

fn pixel_converter(decoder: &DecoderVideo) -> Result<ScalingContext> {
    eyre::ensure!(decoder.format() != Pixel::None, "No pixel format");
    Ok(ScalingContext::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        ffmpeg::software::scaling::Flags::FAST_BILINEAR,
    )?)
}

#[derive(Clone, Copy, Debug)]
enum Orientation {
    Normal,
    Left,
    Right,
    Upside,
}

/// Reads the rotation from the display matrix, `None` if it isn't a multiple of 90.
fn get_orientation(video: &ffmpeg::Stream) -> Option<Orientation> {
    let Some(matrix) = video
        .side_data()
        .find(|data| data.kind() == ffmpeg::packet::side_data::Type::DisplayMatrix)
    else {
        return Some(Orientation::Normal);
    };

    let rot = unsafe {
        ffmpeg_sys_next::av_display_rotation_get(matrix.data().as_ptr() as *const i32)
    };
    if !rot.is_finite() {
        return Some(Orientation::Normal);
    }

    match rot.round() as i32 {
        -90 => Some(Orientation::Right),
        90 => Some(Orientation::Left),
        0 => Some(Orientation::Normal),
        180 | -180 => Some(Orientation::Upside),
        _ => None,
    }
}

fn undo_rotation(img: RgbImage, ori: Orientation) -> RgbImage {
    match ori {
        Orientation::Normal => img,
        Orientation::Right => image::imageops::rotate90(&img),
        Orientation::Left => image::imageops::rotate270(&img),
        Orientation::Upside => image::imageops::rotate180(&img),
    }
}

/// Copies the single RGB24 plane into an image, dropping any line padding.
fn create_rust_image(converted: &FrameVideo) -> Result<RgbImage> {
    eyre::ensure!(
        converted.format() == Pixel::RGB24 && converted.planes() == 1,
        "The converted frame is not packed RGB24"
    );

    let width = converted.width();
    let height = converted.height();
    let row = 3 * width as usize;
    let stride = converted.stride(0);
    eyre::ensure!(
        stride > 0 && stride >= row,
        "The frame lines are shorter than its width"
    );

    let data = converted.data(0);
    let mut pixels = Vec::with_capacity(row * height as usize);
    for line in data.chunks(stride).take(height as usize) {
        pixels.extend_from_slice(&line[..row]);
    }

    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| eyre::eyre!("The frame is smaller than {width}x{height}"))
}

fn stream_set_discard_all(stream: &mut ffmpeg::StreamMut<'_>) {
    unsafe {
        let ptr = stream.as_mut_ptr();
        if !ptr.is_null() {
            (*ptr).discard = ffmpeg_sys_next::AVDiscard::AVDISCARD_ALL;
        }
    }
}

/// Seeks on the given stream to the keyframe closest to `ts` that lies within `range`.
fn seek(
    input: &mut FormatContext,
    stream_index: usize,
    ts: i64,
    range: impl RangeBounds<i64>,
) -> std::result::Result<(), ffmpeg::Error> {
    let stream_index = stream_index
        .try_into()
        .map_err(|_| ffmpeg::Error::StreamNotFound)?;
    let min_ts = match range.start_bound() {
        Bound::Included(&min) => min,
        Bound::Excluded(&min) => min.saturating_add(1),
        Bound::Unbounded => i64::MIN,
    };
    let max_ts = match range.end_bound() {
        Bound::Included(&max) => max,
        Bound::Excluded(&max) => max.saturating_sub(1),
        Bound::Unbounded => i64::MAX,
    };
    // SAFETY: the context is valid for as long as `input` lives
    match unsafe {
        ffmpeg_sys_next::avformat_seek_file(
            input.as_mut_ptr(),
            stream_index,
            min_ts,
            ts,
            max_ts,
            0,
        )
    } {
        s if s >= 0 => Ok(()),
        e => Err(ffmpeg::Error::from(e)),
    }
}

impl fmt::Debug for FrameExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameExtractor")
            .field("video", &self.video)
            .field("first_ts", &self.first_timestamp)
            .field("end_ts", &self.end_timestamp)
            .field("cur_ts", &self.cur_timestamp)
            .field(
                "tb",
                &format_args!(
                    "{}/{}",
                    self.timebase.numerator(),
                    self.timebase.denominator()
                ),
            )
            .field("seek_ts", &self.seek_target_timestamp)
            .field("orientation", &self.orientation)
            .finish()
    }
}
