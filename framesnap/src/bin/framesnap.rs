use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{self, Context};
use framesnap::frame_extractor::{init_ffmpeg, FrameExtractor};
use framesnap::sampler::{self, SnapOptions};
use image::ImageFormat;
use snaps_common::bin_common::init::{init_eyre, init_logger};
use snaps_common::bin_common::termination::Cookie;
use snaps_common::utils::fsutils;

#[derive(Parser)]
#[command()]
/// Save evenly spaced frames of a video as images
struct Cli {
    /// How many frames to extract in total, the first and the last are always included
    #[arg(short, long, default_value_t = 12, value_parser = clap::value_parser!(u32).range(1..))]
    num: u32,

    /// Where to place the frames as images
    #[arg(long, default_value = "challange_snaps")]
    outdir: PathBuf,

    /// The frames are named <PREFIX>_<INDEX>.<FORMAT>
    #[arg(long, default_value = "img")]
    prefix: String,

    /// The image format, by its file extension
    #[arg(long, default_value = "png", value_parser = parse_format)]
    format: ImageFormat,

    /// Where in the video the first frame is taken
    #[arg(long, default_value = "0s")]
    start: humantime::Duration,

    /// Where in the video the last frame is taken, defaults to the end
    #[arg(long)]
    stop: Option<humantime::Duration>,

    /// Remove everything in outdir first
    #[arg(long)]
    clear: bool,

    /// Also write logs to this file
    #[arg(long)]
    logfile: Option<PathBuf>,

    /// Log debug messages, and let ffmpeg print its warnings
    #[arg(short, long)]
    verbose: bool,

    /// The video file to extract from
    #[arg(default_value = "challenge.mp4")]
    videofile: PathBuf,
}

fn parse_format(ext: &str) -> Result<ImageFormat, String> {
    ImageFormat::from_extension(ext).ok_or_else(|| format!("unknown image format {ext:?}"))
}

fn main() -> eyre::Result<()> {
    init_eyre()?;
    let cli = Cli::parse();

    let (level, ffmpeg_level) = if cli.verbose {
        (log::LevelFilter::Debug, log::LevelFilter::Warn)
    } else {
        (log::LevelFilter::Info, log::LevelFilter::Error)
    };
    init_logger(cli.logfile.as_deref(), level)?;
    init_ffmpeg(ffmpeg_level)?;
    let cookie = Cookie::new().wrap_err("failed to install the signal handlers")?;

    let options = SnapOptions {
        num: cli.num.try_into().wrap_err("too many frames")?,
        prefix: cli.prefix,
        format: cli.format,
        start: cli.start.into(),
        stop: cli.stop.map(Into::into),
    };
    options.validate()?;

    let prepared = if cli.clear {
        fsutils::clear_dir(&cli.outdir)
    } else {
        fsutils::ensure_dir(&cli.outdir)
    };
    prepared.wrap_err_with(|| format!("failed to prepare the output dir {:?}", cli.outdir))?;

    let mut extractor = FrameExtractor::new(&cli.videofile)?;
    log::debug!("{:?}", extractor);

    let snaps = sampler::sample(&mut extractor, &cli.outdir, &options, &cookie)
        .wrap_err_with(|| format!("failed to sample {:?}", cli.videofile))?;
    log::info!("Wrote {} frames to {}", snaps.len(), cli.outdir.display());

    Ok(())
}
