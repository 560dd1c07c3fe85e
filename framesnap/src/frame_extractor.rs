pub mod frame_extractor;
pub mod timestamp;

pub use frame_extractor::init_ffmpeg;
pub use frame_extractor::FrameExtractor;
pub use frame_extractor::Result;
pub use timestamp::Timestamp;
