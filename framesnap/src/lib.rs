pub mod frame_extractor;
pub mod sampler;
