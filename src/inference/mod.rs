pub mod engine;
pub mod gray_image;

pub use engine::InferenceEngine;
pub use gray_image::{DrawingPreprocessor, GrayImage};
