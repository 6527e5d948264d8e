pub mod classifier;
pub mod signature;

pub use classifier::{DigitClassifier, DigitClassifierConfig};
pub use signature::{ModelSignature, TensorSpec, INPUT_NAME, OUTPUT_NAME};
