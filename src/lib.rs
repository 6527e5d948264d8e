//! Trains a convolutional MNIST digit classifier with burn and exports it for serving.
//!
//! The pipeline runs once, in order: load the dataset, preprocess it, build the
//! fixed network, train, evaluate on the test split, export. Every stage takes an
//! explicit [`Session`](session::Session).

pub mod data;
pub mod export;
pub mod inference;
pub mod model;
pub mod pipeline;
pub mod session;
pub mod training;

pub use pipeline::{run_pipeline, PipelineError, PipelineOutcome};
pub use session::Session;
pub use training::TrainingConfig;
