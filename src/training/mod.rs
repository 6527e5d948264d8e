pub mod config;
pub mod evaluator;
pub mod metrics;
pub mod trainer;

pub use config::{TrainingConfig, DEFAULT_EXPORT_DIR};
pub use evaluator::evaluate;
pub use metrics::{EpochMetrics, MetricsAccumulator, Score, TrainingHistory};
pub use trainer::{categorical_cross_entropy, count_correct, epoch_seed, train};
