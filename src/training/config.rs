use std::path::PathBuf;

use crate::data::DataSource;

/// Directory the trained model is exported to
pub const DEFAULT_EXPORT_DIR: &str = "/nfs/zhifeng/deep/mnist_model";

/// All hyperparameters for training in one place
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Number of full passes through the training data
    pub num_epochs: usize,
    /// Number of samples per batch
    pub batch_size: usize,
    /// Number of digit classes
    pub num_classes: usize,
    /// Adam step size, the framework default
    pub learning_rate: f64,
    /// Seeds the backend RNG and the data loader shuffle
    pub seed: u64,
    /// Data loader worker threads
    pub num_workers: usize,
    /// Print progress every N batches
    pub log_every: usize,
    /// Where the serving export is written
    pub export_dir: PathBuf,
    pub data_source: DataSource,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_epochs: 20,
            batch_size: 1024,
            num_classes: 10,
            learning_rate: 1e-3,
            seed: 42,
            num_workers: 1,
            log_every: 10,
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            data_source: DataSource::Download,
        }
    }
}

impl TrainingConfig {
    /// Smaller config for quick testing
    pub fn quick_test() -> Self {
        Self {
            num_epochs: 2,
            batch_size: 16,
            log_every: 1,
            ..Self::default()
        }
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    pub fn with_data_source(mut self, source: DataSource) -> Self {
        self.data_source = source;
        self
    }
}
