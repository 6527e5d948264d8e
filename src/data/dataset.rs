use std::sync::Arc;

use burn::data::dataset::Dataset;

use crate::data::preprocess::PreparedSplit;

/// A single preprocessed example ready to be batched
#[derive(Debug, Clone)]
pub struct DigitItem {
    /// 784 normalized pixels, row-major
    pub pixels: Vec<f32>,
    /// One-hot target
    pub target: Vec<f32>,
}

/// Cheap-to-clone view over a prepared split so each epoch can build a new data loader
#[derive(Debug, Clone)]
pub struct DigitDataset {
    split: Arc<PreparedSplit>,
}

impl DigitDataset {
    pub fn new(split: PreparedSplit) -> Self {
        Self {
            split: Arc::new(split),
        }
    }

    pub fn split(&self) -> &PreparedSplit {
        &self.split
    }
}

/// Implement Burn's Dataset trait so Burn can use this in DataLoaders
impl Dataset<DigitItem> for DigitDataset {
    fn get(&self, index: usize) -> Option<DigitItem> {
        let pixels = self.split.image(index)?.to_vec();
        let target = self.split.target(index)?.to_vec();
        Some(DigitItem { pixels, target })
    }

    fn len(&self) -> usize {
        self.split.len()
    }
}
