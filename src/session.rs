use burn::tensor::backend::Backend;

use crate::training::TrainingConfig;

/// Explicit context shared by every pipeline stage: the device tensors live on
/// and the fixed training configuration.
///
/// Creating a session seeds the backend RNG, so parameter initialization and
/// dropout masks are reproducible for a given seed.
#[derive(Debug, Clone)]
pub struct Session<B: Backend> {
    device: B::Device,
    config: TrainingConfig,
}

impl<B: Backend> Session<B> {
    pub fn new(config: TrainingConfig, device: B::Device) -> Self {
        B::seed(config.seed);
        log::debug!("Session on {:?} seeded with {}", device, config.seed);
        Self { device, config }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }
}
