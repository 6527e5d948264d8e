use std::marker::PhantomData;

use burn::{
    data::dataloader::batcher::Batcher,
    tensor::{backend::Backend, Tensor, TensorData},
};

use crate::data::{
    dataset::DigitItem,
    loader::{IMAGE_COLS, IMAGE_ROWS},
};

#[derive(Debug, Clone)]
pub struct DigitBatch<B: Backend> {
    /// `[batch, 28, 28, 1]`
    pub images: Tensor<B, 4>,
    /// `[batch, num_classes]`
    pub targets: Tensor<B, 2>,
}

/// Stacks items into tensors on the device the data loader asks for
#[derive(Clone, Debug, Default)]
pub struct DigitBatcher<B: Backend> {
    backend: PhantomData<B>,
}

impl<B: Backend> DigitBatcher<B> {
    pub fn new() -> Self {
        Self {
            backend: PhantomData,
        }
    }
}

impl<B: Backend> Batcher<B, DigitItem, DigitBatch<B>> for DigitBatcher<B> {
    fn batch(&self, items: Vec<DigitItem>, device: &B::Device) -> DigitBatch<B> {
        let batch_size = items.len();
        let num_classes = items.first().map(|item| item.target.len()).unwrap_or(0);

        let pixels_flat: Vec<f32> = items
            .iter()
            .flat_map(|item| item.pixels.iter().copied())
            .collect();

        let targets_flat: Vec<f32> = items
            .iter()
            .flat_map(|item| item.target.iter().copied())
            .collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels_flat, [batch_size, IMAGE_ROWS, IMAGE_COLS, 1]),
            device,
        );

        let targets = Tensor::<B, 2>::from_data(
            TensorData::new(targets_flat, [batch_size, num_classes]),
            device,
        );

        DigitBatch { images, targets }
    }
}
