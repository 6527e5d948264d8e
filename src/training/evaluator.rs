use burn::{
    data::dataloader::DataLoaderBuilder,
    tensor::{backend::Backend, ElementConversion},
};

use crate::{
    data::{DigitBatcher, DigitDataset},
    model::DigitClassifier,
    training::{
        config::TrainingConfig,
        metrics::{MetricsAccumulator, Score},
        trainer::{categorical_cross_entropy, count_correct},
    },
};

/// Scores `model` over the whole split in one pass, without touching its parameters.
///
/// Pass the inference view of a trained model (`AutodiffModule::valid`) so dropout stays off.
pub fn evaluate<B: Backend>(
    model: &DigitClassifier<B>,
    dataset: &DigitDataset,
    config: &TrainingConfig,
    device: &B::Device,
) -> Score {
    let dataloader = DataLoaderBuilder::new(DigitBatcher::<B>::new())
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .set_device(device.clone())
        .build(dataset.clone());

    let mut accumulator = MetricsAccumulator::new();

    for batch in dataloader.iter() {
        let batch_size = batch.targets.dims()[0];
        let logits = model.forward_logits(batch.images);

        let loss: f64 = categorical_cross_entropy(logits.clone(), batch.targets.clone())
            .into_scalar()
            .elem();
        let correct = count_correct(logits, batch.targets);
        accumulator.update(loss, correct, batch_size);
    }

    accumulator.score()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{loader::RawSplit, prepare};
    use crate::model::DigitClassifierConfig;
    use burn::backend::{ndarray::NdArrayDevice, NdArray};
    use burn::module::Module;
    use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};

    type TestBackend = NdArray<f32>;

    fn record_bytes(model: &DigitClassifier<TestBackend>) -> Vec<u8> {
        BinBytesRecorder::<FullPrecisionSettings>::default()
            .record(model.clone().into_record(), ())
            .unwrap()
    }

    #[test]
    fn evaluation_leaves_parameters_untouched() {
        let device = NdArrayDevice::default();
        let model = DigitClassifierConfig::new().init::<TestBackend>(&device);
        let images = (0..6 * 784).map(|i| (i % 251) as u8).collect();
        let raw = RawSplit::new(images, vec![0, 1, 2, 3, 4, 5]).unwrap();
        let dataset = DigitDataset::new(prepare(&raw, 10).unwrap());
        let config = TrainingConfig {
            batch_size: 4,
            ..TrainingConfig::quick_test()
        };

        let before = record_bytes(&model);
        let first = evaluate(&model, &dataset, &config, &device);
        let second = evaluate(&model, &dataset, &config, &device);

        assert_eq!(record_bytes(&model), before);
        assert_eq!(first, second);
        assert!(first.loss.is_finite());
        assert!((0.0..=1.0).contains(&first.accuracy));
    }
}
