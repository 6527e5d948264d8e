use std::time::Instant;

use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        activation::log_softmax,
        backend::{AutodiffBackend, Backend},
        ElementConversion, Tensor,
    },
};

use crate::{
    data::{DigitBatcher, DigitDataset},
    model::DigitClassifier,
    session::Session,
    training::{
        config::TrainingConfig,
        evaluator::evaluate,
        metrics::{EpochMetrics, MetricsAccumulator, TrainingHistory},
    },
};

/// Categorical cross-entropy between logits [batch, classes] and one-hot targets [batch, classes]
pub fn categorical_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    (log_softmax(logits, 1) * targets)
        .sum_dim(1)
        .mean()
        .neg()
}

/// Counts rows whose highest score sits on the target class
pub fn count_correct<B: Backend>(scores: Tensor<B, 2>, targets: Tensor<B, 2>) -> usize {
    let predictions = scores.argmax(1);
    let expected = targets.argmax(1);
    let sum: i64 = predictions.equal(expected).int().sum().into_scalar().elem();
    sum as usize
}

/// Shuffle seed for `epoch`; each epoch builds a fresh loader and must not replay the last order.
pub fn epoch_seed(seed: u64, epoch: usize) -> u64 {
    seed.wrapping_add(epoch as u64)
}

/// Runs one training epoch
fn train_epoch<B: AutodiffBackend>(
    model: &mut DigitClassifier<B>,
    optimizer: &mut impl Optimizer<DigitClassifier<B>, B>,
    dataset: DigitDataset,
    epoch: usize,
    config: &TrainingConfig,
    device: &B::Device,
) -> (usize, f64, f64) {
    let dataloader = DataLoaderBuilder::new(DigitBatcher::<B>::new())
        .batch_size(config.batch_size)
        .shuffle(epoch_seed(config.seed, epoch))
        .num_workers(config.num_workers)
        .set_device(device.clone())
        .build(dataset);

    let mut accumulator = MetricsAccumulator::new();
    let mut batch_num = 0;

    for batch in dataloader.iter() {
        let batch_size = batch.targets.dims()[0];

        let logits = model.forward_logits(batch.images);
        let loss = categorical_cross_entropy(logits.clone(), batch.targets.clone());

        let loss_scalar: f64 = loss.clone().into_scalar().elem();
        let correct = count_correct(logits.inner(), batch.targets.inner());
        accumulator.update(loss_scalar, correct, batch_size);

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, model);
        *model = optimizer.step(config.learning_rate, model.clone(), grads);

        batch_num += 1;
        if config.log_every > 0 && batch_num % config.log_every == 0 {
            println!(
                "  Batch {:>4} | {:>6} samples | loss: {:.4} | acc: {:.4}",
                batch_num,
                accumulator.samples(),
                accumulator.avg_loss(),
                accumulator.accuracy()
            );
        }
    }

    (accumulator.samples(), accumulator.avg_loss(), accumulator.accuracy())
}

/// Fits `model` on `train_dataset`, scoring it on `valid_dataset` after every epoch.
///
/// Runs exactly `num_epochs` epochs; there is no early stopping, checkpointing or
/// learning-rate schedule.
pub fn train<B: AutodiffBackend>(
    session: &Session<B>,
    model: DigitClassifier<B>,
    train_dataset: &DigitDataset,
    valid_dataset: &DigitDataset,
) -> (DigitClassifier<B>, TrainingHistory) {
    let config = session.config();

    log::info!(
        "Training for {} epochs, batch size {}, lr {}, {} train / {} validation samples",
        config.num_epochs,
        config.batch_size,
        config.learning_rate,
        train_dataset.split().len(),
        valid_dataset.split().len(),
    );

    let mut model = model;
    let mut optimizer = AdamConfig::new().init();
    let mut history = TrainingHistory::new();

    for epoch in 1..=config.num_epochs {
        let epoch_start = Instant::now();
        println!("Epoch {}/{}", epoch, config.num_epochs);

        let (samples, train_loss, train_accuracy) = train_epoch(
            &mut model,
            &mut optimizer,
            train_dataset.clone(),
            epoch,
            config,
            session.device(),
        );

        let val = evaluate(&model.valid(), valid_dataset, config, session.device());

        let metrics = EpochMetrics {
            epoch,
            samples,
            train_loss,
            val_loss: val.loss,
            train_accuracy,
            val_accuracy: val.accuracy,
            duration_secs: epoch_start.elapsed().as_secs_f64(),
        };
        println!("{}", metrics.progress_line());
        history.record(metrics);
    }

    if let Some(best) = history.best_val_loss() {
        log::info!("Training complete, best val loss {:.4}", best);
    }

    (model, history)
}
