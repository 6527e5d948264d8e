use burn::{
    module::{AutodiffModule, Module},
    tensor::backend::AutodiffBackend,
};
use thiserror::Error;

use crate::{
    data::{load_mnist, prepare, DataError, DigitDataset},
    export::{export, ExportError, ExportManifest},
    model::{DigitClassifier, DigitClassifierConfig},
    session::Session,
    training::{evaluate, train, Score, TrainingHistory},
};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("export error: {0}")]
    Export(#[from] ExportError),

    #[error("configured for {configured} classes but the model predicts {model}")]
    ClassCount { configured: usize, model: usize },
}

/// Everything the pipeline produced, for callers that want more than stdout
pub struct PipelineOutcome<B: AutodiffBackend> {
    pub model: DigitClassifier<B>,
    pub history: TrainingHistory,
    pub score: Score,
    pub manifest: ExportManifest,
}

/// Load, preprocess, build, train, evaluate and export, in that order.
pub fn run_pipeline<B: AutodiffBackend>(
    session: &Session<B>,
) -> Result<PipelineOutcome<B>, PipelineError> {
    let config = session.config();
    let device = session.device();

    let (raw_train, raw_test) = load_mnist(&config.data_source)?;
    let train_split = prepare(&raw_train, config.num_classes)?;
    let test_split = prepare(&raw_test, config.num_classes)?;

    println!("x_train shape: {:?}", train_split.image_shape());
    println!("y_train shape: {:?}", train_split.target_shape());
    println!("x_test shape: {:?}", test_split.image_shape());
    println!("{} train samples", train_split.len());
    println!("{} test samples", test_split.len());

    let train_dataset = DigitDataset::new(train_split);
    let test_dataset = DigitDataset::new(test_split);

    let model_config = DigitClassifierConfig::new();
    if model_config.num_classes != config.num_classes {
        return Err(PipelineError::ClassCount {
            configured: config.num_classes,
            model: model_config.num_classes,
        });
    }
    let model = model_config.init::<B>(device);
    log::info!("Model built with {} parameters", model.num_params());

    let (model, history) = train(session, model, &train_dataset, &test_dataset);

    let inference_model = model.valid();
    let score = evaluate(&inference_model, &test_dataset, config, device);
    println!("Test loss: {}", score.loss);
    println!("Test accuracy: {}", score.accuracy);

    let manifest = export(&inference_model, &model_config, &config.export_dir)?;

    for input in &manifest.signature.inputs {
        println!("The name of input layer is '{}'", input.name);
    }
    for output in &manifest.signature.outputs {
        println!("The name of output layer is '{}'", output.name);
    }

    Ok(PipelineOutcome {
        model,
        history,
        score,
        manifest,
    })
}
