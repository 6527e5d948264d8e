use std::path::Path;

use burn::{
    module::Module,
    record::Recorder,
    tensor::{backend::Backend, Tensor, TensorData},
};

use crate::{
    data::{
        loader::{IMAGE_COLS, IMAGE_PIXELS, IMAGE_ROWS},
        normalize_images, DataError,
    },
    export::{read_manifest, saved_model::WeightsRecorder, ExportError, ExportManifest},
    inference::gray_image::{DrawingPreprocessor, GrayImage},
    model::{DigitClassifier, ModelSignature, INPUT_NAME, OUTPUT_NAME},
};

/// Index and value of the highest probability; ties go to the later class.
fn most_probable(probabilities: impl IntoIterator<Item = f32>) -> Option<(usize, f32)> {
    probabilities
        .into_iter()
        .enumerate()
        .fold(None, |best, (class, p)| match best {
            Some((_, max)) if p < max => best,
            _ => Some((class, p)),
        })
}

/// Serves predictions from a model exported with [`export`](crate::export::export)
pub struct InferenceEngine<B: Backend> {
    model: DigitClassifier<B>,
    manifest: ExportManifest,
    device: B::Device,
}

impl<B: Backend> InferenceEngine<B> {
    /// Rebuilds the graph described by the manifest in `dir` and loads its weights
    pub fn load(dir: &Path, device: B::Device) -> Result<Self, ExportError> {
        log::info!("Loading model from: {}", dir.display());
        let manifest = read_manifest(dir)?;

        manifest
            .signature
            .input(INPUT_NAME)
            .ok_or_else(|| ExportError::MissingTensor(INPUT_NAME.to_string()))?;
        manifest
            .signature
            .output(OUTPUT_NAME)
            .ok_or_else(|| ExportError::MissingTensor(OUTPUT_NAME.to_string()))?;

        // The recorder expects the path without its extension
        let weights = manifest.weights_path(dir).with_extension("");
        let record = WeightsRecorder::new()
            .load(weights, &device)
            .map_err(|e| ExportError::Recorder(format!("{:?}", e)))?;
        let model = manifest.model.init::<B>(&device).load_record(record);

        log::info!("Model loaded: {} parameters", model.num_params());
        Ok(Self {
            model,
            manifest,
            device,
        })
    }

    pub fn signature(&self) -> &ModelSignature {
        &self.manifest.signature
    }

    pub fn manifest(&self) -> &ExportManifest {
        &self.manifest
    }

    /// images: [batch, 28, 28, 1] in [0, 1] -> probabilities: [batch, num_classes]
    pub fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.model.forward(images)
    }

    /// Classifies raw `u8` images, 784 pixels each
    pub fn classify(&self, pixels: &[u8]) -> Result<Vec<usize>, DataError> {
        let normalized = normalize_images(pixels)?;
        let batch = normalized.len() / IMAGE_PIXELS;
        if batch == 0 {
            return Ok(Vec::new());
        }

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(normalized, [batch, IMAGE_ROWS, IMAGE_COLS, 1]),
            &self.device,
        );
        let predictions = self.predict(images).argmax(1).into_data();

        Ok(predictions
            .iter::<i64>()
            .map(|class| class as usize)
            .collect())
    }

    /// Recognizes a single hand-drawn canvas: returns the digit and its probability.
    pub fn predict_digit(&self, image: &GrayImage) -> Result<(usize, f32), DataError> {
        let input = DrawingPreprocessor::default().prepare(image)?;
        let images = Tensor::<B, 4>::from_data(
            TensorData::new(input, [1, IMAGE_ROWS, IMAGE_COLS, 1]),
            &self.device,
        );
        let probabilities = self.predict(images).into_data();

        let (digit, probability) =
            most_probable(probabilities.iter::<f32>()).ok_or(DataError::EmptyPrediction)?;
        log::info!("The digit is {} with probability {:.2}%", digit, probability * 100.0);
        Ok((digit, probability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{export::export, model::DigitClassifierConfig};
    use burn::backend::{ndarray::NdArrayDevice, NdArray};
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn reloaded_model_predicts_like_the_exported_one() {
        let dir = tempfile::tempdir().unwrap();
        let device = NdArrayDevice::default();
        let config = DigitClassifierConfig::new();
        let model = config.init::<TestBackend>(&device);
        export(&model, &config, dir.path()).unwrap();

        let engine = InferenceEngine::<TestBackend>::load(dir.path(), device.clone()).unwrap();
        let images =
            Tensor::<TestBackend, 4>::random([3, 28, 28, 1], Distribution::Uniform(0.0, 1.0), &device);

        let before = model.forward(images.clone()).into_data().to_vec::<f32>().unwrap();
        let after = engine.predict(images).into_data().to_vec::<f32>().unwrap();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
        assert_eq!(engine.signature().input_names(), vec!["inputs"]);
        assert_eq!(engine.signature().output_names(), vec!["outputs"]);
    }

    #[test]
    fn classify_returns_one_class_per_image() {
        let dir = tempfile::tempdir().unwrap();
        let device = NdArrayDevice::default();
        let config = DigitClassifierConfig::new();
        export(&config.init::<TestBackend>(&device), &config, dir.path()).unwrap();
        let engine = InferenceEngine::<TestBackend>::load(dir.path(), device).unwrap();

        let classes = engine.classify(&vec![200u8; 784 * 4]).unwrap();
        assert_eq!(classes.len(), 4);
        assert!(classes.iter().all(|&c| c < 10));
        assert!(engine.classify(&[]).unwrap().is_empty());
    }

    #[test]
    fn predict_digit_reports_the_top_class() {
        let dir = tempfile::tempdir().unwrap();
        let device = NdArrayDevice::default();
        let config = DigitClassifierConfig::new();
        export(&config.init::<TestBackend>(&device), &config, dir.path()).unwrap();
        let engine = InferenceEngine::<TestBackend>::load(dir.path(), device.clone()).unwrap();

        let mut canvas = GrayImage::blank(280, 280);
        for y in 60..220 {
            for x in 130..150 {
                canvas.set_pixel(x, y, 0);
            }
        }
        let (digit, probability) = engine.predict_digit(&canvas).unwrap();

        let input = DrawingPreprocessor::default().prepare(&canvas).unwrap();
        let probabilities = engine
            .predict(Tensor::from_data(TensorData::new(input, [1, 28, 28, 1]), &device))
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert!(digit < 10);
        assert_eq!(probability, probabilities[digit]);
        assert!(probabilities.iter().all(|&p| p <= probability));

        assert!(engine.predict_digit(&GrayImage::blank(100, 100)).is_err());
    }

    #[test]
    fn ties_go_to_the_later_class() {
        assert_eq!(most_probable([0.1, 0.4, 0.1, 0.4]), Some((3, 0.4)));
        assert_eq!(most_probable([0.7, 0.2, 0.1]), Some((0, 0.7)));
        assert_eq!(most_probable(Vec::new()), None);
    }

    #[test]
    fn loading_without_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = InferenceEngine::<TestBackend>::load(dir.path(), NdArrayDevice::default());
        assert!(matches!(result, Err(ExportError::MissingManifest(_))));
    }
}
