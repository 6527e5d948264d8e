use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{activation::softmax, backend::Backend, Tensor},
};
use serde::{Deserialize, Serialize};

use crate::model::signature::{ModelSignature, TensorSpec, INPUT_NAME, OUTPUT_NAME};

/// Fixed hyperparameters of the digit classifier.
///
/// The topology is not meant to be tuned; the fields exist so an export can
/// record exactly what it was built with and rebuild the same graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitClassifierConfig {
    pub image_size: usize,
    pub channels: usize,
    pub conv1_filters: usize,
    pub conv2_filters: usize,
    pub kernel_size: usize,
    pub pool_size: usize,
    pub hidden_size: usize,
    pub dropout: f64,
    pub num_classes: usize,
}

impl Default for DigitClassifierConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitClassifierConfig {
    pub fn new() -> Self {
        Self {
            image_size: 28,
            channels: 1,
            conv1_filters: 32,
            conv2_filters: 64,
            kernel_size: 5,
            pool_size: 2,
            hidden_size: 1024,
            dropout: 0.4,
            num_classes: 10,
        }
    }

    /// Spatial extent after both pooling blocks: 28 -> 14 -> 7
    fn pooled_size(&self) -> usize {
        self.image_size / (self.pool_size * self.pool_size)
    }

    /// Width of the flattened feature vector feeding the dense layer
    pub fn flattened_size(&self) -> usize {
        self.pooled_size() * self.pooled_size() * self.conv2_filters
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> DigitClassifier<B> {
        let kernel = [self.kernel_size, self.kernel_size];
        let pool = [self.pool_size, self.pool_size];

        // 2x2/2 pooling over even extents needs no padding, which is what "same" pooling resolves to.
        let pool_config = MaxPool2dConfig::new(pool).with_strides(pool);

        DigitClassifier {
            conv1: Conv2dConfig::new([self.channels, self.conv1_filters], kernel)
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            pool1: pool_config.init(),
            conv2: Conv2dConfig::new([self.conv1_filters, self.conv2_filters], kernel)
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            pool2: pool_config.init(),
            hidden: LinearConfig::new(self.flattened_size(), self.hidden_size).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }

    /// Named tensors the exported graph exposes
    pub fn signature(&self) -> ModelSignature {
        let size = self.image_size as i64;
        ModelSignature {
            inputs: vec![TensorSpec::f32(
                INPUT_NAME,
                vec![-1, size, size, self.channels as i64],
            )],
            outputs: vec![TensorSpec::f32(OUTPUT_NAME, vec![-1, self.num_classes as i64])],
        }
    }
}

/// Conv(5x5, 32) -> pool -> Conv(5x5, 64) -> pool -> Dense(1024) -> dropout -> Dense(10) -> softmax
#[derive(Module, Debug)]
pub struct DigitClassifier<B: Backend> {
    conv1: Conv2d<B>,
    pool1: MaxPool2d,
    conv2: Conv2d<B>,
    pool2: MaxPool2d,
    hidden: Linear<B>,
    dropout: Dropout,
    output: Linear<B>,
    activation: Relu,
}

impl<B: Backend> DigitClassifier<B> {
    /// Scores before softmax.
    /// images: [batch, 28, 28, 1] channel-last -> logits: [batch, num_classes]
    pub fn forward_logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        // burn convolutions are channel-first
        let x = images.permute([0, 3, 1, 2]);

        let x = self.activation.forward(self.conv1.forward(x));
        let x = self.pool1.forward(x);
        let x = self.activation.forward(self.conv2.forward(x));
        let x = self.pool2.forward(x);

        let x = x.flatten::<2>(1, 3);
        let x = self.activation.forward(self.hidden.forward(x));
        let x = self.dropout.forward(x);
        self.output.forward(x)
    }

    /// The "outputs" tensor: class probabilities, each row sums to 1
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward_logits(images), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
    use burn::module::AutodiffModule;
    use burn::tensor::{Distribution, TensorData};

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    #[test]
    fn flattened_features_match_pooled_maps() {
        let config = DigitClassifierConfig::new();
        assert_eq!(config.flattened_size(), 7 * 7 * 64);
    }

    #[test]
    fn parameter_count_matches_topology() {
        let device = NdArrayDevice::default();
        let model = DigitClassifierConfig::new().init::<TestBackend>(&device);

        let conv1 = 5 * 5 * 32 + 32;
        let conv2 = 5 * 5 * 32 * 64 + 64;
        let hidden = 3136 * 1024 + 1024;
        let output = 1024 * 10 + 10;
        assert_eq!(model.num_params(), conv1 + conv2 + hidden + output);
    }

    #[test]
    fn outputs_are_probability_rows() {
        let device = NdArrayDevice::default();
        let model = DigitClassifierConfig::new().init::<TestBackend>(&device);
        let images =
            Tensor::<TestBackend, 4>::random([4, 28, 28, 1], Distribution::Uniform(0.0, 1.0), &device);

        let probs = model.forward(images);
        assert_eq!(probs.dims(), [4, 10]);

        let values = probs.into_data().to_vec::<f32>().unwrap();
        for row in values.chunks(10) {
            assert!(row.iter().all(|&p| p >= 0.0));
            let total: f32 = row.iter().sum();
            assert!((total - 1.0).abs() < 1e-4, "row sums to {total}");
        }
    }

    #[test]
    fn inference_is_deterministic_without_autodiff() {
        let device = NdArrayDevice::default();
        let model = DigitClassifierConfig::new().init::<TestBackend>(&device);
        let images = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![0.5f32; 2 * 784], [2, 28, 28, 1]),
            &device,
        );

        let first = model.forward(images.clone()).into_data();
        let second = model.forward(images).into_data();
        assert_eq!(
            first.to_vec::<f32>().unwrap(),
            second.to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn dropout_only_applies_while_training() {
        let device = NdArrayDevice::default();
        let model = DigitClassifierConfig::new().init::<TestAutodiffBackend>(&device);
        let images = Tensor::<TestAutodiffBackend, 4>::from_data(
            TensorData::new(vec![0.5f32; 2 * 784], [2, 28, 28, 1]),
            &device,
        );

        let first = model.forward_logits(images.clone()).into_data().to_vec::<f32>().unwrap();
        let second = model.forward_logits(images.clone()).into_data().to_vec::<f32>().unwrap();
        assert_ne!(first, second, "training forward passes should sample new dropout masks");

        let inference = model.valid();
        let images = images.inner();
        let first = inference.forward_logits(images.clone()).into_data().to_vec::<f32>().unwrap();
        let second = inference.forward_logits(images).into_data().to_vec::<f32>().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn signature_names_inputs_and_outputs() {
        let signature = DigitClassifierConfig::new().signature();
        assert_eq!(signature.input_names(), vec!["inputs"]);
        assert_eq!(signature.output_names(), vec!["outputs"]);
        assert_eq!(signature.inputs[0].shape, vec![-1, 28, 28, 1]);
        assert_eq!(signature.outputs[0].shape, vec![-1, 10]);
    }
}
