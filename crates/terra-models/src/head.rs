//! Classification head.

use burn::{
    config::Config,
    module::Module,
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    tensor::{backend::Backend, Tensor},
};
use serde::{Deserialize, Serialize};

/// Task-agnostic head arguments, resolved into a concrete head by [`crate::Task`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadConfig {
    /// Required for classification
    pub num_classes: Option<usize>,
    /// Hidden layer widths between pooling and the classifier
    #[serde(default)]
    pub dim_list: Vec<usize>,
    #[serde(default)]
    pub dropout: f64,
}

impl HeadConfig {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes: Some(num_classes),
            ..Default::default()
        }
    }

    pub fn with_dim_list(mut self, dim_list: Vec<usize>) -> Self {
        self.dim_list = dim_list;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }
}

/// Configuration for the [`ClassificationHead`]
#[derive(Config, Debug)]
pub struct ClassificationHeadConfig {
    /// Channels of the decoder output
    pub in_channels: usize,
    pub num_classes: usize,
    /// Hidden layer widths (none by default)
    pub dim_list: Option<Vec<usize>>,
    #[config(default = "0.0")]
    pub dropout: f64,
}

impl ClassificationHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ClassificationHead<B> {
        let mut hidden = Vec::new();
        let mut width = self.in_channels;
        for &dim in self.dim_list.iter().flatten() {
            hidden.push(LinearConfig::new(width, dim).init(device));
            width = dim;
        }

        ClassificationHead {
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            hidden,
            activation: Relu::new(),
            dropout: DropoutConfig::new(self.dropout).init(),
            classifier: LinearConfig::new(width, self.num_classes).init(device),
            num_classes: self.num_classes,
        }
    }
}

/// Global average pooling followed by a small MLP producing class scores.
#[derive(Module, Debug)]
pub struct ClassificationHead<B: Backend> {
    pool: AdaptiveAvgPool2d,
    hidden: Vec<Linear<B>>,
    activation: Relu,
    dropout: Dropout,
    classifier: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> ClassificationHead<B> {
    /// `[batch, channels, height, width]` -> `[batch, num_classes]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let mut x = x.reshape([batch_size, channels]);

        for layer in &self.hidden {
            x = layer.forward(x);
            x = self.activation.forward(x);
            x = self.dropout.forward(x);
        }

        let x = self.dropout.forward(x);
        self.classifier.forward(x)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terra_core::DefaultBackend;

    type TestBackend = DefaultBackend;

    #[test]
    fn test_head_output_shape() {
        let device = Default::default();
        let head = ClassificationHeadConfig::new(8, 5).init::<TestBackend>(&device);

        let output = head.forward(Tensor::zeros([2, 8, 7, 7], &device));
        assert_eq!(output.dims(), [2, 5]);
        assert_eq!(head.num_classes(), 5);
    }

    #[test]
    fn test_head_with_hidden_layers() {
        let device = Default::default();
        let head = ClassificationHeadConfig::new(8, 3)
            .with_dim_list(Some(vec![16, 4]))
            .with_dropout(0.1)
            .init::<TestBackend>(&device);

        let output = head.forward(Tensor::ones([1, 8, 2, 2], &device));
        assert_eq!(output.dims(), [1, 3]);
    }

    #[test]
    fn test_head_config_from_json() {
        let config: HeadConfig = serde_json::from_str(r#"{"num_classes": 2}"#).unwrap();
        assert_eq!(config, HeadConfig::new(2));

        let config: HeadConfig = serde_json::from_str(r#"{"dim_list": [8]}"#).unwrap();
        assert_eq!(config.num_classes, None);
        assert_eq!(config.dim_list, vec![8]);
    }
}
