//! Capability traits for the pluggable parts of a model.

use burn::module::Module;
use burn::tensor::{backend::Backend, Tensor};

/// Backbone producing one feature map per stage.
pub trait Encoder<B: Backend>: Module<B> {
    /// Encode `[batch, channels, height, width]` into a list of feature maps.
    fn forward(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>>;

    /// Channel count of each feature map returned by [`Encoder::forward`].
    fn embed_dims(&self) -> Vec<usize>;

    /// Reshape features for an image decoder. Used when no neck is configured.
    fn prepare_features(&self, features: Vec<Tensor<B, 4>>) -> Vec<Tensor<B, 4>> {
        features
    }
}

/// Maps encoder features to a single output map.
pub trait Decoder<B: Backend>: Module<B> {
    fn forward(&self, features: Vec<Tensor<B, 4>>) -> Tensor<B, 4>;

    /// Channel count of the decoder output
    fn out_channels(&self) -> usize;
}

/// Adapter between encoder and decoder.
pub trait Neck<B: Backend>: Module<B> {
    fn forward(&self, features: Vec<Tensor<B, 4>>) -> Vec<Tensor<B, 4>>;
}

/// Neck that returns its input.
#[derive(Module, Clone, Debug, Default)]
pub struct IdentityNeck;

impl<B: Backend> Neck<B> for IdentityNeck {
    fn forward(&self, features: Vec<Tensor<B, 4>>) -> Vec<Tensor<B, 4>> {
        features
    }
}
