//! Convolutional encoder emitting one feature map per stage.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use crate::traits::Encoder;

/// Configuration for the [`ConvEncoder`]
#[derive(Config, Debug)]
pub struct ConvEncoderConfig {
    /// Number of input bands
    #[config(default = "3")]
    pub in_channels: usize,

    /// Filters of the first stage; each later stage doubles it
    #[config(default = "32")]
    pub base_filters: usize,

    /// Number of stages, one feature map each
    #[config(default = "4")]
    pub num_stages: usize,
}

impl ConvEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvEncoder<B> {
        let mut blocks = Vec::with_capacity(self.num_stages);
        let mut in_channels = self.in_channels;

        // Stage 0 keeps full resolution, each later stage halves it.
        for stage in 0..self.num_stages {
            let out_channels = self.base_filters << stage;
            blocks.push(ConvBlock::new(in_channels, out_channels, 3, stage > 0, device));
            in_channels = out_channels;
        }

        ConvEncoder { blocks }
    }
}

/// A CNN block with optional MaxPool, then Conv2d, BatchNorm and ReLU
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub pool: Option<MaxPool2d>,
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
    pub relu: Relu,
    out_channels: usize,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        with_pool: bool,
        device: &B::Device,
    ) -> Self {
        let pool = if with_pool {
            Some(MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init())
        } else {
            None
        };

        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        Self {
            pool,
            conv,
            bn: BatchNormConfig::new(out_channels).init(device),
            relu: Relu::new(),
            out_channels,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        };
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        self.relu.forward(x)
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }
}

/// Stack of [`ConvBlock`]s
#[derive(Module, Debug)]
pub struct ConvEncoder<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
}

impl<B: Backend> Encoder<B> for ConvEncoder<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let mut features = Vec::with_capacity(self.blocks.len());
        let mut x = x;
        for block in &self.blocks {
            x = block.forward(x);
            features.push(x.clone());
        }
        features
    }

    fn embed_dims(&self) -> Vec<usize> {
        self.blocks.iter().map(ConvBlock::out_channels).collect()
    }
}
