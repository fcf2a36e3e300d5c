//! Pass-through decoder.

use burn::module::Module;
use burn::tensor::{backend::Backend, Tensor};
use terra_core::{Error, Result};

use crate::traits::Decoder;

/// Returns one encoder feature map unchanged.
#[derive(Module, Clone, Debug)]
pub struct IdentityDecoder {
    out_index: usize,
    out_channels: usize,
}

impl IdentityDecoder {
    /// Select feature `out_index` of an encoder with the given `embed_dims`.
    pub fn new(embed_dims: &[usize], out_index: usize) -> Result<Self> {
        let out_channels = *embed_dims.get(out_index).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "out_index {} out of range for {} feature maps",
                out_index,
                embed_dims.len()
            ))
        })?;
        Ok(Self {
            out_index,
            out_channels,
        })
    }

    /// Select the last feature map
    pub fn last(embed_dims: &[usize]) -> Result<Self> {
        Self::new(embed_dims, embed_dims.len().saturating_sub(1))
    }
}

impl<B: Backend> Decoder<B> for IdentityDecoder {
    fn forward(&self, mut features: Vec<Tensor<B, 4>>) -> Tensor<B, 4> {
        features.swap_remove(self.out_index)
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }
}
