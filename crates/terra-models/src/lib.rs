//! Model assembly for scalar-output tasks.
//!
//! A [`ScalarOutputModel`] wires an [`Encoder`], an optional [`Neck`], a
//! [`Decoder`] and a task head into one forward pass, with optional
//! auxiliary heads sharing the encoder features.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use terra_models::prelude::*;
//!
//! let device = Default::default();
//! let encoder = ConvEncoderConfig::new().init::<MyBackend>(&device);
//! let decoder = IdentityDecoder::new(&encoder.embed_dims(), 3)?;
//! let head = HeadConfig::new(2);
//! let model = ScalarOutputModelConfig::new("classification".into(), head)
//!     .with_patch_size(Some(16))
//!     .init(encoder, decoder, Vec::new(), None::<IdentityNeck>, &device)?;
//! ```

pub mod backbone;
pub mod decoder;
pub mod head;
pub mod params;
pub mod scalar_output;
pub mod shape;
pub mod task;
pub mod traits;

pub use backbone::{ConvBlock, ConvEncoder, ConvEncoderConfig};
pub use decoder::IdentityDecoder;
pub use head::{ClassificationHead, ClassificationHeadConfig, HeadConfig};
pub use params::count_trainable;
pub use scalar_output::{
    AuxiliaryHead, AuxiliaryHeadSpec, HeadOutput, ModelOutput, ScalarOutputModel,
    ScalarOutputModelConfig,
};
pub use task::Task;
pub use traits::{Decoder, Encoder, IdentityNeck, Neck};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::backbone::*;
    pub use crate::decoder::*;
    pub use crate::head::*;
    pub use crate::params::*;
    pub use crate::scalar_output::*;
    pub use crate::shape::*;
    pub use crate::task::*;
    pub use crate::traits::*;
}
