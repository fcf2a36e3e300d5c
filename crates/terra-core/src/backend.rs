//! Backend aliases for the Burn framework.
//!
//! The workspace runs on the NdArray CPU backend; `TrainingBackend` wraps it
//! in `Autodiff` so parameters can track gradients.

use burn::backend::{Autodiff, NdArray};
use burn::tensor::backend::Backend;

/// The default inference backend
pub type DefaultBackend = NdArray<f32>;

/// The default autodiff backend for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Get the default device
pub fn default_device() -> <DefaultBackend as Backend>::Device {
    Default::default()
}
