//! Parameter inspection helpers.

use burn::module::{Module, ModuleVisitor, ParamId};
use burn::tensor::{backend::Backend, Tensor};

/// Counts float parameter tensors that track gradients.
#[derive(Debug, Default)]
struct TrainableParams {
    count: usize,
}

impl<B: Backend> ModuleVisitor<B> for TrainableParams {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        if tensor.is_require_grad() {
            self.count += 1;
        }
    }
}

/// Number of parameter tensors in `module` with gradient tracking enabled.
///
/// Always zero on backends without autodiff.
pub fn count_trainable<B: Backend, M: Module<B>>(module: &M) -> usize {
    let mut visitor = TrainableParams::default();
    module.visit(&mut visitor);
    visitor.count
}
