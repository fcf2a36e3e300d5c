//! Encoder/decoder/head composition for scalar outputs.
//!
//! The forward pass is:
//!
//! 1. pad the input to a multiple of the patch size (if one is configured)
//! 2. encode into a list of feature maps
//! 3. adapt the features with the neck, or the encoder's own hook when there is no neck
//! 4. decode a copy of the features and center-crop back to the input size
//! 5. apply the head
//! 6. run every auxiliary decoder + head on its own copy of the features

use std::collections::BTreeMap;

use burn::{
    config::Config,
    module::{Ignored, Module},
    tensor::{backend::Backend, Tensor},
};
use terra_core::Error;
use tracing::debug;

use crate::head::{ClassificationHead, HeadConfig};
use crate::shape::{center_crop, is_patch_aligned, pad_to_patch_multiple};
use crate::task::Task;
use crate::traits::{Decoder, Encoder, Neck};

/// Configuration for the [`ScalarOutputModel`]
#[derive(Config, Debug)]
pub struct ScalarOutputModelConfig {
    /// Task name; only `classification` is supported
    pub task: String,

    /// Arguments of the primary head, also used by auxiliary heads without their own
    pub head: HeadConfig,

    /// Inputs are padded to a multiple of this size before encoding
    pub patch_size: Option<usize>,

    /// The decoder output is final; no head is built
    #[config(default = false)]
    pub decoder_includes_head: bool,
}

/// An auxiliary branch before its head is built.
///
/// The decoder must have the primary decoder's type `D`; branches with a
/// different decoder architecture need an enum implementing [`Decoder`].
#[derive(Debug, Clone)]
pub struct AuxiliaryHeadSpec<D> {
    pub name: String,
    pub decoder: D,
    pub decoder_includes_head: bool,
    /// Overrides the primary head arguments for this branch
    pub head: Option<HeadConfig>,
}

impl<D> AuxiliaryHeadSpec<D> {
    pub fn new(name: impl Into<String>, decoder: D) -> Self {
        Self {
            name: name.into(),
            decoder,
            decoder_includes_head: false,
            head: None,
        }
    }

    pub fn with_decoder_includes_head(mut self, decoder_includes_head: bool) -> Self {
        self.decoder_includes_head = decoder_includes_head;
        self
    }

    pub fn with_head(mut self, head: HeadConfig) -> Self {
        self.head = Some(head);
        self
    }
}

/// Result of one head: class scores, or the untouched decoder output when
/// the decoder already includes its head.
#[derive(Debug, Clone)]
pub enum HeadOutput<B: Backend> {
    /// `[batch, num_classes]`
    Scores(Tensor<B, 2>),
    /// `[batch, channels, height, width]`
    Passthrough(Tensor<B, 4>),
}

impl<B: Backend> HeadOutput<B> {
    pub fn scores(&self) -> Option<&Tensor<B, 2>> {
        match self {
            HeadOutput::Scores(scores) => Some(scores),
            HeadOutput::Passthrough(_) => None,
        }
    }

    pub fn passthrough(&self) -> Option<&Tensor<B, 4>> {
        match self {
            HeadOutput::Scores(_) => None,
            HeadOutput::Passthrough(map) => Some(map),
        }
    }

    /// Scores as `[batch, features]`; a passthrough map is flattened per sample.
    pub fn into_scores(self) -> Tensor<B, 2> {
        match self {
            HeadOutput::Scores(scores) => scores,
            HeadOutput::Passthrough(map) => {
                let [batch, channels, height, width] = map.dims();
                map.reshape([batch, channels * height * width])
            }
        }
    }

    pub fn batch_size(&self) -> usize {
        match self {
            HeadOutput::Scores(scores) => scores.dims()[0],
            HeadOutput::Passthrough(map) => map.dims()[0],
        }
    }
}

/// Primary output plus one output per auxiliary head, keyed by head name.
#[derive(Debug, Clone)]
pub struct ModelOutput<B: Backend> {
    pub output: HeadOutput<B>,
    pub auxiliary_heads: BTreeMap<String, HeadOutput<B>>,
}

/// An auxiliary decoder with its own head.
#[derive(Module, Debug)]
pub struct AuxiliaryHead<B: Backend, D> {
    name: Ignored<String>,
    decoder: D,
    head: Option<ClassificationHead<B>>,
}

impl<B: Backend, D: Decoder<B>> AuxiliaryHead<B, D> {
    pub fn name(&self) -> &str {
        &self.name.0
    }

    pub fn has_head(&self) -> bool {
        self.head.is_some()
    }

    pub fn forward(&self, features: Vec<Tensor<B, 4>>) -> HeadOutput<B> {
        let decoded = self.decoder.forward(features);
        apply_head(self.head.as_ref(), decoded)
    }
}

/// Encoder, optional neck, decoder and head run as one model.
#[derive(Module, Debug)]
pub struct ScalarOutputModel<B: Backend, E, D, N> {
    encoder: E,
    decoder: D,
    head: Option<ClassificationHead<B>>,
    aux_heads: Vec<AuxiliaryHead<B, D>>,
    neck: Option<N>,
    patch_size: Option<usize>,
}

impl ScalarOutputModelConfig {
    /// Assemble the model, building the primary and auxiliary heads.
    ///
    /// Task parsing happens only when a head has to be built, so an unknown
    /// task fails here unless every decoder already includes its head.
    pub fn init<B, E, D, N>(
        &self,
        encoder: E,
        decoder: D,
        auxiliary_heads: Vec<AuxiliaryHeadSpec<D>>,
        neck: Option<N>,
        device: &B::Device,
    ) -> terra_core::Result<ScalarOutputModel<B, E, D, N>>
    where
        B: Backend,
        E: Encoder<B>,
        D: Decoder<B>,
        N: Neck<B>,
    {
        if self.patch_size == Some(0) {
            return Err(Error::InvalidArgument(
                "patch_size must be greater than 0".to_string(),
            ));
        }

        let head = if self.decoder_includes_head {
            None
        } else {
            let task: Task = self.task.parse()?;
            Some(task.build_head(decoder.out_channels(), &self.head, device)?)
        };

        let mut aux_heads = Vec::with_capacity(auxiliary_heads.len());
        for spec in auxiliary_heads {
            if aux_heads
                .iter()
                .any(|existing: &AuxiliaryHead<B, D>| existing.name() == spec.name)
            {
                return Err(Error::Config(format!(
                    "auxiliary head '{}' is defined more than once",
                    spec.name
                )));
            }

            let aux_head = if spec.decoder_includes_head {
                None
            } else {
                let task: Task = self.task.parse()?;
                let config = spec.head.as_ref().unwrap_or(&self.head);
                Some(task.build_head(spec.decoder.out_channels(), config, device)?)
            };

            aux_heads.push(AuxiliaryHead {
                name: Ignored(spec.name),
                decoder: spec.decoder,
                head: aux_head,
            });
        }

        debug!(
            "Built scalar output model: task={}, head={}, aux_heads={}, patch_size={:?}",
            self.task,
            head.is_some(),
            aux_heads.len(),
            self.patch_size
        );

        Ok(ScalarOutputModel {
            encoder,
            decoder,
            head,
            aux_heads,
            neck,
            patch_size: self.patch_size,
        })
    }
}

impl<B, E, D, N> ScalarOutputModel<B, E, D, N>
where
    B: Backend,
    E: Encoder<B>,
    D: Decoder<B>,
    N: Neck<B>,
{
    pub fn patch_size(&self) -> Option<usize> {
        self.patch_size
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// `None` when the decoder includes its own head
    pub fn head(&self) -> Option<&ClassificationHead<B>> {
        self.head.as_ref()
    }

    pub fn aux_heads(&self) -> &[AuxiliaryHead<B, D>] {
        &self.aux_heads
    }

    pub fn aux_head_names(&self) -> Vec<&str> {
        self.aux_heads.iter().map(AuxiliaryHead::name).collect()
    }

    /// Stop gradient tracking on every encoder parameter.
    pub fn freeze_encoder(self) -> Self {
        Self {
            encoder: self.encoder.no_grad(),
            ..self
        }
    }

    /// Stop gradient tracking on the decoder and the primary head.
    pub fn freeze_decoder(self) -> Self {
        Self {
            decoder: self.decoder.no_grad(),
            head: self.head.map(|head| head.no_grad()),
            ..self
        }
    }

    /// Pad `x` to the patch grid when any spatial dimension is off it.
    pub fn check_input_shape(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let Some(patch_size) = self.patch_size else {
            // Without a patch size the caller guarantees compatible inputs.
            return x;
        };

        let [_, _, height, width] = x.dims();
        if is_patch_aligned(height, width, patch_size) {
            x
        } else {
            pad_to_patch_multiple(x, patch_size)
        }
    }

    /// Run encoder, neck, decoder and heads on `[batch, channels, height, width]`.
    pub fn forward(&self, x: Tensor<B, 4>) -> ModelOutput<B> {
        let [_, _, height, width] = x.dims();
        let x = self.check_input_shape(x);

        let features = self.encoder.forward(x);
        let features = match &self.neck {
            Some(neck) => neck.forward(features),
            None => self.encoder.prepare_features(features),
        };

        let decoded = self.decoder.forward(features.clone());
        let decoded = center_crop(decoded, [height, width]);
        let output = apply_head(self.head.as_ref(), decoded);

        let auxiliary_heads = self
            .aux_heads
            .iter()
            .map(|aux| (aux.name().to_string(), aux.forward(features.clone())))
            .collect();

        ModelOutput {
            output,
            auxiliary_heads,
        }
    }
}

fn apply_head<B: Backend>(head: Option<&ClassificationHead<B>>, x: Tensor<B, 4>) -> HeadOutput<B> {
    match head {
        Some(head) => HeadOutput::Scores(head.forward(x)),
        None => HeadOutput::Passthrough(x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backbone::{ConvEncoder, ConvEncoderConfig};
    use crate::decoder::IdentityDecoder;
    use crate::params::count_trainable;
    use crate::traits::IdentityNeck;
    use terra_core::{DefaultBackend, TrainingBackend};

    type TestBackend = DefaultBackend;
    type TestAutodiffBackend = TrainingBackend;

    fn conv_encoder<B: Backend>(device: &B::Device) -> ConvEncoder<B> {
        ConvEncoderConfig::new()
            .with_in_channels(3)
            .with_base_filters(4)
            .with_num_stages(2)
            .init(device)
    }

    fn config(decoder_includes_head: bool) -> ScalarOutputModelConfig {
        ScalarOutputModelConfig::new("classification".to_string(), HeadConfig::new(3))
            .with_decoder_includes_head(decoder_includes_head)
    }

    /// Encoder whose feature hook reverses the feature order.
    #[derive(Module, Debug)]
    struct ReversingEncoder<B: Backend> {
        inner: ConvEncoder<B>,
    }

    impl<B: Backend> Encoder<B> for ReversingEncoder<B> {
        fn forward(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
            self.inner.forward(x)
        }

        fn embed_dims(&self) -> Vec<usize> {
            self.inner.embed_dims()
        }

        fn prepare_features(&self, mut features: Vec<Tensor<B, 4>>) -> Vec<Tensor<B, 4>> {
            features.reverse();
            features
        }
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = config(false).with_patch_size(Some(16));
        let json = serde_json::to_string(&config).unwrap();

        let parsed: ScalarOutputModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.task, "classification");
        assert_eq!(parsed.head, HeadConfig::new(3));
        assert_eq!(parsed.patch_size, Some(16));
        assert!(!parsed.decoder_includes_head);
    }

    #[test]
    fn test_classification_output() {
        let device = Default::default();
        let encoder = conv_encoder::<TestBackend>(&device);
        let decoder = IdentityDecoder::last(&encoder.embed_dims()).unwrap();

        let model = config(false)
            .init(encoder, decoder, Vec::new(), None::<IdentityNeck>, &device)
            .unwrap();
        assert_eq!(model.head().map(|h| h.num_classes()), Some(3));

        let output = model.forward(Tensor::zeros([2, 3, 16, 16], &device));
        assert_eq!(output.output.scores().unwrap().dims(), [2, 3]);
        assert!(output.auxiliary_heads.is_empty());
    }

    #[test]
    fn test_decoder_includes_head_skips_head() {
        let device = Default::default();
        let encoder = conv_encoder::<TestBackend>(&device);
        let decoder = IdentityDecoder::new(&encoder.embed_dims(), 0).unwrap();

        let model = config(true)
            .init(encoder, decoder, Vec::new(), None::<IdentityNeck>, &device)
            .unwrap();
        assert!(model.head().is_none());

        let output = model.forward(Tensor::zeros([1, 3, 8, 8], &device));
        assert_eq!(output.output.passthrough().unwrap().dims(), [1, 4, 8, 8]);
    }

    #[test]
    fn test_output_matches_input_size_after_padding() {
        let device = Default::default();
        let encoder = conv_encoder::<TestBackend>(&device);
        let decoder = IdentityDecoder::new(&encoder.embed_dims(), 0).unwrap();

        let model = config(true)
            .with_patch_size(Some(16))
            .init(encoder, decoder, Vec::new(), None::<IdentityNeck>, &device)
            .unwrap();

        let padded = model.check_input_shape(Tensor::zeros([1, 3, 30, 20], &device));
        assert_eq!(padded.dims(), [1, 3, 32, 32]);

        let output = model.forward(Tensor::zeros([1, 3, 30, 20], &device));
        assert_eq!(output.output.passthrough().unwrap().dims(), [1, 4, 30, 20]);
    }

    #[test]
    fn test_check_input_shape_keeps_aligned_input() {
        let device = Default::default();
        let encoder = conv_encoder::<TestBackend>(&device);
        let decoder = IdentityDecoder::last(&encoder.embed_dims()).unwrap();

        let model = config(false)
            .with_patch_size(Some(8))
            .init(encoder, decoder, Vec::new(), None::<IdentityNeck>, &device)
            .unwrap();
        assert_eq!(model.patch_size(), Some(8));

        let x = model.check_input_shape(Tensor::zeros([1, 3, 16, 24], &device));
        assert_eq!(x.dims(), [1, 3, 16, 24]);

        // One misaligned dimension pads both.
        let x = model.check_input_shape(Tensor::zeros([1, 3, 16, 20], &device));
        assert_eq!(x.dims(), [1, 3, 16, 24]);
    }

    #[test]
    fn test_auxiliary_heads_keyed_by_name() {
        let device = Default::default();
        let encoder = conv_encoder::<TestBackend>(&device);
        let dims = encoder.embed_dims();
        let decoder = IdentityDecoder::last(&dims).unwrap();

        let aux = vec![
            AuxiliaryHeadSpec::new("shallow", IdentityDecoder::new(&dims, 0).unwrap()),
            AuxiliaryHeadSpec::new("raw", IdentityDecoder::new(&dims, 0).unwrap())
                .with_decoder_includes_head(true),
            AuxiliaryHeadSpec::new("binary", IdentityDecoder::last(&dims).unwrap())
                .with_head(HeadConfig::new(2)),
        ];

        let model = config(false)
            .init(encoder, decoder, aux, None::<IdentityNeck>, &device)
            .unwrap();
        assert_eq!(model.aux_head_names(), vec!["shallow", "raw", "binary"]);
        assert!(!model.aux_heads()[1].has_head());

        let output = model.forward(Tensor::zeros([2, 3, 16, 16], &device));
        let keys: Vec<_> = output.auxiliary_heads.keys().cloned().collect();
        assert_eq!(keys, vec!["binary", "raw", "shallow"]);

        assert_eq!(output.auxiliary_heads["shallow"].scores().unwrap().dims(), [2, 3]);
        assert_eq!(output.auxiliary_heads["binary"].scores().unwrap().dims(), [2, 2]);
        assert_eq!(
            output.auxiliary_heads["raw"].passthrough().unwrap().dims(),
            [2, 4, 16, 16]
        );
    }

    #[test]
    fn test_duplicate_auxiliary_names_rejected() {
        let device = Default::default();
        let encoder = conv_encoder::<TestBackend>(&device);
        let dims = encoder.embed_dims();
        let decoder = IdentityDecoder::last(&dims).unwrap();

        let aux = vec![
            AuxiliaryHeadSpec::new("aux", IdentityDecoder::last(&dims).unwrap()),
            AuxiliaryHeadSpec::new("aux", IdentityDecoder::last(&dims).unwrap()),
        ];
        let result = config(false).init(encoder, decoder, aux, None::<IdentityNeck>, &device);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unsupported_task_fails_at_head_resolution() {
        let device = Default::default();
        let encoder = conv_encoder::<TestBackend>(&device);
        let decoder = IdentityDecoder::last(&encoder.embed_dims()).unwrap();

        let bad = ScalarOutputModelConfig::new("regression".to_string(), HeadConfig::new(1));
        let err = bad
            .init(encoder, decoder, Vec::new(), None::<IdentityNeck>, &device)
            .unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: Task must be classification.");

        // Without any head to build, the task is never consulted.
        let encoder = conv_encoder::<TestBackend>(&device);
        let decoder = IdentityDecoder::last(&encoder.embed_dims()).unwrap();
        let model = bad
            .with_decoder_includes_head(true)
            .init(encoder, decoder, Vec::new(), None::<IdentityNeck>, &device);
        assert!(model.is_ok());
    }

    #[test]
    fn test_missing_num_classes_fails() {
        let device = Default::default();
        let encoder = conv_encoder::<TestBackend>(&device);
        let decoder = IdentityDecoder::last(&encoder.embed_dims()).unwrap();

        let err = ScalarOutputModelConfig::new("classification".to_string(), HeadConfig::default())
            .init(encoder, decoder, Vec::new(), None::<IdentityNeck>, &device)
            .unwrap_err();
        assert!(err.to_string().contains("num_classes must be defined"));
    }

    #[test]
    fn test_zero_patch_size_rejected() {
        let device = Default::default();
        let encoder = conv_encoder::<TestBackend>(&device);
        let decoder = IdentityDecoder::last(&encoder.embed_dims()).unwrap();

        let result = config(false)
            .with_patch_size(Some(0))
            .init(encoder, decoder, Vec::new(), None::<IdentityNeck>, &device);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_neck_takes_precedence_over_encoder_hook() {
        let device = Default::default();
        let dims = conv_encoder::<TestBackend>(&device).embed_dims();

        // Hook reverses features, so index 0 is the half-resolution map.
        let hooked = ReversingEncoder {
            inner: conv_encoder::<TestBackend>(&device),
        };
        let model = config(true)
            .init(
                hooked,
                IdentityDecoder::new(&dims, 0).unwrap(),
                Vec::new(),
                None::<IdentityNeck>,
                &device,
            )
            .unwrap();
        let output = model.forward(Tensor::zeros([1, 3, 16, 16], &device));
        assert_eq!(output.output.passthrough().unwrap().dims(), [1, 8, 16, 16]);

        // An explicit neck replaces the hook.
        let hooked = ReversingEncoder {
            inner: conv_encoder::<TestBackend>(&device),
        };
        let model = config(true)
            .init(
                hooked,
                IdentityDecoder::new(&dims, 0).unwrap(),
                Vec::new(),
                Some(IdentityNeck),
                &device,
            )
            .unwrap();
        let output = model.forward(Tensor::zeros([1, 3, 16, 16], &device));
        assert_eq!(output.output.passthrough().unwrap().dims(), [1, 4, 16, 16]);
    }

    #[test]
    fn test_freeze_encoder() {
        let device = Default::default();
        let encoder = conv_encoder::<TestAutodiffBackend>(&device);
        let decoder = IdentityDecoder::last(&encoder.embed_dims()).unwrap();

        let model = config(false)
            .init(encoder, decoder, Vec::new(), None::<IdentityNeck>, &device)
            .unwrap();
        assert!(count_trainable(model.encoder()) > 0);
        let head_params = count_trainable(model.head().unwrap());
        assert!(head_params > 0);

        let model = model.freeze_encoder();
        assert_eq!(count_trainable(model.encoder()), 0);
        assert_eq!(count_trainable(model.head().unwrap()), head_params);
    }

    #[test]
    fn test_freeze_decoder() {
        let device = Default::default();
        let encoder = conv_encoder::<TestAutodiffBackend>(&device);
        let decoder = IdentityDecoder::last(&encoder.embed_dims()).unwrap();

        let model = config(false)
            .init(encoder, decoder, Vec::new(), None::<IdentityNeck>, &device)
            .unwrap();
        let encoder_params = count_trainable(model.encoder());

        let model = model.freeze_decoder();
        assert_eq!(count_trainable(model.head().unwrap()), 0);
        assert_eq!(count_trainable::<TestAutodiffBackend, _>(model.decoder()), 0);
        assert_eq!(count_trainable(model.encoder()), encoder_params);
    }

    #[test]
    fn test_into_scores_flattens_passthrough() {
        let device = Default::default();
        let output = HeadOutput::Passthrough(Tensor::<TestBackend, 4>::zeros([2, 3, 4, 4], &device));
        assert_eq!(output.batch_size(), 2);
        assert_eq!(output.into_scores().dims(), [2, 48]);
    }
}
