//! Spatial shape adaptation around the encoder and decoder.

use burn::tensor::{backend::Backend, Tensor};

/// Whether both spatial dimensions are exact multiples of `patch_size`.
pub fn is_patch_aligned(height: usize, width: usize, patch_size: usize) -> bool {
    height % patch_size == 0 && width % patch_size == 0
}

/// Zero-pad on the right and bottom up to the next multiple of `patch_size`.
pub fn pad_to_patch_multiple<B: Backend>(x: Tensor<B, 4>, patch_size: usize) -> Tensor<B, 4> {
    let [_, _, height, width] = x.dims();
    let pad_h = (patch_size - height % patch_size) % patch_size;
    let pad_w = (patch_size - width % patch_size) % patch_size;

    if pad_h == 0 && pad_w == 0 {
        return x;
    }
    x.pad((0, pad_w, 0, pad_h), 0.0)
}

/// Crop the centre `[height, width]` window, zero-padding first if the input is smaller.
///
/// Offsets round half to even, so a one-pixel surplus is taken from the bottom/right.
pub fn center_crop<B: Backend>(x: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [target_h, target_w] = size;
    let [_, _, height, width] = x.dims();
    if height == target_h && width == target_w {
        return x;
    }

    let x = if target_h > height || target_w > width {
        let extra_h = target_h.saturating_sub(height);
        let extra_w = target_w.saturating_sub(width);
        x.pad(
            (extra_w / 2, (extra_w + 1) / 2, extra_h / 2, (extra_h + 1) / 2),
            0.0,
        )
    } else {
        x
    };

    let [batch, channels, height, width] = x.dims();
    let top = half_offset(height - target_h);
    let left = half_offset(width - target_w);

    x.slice([
        0..batch,
        0..channels,
        top..top + target_h,
        left..left + target_w,
    ])
}

/// `round(diff / 2)` with ties to even.
fn half_offset(diff: usize) -> usize {
    let half = diff / 2;
    if diff % 2 == 1 && half % 2 == 1 {
        half + 1
    } else {
        half
    }
}
