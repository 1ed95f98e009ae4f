//! [`Raster`] for burn tensors laid out as `[channels, height, width]` with values in
//! `0..=255`.

use burn::tensor::{
    backend::Backend,
    module::{adaptive_avg_pool2d, interpolate},
    ops::{InterpolateMode, InterpolateOptions},
    ElementConversion, Tensor,
};

use super::{CropWindow, Interpolation, Padding, Raster, Size};

impl<B: Backend> Raster for Tensor<B, 3> {
    fn size(&self) -> Size {
        let [_, height, width] = self.dims();
        Size::new(height as u32, width as u32)
    }

    fn channels(&self) -> usize {
        self.dims()[0]
    }

    fn resample(self, size: Size, interpolation: Interpolation) -> Self {
        let output_size = [size.height as usize, size.width as usize];
        let batched = self.unsqueeze::<4>();

        let resized = match interpolation {
            Interpolation::Area => adaptive_avg_pool2d(batched, output_size),
            Interpolation::Cubic => interpolate(
                batched,
                output_size,
                InterpolateOptions::new(InterpolateMode::Bicubic),
            ),
        };

        resized.squeeze::<3>(0).clamp(0.0, 255.0)
    }

    fn pad(self, padding: Padding, fill: f32) -> Self {
        Tensor::pad(
            self,
            (
                padding.left as usize,
                padding.right as usize,
                padding.top as usize,
                padding.bottom as usize,
            ),
            fill.elem::<B::FloatElem>(),
        )
    }

    fn crop(self, window: CropWindow) -> Self {
        let [channels, _, _] = self.dims();
        let top = window.top as usize;
        let left = window.left as usize;

        self.slice([
            0..channels,
            top..top + window.size.height as usize,
            left..left + window.size.width as usize,
        ])
    }
}
