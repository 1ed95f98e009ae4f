//! [`Raster`] for 8-bit `image` crate buffers (decoded stimuli, ground truth, video frames).

use image::{
    imageops::{self, FilterType},
    ImageBuffer, Pixel,
};

use super::{CropWindow, Interpolation, Padding, Raster, Size};

impl<P> Raster for ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    fn size(&self) -> Size {
        Size::new(self.height(), self.width())
    }

    fn channels(&self) -> usize {
        usize::from(P::CHANNEL_COUNT)
    }

    fn resample(self, size: Size, interpolation: Interpolation) -> Self {
        // Both samplers saturate at the u8 bounds, which is the clamp for this storage.
        match interpolation {
            Interpolation::Area => imageops::thumbnail(&self, size.width, size.height),
            Interpolation::Cubic => {
                imageops::resize(&self, size.width, size.height, FilterType::CatmullRom)
            }
        }
    }

    fn pad(self, padding: Padding, fill: f32) -> Self {
        let value = fill.round().clamp(0.0, 255.0) as u8;
        let channels = vec![value; usize::from(P::CHANNEL_COUNT)];
        let fill = *P::from_slice(&channels);

        let mut canvas = Self::from_pixel(
            self.width() + padding.left + padding.right,
            self.height() + padding.top + padding.bottom,
            fill,
        );
        imageops::replace(
            &mut canvas,
            &self,
            i64::from(padding.left),
            i64::from(padding.top),
        );
        canvas
    }

    fn crop(self, window: CropWindow) -> Self {
        imageops::crop_imm(
            &self,
            window.left,
            window.top,
            window.size.width,
            window.size.height,
        )
        .to_image()
    }
}
