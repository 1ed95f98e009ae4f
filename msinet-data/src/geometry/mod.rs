//! Aspect-preserving resize, symmetric padding and center cropping.
//!
//! The arithmetic lives in three plan types ([`ResizePlan`], [`Padding`], [`CropWindow`]) that
//! only look at sizes. Pixel work is delegated to a [`Raster`] implementation: `image` crate
//! pixel buffers for decoded files and video frames, and burn tensors for model inputs and
//! outputs. Both go through the same plans, so a stimulus padded on the CPU and a saliency
//! map cropped on the device agree to the pixel.

mod buffer;
mod tensor;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};

/// Constant used to pad three-channel stimuli.
pub const STIMULUS_FILL: f32 = 126.0;

/// Constant used to pad single-channel ground-truth and saliency maps.
pub const MAP_FILL: f32 = 0.0;

/// Height and width of an image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Number of rows.
    pub height: u32,
    /// Number of columns.
    pub width: u32,
}

impl Size {
    /// Creates a size from height and width.
    pub const fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    /// Whether both dimensions are at most those of `other`.
    pub const fn fits_within(&self, other: Self) -> bool {
        self.height <= other.height && self.width <= other.width
    }

    /// Whether both dimensions are at least those of `other`.
    pub const fn covers(&self, other: Self) -> bool {
        self.height >= other.height && self.width >= other.width
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.height, self.width)
    }
}

/// Which side of the target an aspect-preserving resize lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    /// Result is no larger than the target in both dimensions; follow with padding.
    ShrinkToFit,
    /// Result is no smaller than the target in both dimensions; follow with cropping.
    GrowToCover,
}

/// Interpolation family used for a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Area averaging, for downsampling.
    Area,
    /// Bicubic-family smoothing, for upsampling.
    Cubic,
}

/// Output size and interpolation of one aspect-preserving resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    /// Size after resizing.
    pub size: Size,
    /// Interpolation to use.
    pub interpolation: Interpolation,
}

impl ResizePlan {
    /// Plans the resize of an image of size `current` towards `target`.
    ///
    /// Both axes are scaled by the same ratio: the smaller of the two per-axis ratios for
    /// [`ResizeMode::ShrinkToFit`], the larger for [`ResizeMode::GrowToCover`]. New
    /// dimensions are rounded half away from zero and never drop below one pixel. Area
    /// interpolation is chosen whenever the planned size is smaller than `current` along
    /// either axis.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::GeometryPrecondition`] if `current` has a zero dimension.
    pub fn new(current: Size, target: Size, mode: ResizeMode) -> DataResult<Self> {
        if current.height == 0 || current.width == 0 {
            return Err(precondition("resize", current, target));
        }

        let height_ratio = f64::from(target.height) / f64::from(current.height);
        let width_ratio = f64::from(target.width) / f64::from(current.width);

        let ratio = match mode {
            ResizeMode::ShrinkToFit => height_ratio.min(width_ratio),
            ResizeMode::GrowToCover => height_ratio.max(width_ratio),
        };

        let scale = |dim: u32| ((f64::from(dim) * ratio).round() as u32).max(1);
        let size = Size::new(scale(current.height), scale(current.width));

        let interpolation = if current.height > size.height || current.width > size.width {
            Interpolation::Area
        } else {
            Interpolation::Cubic
        };

        Ok(Self {
            size,
            interpolation,
        })
    }
}

/// Rows and columns of constant fill added around an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding {
    /// Rows added above.
    pub top: u32,
    /// Rows added below.
    pub bottom: u32,
    /// Columns added on the left.
    pub left: u32,
    /// Columns added on the right.
    pub right: u32,
}

impl Padding {
    /// Centers an image of size `current` inside `target`.
    ///
    /// The top and left margins take the floor of half the difference, the bottom and right
    /// margins the ceiling, so odd differences are distributed exactly.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::GeometryPrecondition`] if `current` exceeds `target` along
    /// either axis.
    pub fn symmetric(current: Size, target: Size) -> DataResult<Self> {
        if !current.fits_within(target) {
            return Err(precondition("pad", current, target));
        }

        let vertical = target.height - current.height;
        let horizontal = target.width - current.width;

        Ok(Self {
            top: vertical / 2,
            bottom: vertical.div_ceil(2),
            left: horizontal / 2,
            right: horizontal.div_ceil(2),
        })
    }

    /// Whether no fill is added at all.
    pub const fn is_empty(&self) -> bool {
        self.top == 0 && self.bottom == 0 && self.left == 0 && self.right == 0
    }
}

/// A rectangular region kept by a crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    /// First kept row.
    pub top: u32,
    /// First kept column.
    pub left: u32,
    /// Size of the kept region.
    pub size: Size,
}

impl CropWindow {
    /// Selects a `target`-sized window from an image of size `current`.
    ///
    /// Offsets are the floor of half the excess on each axis; the window then extends
    /// exactly `target` from there. This is independent of [`Padding::symmetric`] and is
    /// not required to mirror it.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::GeometryPrecondition`] if `current` is smaller than `target`
    /// along either axis.
    pub fn centered(current: Size, target: Size) -> DataResult<Self> {
        if !current.covers(target) {
            return Err(precondition("crop", current, target));
        }

        Ok(Self {
            top: (current.height - target.height) / 2,
            left: (current.width - target.width) / 2,
            size: target,
        })
    }
}

const fn precondition(operation: &'static str, current: Size, target: Size) -> DataError {
    DataError::GeometryPrecondition {
        operation,
        current_height: current.height,
        current_width: current.width,
        target_height: target.height,
        target_width: target.width,
    }
}

/// Returns the padding constant for an image with `channels` channels.
pub const fn fill_value(channels: usize) -> f32 {
    if channels == 3 {
        STIMULUS_FILL
    } else {
        MAP_FILL
    }
}

/// Pixel storage the geometry operations can act on.
///
/// Implementations perform exactly the requested operation; all size decisions are made by
/// the plan types before a `Raster` method is called.
pub trait Raster: Sized {
    /// Current height and width.
    fn size(&self) -> Size;

    /// Number of channels per pixel.
    fn channels(&self) -> usize;

    /// Resamples to exactly `size`, clamping values to the valid pixel range.
    fn resample(self, size: Size, interpolation: Interpolation) -> Self;

    /// Surrounds the image with `fill`.
    fn pad(self, padding: Padding, fill: f32) -> Self;

    /// Keeps only `window`.
    fn crop(self, window: CropWindow) -> Self;
}

/// Resizes `image` towards `target`, preserving its aspect ratio.
///
/// # Errors
///
/// See [`ResizePlan::new`].
pub fn resize<R: Raster>(image: R, target: Size, mode: ResizeMode) -> DataResult<R> {
    let plan = ResizePlan::new(image.size(), target, mode)?;
    if plan.size == image.size() {
        return Ok(image);
    }
    Ok(image.resample(plan.size, plan.interpolation))
}

/// Pads `image` symmetrically to exactly `target`, with the fill for its channel count.
///
/// # Errors
///
/// See [`Padding::symmetric`].
pub fn pad<R: Raster>(image: R, target: Size) -> DataResult<R> {
    let padding = Padding::symmetric(image.size(), target)?;
    if padding.is_empty() {
        return Ok(image);
    }
    let fill = fill_value(image.channels());
    Ok(image.pad(padding, fill))
}

/// Crops the central `target` region out of `image`.
///
/// # Errors
///
/// See [`CropWindow::centered`].
pub fn crop<R: Raster>(image: R, target: Size) -> DataResult<R> {
    let window = CropWindow::centered(image.size(), target)?;
    if window.size == image.size() {
        return Ok(image);
    }
    Ok(image.crop(window))
}

/// Brings an arbitrarily sized image to exactly `target`: shrink-to-fit, then pad.
///
/// # Errors
///
/// Fails only for zero-sized input.
pub fn fit<R: Raster>(image: R, target: Size) -> DataResult<R> {
    let resized = resize(image, target, ResizeMode::ShrinkToFit)?;
    pad(resized, target)
}

/// Brings a `fit` result back to `original`: grow-to-cover, then crop.
///
/// # Errors
///
/// Fails only for zero-sized input.
pub fn restore<R: Raster>(image: R, original: Size) -> DataResult<R> {
    let resized = resize(image, original, ResizeMode::GrowToCover)?;
    crop(resized, original)
}
