//! Compute backend for inference and data loading, fixed at build time.
//!
//! `ndarray` runs on the CPU and is the default. Building with `--features wgpu` (and
//! without default features) moves tensors to the GPU.

use burn::tensor::backend::Backend;
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "wgpu")] {
        /// Backend the binary was built for.
        pub type SelectedBackend = burn::backend::Wgpu;
        /// Printed at startup.
        pub const BACKEND_NAME: &str = "wgpu";
    } else {
        /// Backend the binary was built for.
        pub type SelectedBackend = burn::backend::NdArray;
        /// Printed at startup.
        pub const BACKEND_NAME: &str = "ndarray";
    }
}

pub type SelectedDevice = <SelectedBackend as Backend>::Device;

/// The backend's default device: the CPU for `ndarray`, the first adapter for `wgpu`.
pub fn create_device() -> SelectedDevice {
    SelectedDevice::default()
}

#[cfg(all(test, not(feature = "wgpu")))]
mod tests {
    use burn::tensor::Tensor;

    use super::*;

    #[test]
    fn default_build_runs_on_ndarray() {
        let device = create_device();
        let ones = Tensor::<SelectedBackend, 1>::ones([3], &device);

        assert_eq!(BACKEND_NAME, "ndarray");
        assert_eq!(ones.sum().into_scalar(), 3.0);
    }
}
