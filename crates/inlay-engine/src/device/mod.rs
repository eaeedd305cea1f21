//! Backend selection and GPU devices.
//!
//! This module is responsible for:
//! - picking a backend once per process (Metal, D3D12, Vulkan, GL, then GLES)
//! - creating the wgpu device/queue and the presentable chain for a surface
//! - driving an externally owned GL context for the direct GL path

mod backend;
mod error;
mod frame;
mod gl_device;
mod gpu;
mod graphics;
mod options;
mod surface;

pub use backend::{select_backend, BackendKind, BackendSelector, CapabilityProbe, WgpuProbe};
pub use error::SurfaceErrorAction;
pub use frame::GpuFrame;
pub use gl_device::{GlDevice, GlInfo, GlPlatform};
pub use gpu::{SwapChain, WgpuDevice};
pub use graphics::{GraphicsDevice, RenderDevice};
pub use options::DeviceOptions;

#[cfg(test)]
pub(crate) use backend::tests::FixedProbe;
