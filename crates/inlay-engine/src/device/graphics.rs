use super::{BackendKind, DeviceOptions, GlDevice, GlPlatform, WgpuDevice};
use crate::coords::SurfaceSize;
use crate::error::Result;
use crate::platform::SurfaceBinding;

/// What the render loop needs from a device.
///
/// One device per render loop, created on the loop's thread and disposed
/// there exactly once.
pub trait RenderDevice {
    fn backend(&self) -> BackendKind;

    /// Current size of the presentable chain, `None` before the first frame.
    fn chain_size(&self) -> Option<SurfaceSize>;

    /// Creates the chain, or resizes it to `size`. Never called with an empty size.
    fn ensure_chain(&mut self, size: SurfaceSize) -> Result<()>;

    /// Releases chain and device resources.
    fn dispose(&mut self) -> Result<()>;
}

/// The device behind one embedded surface.
pub enum GraphicsDevice {
    Wgpu(WgpuDevice),
    Gl(GlDevice),
}

impl GraphicsDevice {
    /// Self-contained device for every backend but direct GL.
    pub fn create(kind: BackendKind, binding: SurfaceBinding, options: &DeviceOptions) -> Result<Self> {
        WgpuDevice::create(kind, binding, options).map(GraphicsDevice::Wgpu)
    }

    /// GL device driving a context owned by the surface layer.
    pub fn create_gl(platform: Box<dyn GlPlatform>, options: &DeviceOptions) -> Result<Self> {
        GlDevice::new(platform, options).map(GraphicsDevice::Gl)
    }
}

impl RenderDevice for GraphicsDevice {
    fn backend(&self) -> BackendKind {
        match self {
            GraphicsDevice::Wgpu(device) => device.kind(),
            GraphicsDevice::Gl(_) => BackendKind::OpenGl,
        }
    }

    fn chain_size(&self) -> Option<SurfaceSize> {
        match self {
            GraphicsDevice::Wgpu(device) => device.chain().map(|chain| chain.size()),
            GraphicsDevice::Gl(device) => device.drawable_size(),
        }
    }

    fn ensure_chain(&mut self, size: SurfaceSize) -> Result<()> {
        match self {
            GraphicsDevice::Wgpu(device) => device.ensure_chain(size),
            GraphicsDevice::Gl(device) => device.ensure_drawable(size),
        }
    }

    fn dispose(&mut self) -> Result<()> {
        match self {
            GraphicsDevice::Wgpu(device) => {
                device.dispose();
                Ok(())
            }
            GraphicsDevice::Gl(device) => device.dispose(),
        }
    }
}
