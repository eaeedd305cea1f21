use glow::HasContext;

use crate::coords::SurfaceSize;
use crate::device::GraphicsDevice;
use crate::paint::Color;

/// Per-frame data handed to a [`Renderer`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameInfo {
    /// Physical size of the target. Always equals the device's chain size.
    pub size: SurfaceSize,
    pub scale_factor: f64,
    /// Seconds since the previous frame, clamped by the loop's clock.
    pub dt: f32,
    pub frame_index: u64,
}

/// Drawing strategy run by a render loop.
///
/// All three hooks run on the loop's worker thread, which owns the device.
/// `prepare` runs once before the first frame, `dispose` once after the last.
pub trait Renderer<D: ?Sized = GraphicsDevice>: Send {
    fn prepare(&mut self, _device: &mut D) -> anyhow::Result<()> {
        Ok(())
    }

    fn render_frame(&mut self, device: &mut D, frame: &FrameInfo) -> anyhow::Result<()>;

    fn dispose(&mut self, _device: &mut D) {}
}

/// Clears color and depth every frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearRenderer {
    pub color: Color,
    pub depth: f32,
}

impl ClearRenderer {
    pub fn new(color: Color) -> Self {
        Self { color, depth: 1.0 }
    }

    fn clear_wgpu(&self, gpu: &mut crate::device::WgpuDevice) -> anyhow::Result<()> {
        let Some(mut frame) = gpu.begin_frame()? else {
            return Ok(());
        };

        {
            let _pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("inlay clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.color.into()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: frame.depth_view.as_ref().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(self.depth),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        gpu.submit(frame);
        Ok(())
    }

    fn clear_gl(&self, gl: &crate::device::GlDevice, size: SurfaceSize) -> anyhow::Result<()> {
        let [r, g, b, a] = self.color.to_array();
        unsafe {
            let ctx = gl.gl();
            ctx.bind_framebuffer(glow::FRAMEBUFFER, None);
            ctx.viewport(0, 0, size.width as i32, size.height as i32);
            ctx.enable(glow::DEPTH_TEST);
            ctx.clear_color(r, g, b, a);
            ctx.clear_depth_f32(self.depth);
            ctx.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
        gl.present()?;
        Ok(())
    }
}

impl Default for ClearRenderer {
    fn default() -> Self {
        Self::new(Color::GREY)
    }
}

impl Renderer for ClearRenderer {
    fn render_frame(&mut self, device: &mut GraphicsDevice, frame: &FrameInfo) -> anyhow::Result<()> {
        match device {
            GraphicsDevice::Wgpu(gpu) => self.clear_wgpu(gpu),
            GraphicsDevice::Gl(gl) => self.clear_gl(gl, frame.size),
        }
    }
}
