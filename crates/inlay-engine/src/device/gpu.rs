use anyhow::Context;

use super::surface::{choose_alpha_mode, choose_present_mode, choose_surface_format, create_depth_view};
use super::{BackendKind, DeviceOptions, GpuFrame, SurfaceErrorAction};
use crate::coords::SurfaceSize;
use crate::error::{Error, Result};
use crate::platform::{SurfaceBinding, TargetPlatform};

/// Picks the wgpu presentation source for `binding` on `platform`.
///
/// Native window handles (Win32, Xlib/Xcb/Wayland, AppKit views) go through
/// `RawHandle`; Metal on macOS presents into the view's `CAMetalLayer`.
pub(crate) fn chain_source(
    binding: SurfaceBinding,
    platform: TargetPlatform,
) -> Result<wgpu::SurfaceTargetUnsafe> {
    match (platform, binding) {
        (TargetPlatform::Android | TargetPlatform::Other, _) => Err(Error::PlatformUnsupported {
            what: "swapchain source for this target",
        }),
        (_, SurfaceBinding::GlWindow { .. }) => Err(Error::PlatformUnsupported {
            what: "swapchain on a direct GL window",
        }),
        (TargetPlatform::MacOs, SurfaceBinding::CoreAnimationLayer(layer)) => {
            core_animation_source(layer.as_ptr())
        }
        (_, SurfaceBinding::CoreAnimationLayer(_)) => Err(Error::PlatformUnsupported {
            what: "Core Animation layers outside macos",
        }),
        (_, SurfaceBinding::Window { display, window }) => Ok(wgpu::SurfaceTargetUnsafe::RawHandle {
            raw_display_handle: display,
            raw_window_handle: window,
        }),
    }
}

#[cfg(target_os = "macos")]
fn core_animation_source(layer: *mut std::ffi::c_void) -> Result<wgpu::SurfaceTargetUnsafe> {
    Ok(wgpu::SurfaceTargetUnsafe::CoreAnimationLayer(layer))
}

#[cfg(not(target_os = "macos"))]
fn core_animation_source(_layer: *mut std::ffi::c_void) -> Result<wgpu::SurfaceTargetUnsafe> {
    Err(Error::PlatformUnsupported {
        what: "Core Animation layers outside macos",
    })
}

/// Configured surface plus its depth attachment.
pub struct SwapChain {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    depth_format: Option<wgpu::TextureFormat>,
    depth: Option<wgpu::TextureView>,
    size: SurfaceSize,
}

impl SwapChain {
    fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        device: &wgpu::Device,
        size: SurfaceSize,
        options: &DeviceOptions,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(!size.is_empty(), "cannot create a {}x{} chain", size.width, size.height);

        let caps = surface.get_capabilities(adapter);
        let format = choose_surface_format(&caps, options.prefer_srgb)
            .context("surface reports no supported formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: choose_present_mode(&caps, options.present_mode()),
            alpha_mode: choose_alpha_mode(&caps, options.alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency: options.desired_maximum_frame_latency,
        };
        surface.configure(device, &config);

        let depth = options
            .depth_format
            .map(|format| create_depth_view(device, format, size));

        log::debug!("created {}x{} chain ({format:?}, {:?})", size.width, size.height, config.present_mode);
        Ok(Self {
            surface,
            config,
            depth_format: options.depth_format,
            depth,
            size,
        })
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Reconfigures for `size`. Empty sizes are ignored; wgpu cannot configure them.
    fn resize(&mut self, device: &wgpu::Device, size: SurfaceSize) {
        if size.is_empty() || size == self.size {
            return;
        }

        self.size = size;
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(device, &self.config);

        if let Some(format) = self.depth_format {
            self.depth = Some(create_depth_view(device, format, size));
        }
        log::debug!("resized chain to {}x{}", size.width, size.height);
    }

    fn reconfigure(&self, device: &wgpu::Device) {
        self.surface.configure(device, &self.config);
    }
}

/// A self-contained wgpu device restricted to one backend.
pub struct WgpuDevice {
    kind: BackendKind,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    options: DeviceOptions,

    /// Surface created with the device; moved into the chain on first use.
    surface: Option<wgpu::Surface<'static>>,
    chain: Option<SwapChain>,
    // Declared last: the instance must outlive the surface and device.
    _instance: wgpu::Instance,
}

impl WgpuDevice {
    /// Creates the instance, surface, adapter and device for `kind`.
    ///
    /// The chain itself is created lazily, sized to the first non-empty
    /// frame (see [`WgpuDevice::ensure_chain`]).
    pub fn create(kind: BackendKind, binding: SurfaceBinding, options: &DeviceOptions) -> Result<Self> {
        let backends = kind.wgpu_backends();
        if backends.is_empty() {
            return Err(Error::PlatformUnsupported {
                what: "direct GL through wgpu",
            });
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            flags: options.instance_flags(),
            ..Default::default()
        });

        let source = chain_source(binding, TargetPlatform::current())?;
        // SAFETY: the embedded surface owning these handles is destroyed only
        // after the render loop (and this device) has been disposed.
        let surface = unsafe { instance.create_surface_unsafe(source) }
            .map_err(|e| Error::native(format!("failed to create {kind} surface"), e))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: options.power_preference,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| Error::native(format!("no {kind} adapter for this surface"), e))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("inlay device"),
            required_features: options.required_features,
            required_limits: options.required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| Error::native(format!("failed to create {kind} device"), e))?;

        let info = adapter.get_info();
        log::info!("{kind} device on {} ({:?}, driver {})", info.name, info.device_type, info.driver);

        Ok(Self {
            kind,
            adapter,
            device,
            queue,
            options: options.clone(),
            surface: Some(surface),
            chain: None,
            _instance: instance,
        })
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn chain(&self) -> Option<&SwapChain> {
        self.chain.as_ref()
    }

    /// Creates the chain on first use and resizes it when `size` changed.
    pub fn ensure_chain(&mut self, size: SurfaceSize) -> Result<()> {
        if let Some(chain) = &mut self.chain {
            chain.resize(&self.device, size);
            return Ok(());
        }

        let surface = self
            .surface
            .take()
            .ok_or_else(|| Error::context_state("device already disposed"))?;
        let chain = SwapChain::new(surface, &self.adapter, &self.device, size, &self.options)
            .map_err(|e| Error::native(format!("failed to create {} chain", self.kind), e))?;
        self.chain = Some(chain);
        Ok(())
    }

    /// Acquires the next frame.
    ///
    /// `Ok(None)` means the frame should be skipped: the surface was
    /// reconfigured or a transient error occurred.
    pub fn begin_frame(&mut self) -> Result<Option<GpuFrame>> {
        let chain = self
            .chain
            .as_ref()
            .ok_or_else(|| Error::context_state("no chain; ensure_chain was not called"))?;

        let surface_texture = match chain.surface.get_current_texture() {
            Ok(t) => t,
            Err(err) => {
                return match SurfaceErrorAction::classify(&err) {
                    SurfaceErrorAction::Reconfigured => {
                        log::debug!("surface {err}; reconfiguring");
                        chain.reconfigure(&self.device);
                        Ok(None)
                    }
                    SurfaceErrorAction::SkipFrame => {
                        log::warn!("skipping frame: {err}");
                        Ok(None)
                    }
                    SurfaceErrorAction::Fatal => {
                        Err(Error::native("failed to acquire surface texture", err))
                    }
                };
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("inlay frame encoder"),
            });

        Ok(Some(GpuFrame {
            surface_texture,
            view,
            depth_view: chain.depth.clone(),
            encoder,
        }))
    }

    /// Submits the recorded commands and presents the frame.
    pub fn submit(&self, frame: GpuFrame) {
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        drop(frame.view);
        drop(frame.depth_view);
        frame.surface_texture.present();
    }

    /// Releases the chain and surface. The device itself goes with `self`.
    pub fn dispose(&mut self) {
        self.chain = None;
        self.surface = None;
    }
}

#[cfg(test)]
mod tests {
    use raw_window_handle::{RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle};

    use super::*;

    fn window_binding() -> SurfaceBinding {
        SurfaceBinding::Window {
            display: RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
            window: RawWindowHandle::Xlib(XlibWindowHandle::new(5)),
        }
    }

    #[test]
    fn android_has_no_chain_source() {
        let Err(err) = chain_source(window_binding(), TargetPlatform::Android) else {
            panic!("android should have no chain source");
        };
        assert!(matches!(err, Error::PlatformUnsupported { .. }));
    }

    #[test]
    fn gl_windows_have_no_chain() {
        let binding = SurfaceBinding::GlWindow {
            display: RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
            window: RawWindowHandle::Xlib(XlibWindowHandle::new(5)),
        };
        assert!(chain_source(binding, TargetPlatform::X11).is_err());
    }

    #[test]
    fn window_handles_pass_through() {
        let source = chain_source(window_binding(), TargetPlatform::X11).unwrap();
        assert!(matches!(source, wgpu::SurfaceTargetUnsafe::RawHandle { .. }));
    }

    #[test]
    fn layers_need_macos() {
        let binding = SurfaceBinding::CoreAnimationLayer(std::ptr::NonNull::dangling());
        assert!(chain_source(binding, TargetPlatform::Windows).is_err());
    }

    #[test]
    fn direct_gl_is_not_a_wgpu_device() {
        let err = WgpuDevice::create(BackendKind::OpenGl, window_binding(), &DeviceOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::PlatformUnsupported { .. }));
    }
}
