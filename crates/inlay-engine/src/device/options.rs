/// Device and presentation parameters for one embedded surface.
///
/// Keep this structure small. Add flags only when a concrete platform or
/// backend needs them.
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,

    /// Wait for vertical blank on present.
    ///
    /// Off by default: the render loop paces itself to its target frame rate.
    pub vsync: bool,

    /// Depth attachment created alongside the chain. `None` disables depth.
    pub depth_format: Option<wgpu::TextureFormat>,

    /// Enable backend validation and debug labels.
    pub debug: bool,

    /// Optional alpha mode preference for the surface.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Required wgpu features.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Desired maximum frame latency for the surface. This value is a hint.
    pub desired_maximum_frame_latency: u32,

    pub power_preference: wgpu::PowerPreference,
}

impl DeviceOptions {
    pub(crate) fn present_mode(&self) -> wgpu::PresentMode {
        if self.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        }
    }

    pub(crate) fn instance_flags(&self) -> wgpu::InstanceFlags {
        if self.debug {
            wgpu::InstanceFlags::DEBUG | wgpu::InstanceFlags::VALIDATION
        } else {
            wgpu::InstanceFlags::empty()
        }
    }
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            vsync: false,
            depth_format: Some(wgpu::TextureFormat::Depth32Float),
            debug: cfg!(debug_assertions),
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsync_selects_present_mode() {
        let mut options = DeviceOptions::default();
        assert_eq!(options.present_mode(), wgpu::PresentMode::AutoNoVsync);
        options.vsync = true;
        assert_eq!(options.present_mode(), wgpu::PresentMode::AutoVsync);
    }

    #[test]
    fn debug_enables_validation() {
        let options = DeviceOptions {
            debug: true,
            ..Default::default()
        };
        assert!(options.instance_flags().contains(wgpu::InstanceFlags::VALIDATION));
        let options = DeviceOptions {
            debug: false,
            ..Default::default()
        };
        assert!(options.instance_flags().is_empty());
    }
}
