use state::InitCell;

/// GPU API family used to render an embedded surface.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BackendKind {
    Metal,
    Direct3D12,
    Vulkan,
    /// Desktop OpenGL through a native context shared with the root context.
    OpenGl,
    /// OpenGL ES through wgpu's GL backend.
    OpenGlEs,
}

impl BackendKind {
    /// Probe order. `OpenGlEs` is the unconditional fallback and is not probed.
    pub const PRIORITY: [BackendKind; 4] = [
        BackendKind::Metal,
        BackendKind::Direct3D12,
        BackendKind::Vulkan,
        BackendKind::OpenGl,
    ];

    /// `true` for the backend that renders through a native GL context.
    pub const fn is_direct_gl(self) -> bool {
        matches!(self, BackendKind::OpenGl)
    }

    /// wgpu backend set used for this kind. Empty for the direct GL path.
    pub fn wgpu_backends(self) -> wgpu::Backends {
        match self {
            BackendKind::Metal => wgpu::Backends::METAL,
            BackendKind::Direct3D12 => wgpu::Backends::DX12,
            BackendKind::Vulkan => wgpu::Backends::VULKAN,
            BackendKind::OpenGl => wgpu::Backends::empty(),
            BackendKind::OpenGlEs => wgpu::Backends::GL,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            BackendKind::Metal => "metal",
            BackendKind::Direct3D12 => "d3d12",
            BackendKind::Vulkan => "vulkan",
            BackendKind::OpenGl => "gl",
            BackendKind::OpenGlEs => "gles",
        }
    }

    /// Parses the names accepted by `INLAY_BACKEND`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "metal" | "mtl" => Some(BackendKind::Metal),
            "d3d12" | "dx12" | "direct3d" | "d3d" => Some(BackendKind::Direct3D12),
            "vulkan" | "vk" => Some(BackendKind::Vulkan),
            "gl" | "opengl" => Some(BackendKind::OpenGl),
            "gles" | "opengles" => Some(BackendKind::OpenGlEs),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Reports whether the platform can run a backend.
pub trait CapabilityProbe: Send + Sync {
    fn supports(&self, kind: BackendKind) -> bool;
}

/// Probes backends by enumerating wgpu adapters.
///
/// Desktop GL is not a wgpu backend here; it is reported as available on
/// targets with a native GL context API.
#[derive(Debug, Default)]
pub struct WgpuProbe;

impl CapabilityProbe for WgpuProbe {
    fn supports(&self, kind: BackendKind) -> bool {
        if kind.is_direct_gl() {
            return cfg!(any(
                target_os = "windows",
                target_os = "macos",
                all(unix, not(any(target_os = "ios", target_os = "android")))
            ));
        }

        let backends = kind.wgpu_backends();
        if !wgpu::Instance::enabled_backend_features().contains(backends) {
            return false;
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let adapters = pollster::block_on(instance.enumerate_adapters(backends));

        let usable = adapters
            .iter()
            .map(|a| a.get_info())
            .filter(|info| info.device_type != wgpu::DeviceType::Cpu)
            .inspect(|info| log::debug!("{kind}: found adapter {} ({:?})", info.name, info.device_type))
            .count();
        usable > 0
    }
}

/// Walks the priority list and returns the first supported backend.
///
/// `preferred` is honored when the probe supports it.
pub fn select_backend(probe: &dyn CapabilityProbe, preferred: Option<BackendKind>) -> BackendKind {
    if let Some(kind) = preferred {
        if kind == BackendKind::OpenGlEs || probe.supports(kind) {
            return kind;
        }
        log::warn!("requested backend {kind} is not supported here; probing instead");
    }

    BackendKind::PRIORITY
        .into_iter()
        .find(|&kind| probe.supports(kind))
        .unwrap_or(BackendKind::OpenGlEs)
}

/// Process-wide backend choice, computed on first use.
pub struct BackendSelector {
    probe: Box<dyn CapabilityProbe>,
    preferred: Option<BackendKind>,
    chosen: InitCell<BackendKind>,
}

impl BackendSelector {
    pub const ENV_OVERRIDE: &'static str = "INLAY_BACKEND";

    /// Creates a selector that honors `INLAY_BACKEND` when set.
    pub fn new(probe: Box<dyn CapabilityProbe>) -> Self {
        let preferred = std::env::var(Self::ENV_OVERRIDE).ok().and_then(|name| {
            let kind = BackendKind::from_name(&name);
            if kind.is_none() {
                log::warn!("ignoring unknown {}={name:?}", Self::ENV_OVERRIDE);
            }
            kind
        });
        Self::with_preference(probe, preferred)
    }

    pub fn with_preference(probe: Box<dyn CapabilityProbe>, preferred: Option<BackendKind>) -> Self {
        Self {
            probe,
            preferred,
            chosen: InitCell::new(),
        }
    }

    /// Selected backend. Probing happens once; later calls return the cached value.
    pub fn select(&self) -> BackendKind {
        *self.chosen.get_or_init(|| {
            let kind = select_backend(self.probe.as_ref(), self.preferred);
            log::info!("selected graphics backend: {kind}");
            kind
        })
    }

    /// The cached selection, if `select` already ran.
    pub fn selected(&self) -> Option<BackendKind> {
        self.chosen.try_get().copied()
    }
}

impl std::fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSelector")
            .field("preferred", &self.preferred)
            .field("chosen", &self.selected())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Probe that supports a fixed set of backends and counts queries.
    #[derive(Default)]
    pub(crate) struct FixedProbe {
        pub(crate) supported: Vec<BackendKind>,
        pub(crate) queries: Arc<AtomicUsize>,
    }

    impl FixedProbe {
        pub(crate) fn new(supported: &[BackendKind]) -> Self {
            Self {
                supported: supported.to_vec(),
                queries: Arc::default(),
            }
        }
    }

    impl CapabilityProbe for FixedProbe {
        fn supports(&self, kind: BackendKind) -> bool {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.supported.contains(&kind)
        }
    }

    #[test]
    fn metal_wins_when_available() {
        let probe = FixedProbe::new(&[BackendKind::Vulkan, BackendKind::Metal, BackendKind::OpenGl]);
        assert_eq!(select_backend(&probe, None), BackendKind::Metal);
    }

    #[test]
    fn priority_order_is_respected() {
        let probe = FixedProbe::new(&[BackendKind::OpenGl, BackendKind::Direct3D12, BackendKind::Vulkan]);
        assert_eq!(select_backend(&probe, None), BackendKind::Direct3D12);

        let probe = FixedProbe::new(&[BackendKind::OpenGl, BackendKind::Vulkan]);
        assert_eq!(select_backend(&probe, None), BackendKind::Vulkan);

        let probe = FixedProbe::new(&[BackendKind::OpenGl]);
        assert_eq!(select_backend(&probe, None), BackendKind::OpenGl);
    }

    #[test]
    fn gles_is_the_unconditional_fallback() {
        let probe = FixedProbe::new(&[]);
        assert_eq!(select_backend(&probe, None), BackendKind::OpenGlEs);
    }

    #[test]
    fn preference_applies_only_when_supported() {
        let probe = FixedProbe::new(&[BackendKind::Vulkan, BackendKind::OpenGl]);
        assert_eq!(select_backend(&probe, Some(BackendKind::OpenGl)), BackendKind::OpenGl);
        assert_eq!(select_backend(&probe, Some(BackendKind::Metal)), BackendKind::Vulkan);
        assert_eq!(select_backend(&probe, Some(BackendKind::OpenGlEs)), BackendKind::OpenGlEs);
    }

    #[test]
    fn selector_probes_once() {
        let probe = FixedProbe::new(&[BackendKind::Vulkan]);
        let queries = probe.queries.clone();
        let selector = BackendSelector::with_preference(Box::new(probe), None);

        assert_eq!(selector.selected(), None);
        assert_eq!(selector.select(), BackendKind::Vulkan);
        let after_first = queries.load(Ordering::SeqCst);
        assert_eq!(selector.select(), BackendKind::Vulkan);
        assert_eq!(queries.load(Ordering::SeqCst), after_first);
        assert_eq!(selector.selected(), Some(BackendKind::Vulkan));
    }

    #[test]
    fn names_round_trip() {
        for kind in BackendKind::PRIORITY.into_iter().chain([BackendKind::OpenGlEs]) {
            assert_eq!(BackendKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(BackendKind::from_name(" DX12 "), Some(BackendKind::Direct3D12));
        assert_eq!(BackendKind::from_name("software"), None);
    }
}
