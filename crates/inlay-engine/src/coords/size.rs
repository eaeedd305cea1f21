use std::sync::atomic::{AtomicU64, Ordering};

/// Drawable size in physical pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const ZERO: Self = Self::new(0, 0);

    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` when either dimension is zero. Nothing may be drawn to an empty surface.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Same size with each dimension raised to at least one pixel.
    #[inline]
    pub fn at_least_one(self) -> Self {
        Self::new(self.width.max(1), self.height.max(1))
    }

    #[inline]
    const fn pack(self) -> u64 {
        ((self.width as u64) << 32) | self.height as u64
    }

    #[inline]
    const fn unpack(bits: u64) -> Self {
        Self::new((bits >> 32) as u32, bits as u32)
    }
}

impl From<(u32, u32)> for SurfaceSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

/// A `SurfaceSize` shared between the UI thread and a render worker.
///
/// Width and height live in a single 64-bit word so a reader can never observe
/// the width of one resize paired with the height of another.
#[derive(Debug, Default)]
pub struct AtomicSurfaceSize(AtomicU64);

impl AtomicSurfaceSize {
    pub fn new(size: SurfaceSize) -> Self {
        Self(AtomicU64::new(size.pack()))
    }

    pub fn load(&self) -> SurfaceSize {
        SurfaceSize::unpack(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, size: SurfaceSize) {
        self.0.store(size.pack(), Ordering::Release);
    }
}

/// Host-reported bounds of an embedded surface.
///
/// `x`, `y`, `width` and `height` are logical pixels relative to the parent;
/// `scale` is the display scale factor of the parent window.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SurfaceBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

impl SurfaceBounds {
    pub const fn new(width: f64, height: f64, scale: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            scale,
        }
    }

    pub const fn with_origin(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Bounds covering `size` physical pixels at the given scale.
    pub fn from_physical(size: SurfaceSize, scale: f64) -> Self {
        let scale = sanitize_scale(scale);
        Self::new(
            f64::from(size.width) / scale,
            f64::from(size.height) / scale,
            scale,
        )
    }

    /// Scale factor with non-finite or non-positive values replaced by `1.0`.
    pub fn scale_factor(&self) -> f64 {
        sanitize_scale(self.scale)
    }

    pub fn physical_size(&self) -> SurfaceSize {
        let scale = self.scale_factor();
        SurfaceSize::new(to_physical(self.width, scale), to_physical(self.height, scale))
    }

    pub fn physical_origin(&self) -> (i32, i32) {
        let scale = self.scale_factor();
        let round = |v: f64| {
            if v.is_finite() {
                (v * scale).round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
            } else {
                0
            }
        };
        (round(self.x), round(self.y))
    }
}

impl Default for SurfaceBounds {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 { scale } else { 1.0 }
}

fn to_physical(logical: f64, scale: f64) -> u32 {
    if !logical.is_finite() || logical <= 0.0 {
        return 0;
    }
    (logical * scale).round().min(u32::MAX as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_keeps_both_dimensions() {
        let shared = AtomicSurfaceSize::new(SurfaceSize::ZERO);
        assert_eq!(shared.load(), SurfaceSize::ZERO);

        shared.store(SurfaceSize::new(800, 600));
        assert_eq!(shared.load(), SurfaceSize::new(800, 600));

        shared.store(SurfaceSize::new(u32::MAX, 1));
        assert_eq!(shared.load(), SurfaceSize::new(u32::MAX, 1));
    }

    #[test]
    fn empty_means_either_axis_is_zero() {
        assert!(SurfaceSize::new(0, 600).is_empty());
        assert!(SurfaceSize::new(800, 0).is_empty());
        assert!(!SurfaceSize::new(1, 1).is_empty());
        assert_eq!(SurfaceSize::new(0, 5).at_least_one(), SurfaceSize::new(1, 5));
    }

    #[test]
    fn bounds_round_to_physical_pixels() {
        let b = SurfaceBounds::new(400.0, 300.0, 2.0);
        assert_eq!(b.physical_size(), SurfaceSize::new(800, 600));

        let b = SurfaceBounds::new(100.4, 50.5, 1.5);
        assert_eq!(b.physical_size(), SurfaceSize::new(151, 76));

        let b = SurfaceBounds::new(10.0, 20.0, 1.25).with_origin(8.0, 4.0);
        assert_eq!(b.physical_origin(), (10, 5));
    }

    #[test]
    fn degenerate_bounds_are_empty() {
        assert!(SurfaceBounds::new(-5.0, 10.0, 1.0).physical_size().is_empty());
        assert!(SurfaceBounds::new(f64::NAN, 10.0, 1.0).physical_size().is_empty());
        assert_eq!(SurfaceBounds::new(10.0, 10.0, 0.0).scale_factor(), 1.0);
    }

    #[test]
    fn physical_round_trip() {
        let size = SurfaceSize::new(1280, 720);
        assert_eq!(SurfaceBounds::from_physical(size, 1.5).physical_size(), size);
    }
}
