//! Host-facing facade: one [`EmbeddedView`] per host control.

mod view;

pub use view::{DeviceBuilder, DeviceFactory, EmbeddedView, GraphicsDeviceFactory, SurfacePath, ViewConfig};
