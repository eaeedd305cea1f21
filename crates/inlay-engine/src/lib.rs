//! inlay engine crate.
//!
//! Embeds GPU-rendered surfaces into a host UI's widget tree on Windows, X11
//! and macOS. A host creates one [`core::GraphicsRuntime`] per process and one
//! [`embed::EmbeddedView`] per control; each view owns a native child surface
//! and a render worker thread.

pub mod context;
pub mod coords;
pub mod core;
pub mod device;
pub mod embed;
pub mod error;
pub mod logging;
pub mod paint;
pub mod platform;
pub mod render;
pub mod time;

pub use error::{Error, Result};
