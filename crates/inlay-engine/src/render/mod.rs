//! Per-surface render workers.
//!
//! A [`RenderLoop`] owns one device on its own thread and drives a
//! [`Renderer`] at a fixed rate. The UI thread talks to it only through the
//! atomics behind [`RenderLoopHandle`].

mod render_loop;
mod renderer;

pub use render_loop::{FrameErrorPolicy, LoopConfig, LoopState, RenderLoop, RenderLoopHandle};
pub use renderer::{ClearRenderer, FrameInfo, Renderer};
