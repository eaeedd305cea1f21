use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::{FrameInfo, Renderer};
use crate::coords::{AtomicSurfaceSize, SurfaceSize};
use crate::device::RenderDevice;
use crate::error::{Error, Result};
use crate::time::{FrameClock, FramePacer};

/// What a loop does when a frame fails.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum FrameErrorPolicy {
    /// Stop the loop and report the error from `join`.
    #[default]
    Terminate,
    /// Log the error, drop the frame and keep going. Preparation errors stay fatal.
    SkipFrame,
}

/// Pacing and failure settings for one render loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Frames per second; zero renders back to back.
    pub target_frame_rate: u32,
    /// Sleep between checks while the surface has no area.
    pub zero_area_poll: Duration,
    /// Sleep between checks while the surface is hidden.
    pub hidden_poll: Duration,
    pub error_policy: FrameErrorPolicy,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_frame_rate: 60,
            zero_area_poll: Duration::from_millis(10),
            hidden_poll: Duration::from_millis(1),
            error_policy: FrameErrorPolicy::Terminate,
        }
    }
}

/// Lifecycle of a render loop. `Disposed` is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    Created = 0,
    Loading = 1,
    Running = 2,
    Idle = 3,
    Stopping = 4,
    Disposed = 5,
}

impl LoopState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LoopState::Created,
            1 => LoopState::Loading,
            2 => LoopState::Running,
            3 => LoopState::Idle,
            4 => LoopState::Stopping,
            _ => LoopState::Disposed,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LoopState::Created => "created",
            LoopState::Loading => "loading",
            LoopState::Running => "running",
            LoopState::Idle => "idle",
            LoopState::Stopping => "stopping",
            LoopState::Disposed => "disposed",
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State written by the UI thread and read by the worker.
struct Shared {
    name: String,
    size: AtomicSurfaceSize,
    scale_bits: AtomicU64,
    visible: AtomicBool,
    close: AtomicBool,
    state: AtomicU8,
    frames: AtomicU64,
}

impl Shared {
    fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, next: LoopState) {
        let prev = LoopState::from_u8(self.state.swap(next as u8, Ordering::AcqRel));
        if prev != next {
            log::debug!("{}: {prev} -> {next}", self.name);
        }
    }

    fn scale_factor(&self) -> f64 {
        f64::from_bits(self.scale_bits.load(Ordering::Acquire))
    }
}

/// Marks the loop disposed when the worker exits, including by panic.
struct DisposedOnExit(Arc<Shared>);

impl Drop for DisposedOnExit {
    fn drop(&mut self) {
        self.0.set_state(LoopState::Disposed);
    }
}

static NEXT_LOOP_ID: AtomicUsize = AtomicUsize::new(0);

/// Builder for a per-surface render worker.
pub struct RenderLoop {
    config: LoopConfig,
    size: SurfaceSize,
    scale_factor: f64,
    visible: bool,
    on_load: Option<Box<dyn FnOnce() + Send>>,
}

impl RenderLoop {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            size: SurfaceSize::ZERO,
            scale_factor: 1.0,
            visible: true,
            on_load: None,
        }
    }

    pub fn initial_size(mut self, size: SurfaceSize) -> Self {
        self.size = size;
        self
    }

    pub fn scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Runs once on the worker after `Renderer::prepare` succeeded.
    pub fn on_load(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_load = Some(Box::new(callback));
        self
    }

    pub(crate) fn set_on_load(&mut self, callback: Option<Box<dyn FnOnce() + Send>>) {
        self.on_load = callback;
    }

    /// Starts the worker thread.
    ///
    /// `make_device` runs on the worker, which then owns the device for its
    /// whole life; the device itself never crosses threads.
    pub fn spawn<D, R, F>(self, make_device: F, renderer: R) -> Result<RenderLoopHandle>
    where
        D: RenderDevice + 'static,
        R: Renderer<D> + 'static,
        F: FnOnce() -> Result<D> + Send + 'static,
    {
        let id = NEXT_LOOP_ID.fetch_add(1, Ordering::Relaxed);
        let name = format!("inlay-render-{id}");

        let shared = Arc::new(Shared {
            name: name.clone(),
            size: AtomicSurfaceSize::new(self.size),
            scale_bits: AtomicU64::new(self.scale_factor.to_bits()),
            visible: AtomicBool::new(self.visible),
            close: AtomicBool::new(false),
            state: AtomicU8::new(LoopState::Created as u8),
            frames: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let config = self.config;
        let on_load = self.on_load;

        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _guard = DisposedOnExit(Arc::clone(&worker_shared));
                run_worker(worker_shared, config, make_device, renderer, on_load)
            })
            .map_err(|e| Error::Thread(format!("failed to spawn {name}: {e}")))?;

        log::debug!("{name}: spawned at {}x{}", self.size.width, self.size.height);
        Ok(RenderLoopHandle {
            shared,
            thread: Some(thread),
        })
    }
}

fn run_worker<D, R, F>(
    shared: Arc<Shared>,
    config: LoopConfig,
    make_device: F,
    renderer: R,
    on_load: Option<Box<dyn FnOnce() + Send>>,
) -> Result<()>
where
    D: RenderDevice,
    R: Renderer<D>,
    F: FnOnce() -> Result<D>,
{
    let device = make_device().inspect_err(|e| log::error!("{}: device creation failed: {e:#}", shared.name))?;
    log::debug!("{}: {} device ready", shared.name, device.backend());

    let mut worker = Worker {
        pacer: FramePacer::from_rate(config.target_frame_rate),
        clock: FrameClock::new(),
        shared,
        config,
        device,
        renderer,
    };

    let outcome = worker.drive(on_load);
    let teardown = worker.teardown();
    outcome.and(teardown)
}

struct Worker<D, R> {
    shared: Arc<Shared>,
    config: LoopConfig,
    pacer: FramePacer,
    clock: FrameClock,
    device: D,
    renderer: R,
}

impl<D, R> Worker<D, R>
where
    D: RenderDevice,
    R: Renderer<D>,
{
    fn drive(&mut self, on_load: Option<Box<dyn FnOnce() + Send>>) -> Result<()> {
        self.shared.set_state(LoopState::Loading);
        if let Err(e) = self.renderer.prepare(&mut self.device) {
            let err = Error::render(None, e);
            log::error!("{}: {err:#}", self.shared.name);
            return Err(err);
        }
        if let Some(callback) = on_load {
            callback();
        }

        loop {
            if self.shared.close.load(Ordering::Acquire) {
                self.shared.set_state(LoopState::Stopping);
                return Ok(());
            }

            let size = self.shared.size.load();
            if size.is_empty() {
                self.idle(self.config.zero_area_poll);
                continue;
            }
            if !self.shared.visible.load(Ordering::Acquire) {
                self.idle(self.config.hidden_poll);
                continue;
            }

            self.shared.set_state(LoopState::Running);
            let frame_start = Instant::now();

            // Only this worker draws, so frames are sequential without a lock.
            match self.frame(size) {
                Ok(()) => {
                    self.shared.frames.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) if self.config.error_policy == FrameErrorPolicy::SkipFrame => {
                    log::warn!("{}: skipping frame: {e:#}", self.shared.name);
                }
                Err(e) => {
                    log::error!("{}: {e:#}", self.shared.name);
                    return Err(e);
                }
            }

            self.pacer.pace(frame_start);
        }
    }

    fn idle(&mut self, poll: Duration) {
        self.shared.set_state(LoopState::Idle);
        std::thread::sleep(poll);
        // The first frame after idling should not report the idle time as dt.
        self.clock.reset();
    }

    fn frame(&mut self, size: SurfaceSize) -> Result<()> {
        if self.device.chain_size() != Some(size) {
            self.device.ensure_chain(size)?;
        }

        let time = self.clock.tick();
        let info = FrameInfo {
            size,
            scale_factor: self.shared.scale_factor(),
            dt: time.dt,
            frame_index: time.frame_index,
        };

        self.renderer
            .render_frame(&mut self.device, &info)
            .map_err(|e| Error::render(Some(info.frame_index), e))
    }

    fn teardown(&mut self) -> Result<()> {
        self.shared.set_state(LoopState::Stopping);
        self.renderer.dispose(&mut self.device);
        self.device
            .dispose()
            .inspect_err(|e| log::error!("{}: device dispose failed: {e:#}", self.shared.name))?;
        log::debug!(
            "{}: disposed after {} frames",
            self.shared.name,
            self.shared.frames.load(Ordering::Relaxed)
        );
        Ok(())
    }
}

/// Controls a running render loop from the UI thread.
///
/// Dropping the handle requests close and waits for the worker.
pub struct RenderLoopHandle {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl RenderLoopHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Publishes a new physical size, applied before the next frame.
    pub fn resize(&self, size: SurfaceSize) {
        self.shared.size.store(size);
    }

    pub fn size(&self) -> SurfaceSize {
        self.shared.size.load()
    }

    pub fn set_scale_factor(&self, scale_factor: f64) {
        self.shared.scale_bits.store(scale_factor.to_bits(), Ordering::Release);
    }

    pub fn set_visible(&self, visible: bool) {
        self.shared.visible.store(visible, Ordering::Release);
    }

    /// Requests teardown. Observed at the worker's next iteration.
    pub fn close(&self) {
        self.shared.close.store(true, Ordering::Release);
    }

    pub fn is_close_requested(&self) -> bool {
        self.shared.close.load(Ordering::Acquire)
    }

    pub fn state(&self) -> LoopState {
        self.shared.state()
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == LoopState::Disposed
    }

    pub fn frames_rendered(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }

    /// Waits for the worker to finish and returns its outcome.
    ///
    /// Does not request close by itself. Only the first call reports the
    /// worker's error; later calls return `Ok(())`.
    pub fn wait_disposed(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        match thread.join() {
            Ok(result) => result,
            Err(_) => Err(Error::Thread(format!("{} panicked", self.shared.name))),
        }
    }

    /// Requests close and waits for the worker.
    pub fn join(mut self) -> Result<()> {
        self.close();
        self.wait_disposed()
    }
}

impl fmt::Debug for RenderLoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderLoopHandle")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("size", &self.size())
            .finish()
    }
}

impl Drop for RenderLoopHandle {
    fn drop(&mut self) {
        if self.thread.is_none() {
            return;
        }
        self.close();
        if let Err(e) = self.wait_disposed() {
            log::error!("{e:#}");
        }
    }
}
