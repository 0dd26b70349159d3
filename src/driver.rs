//! Frame loop ownership: the driver owns the surface and the renderer, a
//! scheduler decides when ticks happen.

use std::time::{Duration, Instant};

use crate::visual::{AuroraConfig, FrameTime, LayerRenderer, RenderSurface, Viewport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameControl {
    Continue,
    Stop,
}

/// Source of frame callbacks. `start` blocks until the callback returns
/// [`FrameControl::Stop`] or the scheduler is stopped; once stopped a
/// scheduler never calls back again.
pub trait Scheduler {
    fn start(&mut self, tick: &mut dyn FnMut(f32) -> FrameControl);
    fn stop(&mut self);
    fn is_stopped(&self) -> bool;
}

/// Wall-clock scheduler paced to a target frame rate.
pub struct FrameLoop {
    fps: u32,
    stopped: bool,
}

impl FrameLoop {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            stopped: false,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }
}

impl Scheduler for FrameLoop {
    fn start(&mut self, tick: &mut dyn FnMut(f32) -> FrameControl) {
        let target = Duration::from_secs_f32(1.0 / self.fps as f32);
        let mut last_frame = Instant::now();
        while !self.stopped {
            let now = Instant::now();
            let dt = now.duration_since(last_frame).as_secs_f32().max(1e-6);
            last_frame = now;

            if tick(dt) == FrameControl::Stop {
                self.stopped = true;
                break;
            }

            // Frame pacing.
            let elapsed = now.elapsed();
            if elapsed < target {
                std::thread::sleep(target - elapsed);
            }
        }
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Deterministic scheduler: at most `steps` callbacks of a fixed `dt`.
pub struct StepScheduler {
    steps: usize,
    dt: f32,
    issued: usize,
    stopped: bool,
}

impl StepScheduler {
    pub fn new(steps: usize, dt: f32) -> Self {
        Self {
            steps,
            dt,
            issued: 0,
            stopped: false,
        }
    }

    pub fn issued(&self) -> usize {
        self.issued
    }
}

impl Scheduler for StepScheduler {
    fn start(&mut self, tick: &mut dyn FnMut(f32) -> FrameControl) {
        while !self.stopped && self.issued < self.steps {
            self.issued += 1;
            if tick(self.dt) == FrameControl::Stop {
                self.stopped = true;
            }
        }
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Idle -> Running -> Stopped. Stopped is terminal: a new mount needs a new
/// driver.
pub struct AnimationDriver {
    state: DriverState,
    renderer: LayerRenderer,
    viewport: Option<Viewport>,
    surface: Option<RenderSurface>,
    clock: f32,
    wall_ms: f64,
    frames: u64,
}

impl AnimationDriver {
    pub fn new(renderer: LayerRenderer) -> Self {
        Self {
            state: DriverState::Idle,
            renderer,
            viewport: None,
            surface: None,
            clock: 0.0,
            wall_ms: 0.0,
            frames: 0,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Speed-scaled animation clock in seconds.
    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn surface(&self) -> Option<&RenderSurface> {
        self.surface.as_ref()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn renderer(&self) -> &LayerRenderer {
        &self.renderer
    }

    /// Swaps the configuration and rebuilds cached layers for the current size.
    pub fn set_config(&mut self, config: AuroraConfig) {
        let vp = self.surface.as_ref().map(|s| s.viewport());
        self.renderer.set_config(config, vp);
    }

    /// Measures the viewport, builds the surface and caches, and starts
    /// running. Returns `false` unless the driver was idle.
    pub fn mount(&mut self, viewport: Viewport) -> bool {
        if self.state != DriverState::Idle {
            return false;
        }
        self.state = DriverState::Running;
        self.install_surface(viewport);
        tracing::debug!(
            css_width = viewport.css_width,
            css_height = viewport.css_height,
            dpr = viewport.dpr,
            "animation driver mounted"
        );
        true
    }

    /// Replaces the surface and rebuilds caches when the viewport changed.
    pub fn resize(&mut self, viewport: Viewport) {
        if self.state != DriverState::Running || self.viewport == Some(viewport) {
            return;
        }
        self.install_surface(viewport);
    }

    fn install_surface(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        self.surface = RenderSurface::new(viewport);
        match &self.surface {
            Some(_) => self.renderer.rebuild(viewport),
            None => tracing::debug!("viewport has no area; background disabled"),
        }
    }

    /// Advances the clocks by `dt` seconds and renders one frame.
    pub fn tick(&mut self, dt: f32) -> Option<&RenderSurface> {
        if self.state != DriverState::Running {
            return None;
        }
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.clock += dt * self.renderer.config().speed;
        self.wall_ms += dt as f64 * 1000.0;

        let surface = self.surface.as_mut()?;
        self.renderer.render(
            surface,
            FrameTime {
                clock: self.clock,
                wall_ms: self.wall_ms,
            },
        );
        self.frames += 1;
        Some(&*surface)
    }

    /// Drives frames from `scheduler` until `on_frame` or the scheduler stops.
    /// Does nothing unless running.
    pub fn run<S: Scheduler + ?Sized>(
        &mut self,
        scheduler: &mut S,
        mut on_frame: impl FnMut(Option<&RenderSurface>) -> FrameControl,
    ) {
        if self.state != DriverState::Running || scheduler.is_stopped() {
            return;
        }
        scheduler.start(&mut |dt| {
            if self.state != DriverState::Running {
                return FrameControl::Stop;
            }
            on_frame(self.tick(dt))
        });
    }

    /// Releases the surface. No frames are produced afterwards.
    pub fn stop(&mut self) {
        if self.state == DriverState::Stopped {
            return;
        }
        self.state = DriverState::Stopped;
        self.surface = None;
        tracing::debug!(frames = self.frames, "animation driver stopped");
    }
}

impl Drop for AnimationDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::Fractal;

    fn driver() -> AnimationDriver {
        let mut cfg = AuroraConfig::default();
        cfg.seed = Some(1);
        AnimationDriver::new(LayerRenderer::with_fractal(cfg, Fractal::seeded(1)))
    }

    #[test]
    fn tick_before_mount_renders_nothing() {
        let mut d = driver();
        assert!(d.tick(0.016).is_none());
        assert_eq!(d.frames_rendered(), 0);
    }

    #[test]
    fn clock_scales_with_speed() {
        let mut d = driver();
        d.mount(Viewport::new(32, 16, 1.0));
        d.tick(1.0);
        assert!((d.clock() - AuroraConfig::default().speed).abs() < 1e-6);
    }

    #[test]
    fn stopped_is_terminal() {
        let mut d = driver();
        assert!(d.mount(Viewport::new(8, 8, 1.0)));
        d.stop();
        assert!(!d.mount(Viewport::new(8, 8, 1.0)));
        assert_eq!(d.state(), DriverState::Stopped);
        assert!(d.surface().is_none());
    }

    #[test]
    fn step_scheduler_honours_stop() {
        let mut s = StepScheduler::new(10, 0.1);
        let mut n = 0;
        s.start(&mut |_| {
            n += 1;
            if n == 3 { FrameControl::Stop } else { FrameControl::Continue }
        });
        assert_eq!(n, 3);
        s.start(&mut |_| {
            n += 1;
            FrameControl::Continue
        });
        assert_eq!(n, 3);
    }
}
