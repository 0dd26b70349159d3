use std::cell::Cell;

use nordic_aurora::driver::{AnimationDriver, DriverState, FrameControl, Scheduler, StepScheduler};
use nordic_aurora::noise::Fractal;
use nordic_aurora::visual::{
    ribbon_points, safe_band_factor, star_count, AuroraConfig, FrameTime, LayerRenderer, Preset,
    RenderSurface, SafeBand, SkyStyle, Theme, Viewport, RIBBON_SEGMENTS,
};

fn seeded(preset: Preset, theme: Theme) -> AuroraConfig {
    let mut cfg = AuroraConfig::preset(preset, theme);
    cfg.seed = Some(21);
    cfg
}

fn driver(cfg: AuroraConfig) -> AnimationDriver {
    AnimationDriver::new(LayerRenderer::with_fractal(cfg, Fractal::seeded(21)))
}

#[test]
fn resize_rebuilds_layers_at_device_size() {
    let mut d = driver(seeded(Preset::Vivid, Theme::Dark));
    assert!(d.mount(Viewport::new(100, 50, 1.0)));
    assert_eq!(d.renderer().layer_size(), (100, 50));

    d.resize(Viewport::new(121, 61, 1.5));
    let expected = ((121.0f32 * 1.5).floor() as usize, (61.0f32 * 1.5).floor() as usize);
    assert_eq!(d.renderer().layer_size(), expected);
    assert_eq!(d.renderer().sky_layer().len(), expected.0 * expected.1 * 4);

    let surface = d.tick(0.016).expect("running driver renders");
    assert_eq!((surface.width(), surface.height()), expected);
}

#[test]
fn theme_and_preset_changes_reach_the_cached_layers() {
    let mut d = driver(seeded(Preset::Vivid, Theme::Dark));
    d.mount(Viewport::new(24, 12, 1.0));
    assert_eq!(&d.renderer().sky_layer()[..4], &[0x07, 0x13, 0x2b, 255]);

    let mut white = seeded(Preset::Vivid, Theme::Light);
    white.light_sky = SkyStyle::White;
    d.set_config(white);
    assert!(d.renderer().sky_layer().chunks_exact(4).all(|p| p == [255, 255, 255, 255]));
    let frame = d.tick(0.016).expect("frame");
    assert_eq!(&frame.pixels()[..4], &[255, 255, 255, 255]);

    d.set_config(seeded(Preset::Shader, Theme::Dark));
    assert_eq!(d.renderer().config().preset, Preset::Shader);
    assert_eq!(&d.renderer().sky_layer()[..4], &[0x07, 0x13, 0x2b, 255]);
    assert!(d.renderer().starfield().is_some());
}

#[test]
fn dpr_is_capped_at_two() {
    let mut d = driver(seeded(Preset::Minimal, Theme::Dark));
    d.mount(Viewport::new(40, 20, 3.0));
    assert_eq!(d.renderer().layer_size(), (80, 40));
}

#[test]
fn zero_area_viewport_renders_nothing() {
    let mut d = driver(seeded(Preset::Vivid, Theme::Dark));
    assert!(d.mount(Viewport::new(0, 30, 1.0)));
    assert!(d.tick(0.016).is_none());
    assert_eq!(d.state(), DriverState::Running);
}

#[test]
fn stop_ends_callbacks() {
    let mut d = driver(seeded(Preset::Vivid, Theme::Dark));
    d.mount(Viewport::new(32, 18, 1.0));

    let calls = Cell::new(0usize);
    let mut sched = StepScheduler::new(4, 1.0 / 60.0);
    d.run(&mut sched, |surface| {
        assert!(surface.is_some());
        calls.set(calls.get() + 1);
        FrameControl::Continue
    });
    assert_eq!(calls.get(), 4);
    assert_eq!(d.frames_rendered(), 4);

    d.stop();
    let mut again = StepScheduler::new(10, 1.0 / 60.0);
    d.run(&mut again, |_| {
        calls.set(calls.get() + 1);
        FrameControl::Continue
    });
    assert_eq!(calls.get(), 4);
    assert_eq!(again.issued(), 0);
    assert!(d.surface().is_none());
}

#[test]
fn frame_callback_can_stop_the_scheduler() {
    let mut d = driver(seeded(Preset::Minimal, Theme::Dark));
    d.mount(Viewport::new(16, 16, 1.0));
    let mut sched = StepScheduler::new(50, 0.1);
    let mut n = 0;
    d.run(&mut sched, |_| {
        n += 1;
        if n == 2 { FrameControl::Stop } else { FrameControl::Continue }
    });
    assert_eq!(n, 2);
    assert!(sched.is_stopped());
}

#[test]
fn dark_frames_are_opaque_and_lit() {
    for preset in Preset::all() {
        let mut d = driver(seeded(preset, Theme::Dark));
        d.mount(Viewport::new(96, 54, 1.0));
        let surface = d.tick(2.0).expect("frame");
        let px = surface.pixels();
        assert!(px.chunks_exact(4).all(|p| p[3] == 255), "{preset:?} left holes");
        assert!(px.chunks_exact(4).any(|p| (p[0] | p[1] | p[2]) != 0), "{preset:?} is black");
    }
}

#[test]
fn light_theme_without_sky_or_aurora_is_transparent() {
    let mut cfg = seeded(Preset::Vivid, Theme::Light);
    cfg.light_sky = SkyStyle::None;
    let mut renderer = LayerRenderer::with_fractal(cfg, Fractal::seeded(2));
    let mut surface = RenderSurface::new(Viewport::new(48, 24, 1.0)).expect("surface");
    renderer.render(&mut surface, FrameTime { clock: 3.0, wall_ms: 500.0 });
    assert!(surface.pixels().iter().all(|&b| b == 0));
}

#[test]
fn same_seed_renders_identically() {
    let render = || {
        let mut d = driver(seeded(Preset::Vivid, Theme::Dark));
        d.mount(Viewport::new(64, 36, 1.0));
        d.tick(0.5);
        d.tick(0.5).expect("frame").pixels().to_vec()
    };
    assert_eq!(render(), render());
}

#[test]
fn star_count_follows_area_and_density() {
    assert_eq!(star_count(1920, 1080, 0.8), 460);
    assert_eq!(star_count(59, 59, 1.0), 0);
    assert_eq!(star_count(120, 60, 0.0), 0);
}

#[test]
fn ribbons_span_the_width() {
    let cfg = seeded(Preset::Vivid, Theme::Dark);
    let pts = ribbon_points(&cfg, &Fractal::seeded(4), 1, 0.7, 640.0, 360.0);
    assert_eq!(pts.len(), RIBBON_SEGMENTS + 1);
    assert_eq!(pts[0].x, 0.0);
    assert!((pts[RIBBON_SEGMENTS].x - 640.0).abs() < 1e-3);
    assert!(pts.iter().all(|p| p.y > 0.0 && p.y < 360.0));
}

#[test]
fn safe_band_dims_the_middle() {
    let band = SafeBand::default();
    assert!((safe_band_factor(Some(&band), 0.5) - 0.35).abs() < 1e-5);
    assert!((safe_band_factor(Some(&band), 0.05) - 1.0).abs() < 1e-5);
    assert_eq!(safe_band_factor(None, 0.5), 1.0);
}
