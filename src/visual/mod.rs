mod curtains;
mod post;
mod ribbons;
mod sky;
mod stars;

use crate::color::{self, BlendMode};
use crate::noise::Fractal;

pub use ribbons::{ribbon_points, ribbon_hue, safe_band_factor, RibbonPoint, RIBBON_SEGMENTS};
pub use sky::sky_stops;
pub use stars::{star_count, twinkle, Starfield};

/// Device-pixel-ratio ceiling; higher ratios cost fill rate without visible gain.
pub const MAX_DPR: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Theme {
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    pub fn is_dark(self) -> bool {
        self == Self::Dark
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Dark => "Dark",
            Self::Light => "Light",
        }
    }

    /// Aurora layers add light on a dark sky and screen over a pale one.
    pub fn blend_mode(self) -> BlendMode {
        match self {
            Self::Dark => BlendMode::Add,
            Self::Light => BlendMode::Screen,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    /// One faint ribbon, no bloom or shimmer.
    Minimal,
    /// Flowing puff ribbons with bloom and shimmer.
    Vivid,
    /// Per-pixel fbm curtains with a contrast/saturation grade.
    Shader,
}

impl Preset {
    pub const fn all() -> [Self; 3] {
        [Self::Minimal, Self::Vivid, Self::Shader]
    }

    pub fn next(self) -> Self {
        match self {
            Self::Minimal => Self::Vivid,
            Self::Vivid => Self::Shader,
            Self::Shader => Self::Minimal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Minimal => "Minimal",
            Self::Vivid => "Vivid",
            Self::Shader => "Shader",
        }
    }

    pub fn uses_curtains(self) -> bool {
        self == Self::Shader
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self::Vivid
    }
}

/// Sky treatment for the light theme. The dark sky is always the navy gradient.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkyStyle {
    None,
    Pastel,
    White,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafeBand {
    /// Normalized top edge, `0` = top of the viewport.
    pub top: f32,
    pub bottom: f32,
    /// Fraction of aurora alpha removed inside the band.
    pub reduce: f32,
    /// Width of the smooth edge on each side.
    pub feather: f32,
}

impl Default for SafeBand {
    fn default() -> Self {
        Self {
            top: 0.30,
            bottom: 0.75,
            reduce: 0.65,
            feather: 0.05,
        }
    }
}

/// Everything the background reads per render. Geometry is expressed as
/// fractions of the viewport so the look survives any surface size.
#[derive(Clone, Debug, PartialEq)]
pub struct AuroraConfig {
    pub theme: Theme,
    pub preset: Preset,
    pub show_in_light: bool,
    pub light_sky: SkyStyle,

    pub stars: bool,
    pub stars_in_light: bool,
    /// Multiplier on one star per 3600 logical px².
    pub star_density: f32,
    /// Star radius in logical px.
    pub star_size: f32,
    pub star_twinkle: bool,

    pub intensity: f32,
    pub max_opacity: f32,
    pub saturation: f32,
    pub contrast: f32,
    pub bloom: f32,
    pub shimmer_opacity: f32,

    pub ribbon_count: u32,
    pub speed: f32,
    pub curve_amp: f32,
    pub curve_freq: f32,
    pub weave_amp: f32,
    pub noise_warp: f32,
    /// Puff radius as a fraction of surface width.
    pub puff_radius: f32,
    /// Distance between puff stamps as a fraction of surface width.
    pub puff_step: f32,
    pub safe_band: Option<SafeBand>,

    pub hue_shift: f32,
    pub scale_y: f32,
    /// Block size (device px) for per-pixel curtain evaluation.
    pub field_step: usize,

    pub seed: Option<u64>,
}

impl Default for AuroraConfig {
    fn default() -> Self {
        Self::preset(Preset::Vivid, Theme::Dark)
    }
}

impl AuroraConfig {
    pub fn preset(preset: Preset, theme: Theme) -> Self {
        let dark = theme.is_dark();
        let base = Self {
            theme,
            preset,
            show_in_light: false,
            light_sky: SkyStyle::Pastel,
            stars: true,
            stars_in_light: false,
            star_density: if dark { 0.8 } else { 0.4 },
            star_size: 0.8,
            star_twinkle: true,
            intensity: if dark { 0.22 } else { 0.10 },
            max_opacity: if dark { 0.18 } else { 0.08 },
            saturation: if dark { 1.0 } else { 0.95 },
            contrast: if dark { 1.05 } else { 1.02 },
            bloom: 1.0,
            shimmer_opacity: if dark { 0.08 } else { 0.12 },
            ribbon_count: 2,
            speed: 0.18,
            curve_amp: 0.18,
            curve_freq: 1.1,
            weave_amp: 0.08,
            noise_warp: 0.08,
            puff_radius: 0.085,
            puff_step: 0.045,
            safe_band: Some(SafeBand::default()),
            hue_shift: 0.25,
            scale_y: 1.2,
            field_step: 2,
            seed: None,
        };

        match preset {
            Preset::Vivid => base,
            Preset::Minimal => Self {
                star_density: 0.38,
                intensity: if dark { 0.14 } else { 0.08 },
                max_opacity: if dark { 0.12 } else { 0.06 },
                contrast: 1.0,
                bloom: 0.0,
                shimmer_opacity: 0.0,
                ribbon_count: 1,
                speed: 0.085,
                ..base
            },
            Preset::Shader => Self {
                show_in_light: true,
                intensity: if dark { 1.3 } else { 0.75 },
                max_opacity: 1.0,
                saturation: if dark { 1.6 } else { 0.9 },
                contrast: if dark { 1.5 } else { 1.02 },
                bloom: 0.0,
                shimmer_opacity: 0.0,
                speed: 1.0,
                scale_y: 1.8,
                ..base
            },
        }
    }

    /// Clamps every field into its supported range. Non-finite values fall
    /// back to the preset default.
    pub fn validated(mut self) -> Self {
        let d = Self::preset(self.preset, self.theme);
        self.star_density = clamp_or(self.star_density, 0.0, 100.0, d.star_density);
        self.star_size = clamp_or(self.star_size, 0.2, 4.0, d.star_size);
        self.intensity = clamp_or(self.intensity, 0.0, 4.0, d.intensity);
        self.max_opacity = clamp_or(self.max_opacity, 0.0, 1.0, d.max_opacity);
        self.saturation = clamp_or(self.saturation, 0.0, 3.0, d.saturation);
        self.contrast = clamp_or(self.contrast, 0.0, 3.0, d.contrast);
        self.bloom = clamp_or(self.bloom, 0.0, 2.0, d.bloom);
        self.shimmer_opacity = clamp_or(self.shimmer_opacity, 0.0, 1.0, d.shimmer_opacity);
        self.ribbon_count = self.ribbon_count.min(8);
        self.speed = clamp_or(self.speed, 0.0, 10.0, d.speed);
        self.curve_amp = clamp_or(self.curve_amp, 0.0, 0.5, d.curve_amp);
        self.curve_freq = clamp_or(self.curve_freq, 0.1, 6.0, d.curve_freq);
        self.weave_amp = clamp_or(self.weave_amp, 0.0, 0.5, d.weave_amp);
        self.noise_warp = clamp_or(self.noise_warp, 0.0, 1.0, d.noise_warp);
        self.puff_radius = clamp_or(self.puff_radius, 0.01, 0.5, d.puff_radius);
        self.puff_step = clamp_or(self.puff_step, 0.005, 0.5, d.puff_step);
        self.hue_shift = if self.hue_shift.is_finite() {
            self.hue_shift.rem_euclid(1.0)
        } else {
            d.hue_shift
        };
        self.scale_y = clamp_or(self.scale_y, 0.25, 4.0, d.scale_y);
        self.field_step = self.field_step.clamp(1, 8);
        if let Some(band) = self.safe_band.as_mut() {
            let mut top = clamp_or(band.top, 0.0, 1.0, 0.30);
            let mut bottom = clamp_or(band.bottom, 0.0, 1.0, 0.75);
            if top > bottom {
                std::mem::swap(&mut top, &mut bottom);
            }
            band.top = top;
            band.bottom = bottom;
            band.reduce = clamp_or(band.reduce, 0.0, 1.0, 0.65);
            band.feather = clamp_or(band.feather, 0.0, 0.25, 0.05);
        }
        self
    }

    /// Peak per-puff alpha: intensity capped by the opacity ceiling.
    pub fn effective_alpha(&self) -> f32 {
        self.intensity.max(0.0).min(self.max_opacity)
    }

    pub fn aurora_visible(&self) -> bool {
        self.theme.is_dark() || self.show_in_light
    }

    pub fn stars_visible(&self) -> bool {
        self.stars && (self.theme.is_dark() || self.stars_in_light)
    }
}

fn clamp_or(v: f32, lo: f32, hi: f32, fallback: f32) -> f32 {
    if v.is_finite() { v.clamp(lo, hi) } else { fallback }
}

/// Logical viewport plus the device pixel ratio it is displayed at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub css_width: u32,
    pub css_height: u32,
    pub dpr: f32,
}

impl Viewport {
    pub fn new(css_width: u32, css_height: u32, dpr: f32) -> Self {
        let dpr = if dpr.is_finite() { dpr.clamp(1.0, MAX_DPR) } else { 1.0 };
        Self {
            css_width,
            css_height,
            dpr,
        }
    }

    pub fn device_size(&self) -> (usize, usize) {
        (
            (self.css_width as f32 * self.dpr).floor() as usize,
            (self.css_height as f32 * self.dpr).floor() as usize,
        )
    }
}

/// RGBA8 drawing target sized in device pixels. Never resized in place.
pub struct RenderSurface {
    viewport: Viewport,
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl RenderSurface {
    /// `None` when the viewport has no area to draw into.
    pub fn new(viewport: Viewport) -> Option<Self> {
        let (width, height) = viewport.device_size();
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            viewport,
            width,
            height,
            pixels: vec![0; width * height * 4],
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

/// Time inputs for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTime {
    /// Speed-scaled animation clock in seconds.
    pub clock: f32,
    /// Unscaled time since mount in milliseconds; drives the star twinkle.
    pub wall_ms: f64,
}

/// Premultiplied RGBA float layer the aurora is accumulated into before it
/// lands on the sky.
pub(crate) struct GlowLayer {
    pub w: usize,
    pub h: usize,
    pub data: Vec<f32>,
}

impl GlowLayer {
    fn new() -> Self {
        Self {
            w: 0,
            h: 0,
            data: Vec::new(),
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        self.w = w;
        self.h = h;
        self.data.clear();
        self.data.resize(w * h * 4, 0.0);
    }

    fn clear(&mut self) {
        self.data.fill(0.0);
    }

    #[inline]
    pub fn stamp(&mut self, idx: usize, rgb: [f32; 3], alpha: f32, mode: BlendMode) {
        let a = alpha.clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        let i = idx * 4;
        let px = &mut self.data[i..i + 4];
        match mode {
            BlendMode::Add => {
                px[0] += rgb[0] * a;
                px[1] += rgb[1] * a;
                px[2] += rgb[2] * a;
                px[3] = (px[3] + a).min(1.0);
            }
            BlendMode::Screen => {
                for ch in 0..3 {
                    px[ch] = 1.0 - (1.0 - px[ch].min(1.0)) * (1.0 - rgb[ch] * a);
                }
                px[3] = a + px[3] * (1.0 - a);
            }
            BlendMode::Over => {
                for ch in 0..3 {
                    px[ch] = rgb[ch] * a + px[ch] * (1.0 - a);
                }
                px[3] = a + px[3] * (1.0 - a);
            }
        }
    }
}

/// Composites sky, starfield, aurora and post effects into a surface.
pub struct LayerRenderer {
    config: AuroraConfig,
    fractal: Fractal,
    sky: Vec<u8>,
    stars: Option<Starfield>,
    glow: GlowLayer,
    layer_size: (usize, usize),
}

impl LayerRenderer {
    pub fn new(config: AuroraConfig) -> Self {
        let config = config.validated();
        let fractal = match config.seed {
            Some(seed) => Fractal::seeded(seed),
            None => Fractal::seeded(fastrand::u64(..)),
        };
        Self::with_fractal(config, fractal)
    }

    pub fn with_fractal(config: AuroraConfig, fractal: Fractal) -> Self {
        Self {
            config: config.validated(),
            fractal,
            sky: Vec::new(),
            stars: None,
            glow: GlowLayer::new(),
            layer_size: (0, 0),
        }
    }

    pub fn config(&self) -> &AuroraConfig {
        &self.config
    }

    pub fn fractal(&self) -> &Fractal {
        &self.fractal
    }

    /// Replaces the configuration and rebuilds caches at the current size.
    /// Without a viewport the caches are invalidated and the next `render`
    /// rebuilds them.
    pub fn set_config(&mut self, config: AuroraConfig, viewport: Option<Viewport>) {
        self.config = config.validated();
        match viewport {
            Some(vp) => self.rebuild(vp),
            None => self.layer_size = (0, 0),
        }
    }

    /// Rebuilds the cached sky and starfield for a viewport.
    pub fn rebuild(&mut self, viewport: Viewport) {
        let (w, h) = viewport.device_size();
        self.layer_size = (w, h);
        self.sky = sky::build_sky(&self.config, w, h);
        self.stars = if self.config.stars_visible() {
            let seed = self.config.seed.unwrap_or_else(|| fastrand::u64(..));
            Some(Starfield::build(&self.config, viewport, seed))
        } else {
            None
        };
        self.glow.resize(w, h);
        tracing::debug!(width = w, height = h, dpr = viewport.dpr, "rebuilt cached layers");
    }

    pub fn layer_size(&self) -> (usize, usize) {
        self.layer_size
    }

    pub fn sky_layer(&self) -> &[u8] {
        &self.sky
    }

    pub fn starfield(&self) -> Option<&Starfield> {
        self.stars.as_ref()
    }

    pub fn render(&mut self, surface: &mut RenderSurface, time: FrameTime) {
        let (w, h) = (surface.width(), surface.height());
        if w == 0 || h == 0 {
            return;
        }
        if self.layer_size != (w, h) {
            self.rebuild(surface.viewport());
        }

        let out = surface.pixels_mut();
        out.copy_from_slice(&self.sky);

        if let Some(stars) = &self.stars {
            let opacity = if self.config.star_twinkle {
                twinkle(time.wall_ms)
            } else {
                1.0
            };
            stars.composite(out, opacity);
        }

        if !self.config.aurora_visible() {
            return;
        }

        let mode = self.config.theme.blend_mode();
        self.glow.clear();
        if self.config.preset.uses_curtains() {
            curtains::draw_curtains(&mut self.glow, &self.config, &self.fractal, time.clock);
        } else {
            ribbons::draw_ribbons(&mut self.glow, &self.config, &self.fractal, time.clock * 0.1);
        }
        if self.config.bloom > 0.0 {
            post::bloom(&mut self.glow, self.config.bloom);
        }
        if self.config.shimmer_opacity > 0.0 {
            post::shimmer(
                &mut self.glow,
                &self.config,
                &self.fractal,
                time.clock * 0.1,
                surface.viewport().dpr,
            );
        }

        let out = surface.pixels_mut();
        for (px, g) in out.chunks_exact_mut(4).zip(self.glow.data.chunks_exact(4)) {
            if g[3] <= 0.0 && g[0] <= 0.0 && g[1] <= 0.0 && g[2] <= 0.0 {
                continue;
            }
            color::blend_premultiplied(px, [g[0], g[1], g[2]], g[3], mode);
        }

        post::grade(out, self.config.saturation, self.config.contrast);
    }
}
