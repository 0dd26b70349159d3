use std::f32::consts::PI;

use super::{AuroraConfig, GlowLayer, SafeBand};
use crate::color::{hsl_to_rgb, lerp_hue, smoothstep};
use crate::noise::Fractal;

/// Centerline samples per ribbon (segments, so `RIBBON_SEGMENTS + 1` points).
pub const RIBBON_SEGMENTS: usize = 76;

const HUE_TEAL: f32 = 150.0;
const HUE_BLUE: f32 = 210.0;
const HUE_PURPLE: f32 = 285.0;
const HUE_RED: f32 = 350.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RibbonPoint {
    pub x: f32,
    pub y: f32,
}

/// Samples ribbon `r`'s centerline across a `w`x`h` surface at time `t`.
pub fn ribbon_points(
    cfg: &AuroraConfig,
    fractal: &Fractal,
    r: u32,
    t: f32,
    w: f32,
    h: f32,
) -> Vec<RibbonPoint> {
    let rf = r as f32;
    (0..=RIBBON_SEGMENTS)
        .map(|i| {
            let nx = i as f32 / RIBBON_SEGMENTS as f32;
            let center = 0.5 + (nx * PI * cfg.curve_freq + t * 0.7).sin() * cfg.curve_amp;
            let weave = (nx * PI * (cfg.curve_freq + 0.5) + t * 0.9 + rf * PI).sin() * cfg.weave_amp;
            let warp = (fractal.fbm_normalized(nx * 1.4 + rf * 0.7 + t * 0.4, t * 0.4 + rf, 3) - 0.5)
                * cfg.noise_warp;
            RibbonPoint {
                x: nx * w,
                y: (center + weave + warp) * h,
            }
        })
        .collect()
}

/// Palette hue at normalized x for ribbon `r`.
pub fn ribbon_hue(nx: f32, t: f32, r: u32) -> f32 {
    let rf = r as f32;
    let sweep = 0.5 + 0.5 * (nx * PI * 1.1 + t * 0.7 + rf).sin();
    let red_pulse = ((t * 0.5 + rf).sin() - 0.94).max(0.0) / 0.06;
    let hue = lerp_hue(lerp_hue(HUE_TEAL, HUE_BLUE, sweep), HUE_PURPLE, sweep * 0.6);
    lerp_hue(hue, HUE_RED, red_pulse.min(1.0))
}

/// Alpha multiplier at normalized `y`: `1 - reduce` inside the band, `1`
/// outside, smooth over `feather` at each edge.
pub fn safe_band_factor(band: Option<&SafeBand>, y: f32) -> f32 {
    let Some(b) = band else {
        return 1.0;
    };
    let f = b.feather;
    let inside = smoothstep(b.top - f, b.top + f, y) * (1.0 - smoothstep(b.bottom - f, b.bottom + f, y));
    1.0 - b.reduce * inside
}

struct Puff {
    stops: [([f32; 3], f32); 3],
}

impl Puff {
    fn new(hue: f32, alpha: f32, dark: bool) -> Self {
        let (l0, l1, l2) = if dark { (0.76, 0.78, 0.80) } else { (0.86, 0.87, 0.88) };
        Self {
            stops: [
                (hsl_to_rgb(hue, 1.0, l0), alpha * 0.6),
                (hsl_to_rgb(hue + 18.0, 0.9, l1), alpha * 0.42),
                (hsl_to_rgb(hue + 90.0, 0.6, l2), 0.0),
            ],
        }
    }

    #[inline]
    fn at(&self, d: f32) -> ([f32; 3], f32) {
        let (a, b, t) = if d < 0.45 {
            (self.stops[0], self.stops[1], d / 0.45)
        } else {
            (self.stops[1], self.stops[2], (d - 0.45) / 0.55)
        };
        let c = [
            a.0[0] + (b.0[0] - a.0[0]) * t,
            a.0[1] + (b.0[1] - a.0[1]) * t,
            a.0[2] + (b.0[2] - a.0[2]) * t,
        ];
        (c, a.1 + (b.1 - a.1) * t)
    }
}

pub(super) fn draw_ribbons(glow: &mut GlowLayer, cfg: &AuroraConfig, fractal: &Fractal, t: f32) {
    let (w, h) = (glow.w, glow.h);
    if w == 0 || h == 0 || cfg.ribbon_count == 0 {
        return;
    }
    let wf = w as f32;
    let hf = h as f32;
    let base_alpha = cfg.effective_alpha();
    if base_alpha <= 0.0 {
        return;
    }
    let radius = cfg.puff_radius * wf;
    let step = (cfg.puff_step * wf).max(1.0);
    let mode = cfg.theme.blend_mode();
    let dark = cfg.theme.is_dark();

    for r in 0..cfg.ribbon_count {
        let pts = ribbon_points(cfg, fractal, r, t, wf, hf);
        for seg in pts.windows(2) {
            let (p0, p1) = (seg[0], seg[1]);
            let dx = p1.x - p0.x;
            let dy = p1.y - p0.y;
            let len = (dx * dx + dy * dy).sqrt();
            if len <= 0.0 {
                continue;
            }
            let mut d = 0.0;
            while d <= len {
                let cx = p0.x + dx * d / len;
                let cy = p0.y + dy * d / len;
                let nx = cx / wf;
                let ny = cy / hf;
                let jitter = fractal.noise(nx * 5.76 + t, ny * 3.6 + r as f32) - 0.5;
                let rad = (radius + jitter * radius * 0.27).max(radius * 0.75);
                let alpha = base_alpha * safe_band_factor(cfg.safe_band.as_ref(), ny);
                if alpha > 0.0 {
                    let puff = Puff::new(ribbon_hue(nx, t, r), alpha, dark);
                    stamp_puff(glow, cx, cy, rad, &puff, mode);
                }
                d += step;
            }
        }
    }
}

fn stamp_puff(glow: &mut GlowLayer, cx: f32, cy: f32, rad: f32, puff: &Puff, mode: crate::color::BlendMode) {
    if rad <= 0.0 {
        return;
    }
    let (w, h) = (glow.w as isize, glow.h as isize);
    let x0 = ((cx - rad).floor() as isize).max(0);
    let y0 = ((cy - rad).floor() as isize).max(0);
    let x1 = ((cx + rad).ceil() as isize).min(w - 1);
    let y1 = ((cy + rad).ceil() as isize).min(h - 1);
    if x0 > x1 || y0 > y1 {
        return;
    }
    let inv = 1.0 / rad;
    for y in y0..=y1 {
        let fy = (y as f32 + 0.5 - cy) * inv;
        for x in x0..=x1 {
            let fx = (x as f32 + 0.5 - cx) * inv;
            let d = (fx * fx + fy * fy).sqrt();
            if d >= 1.0 {
                continue;
            }
            let (rgb, a) = puff.at(d);
            glow.stamp(y as usize * glow.w + x as usize, rgb, a, mode);
        }
    }
}
