use super::{AuroraConfig, GlowLayer};
use crate::color::smoothstep;
use crate::noise::Fractal;

const OCTAVES: u32 = 5;

/// Curtain tint at time `t`; greens and teals with purple skirts.
pub(super) fn curtain_palette(t: f32, hue_shift: f32) -> [f32; 3] {
    let tau = std::f32::consts::TAU;
    let g = 0.65 + 0.35 * (t * 0.35 + 1.5 + hue_shift * tau).sin();
    let b = 0.45 + 0.40 * (t * 0.27 + 4.0 + hue_shift * 3.2).sin();
    let p = 0.25 + 0.40 * (t * 0.22 + 6.0 + hue_shift * 2.1).sin();
    let c = [0.2 * b + 0.08, 0.75 * g + 0.12, (0.55 * b + 0.35 * p).max(0.0)];
    let len = (c[0] * c[0] + c[1] * c[1] + c[2] * c[2]).sqrt();
    if len <= 1e-6 {
        return [0.0; 3];
    }
    [c[0] / len, c[1] / len, c[2] / len]
}

/// Curtain brightness at normalized `(u, v)`, `v = 1` at the top edge.
pub(super) fn curtain_field(fractal: &Fractal, u: f32, v: f32, t: f32) -> f32 {
    let mut base = fractal.fbm_normalized(u * 2.0, v * 1.1 - t * 0.06, OCTAVES);
    base += 0.5 * fractal.fbm_normalized(u * 3.6 + 1.2, v * 1.8 + t * 0.05, OCTAVES);
    let base = smoothstep(0.42, 0.72, base / 1.5);

    let streaks = fractal.fbm_normalized(u * 8.0 - t * 0.15, v * 2.8 + t * 0.04, OCTAVES);
    let banding = 0.30 + 0.85 * smoothstep(0.35, 0.7, streaks);
    base * banding
}

pub(super) fn draw_curtains(glow: &mut GlowLayer, cfg: &AuroraConfig, fractal: &Fractal, t: f32) {
    let (w, h) = (glow.w, glow.h);
    if w == 0 || h == 0 {
        return;
    }
    let step = cfg.field_step.max(1);
    let tint = curtain_palette(t, cfg.hue_shift);
    let gain = 1.4 * cfg.intensity;
    let mode = cfg.theme.blend_mode();

    for by in (0..h).step_by(step) {
        let yn = (by as f32 + step as f32 * 0.5) / h as f32;
        let v = ((1.0 - yn) - 0.5) * cfg.scale_y + 0.5;
        let horizon = smoothstep(0.05, 0.95, yn);
        if horizon <= 0.0 {
            continue;
        }
        for bx in (0..w).step_by(step) {
            let u = (bx as f32 + step as f32 * 0.5) / w as f32;
            let k = curtain_field(fractal, u, v, t) * horizon * gain;
            if k <= 0.0 {
                continue;
            }
            let rgb = [tint[0] * k, tint[1] * k, tint[2] * k];
            let a = rgb[0].max(rgb[1]).max(rgb[2]).min(1.0);
            if a <= 0.0 {
                continue;
            }
            let straight = [rgb[0] / a, rgb[1] / a, rgb[2] / a];
            for y in by..(by + step).min(h) {
                for x in bx..(bx + step).min(w) {
                    glow.stamp(y * w + x, straight, a, mode);
                }
            }
        }
    }
}
