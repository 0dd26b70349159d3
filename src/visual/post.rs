use super::{AuroraConfig, GlowLayer};
use crate::color::{contrast, saturate, smoothstep};
use crate::noise::Fractal;

const BLOOM_DOWNSAMPLE: usize = 4;
const BLOOM_RADIUS: usize = 2;
const SHIMMER_CELL_CSS: f32 = 16.0;

/// Blur a quarter-resolution copy of the glow layer and add it back.
pub(super) fn bloom(glow: &mut GlowLayer, amount: f32) {
    let (w, h) = (glow.w, glow.h);
    let sw = w.div_ceil(BLOOM_DOWNSAMPLE);
    let sh = h.div_ceil(BLOOM_DOWNSAMPLE);
    if sw == 0 || sh == 0 {
        return;
    }

    let mut small = vec![0.0f32; sw * sh * 4];
    let mut counts = vec![0u32; sw * sh];
    for y in 0..h {
        let sy = y / BLOOM_DOWNSAMPLE;
        for x in 0..w {
            let si = sy * sw + x / BLOOM_DOWNSAMPLE;
            let gi = (y * w + x) * 4;
            for ch in 0..4 {
                small[si * 4 + ch] += glow.data[gi + ch];
            }
            counts[si] += 1;
        }
    }
    for (px, &n) in small.chunks_exact_mut(4).zip(&counts) {
        if n > 0 {
            let inv = 1.0 / n as f32;
            px.iter_mut().for_each(|v| *v *= inv);
        }
    }

    box_blur(&mut small, sw, sh, BLOOM_RADIUS);

    let gain = amount * 0.5;
    for y in 0..h {
        let fy = ((y as f32 + 0.5) / BLOOM_DOWNSAMPLE as f32 - 0.5).clamp(0.0, (sh - 1) as f32);
        let y0 = fy.floor() as usize;
        let y1 = (y0 + 1).min(sh - 1);
        let ty = fy - y0 as f32;
        for x in 0..w {
            let fx = ((x as f32 + 0.5) / BLOOM_DOWNSAMPLE as f32 - 0.5).clamp(0.0, (sw - 1) as f32);
            let x0 = fx.floor() as usize;
            let x1 = (x0 + 1).min(sw - 1);
            let tx = fx - x0 as f32;
            let gi = (y * w + x) * 4;
            for ch in 0..4 {
                let a = small[(y0 * sw + x0) * 4 + ch];
                let b = small[(y0 * sw + x1) * 4 + ch];
                let c = small[(y1 * sw + x0) * 4 + ch];
                let d = small[(y1 * sw + x1) * 4 + ch];
                let top = a + (b - a) * tx;
                let bot = c + (d - c) * tx;
                glow.data[gi + ch] += (top + (bot - top) * ty) * gain;
            }
            glow.data[gi + 3] = glow.data[gi + 3].min(1.0);
        }
    }
}

fn box_blur(buf: &mut [f32], w: usize, h: usize, radius: usize) {
    let mut tmp = vec![0.0f32; buf.len()];
    for y in 0..h {
        for x in 0..w {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(w - 1);
            let n = (hi - lo + 1) as f32;
            for ch in 0..4 {
                let mut s = 0.0;
                for xx in lo..=hi {
                    s += buf[(y * w + xx) * 4 + ch];
                }
                tmp[(y * w + x) * 4 + ch] = s / n;
            }
        }
    }
    for y in 0..h {
        let lo = y.saturating_sub(radius);
        let hi = (y + radius).min(h - 1);
        let n = (hi - lo + 1) as f32;
        for x in 0..w {
            for ch in 0..4 {
                let mut s = 0.0;
                for yy in lo..=hi {
                    s += tmp[(yy * w + x) * 4 + ch];
                }
                buf[(y * w + x) * 4 + ch] = s / n;
            }
        }
    }
}

/// Coarse white sparkle cells driven by fbm.
pub(super) fn shimmer(glow: &mut GlowLayer, cfg: &AuroraConfig, fractal: &Fractal, t: f32, dpr: f32) {
    let (w, h) = (glow.w, glow.h);
    let cell = ((SHIMMER_CELL_CSS * dpr).round() as usize).max(1);
    let mode = cfg.theme.blend_mode();
    for by in (0..h).step_by(cell) {
        let cy = by / cell;
        for bx in (0..w).step_by(cell) {
            let cx = bx / cell;
            let n = fractal.fbm_normalized(cx as f32 * 0.21 + t * 0.8, cy as f32 * 0.33 - t * 0.5, 3);
            let a = smoothstep(0.45, 0.8, n) * cfg.shimmer_opacity;
            if a <= 0.0 {
                continue;
            }
            for y in by..(by + cell).min(h) {
                for x in bx..(bx + cell).min(w) {
                    glow.stamp(y * w + x, [1.0, 1.0, 1.0], a, mode);
                }
            }
        }
    }
}

/// Saturation then contrast over every non-transparent pixel.
pub(super) fn grade(out: &mut [u8], saturation: f32, k: f32) {
    if (saturation - 1.0).abs() < 1e-4 && (k - 1.0).abs() < 1e-4 {
        return;
    }
    for px in out.chunks_exact_mut(4) {
        if px[3] == 0 {
            continue;
        }
        let c = [px[0] as f32 / 255.0, px[1] as f32 / 255.0, px[2] as f32 / 255.0];
        let c = contrast(saturate(c, saturation), k);
        for ch in 0..3 {
            px[ch] = (c[ch].clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(w: usize, h: usize) -> GlowLayer {
        GlowLayer {
            w,
            h,
            data: vec![0.0; w * h * 4],
        }
    }

    #[test]
    fn bloom_spreads_a_point() {
        let mut g = layer(16, 16);
        let c = (8 * 16 + 8) * 4;
        g.data[c..c + 4].copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);
        bloom(&mut g, 1.0);
        let near = (8 * 16 + 12) * 4;
        assert!(g.data[near] > 0.0);
        assert!(g.data[c] >= 1.0);
    }

    #[test]
    fn identity_grade_leaves_pixels() {
        let mut px = vec![10u8, 120, 240, 255, 7, 7, 7, 0];
        let before = px.clone();
        grade(&mut px, 1.0, 1.0);
        assert_eq!(px, before);
        grade(&mut px, 0.0, 1.0);
        assert_eq!(&px[4..], &before[4..]);
        assert_eq!(px[0], px[1]);
    }
}
