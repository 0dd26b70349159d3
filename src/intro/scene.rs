//! Raster layers of the forest intro: twilight sky, aurora veil, fog, three
//! parallax pine rows and fireflies. The name itself is text, so only its
//! reveal curve lives here.

use std::f32::consts::TAU;

use crate::color::{blend_pixel, mix3, rgb8, BlendMode};
use crate::visual::Theme;

pub const FIREFLY_COUNT: usize = 42;

const PINES_PER_ROW: usize = 26;
/// Pine rows use a 1200x200 design box stretched over the bottom 55% of the view.
const PINE_BOX: (f32, f32) = (1200.0, 200.0);
const PINE_ROW_HEIGHT: f32 = 0.55;

#[derive(Clone, Copy, Debug)]
struct PineRow {
    depth: f32,
    sway_secs: f32,
    opacity: f32,
}

const PINE_ROWS: [PineRow; 3] = [
    PineRow { depth: 0.0, sway_secs: 5.0, opacity: 1.0 },
    PineRow { depth: 1.0, sway_secs: 6.0, opacity: 0.85 },
    PineRow { depth: 2.0, sway_secs: 7.0, opacity: 0.7 },
];

#[derive(Clone, Copy, Debug)]
struct Firefly {
    x: f32,
    y: f32,
    period: f32,
    radius: f32,
}

/// Horizontal pine sway in logical px at `secs` for a row of `depth`.
pub fn pine_sway(secs: f32, sway_secs: f32, depth: f32) -> f32 {
    (secs / sway_secs).sin() * 20.0 * (1.0 + depth * 0.2)
}

/// State of the name title at some point of the reveal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NameReveal {
    /// Extra spacing between letters in em.
    pub letter_spacing: f32,
    pub opacity: f32,
    /// Downward offset in logical px.
    pub offset_y: f32,
}

impl NameReveal {
    /// Tracks in from wide spacing, overshoots tight, settles at 0.15em.
    pub fn at(elapsed_secs: f32, reduced_motion: bool) -> Self {
        let total = if reduced_motion { 0.8 } else { 2.1 };
        let p = (elapsed_secs / total).clamp(0.0, 1.0);
        if p < 0.6 {
            let k = ease_out_expo_like(p / 0.6);
            Self {
                letter_spacing: lerp(0.6, 0.05, k),
                opacity: k,
                offset_y: lerp(8.0, 0.0, k),
            }
        } else {
            let k = ease_out_expo_like((p - 0.6) / 0.4);
            Self {
                letter_spacing: lerp(0.05, 0.15, k),
                opacity: 1.0,
                offset_y: 0.0,
            }
        }
    }

    /// Whole cells of padding between letters for a terminal title, where one
    /// em is roughly two cells.
    pub fn spaced(&self, name: &str) -> String {
        let gap = (self.letter_spacing * 2.0).round().max(0.0) as usize;
        let mut out = String::new();
        for (i, ch) in name.chars().enumerate() {
            if i > 0 {
                out.extend(std::iter::repeat_n(' ', gap));
            }
            out.push(ch);
        }
        out
    }
}

/// `cubic-bezier(.16, 1, .3, 1)`: fast start, long settle.
fn ease_out_expo_like(x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    cubic_bezier(0.16, 1.0, 0.3, 1.0, x)
}

fn cubic_bezier(x1: f32, y1: f32, x2: f32, y2: f32, x: f32) -> f32 {
    let bez = |a: f32, b: f32, t: f32| {
        let u = 1.0 - t;
        3.0 * u * u * t * a + 3.0 * u * t * t * b + t * t * t
    };
    // Bisection on the monotonic x curve.
    let (mut lo, mut hi) = (0.0f32, 1.0f32);
    for _ in 0..24 {
        let mid = 0.5 * (lo + hi);
        if bez(x1, x2, mid) < x {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    bez(y1, y2, 0.5 * (lo + hi))
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub struct IntroScene {
    theme: Theme,
    reduced_motion: bool,
    fireflies: Vec<Firefly>,
}

impl IntroScene {
    pub fn new(theme: Theme, reduced_motion: bool, seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        let fireflies = (0..FIREFLY_COUNT)
            .map(|_| Firefly {
                x: rng.f32(),
                y: rng.f32() * 0.7 + 0.15,
                period: 4.0 + rng.f32() * 6.0,
                radius: 1.0 + rng.f32() * 1.8,
            })
            .collect();
        Self {
            theme,
            reduced_motion,
            fireflies,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn reduced_motion(&self) -> bool {
        self.reduced_motion
    }

    pub fn firefly_count(&self) -> usize {
        if self.reduced_motion { 0 } else { self.fireflies.len() }
    }

    pub fn name_reveal(&self, elapsed_secs: f32) -> NameReveal {
        NameReveal::at(elapsed_secs, self.reduced_motion)
    }

    /// Paints the full overlay into a `w`x`h` RGBA8 buffer.
    pub fn render(&self, out: &mut [u8], w: usize, h: usize, dpr: f32, secs: f32) {
        if w == 0 || h == 0 || out.len() < w * h * 4 {
            return;
        }
        self.paint_sky(out, w, h);
        self.paint_veil(out, w, h, secs);
        if !self.reduced_motion {
            self.paint_fog(out, w, h, secs);
        }
        for row in PINE_ROWS {
            paint_pine_row(out, w, h, row, pine_sway(secs, row.sway_secs, row.depth) * dpr);
        }
        if !self.reduced_motion {
            self.paint_fireflies(out, w, h, dpr, secs);
        }
    }

    fn paint_sky(&self, out: &mut [u8], w: usize, h: usize) {
        let stops: &[(f32, u32)] = match self.theme {
            Theme::Dark => &[(0.0, 0x0c1426), (0.6, 0x0a1834), (1.0, 0x0a0f22)],
            Theme::Light => &[(0.0, 0xeaf4ff), (1.0, 0xdfefff)],
        };
        let denom = h.saturating_sub(1).max(1) as f32;
        for (y, row) in out.chunks_exact_mut(w * 4).take(h).enumerate() {
            let t = y as f32 / denom;
            let mut c = rgb8(stops[0].1);
            for pair in stops.windows(2) {
                let (p0, c0) = pair[0];
                let (p1, c1) = pair[1];
                if t >= p0 && t <= p1 {
                    c = mix3(rgb8(c0), rgb8(c1), (t - p0) / (p1 - p0).max(1e-6));
                    break;
                }
            }
            let px = [
                (c[0] * 255.0).round() as u8,
                (c[1] * 255.0).round() as u8,
                (c[2] * 255.0).round() as u8,
                255,
            ];
            for cell in row.chunks_exact_mut(4) {
                cell.copy_from_slice(&px);
            }
        }
    }

    fn paint_veil(&self, out: &mut [u8], w: usize, h: usize, secs: f32) {
        let period = if self.reduced_motion { 5.0 } else { 12.0 };
        let pulse = lerp(0.10, 0.22, 0.5 - 0.5 * (secs / period * TAU).cos());
        let mode = if self.theme.is_dark() { BlendMode::Add } else { BlendMode::Screen };
        let blobs = [
            Blob::new((0.40, 0.30), (0.60, 0.40), rgb8(0x78dcff), 0.35),
            Blob::new((0.70, 0.60), (0.60, 0.40), rgb8(0xbe8cff), 0.30),
        ];
        paint_blobs(out, w, h, &blobs, 0.0, pulse, mode);
    }

    fn paint_fog(&self, out: &mut [u8], w: usize, h: usize, secs: f32) {
        let near = [Blob::new((0.20, 0.40), (0.40, 0.30), rgb8(0xb9d3ff), 0.28)];
        let far = [Blob::new((0.80, 0.60), (0.42, 0.32), rgb8(0x9fe5cf), 0.23)];
        // Near bank swings -8%..8% over 16s, far bank 10%..-6% over 18s.
        let sa = 0.5 - 0.5 * (secs / 16.0 * TAU).cos();
        let sb = 0.5 - 0.5 * (secs / 18.0 * TAU).cos();
        paint_blobs(out, w, h, &near, lerp(-0.08, 0.08, sa), 0.16, BlendMode::Over);
        paint_blobs(out, w, h, &far, lerp(0.10, -0.06, sb), 0.14, BlendMode::Over);
    }

    fn paint_fireflies(&self, out: &mut [u8], w: usize, h: usize, dpr: f32, secs: f32) {
        let core = [1.0, 1.0, 210.0 / 255.0];
        let halo = [150.0 / 255.0, 220.0 / 255.0, 1.0];
        for f in &self.fireflies {
            let lift = -6.0 * (0.5 - 0.5 * (secs / f.period * TAU).cos());
            let cx = f.x * w as f32;
            let cy = f.y * h as f32 + lift * dpr;
            let r = f.radius * dpr;
            let glow = 12.0 * dpr;
            disc(out, w, h, cx, cy, glow, |d| {
                let k = (1.0 - d / glow).max(0.0);
                (halo, k * k * 0.3)
            });
            disc(out, w, h, cx, cy, r + 0.5, |d| (core, (r + 0.5 - d).clamp(0.0, 1.0) * 0.855));
        }
    }
}

struct Blob {
    center: (f32, f32),
    radii: (f32, f32),
    color: [f32; 3],
    alpha: f32,
}

impl Blob {
    fn new(center: (f32, f32), radii: (f32, f32), color: [f32; 3], alpha: f32) -> Self {
        Self {
            center,
            radii,
            color,
            alpha,
        }
    }
}

/// Elliptical radial gradients fading out at 60% of their radii.
fn paint_blobs(out: &mut [u8], w: usize, h: usize, blobs: &[Blob], shift_x: f32, opacity: f32, mode: BlendMode) {
    let (wf, hf) = (w as f32, h as f32);
    for (y, row) in out.chunks_exact_mut(w * 4).take(h).enumerate() {
        let ny = (y as f32 + 0.5) / hf;
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let nx = (x as f32 + 0.5) / wf - shift_x;
            for b in blobs {
                let dx = (nx - b.center.0) / b.radii.0;
                let dy = (ny - b.center.1) / b.radii.1;
                let d = (dx * dx + dy * dy).sqrt() / 0.6;
                if d < 1.0 {
                    blend_pixel(px, b.color, b.alpha * (1.0 - d) * opacity, mode);
                }
            }
        }
    }
}

fn disc(out: &mut [u8], w: usize, h: usize, cx: f32, cy: f32, r: f32, shade: impl Fn(f32) -> ([f32; 3], f32)) {
    if r <= 0.0 {
        return;
    }
    let x0 = (cx - r).floor().max(0.0) as usize;
    let y0 = (cy - r).floor().max(0.0) as usize;
    let x1 = ((cx + r).ceil().max(0.0) as usize).min(w.saturating_sub(1));
    let y1 = ((cy + r).ceil().max(0.0) as usize).min(h.saturating_sub(1));
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let d = (dx * dx + dy * dy).sqrt();
            if d > r {
                continue;
            }
            let (c, a) = shade(d);
            let i = (y * w + x) * 4;
            blend_pixel(&mut out[i..i + 4], c, a, BlendMode::Over);
        }
    }
}

fn paint_pine_row(out: &mut [u8], w: usize, h: usize, row: PineRow, sway_px: f32) {
    let top = h as f32 * (1.0 - PINE_ROW_HEIGHT);
    let sx = w as f32 / PINE_BOX.0;
    let sy = h as f32 * PINE_ROW_HEIGHT / PINE_BOX.1;
    let fill = [10.0 / 255.0, 20.0 / 255.0, 30.0 / 255.0];
    let alpha = (0.9 - row.depth * 0.2) * row.opacity;
    // Views narrower than the design box shrink the sway with it.
    let sway_px = sway_px * sx.min(1.0);

    for i in 0..PINES_PER_ROW {
        let x = i as f32 * 48.0;
        let base = 150.0 + (i % 2) as f32 * 4.0;
        let scale = 0.9 + (i % 5) as f32 * 0.06;
        // Design-box point to device px.
        let map = |px: f32, py: f32| (x * sx + px * scale * sx + sway_px, top + py * scale * sy);

        let tiers = [
            [(x, base), (x + 24.0, base), (x + 12.0, base - 28.0)],
            [(x - 4.0, base - 18.0), (x + 28.0, base - 18.0), (x + 12.0, base - 46.0)],
            [(x - 8.0, base - 36.0), (x + 32.0, base - 36.0), (x + 12.0, base - 64.0)],
        ];
        for tri in tiers {
            let pts = tri.map(|(px, py)| map(px, py));
            fill_triangle(out, w, h, pts, fill, alpha);
        }
        let trunk_w = 6.0 * scale / 3.0;
        let (tx0, ty0) = map(x + 11.0, base);
        let (tx1, ty1) = map(x + 11.0 + trunk_w, base + 10.0);
        fill_rect(out, w, h, (tx0, ty0), (tx1, ty1), fill, alpha);
    }
}

fn fill_triangle(out: &mut [u8], w: usize, h: usize, p: [(f32, f32); 3], c: [f32; 3], a: f32) {
    let min_x = p.iter().map(|v| v.0).fold(f32::INFINITY, f32::min).floor().max(0.0) as usize;
    let max_x = p.iter().map(|v| v.0).fold(f32::NEG_INFINITY, f32::max).ceil();
    let min_y = p.iter().map(|v| v.1).fold(f32::INFINITY, f32::min).floor().max(0.0) as usize;
    let max_y = p.iter().map(|v| v.1).fold(f32::NEG_INFINITY, f32::max).ceil();
    if max_x < 0.0 || max_y < 0.0 {
        return;
    }
    let max_x = (max_x as usize).min(w.saturating_sub(1));
    let max_y = (max_y as usize).min(h.saturating_sub(1));
    let edge = |a: (f32, f32), b: (f32, f32), x: f32, y: f32| (b.0 - a.0) * (y - a.1) - (b.1 - a.1) * (x - a.0);
    let area = edge(p[0], p[1], p[2].0, p[2].1);
    if area.abs() < 1e-6 {
        return;
    }
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let (fx, fy) = (x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(p[1], p[2], fx, fy) * area.signum();
            let w1 = edge(p[2], p[0], fx, fy) * area.signum();
            let w2 = edge(p[0], p[1], fx, fy) * area.signum();
            if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                let i = (y * w + x) * 4;
                blend_pixel(&mut out[i..i + 4], c, a, BlendMode::Over);
            }
        }
    }
}

fn fill_rect(out: &mut [u8], w: usize, h: usize, p0: (f32, f32), p1: (f32, f32), c: [f32; 3], a: f32) {
    let x0 = p0.0.min(p1.0).floor().max(0.0) as usize;
    let y0 = p0.1.min(p1.1).floor().max(0.0) as usize;
    let x1 = (p0.0.max(p1.0).ceil().max(0.0) as usize).min(w);
    let y1 = (p0.1.max(p1.1).ceil().max(0.0) as usize).min(h);
    for y in y0..y1 {
        for x in x0..x1 {
            let i = (y * w + x) * 4;
            blend_pixel(&mut out[i..i + 4], c, a, BlendMode::Over);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_reveal_settles() {
        let start = NameReveal::at(0.0, false);
        assert_eq!(start.opacity, 0.0);
        assert!((start.letter_spacing - 0.6).abs() < 1e-3);
        let end = NameReveal::at(10.0, false);
        assert!((end.letter_spacing - 0.15).abs() < 1e-3);
        assert_eq!(end.opacity, 1.0);
        // Reduced motion finishes sooner.
        assert!((NameReveal::at(0.8, true).letter_spacing - 0.15).abs() < 1e-3);
    }

    #[test]
    fn spaced_name_pads_between_letters() {
        let r = NameReveal {
            letter_spacing: 1.0,
            opacity: 1.0,
            offset_y: 0.0,
        };
        assert_eq!(r.spaced("abc"), "a  b  c");
    }

    #[test]
    fn sway_grows_with_depth() {
        let near = pine_sway(3.0, 5.0, 0.0).abs();
        let far = pine_sway(3.0, 5.0, 2.0).abs();
        assert!(far > near);
        assert!(far <= 28.0 + 1e-4);
    }

    #[test]
    fn pines_sway_between_frames() {
        let scene = IntroScene::new(Theme::Dark, true, 3);
        let (w, h) = (120, 60);
        let mut a = vec![0u8; w * h * 4];
        let mut b = vec![0u8; w * h * 4];
        scene.render(&mut a, w, h, 1.0, 0.0);
        scene.render(&mut b, w, h, 1.0, 4.0);
        assert_eq!(scene.firefly_count(), 0);
        assert!(a.chunks_exact(4).all(|p| p[3] == 255));
        let bottom = (h / 2) * w * 4;
        assert_ne!(&a[bottom..], &b[bottom..]);
    }
}
