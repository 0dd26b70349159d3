use super::{AuroraConfig, Viewport};
use crate::color::{blend_pixel, BlendMode};

/// Logical area covered by one star at density 1.
const AREA_PER_STAR: f32 = 3600.0;

pub fn star_count(css_width: u32, css_height: u32, density: f32) -> usize {
    let base = (css_width as f32 * css_height as f32 / AREA_PER_STAR).floor();
    (base * density.max(0.0)).floor() as usize
}

/// Overall star opacity at `ms` since mount.
pub fn twinkle(ms: f64) -> f32 {
    let ms = ms as f32;
    0.92 + 0.05 * (ms * 0.0011).sin() + 0.03 * (ms * 0.002).cos()
}

#[derive(Clone, Copy, Debug)]
struct Sprite {
    idx: usize,
    alpha: f32,
}

/// Pre-rasterized stars for one surface size. Only the global opacity varies
/// between frames.
pub struct Starfield {
    width: usize,
    height: usize,
    stars: usize,
    sprites: Vec<Sprite>,
    color: [f32; 3],
}

impl Starfield {
    pub fn build(cfg: &AuroraConfig, viewport: Viewport, seed: u64) -> Self {
        let (width, height) = viewport.device_size();
        let stars = star_count(viewport.css_width, viewport.css_height, cfg.star_density);
        let mut rng = fastrand::Rng::with_seed(seed ^ 0x5747_4152);
        let mut sprites = Vec::new();

        if width > 0 && height > 0 {
            for _ in 0..stars {
                let cx = rng.f32() * width as f32;
                let cy = rng.f32() * height as f32;
                let big = rng.f32() < 0.1;
                let r = cfg.star_size * viewport.dpr * if big { 1.4 } else { 1.0 };
                let alpha = 0.35 + rng.f32() * 0.45;
                rasterize_disc(&mut sprites, width, height, cx, cy, r, alpha);
            }
        }

        let color = if cfg.theme.is_dark() {
            [1.0, 1.0, 1.0]
        } else {
            [0.55, 0.66, 0.85]
        };

        Self {
            width,
            height,
            stars,
            sprites,
            color,
        }
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn star_count(&self) -> usize {
        self.stars
    }

    pub fn sprite_len(&self) -> usize {
        self.sprites.len()
    }

    pub fn composite(&self, out: &mut [u8], opacity: f32) {
        if out.len() < self.width * self.height * 4 {
            return;
        }
        let opacity = opacity.clamp(0.0, 1.0);
        for s in &self.sprites {
            let i = s.idx * 4;
            blend_pixel(&mut out[i..i + 4], self.color, s.alpha * opacity, BlendMode::Over);
        }
    }
}

fn rasterize_disc(
    sprites: &mut Vec<Sprite>,
    w: usize,
    h: usize,
    cx: f32,
    cy: f32,
    r: f32,
    alpha: f32,
) {
    let reach = r + 0.5;
    let x0 = (cx - reach).floor().max(0.0) as usize;
    let y0 = (cy - reach).floor().max(0.0) as usize;
    let x1 = ((cx + reach).ceil() as usize).min(w.saturating_sub(1));
    let y1 = ((cy + reach).ceil() as usize).min(h.saturating_sub(1));
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let dist = (dx * dx + dy * dy).sqrt();
            let coverage = (r + 0.5 - dist).clamp(0.0, 1.0);
            if coverage > 0.0 {
                sprites.push(Sprite {
                    idx: y * w + x,
                    alpha: alpha * coverage,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_follows_logical_area() {
        assert_eq!(star_count(1200, 800, 1.0), 266);
        assert_eq!(star_count(1200, 800, 0.5), 133);
        assert_eq!(star_count(10, 10, 5.0), 0);
    }

    #[test]
    fn twinkle_stays_near_full() {
        for ms in [0.0, 1234.0, 98765.0, 1.0e7] {
            let v = twinkle(ms);
            assert!((0.84..=1.0).contains(&v), "twinkle {v}");
        }
    }

    #[test]
    fn same_seed_same_sprites() {
        let cfg = AuroraConfig::default();
        let vp = Viewport::new(300, 200, 1.0);
        let a = Starfield::build(&cfg, vp, 9);
        let b = Starfield::build(&cfg, vp, 9);
        assert_eq!(a.sprite_len(), b.sprite_len());
        assert!(a.sprite_len() >= a.star_count());
        assert_eq!(a.size(), (300, 200));
    }
}
