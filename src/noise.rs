//! Gradient noise and fractal composition used for all organic motion.

/// Offset applied to secondary-field lookups so both fields never sample
/// the same lattice point.
const SECONDARY_OFFSET: (f32, f32) = (17.31, -9.73);

/// 2D gradient noise over a shuffled permutation lattice.
///
/// The table is fixed for the lifetime of the value; build a new field to
/// reseed.
#[derive(Clone)]
pub struct NoiseField {
    perm: [u8; 512],
}

impl NoiseField {
    pub fn new(seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        Self::from_rng(&mut rng)
    }

    pub fn random() -> Self {
        let mut rng = fastrand::Rng::new();
        Self::from_rng(&mut rng)
    }

    pub fn from_rng(rng: &mut fastrand::Rng) -> Self {
        let mut base = [0u8; 256];
        for (i, v) in base.iter_mut().enumerate() {
            *v = i as u8;
        }
        // Fisher-Yates.
        for i in (1..256usize).rev() {
            let j = rng.usize(..=i);
            base.swap(i, j);
        }
        let mut perm = [0u8; 512];
        perm[..256].copy_from_slice(&base);
        perm[256..].copy_from_slice(&base);
        Self { perm }
    }

    pub fn permutation(&self) -> &[u8; 512] {
        &self.perm
    }

    /// Samples the field at `(x, y)`. Always in `[0, 1]` for finite input.
    pub fn noise(&self, x: f32, y: f32) -> f32 {
        let fx = x.floor();
        let fy = y.floor();
        let xi = lattice(fx);
        let yi = lattice(fy);
        let x = x - fx;
        let y = y - fy;
        let u = fade(x);
        let v = fade(y);

        let p = &self.perm;
        let aa = p[xi + p[yi] as usize];
        let ab = p[xi + p[yi + 1] as usize];
        let ba = p[xi + 1 + p[yi] as usize];
        let bb = p[xi + 1 + p[yi + 1] as usize];

        let n0 = grad(aa, x, y);
        let n1 = grad(ba, x - 1.0, y);
        let n2 = grad(ab, x, y - 1.0);
        let n3 = grad(bb, x - 1.0, y - 1.0);

        let ix0 = lerp(n0, n1, u);
        let ix1 = lerp(n2, n3, u);
        ((lerp(ix0, ix1, v) + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

/// Fractal Brownian motion over one or two noise fields.
#[derive(Clone)]
pub struct Fractal {
    primary: NoiseField,
    secondary: Option<NoiseField>,
    blend: f32,
    amplitude0: f32,
}

impl Fractal {
    pub fn new(primary: NoiseField) -> Self {
        Self {
            primary,
            secondary: None,
            blend: 0.0,
            amplitude0: 0.5,
        }
    }

    pub fn with_secondary(primary: NoiseField, secondary: NoiseField, blend: f32) -> Self {
        Self {
            primary,
            secondary: Some(secondary),
            blend: blend.clamp(0.0, 1.0),
            amplitude0: 0.5,
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_secondary(
            NoiseField::new(seed),
            NoiseField::new(seed.rotate_left(29) ^ 0x9E37_79B9_7F4A_7C15),
            0.35,
        )
    }

    pub fn noise(&self, x: f32, y: f32) -> f32 {
        let a = self.primary.noise(x, y);
        match &self.secondary {
            Some(second) if self.blend > 0.0 => {
                let b = second.noise(x + SECONDARY_OFFSET.0, y + SECONDARY_OFFSET.1);
                lerp(a, b, self.blend)
            }
            _ => a,
        }
    }

    /// Octave `k` contributes `amplitude0 * 0.5^k` at frequency `2^k`.
    pub fn fbm(&self, x: f32, y: f32, octaves: u32) -> f32 {
        let mut sum = 0.0f32;
        let mut amp = self.amplitude0;
        let mut freq = 1.0f32;
        for _ in 0..octaves {
            sum += amp * self.noise(x * freq, y * freq);
            amp *= 0.5;
            freq *= 2.0;
        }
        sum
    }

    pub fn amplitude_sum(&self, octaves: u32) -> f32 {
        let mut sum = 0.0f32;
        let mut amp = self.amplitude0;
        for _ in 0..octaves {
            sum += amp;
            amp *= 0.5;
        }
        sum
    }

    /// `fbm` rescaled by its amplitude sum; clamped to `[0, 1]`.
    pub fn fbm_normalized(&self, x: f32, y: f32, octaves: u32) -> f32 {
        let total = self.amplitude_sum(octaves);
        if total <= 0.0 {
            return 0.0;
        }
        (self.fbm(x, y, octaves) / total).clamp(0.0, 1.0)
    }
}

#[inline]
fn lattice(floored: f32) -> usize {
    // `as i64` saturates for huge magnitudes; the mask keeps the index in range.
    ((floored as i64) & 255) as usize
}

#[inline]
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn grad(hash: u8, x: f32, y: f32) -> f32 {
    let gx = if hash & 1 == 1 { -x } else { x };
    let gy = if hash & 2 == 2 { -y } else { y };
    gx + gy
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutation_is_a_duplicated_shuffle() {
        let field = NoiseField::new(7);
        let perm = field.permutation();
        let mut seen = [false; 256];
        for &v in &perm[..256] {
            assert!(!seen[v as usize], "value {v} repeated");
            seen[v as usize] = true;
        }
        assert_eq!(&perm[..256], &perm[256..]);
    }

    #[test]
    fn lattice_points_sit_at_midpoint() {
        // Every corner contribution vanishes on integer coordinates.
        let field = NoiseField::new(3);
        for i in -4..4 {
            let v = field.noise(i as f32, (i * 3) as f32);
            assert!((v - 0.5).abs() < 1e-6, "got {v} at lattice {i}");
        }
    }

    #[test]
    fn continuous_across_cell_edges() {
        let field = NoiseField::new(11);
        for i in 0..16 {
            let edge = i as f32 + 1.0;
            let left = field.noise(edge - 1e-4, 0.37);
            let right = field.noise(edge + 1e-4, 0.37);
            assert!((left - right).abs() < 1e-2, "jump at {edge}: {left} vs {right}");
        }
    }

    #[test]
    fn fbm_without_octaves_is_zero() {
        let f = Fractal::new(NoiseField::new(1));
        assert_eq!(f.fbm(0.3, 0.4, 0), 0.0);
        assert_eq!(f.fbm_normalized(0.3, 0.4, 0), 0.0);
    }

    #[test]
    fn amplitude_sum_halves_each_octave() {
        let f = Fractal::new(NoiseField::new(1));
        assert!((f.amplitude_sum(1) - 0.5).abs() < 1e-6);
        assert!((f.amplitude_sum(4) - 0.9375).abs() < 1e-6);
    }
}
