//! Color math shared by the background layers and the intro scene.

/// Interpolates hue along the shorter arc. `t` is clamped to `[0, 1]`;
/// the result is in `[0, 360)`.
pub fn lerp_hue(a: f32, b: f32, t: f32) -> f32 {
    let d = (b - a + 540.0).rem_euclid(360.0) - 180.0;
    (a + d * t.clamp(0.0, 1.0)).rem_euclid(360.0)
}

/// `h` in degrees, `s`/`l` in `[0, 1]`. Returns linear-ish sRGB in `[0, 1]`.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    let h = h.rem_euclid(360.0) / 360.0;
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);
    if s <= 0.0 {
        return [l, l, l];
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    [
        hue_channel(p, q, h + 1.0 / 3.0),
        hue_channel(p, q, h),
        hue_channel(p, q, h - 1.0 / 3.0),
    ]
}

fn hue_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

pub fn rgb8(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xFF) as f32 / 255.0,
        ((hex >> 8) & 0xFF) as f32 / 255.0,
        (hex & 0xFF) as f32 / 255.0,
    ]
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let d = edge1 - edge0;
    if d.abs() < 1e-6 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / d).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

pub fn mix3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

/// Affine contrast around mid-gray: `(c - 0.5) * k + 0.5`.
pub fn contrast(c: [f32; 3], k: f32) -> [f32; 3] {
    [(c[0] - 0.5) * k + 0.5, (c[1] - 0.5) * k + 0.5, (c[2] - 0.5) * k + 0.5]
}

/// Lerp from the pixel's luma gray toward the color. `s = 1` is identity.
pub fn saturate(c: [f32; 3], s: f32) -> [f32; 3] {
    let l = c[0] * 0.299 + c[1] * 0.587 + c[2] * 0.114;
    mix3([l, l, l], c, s)
}

pub fn luma(c: [f32; 3]) -> f32 {
    c[0] * 0.2126 + c[1] * 0.7152 + c[2] * 0.0722
}

/// How a layer lands on the pixels below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    /// Premultiplied source-over.
    Over,
    /// Additive, saturating ("lighter").
    Add,
    Screen,
}

/// Composites one RGBA8 pixel in place. `src` is straight color, `alpha`
/// its coverage.
#[inline]
pub fn blend_pixel(dst: &mut [u8], src: [f32; 3], alpha: f32, mode: BlendMode) {
    let a = alpha.clamp(0.0, 1.0);
    if a <= 0.0 {
        return;
    }
    let s = [
        src[0].clamp(0.0, 1.0) * a,
        src[1].clamp(0.0, 1.0) * a,
        src[2].clamp(0.0, 1.0) * a,
    ];
    blend_premultiplied(dst, s, a, mode);
}

/// Composites a premultiplied source onto a straight-alpha RGBA8 pixel.
#[inline]
pub fn blend_premultiplied(dst: &mut [u8], src: [f32; 3], src_a: f32, mode: BlendMode) {
    let sa = src_a.clamp(0.0, 1.0);
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = match mode {
        BlendMode::Over | BlendMode::Screen => sa + dst_a * (1.0 - sa),
        BlendMode::Add => (dst_a + sa).min(1.0),
    };
    if out_a <= 0.0 {
        return;
    }
    for ch in 0..3 {
        let d = dst[ch] as f32 / 255.0 * dst_a;
        let s = src[ch].max(0.0);
        let premul = match mode {
            BlendMode::Over => s + d * (1.0 - sa),
            BlendMode::Add => d + s,
            BlendMode::Screen => 1.0 - (1.0 - d) * (1.0 - s.min(1.0)),
        };
        dst[ch] = ((premul / out_a).clamp(0.0, 1.0) * 255.0) as u8;
    }
    dst[3] = (out_a.clamp(0.0, 1.0) * 255.0) as u8;
}
