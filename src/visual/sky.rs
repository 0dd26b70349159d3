use super::{AuroraConfig, SkyStyle, Theme};
use crate::color::{mix3, rgb8};

/// Gradient stops `(position, rgb)` for a theme, or `None` for a transparent sky.
pub fn sky_stops(theme: Theme, light: SkyStyle) -> Option<Vec<(f32, [f32; 3])>> {
    match (theme, light) {
        (Theme::Dark, _) => Some(vec![
            (0.0, rgb8(0x07132b)),
            (0.5, rgb8(0x0b1a38)),
            (1.0, rgb8(0x12244c)),
        ]),
        (Theme::Light, SkyStyle::None) => None,
        (Theme::Light, SkyStyle::Pastel) => Some(vec![(0.0, rgb8(0xeaf4ff)), (1.0, rgb8(0xeef6ff))]),
        (Theme::Light, SkyStyle::White) => Some(vec![(0.0, [1.0; 3]), (1.0, [1.0; 3])]),
    }
}

fn sample(stops: &[(f32, [f32; 3])], t: f32) -> [f32; 3] {
    let t = t.clamp(0.0, 1.0);
    let mut prev = stops[0];
    for &stop in stops.iter().skip(1) {
        if t <= stop.0 {
            let span = (stop.0 - prev.0).max(1e-6);
            return mix3(prev.1, stop.1, (t - prev.0) / span);
        }
        prev = stop;
    }
    prev.1
}

/// Builds the RGBA8 sky for a device-sized layer. Rows are uniform so each
/// row is computed once and copied across.
pub(super) fn build_sky(cfg: &AuroraConfig, w: usize, h: usize) -> Vec<u8> {
    let mut out = vec![0u8; w * h * 4];
    let Some(stops) = sky_stops(cfg.theme, cfg.light_sky) else {
        return out;
    };
    if stops.is_empty() || w == 0 {
        return out;
    }
    let denom = (h.saturating_sub(1)).max(1) as f32;
    for (y, row) in out.chunks_exact_mut(w * 4).enumerate() {
        let c = sample(&stops, y as f32 / denom);
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
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::Preset;

    #[test]
    fn dark_sky_runs_top_to_bottom() {
        let cfg = AuroraConfig::default();
        let sky = build_sky(&cfg, 3, 5);
        assert_eq!(&sky[..4], &[0x07, 0x13, 0x2b, 255]);
        let last = (4 * 3) * 4;
        assert_eq!(&sky[last..last + 4], &[0x12, 0x24, 0x4c, 255]);
    }

    #[test]
    fn light_sky_can_be_transparent() {
        let mut cfg = AuroraConfig::preset(Preset::Vivid, Theme::Light);
        cfg.light_sky = SkyStyle::None;
        assert!(build_sky(&cfg, 4, 4).iter().all(|&b| b == 0));
    }
}
