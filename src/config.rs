use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::intro::{IntroConfig, DEFAULT_STORAGE_KEY};
use crate::sound::SoundConfig;
use crate::visual::{AuroraConfig, Preset, SafeBand, SkyStyle, Theme};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "nordic-aurora",
    version,
    about = "Procedural aurora sky with a one-time Nordic forest intro, drawn in a true-color terminal"
)]
pub struct Config {
    /// Starting theme; defaults to the saved preference, then dark.
    #[arg(long, value_enum)]
    pub theme: Option<ThemeArg>,

    #[arg(long, value_enum, default_value_t = PresetArg::Vivid)]
    pub preset: PresetArg,

    #[arg(long, value_enum, default_value_t = LightSkyArg::Pastel)]
    pub light_sky: LightSkyArg,

    /// Draw the aurora in the light theme too.
    #[arg(long, default_value_t = false)]
    pub show_in_light: bool,

    #[arg(long)]
    pub intensity: Option<f32>,

    #[arg(long)]
    pub max_opacity: Option<f32>,

    #[arg(long)]
    pub speed: Option<f32>,

    #[arg(long)]
    pub saturation: Option<f32>,

    #[arg(long)]
    pub contrast: Option<f32>,

    #[arg(long)]
    pub bloom: Option<f32>,

    #[arg(long)]
    pub ribbons: Option<u32>,

    /// Stars per 3600 logical px². Terminal cells are coarse, so the preset
    /// density is boosted unless this is set.
    #[arg(long)]
    pub star_density: Option<f32>,

    #[arg(long, default_value_t = false)]
    pub no_stars: bool,

    /// Dimmed band as `top,bottom[,reduce]` in viewport fractions, or `off`.
    #[arg(long, default_value = "0.30,0.75,0.65")]
    pub safe_band: String,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Device pixels per terminal half-block pixel, clamped to [1, 2].
    #[arg(long, default_value_t = 1.0)]
    pub dpr: f32,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,

    #[arg(long, default_value_t = false)]
    pub force_intro: bool,

    #[arg(long, default_value_t = false, conflicts_with = "force_intro")]
    pub skip_intro: bool,

    #[arg(long, default_value_t = false)]
    pub reduced_motion: bool,

    #[arg(long, default_value_t = 24.0)]
    pub intro_ttl_hours: f64,

    #[arg(long, default_value_t = 5200)]
    pub intro_duration_ms: u64,

    #[arg(long, default_value = DEFAULT_STORAGE_KEY)]
    pub intro_key: String,

    #[arg(long, default_value = "Nordic Aurora")]
    pub name: String,

    /// Enable ambient sound for the intro.
    #[arg(long, default_value_t = false)]
    pub sound: bool,

    /// 16-bit PCM WAV looped as ambience instead of the synthesized wind.
    #[arg(long)]
    pub ambient_wav: Option<PathBuf>,

    #[arg(long, default_value_t = 0.35)]
    pub volume: f32,

    /// Preferences file; defaults to $XDG_CONFIG_HOME/nordic_aurora/prefs.txt.
    #[arg(long)]
    pub prefs: Option<PathBuf>,

    /// Keep preferences in memory only.
    #[arg(long, default_value_t = false)]
    pub no_prefs: bool,

    /// Write tracing output here; the terminal itself is owned by the renderer.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeArg {
    Dark,
    Light,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PresetArg {
    Minimal,
    Vivid,
    #[value(alias = "curtains", alias = "gpu")]
    Shader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LightSkyArg {
    None,
    Pastel,
    White,
}

impl From<ThemeArg> for Theme {
    fn from(v: ThemeArg) -> Self {
        match v {
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Light => Theme::Light,
        }
    }
}

impl From<PresetArg> for Preset {
    fn from(v: PresetArg) -> Self {
        match v {
            PresetArg::Minimal => Preset::Minimal,
            PresetArg::Vivid => Preset::Vivid,
            PresetArg::Shader => Preset::Shader,
        }
    }
}

impl From<Preset> for PresetArg {
    fn from(v: Preset) -> Self {
        match v {
            Preset::Minimal => PresetArg::Minimal,
            Preset::Vivid => PresetArg::Vivid,
            Preset::Shader => PresetArg::Shader,
        }
    }
}

impl From<LightSkyArg> for SkyStyle {
    fn from(v: LightSkyArg) -> Self {
        match v {
            LightSkyArg::None => SkyStyle::None,
            LightSkyArg::Pastel => SkyStyle::Pastel,
            LightSkyArg::White => SkyStyle::White,
        }
    }
}

/// Star density multiplier applied to presets when drawing into terminal cells.
pub const TERMINAL_STAR_BOOST: f32 = 40.0;

/// Parses `top,bottom[,reduce]` or `off`/`none`.
pub fn parse_safe_band(raw: &str) -> Result<Option<SafeBand>, String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("off") || raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(format!("expected top,bottom[,reduce], got {raw:?}"));
    }
    let num = |s: &str| s.parse::<f32>().map_err(|e| format!("{s:?}: {e}"));
    let mut band = SafeBand {
        top: num(parts[0])?,
        bottom: num(parts[1])?,
        ..SafeBand::default()
    };
    if let Some(r) = parts.get(2) {
        band.reduce = num(r)?;
    }
    Ok(Some(band))
}

impl Config {
    /// Background settings for `theme`, with CLI overrides on top of the preset.
    pub fn aurora_config(&self, theme: Theme) -> Result<AuroraConfig, String> {
        let preset: Preset = self.preset.into();
        let mut cfg = AuroraConfig::preset(preset, theme);
        cfg.light_sky = self.light_sky.into();
        cfg.show_in_light |= self.show_in_light;
        cfg.stars = !self.no_stars;
        cfg.star_density = self
            .star_density
            .unwrap_or(cfg.star_density * TERMINAL_STAR_BOOST);
        // Twinkle is motion; keep stars steady when asked to.
        cfg.star_twinkle = !self.reduced_motion;
        if let Some(v) = self.intensity {
            cfg.intensity = v;
        }
        if let Some(v) = self.max_opacity {
            cfg.max_opacity = v;
        }
        if let Some(v) = self.speed {
            cfg.speed = v;
        }
        if let Some(v) = self.saturation {
            cfg.saturation = v;
        }
        if let Some(v) = self.contrast {
            cfg.contrast = v;
        }
        if let Some(v) = self.bloom {
            cfg.bloom = v;
        }
        if let Some(v) = self.ribbons {
            cfg.ribbon_count = v;
        }
        cfg.safe_band = parse_safe_band(&self.safe_band)?;
        cfg.seed = self.seed;
        Ok(cfg.validated())
    }

    pub fn intro_config(&self, theme: Theme) -> IntroConfig {
        IntroConfig {
            storage_key: self.intro_key.clone(),
            ttl_hours: self.intro_ttl_hours,
            duration_ms: self.intro_duration_ms,
            reduced_motion: self.reduced_motion,
            force: self.force_intro,
            name: self.name.clone(),
            theme,
            allow_sound: self.sound,
            ..IntroConfig::default()
        }
    }

    pub fn sound_config(&self) -> SoundConfig {
        SoundConfig {
            volume: self.volume,
            ..SoundConfig::default()
        }
        .validated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_band_forms() {
        assert_eq!(parse_safe_band("off").expect("off"), None);
        let b = parse_safe_band("0.2, 0.6").expect("two").expect("band");
        assert_eq!((b.top, b.bottom, b.reduce), (0.2, 0.6, 0.65));
        let b = parse_safe_band("0.1,0.5,0.3").expect("three").expect("band");
        assert_eq!(b.reduce, 0.3);
        assert!(parse_safe_band("0.1").is_err());
        assert!(parse_safe_band("a,b").is_err());
    }

    #[test]
    fn cli_overrides_reach_the_config() {
        let cfg = Config::parse_from(["nordic-aurora", "--preset", "minimal", "--ribbons", "3", "--safe-band", "off"]);
        let a = cfg.aurora_config(Theme::Dark).expect("config");
        assert_eq!(a.preset, Preset::Minimal);
        assert_eq!(a.ribbon_count, 3);
        assert!(a.safe_band.is_none());
        assert!((a.star_density - 0.38 * TERMINAL_STAR_BOOST).abs() < 1e-4);
    }

    #[test]
    fn intro_flags_map_through() {
        let cfg = Config::parse_from(["nordic-aurora", "--force-intro", "--reduced-motion", "--intro-key", "intro:nordic:v9"]);
        let intro = cfg.intro_config(Theme::Light);
        assert!(intro.force && intro.reduced_motion);
        assert_eq!(intro.storage_key, "intro:nordic:v9");
        assert_eq!(intro.theme, Theme::Light);
    }
}
