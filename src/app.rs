use crate::audio::{load_wav, AmbientSource, CpalOutput};
use crate::config::Config;
use crate::driver::{AnimationDriver, FrameControl, FrameLoop, Scheduler};
use crate::intro::{IntroScene, IntroSequencer};
use crate::render::{resample_to_cells, Frame, HalfBlockRenderer, Renderer, TitleOverlay};
use crate::sound::{AudioPhase, SoundController};
use crate::storage::{self, FileStore, KeyValueStore, MemoryStore};
use crate::terminal::TerminalGuard;
use crate::visual::{LayerRenderer, Preset, Theme, Viewport};
use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseEventKind};
use std::io::{BufWriter, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since the Unix epoch, the unit of persisted intro records.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// File-backed preferences, or memory when there is nowhere to write.
pub fn open_store(cfg: &Config) -> Box<dyn KeyValueStore> {
    if cfg.no_prefs {
        return Box::new(MemoryStore::new());
    }
    let Some(path) = cfg.prefs.clone().or_else(storage::prefs_storage_path) else {
        tracing::warn!("no config directory, preferences kept in memory");
        return Box::new(MemoryStore::new());
    };
    match FileStore::open(path.clone()) {
        Ok(store) => Box::new(store),
        Err(err) => {
            tracing::warn!(%err, path = %path.display(), "preferences unreadable, starting fresh");
            Box::new(FileStore::fresh(path))
        }
    }
}

fn ambient_source(cfg: &Config, seed: u64) -> AmbientSource {
    if let Some(path) = &cfg.ambient_wav {
        match load_wav(path) {
            Ok(clip) => return AmbientSource::Clip(Arc::new(clip)),
            Err(err) => {
                tracing::warn!(%err, path = %path.display(), "ambient clip unusable, using wind")
            }
        }
    }
    AmbientSource::Wind { seed }
}

/// Background viewport for a terminal: one logical px per cell column and two
/// per row, above the HUD.
pub fn viewport_for(size: (u16, u16), hud_rows: u16, dpr: f32) -> Viewport {
    let visual_rows = size.1.saturating_sub(hud_rows).max(1);
    Viewport::new(size.0 as u32, visual_rows as u32 * 2, dpr)
}

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let store = open_store(&cfg);
    let theme = cfg
        .theme
        .map(Theme::from)
        .or_else(|| storage::load_theme(&*store))
        .unwrap_or(Theme::Dark);
    let aurora = cfg
        .aurora_config(theme)
        .map_err(|e| anyhow::anyhow!("invalid --safe-band: {e}"))?;
    let seed = cfg.seed.unwrap_or_else(|| fastrand::u64(..));

    let start_ms = now_ms();
    let mut intro = IntroSequencer::resolve(cfg.intro_config(theme), &*store, start_ms);
    if cfg.skip_intro && intro.is_showing() {
        intro.skip(start_ms, &*store);
    }

    let backend = CpalOutput::new(ambient_source(&cfg, seed));
    let mut sound = SoundController::from_store(Box::new(backend), cfg.sound_config(), &*store);
    if intro.is_showing() && intro.config().allow_sound {
        sound.begin_intro(start_ms);
    }

    let _term = TerminalGuard::new()?;
    let out = BufWriter::new(TerminalGuard::stdout());

    let size = crossterm::terminal::size().context("get terminal size")?;
    if size.1 < 2 || size.0 < 4 {
        return Err(anyhow::anyhow!(
            "terminal too small (need at least 4x2, got {}x{})",
            size.0,
            size.1
        ));
    }

    let hud_rows = size.1.saturating_sub(1).min(2);
    let mut driver = AnimationDriver::new(LayerRenderer::new(aurora));
    driver.mount(viewport_for(size, hud_rows, cfg.dpr));
    tracing::info!(
        cols = size.0,
        rows = size.1,
        theme = theme.label(),
        preset = driver.renderer().config().preset.label(),
        intro = intro.is_showing(),
        "aurora started"
    );

    let mut app = App {
        scene: IntroScene::new(theme, cfg.reduced_motion, seed),
        seed,
        cli: cfg,
        store,
        theme,
        intro,
        sound,
        driver,
        renderer: HalfBlockRenderer::new(),
        out,
        size,
        hud_rows,
        show_hud: true,
        show_help: false,
        cells: Vec::new(),
        fps: FpsCounter::new(),
        last_frame_ms: 0.0,
    };

    let mut scheduler = FrameLoop::new(app.cli.fps);
    let mut failure = None;
    scheduler.start(&mut |dt| match app.frame(dt) {
        Ok(control) => control,
        Err(err) => {
            failure = Some(err);
            FrameControl::Stop
        }
    });
    app.shutdown();

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct App {
    cli: Config,
    store: Box<dyn KeyValueStore>,
    theme: Theme,
    seed: u64,
    intro: IntroSequencer,
    scene: IntroScene,
    sound: SoundController,
    driver: AnimationDriver,
    renderer: HalfBlockRenderer,
    out: BufWriter<Stdout>,
    size: (u16, u16),
    hud_rows: u16,
    show_hud: bool,
    show_help: bool,
    cells: Vec<u8>,
    fps: FpsCounter,
    last_frame_ms: f32,
}

impl App {
    fn frame(&mut self, dt: f32) -> anyhow::Result<FrameControl> {
        let started = Instant::now();
        let now = now_ms();

        // Drain input events (non-blocking).
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind != KeyEventKind::Release => {
                    if self.handle_key(k.code, k.modifiers, now)? {
                        return Ok(FrameControl::Stop);
                    }
                    if key_unlocks_audio(k.code) {
                        self.sound.on_user_gesture(now);
                    }
                }
                Event::Mouse(m) if matches!(m.kind, MouseEventKind::Down(_)) => {
                    self.sound.on_user_gesture(now);
                }
                Event::FocusLost => self.sound.set_focus(false),
                Event::FocusGained => self.sound.set_focus(true),
                Event::Resize(c, r) => self.resize((c, r)),
                _ => {}
            }
        }

        // Size check once per frame (resize events can be missed in some terminals).
        let sz = crossterm::terminal::size()?;
        if sz != self.size {
            self.resize(sz);
        }

        let was_showing = self.intro.is_showing();
        self.intro.tick(now, &*self.store);
        if was_showing && !self.intro.is_showing() {
            tracing::info!("intro finished");
        }
        self.sound.update(now);

        let (cols, rows) = self.size;
        let hud = if self.show_hud {
            self.hud_text(cols as usize)
        } else {
            String::new()
        };
        let target_hud_rows = hud_rows_for_text(rows, self.show_hud, &hud);
        if target_hud_rows != self.hud_rows {
            self.hud_rows = target_hud_rows;
            self.driver.resize(self.viewport());
        }
        let visual_rows = rows.saturating_sub(self.hud_rows).max(1);
        let w = cols as usize;
        let h = visual_rows as usize * 2;

        match self.driver.tick(dt) {
            Some(surface) => resample_to_cells(
                surface.pixels(),
                surface.width(),
                surface.height(),
                w,
                h,
                &mut self.cells,
            ),
            None => {
                self.cells.clear();
                self.cells.resize(w * h * 4, 0);
            }
        }

        let mut title_text = String::new();
        let mut title_row = 0u16;
        let mut title_opacity = 0.0f32;
        if self.intro.is_showing() {
            let secs = self.intro.elapsed_ms(now) as f32 / 1000.0;
            self.scene.render(&mut self.cells, w, h, 1.0, secs);
            let reveal = self.scene.name_reveal(secs);
            title_text = reveal.spaced(&self.intro.config().name);
            // Half a row per 4 logical px of drop.
            let drop = (reveal.offset_y / 8.0).round() as u16;
            title_row = (visual_rows / 3 + drop).min(visual_rows.saturating_sub(1));
            title_opacity = reveal.opacity;
        }
        let title = (!title_text.is_empty()).then(|| TitleOverlay {
            text: &title_text,
            row: title_row,
            rgb: title_rgb(self.theme),
            opacity: title_opacity,
        });

        let frame = Frame {
            term_cols: cols,
            term_rows: rows,
            visual_rows,
            pixel_width: w,
            pixel_height: h,
            pixels_rgba: &self.cells,
            hud: &hud,
            hud_rows: self.hud_rows,
            title,
            overlay: self.show_help.then(help_popup_text),
            sync_updates: self.cli.sync_updates,
        };
        self.renderer.render(&frame, &mut self.out)?;

        self.fps.tick();
        self.last_frame_ms = started.elapsed().as_secs_f32() * 1000.0;
        Ok(FrameControl::Continue)
    }

    /// Returns `true` to quit.
    fn handle_key(&mut self, code: KeyCode, mods: KeyModifiers, now: i64) -> anyhow::Result<bool> {
        if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
            return Ok(true);
        }

        if self.intro.is_showing()
            && matches!(code, KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Esc)
        {
            self.intro.skip(now, &*self.store);
            return Ok(false);
        }

        match code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(true),
            KeyCode::Char('s') | KeyCode::Char('S') => {
                if self.sound.consented() {
                    self.sound.disable(now, &*self.store);
                } else {
                    self.sound.enable(now, &*self.store);
                }
            }
            KeyCode::Char('m') | KeyCode::Char('M') => self.sound.toggle_mute(now),
            KeyCode::Char('t') | KeyCode::Char('T') => {
                self.theme = self.theme.toggled();
                storage::save_theme(&*self.store, self.theme);
                self.scene = IntroScene::new(self.theme, self.cli.reduced_motion, self.seed);
                self.apply_aurora()?;
            }
            KeyCode::Char('p') | KeyCode::Char('P') | KeyCode::Right => {
                let current = self.driver.renderer().config().preset;
                self.cli.preset = current.next().into();
                self.apply_aurora()?;
            }
            KeyCode::Left => {
                let current = self.driver.renderer().config().preset;
                self.cli.preset = previous_preset(current).into();
                self.apply_aurora()?;
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.intro.replay(now);
                if self.intro.config().allow_sound {
                    self.sound.begin_intro(now);
                }
            }
            KeyCode::Char('i') | KeyCode::Char('I') => self.show_hud = !self.show_hud,
            KeyCode::Char('?')
            | KeyCode::Char('/')
            | KeyCode::Char('h')
            | KeyCode::Char('H')
            | KeyCode::F(1)
            | KeyCode::Tab => self.show_help = !self.show_help,
            _ => {}
        }
        Ok(false)
    }

    fn apply_aurora(&mut self) -> anyhow::Result<()> {
        let aurora = self
            .cli
            .aurora_config(self.theme)
            .map_err(|e| anyhow::anyhow!("invalid aurora settings: {e}"))?;
        tracing::debug!(theme = self.theme.label(), preset = aurora.preset.label(), "aurora settings changed");
        self.driver.set_config(aurora);
        Ok(())
    }

    fn viewport(&self) -> Viewport {
        viewport_for(self.size, self.hud_rows, self.cli.dpr)
    }

    fn resize(&mut self, size: (u16, u16)) {
        self.size = size;
        self.driver.resize(self.viewport());
        tracing::debug!(cols = size.0, rows = size.1, "terminal resized");
    }

    fn hud_text(&self, cols: usize) -> String {
        let cfg = self.driver.renderer().config();
        let status = format!(
            "Preset: {} | Theme: {} | Sound: {} | FPS: {:>4.1} | ms: {:>4.1}",
            cfg.preset.label(),
            self.theme.label(),
            sound_label(self.sound.phase(), self.sound.consented()),
            self.fps.fps(),
            self.last_frame_ms,
        );
        let keys = if self.intro.is_showing() {
            "space/enter/esc skip intro".to_string()
        } else {
            "Keys: p preset | t theme | s sound | m mute | r intro | i HUD | ? help | q quit".to_string()
        };
        wrap_hud_lines(cols, &[status, keys]).join("\n")
    }

    fn shutdown(&mut self) {
        self.sound.shutdown();
        self.driver.stop();
    }
}

/// The sound toggle settles audio itself; any other key also counts as the
/// gesture that unlocks blocked playback.
fn key_unlocks_audio(code: KeyCode) -> bool {
    !matches!(code, KeyCode::Char('s') | KeyCode::Char('S'))
}

fn previous_preset(p: Preset) -> Preset {
    let all = Preset::all();
    let i = all.iter().position(|x| *x == p).unwrap_or(0);
    all[(i + all.len() - 1) % all.len()]
}

fn title_rgb(theme: Theme) -> (u8, u8, u8) {
    match theme {
        Theme::Dark => (0xe8, 0xf1, 0xff),
        Theme::Light => (0x0b, 0x1a, 0x38),
    }
}

fn sound_label(phase: AudioPhase, consented: bool) -> &'static str {
    match phase {
        AudioPhase::Playing => "on",
        AudioPhase::Muted => "muted",
        AudioPhase::Blocked => "blocked (press a key)",
        AudioPhase::Idle if consented => "armed",
        AudioPhase::Idle => "off",
    }
}

fn hud_rows_for_text(term_rows: u16, show_hud: bool, hud: &str) -> u16 {
    if !show_hud {
        return 0;
    }
    let max_rows = term_rows.saturating_sub(1);
    let wanted = hud.lines().count() as u16;
    wanted.min(max_rows)
}

fn wrap_hud_lines(cols: usize, lines: &[String]) -> Vec<String> {
    let width = cols.max(1);
    let mut out = Vec::new();
    for line in lines {
        out.extend(hard_wrap_line(line, width));
    }
    out
}

fn hard_wrap_line(line: &str, width: usize) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }
    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(width.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn help_popup_text() -> &'static str {
    "Nordic Aurora Hotkeys\n\
p / right  next preset (minimal, vivid, shader)\n\
left  previous preset\n\
t  toggle dark/light theme (remembered)\n\
s  sound on/off (remembered)\n\
m  mute/unmute with a fade\n\
r  replay the forest intro\n\
space / enter / esc  skip the intro while it plays\n\
i  show/hide HUD\n\
? or / or h or F1 or tab  toggle this help\n\
q or esc  quit"
}

struct FpsCounter {
    last: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            last: Instant::now(),
            frames: 0,
            fps: 0.0,
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        if dt >= 0.5 {
            self.fps = (self.frames as f32) / dt;
            self.frames = 0;
            self.last = now;
        }
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_spans_two_pixels_per_row() {
        let vp = viewport_for((80, 24), 2, 1.0);
        assert_eq!((vp.css_width, vp.css_height), (80, 44));
        let vp = viewport_for((10, 1), 4, 3.0);
        assert_eq!(vp.css_height, 2);
        assert_eq!(vp.dpr, 2.0);
    }

    #[test]
    fn hud_wraps_to_width() {
        let lines = wrap_hud_lines(4, &["abcdefghij".to_string(), String::new()]);
        assert_eq!(lines, vec!["abcd", "efgh", "ij", ""]);
        assert_eq!(hud_rows_for_text(3, true, &lines.join("\n")), 2);
        assert_eq!(hud_rows_for_text(30, false, "x"), 0);
    }

    struct CountingOutput(std::rc::Rc<std::cell::Cell<usize>>);

    impl crate::sound::AudioBackend for CountingOutput {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn start(&mut self) -> Result<(), crate::error::AudioError> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
        fn pause(&mut self) {}
        fn set_volume(&mut self, _volume: f32) {}
        fn play_accent(&mut self, _volume: f32) -> Result<(), crate::error::AudioError> {
            Ok(())
        }
    }

    #[test]
    fn sound_toggle_is_not_an_unlock_gesture() {
        assert!(!key_unlocks_audio(KeyCode::Char('s')));
        assert!(!key_unlocks_audio(KeyCode::Char('S')));
        assert!(key_unlocks_audio(KeyCode::Char(' ')));
        assert!(key_unlocks_audio(KeyCode::Char('m')));

        // Remembered consent, first key is the sound toggle: it turns sound
        // off without starting the stream first.
        let starts = std::rc::Rc::new(std::cell::Cell::new(0));
        let store = MemoryStore::new();
        let mut sound = SoundController::new(
            Box::new(CountingOutput(std::rc::Rc::clone(&starts))),
            crate::sound::SoundConfig::default(),
            true,
        );
        sound.disable(0, &store);
        if key_unlocks_audio(KeyCode::Char('s')) {
            sound.on_user_gesture(0);
        }
        assert_eq!(starts.get(), 0);
        assert_eq!(sound.phase(), AudioPhase::Idle);
    }

    #[test]
    fn presets_cycle_both_ways() {
        for p in Preset::all() {
            assert_eq!(previous_preset(p.next()), p);
        }
    }
}
