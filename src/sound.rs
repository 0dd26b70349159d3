//! Ambient sound state machine. Playback itself goes through an
//! [`AudioBackend`]; this module only decides when to start, fade, pause and
//! retry.

use crate::error::AudioError;
use crate::storage::{self, KeyValueStore};

pub trait AudioBackend {
    fn name(&self) -> &'static str;
    /// Starts or resumes the ambient loop. Errors mean playback was refused.
    fn start(&mut self) -> Result<(), AudioError>;
    fn pause(&mut self);
    fn set_volume(&mut self, volume: f32);
    fn play_accent(&mut self, volume: f32) -> Result<(), AudioError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct SoundConfig {
    pub volume: f32,
    pub accent_volume: f32,
    pub accent_delay_ms: i64,
    pub fade_in_ms: i64,
    pub fade_out_ms: i64,
    /// Delay between starting a fade-out and pausing the stream.
    pub pause_after_ms: i64,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            volume: 0.35,
            accent_volume: 0.5,
            accent_delay_ms: 1200,
            fade_in_ms: 800,
            fade_out_ms: 400,
            pause_after_ms: 420,
        }
    }
}

impl SoundConfig {
    pub fn validated(mut self) -> Self {
        let d = Self::default();
        self.volume = if self.volume.is_finite() { self.volume.clamp(0.0, 1.0) } else { d.volume };
        self.accent_volume = if self.accent_volume.is_finite() {
            self.accent_volume.clamp(0.0, 1.0)
        } else {
            d.accent_volume
        };
        self.accent_delay_ms = self.accent_delay_ms.max(0);
        self.fade_in_ms = self.fade_in_ms.max(0);
        self.fade_out_ms = self.fade_out_ms.max(0);
        self.pause_after_ms = self.pause_after_ms.max(self.fade_out_ms);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioPhase {
    Idle,
    /// Start was refused; waiting for the one armed unlock.
    Blocked,
    Playing,
    Muted,
}

#[derive(Clone, Copy, Debug)]
struct Fade {
    from: f32,
    to: f32,
    start_ms: i64,
    duration_ms: i64,
}

impl Fade {
    fn value_at(&self, now_ms: i64) -> f32 {
        if self.duration_ms <= 0 {
            return self.to;
        }
        let t = ((now_ms - self.start_ms) as f32 / self.duration_ms as f32).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * t
    }

    fn done(&self, now_ms: i64) -> bool {
        now_ms - self.start_ms >= self.duration_ms
    }
}

pub struct SoundController {
    backend: Box<dyn AudioBackend>,
    config: SoundConfig,
    phase: AudioPhase,
    consented: bool,
    volume: f32,
    fade: Option<Fade>,
    pause_at: Option<i64>,
    accent_at: Option<i64>,
    wants_accent: bool,
    unlock_armed: bool,
    focus_paused: bool,
}

impl SoundController {
    /// With consent already on record, the first gesture of the session
    /// starts playback.
    pub fn new(backend: Box<dyn AudioBackend>, config: SoundConfig, consented: bool) -> Self {
        Self {
            backend,
            config: config.validated(),
            phase: AudioPhase::Idle,
            consented,
            volume: 0.0,
            fade: None,
            pause_at: None,
            accent_at: None,
            wants_accent: false,
            unlock_armed: consented,
            focus_paused: false,
        }
    }

    pub fn from_store(backend: Box<dyn AudioBackend>, config: SoundConfig, store: &dyn KeyValueStore) -> Self {
        Self::new(backend, config, storage::load_sound_consent(store))
    }

    pub fn phase(&self) -> AudioPhase {
        self.phase
    }

    pub fn consented(&self) -> bool {
        self.consented
    }

    pub fn unlock_armed(&self) -> bool {
        self.unlock_armed
    }

    /// Volume last pushed to the backend.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Intro appeared: start the loop and queue the accent. A muted stream
    /// holds the accent until it is unmuted.
    pub fn begin_intro(&mut self, now_ms: i64) {
        match self.phase {
            AudioPhase::Playing => {
                self.wants_accent = false;
                self.schedule_accent(now_ms);
            }
            AudioPhase::Muted => self.wants_accent = true,
            AudioPhase::Idle | AudioPhase::Blocked => {
                self.wants_accent = true;
                self.attempt(now_ms);
            }
        }
    }

    /// User turned sound on. Records consent.
    pub fn enable(&mut self, now_ms: i64, store: &dyn KeyValueStore) {
        self.set_consent(true, store);
        match self.phase {
            AudioPhase::Playing => {}
            AudioPhase::Muted => self.unmute(now_ms),
            AudioPhase::Idle | AudioPhase::Blocked => self.attempt(now_ms),
        }
    }

    /// User turned sound off. Records the withdrawn consent.
    pub fn disable(&mut self, now_ms: i64, store: &dyn KeyValueStore) {
        self.set_consent(false, store);
        self.unlock_armed = false;
        self.wants_accent = false;
        self.accent_at = None;
        match self.phase {
            AudioPhase::Playing => self.mute(now_ms),
            AudioPhase::Blocked => self.phase = AudioPhase::Idle,
            AudioPhase::Idle | AudioPhase::Muted => {}
        }
    }

    pub fn toggle_mute(&mut self, now_ms: i64) {
        match self.phase {
            AudioPhase::Playing => self.mute(now_ms),
            AudioPhase::Muted => self.unmute(now_ms),
            AudioPhase::Idle | AudioPhase::Blocked => {}
        }
    }

    /// Key or pointer input. Fires the armed unlock at most once.
    pub fn on_user_gesture(&mut self, now_ms: i64) {
        if !self.unlock_armed {
            return;
        }
        self.unlock_armed = false;
        if matches!(self.phase, AudioPhase::Idle | AudioPhase::Blocked) {
            tracing::debug!("retrying audio after user gesture");
            self.attempt(now_ms);
            // A second refusal stays blocked until the user enables sound again.
            self.unlock_armed = false;
        }
    }

    /// Pauses while the window is in the background.
    pub fn set_focus(&mut self, focused: bool) {
        if !focused {
            if self.phase == AudioPhase::Playing && !self.focus_paused {
                self.backend.pause();
                self.focus_paused = true;
            }
            return;
        }
        if self.focus_paused {
            self.focus_paused = false;
            if self.phase == AudioPhase::Playing {
                if let Err(err) = self.backend.start() {
                    tracing::warn!(%err, "audio resume after focus failed");
                    self.block();
                }
            }
        }
    }

    /// Advances fades, the pending pause and the accent timer.
    pub fn update(&mut self, now_ms: i64) {
        if let Some(fade) = self.fade {
            self.push_volume(fade.value_at(now_ms));
            if fade.done(now_ms) {
                self.fade = None;
            }
        }
        if let Some(at) = self.pause_at {
            if now_ms >= at {
                self.pause_at = None;
                self.backend.pause();
            }
        }
        if let Some(at) = self.accent_at {
            if now_ms >= at {
                self.accent_at = None;
                if self.phase == AudioPhase::Playing && !self.focus_paused {
                    if let Err(err) = self.backend.play_accent(self.config.accent_volume) {
                        tracing::debug!(%err, "accent skipped");
                    }
                }
            }
        }
    }

    /// Stops playback and drops every pending timer.
    pub fn shutdown(&mut self) {
        if matches!(self.phase, AudioPhase::Playing | AudioPhase::Muted) {
            self.backend.pause();
        }
        self.phase = AudioPhase::Idle;
        self.fade = None;
        self.pause_at = None;
        self.accent_at = None;
        self.wants_accent = false;
        self.unlock_armed = false;
    }

    fn attempt(&mut self, now_ms: i64) {
        self.push_volume(0.0);
        match self.backend.start() {
            Ok(()) => {
                self.phase = AudioPhase::Playing;
                self.fade_to(self.config.volume, self.config.fade_in_ms, now_ms);
                self.take_pending_accent(now_ms);
                tracing::info!(backend = self.backend.name(), "ambient audio playing");
            }
            Err(err) => {
                tracing::info!(%err, "ambient audio blocked until next gesture");
                self.block();
            }
        }
    }

    fn schedule_accent(&mut self, now_ms: i64) {
        self.accent_at = Some(now_ms + self.config.accent_delay_ms);
    }

    fn take_pending_accent(&mut self, now_ms: i64) {
        if self.wants_accent {
            self.wants_accent = false;
            self.schedule_accent(now_ms);
        }
    }

    fn block(&mut self) {
        self.phase = AudioPhase::Blocked;
        self.unlock_armed = true;
        self.fade = None;
    }

    fn mute(&mut self, now_ms: i64) {
        self.phase = AudioPhase::Muted;
        self.fade_to(0.0, self.config.fade_out_ms, now_ms);
        self.pause_at = Some(now_ms + self.config.pause_after_ms);
    }

    fn unmute(&mut self, now_ms: i64) {
        self.pause_at = None;
        match self.backend.start() {
            Ok(()) => {
                self.phase = AudioPhase::Playing;
                self.fade_to(self.config.volume, self.config.fade_in_ms, now_ms);
                self.take_pending_accent(now_ms);
            }
            Err(err) => {
                tracing::info!(%err, "unmute refused");
                self.block();
            }
        }
    }

    fn fade_to(&mut self, target: f32, duration_ms: i64, now_ms: i64) {
        self.fade = Some(Fade {
            from: self.volume,
            to: target,
            start_ms: now_ms,
            duration_ms,
        });
    }

    fn push_volume(&mut self, v: f32) {
        self.volume = v;
        self.backend.set_volume(v);
    }

    fn set_consent(&mut self, consented: bool, store: &dyn KeyValueStore) {
        self.consented = consented;
        storage::save_sound_consent(store, consented);
    }
}

impl Drop for SoundController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        starts: usize,
        pauses: usize,
        accents: usize,
        volumes: Vec<f32>,
    }

    struct Fake {
        log: Rc<RefCell<Log>>,
        refuse: usize,
    }

    impl AudioBackend for Fake {
        fn name(&self) -> &'static str {
            "fake"
        }
        fn start(&mut self) -> Result<(), AudioError> {
            self.log.borrow_mut().starts += 1;
            if self.refuse > 0 {
                self.refuse -= 1;
                return Err(AudioError::Blocked("no gesture yet".into()));
            }
            Ok(())
        }
        fn pause(&mut self) {
            self.log.borrow_mut().pauses += 1;
        }
        fn set_volume(&mut self, volume: f32) {
            self.log.borrow_mut().volumes.push(volume);
        }
        fn play_accent(&mut self, _volume: f32) -> Result<(), AudioError> {
            self.log.borrow_mut().accents += 1;
            Ok(())
        }
    }

    fn controller(refuse: usize) -> (SoundController, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let backend = Fake {
            log: Rc::clone(&log),
            refuse,
        };
        (SoundController::new(Box::new(backend), SoundConfig::default(), false), log)
    }

    #[test]
    fn fade_in_is_linear() {
        let (mut s, _log) = controller(0);
        s.begin_intro(0);
        s.update(400);
        assert!((s.volume() - 0.175).abs() < 1e-4);
        s.update(800);
        assert!((s.volume() - 0.35).abs() < 1e-4);
    }

    #[test]
    fn accent_fires_once_after_delay() {
        let (mut s, log) = controller(0);
        s.begin_intro(0);
        s.update(1199);
        assert_eq!(log.borrow().accents, 0);
        s.update(1200);
        s.update(5000);
        assert_eq!(log.borrow().accents, 1);
    }

    #[test]
    fn replaying_intro_while_playing_plays_accent_again() {
        let (mut s, log) = controller(0);
        s.begin_intro(0);
        s.update(2000);
        assert_eq!(log.borrow().accents, 1);
        s.begin_intro(10_000);
        s.update(11_199);
        assert_eq!(log.borrow().accents, 1);
        s.update(12_000);
        s.update(20_000);
        assert_eq!(log.borrow().accents, 2);
        assert_eq!(log.borrow().starts, 1);
    }

    #[test]
    fn muted_intro_accent_waits_for_unmute() {
        let (mut s, log) = controller(0);
        s.begin_intro(0);
        s.update(2000);
        s.toggle_mute(2000);
        s.begin_intro(3000);
        s.update(6000);
        assert_eq!(log.borrow().accents, 1);
        s.toggle_mute(7000);
        s.update(8200);
        assert_eq!(log.borrow().accents, 2);
    }

    #[test]
    fn disabled_sound_drops_queued_accent() {
        let store = crate::storage::MemoryStore::new();
        let (mut s, log) = controller(1);
        s.begin_intro(0);
        assert_eq!(s.phase(), AudioPhase::Blocked);
        s.disable(100, &store);
        s.enable(200, &store);
        assert_eq!(s.phase(), AudioPhase::Playing);
        s.update(5000);
        assert_eq!(log.borrow().accents, 0);
    }

    #[test]
    fn mute_fades_then_pauses() {
        let (mut s, log) = controller(0);
        s.begin_intro(0);
        s.update(1000);
        s.toggle_mute(1000);
        assert_eq!(s.phase(), AudioPhase::Muted);
        s.update(1200);
        assert!((s.volume() - 0.175).abs() < 1e-4);
        assert_eq!(log.borrow().pauses, 0);
        s.update(1420);
        assert_eq!(s.volume(), 0.0);
        assert_eq!(log.borrow().pauses, 1);
    }

    #[test]
    fn focus_loss_pauses_and_resumes() {
        let (mut s, log) = controller(0);
        s.begin_intro(0);
        s.set_focus(false);
        s.set_focus(false);
        assert_eq!(log.borrow().pauses, 1);
        s.set_focus(true);
        assert_eq!(log.borrow().starts, 2);
    }
}
