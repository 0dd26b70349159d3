//! One-time intro overlay: whether to show it, when it ends, and what gets
//! remembered afterwards.

pub mod scene;

use serde::{Deserialize, Serialize};

use crate::storage::KeyValueStore;
use crate::visual::Theme;

pub use scene::{IntroScene, NameReveal};

pub const DEFAULT_STORAGE_KEY: &str = "intro:nordic:v5";

#[derive(Clone, Debug, PartialEq)]
pub struct IntroConfig {
    pub storage_key: String,
    pub ttl_hours: f64,
    pub duration_ms: u64,
    pub reduced_motion_duration_ms: u64,
    pub reduced_motion: bool,
    /// Show regardless of what storage says.
    pub force: bool,
    pub name: String,
    pub theme: Theme,
    pub allow_sound: bool,
}

impl Default for IntroConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            ttl_hours: 24.0,
            duration_ms: 5200,
            reduced_motion_duration_ms: 5000,
            reduced_motion: false,
            force: false,
            name: "Nordic Aurora".to_string(),
            theme: Theme::Dark,
            allow_sound: false,
        }
    }
}

impl IntroConfig {
    pub fn ttl_ms(&self) -> i64 {
        if self.ttl_hours.is_finite() {
            (self.ttl_hours.max(0.0) * 3600.0 * 1000.0) as i64
        } else {
            0
        }
    }

    /// Auto-finish delay, shortened under reduced motion.
    pub fn effective_duration_ms(&self) -> u64 {
        if self.reduced_motion {
            self.duration_ms.min(self.reduced_motion_duration_ms)
        } else {
            self.duration_ms
        }
    }
}

/// Persisted dismissal: `t` is when it was dismissed, `ttl` how long that
/// holds, both in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroRecord {
    pub t: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

impl IntroRecord {
    pub fn is_expired(&self, now_ms: i64, fallback_ttl: i64) -> bool {
        now_ms.saturating_sub(self.t) > self.ttl.unwrap_or(fallback_ttl)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntroPhase {
    Hidden,
    Showing,
    Finished,
}

pub struct IntroSequencer {
    config: IntroConfig,
    phase: IntroPhase,
    shown_at_ms: i64,
    deadline_ms: Option<i64>,
}

impl IntroSequencer {
    /// Picks the initial phase from `force` and the persisted record. Any
    /// storage or parse failure shows the intro.
    #[tracing::instrument(skip(config, store), fields(key = %config.storage_key, force = config.force))]
    pub fn resolve(config: IntroConfig, store: &dyn KeyValueStore, now_ms: i64) -> Self {
        let show = config.force || Self::record_expired(&config, store, now_ms);
        let mut seq = Self {
            config,
            phase: IntroPhase::Hidden,
            shown_at_ms: now_ms,
            deadline_ms: None,
        };
        if show {
            seq.enter_showing(now_ms);
        }
        tracing::debug!(phase = ?seq.phase, "intro resolved");
        seq
    }

    fn record_expired(config: &IntroConfig, store: &dyn KeyValueStore, now_ms: i64) -> bool {
        let raw = match store.get(&config.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return true,
            Err(err) => {
                tracing::warn!(%err, "intro state unreadable, showing intro");
                return true;
            }
        };
        match serde_json::from_str::<IntroRecord>(&raw) {
            Ok(record) => record.is_expired(now_ms, config.ttl_ms()),
            Err(err) => {
                tracing::warn!(%err, "intro state malformed, showing intro");
                true
            }
        }
    }

    fn enter_showing(&mut self, now_ms: i64) {
        self.phase = IntroPhase::Showing;
        self.shown_at_ms = now_ms;
        self.deadline_ms = Some(now_ms.saturating_add(self.config.effective_duration_ms() as i64));
    }

    pub fn config(&self) -> &IntroConfig {
        &self.config
    }

    pub fn phase(&self) -> IntroPhase {
        self.phase
    }

    pub fn is_showing(&self) -> bool {
        self.phase == IntroPhase::Showing
    }

    pub fn deadline_ms(&self) -> Option<i64> {
        self.deadline_ms
    }

    /// Milliseconds since the overlay appeared; zero unless showing.
    pub fn elapsed_ms(&self, now_ms: i64) -> i64 {
        if self.is_showing() {
            now_ms.saturating_sub(self.shown_at_ms).max(0)
        } else {
            0
        }
    }

    /// Completes the intro once the timer has run out.
    pub fn tick(&mut self, now_ms: i64, store: &dyn KeyValueStore) -> IntroPhase {
        if let (IntroPhase::Showing, Some(deadline)) = (self.phase, self.deadline_ms) {
            if now_ms >= deadline {
                self.finish(now_ms, store);
            }
        }
        self.phase
    }

    /// User dismissal. Persists like a timed finish.
    pub fn skip(&mut self, now_ms: i64, store: &dyn KeyValueStore) {
        tracing::info!("intro skipped");
        self.finish(now_ms, store);
    }

    /// Persists `{t: now, ttl}` and ends the overlay, whatever the phase.
    pub fn finish(&mut self, now_ms: i64, store: &dyn KeyValueStore) {
        let record = IntroRecord {
            t: now_ms,
            ttl: Some(self.config.ttl_ms()),
        };
        match serde_json::to_string(&record) {
            Ok(json) => {
                if let Err(err) = store.set(&self.config.storage_key, &json) {
                    tracing::warn!(%err, "could not persist intro dismissal");
                }
            }
            Err(err) => tracing::warn!(%err, "could not encode intro dismissal"),
        }
        self.phase = IntroPhase::Finished;
        self.deadline_ms = None;
    }

    /// Shows the overlay again without consulting storage.
    pub fn replay(&mut self, now_ms: i64) {
        self.enter_showing(now_ms);
    }
}
