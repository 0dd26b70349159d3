use std::cell::RefCell;
use std::rc::Rc;

use nordic_aurora::error::{AudioError, StorageError};
use nordic_aurora::intro::{IntroConfig, IntroPhase, IntroRecord, IntroSequencer, DEFAULT_STORAGE_KEY};
use nordic_aurora::sound::{AudioBackend, AudioPhase, SoundConfig, SoundController};
use nordic_aurora::storage::{KeyValueStore, MemoryStore, SOUND_CONSENT_KEY};

const DAY_MS: i64 = 86_400_000;
const NOW: i64 = 1_700_000_000_000;

struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }
}

fn record(t: i64, ttl: i64) -> String {
    serde_json::to_string(&IntroRecord { t, ttl: Some(ttl) }).expect("encode record")
}

fn stored_record(store: &dyn KeyValueStore) -> IntroRecord {
    let raw = store
        .get(DEFAULT_STORAGE_KEY)
        .expect("read store")
        .expect("record written");
    serde_json::from_str(&raw).expect("decode record")
}

#[test]
fn first_visit_shows_intro() {
    let seq = IntroSequencer::resolve(IntroConfig::default(), &MemoryStore::new(), NOW);
    assert_eq!(seq.phase(), IntroPhase::Showing);
    assert_eq!(seq.deadline_ms(), Some(NOW + 5200));
}

#[test]
fn expired_record_shows_intro() {
    let store = MemoryStore::with_entry(DEFAULT_STORAGE_KEY, &record(NOW - DAY_MS - 1, DAY_MS));
    let seq = IntroSequencer::resolve(IntroConfig::default(), &store, NOW);
    assert!(seq.is_showing());
}

#[test]
fn fresh_record_hides_intro() {
    let store = MemoryStore::with_entry(DEFAULT_STORAGE_KEY, &record(NOW - DAY_MS + 1000, DAY_MS));
    let seq = IntroSequencer::resolve(IntroConfig::default(), &store, NOW);
    assert_eq!(seq.phase(), IntroPhase::Hidden);
    assert_eq!(seq.deadline_ms(), None);
}

#[test]
fn day_old_record_at_longer_gap_shows_intro() {
    let t = 1_000_000;
    let store = MemoryStore::with_entry("intro:nordic:v5", &format!(r#"{{"t":{t},"ttl":86400000}}"#));
    let seq = IntroSequencer::resolve(IntroConfig::default(), &store, t + 90_000_000);
    assert!(seq.is_showing());
}

#[test]
fn force_overrides_a_fresh_record() {
    let store = MemoryStore::with_entry(DEFAULT_STORAGE_KEY, &record(NOW, DAY_MS));
    let cfg = IntroConfig {
        force: true,
        ..IntroConfig::default()
    };
    assert!(IntroSequencer::resolve(cfg, &store, NOW).is_showing());
}

#[test]
fn unreadable_state_shows_intro() {
    assert!(IntroSequencer::resolve(IntroConfig::default(), &FailingStore, NOW).is_showing());
    let garbage = MemoryStore::with_entry(DEFAULT_STORAGE_KEY, "{not json");
    assert!(IntroSequencer::resolve(IntroConfig::default(), &garbage, NOW).is_showing());
}

#[test]
fn skip_persists_now_and_ttl() {
    let store = MemoryStore::new();
    let mut seq = IntroSequencer::resolve(IntroConfig::default(), &store, NOW);
    seq.skip(NOW + 1234, &store);
    assert_eq!(seq.phase(), IntroPhase::Finished);
    assert_eq!(stored_record(&store), IntroRecord { t: NOW + 1234, ttl: Some(DAY_MS) });

    let next = IntroSequencer::resolve(IntroConfig::default(), &store, NOW + 2000);
    assert_eq!(next.phase(), IntroPhase::Hidden);
}

#[test]
fn dismissal_persists_from_hidden_and_finished() {
    let store = MemoryStore::with_entry(DEFAULT_STORAGE_KEY, &record(NOW - 1000, DAY_MS));
    let mut seq = IntroSequencer::resolve(IntroConfig::default(), &store, NOW);
    assert_eq!(seq.phase(), IntroPhase::Hidden);

    seq.finish(NOW + 10, &store);
    assert_eq!(seq.phase(), IntroPhase::Finished);
    assert_eq!(stored_record(&store), IntroRecord { t: NOW + 10, ttl: Some(DAY_MS) });

    seq.skip(NOW + 20, &store);
    assert_eq!(seq.phase(), IntroPhase::Finished);
    assert_eq!(stored_record(&store).t, NOW + 20);

    seq.finish(NOW + 30, &store);
    assert_eq!(stored_record(&store), IntroRecord { t: NOW + 30, ttl: Some(DAY_MS) });
}

#[test]
fn skip_survives_failing_storage() {
    let mut seq = IntroSequencer::resolve(IntroConfig::default(), &FailingStore, NOW);
    seq.skip(NOW + 10, &FailingStore);
    assert_eq!(seq.phase(), IntroPhase::Finished);
}

#[test]
fn custom_ttl_is_written() {
    let store = MemoryStore::new();
    let cfg = IntroConfig {
        ttl_hours: 1.5,
        storage_key: "intro:nordic:v6".into(),
        ..IntroConfig::default()
    };
    let mut seq = IntroSequencer::resolve(cfg, &store, NOW);
    assert_eq!(seq.tick(NOW + 5200, &store), IntroPhase::Finished);
    let raw = store.get("intro:nordic:v6").expect("get").expect("written");
    assert_eq!(raw, record(NOW + 5200, 5_400_000));
    assert_eq!(store.get(DEFAULT_STORAGE_KEY).expect("get"), None);
}

#[test]
fn replay_restarts_the_timer() {
    let store = MemoryStore::with_entry(DEFAULT_STORAGE_KEY, &record(NOW, DAY_MS));
    let mut seq = IntroSequencer::resolve(IntroConfig::default(), &store, NOW);
    assert!(!seq.is_showing());
    seq.replay(NOW + 50);
    assert!(seq.is_showing());
    assert_eq!(seq.elapsed_ms(NOW + 150), 100);
    assert_eq!(seq.deadline_ms(), Some(NOW + 50 + 5200));
}

#[derive(Default)]
struct Calls {
    starts: usize,
    pauses: usize,
    accents: usize,
    volume: f32,
}

struct FakeOutput {
    refuse: usize,
    calls: Rc<RefCell<Calls>>,
}

impl AudioBackend for FakeOutput {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn start(&mut self) -> Result<(), AudioError> {
        let mut c = self.calls.borrow_mut();
        c.starts += 1;
        if self.refuse > 0 {
            self.refuse -= 1;
            return Err(AudioError::Blocked("autoplay refused".into()));
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.calls.borrow_mut().pauses += 1;
    }

    fn set_volume(&mut self, volume: f32) {
        self.calls.borrow_mut().volume = volume;
    }

    fn play_accent(&mut self, _volume: f32) -> Result<(), AudioError> {
        self.calls.borrow_mut().accents += 1;
        Ok(())
    }
}

fn sound(refuse: usize, consented: bool) -> (SoundController, Rc<RefCell<Calls>>) {
    let calls = Rc::new(RefCell::new(Calls::default()));
    let backend = FakeOutput {
        refuse,
        calls: Rc::clone(&calls),
    };
    (SoundController::new(Box::new(backend), SoundConfig::default(), consented), calls)
}

#[test]
fn blocked_audio_retries_once_on_gesture() {
    let (mut s, calls) = sound(1, true);
    s.begin_intro(0);
    assert_eq!(s.phase(), AudioPhase::Blocked);
    assert!(s.unlock_armed());

    s.on_user_gesture(10);
    assert_eq!(s.phase(), AudioPhase::Playing);
    assert!(!s.unlock_armed());

    s.on_user_gesture(20);
    assert_eq!(calls.borrow().starts, 2);
}

#[test]
fn second_refusal_stays_blocked() {
    let (mut s, calls) = sound(5, true);
    s.begin_intro(0);
    s.on_user_gesture(10);
    s.on_user_gesture(20);
    s.on_user_gesture(30);
    assert_eq!(s.phase(), AudioPhase::Blocked);
    assert_eq!(calls.borrow().starts, 2);
}

#[test]
fn intro_accent_plays_after_delay() {
    let (mut s, calls) = sound(0, false);
    s.begin_intro(1000);
    s.update(1000 + 1199);
    assert_eq!(calls.borrow().accents, 0);
    s.update(1000 + 1200);
    s.update(1000 + 5000);
    assert_eq!(calls.borrow().accents, 1);
}

#[test]
fn enable_and_disable_persist_consent() {
    let store = MemoryStore::new();
    let (mut s, calls) = sound(0, false);
    s.enable(0, &store);
    assert_eq!(s.phase(), AudioPhase::Playing);
    assert_eq!(store.get(SOUND_CONSENT_KEY).expect("get").as_deref(), Some("1"));

    s.update(800);
    assert!((calls.borrow().volume - 0.35).abs() < 1e-4);

    s.disable(1000, &store);
    assert_eq!(store.get(SOUND_CONSENT_KEY).expect("get").as_deref(), Some("0"));
    s.update(1400);
    assert!(calls.borrow().volume.abs() < 1e-4);
    assert_eq!(calls.borrow().pauses, 0);
    s.update(1420);
    assert_eq!(calls.borrow().pauses, 1);
}

#[test]
fn remembered_consent_starts_on_first_gesture() {
    let store = MemoryStore::with_entry(SOUND_CONSENT_KEY, "1");
    let calls = Rc::new(RefCell::new(Calls::default()));
    let backend = FakeOutput {
        refuse: 0,
        calls: Rc::clone(&calls),
    };
    let mut s = SoundController::from_store(Box::new(backend), SoundConfig::default(), &store);
    assert!(s.consented());
    assert_eq!(s.phase(), AudioPhase::Idle);
    s.on_user_gesture(5);
    assert_eq!(s.phase(), AudioPhase::Playing);
}
