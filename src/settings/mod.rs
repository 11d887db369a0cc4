//! Persisted settings: the record every page and popup share.
//!
//! Stored keys keep the extension's names (`petEnabled`, `soundEnabled`, ...) so a record
//! written by one component reads back identically in another.

pub mod file;

use std::cell::{Cell, RefCell};
use std::sync::mpsc::{self, Receiver, Sender};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

pub use file::JsonFileStore;

/// Smallest pet scale, in percent.
pub const SIZE_MIN: u32 = 25;
/// Largest pet scale, in percent.
pub const SIZE_MAX: u32 = 300;
pub const SPEED_MIN: u32 = 1;
pub const SPEED_MAX: u32 = 10;
/// Default top-left corner of the pet, viewport pixels.
pub const DEFAULT_POSITION: Position = Position { x: 100.0, y: 100.0 };

/// Pet position in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl From<Vec2> for Position {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Position> for Vec2 {
    fn from(p: Position) -> Self {
        Vec2::new(p.x, p.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "petEnabled")]
    pub enabled: bool,
    /// Scale in percent.
    pub size: u32,
    pub speed: u32,
    /// Ambient cycle period in seconds.
    pub interval: u32,
    #[serde(rename = "soundEnabled")]
    pub sound_enabled: bool,
    pub position: Position,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: false,
            size: 100,
            speed: 5,
            interval: 10,
            sound_enabled: true,
            position: DEFAULT_POSITION,
        }
    }
}

impl Settings {
    /// Visual scale factor. Always positive.
    pub fn scale(&self) -> f32 {
        clamp_size(self.size as i64) as f32 / 100.0
    }

    /// Ambient cycle period in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.interval.max(1) as u64 * 1000
    }
}

pub fn clamp_size(value: i64) -> u32 {
    value.clamp(SIZE_MIN as i64, SIZE_MAX as i64) as u32
}

pub fn clamp_speed(value: i64) -> u32 {
    value.clamp(SPEED_MIN as i64, SPEED_MAX as i64) as u32
}

/// Milliseconds to whole seconds, rounded, never below one.
pub fn interval_secs_from_ms(ms: u64) -> u32 {
    ((ms + 500) / 1000).clamp(1, u32::MAX as u64) as u32
}

// ---------------------------------------------------------------------------
// Partial writes + change notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Enabled,
    Size,
    Speed,
    Interval,
    SoundEnabled,
    Position,
}

impl SettingKey {
    /// Name of the key in the stored record.
    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::Enabled => "petEnabled",
            SettingKey::Size => "size",
            SettingKey::Speed => "speed",
            SettingKey::Interval => "interval",
            SettingKey::SoundEnabled => "soundEnabled",
            SettingKey::Position => "position",
        }
    }
}

/// A partial record for `SettingsStore::set`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(rename = "petEnabled", skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(rename = "soundEnabled", skip_serializing_if = "Option::is_none")]
    pub sound_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl SettingsPatch {
    pub fn enabled(v: bool) -> Self {
        Self { enabled: Some(v), ..Self::default() }
    }

    pub fn size(v: u32) -> Self {
        Self { size: Some(v), ..Self::default() }
    }

    pub fn speed(v: u32) -> Self {
        Self { speed: Some(v), ..Self::default() }
    }

    pub fn interval(v: u32) -> Self {
        Self { interval: Some(v), ..Self::default() }
    }

    pub fn sound_enabled(v: bool) -> Self {
        Self { sound_enabled: Some(v), ..Self::default() }
    }

    pub fn position(p: Position) -> Self {
        Self { position: Some(p), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold `later` into `self`; fields set in `later` win.
    pub fn merge(&mut self, later: SettingsPatch) {
        self.enabled = later.enabled.or(self.enabled);
        self.size = later.size.or(self.size);
        self.speed = later.speed.or(self.speed);
        self.interval = later.interval.or(self.interval);
        self.sound_enabled = later.sound_enabled.or(self.sound_enabled);
        self.position = later.position.or(self.position);
    }

    pub fn apply(&self, s: &mut Settings) {
        if let Some(v) = self.enabled {
            s.enabled = v;
        }
        if let Some(v) = self.size {
            s.size = v;
        }
        if let Some(v) = self.speed {
            s.speed = v;
        }
        if let Some(v) = self.interval {
            s.interval = v;
        }
        if let Some(v) = self.sound_enabled {
            s.sound_enabled = v;
        }
        if let Some(v) = self.position {
            s.position = v;
        }
    }

    /// Changes this patch would make to `old`. Keys whose value is unchanged are skipped.
    pub fn diff(&self, old: &Settings) -> Vec<SettingChange> {
        let mut out = Vec::new();
        if let Some(v) = self.enabled {
            push_change(&mut out, SettingKey::Enabled, old.enabled.into(), v.into());
        }
        if let Some(v) = self.size {
            push_change(&mut out, SettingKey::Size, old.size.into(), v.into());
        }
        if let Some(v) = self.speed {
            push_change(&mut out, SettingKey::Speed, old.speed.into(), v.into());
        }
        if let Some(v) = self.interval {
            push_change(&mut out, SettingKey::Interval, old.interval.into(), v.into());
        }
        if let Some(v) = self.sound_enabled {
            push_change(
                &mut out,
                SettingKey::SoundEnabled,
                old.sound_enabled.into(),
                v.into(),
            );
        }
        if let Some(v) = self.position {
            push_change(
                &mut out,
                SettingKey::Position,
                position_value(old.position),
                position_value(v),
            );
        }
        out
    }
}

fn position_value(p: Position) -> Value {
    serde_json::json!({ "x": p.x, "y": p.y })
}

fn push_change(out: &mut Vec<SettingChange>, key: SettingKey, old: Value, new: Value) {
    if old != new {
        out.push(SettingChange { key, old, new });
    }
}

/// One changed key, with the value before and after the write.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingChange {
    pub key: SettingKey,
    pub old: Value,
    pub new: Value,
}

// ---------------------------------------------------------------------------
// Store interface
// ---------------------------------------------------------------------------

/// Process-wide key/value settings shared by the runtime, relay and popup.
///
/// All methods take `&self`; implementations are shared behind `Rc` on the single UI thread.
pub trait SettingsStore {
    /// Full record, with defaults for absent keys.
    fn get(&self) -> Result<Settings, StoreError>;
    /// Merge a partial record and notify subscribers of the keys that changed.
    fn set(&self, patch: &SettingsPatch) -> Result<(), StoreError>;
    /// Change notifications, one batch per `set` that changed anything.
    fn subscribe(&self) -> Receiver<Vec<SettingChange>>;
}

/// Subscriber list shared by store implementations. Dropped receivers are pruned on notify.
#[derive(Default)]
pub struct Watchers {
    senders: RefCell<Vec<Sender<Vec<SettingChange>>>>,
}

impl Watchers {
    pub fn subscribe(&self) -> Receiver<Vec<SettingChange>> {
        let (tx, rx) = mpsc::channel();
        self.senders.borrow_mut().push(tx);
        rx
    }

    pub fn notify(&self, changes: Vec<SettingChange>) {
        if changes.is_empty() {
            return;
        }
        for change in &changes {
            log::debug!(
                "Setting changed: {} {} -> {}",
                change.key.as_str(),
                change.old,
                change.new
            );
        }
        self.senders
            .borrow_mut()
            .retain(|tx| tx.send(changes.clone()).is_ok());
    }
}

/// In-memory store. Used by tests and by hosts that don't persist across runs.
#[derive(Default)]
pub struct MemoryStore {
    settings: RefCell<Settings>,
    watchers: Watchers,
    failing: Cell<bool>,
    writes: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: RefCell::new(settings),
            ..Self::default()
        }
    }

    /// Make every subsequent read and write fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Current record, bypassing the failure switch.
    pub fn snapshot(&self) -> Settings {
        *self.settings.borrow()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self) -> Result<Settings, StoreError> {
        if self.failing.get() {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(*self.settings.borrow())
    }

    fn set(&self, patch: &SettingsPatch) -> Result<(), StoreError> {
        if self.failing.get() {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        let changes = {
            let mut current = self.settings.borrow_mut();
            let changes = patch.diff(&current);
            patch.apply(&mut current);
            changes
        };
        self.writes.set(self.writes.get() + 1);
        self.watchers.notify(changes);
        Ok(())
    }

    fn subscribe(&self) -> Receiver<Vec<SettingChange>> {
        self.watchers.subscribe()
    }
}
