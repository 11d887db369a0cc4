//! Settings panel controller. Holds the control values, talks to the active page and the store.

use std::rc::Rc;
use std::sync::mpsc::Receiver;

use crate::command::{Command, Response};
use crate::error::PetError;
use crate::page::{is_restricted, PageChannel};
use crate::settings::{clamp_size, clamp_speed, SettingChange, SettingKey, SettingsPatch, SettingsStore};

/// How long a notice replaces the status line.
pub const NOTICE_MS: u64 = 2_000;
/// Small / medium / large.
pub const SIZE_PRESETS: [u32; 3] = [75, 100, 150];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub expires_at: u64,
}

/// Values shown by the panel's controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub enabled: bool,
    pub size: u32,
    pub speed: u32,
    /// Seconds.
    pub interval: u32,
    pub sound_enabled: bool,
}

pub struct Popup {
    store: Rc<dyn SettingsStore>,
    changes: Receiver<Vec<SettingChange>>,
    controls: Controls,
    notice: Option<Notice>,
    now: u64,
}

impl Popup {
    /// Open the panel for the active page (`None` when there is no active tab).
    pub fn open(
        store: Rc<dyn SettingsStore>,
        page: Option<&dyn PageChannel>,
        now: u64,
    ) -> Result<Self, PetError> {
        let changes = store.subscribe();
        let s = store.get().map_err(|e| {
            log::error!("Failed to load settings: {e}");
            e
        })?;
        let mut popup = Self {
            store,
            changes,
            controls: Controls {
                enabled: s.enabled,
                size: s.size,
                speed: s.speed,
                interval: s.interval,
                sound_enabled: s.sound_enabled,
            },
            notice: None,
            now,
        };
        if page.map_or(true, |p| is_restricted(p.url())) {
            popup.notify(
                NoticeKind::Warning,
                "Cannot run on this page. Try a regular website!",
            );
        }
        Ok(popup)
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Status line: a live notice, or the enabled state.
    pub fn status_text(&self) -> &str {
        match &self.notice {
            Some(n) => &n.message,
            None if self.controls.enabled => "Status: Active ✅",
            None => "Status: Inactive ❌",
        }
    }

    pub fn toggle_label(&self) -> &'static str {
        if self.controls.enabled {
            "Disable Pet"
        } else {
            "Enable Pet"
        }
    }

    /// Advance the panel clock; expires the notice.
    pub fn tick(&mut self, now: u64) {
        self.now = now;
        if self.notice.as_ref().is_some_and(|n| n.expires_at <= now) {
            self.notice = None;
        }
    }

    fn notify(&mut self, kind: NoticeKind, message: &str) {
        self.notice = Some(Notice {
            kind,
            message: message.to_string(),
            expires_at: self.now + NOTICE_MS,
        });
    }

    pub fn toggle(&mut self, page: Option<&mut dyn PageChannel>) {
        let Some(page) = page else {
            self.notify(NoticeKind::Error, "No active tab found");
            return;
        };
        let enabled = !self.controls.enabled;
        self.controls.enabled = enabled;

        if let Err(e) = self.apply_toggle(page, enabled) {
            log::error!("Failed to toggle pet: {e}");
            self.controls.enabled = !enabled;
            if let Err(e) = self.store.set(&SettingsPatch::enabled(!enabled)) {
                log::warn!("Failed to revert stored state: {e}");
            }
            self.notify(
                NoticeKind::Error,
                "Failed to toggle pet. Please refresh the page.",
            );
        }
    }

    fn apply_toggle(&mut self, page: &mut dyn PageChannel, enabled: bool) -> Result<(), PetError> {
        self.store.set(&SettingsPatch::enabled(enabled))?;
        let cmd = if enabled {
            Command::EnablePet
        } else {
            Command::DisablePet
        };
        match page.send(&cmd) {
            Ok(resp) => {
                log_failure(&cmd, &resp);
                Ok(())
            }
            // Runtime missing from the page: load it and enable once more.
            Err(PetError::Unreachable(_)) if enabled => {
                page.inject()?;
                let resp = page.send(&Command::EnablePet)?;
                log_failure(&cmd, &resp);
                Ok(())
            }
            Err(PetError::Unreachable(url)) => {
                log::debug!("No runtime on {url}, nothing to disable");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn reset_position(&mut self, page: Option<&mut dyn PageChannel>) {
        let Some(page) = page else {
            return;
        };
        match page.send(&Command::ResetPosition) {
            Ok(_) => self.notify(NoticeKind::Success, "Position reset!"),
            Err(e) => {
                log::error!("Failed to reset position: {e}");
                self.notify(NoticeKind::Error, "Failed to reset position");
            }
        }
    }

    pub fn send_animation(&mut self, page: Option<&mut dyn PageChannel>, name: &str) {
        let Some(page) = page else {
            return;
        };
        if !self.controls.enabled {
            self.notify(NoticeKind::Warning, "Please enable pet first!");
            return;
        }
        let cmd = Command::TriggerAnimation {
            animation_type: name.to_string(),
        };
        match page.send(&cmd) {
            Ok(resp) if resp.success => {}
            Ok(resp) => {
                log_failure(&cmd, &resp);
                self.notify(NoticeKind::Error, "Failed to trigger animation");
            }
            Err(e) => {
                log::error!("Failed to trigger animation: {e}");
                self.notify(NoticeKind::Error, "Failed to trigger animation");
            }
        }
    }

    pub fn set_size_preset(&mut self, page: Option<&mut dyn PageChannel>, preset: usize) {
        match SIZE_PRESETS.get(preset) {
            Some(&size) => self.set_size(page, size),
            None => log::warn!("No size preset {preset}"),
        }
    }

    /// Size slider, percent.
    pub fn set_size(&mut self, page: Option<&mut dyn PageChannel>, value: u32) {
        let value = clamp_size(value as i64);
        self.controls.size = value;
        self.persist_then_forward(
            page,
            SettingsPatch::size(value),
            Command::UpdateSize {
                value: value as i64,
            },
        );
    }

    pub fn set_speed(&mut self, page: Option<&mut dyn PageChannel>, value: u32) {
        let value = clamp_speed(value as i64);
        self.controls.speed = value;
        self.persist_then_forward(
            page,
            SettingsPatch::speed(value),
            Command::UpdateSpeed {
                value: value as i64,
            },
        );
    }

    /// Interval slider, seconds. The page gets milliseconds.
    pub fn set_interval(&mut self, page: Option<&mut dyn PageChannel>, secs: u32) {
        let secs = secs.max(1);
        self.controls.interval = secs;
        self.persist_then_forward(
            page,
            SettingsPatch::interval(secs),
            Command::UpdateInterval {
                value: secs as i64 * 1000,
            },
        );
    }

    pub fn set_sound(&mut self, page: Option<&mut dyn PageChannel>, on: bool) {
        self.controls.sound_enabled = on;
        self.persist_then_forward(
            page,
            SettingsPatch::sound_enabled(on),
            Command::ToggleSound { value: on },
        );
    }

    fn persist_then_forward(
        &mut self,
        page: Option<&mut dyn PageChannel>,
        patch: SettingsPatch,
        cmd: Command,
    ) {
        if let Err(e) = self.store.set(&patch) {
            log::error!("Failed to save {}: {e}", cmd.name());
            return;
        }
        let Some(page) = page else {
            return;
        };
        if !self.controls.enabled {
            return;
        }
        match page.send(&cmd) {
            Ok(resp) => log_failure(&cmd, &resp),
            Err(e) => log::error!("Failed to send {}: {e}", cmd.name()),
        }
    }

    /// Pull in changes made elsewhere (another panel, the relay, a page).
    pub fn sync(&mut self) {
        while let Ok(batch) = self.changes.try_recv() {
            for change in batch {
                let c = &mut self.controls;
                match change.key {
                    SettingKey::Enabled => c.enabled = change.new.as_bool().unwrap_or(c.enabled),
                    SettingKey::Size => c.size = as_u32(&change.new).unwrap_or(c.size),
                    SettingKey::Speed => c.speed = as_u32(&change.new).unwrap_or(c.speed),
                    SettingKey::Interval => {
                        c.interval = as_u32(&change.new).unwrap_or(c.interval)
                    }
                    SettingKey::SoundEnabled => {
                        c.sound_enabled = change.new.as_bool().unwrap_or(c.sound_enabled)
                    }
                    SettingKey::Position => {}
                }
            }
        }
    }
}

fn as_u32(v: &serde_json::Value) -> Option<u32> {
    v.as_u64().and_then(|n| u32::try_from(n).ok())
}

fn log_failure(cmd: &Command, resp: &Response) {
    if !resp.success {
        log::warn!(
            "{} rejected by page: {}",
            cmd.name(),
            resp.error.as_deref().unwrap_or("no reason given")
        );
    }
}
