//! Background relay: badge, toolbar/shortcut toggle, page pings and background requests.

use std::rc::Rc;
use std::sync::mpsc::{Receiver, TryRecvError};

use serde::Deserialize;
use serde_json::{json, Value};

use crate::command::Command;
use crate::error::PetError;
use crate::page::{is_restricted, PageChannel};
use crate::settings::{Position, SettingChange, SettingKey, SettingsPatch, SettingsStore};

pub const BADGE_ON_TEXT: &str = "✓";
pub const BADGE_ON_COLOR: &str = "#4CAF50";
/// Keyboard shortcut that flips the pet on the active page.
pub const TOGGLE_SHORTCUT: &str = "toggle-pet";

/// Toolbar badge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Badge {
    pub text: String,
    pub color: Option<String>,
}

impl Badge {
    fn for_state(enabled: bool) -> Self {
        if enabled {
            Self {
                text: BADGE_ON_TEXT.to_string(),
                color: Some(BADGE_ON_COLOR.to_string()),
            }
        } else {
            Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    Loading,
    Complete,
}

/// Requests pages send to the background.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BackgroundRequest {
    GetPetStatus,
    GetSettings,
    SavePosition {
        position: Position,
    },
    LogEvent {
        event: String,
        #[serde(default)]
        data: Option<Value>,
    },
}

impl BackgroundRequest {
    const ACTIONS: [&'static str; 4] = ["getPetStatus", "getSettings", "savePosition", "logEvent"];

    /// True if `msg` is addressed to the background rather than a page.
    pub fn matches(msg: &Value) -> bool {
        msg.get("action")
            .and_then(Value::as_str)
            .is_some_and(|a| Self::ACTIONS.contains(&a))
    }
}

pub struct Relay {
    store: Rc<dyn SettingsStore>,
    changes: Receiver<Vec<SettingChange>>,
    badge: Badge,
}

impl Relay {
    pub fn new(store: Rc<dyn SettingsStore>) -> Self {
        let changes = store.subscribe();
        let enabled = store.get().map(|s| s.enabled).unwrap_or_else(|e| {
            log::error!("Failed to initialize badge: {e}");
            false
        });
        Self {
            store,
            changes,
            badge: Badge::for_state(enabled),
        }
    }

    pub fn badge(&self) -> &Badge {
        &self.badge
    }

    /// Toolbar button: flip the stored state and tell the page. Returns the new state.
    pub fn on_action_click(&mut self, page: &mut dyn PageChannel) -> Result<bool, PetError> {
        let enabled = self.toggle(page)?;
        self.badge = Badge::for_state(enabled);
        Ok(enabled)
    }

    /// Keyboard shortcut on the active page, if there is one.
    pub fn on_shortcut(&mut self, name: &str, page: Option<&mut dyn PageChannel>) {
        log::info!("Command received: {name}");
        let Some(page) = page else {
            return;
        };
        if name != TOGGLE_SHORTCUT {
            return;
        }
        if let Err(e) = self.toggle(page) {
            log::error!("Failed to toggle pet: {e}");
        }
    }

    fn toggle(&mut self, page: &mut dyn PageChannel) -> Result<bool, PetError> {
        let enabled = !self.store.get()?.enabled;
        self.store.set(&SettingsPatch::enabled(enabled))?;
        let cmd = if enabled {
            Command::EnablePet
        } else {
            Command::DisablePet
        };
        page.send(&cmd)?;
        Ok(enabled)
    }

    /// A tab changed state. Fully loaded pages get pinged when the pet is on.
    pub fn on_tab_updated(&mut self, page: &mut dyn PageChannel, status: TabStatus) {
        if status != TabStatus::Complete || is_restricted(page.url()) {
            return;
        }
        match self.store.get() {
            Ok(s) if s.enabled => {
                if page.send(&Command::Ping).is_err() {
                    log::info!("Runtime will load on its own: {}", page.url());
                }
            }
            Ok(_) => {}
            Err(e) => log::error!("Failed to handle tab update: {e}"),
        }
    }

    /// Answer a background request from a page. Always produces a reply.
    pub fn handle_request(&mut self, msg: &Value) -> Value {
        let action = msg.get("action").and_then(Value::as_str).unwrap_or_default();
        log::debug!("Background received message: {action}");
        let req = match BackgroundRequest::deserialize(msg) {
            Ok(req) => req,
            Err(_) => {
                let err = PetError::UnknownCommand(action.to_string());
                log::warn!("{err}");
                return json!({ "success": false, "error": err.to_string() });
            }
        };

        match req {
            BackgroundRequest::GetPetStatus => match self.store.get() {
                Ok(s) => json!({ "enabled": s.enabled }),
                Err(e) => {
                    log::error!("Failed to get status: {e}");
                    json!({ "enabled": false, "error": e.to_string() })
                }
            },
            BackgroundRequest::GetSettings => match self.store.get() {
                Ok(s) => json!({ "success": true, "settings": s }),
                Err(e) => {
                    log::error!("Failed to get settings: {e}");
                    json!({ "success": false, "error": e.to_string() })
                }
            },
            BackgroundRequest::SavePosition { position } => {
                match self.store.set(&SettingsPatch::position(position)) {
                    Ok(()) => json!({ "success": true }),
                    Err(e) => {
                        log::error!("Failed to save position: {e}");
                        json!({ "success": false, "error": e.to_string() })
                    }
                }
            }
            BackgroundRequest::LogEvent { event, data } => {
                log::info!("[Pet Event: {event}] {}", data.unwrap_or(Value::Null));
                json!({ "success": true })
            }
        }
    }

    /// Drain store notifications; keeps the badge in step with `petEnabled`.
    pub fn pump(&mut self) {
        loop {
            match self.changes.try_recv() {
                Ok(batch) => {
                    for change in batch {
                        log::info!(
                            "Setting changed: {} {} -> {}",
                            change.key.as_str(),
                            change.old,
                            change.new
                        );
                        if change.key == SettingKey::Enabled {
                            self.badge = Badge::for_state(change.new.as_bool().unwrap_or(false));
                        }
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("Settings store stopped sending changes");
                    break;
                }
            }
        }
    }
}
