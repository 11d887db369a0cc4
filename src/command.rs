//! Wire messages between the popup/relay, the host and the page runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PetError;
use crate::pet::menu::MenuItem;
use crate::pet::PetRuntime;
use crate::render::Surface;

/// A command delivered to the page runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    EnablePet,
    DisablePet,
    ResetPosition,
    #[serde(rename_all = "camelCase")]
    TriggerAnimation {
        animation_type: String,
    },
    /// Percent.
    UpdateSize {
        value: i64,
    },
    UpdateSpeed {
        value: i64,
    },
    /// Milliseconds.
    UpdateInterval {
        value: i64,
    },
    ToggleSound {
        value: bool,
    },
    Ping,
}

impl Command {
    const ACTIONS: [&'static str; 9] = [
        "enablePet",
        "disablePet",
        "resetPosition",
        "triggerAnimation",
        "updateSize",
        "updateSpeed",
        "updateInterval",
        "toggleSound",
        "ping",
    ];

    /// Decode a message, telling unknown actions apart from malformed known ones.
    pub fn from_json(msg: &Value) -> Result<Self, PetError> {
        let action = msg.get("action").and_then(Value::as_str).unwrap_or_default();
        if !Self::ACTIONS.contains(&action) {
            return Err(PetError::UnknownCommand(action.to_string()));
        }
        Command::deserialize(msg).map_err(|e| PetError::Malformed(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::EnablePet => "enablePet",
            Command::DisablePet => "disablePet",
            Command::ResetPosition => "resetPosition",
            Command::TriggerAnimation { .. } => "triggerAnimation",
            Command::UpdateSize { .. } => "updateSize",
            Command::UpdateSpeed { .. } => "updateSpeed",
            Command::UpdateInterval { .. } => "updateInterval",
            Command::ToggleSound { .. } => "toggleSound",
            Command::Ping => "ping",
        }
    }
}

/// `{"success":true}` or `{"success":false,"error":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<Result<(), PetError>> for Response {
    fn from(r: Result<(), PetError>) -> Self {
        match r {
            Ok(()) => Response::ok(),
            Err(e) => Response::failure(e.to_string()),
        }
    }
}

/// Decode and run one command message against a page runtime.
pub fn execute<S: Surface>(runtime: &mut PetRuntime<S>, msg: &Value) -> Response {
    let result = Command::from_json(msg).and_then(|cmd| {
        log::debug!("Command received: {}", cmd.name());
        runtime.handle_command(&cmd)
    });
    if let Err(e) = &result {
        log::warn!("Command failed: {e}");
    }
    result.into()
}

/// Page-level input, as the browser would report it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PageEvent {
    PointerDown {
        x: f32,
        y: f32,
        /// DOM button index; 0 is primary.
        #[serde(default)]
        button: u8,
    },
    PointerMove {
        x: f32,
        y: f32,
    },
    PointerUp {
        x: f32,
        y: f32,
    },
    PointerEnter,
    PointerLeave,
    ContextMenu {
        x: f32,
        y: f32,
    },
    MenuSelect {
        item: MenuItem,
    },
    MenuDismiss,
    Resize {
        width: f32,
        height: f32,
    },
    Unload,
}

/// One line of host input.
#[derive(Debug, Clone, PartialEq)]
pub enum HostInput {
    /// Anything tagged `action`: a page command or a background request.
    Command(Value),
    Event(PageEvent),
    /// A named keyboard shortcut, e.g. `toggle-pet`.
    Shortcut(String),
}

impl HostInput {
    pub fn parse(line: &str) -> Result<Self, PetError> {
        let msg: Value =
            serde_json::from_str(line).map_err(|e| PetError::Malformed(e.to_string()))?;
        if msg.get("event").is_some() {
            let event =
                PageEvent::deserialize(&msg).map_err(|e| PetError::Malformed(e.to_string()))?;
            return Ok(HostInput::Event(event));
        }
        if let Some(name) = msg.get("shortcut").and_then(Value::as_str) {
            return Ok(HostInput::Shortcut(name.to_string()));
        }
        Ok(HostInput::Command(msg))
    }
}
