use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PetError;

/// Width of one frame on a sprite sheet, in pixels.
pub const FRAME_WIDTH: f32 = 64.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum AnimationName {
    Idle,
    Walk,
    Jump,
    Sleep,
    Happy,
    Pet,
    Eat,
    Curious,
}

impl AnimationName {
    pub const ALL: [AnimationName; 8] = [
        Self::Idle,
        Self::Walk,
        Self::Jump,
        Self::Sleep,
        Self::Happy,
        Self::Pet,
        Self::Eat,
        Self::Curious,
    ];

    /// Resting animations the ambient cycle picks from.
    pub const AMBIENT: [AnimationName; 3] = [Self::Idle, Self::Walk, Self::Curious];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Walk => "walk",
            Self::Jump => "jump",
            Self::Sleep => "sleep",
            Self::Happy => "happy",
            Self::Pet => "pet",
            Self::Eat => "eat",
            Self::Curious => "curious",
        }
    }
}

impl fmt::Display for AnimationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnimationName {
    type Err = PetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| PetError::UnknownAnimation(s.to_string()))
    }
}

/// One sprite sheet: `frames` cells laid out horizontally, played over `duration` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationDef {
    pub name: AnimationName,
    pub sprite: String,
    pub frames: u32,
    pub duration: f32,
}

impl AnimationDef {
    pub fn new(name: AnimationName, frames: u32, duration: f32) -> Self {
        Self {
            name,
            sprite: format!("sprites/{}.png", name.as_str()),
            frames,
            duration,
        }
    }

    /// Length of one loop in milliseconds.
    pub fn cycle_ms(&self) -> u64 {
        ((self.duration * 1000.0).round() as u64).max(1)
    }

    /// Frame shown `elapsed_ms` after the animation started. Steps, no interpolation.
    pub fn frame_at(&self, elapsed_ms: u64) -> u32 {
        let cycle = self.cycle_ms();
        let t = elapsed_ms % cycle;
        ((t * self.frames as u64) / cycle) as u32
    }

    /// Horizontal background offset that brings `frame` into view.
    pub fn sheet_offset(&self, frame: u32) -> f32 {
        -(FRAME_WIDTH * frame as f32)
    }

    fn validate(&self) -> Result<(), PetError> {
        if self.frames == 0 {
            return Err(PetError::InvalidManifest(format!(
                "{}: frame count must be at least 1",
                self.name
            )));
        }
        if !(self.duration > 0.0) || !self.duration.is_finite() {
            return Err(PetError::InvalidManifest(format!(
                "{}: cycle duration must be positive",
                self.name
            )));
        }
        if self.sprite.is_empty() {
            return Err(PetError::InvalidManifest(format!("{}: empty sprite path", self.name)));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    sprite: String,
    frames: u32,
    duration: f32,
}

/// Immutable table of animations available on this page. Loaded once at runtime start.
#[derive(Debug, Clone)]
pub struct Registry {
    defs: [Option<AnimationDef>; 8],
}

impl Registry {
    /// The stock sprite pack.
    pub fn builtin() -> Self {
        let defs = vec![
            AnimationDef::new(AnimationName::Idle, 4, 0.8),
            AnimationDef::new(AnimationName::Walk, 6, 0.6),
            AnimationDef::new(AnimationName::Jump, 4, 0.5),
            AnimationDef::new(AnimationName::Sleep, 3, 1.2),
            AnimationDef::new(AnimationName::Happy, 4, 0.6),
            AnimationDef::new(AnimationName::Pet, 4, 0.8),
            AnimationDef::new(AnimationName::Eat, 5, 0.7),
            AnimationDef::new(AnimationName::Curious, 3, 0.9),
        ];
        let mut registry = Self { defs: Default::default() };
        for def in defs {
            let idx = def.name as usize;
            registry.defs[idx] = Some(def);
        }
        registry
    }

    /// Build from explicit definitions. A pack may leave animations out.
    pub fn from_defs(defs: impl IntoIterator<Item = AnimationDef>) -> Result<Self, PetError> {
        let mut registry = Self { defs: Default::default() };
        for def in defs {
            def.validate()?;
            let idx = def.name as usize;
            if registry.defs[idx].is_some() {
                return Err(PetError::InvalidManifest(format!("{} defined twice", def.name)));
            }
            registry.defs[idx] = Some(def);
        }
        Ok(registry)
    }

    /// Parse a manifest of the form `{"idle": {"sprite": "...", "frames": 4, "duration": 0.8}}`.
    pub fn from_manifest_json(json: &str) -> Result<Self, PetError> {
        let entries: BTreeMap<String, ManifestEntry> =
            serde_json::from_str(json).map_err(|e| PetError::InvalidManifest(e.to_string()))?;
        let mut defs = Vec::with_capacity(entries.len());
        for (key, entry) in entries {
            let name: AnimationName = key
                .parse()
                .map_err(|_| PetError::InvalidManifest(format!("unknown animation {key:?}")))?;
            defs.push(AnimationDef {
                name,
                sprite: entry.sprite,
                frames: entry.frames,
                duration: entry.duration,
            });
        }
        Self::from_defs(defs)
    }

    pub fn get(&self, name: AnimationName) -> Option<&AnimationDef> {
        self.defs[name as usize].as_ref()
    }

    pub fn contains(&self, name: AnimationName) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = AnimationName> + '_ {
        AnimationName::ALL.into_iter().filter(|n| self.contains(*n))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}
