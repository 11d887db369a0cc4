use glam::Vec2;

use crate::render::Surface;

/// Bounce on single click.
const BOUNCE_LIFETIME_MS: u64 = 600;
/// Each floating heart.
const HEART_LIFETIME_MS: u64 = 1_000;
/// Hearts per long-press.
const HEART_COUNT: u64 = 3;
/// Delay between consecutive hearts.
const HEART_STAGGER_MS: u64 = 200;
/// Sleep "Z" drifting up.
const SLEEP_Z_LIFETIME_MS: u64 = 2_000;

const HEART_GLYPHS: [&str; 5] = ["❤️", "💕", "💖", "💗", "💝"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Applied to the pet itself, not a separate element.
    Bounce,
    Heart,
    SleepZ,
}

/// A transient visual attached to the page.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub id: u64,
    pub kind: EffectKind,
    /// Top-left in viewport pixels.
    pub pos: Vec2,
    pub glyph: &'static str,
    pub shown_at: u64,
    pub expires_at: u64,
}

/// Effects queued or on screen. Everything expires on its own; `clear` removes the rest.
pub struct Effects {
    queued: Vec<Effect>,
    active: Vec<Effect>,
    next_id: u64,
}

impl Effects {
    pub fn new() -> Self {
        Self {
            queued: Vec::new(),
            active: Vec::new(),
            next_id: 1,
        }
    }

    fn queue(&mut self, kind: EffectKind, pos: Vec2, glyph: &'static str, at: u64, life: u64) {
        let id = self.next_id;
        self.next_id += 1;
        self.queued.push(Effect {
            id,
            kind,
            pos,
            glyph,
            shown_at: at,
            expires_at: at + life,
        });
    }

    /// Restarts the bounce if one is already running.
    pub fn spawn_bounce(&mut self, pet_pos: Vec2, now: u64, surface: &mut dyn Surface) {
        let running: Vec<u64> = self
            .active
            .iter()
            .filter(|e| e.kind == EffectKind::Bounce)
            .map(|e| e.id)
            .collect();
        for id in running {
            surface.remove_effect(id);
        }
        self.active.retain(|e| e.kind != EffectKind::Bounce);
        self.queue(EffectKind::Bounce, pet_pos, "", now, BOUNCE_LIFETIME_MS);
        self.update(now, surface);
    }

    /// Three hearts rising from the pet, one every 200ms.
    pub fn spawn_hearts(
        &mut self,
        pet_pos: Vec2,
        now: u64,
        rng: &mut fastrand::Rng,
        surface: &mut dyn Surface,
    ) {
        for i in 0..HEART_COUNT {
            let pos = Vec2::new(pet_pos.x + 20.0 + rng.f32() * 30.0, pet_pos.y + 10.0);
            let glyph = HEART_GLYPHS[rng.usize(0..HEART_GLYPHS.len())];
            self.queue(
                EffectKind::Heart,
                pos,
                glyph,
                now + i * HEART_STAGGER_MS,
                HEART_LIFETIME_MS,
            );
        }
        self.update(now, surface);
    }

    pub fn spawn_sleep_z(&mut self, pet_pos: Vec2, now: u64, surface: &mut dyn Surface) {
        let pos = Vec2::new(pet_pos.x + 50.0, pet_pos.y - 10.0);
        self.queue(EffectKind::SleepZ, pos, "Z", now, SLEEP_Z_LIFETIME_MS);
        self.update(now, surface);
    }

    /// Show queued effects that are due, remove expired ones.
    pub fn update(&mut self, now: u64, surface: &mut dyn Surface) {
        let mut i = 0;
        while i < self.queued.len() {
            if self.queued[i].shown_at <= now {
                let e = self.queued.remove(i);
                if e.expires_at > now {
                    surface.show_effect(&e);
                    self.active.push(e);
                }
            } else {
                i += 1;
            }
        }

        let mut i = 0;
        while i < self.active.len() {
            if self.active[i].expires_at <= now {
                let e = self.active.swap_remove(i);
                surface.remove_effect(e.id);
            } else {
                i += 1;
            }
        }
    }

    /// Drop everything, queued or visible.
    pub fn clear(&mut self, surface: &mut dyn Surface) {
        self.queued.clear();
        for e in self.active.drain(..) {
            surface.remove_effect(e.id);
        }
    }

    pub fn active(&self) -> &[Effect] {
        &self.active
    }

    /// Queued plus visible.
    pub fn count(&self) -> usize {
        self.queued.len() + self.active.len()
    }

    pub fn count_kind(&self, kind: EffectKind) -> usize {
        self.queued
            .iter()
            .chain(self.active.iter())
            .filter(|e| e.kind == kind)
            .count()
    }

    /// Earliest moment something needs showing or removing.
    pub fn next_change(&self) -> Option<u64> {
        self.queued
            .iter()
            .map(|e| e.shown_at)
            .chain(self.active.iter().map(|e| e.expires_at))
            .min()
    }
}

impl Default for Effects {
    fn default() -> Self {
        Self::new()
    }
}
