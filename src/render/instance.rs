use glam::Vec2;

use crate::pet::animation::{AnimationDef, AnimationName};

/// Unscaled pet box, in pixels. One sprite frame.
pub const PET_SIZE: f32 = 64.0;

/// Snapshot of everything needed to draw the pet for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PetView {
    /// Top-left corner in viewport pixels.
    pub position: Vec2,
    pub scale: f32,
    pub animation: AnimationName,
    pub sprite: String,
    /// Sprite frame index within the sheet.
    pub frame: u32,
    /// Background offset that shows `frame`.
    pub sheet_offset: f32,
    pub dragging: bool,
}

impl PetView {
    /// Build from the pet's state, `elapsed_ms` into the current animation.
    pub fn from_state(
        position: Vec2,
        scale: f32,
        def: &AnimationDef,
        elapsed_ms: u64,
        dragging: bool,
    ) -> Self {
        let frame = def.frame_at(elapsed_ms);
        Self {
            position,
            scale,
            animation: def.name,
            sprite: def.sprite.clone(),
            frame,
            sheet_offset: def.sheet_offset(frame),
            dragging,
        }
    }
}

pub fn scaled_size(scale: f32) -> Vec2 {
    Vec2::splat(PET_SIZE * scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_tracks_the_sprite_frame() {
        let def = AnimationDef::new(AnimationName::Walk, 6, 0.6);
        let v = PetView::from_state(Vec2::new(10.0, 20.0), 1.5, &def, 250, false);
        assert_eq!(v.frame, 2);
        assert_eq!(v.sheet_offset, -128.0);
        assert_eq!(scaled_size(v.scale), Vec2::splat(96.0));
        assert_eq!(v.sprite, "sprites/walk.png");
    }
}
