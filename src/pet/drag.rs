use glam::Vec2;

/// Displacement (per axis, px) a drag must exceed before it counts as movement.
pub const DRAG_THRESHOLD: f32 = 5.0;

/// Result of one pointer move while dragging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragStep {
    /// Clamped position to apply.
    pub position: Vec2,
    /// True on the move that first crossed the threshold.
    pub started_moving: bool,
}

/// Press-drag-release tracking for the pet.
#[derive(Debug, Default, Clone)]
pub struct DragState {
    pub dragging: bool,
    /// Set once displacement from `origin` exceeds the threshold on either axis.
    pub moved: bool,
    /// Pointer minus pet position at press time.
    offset: Vec2,
    /// Pet position at press time.
    origin: Vec2,
}

impl DragState {
    pub fn begin(&mut self, pointer: Vec2, position: Vec2) {
        self.offset = pointer - position;
        self.origin = position;
        self.dragging = true;
        self.moved = false;
    }

    /// Follow the pointer. `bounds` is the largest allowed top-left corner.
    pub fn track(&mut self, pointer: Vec2, bounds: Vec2) -> Option<DragStep> {
        if !self.dragging {
            return None;
        }
        let candidate = pointer - self.offset;
        let delta = (candidate - self.origin).abs();
        let started_moving =
            !self.moved && (delta.x > DRAG_THRESHOLD || delta.y > DRAG_THRESHOLD);
        if started_moving {
            self.moved = true;
        }
        Some(DragStep {
            position: clamp_to_viewport(candidate, bounds),
            started_moving,
        })
    }

    /// Release. Returns whether the drag moved, or `None` if no drag was active.
    pub fn end(&mut self) -> Option<bool> {
        if !self.dragging {
            return None;
        }
        self.dragging = false;
        Some(self.moved)
    }
}

/// Largest top-left corner that keeps a `size` box inside `viewport`.
pub fn viewport_bounds(viewport: Vec2, size: Vec2) -> Vec2 {
    viewport - size
}

/// `0 <= p <= bounds` per axis. A box larger than the viewport pins to 0.
pub fn clamp_to_viewport(p: Vec2, bounds: Vec2) -> Vec2 {
    p.min(bounds).max(Vec2::ZERO)
}
