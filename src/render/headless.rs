use glam::Vec2;

use super::instance::PetView;
use super::Surface;
use crate::particles::Effect;
use crate::pet::animation::AnimationDef;
use crate::pet::menu::ContextMenu;

/// A drawing call as the surface received it.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Mount(PetView),
    Unmount,
    Position(Vec2),
    Scale(f32),
    Sprite(String),
    Dragging(bool),
    ShowEffect(Effect),
    RemoveEffect(u64),
    ShowMenu(ContextMenu),
    HideMenu,
}

/// Surface without pixels: keeps the resulting page state and a log of every call.
///
/// Used by the stdin host and by tests.
pub struct HeadlessSurface {
    viewport: Vec2,
    ops: Vec<SurfaceOp>,
    mounted: bool,
    position: Vec2,
    scale: f32,
    sprite: Option<String>,
    dragging: bool,
    effects: Vec<u64>,
    menu: Option<ContextMenu>,
}

impl HeadlessSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            viewport: Vec2::new(width, height),
            ops: Vec::new(),
            mounted: false,
            position: Vec2::ZERO,
            scale: 1.0,
            sprite: None,
            dragging: false,
            effects: Vec::new(),
            menu: None,
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.viewport = Vec2::new(width, height);
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    /// Take the call log, leaving it empty.
    pub fn drain_ops(&mut self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn sprite(&self) -> Option<&str> {
        self.sprite.as_deref()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn live_effects(&self) -> &[u64] {
        &self.effects
    }

    pub fn menu(&self) -> Option<&ContextMenu> {
        self.menu.as_ref()
    }

    fn record(&mut self, op: SurfaceOp) {
        log::trace!("surface: {op:?}");
        self.ops.push(op);
    }
}

impl Surface for HeadlessSurface {
    fn viewport(&self) -> Vec2 {
        self.viewport
    }

    fn mount(&mut self, view: &PetView) {
        self.mounted = true;
        self.position = view.position;
        self.scale = view.scale;
        self.sprite = Some(view.sprite.clone());
        self.dragging = view.dragging;
        self.record(SurfaceOp::Mount(view.clone()));
    }

    fn unmount(&mut self) {
        self.mounted = false;
        self.sprite = None;
        self.dragging = false;
        self.record(SurfaceOp::Unmount);
    }

    fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.record(SurfaceOp::Position(position));
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
        self.record(SurfaceOp::Scale(scale));
    }

    fn set_sprite(&mut self, def: &AnimationDef) {
        self.sprite = Some(def.sprite.clone());
        self.record(SurfaceOp::Sprite(def.sprite.clone()));
    }

    fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
        self.record(SurfaceOp::Dragging(dragging));
    }

    fn show_effect(&mut self, effect: &Effect) {
        self.effects.push(effect.id);
        self.record(SurfaceOp::ShowEffect(effect.clone()));
    }

    fn remove_effect(&mut self, id: u64) {
        self.effects.retain(|&e| e != id);
        self.record(SurfaceOp::RemoveEffect(id));
    }

    fn show_menu(&mut self, menu: &ContextMenu) {
        self.menu = Some(menu.clone());
        self.record(SurfaceOp::ShowMenu(menu.clone()));
    }

    fn hide_menu(&mut self) {
        self.menu = None;
        self.record(SurfaceOp::HideMenu);
    }
}
