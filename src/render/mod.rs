pub mod headless;
pub mod instance;

use glam::Vec2;

use crate::particles::Effect;
use crate::pet::animation::AnimationDef;
use crate::pet::menu::ContextMenu;

use self::instance::PetView;

/// The page's drawing layer. The runtime pushes state changes; the surface owns the pixels.
///
/// Calls always arrive between `mount` and `unmount`, except `viewport`.
pub trait Surface {
    /// Visible viewport size in pixels.
    fn viewport(&self) -> Vec2;

    fn mount(&mut self, view: &PetView);
    fn unmount(&mut self);

    fn set_position(&mut self, position: Vec2);
    fn set_scale(&mut self, scale: f32);
    /// Swap the sheet and restart its frame loop.
    fn set_sprite(&mut self, def: &AnimationDef);
    fn set_dragging(&mut self, dragging: bool);

    fn show_effect(&mut self, effect: &Effect);
    fn remove_effect(&mut self, id: u64);

    fn show_menu(&mut self, menu: &ContextMenu);
    fn hide_menu(&mut self);
}
