//! The pet runtime: one pet per page, its animation state machine and every timer it owns.
//!
//! All entry points run to completion on the page's single event thread. Time only moves
//! through [`PetRuntime::advance_to`]; the host feeds it a monotonic millisecond clock.

pub mod animation;
pub mod drag;
pub mod history;
pub mod menu;
pub mod rules;
pub mod timers;

use std::rc::Rc;

use glam::Vec2;

use crate::click::{ClickOutcome, ClickState, DOUBLE_CLICK_WINDOW_MS};
use crate::command::Command;
use crate::error::PetError;
use crate::particles::Effects;
use crate::render::instance::{scaled_size, PetView};
use crate::render::Surface;
use crate::settings::{
    clamp_size, clamp_speed, interval_secs_from_ms, Settings, SettingsPatch, SettingsStore,
    DEFAULT_POSITION,
};

use self::animation::{AnimationName, Registry};
use self::drag::{clamp_to_viewport, viewport_bounds, DragState};
use self::history::{Transition, TransitionLog};
use self::menu::{ContextMenu, MenuItem};
use self::rules::{Candidate, RuleContext, Trigger};
use self::timers::{TimerKind, Timers};

/// No interaction for this long reverts to idle.
const IDLE_TIMEOUT_MS: u64 = 5_000;
/// No interaction for this long puts the pet to sleep.
const SLEEP_TIMEOUT_MS: u64 = 60_000;
/// Period of the sleeping "Z" while inactivity continues.
const SLEEP_EFFECT_PERIOD_MS: u64 = 3_000;
/// Hold duration that counts as petting.
const LONG_PRESS_MS: u64 = 1_000;
/// Delay between releasing a moved drag and returning to idle.
const DRAG_SETTLE_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

impl PointerButton {
    /// DOM `MouseEvent.button` numbering.
    pub fn from_index(i: u8) -> Self {
        match i {
            0 => Self::Primary,
            1 => Self::Middle,
            _ => Self::Secondary,
        }
    }
}

/// A live settings change from the popup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setting {
    /// Percent.
    Size(i64),
    Speed(i64),
    /// Ambient cycle period in milliseconds.
    IntervalMs(i64),
    Sound(bool),
}

#[derive(Debug, Default, Clone, Copy)]
struct Press {
    long_press_fired: bool,
}

/// The on-page pet. Owns every timer; dropping it cancels them all.
struct Instance {
    position: Vec2,
    animation: AnimationName,
    animation_started: u64,
    drag: DragState,
    press: Option<Press>,
    hovered: bool,
    last_interaction: u64,
    timers: Timers,
    clicks: ClickState,
    effects: Effects,
    menu: Option<ContextMenu>,
}

impl Instance {
    fn new(position: Vec2, animation: AnimationName, now: u64) -> Self {
        Self {
            position,
            animation,
            animation_started: now,
            drag: DragState::default(),
            press: None,
            hovered: false,
            last_interaction: now,
            timers: Timers::new(),
            clicks: ClickState::new(),
            effects: Effects::new(),
            menu: None,
        }
    }

    fn rule_context(&self) -> RuleContext {
        RuleContext {
            current: self.animation,
            dragging: self.drag.dragging,
            moved: self.drag.moved,
        }
    }

    fn hit(&self, p: Vec2, scale: f32) -> bool {
        let max = self.position + scaled_size(scale);
        p.cmpge(self.position).all() && p.cmplt(max).all()
    }
}

pub struct PetRuntime<S: Surface> {
    store: Rc<dyn SettingsStore>,
    surface: S,
    registry: Registry,
    settings: Settings,
    loaded: bool,
    /// Exact ambient period; `settings.interval` only keeps whole seconds.
    ambient_period_ms: u64,
    pet: Option<Instance>,
    /// Writes not yet accepted by the store.
    pending: SettingsPatch,
    history: TransitionLog,
    rng: fastrand::Rng,
    now: u64,
}

impl<S: Surface> PetRuntime<S> {
    pub fn new(store: Rc<dyn SettingsStore>, surface: S, registry: Registry) -> Self {
        let settings = Settings::default();
        Self {
            store,
            surface,
            registry,
            ambient_period_ms: settings.interval_ms(),
            settings,
            loaded: false,
            pet: None,
            pending: SettingsPatch::default(),
            history: TransitionLog::default(),
            rng: fastrand::Rng::new(),
            now: 0,
        }
    }

    /// Replace the random source (ambient picks, heart jitter).
    pub fn with_rng(mut self, rng: fastrand::Rng) -> Self {
        self.rng = rng;
        self
    }

    /// Read persisted settings and bring the pet up if it was left enabled.
    pub fn boot(&mut self) -> Result<(), PetError> {
        self.ensure_loaded();
        if self.settings.enabled {
            self.enable()?;
        }
        Ok(())
    }

    fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        match self.store.get() {
            Ok(s) => self.settings = s,
            Err(e) => log::warn!("Failed to load settings, using defaults: {e}"),
        }
        self.ambient_period_ms = self.settings.interval_ms();
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn enable(&mut self) -> Result<(), PetError> {
        if self.pet.is_some() {
            return Ok(());
        }
        self.ensure_loaded();

        let start = if self.registry.contains(AnimationName::Idle) {
            AnimationName::Idle
        } else {
            self.registry
                .names()
                .next()
                .ok_or(PetError::MissingAnimation(AnimationName::Idle))?
        };
        let def = self
            .registry
            .get(start)
            .ok_or(PetError::MissingAnimation(start))?;

        let now = self.now;
        let scale = self.settings.scale();
        let position = clamp_to_viewport(self.settings.position.into(), self.bounds());
        let mut pet = Instance::new(position, start, now);
        pet.timers
            .schedule_repeating(TimerKind::AmbientCycle, now, self.ambient_period_ms);

        self.surface
            .mount(&PetView::from_state(position, scale, def, 0, false));
        self.history.push(Transition {
            at: now,
            from: None,
            to: start,
            trigger: Trigger::Command,
        });
        self.pet = Some(pet);
        self.note_interaction();

        log::info!("Pet activated at ({}, {})", position.x, position.y);
        Ok(())
    }

    pub fn disable(&mut self) {
        self.teardown("disabled");
    }

    /// Page is going away: flush the position synchronously and stop everything.
    pub fn unload(&mut self) {
        self.teardown("page unload");
    }

    fn teardown(&mut self, reason: &str) {
        let Some(mut pet) = self.pet.take() else {
            return;
        };
        self.queue_write(SettingsPatch::position(pet.position.into()));
        self.flush();

        pet.timers.cancel_all();
        pet.effects.clear(&mut self.surface);
        if pet.menu.take().is_some() {
            self.surface.hide_menu();
        }
        self.surface.unmount();
        log::info!("Pet removed ({reason})");
    }

    /// Apply a setting to the live pet (if any) and persist it.
    pub fn update_setting(&mut self, setting: Setting) -> Result<(), PetError> {
        self.ensure_loaded();
        let now = self.now;
        match setting {
            Setting::Size(v) => {
                let size = clamp_size(v);
                if size as i64 != v {
                    log::warn!("Size {v}% out of range, using {size}%");
                }
                self.queue_write(SettingsPatch::size(size));
                if self.pet.is_some() {
                    self.surface.set_scale(self.settings.scale());
                    self.viewport_changed();
                }
            }
            Setting::Speed(v) => {
                self.queue_write(SettingsPatch::speed(clamp_speed(v)));
            }
            Setting::IntervalMs(ms) => {
                if ms <= 0 {
                    return Err(PetError::InvalidSetting {
                        key: "interval",
                        reason: format!("{ms}ms is not a positive period"),
                    });
                }
                let ms = ms as u64;
                self.ambient_period_ms = ms;
                self.queue_write(SettingsPatch::interval(interval_secs_from_ms(ms)));
                if let Some(pet) = self.pet.as_mut() {
                    pet.timers
                        .schedule_repeating(TimerKind::AmbientCycle, now, ms);
                }
            }
            Setting::Sound(on) => {
                self.queue_write(SettingsPatch::sound_enabled(on));
            }
        }
        self.flush();
        Ok(())
    }

    /// Back to the default corner. Persisted even with no pet on the page.
    pub fn reset_position(&mut self) {
        self.ensure_loaded();
        let bounds = self.bounds();
        let target: Vec2 = DEFAULT_POSITION.into();
        let applied = match self.pet.as_mut() {
            Some(pet) => {
                pet.position = clamp_to_viewport(target, bounds);
                self.surface.set_position(pet.position);
                pet.position
            }
            None => target,
        };
        self.queue_write(SettingsPatch::position(applied.into()));
        self.flush();
    }

    /// Explicit animation request. Unknown names are rejected without touching state.
    pub fn trigger_animation(&mut self, name: &str) -> Result<(), PetError> {
        let name: AnimationName = name.parse()?;
        self.trigger(name)
    }

    fn trigger(&mut self, name: AnimationName) -> Result<(), PetError> {
        if !self.registry.contains(name) {
            log::warn!("Animation not available: {name}");
            return Err(PetError::MissingAnimation(name));
        }
        let now = self.now;
        let period = self.ambient_period_ms;
        let Some(pet) = self.pet.as_mut() else {
            return Ok(());
        };
        // Pending automatic choices would clobber the command.
        pet.timers.cancel(TimerKind::ClickDebounce);
        pet.clicks.reset();
        pet.timers.cancel(TimerKind::DragSettle);
        pet.timers
            .schedule_repeating(TimerKind::AmbientCycle, now, period);
        self.apply(Candidate::new(Trigger::Command, name));
        Ok(())
    }

    /// Exhaustive dispatch of a relay command.
    pub fn handle_command(&mut self, cmd: &Command) -> Result<(), PetError> {
        match cmd {
            Command::EnablePet => self.enable(),
            Command::DisablePet => {
                self.disable();
                Ok(())
            }
            Command::ResetPosition => {
                self.reset_position();
                Ok(())
            }
            Command::TriggerAnimation { animation_type } => self.trigger_animation(animation_type),
            Command::UpdateSize { value } => self.update_setting(Setting::Size(*value)),
            Command::UpdateSpeed { value } => self.update_setting(Setting::Speed(*value)),
            Command::UpdateInterval { value } => self.update_setting(Setting::IntervalMs(*value)),
            Command::ToggleSound { value } => self.update_setting(Setting::Sound(*value)),
            Command::Ping => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// Move the clock to `now`, firing every timer that comes due on the way.
    ///
    /// Timers due at the same instant compete through the rule table.
    pub fn advance_to(&mut self, now: u64) {
        if now < self.now {
            return;
        }
        loop {
            let Some(pet) = self.pet.as_mut() else {
                break;
            };
            let Some((at, fired)) = pet.timers.pop_due(now) else {
                break;
            };
            pet.effects.update(at, &mut self.surface);
            self.now = at;
            self.fire(&fired);
        }
        self.now = now;
        if let Some(pet) = self.pet.as_mut() {
            pet.effects.update(now, &mut self.surface);
        }
        self.flush();
    }

    /// Earliest moment the runtime has work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        let pet = self.pet.as_ref()?;
        match (pet.timers.next_due(), pet.effects.next_change()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn fire(&mut self, fired: &[TimerKind]) {
        let mut candidates = Vec::with_capacity(fired.len());
        for &kind in fired {
            log::trace!("timer fired: {} at {}", kind.label(), self.now);
            if let Some(c) = self.on_timer(kind) {
                candidates.push(c);
            }
        }
        let Some(pet) = self.pet.as_ref() else {
            return;
        };
        let ctx = pet.rule_context();
        if let Some(best) = rules::resolve(&candidates, &ctx) {
            let deferred = rules::deferred(best, &candidates);
            for c in candidates
                .iter()
                .filter(|c| **c != best && !deferred.contains(c))
            {
                log::debug!(
                    "{} -> {} superseded by {}",
                    c.trigger.label(),
                    c.target,
                    best.trigger.label()
                );
            }
            self.apply(best);
            for c in deferred {
                self.apply(c);
            }
        }
    }

    fn on_timer(&mut self, kind: TimerKind) -> Option<Candidate> {
        let now = self.now;
        let pet = self.pet.as_mut()?;
        match kind {
            TimerKind::AmbientCycle => {
                if pet.drag.dragging {
                    return None;
                }
                let choices: Vec<AnimationName> = AnimationName::AMBIENT
                    .into_iter()
                    .filter(|a| self.registry.contains(*a))
                    .collect();
                if choices.is_empty() {
                    return None;
                }
                let pick = choices[self.rng.usize(0..choices.len())];
                Some(Candidate::new(Trigger::Ambient, pick))
            }
            TimerKind::IdleReturn => Some(Candidate::new(Trigger::IdleTimeout, AnimationName::Idle)),
            TimerKind::SleepOnset => {
                Some(Candidate::new(Trigger::SleepTimeout, AnimationName::Sleep))
            }
            TimerKind::SleepEffectRepeat => {
                if now.saturating_sub(pet.last_interaction) >= SLEEP_TIMEOUT_MS {
                    pet.effects
                        .spawn_sleep_z(pet.position, now, &mut self.surface);
                } else {
                    pet.timers.cancel(TimerKind::SleepEffectRepeat);
                }
                None
            }
            TimerKind::LongPress => {
                if pet.drag.moved {
                    return None;
                }
                if let Some(press) = pet.press.as_mut() {
                    press.long_press_fired = true;
                }
                Some(Candidate::new(Trigger::LongPress, AnimationName::Pet))
            }
            TimerKind::ClickDebounce => pet
                .clicks
                .resolve_single()
                .then(|| Candidate::new(Trigger::Click, AnimationName::Jump)),
            TimerKind::DragSettle => Some(Candidate::new(Trigger::DragSettle, AnimationName::Idle)),
        }
    }

    // -----------------------------------------------------------------------
    // Animation switching
    // -----------------------------------------------------------------------

    /// Run one candidate through the rules and switch if it passes. Returns true on switch.
    fn apply(&mut self, c: Candidate) -> bool {
        let now = self.now;
        let Some(pet) = self.pet.as_mut() else {
            return false;
        };
        if !rules::admits(c, &pet.rule_context()) {
            log::trace!("{} -> {} not admitted", c.trigger.label(), c.target);
            return false;
        }
        let Some(def) = self.registry.get(c.target) else {
            log::warn!("Animation not available: {}", c.target);
            return false;
        };

        let from = pet.animation;
        pet.animation = c.target;
        pet.animation_started = now;
        self.surface.set_sprite(def);
        self.history.push(Transition {
            at: now,
            from: Some(from),
            to: c.target,
            trigger: c.trigger,
        });
        log::debug!("Switched to animation: {} ({})", c.target, c.trigger.label());

        match c.trigger {
            Trigger::Click => pet.effects.spawn_bounce(pet.position, now, &mut self.surface),
            Trigger::LongPress => {
                pet.effects
                    .spawn_hearts(pet.position, now, &mut self.rng, &mut self.surface)
            }
            Trigger::SleepTimeout => {
                pet.timers
                    .schedule_repeating(TimerKind::SleepEffectRepeat, now, SLEEP_EFFECT_PERIOD_MS)
            }
            _ => {}
        }
        true
    }

    /// Restart the idle and sleep countdowns from now.
    fn note_interaction(&mut self) {
        let now = self.now;
        if let Some(pet) = self.pet.as_mut() {
            pet.last_interaction = now;
            pet.timers.schedule(TimerKind::IdleReturn, now, IDLE_TIMEOUT_MS);
            pet.timers.schedule(TimerKind::SleepOnset, now, SLEEP_TIMEOUT_MS);
        }
    }

    // -----------------------------------------------------------------------
    // Pointer input
    // -----------------------------------------------------------------------

    pub fn pointer_down(&mut self, pos: Vec2, button: PointerButton) {
        self.close_menu();
        if button != PointerButton::Primary {
            return;
        }
        let now = self.now;
        let scale = self.settings.scale();
        let Some(pet) = self.pet.as_mut() else {
            return;
        };
        if !pet.hit(pos, scale) {
            return;
        }
        pet.drag.begin(pos, pet.position);
        pet.press = Some(Press::default());
        pet.timers.schedule(TimerKind::LongPress, now, LONG_PRESS_MS);
        self.surface.set_dragging(true);

        self.apply(Candidate::new(Trigger::DragStart, AnimationName::Walk));
        self.note_interaction();
    }

    /// Pointer moved anywhere on the page.
    pub fn pointer_move(&mut self, pos: Vec2) {
        let bounds = self.bounds();
        let Some(pet) = self.pet.as_mut() else {
            return;
        };
        let Some(step) = pet.drag.track(pos, bounds) else {
            return;
        };
        if step.started_moving {
            // A real drag is never a click or a pet.
            pet.timers.cancel(TimerKind::LongPress);
            pet.timers.cancel(TimerKind::ClickDebounce);
            pet.clicks.reset();
        }
        pet.position = step.position;
        self.surface.set_position(step.position);
    }

    /// Pointer released anywhere on the page.
    pub fn pointer_up(&mut self, pos: Vec2) {
        let now = self.now;
        let scale = self.settings.scale();
        let Some(pet) = self.pet.as_mut() else {
            return;
        };
        pet.timers.cancel(TimerKind::LongPress);
        let press = pet.press.take();
        let Some(moved) = pet.drag.end() else {
            return;
        };
        self.surface.set_dragging(false);
        if moved {
            pet.timers.schedule(TimerKind::DragSettle, now, DRAG_SETTLE_MS);
        }
        let position = pet.position;
        let is_click =
            !moved && press.is_some_and(|p| !p.long_press_fired) && pet.hit(pos, scale);

        self.queue_write(SettingsPatch::position(position.into()));
        self.note_interaction();
        if is_click {
            self.click();
        }
        self.flush();
    }

    fn click(&mut self) {
        let now = self.now;
        let Some(pet) = self.pet.as_mut() else {
            return;
        };
        match pet.clicks.register(now) {
            ClickOutcome::Pending => {
                pet.timers
                    .schedule(TimerKind::ClickDebounce, now, DOUBLE_CLICK_WINDOW_MS);
            }
            ClickOutcome::Double => {
                pet.timers.cancel(TimerKind::ClickDebounce);
                self.apply(Candidate::new(Trigger::DoubleClick, AnimationName::Happy));
            }
        }
        self.note_interaction();
    }

    pub fn pointer_enter(&mut self) {
        let Some(pet) = self.pet.as_mut() else {
            return;
        };
        pet.hovered = true;
        self.apply(Candidate::new(Trigger::HoverEnter, AnimationName::Curious));
        self.note_interaction();
    }

    pub fn pointer_leave(&mut self) {
        let Some(pet) = self.pet.as_mut() else {
            return;
        };
        pet.hovered = false;
        pet.timers.cancel(TimerKind::LongPress);
        self.apply(Candidate::new(Trigger::HoverExit, AnimationName::Idle));
    }

    /// Right-click. Opens the pet menu when the pointer is over the pet.
    pub fn context_menu(&mut self, pos: Vec2) {
        let scale = self.settings.scale();
        let Some(pet) = self.pet.as_mut() else {
            return;
        };
        if !pet.hit(pos, scale) {
            return;
        }
        let menu = ContextMenu::build(pos, &self.registry);
        if pet.menu.is_some() {
            self.surface.hide_menu();
        }
        self.surface.show_menu(&menu);
        pet.menu = Some(menu);
        self.note_interaction();
    }

    pub fn select_menu_item(&mut self, item: MenuItem) -> Result<(), PetError> {
        let Some(menu) = self.pet.as_ref().and_then(|p| p.menu.as_ref()) else {
            log::debug!("menu selection with no menu open: {item:?}");
            return Ok(());
        };
        if !menu.contains(item) {
            if let MenuItem::Animation(name) = item {
                return Err(PetError::MissingAnimation(name));
            }
        }
        self.close_menu();
        match item {
            MenuItem::Animation(name) => self.trigger(name),
            MenuItem::ResetPosition => {
                self.reset_position();
                Ok(())
            }
        }
    }

    pub fn dismiss_menu(&mut self) {
        self.close_menu();
    }

    fn close_menu(&mut self) {
        if let Some(pet) = self.pet.as_mut() {
            if pet.menu.take().is_some() {
                self.surface.hide_menu();
            }
        }
    }

    /// The viewport changed size. Pull the pet back on screen if needed.
    pub fn viewport_changed(&mut self) {
        let bounds = self.bounds();
        let Some(pet) = self.pet.as_mut() else {
            return;
        };
        let clamped = clamp_to_viewport(pet.position, bounds);
        if clamped != pet.position {
            pet.position = clamped;
            self.surface.set_position(clamped);
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn queue_write(&mut self, patch: SettingsPatch) {
        patch.apply(&mut self.settings);
        self.pending.merge(patch);
    }

    /// Push pending writes. On failure they stay queued and ride along with the next write.
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let patch = std::mem::take(&mut self.pending);
        if let Err(e) = self.store.set(&patch) {
            log::warn!("Failed to save settings: {e}");
            self.pending = patch;
        }
    }

    fn bounds(&self) -> Vec2 {
        viewport_bounds(self.surface.viewport(), scaled_size(self.settings.scale()))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn is_enabled(&self) -> bool {
        self.pet.is_some()
    }

    pub fn animation(&self) -> Option<AnimationName> {
        self.pet.as_ref().map(|p| p.animation)
    }

    pub fn position(&self) -> Option<Vec2> {
        self.pet.as_ref().map(|p| p.position)
    }

    pub fn is_dragging(&self) -> bool {
        self.pet.as_ref().is_some_and(|p| p.drag.dragging)
    }

    pub fn is_hovered(&self) -> bool {
        self.pet.as_ref().is_some_and(|p| p.hovered)
    }

    pub fn active_timer_count(&self) -> usize {
        self.pet.as_ref().map_or(0, |p| p.timers.active_count())
    }

    pub fn is_timer_pending(&self, kind: TimerKind) -> bool {
        self.pet.as_ref().is_some_and(|p| p.timers.is_pending(kind))
    }

    pub fn effects(&self) -> Option<&Effects> {
        self.pet.as_ref().map(|p| &p.effects)
    }

    pub fn transitions(&self) -> &TransitionLog {
        &self.history
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn view(&self) -> Option<PetView> {
        let pet = self.pet.as_ref()?;
        let def = self.registry.get(pet.animation)?;
        Some(PetView::from_state(
            pet.position,
            self.settings.scale(),
            def,
            self.now - pet.animation_started,
            pet.drag.dragging,
        ))
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::EffectKind;
    use crate::render::headless::{HeadlessSurface, SurfaceOp};
    use crate::settings::{MemoryStore, Position};
    use super::animation::AnimationDef;

    const PET_CENTER: Vec2 = Vec2::new(132.0, 132.0);

    fn runtime_with(settings: Settings, registry: Registry) -> (PetRuntime<HeadlessSurface>, Rc<MemoryStore>) {
        let store = Rc::new(MemoryStore::with_settings(settings));
        let shared: Rc<dyn SettingsStore> = store.clone();
        let rt = PetRuntime::new(shared, HeadlessSurface::new(1280.0, 720.0), registry)
            .with_rng(fastrand::Rng::with_seed(42));
        (rt, store)
    }

    fn runtime() -> (PetRuntime<HeadlessSurface>, Rc<MemoryStore>) {
        runtime_with(Settings::default(), Registry::builtin())
    }

    /// Runtime with the ambient cycle pushed far out of the way.
    fn quiet_runtime() -> (PetRuntime<HeadlessSurface>, Rc<MemoryStore>) {
        let settings = Settings {
            interval: 10_000,
            ..Settings::default()
        };
        runtime_with(settings, Registry::builtin())
    }

    fn click(rt: &mut PetRuntime<HeadlessSurface>, at: u64) {
        rt.advance_to(at);
        rt.pointer_down(PET_CENTER, PointerButton::Primary);
        rt.pointer_up(PET_CENTER);
    }

    fn sleep_z_shown(rt: &PetRuntime<HeadlessSurface>) -> usize {
        rt.surface()
            .ops()
            .iter()
            .filter(|op| matches!(op, SurfaceOp::ShowEffect(e) if e.kind == EffectKind::SleepZ))
            .count()
    }

    #[test]
    fn enable_mounts_idle_once() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.enable().unwrap();

        assert!(rt.surface().is_mounted());
        assert_eq!(rt.animation(), Some(AnimationName::Idle));
        assert_eq!(rt.position(), Some(Vec2::new(100.0, 100.0)));
        assert_eq!(rt.surface().sprite(), Some("sprites/idle.png"));
        let mounts = rt
            .surface()
            .ops()
            .iter()
            .filter(|op| matches!(op, SurfaceOp::Mount(_)))
            .count();
        assert_eq!(mounts, 1);
        assert!(rt.is_timer_pending(TimerKind::AmbientCycle));
        assert!(rt.is_timer_pending(TimerKind::IdleReturn));
        assert!(rt.is_timer_pending(TimerKind::SleepOnset));
    }

    #[test]
    fn disable_flushes_position_and_stops_everything() {
        let (mut rt, store) = runtime();
        rt.enable().unwrap();
        rt.advance_to(1_000);
        rt.pointer_down(PET_CENTER, PointerButton::Primary);
        rt.advance_to(2_000); // long press: hearts queued
        rt.pointer_move(PET_CENTER + Vec2::new(300.0, 200.0));

        rt.disable();
        rt.disable();

        assert!(!rt.is_enabled());
        assert!(!rt.surface().is_mounted());
        assert_eq!(rt.active_timer_count(), 0);
        assert!(rt.surface().live_effects().is_empty());
        assert_eq!(store.snapshot().position, Position { x: 400.0, y: 300.0 });

        // nothing fires after removal
        let ops_before = rt.surface().ops().len();
        rt.advance_to(600_000);
        assert_eq!(rt.surface().ops().len(), ops_before);
    }

    #[test]
    fn enable_disable_sequences_never_leak() {
        let (mut rt, _) = runtime();
        let mut rng = fastrand::Rng::with_seed(9);
        let mut t = 0;
        for _ in 0..200 {
            t += rng.u64(0..20_000);
            rt.advance_to(t);
            match rng.u8(0..4) {
                0 | 1 => rt.enable().unwrap(),
                2 => {
                    rt.disable();
                    assert_eq!(rt.active_timer_count(), 0);
                }
                _ => click(&mut rt, t),
            }
            let mounts = rt
                .surface()
                .ops()
                .iter()
                .filter(|op| matches!(op, SurfaceOp::Mount(_)))
                .count();
            let unmounts = rt
                .surface()
                .ops()
                .iter()
                .filter(|op| matches!(op, SurfaceOp::Unmount))
                .count();
            assert!(mounts - unmounts <= 1);
            assert_eq!(mounts - unmounts == 1, rt.is_enabled());
        }
    }

    #[test]
    fn small_drag_is_a_click() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.advance_to(1_000);
        rt.pointer_down(PET_CENTER, PointerButton::Primary);
        assert_eq!(rt.animation(), Some(AnimationName::Walk));
        rt.pointer_move(PET_CENTER + Vec2::new(3.0, -5.0));
        rt.pointer_up(PET_CENTER + Vec2::new(3.0, -5.0));

        assert!(!rt.is_timer_pending(TimerKind::DragSettle));
        rt.advance_to(1_299);
        assert_eq!(rt.animation(), Some(AnimationName::Walk));
        rt.advance_to(1_300);
        assert_eq!(rt.animation(), Some(AnimationName::Jump));
        assert_eq!(rt.transitions().count_to(AnimationName::Jump), 1);
        assert_eq!(rt.effects().unwrap().count_kind(EffectKind::Bounce), 1);
        rt.advance_to(1_900);
        assert_eq!(rt.effects().unwrap().count_kind(EffectKind::Bounce), 0);
    }

    #[test]
    fn real_drag_suppresses_click_and_settles_to_idle() {
        let (mut rt, store) = runtime();
        rt.enable().unwrap();
        rt.advance_to(1_000);
        rt.pointer_down(PET_CENTER, PointerButton::Primary);
        rt.pointer_move(Vec2::new(200.0, 180.0));
        assert!(rt.is_dragging());
        assert!(rt.surface().is_dragging());
        rt.pointer_up(Vec2::new(200.0, 180.0));

        assert!(!rt.surface().is_dragging());
        assert_eq!(store.snapshot().position, Position { x: 168.0, y: 148.0 });
        rt.advance_to(1_099);
        assert_eq!(rt.animation(), Some(AnimationName::Walk));
        rt.advance_to(1_100);
        assert_eq!(rt.animation(), Some(AnimationName::Idle));
        rt.advance_to(2_000);
        assert_eq!(rt.transitions().count_to(AnimationName::Jump), 0);
    }

    #[test]
    fn drag_movement_cancels_an_earlier_pending_click() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        click(&mut rt, 1_000);
        assert!(rt.is_timer_pending(TimerKind::ClickDebounce));
        rt.advance_to(1_100);
        rt.pointer_down(PET_CENTER, PointerButton::Primary);
        rt.pointer_move(PET_CENTER + Vec2::new(0.0, 40.0));
        assert!(!rt.is_timer_pending(TimerKind::ClickDebounce));
        rt.pointer_up(PET_CENTER + Vec2::new(0.0, 40.0));
        rt.advance_to(3_000);
        assert_eq!(rt.transitions().count_to(AnimationName::Jump), 0);
        assert_eq!(rt.transitions().count_to(AnimationName::Happy), 0);
    }

    #[test]
    fn non_moving_press_keeps_walk_until_click_resolves() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.advance_to(1_000);
        rt.pointer_down(PET_CENTER, PointerButton::Primary);
        rt.advance_to(1_050);
        rt.pointer_up(PET_CENTER);
        rt.advance_to(1_200);
        // no drag-settle return to idle after a still press
        assert_eq!(rt.animation(), Some(AnimationName::Walk));
    }

    #[test]
    fn single_click_jumps_after_quiet_window() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        click(&mut rt, 1_000);
        rt.advance_to(1_299);
        assert_eq!(rt.transitions().count_to(AnimationName::Jump), 0);
        rt.advance_to(1_300);
        assert_eq!(rt.transitions().count_to(AnimationName::Jump), 1);
        rt.advance_to(4_000);
        assert_eq!(rt.transitions().count_to(AnimationName::Jump), 1);
    }

    #[test]
    fn double_click_is_happy_not_jump() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        click(&mut rt, 1_000);
        click(&mut rt, 1_200);
        assert_eq!(rt.animation(), Some(AnimationName::Happy));
        rt.advance_to(2_000);
        assert_eq!(rt.transitions().count_to(AnimationName::Happy), 1);
        assert_eq!(rt.transitions().count_to(AnimationName::Jump), 0);
    }

    #[test]
    fn idle_then_sleep_after_inactivity() {
        let (mut rt, _) = quiet_runtime();
        rt.enable().unwrap();
        rt.advance_to(1_234);
        rt.pointer_enter();
        assert_eq!(rt.animation(), Some(AnimationName::Curious));

        rt.advance_to(6_233);
        assert_eq!(rt.animation(), Some(AnimationName::Curious));
        rt.advance_to(6_234);
        assert_eq!(rt.animation(), Some(AnimationName::Idle));
        rt.advance_to(61_233);
        assert_eq!(rt.animation(), Some(AnimationName::Idle));
        rt.advance_to(61_234);
        assert_eq!(rt.animation(), Some(AnimationName::Sleep));
    }

    #[test]
    fn sleep_lands_on_an_ambient_tick() {
        // the default 10s cycle comes due at 60s together with sleep onset
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.advance_to(60_000);

        assert_eq!(rt.animation(), Some(AnimationName::Sleep));
        assert!(rt.is_timer_pending(TimerKind::SleepEffectRepeat));
        let last = *rt.transitions().last().unwrap();
        assert_eq!((last.at, last.trigger), (60_000, Trigger::SleepTimeout));

        rt.advance_to(63_000);
        assert_eq!(sleep_z_shown(&rt), 1);
        rt.advance_to(300_000);
        assert_eq!(rt.transitions().count_to(AnimationName::Sleep), 1);
    }

    #[test]
    fn idle_timeout_lands_on_an_ambient_tick() {
        let settings = Settings {
            interval: 5,
            ..Settings::default()
        };
        let (mut rt, _) = runtime_with(settings, Registry::builtin());
        rt.enable().unwrap();
        rt.trigger_animation("eat").unwrap();
        rt.advance_to(5_000);
        assert_eq!(rt.animation(), Some(AnimationName::Idle));
        assert!(rt
            .transitions()
            .iter()
            .any(|t| t.at == 5_000 && t.trigger == Trigger::Ambient));
    }

    #[test]
    fn idle_timeout_waits_while_dragging() {
        let (mut rt, _) = quiet_runtime();
        rt.enable().unwrap();
        rt.advance_to(1_000);
        rt.pointer_down(PET_CENTER, PointerButton::Primary);
        rt.pointer_move(PET_CENTER + Vec2::new(50.0, 0.0));
        rt.advance_to(70_000);
        assert_eq!(rt.animation(), Some(AnimationName::Walk));

        rt.pointer_up(PET_CENTER + Vec2::new(50.0, 0.0));
        rt.advance_to(70_100);
        assert_eq!(rt.animation(), Some(AnimationName::Idle));
        rt.advance_to(130_100);
        assert_eq!(rt.animation(), Some(AnimationName::Sleep));
    }

    #[test]
    fn sleep_effect_repeats_then_stops_after_interaction() {
        let (mut rt, _) = quiet_runtime();
        rt.enable().unwrap();
        rt.advance_to(1_234);
        rt.pointer_enter();
        rt.advance_to(61_234);
        assert!(rt.is_timer_pending(TimerKind::SleepEffectRepeat));

        rt.advance_to(67_234);
        assert_eq!(sleep_z_shown(&rt), 2);

        rt.advance_to(68_000);
        rt.pointer_enter();
        rt.advance_to(70_234);
        assert!(!rt.is_timer_pending(TimerKind::SleepEffectRepeat));
        rt.advance_to(90_000);
        assert_eq!(sleep_z_shown(&rt), 2);
    }

    #[test]
    fn unknown_animation_is_rejected() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.trigger_animation("eat").unwrap();
        let before = rt.transitions().len();

        let err = rt.trigger_animation("nonexistent").unwrap_err();
        assert!(matches!(err, PetError::UnknownAnimation(_)));
        assert_eq!(rt.animation(), Some(AnimationName::Eat));
        assert_eq!(rt.transitions().len(), before);
    }

    #[test]
    fn unregistered_animation_keeps_current() {
        let registry = Registry::from_defs([
            AnimationDef::new(AnimationName::Idle, 4, 0.8),
            AnimationDef::new(AnimationName::Walk, 6, 0.6),
        ])
        .unwrap();
        let (mut rt, _) = runtime_with(Settings::default(), registry);
        rt.enable().unwrap();
        rt.pointer_enter();
        assert_eq!(rt.animation(), Some(AnimationName::Idle));
        assert!(matches!(
            rt.trigger_animation("curious"),
            Err(PetError::MissingAnimation(AnimationName::Curious))
        ));
    }

    #[test]
    fn trigger_supersedes_pending_click() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        click(&mut rt, 1_000);
        rt.advance_to(1_100);
        rt.trigger_animation("eat").unwrap();
        rt.advance_to(1_500);
        assert_eq!(rt.animation(), Some(AnimationName::Eat));
        assert_eq!(rt.transitions().count_to(AnimationName::Jump), 0);
        // ambient phase restarted from the command
        assert_eq!(
            rt.pet.as_ref().unwrap().timers.due(TimerKind::AmbientCycle),
            Some(11_100)
        );
    }

    #[test]
    fn hover_exit_only_reverts_curious() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.pointer_enter();
        rt.pointer_leave();
        assert_eq!(rt.animation(), Some(AnimationName::Idle));

        rt.pointer_enter();
        rt.trigger_animation("happy").unwrap();
        rt.pointer_leave();
        assert_eq!(rt.animation(), Some(AnimationName::Happy));
    }

    #[test]
    fn long_press_pets_with_hearts_and_no_click() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.advance_to(1_000);
        rt.pointer_down(PET_CENTER, PointerButton::Primary);
        rt.advance_to(2_000);
        assert_eq!(rt.animation(), Some(AnimationName::Pet));
        assert_eq!(rt.effects().unwrap().count_kind(EffectKind::Heart), 3);

        rt.advance_to(2_100);
        rt.pointer_up(PET_CENTER);
        rt.advance_to(2_500);
        assert_eq!(rt.transitions().count_to(AnimationName::Jump), 0);
        assert_eq!(rt.animation(), Some(AnimationName::Pet));
    }

    #[test]
    fn long_press_cancelled_by_movement_or_release() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.advance_to(1_000);
        rt.pointer_down(PET_CENTER, PointerButton::Primary);
        rt.advance_to(1_500);
        rt.pointer_move(PET_CENTER + Vec2::new(20.0, 0.0));
        assert!(!rt.is_timer_pending(TimerKind::LongPress));
        rt.pointer_up(PET_CENTER + Vec2::new(20.0, 0.0));

        rt.advance_to(3_000);
        rt.pointer_down(Vec2::new(170.0, 150.0), PointerButton::Primary);
        rt.advance_to(3_500);
        rt.pointer_up(Vec2::new(170.0, 150.0));
        rt.advance_to(5_000);
        assert_eq!(rt.transitions().count_to(AnimationName::Pet), 0);
        // the short press was a click
        assert_eq!(rt.transitions().count_to(AnimationName::Jump), 1);
    }

    #[test]
    fn leaving_the_pet_cancels_long_press() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.pointer_down(PET_CENTER, PointerButton::Primary);
        rt.pointer_leave();
        assert!(!rt.is_timer_pending(TimerKind::LongPress));
        rt.advance_to(2_000);
        assert_eq!(rt.transitions().count_to(AnimationName::Pet), 0);
    }

    #[test]
    fn press_outside_the_pet_is_ignored() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.pointer_down(Vec2::new(10.0, 10.0), PointerButton::Primary);
        assert!(!rt.is_dragging());
        rt.pointer_down(PET_CENTER, PointerButton::Secondary);
        assert!(!rt.is_dragging());
    }

    #[test]
    fn reset_position_round_trip() {
        let (mut rt, store) = runtime();
        rt.enable().unwrap();
        rt.pointer_down(PET_CENTER, PointerButton::Primary);
        rt.pointer_move(Vec2::new(600.0, 400.0));
        rt.pointer_up(Vec2::new(600.0, 400.0));
        assert_ne!(store.snapshot().position, DEFAULT_POSITION);

        rt.reset_position();
        assert_eq!(store.get().unwrap().position, Position { x: 100.0, y: 100.0 });
        assert_eq!(rt.surface().position(), Vec2::new(100.0, 100.0));
    }

    #[test]
    fn reset_without_pet_still_persists() {
        let settings = Settings {
            position: Position { x: 700.0, y: 10.0 },
            ..Settings::default()
        };
        let (mut rt, store) = runtime_with(settings, Registry::builtin());
        rt.reset_position();
        assert_eq!(store.snapshot().position, DEFAULT_POSITION);
        assert!(!rt.is_enabled());
    }

    #[test]
    fn interval_change_reschedules_ambient() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.advance_to(6_000);
        rt.update_setting(Setting::IntervalMs(3_000)).unwrap();
        rt.advance_to(13_000);

        let ambient: Vec<u64> = rt
            .transitions()
            .iter()
            .filter(|t| t.trigger == Trigger::Ambient)
            .map(|t| t.at)
            .collect();
        assert_eq!(ambient, vec![9_000, 12_000]);
        assert_eq!(rt.settings().interval, 3);
    }

    #[test]
    fn non_positive_interval_is_rejected() {
        let (mut rt, store) = runtime();
        rt.enable().unwrap();
        assert!(matches!(
            rt.update_setting(Setting::IntervalMs(0)),
            Err(PetError::InvalidSetting { key: "interval", .. })
        ));
        assert_eq!(store.snapshot().interval, 10);
    }

    #[test]
    fn size_rescales_live_pet_and_clamps() {
        let (mut rt, store) = runtime();
        rt.enable().unwrap();
        rt.update_setting(Setting::Size(150)).unwrap();
        assert_eq!(rt.surface().scale(), 1.5);
        assert_eq!(store.snapshot().size, 150);

        rt.update_setting(Setting::Size(1_000)).unwrap();
        assert_eq!(rt.surface().scale(), 3.0);
        assert_eq!(store.snapshot().size, 300);
        assert!(rt.is_enabled());
    }

    #[test]
    fn growing_near_the_edge_stays_on_screen() {
        let settings = Settings {
            position: Position { x: 1200.0, y: 650.0 },
            ..Settings::default()
        };
        let (mut rt, _) = runtime_with(settings, Registry::builtin());
        rt.enable().unwrap();
        assert_eq!(rt.position(), Some(Vec2::new(1200.0, 650.0)));

        rt.update_setting(Setting::Size(300)).unwrap();
        assert_eq!(rt.position(), Some(Vec2::new(1088.0, 528.0)));
        assert_eq!(rt.surface().position(), Vec2::new(1088.0, 528.0));
    }

    #[test]
    fn speed_and_sound_only_persist() {
        let (mut rt, store) = runtime();
        rt.enable().unwrap();
        let ops = rt.surface().ops().len();
        rt.update_setting(Setting::Speed(8)).unwrap();
        rt.update_setting(Setting::Sound(false)).unwrap();
        assert_eq!(rt.surface().ops().len(), ops);
        assert_eq!(store.snapshot().speed, 8);
        assert!(!store.snapshot().sound_enabled);
    }

    #[test]
    fn simultaneous_timers_resolve_by_priority() {
        let settings = Settings {
            interval: 1,
            ..Settings::default()
        };
        let (mut rt, _) = runtime_with(settings, Registry::builtin());
        rt.enable().unwrap();
        click(&mut rt, 700);
        rt.advance_to(1_000);

        let last = *rt.transitions().last().unwrap();
        assert_eq!(last.at, 1_000);
        assert_eq!(last.trigger, Trigger::Click);
        assert_eq!(last.to, AnimationName::Jump);
        assert!(!rt
            .transitions()
            .iter()
            .any(|t| t.at == 1_000 && t.trigger == Trigger::Ambient));
    }

    #[test]
    fn persistence_failure_keeps_memory_authoritative() {
        let (mut rt, store) = runtime();
        rt.enable().unwrap();
        store.set_failing(true);
        rt.pointer_down(PET_CENTER, PointerButton::Primary);
        rt.pointer_move(Vec2::new(332.0, 232.0));
        rt.pointer_up(Vec2::new(332.0, 232.0));

        assert_eq!(rt.position(), Some(Vec2::new(300.0, 200.0)));
        assert_eq!(store.snapshot().position, DEFAULT_POSITION);

        store.set_failing(false);
        rt.update_setting(Setting::Speed(2)).unwrap();
        let saved = store.snapshot();
        assert_eq!(saved.position, Position { x: 300.0, y: 200.0 });
        assert_eq!(saved.speed, 2);
    }

    #[test]
    fn commands_before_boot_see_a_disabled_pet() {
        let (mut rt, _) = runtime();
        assert!(rt.trigger_animation("jump").is_ok());
        assert_eq!(rt.animation(), None);
        assert_eq!(rt.active_timer_count(), 0);
        assert!(rt.handle_command(&Command::Ping).is_ok());
    }

    #[test]
    fn boot_restores_enabled_pet_on_screen() {
        let settings = Settings {
            enabled: true,
            position: Position { x: 5_000.0, y: 5_000.0 },
            ..Settings::default()
        };
        let (mut rt, _) = runtime_with(settings, Registry::builtin());
        rt.boot().unwrap();
        assert_eq!(rt.position(), Some(Vec2::new(1_216.0, 656.0)));
    }

    #[test]
    fn boot_survives_unreadable_store() {
        let (mut rt, store) = runtime();
        store.set_failing(true);
        rt.boot().unwrap();
        assert!(!rt.is_enabled());
        assert_eq!(*rt.settings(), Settings::default());
    }

    #[test]
    fn context_menu_actions() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.context_menu(PET_CENTER);
        assert!(rt.surface().menu().is_some());

        rt.select_menu_item(MenuItem::Animation(AnimationName::Eat))
            .unwrap();
        assert_eq!(rt.animation(), Some(AnimationName::Eat));
        assert!(rt.surface().menu().is_none());

        rt.pointer_down(PET_CENTER, PointerButton::Primary);
        rt.pointer_move(Vec2::new(500.0, 500.0));
        rt.pointer_up(Vec2::new(500.0, 500.0));
        rt.context_menu(Vec2::new(500.0, 500.0));
        rt.select_menu_item(MenuItem::ResetPosition).unwrap();
        assert_eq!(rt.position(), Some(Vec2::new(100.0, 100.0)));
    }

    #[test]
    fn clicking_elsewhere_closes_the_menu() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.context_menu(PET_CENTER);
        rt.pointer_down(Vec2::new(900.0, 600.0), PointerButton::Primary);
        assert!(rt.surface().menu().is_none());
        assert!(rt.select_menu_item(MenuItem::ResetPosition).is_ok());
    }

    #[test]
    fn unload_flushes_like_disable() {
        let (mut rt, store) = runtime();
        rt.enable().unwrap();
        rt.pointer_down(PET_CENTER, PointerButton::Primary);
        rt.pointer_move(Vec2::new(250.0, 250.0));
        rt.unload();
        assert_eq!(store.snapshot().position, Position { x: 218.0, y: 218.0 });
        assert_eq!(rt.active_timer_count(), 0);
    }

    #[test]
    fn shrinking_viewport_pulls_pet_back() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.surface_mut().resize(120.0, 90.0);
        rt.viewport_changed();
        assert_eq!(rt.position(), Some(Vec2::new(56.0, 26.0)));
    }

    #[test]
    fn view_reports_current_frame() {
        let (mut rt, _) = runtime();
        rt.enable().unwrap();
        rt.advance_to(450);
        let view = rt.view().unwrap();
        assert_eq!(view.animation, AnimationName::Idle);
        assert_eq!(view.frame, 2);
        assert_eq!(rt.next_deadline(), Some(5_000));
    }
}
