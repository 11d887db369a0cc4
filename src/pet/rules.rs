//! Priority table for competing animation triggers.
//!
//! Every candidate transition goes through [`admits`]; when several candidates arise at the
//! same instant, [`resolve`] keeps the admitted one with the best rank.

use super::animation::AnimationName;

/// What asked for an animation change. Declared from highest to lowest priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Trigger {
    Command,
    DragStart,
    DragSettle,
    HoverEnter,
    HoverExit,
    Click,
    DoubleClick,
    LongPress,
    Ambient,
    IdleTimeout,
    SleepTimeout,
}

impl Trigger {
    /// Lower is stronger.
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Trigger::Command => "command",
            Trigger::DragStart => "drag-start",
            Trigger::DragSettle => "drag-settle",
            Trigger::HoverEnter => "hover-enter",
            Trigger::HoverExit => "hover-exit",
            Trigger::Click => "click",
            Trigger::DoubleClick => "double-click",
            Trigger::LongPress => "long-press",
            Trigger::Ambient => "ambient",
            Trigger::IdleTimeout => "idle-timeout",
            Trigger::SleepTimeout => "sleep-timeout",
        }
    }
}

/// Pet state the guards look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext {
    pub current: AnimationName,
    pub dragging: bool,
    pub moved: bool,
}

/// A proposed switch to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub trigger: Trigger,
    pub target: AnimationName,
}

impl Candidate {
    pub fn new(trigger: Trigger, target: AnimationName) -> Self {
        Self { trigger, target }
    }
}

/// Guard for one candidate. While a drag is in progress only the drag itself, explicit
/// commands and a still long-press may change the animation.
pub fn admits(c: Candidate, ctx: &RuleContext) -> bool {
    match c.trigger {
        Trigger::Command | Trigger::DragStart => true,
        Trigger::LongPress => !ctx.moved,
        Trigger::HoverExit => !ctx.dragging && ctx.current == AnimationName::Curious,
        Trigger::IdleTimeout => !ctx.dragging && ctx.current != AnimationName::Idle,
        Trigger::DragSettle
        | Trigger::HoverEnter
        | Trigger::Click
        | Trigger::DoubleClick
        | Trigger::Ambient
        | Trigger::SleepTimeout => !ctx.dragging,
    }
}

/// Strongest admitted candidate, if any.
pub fn resolve(candidates: &[Candidate], ctx: &RuleContext) -> Option<Candidate> {
    candidates
        .iter()
        .copied()
        .filter(|c| admits(*c, ctx))
        .min_by_key(|c| c.trigger.rank())
}

/// Inactivity timeouts that came due alongside an ambient pick which won.
///
/// They describe how long the pet has been left alone, so they still run after the ambient
/// switch, idle before sleep, and each goes through [`admits`] again at that point.
pub fn deferred(best: Candidate, candidates: &[Candidate]) -> Vec<Candidate> {
    if best.trigger != Trigger::Ambient {
        return Vec::new();
    }
    let mut rest: Vec<Candidate> = candidates
        .iter()
        .copied()
        .filter(|c| matches!(c.trigger, Trigger::IdleTimeout | Trigger::SleepTimeout))
        .collect();
    rest.sort_by_key(|c| c.trigger.rank());
    rest
}
