/// Double-click window in milliseconds.
pub const DOUBLE_CLICK_WINDOW_MS: u64 = 300;

/// What a click on the pet turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// First click of a possible pair. Resolve as single once the window closes quietly.
    Pending,
    /// Second click inside the window. The pending single click is void.
    Double,
}

/// Single vs double click discrimination for the pet.
///
/// The quiet-window timer lives with the pet's other timers; this only tracks whether a
/// first click is still waiting.
#[derive(Debug, Default, Clone)]
pub struct ClickState {
    pending_since: Option<u64>,
}

impl ClickState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a click at `now`.
    pub fn register(&mut self, now: u64) -> ClickOutcome {
        match self.pending_since {
            Some(first) if now.saturating_sub(first) < DOUBLE_CLICK_WINDOW_MS => {
                self.pending_since = None;
                ClickOutcome::Double
            }
            _ => {
                self.pending_since = Some(now);
                ClickOutcome::Pending
            }
        }
    }

    /// The quiet window elapsed. True if a single click was waiting.
    pub fn resolve_single(&mut self) -> bool {
        self.pending_since.take().is_some()
    }

    pub fn reset(&mut self) {
        self.pending_since = None;
    }
}
