/// Every scheduled action the pet can have pending. At most one of each is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TimerKind {
    AmbientCycle = 0,
    IdleReturn = 1,
    SleepOnset = 2,
    SleepEffectRepeat = 3,
    LongPress = 4,
    ClickDebounce = 5,
    DragSettle = 6,
}

impl TimerKind {
    pub const ALL: [TimerKind; 7] = [
        Self::AmbientCycle,
        Self::IdleReturn,
        Self::SleepOnset,
        Self::SleepEffectRepeat,
        Self::LongPress,
        Self::ClickDebounce,
        Self::DragSettle,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::AmbientCycle => "ambient-cycle",
            Self::IdleReturn => "idle-return",
            Self::SleepOnset => "sleep-onset",
            Self::SleepEffectRepeat => "sleep-effect-repeat",
            Self::LongPress => "long-press",
            Self::ClickDebounce => "click-debounce",
            Self::DragSettle => "drag-settle",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    due: u64,
    /// Repeating timers re-arm at `due + period` when they fire.
    period: Option<u64>,
}

/// Named, individually cancellable timers on a millisecond clock.
///
/// Scheduling a kind that is already pending replaces it.
#[derive(Debug, Default)]
pub struct Timers {
    slots: [Option<Slot>; 7],
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire once at `now + delay`.
    pub fn schedule(&mut self, kind: TimerKind, now: u64, delay: u64) {
        self.slots[kind as usize] = Some(Slot {
            due: now + delay,
            period: None,
        });
    }

    /// Fire every `period` ms, first at `now + period`.
    pub fn schedule_repeating(&mut self, kind: TimerKind, now: u64, period: u64) {
        let period = period.max(1);
        self.slots[kind as usize] = Some(Slot {
            due: now + period,
            period: Some(period),
        });
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.slots[kind as usize] = None;
    }

    pub fn cancel_all(&mut self) {
        self.slots = Default::default();
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.slots[kind as usize].is_some()
    }

    pub fn due(&self, kind: TimerKind) -> Option<u64> {
        self.slots[kind as usize].map(|s| s.due)
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Earliest pending deadline.
    pub fn next_due(&self) -> Option<u64> {
        self.slots.iter().flatten().map(|s| s.due).min()
    }

    /// Pop every timer due at the earliest deadline `<= now`.
    ///
    /// One-shot timers are cleared, repeating ones re-armed one period later.
    /// Returns the deadline and the kinds that fired, in declaration order.
    pub fn pop_due(&mut self, now: u64) -> Option<(u64, Vec<TimerKind>)> {
        let at = self.next_due().filter(|&d| d <= now)?;
        let mut fired = Vec::new();
        for kind in TimerKind::ALL {
            let slot = &mut self.slots[kind as usize];
            if let Some(s) = *slot {
                if s.due == at {
                    fired.push(kind);
                    *slot = s.period.map(|p| Slot {
                        due: at + p,
                        period: Some(p),
                    });
                }
            }
        }
        Some((at, fired))
    }
}
