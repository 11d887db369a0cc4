use super::animation::AnimationName;
use super::rules::Trigger;

/// How many transitions the log keeps.
pub const HISTORY_LEN: usize = 64;

/// One applied animation switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub at: u64,
    pub from: Option<AnimationName>,
    pub to: AnimationName,
    pub trigger: Trigger,
}

/// Fixed-capacity log of recent transitions, oldest first. Overwrites the oldest when full.
pub struct TransitionLog {
    buf: Vec<Transition>,
    capacity: usize,
    head: usize,
}

impl TransitionLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    pub fn push(&mut self, t: Transition) {
        if self.buf.len() < self.capacity {
            self.buf.push(t);
        } else {
            self.buf[self.head] = t;
        }
        self.head = (self.head + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        let start = if self.buf.len() < self.capacity {
            0
        } else {
            self.head
        };
        let len = self.buf.len();
        (0..len).map(move |i| &self.buf[(start + i) % len])
    }

    pub fn last(&self) -> Option<&Transition> {
        self.iter().last()
    }

    /// Transitions into `to`.
    pub fn count_to(&self, to: AnimationName) -> usize {
        self.iter().filter(|t| t.to == to).count()
    }
}

impl Default for TransitionLog {
    fn default() -> Self {
        Self::new(HISTORY_LEN)
    }
}
