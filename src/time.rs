/// Monotonic millisecond timestamp. Wraps around after ~49 days, so always compare with
/// [`Millis::since`] or [`Millis::has_reached`] instead of `<`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Millis(pub u32);

impl Millis {
    /// Milliseconds elapsed from `earlier` to `self`.
    pub fn since(self, earlier: Millis) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    pub fn add(self, ms: u32) -> Millis {
        Millis(self.0.wrapping_add(ms))
    }

    /// True once `self` is at or past `deadline`. Only valid while the two are less than half
    /// the wrap period apart.
    pub fn has_reached(self, deadline: Millis) -> bool {
        (self.0.wrapping_sub(deadline.0) as i32) >= 0
    }
}

/// Turns raw cycle counter deltas into a millisecond clock, carrying the sub-millisecond
/// remainder over to the next call.
pub struct MonotonicMs {
    cycles_per_ms: u32,
    rem: u32,
    now: Millis,
}

impl MonotonicMs {
    /// `cycles_per_ms` must be non-zero.
    pub const fn new(cycles_per_ms: u32) -> Self {
        debug_assert!(cycles_per_ms > 0);

        MonotonicMs {
            cycles_per_ms,
            rem: 0,
            now: Millis(0),
        }
    }

    pub fn advance(&mut self, cycles: u32) -> Millis {
        let total = self.rem as u64 + cycles as u64;
        let per = self.cycles_per_ms as u64;

        self.now = self.now.add((total / per) as u32);
        self.rem = (total % per) as u32;

        self.now
    }

    pub fn now(&self) -> Millis {
        self.now
    }
}
