use chrono::Utc;

/// Unix-second timestamps that never go backwards within one process,
/// even if the wall clock is adjusted.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: i64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&mut self) -> i64 {
        self.observe(Utc::now().timestamp())
    }

    fn observe(&mut self, wall: i64) -> i64 {
        self.last = self.last.max(wall);
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_never_goes_backwards() {
        let mut clock = MonotonicClock::new();
        assert_eq!(clock.observe(100), 100);
        assert_eq!(clock.observe(90), 100);
        assert_eq!(clock.observe(101), 101);
    }

    #[test]
    fn test_now_is_current() {
        let mut clock = MonotonicClock::new();
        let before = Utc::now().timestamp();
        let t = clock.now();
        assert!(t >= before);
    }
}
