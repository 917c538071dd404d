/// Periodic measurement bookkeeping: running flag, interval and the time of the
/// last successful sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Schedule {
    periodic: bool,
    interval: u32,
    latest: Option<u64>,
    updated: bool,
}

impl Schedule {
    pub const fn new() -> Self {
        Schedule {
            periodic: false,
            interval: 0,
            latest: None,
            updated: false,
        }
    }

    pub fn in_periodic(&self) -> bool {
        self.periodic
    }

    /// Milliseconds between samples.
    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Whether the last tick produced a sample.
    pub fn updated(&self) -> bool {
        self.updated
    }

    /// When the last sample was taken.
    pub fn updated_millis(&self) -> Option<u64> {
        self.latest
    }

    /// Enters periodic mode so that the next tick samples right away.
    ///
    /// Returns `false`, changing nothing, if already running.
    pub fn start(&mut self, interval: u32) -> bool {
        if self.periodic {
            return false;
        }
        self.periodic = true;
        self.interval = interval;
        self.latest = None;
        true
    }

    /// Like [`start`](Self::start), but also restarts a running schedule.
    pub fn restart(&mut self, interval: u32) {
        self.periodic = false;
        self.start(interval);
    }

    pub fn stop(&mut self) {
        self.periodic = false;
        self.updated = false;
    }

    /// Starts a tick. Returns whether a sample is due at `now`.
    pub fn tick(&mut self, now: u64, force: bool) -> bool {
        self.updated = false;
        if !self.periodic {
            return false;
        }
        force || self.latest.map_or(true, |at| now >= at + u64::from(self.interval))
    }

    pub fn record(&mut self, now: u64) {
        self.latest = Some(now);
        self.updated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_never_due() {
        let mut s = Schedule::new();
        assert!(!s.tick(0, false));
        assert!(!s.tick(1000, true));
        s.stop();
        assert!(!s.in_periodic());
    }

    #[test]
    fn due_after_interval() {
        let mut s = Schedule::new();
        assert!(s.start(100));
        assert!(!s.start(50));
        assert_eq!(s.interval(), 100);

        assert!(s.tick(5, false));
        s.record(5);
        assert!(s.updated());
        assert_eq!(s.updated_millis(), Some(5));

        assert!(!s.tick(104, false));
        assert!(!s.updated());
        assert!(s.tick(104, true));
        assert!(s.tick(105, false));
    }

    #[test]
    fn restart_resets_latest() {
        let mut s = Schedule::new();
        s.start(10);
        s.record(3);
        s.restart(20);
        assert!(s.in_periodic());
        assert_eq!(s.interval(), 20);
        assert_eq!(s.updated_millis(), None);
        assert!(s.tick(3, false));
    }
}
