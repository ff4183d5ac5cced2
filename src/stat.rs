/// Stats is used to store the packet loss counters of a whole run.
/// It is owned by the probe loop and only mutated between probes.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Stats {
    /// The number of echo requests attempted.
    pub total: u64,
    /// The number of echo requests that timed out.
    pub lost: u64,
}

impl Stats {
    /// Create empty counters.
    pub fn new() -> Self {
        Stats::default()
    }

    /// Count one probe attempt, whatever its outcome.
    pub fn record_attempt(&mut self) {
        self.total += 1;
    }

    /// Count one timed out probe.
    pub fn record_loss(&mut self) {
        self.lost += 1;
        debug_assert!(self.lost <= self.total);
    }

    /// Loss rate in percent, rounded up. 0 before any attempt.
    pub fn loss_percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }

        let rate = (self.lost as f64) / (self.total as f64);
        (rate * 100.0).ceil() as u32
    }
}
