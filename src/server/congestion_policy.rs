use std::time::Duration;

/// Simulated backpressure: a fixed delay on the send path for every packet to a peer whose
///  sequence number (at send time) is a multiple of `interval`, including 0. There is no RTT
///  or loss estimation.
#[derive(Debug, Clone, Copy)]
pub struct CongestionPolicy {
    pub enabled: bool,
    pub interval: u64,
    pub delay: Duration,
}

impl CongestionPolicy {
    pub fn delay_for(&self, sequence: u64) -> Option<Duration> {
        if self.enabled && sequence % self.interval == 0 {
            Some(self.delay)
        }
        else {
            None
        }
    }
}
