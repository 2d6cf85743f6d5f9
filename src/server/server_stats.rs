use std::sync::atomic::{AtomicU64, Ordering};

/// Server-wide packet counter across all peers, driving the periodic snapshot
pub struct ServerStats {
    total_packets_observed: AtomicU64,
    snapshot_interval: u64,
}

impl ServerStats {
    pub fn new(snapshot_interval: u64) -> ServerStats {
        ServerStats {
            total_packets_observed: AtomicU64::new(0),
            snapshot_interval,
        }
    }

    /// Counts one datagram. Returns the new total if it is due for a snapshot.
    pub fn observe(&self) -> Option<u64> {
        let total = self.total_packets_observed.fetch_add(1, Ordering::AcqRel) + 1;
        if total % self.snapshot_interval == 0 {
            Some(total)
        }
        else {
            None
        }
    }

    pub fn total_packets_observed(&self) -> u64 {
        self.total_packets_observed.load(Ordering::Acquire)
    }
}
