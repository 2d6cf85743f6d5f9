use bytes::Bytes;
use std::net::SocketAddr;
use crate::csv_log::{CsvLog, ServerJitterRecord};
use crate::server::payload_history::PayloadHistory;

/// Server-side state for one peer. It is created on the first datagram from a previously
///  unknown endpoint and lives as long as the server: there is no timeout or removal.
pub struct Session {
    endpoint: SocketAddr,
    /// number of datagrams received from this peer so far. This is the sole key into `history`
    ///  and only ever moves forward by exactly one.
    sequence: u64,
    history: PayloadHistory,
    jitter_log: CsvLog<ServerJitterRecord>,
}

impl Session {
    pub fn new(endpoint: SocketAddr, history_capacity: usize, jitter_log: CsvLog<ServerJitterRecord>) -> Session {
        Session {
            endpoint,
            sequence: 0,
            history: PayloadHistory::new(history_capacity),
            jitter_log,
        }
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn history(&self) -> &PayloadHistory {
        &self.history
    }

    pub fn jitter_log(&self) -> &CsvLog<ServerJitterRecord> {
        &self.jitter_log
    }

    pub fn log_jitter(&mut self, record: &ServerJitterRecord) {
        self.jitter_log.append(record);
    }

    /// stores a payload under the current sequence number
    pub fn store_payload(&mut self, payload: Bytes) {
        self.history.store(self.sequence, payload);
    }

    pub fn advance(&mut self) {
        self.sequence += 1;
    }
}
