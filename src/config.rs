use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use crate::error::ConstructionError;

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,

    pub fec_enabled: bool,
    pub congestion_enabled: bool,

    /// directory for `server_stats.csv` and the per-peer jitter logs. `None` disables persisted
    ///  logs altogether.
    pub log_dir: Option<PathBuf>,

    /// datagrams longer than this are truncated on receive
    pub max_datagram_size: usize,
    /// upper bound (inclusive) of the uniformly distributed simulated jitter
    pub max_jitter: Duration,

    /// a recovery packet is emitted for every positive multiple of this sequence number
    pub fec_interval: u64,
    /// distance between the triggering sequence number and the replayed one
    pub fec_lookback: u64,

    /// outbound packets to a peer whose sequence number is a multiple of this are delayed
    pub congestion_interval: u64,
    pub congestion_delay: Duration,
    /// added to the jitter for the informational `delay_ms` column on every
    ///  `congestion_interval`th packet. This is never slept.
    pub logged_delay_penalty: Duration,

    /// number of payloads retained per peer. Must exceed `fec_lookback`.
    pub history_capacity: usize,

    /// a server-wide snapshot is logged every this many datagrams across all peers
    pub stats_interval: u64,
}

impl ServerConfig {
    pub fn new(port: u16) -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            fec_enabled: true,
            congestion_enabled: true,
            log_dir: Some(PathBuf::from(".")),
            max_datagram_size: 1024,
            max_jitter: Duration::from_millis(100),
            fec_interval: 4,
            fec_lookback: 3,
            congestion_interval: 5,
            congestion_delay: Duration::from_millis(200),
            logged_delay_penalty: Duration::from_millis(200),
            history_capacity: 8,
            stats_interval: 10,
        }
    }

    pub fn validate(&self) -> Result<(), ConstructionError> {
        if self.max_datagram_size == 0 {
            return Err(ConstructionError::InvalidConfig("max datagram size must be positive".to_string()));
        }
        if self.fec_interval == 0 || self.congestion_interval == 0 || self.stats_interval == 0 {
            return Err(ConstructionError::InvalidConfig("FEC, congestion and stats intervals must be positive".to_string()));
        }
        if self.fec_lookback == 0 {
            return Err(ConstructionError::InvalidConfig("FEC lookback must be positive".to_string()));
        }
        if (self.history_capacity as u64) <= self.fec_lookback {
            return Err(ConstructionError::InvalidConfig(format!(
                "history capacity must exceed the FEC lookback of {}, was {}", self.fec_lookback, self.history_capacity)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_host: String,
    pub server_port: u16,
    /// caller supplied label, used in the wire header and the log file name
    pub peer_id: String,

    /// directory for `client_jitter_<peer_id>.csv`. `None` disables the persisted log.
    pub log_dir: Option<PathBuf>,

    pub max_datagram_size: usize,

    pub processing_base_delay: Duration,
    pub processing_delay_per_packet: Duration,
    /// the oldest buffered payload is released once the buffer holds more than this
    pub release_threshold: usize,

    /// bound for waiting on the receive task after the shutdown signal
    pub shutdown_timeout: Duration,
}

impl ClientConfig {
    pub fn new(server_host: impl Into<String>, server_port: u16, peer_id: impl Into<String>) -> ClientConfig {
        ClientConfig {
            server_host: server_host.into(),
            server_port,
            peer_id: peer_id.into(),
            log_dir: Some(PathBuf::from(".")),
            max_datagram_size: 1024,
            processing_base_delay: Duration::from_millis(10),
            processing_delay_per_packet: Duration::from_millis(5),
            release_threshold: 3,
            shutdown_timeout: Duration::from_secs(1),
        }
    }

    pub fn validate(&self) -> Result<(), ConstructionError> {
        if self.peer_id.is_empty() {
            return Err(ConstructionError::InvalidConfig("peer id must not be empty".to_string()));
        }
        if self.max_datagram_size == 0 {
            return Err(ConstructionError::InvalidConfig("max datagram size must be positive".to_string()));
        }
        Ok(())
    }

    pub fn processing_delay(&self, buffer_depth: usize) -> Duration {
        self.processing_base_delay + self.processing_delay_per_packet * buffer_depth as u32
    }

    pub fn log_file_name(&self) -> String {
        format!("client_jitter_{}.csv", self.peer_id)
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub num_clients: usize,
    /// template for all clients in the pool - the peer id is replaced by `client_<n>`
    pub client: ClientConfig,
    pub fec_enabled: bool,
    pub startup_stagger: Duration,
    pub readiness_timeout: Duration,
}

impl PoolConfig {
    pub fn new(num_clients: usize, client: ClientConfig) -> PoolConfig {
        PoolConfig {
            num_clients,
            client,
            fec_enabled: true,
            startup_stagger: Duration::from_millis(100),
            readiness_timeout: Duration::from_secs(2),
        }
    }

    pub fn client_config(&self, client_num: usize) -> ClientConfig {
        let mut result = self.client.clone();
        result.peer_id = format!("client_{}", client_num);
        result
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use super::*;

    #[test]
    fn test_server_defaults_are_valid() {
        let config = ServerConfig::new(DEFAULT_PORT);
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[rstest]
    #[case::zero_fec_interval(|c: &mut ServerConfig| c.fec_interval = 0)]
    #[case::zero_stats_interval(|c: &mut ServerConfig| c.stats_interval = 0)]
    #[case::zero_lookback(|c: &mut ServerConfig| c.fec_lookback = 0)]
    #[case::history_too_small(|c: &mut ServerConfig| c.history_capacity = 3)]
    #[case::zero_datagram_size(|c: &mut ServerConfig| c.max_datagram_size = 0)]
    fn test_server_invalid(#[case] modify: fn(&mut ServerConfig)) {
        let mut config = ServerConfig::new(DEFAULT_PORT);
        modify(&mut config);
        assert!(matches!(config.validate(), Err(ConstructionError::InvalidConfig(_))));
    }

    #[test]
    fn test_minimal_history_is_valid() {
        let mut config = ServerConfig::new(DEFAULT_PORT);
        config.history_capacity = 4;
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case(0, 10)]
    #[case(1, 15)]
    #[case(3, 25)]
    #[case(4, 30)]
    fn test_processing_delay(#[case] depth: usize, #[case] expected_millis: u64) {
        let config = ClientConfig::new("127.0.0.1", DEFAULT_PORT, "c");
        assert_eq!(config.processing_delay(depth), Duration::from_millis(expected_millis));
    }

    #[test]
    fn test_client_names() {
        let pool = PoolConfig::new(3, ClientConfig::new("127.0.0.1", DEFAULT_PORT, "default"));
        let client = pool.client_config(2);
        assert_eq!(client.peer_id, "client_2");
        assert_eq!(client.log_file_name(), "client_jitter_client_2.csv");
    }

    #[test]
    fn test_empty_peer_id_is_invalid() {
        let config = ClientConfig::new("127.0.0.1", DEFAULT_PORT, "");
        assert!(config.validate().is_err());
    }
}
