pub mod congestion_policy;
pub mod fec_policy;
pub mod payload_history;
pub mod server_engine;
pub mod server_stats;
pub mod session;
pub mod session_registry;
