//! Simulation of a real-time media transport over UDP.
//!
//! The server side acknowledges every datagram, simulates network jitter, replays older
//!  payloads as forward error correction (FEC) packets and delays packets to simulate
//!  congestion. The client side sends framed messages and runs received datagrams through a
//!  jitter buffer with a simulated processing cost. Both sides write CSV logs for offline
//!  analysis.

pub mod client;
pub mod config;
pub mod csv_log;
pub mod error;
pub mod packet_framer;
pub mod peer_key;
pub mod send_socket;
pub mod server;
pub mod util;
