//! Text framing of datagrams. Message boundaries are datagram boundaries, there is no length
//!  prefix and no binary header.
//!
//! ```ascii
//! client -> server:  [<peer id>|<client sequence>] <payload>
//! server -> client:  Acknowledged
//!                    FEC_PACKET: <recovered payload>
//! ```
//!
//! The bracketed client header is for human consumption only: the server stores and replays
//!  whatever it received verbatim and never parses it back out.

pub const ACKNOWLEDGED: &str = "Acknowledged";
pub const FEC_PREFIX: &str = "FEC_PACKET: ";

/// Sent by a client to the server when it shuts down, to unblock its own pending receive call
///  with the server's acknowledgement.
pub const EXIT_SENTINEL: &str = "EXIT";

pub fn encode(peer_id: &str, sequence: u64, payload: &str) -> String {
    format!("[{}|{}] {}", peer_id, sequence, payload)
}

/// The recovered payload is appended as raw bytes, exactly as the peer originally sent it
pub fn fec_packet(recovered_payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(FEC_PREFIX.len() + recovered_payload.len());
    packet.extend_from_slice(FEC_PREFIX.as_bytes());
    packet.extend_from_slice(recovered_payload);
    packet
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ServerMessage<'a> {
    Acknowledged,
    FecRecovery(&'a str),
    Other(&'a str),
}

impl<'a> ServerMessage<'a> {
    pub fn classify(raw: &'a str) -> ServerMessage<'a> {
        if raw == ACKNOWLEDGED {
            ServerMessage::Acknowledged
        }
        else if let Some(recovered) = raw.strip_prefix(FEC_PREFIX) {
            ServerMessage::FecRecovery(recovered)
        }
        else {
            ServerMessage::Other(raw)
        }
    }
}
