use std::fmt::{Debug, Display, Formatter};
use std::net::SocketAddr;

/// Identity of a peer as seen by the server: its UDP endpoint rendered as `ip:port`.
///
/// NB: There is no identity beyond the endpoint - if a client re-binds to a different port, it
///      is a new peer with fresh session state
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PeerKey(String);

impl PeerKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// file name of the per-peer jitter log, e.g. `jitter_127.0.0.1_50123.csv`
    pub fn jitter_log_file_name(addr: SocketAddr) -> String {
        format!("jitter_{}_{}.csv", addr.ip(), addr.port())
    }
}

impl From<SocketAddr> for PeerKey {
    fn from(addr: SocketAddr) -> Self {
        PeerKey(format!("{}:{}", addr.ip(), addr.port()))
    }
}

impl Display for PeerKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for PeerKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv6Addr, SocketAddrV6};
    use super::*;

    #[test]
    fn test_v4() {
        let addr = SocketAddr::from(([127, 0, 0, 1], 50123));
        assert_eq!(PeerKey::from(addr).as_str(), "127.0.0.1:50123");
        assert_eq!(PeerKey::jitter_log_file_name(addr), "jitter_127.0.0.1_50123.csv");
    }

    #[test]
    fn test_v6_has_no_brackets() {
        let addr = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 9000, 0, 0));
        assert_eq!(PeerKey::from(addr).as_str(), "::1:9000");
    }

    #[test]
    fn test_port_change_is_new_peer() {
        let a = PeerKey::from(SocketAddr::from(([10, 0, 0, 1], 1000)));
        let b = PeerKey::from(SocketAddr::from(([10, 0, 0, 1], 1001)));
        assert_ne!(a, b);
    }
}
