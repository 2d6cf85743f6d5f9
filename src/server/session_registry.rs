use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::info;
use crate::csv_log::CsvLog;
use crate::peer_key::PeerKey;
use crate::server::session::Session;

/// The single authority for peer lifecycle on the server side.
///
/// All access goes through closures that run while the registry's lock is held, so callers never
///  keep a reference to a [Session] across a suspension point. A closure passed to
///  [SessionRegistry::get_or_create] sees a consistent view of that peer's sequence and history:
///  two datagrams from the same peer can never interleave their updates, even if datagrams are
///  processed concurrently.
pub struct SessionRegistry {
    sessions: Mutex<FxHashMap<PeerKey, Session>>,
    history_capacity: usize,
    log_dir: Option<PathBuf>,
}

impl SessionRegistry {
    pub fn new(history_capacity: usize, log_dir: Option<PathBuf>) -> SessionRegistry {
        SessionRegistry {
            sessions: Default::default(),
            history_capacity,
            log_dir,
        }
    }

    /// Runs `f` on the session for `endpoint`, creating the session first if this is the first
    ///  contact from that endpoint.
    pub async fn get_or_create<T, F>(&self, endpoint: SocketAddr, f: F) -> T
    where F: FnOnce(&mut Session) -> T + Send,
    {
        let mut sessions = self.sessions.lock().await;

        let session = match sessions.entry(PeerKey::from(endpoint)) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let jitter_log = CsvLog::create_in_dir_or_disabled(
                    self.log_dir.as_deref(),
                    &PeerKey::jitter_log_file_name(endpoint),
                );
                info!("new client connected: {}", e.key());
                e.insert(Session::new(endpoint, self.history_capacity, jitter_log))
            }
        };

        f(session)
    }

    /// the peer's current sequence number, or `None` for an unknown peer
    pub async fn sequence_of(&self, key: &PeerKey) -> Option<u64> {
        self.sessions.lock().await
            .get(key)
            .map(|s| s.sequence())
    }

    pub async fn for_each(&self, mut visitor: impl FnMut(&PeerKey, &Session) + Send) {
        let sessions = self.sessions.lock().await;
        for (key, session) in sessions.iter() {
            visitor(key, session);
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use crate::csv_log::test_support::{fresh_log_dir, read_lines};
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn test_lazy_creation() {
        let registry = SessionRegistry::new(8, None);
        assert!(registry.is_empty().await);
        assert_eq!(registry.sequence_of(&PeerKey::from(addr(1000))).await, None);

        let seq = registry.get_or_create(addr(1000), |s| s.sequence()).await;
        assert_eq!(seq, 0);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.sequence_of(&PeerKey::from(addr(1000))).await, Some(0));

        registry.get_or_create(addr(1000), |s| s.advance()).await;
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.sequence_of(&PeerKey::from(addr(1000))).await, Some(1));
    }

    #[tokio::test]
    async fn test_peers_are_independent() {
        let registry = SessionRegistry::new(8, None);

        for _ in 0..3 {
            registry.get_or_create(addr(1000), |s| s.advance()).await;
        }
        registry.get_or_create(addr(1001), |s| s.advance()).await;

        assert_eq!(registry.sequence_of(&PeerKey::from(addr(1000))).await, Some(3));
        assert_eq!(registry.sequence_of(&PeerKey::from(addr(1001))).await, Some(1));

        let mut visited = Vec::new();
        registry.for_each(|key, session| visited.push((key.to_string(), session.sequence()))).await;
        visited.sort();
        assert_eq!(visited, vec![("127.0.0.1:1000".to_string(), 3), ("127.0.0.1:1001".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_session_log_is_opened_on_first_contact() {
        let dir = fresh_log_dir();
        let registry = SessionRegistry::new(8, Some(dir.clone()));

        let enabled = registry.get_or_create(addr(4321), |s| s.jitter_log().is_enabled()).await;
        assert!(enabled);
        assert_eq!(read_lines(dir.join("jitter_127.0.0.1_4321.csv")), vec!["timestamp,packet_id,jitter_ms,delay_ms"]);
    }
}
