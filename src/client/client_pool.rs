use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use anyhow::anyhow;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};
use crate::client::client_engine::ClientEngine;
use crate::config::PoolConfig;

/// Starts and owns a number of [ClientEngine]s named `client_1` to `client_<n>`, and is the
///  addressing layer for sending to them by number.
///
/// Clients register themselves when their engine is up. Startup is staggered, and the readiness
///  timeout only starts counting once the last client is due to start. A client that takes
///  longer than that is not waited for, but still registers once it is ready.
pub struct ClientPool {
    clients: Arc<RwLock<BTreeMap<usize, Arc<ClientEngine>>>>,
}

impl ClientPool {
    pub async fn start(config: PoolConfig) -> ClientPool {
        let clients: Arc<RwLock<BTreeMap<usize, Arc<ClientEngine>>>> = Default::default();

        let mut startup_tasks = Vec::new();
        for client_num in 1..=config.num_clients {
            startup_tasks.push(Self::spawn_client(&config, client_num, clients.clone()));
        }

        let deadline = time::Instant::now() + Self::last_startup_delay(&config) + config.readiness_timeout;
        for (idx, startup_task) in startup_tasks.into_iter().enumerate() {
            match time::timeout_at(deadline, startup_task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("startup of client_{} panicked: {}", idx + 1, e),
                Err(_) => {
                    warn!("not all clients were ready within {:?}", config.readiness_timeout);
                    break;
                }
            }
        }

        info!("{} of {} clients ready", clients.read().await.len(), config.num_clients);
        ClientPool { clients }
    }

    fn last_startup_delay(config: &PoolConfig) -> Duration {
        config.startup_stagger * config.num_clients.saturating_sub(1) as u32
    }

    fn spawn_client(config: &PoolConfig, client_num: usize, clients: Arc<RwLock<BTreeMap<usize, Arc<ClientEngine>>>>) -> JoinHandle<()> {
        let client_config = config.client_config(client_num);
        let startup_delay = config.startup_stagger * (client_num as u32 - 1);
        let fec_enabled = config.fec_enabled;

        tokio::spawn(async move {
            time::sleep(startup_delay).await;

            match ClientEngine::new(client_config).await {
                Ok(client) => {
                    client.enable_fec(fec_enabled);
                    debug!("client_{} registered", client_num);
                    clients.write().await
                        .insert(client_num, Arc::new(client));
                }
                Err(e) => error!("could not start client_{}: {}", client_num, e),
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// the peer ids of all registered clients, ordered by client number
    pub async fn list(&self) -> Vec<String> {
        self.clients.read().await
            .values()
            .map(|c| c.peer_id().to_string())
            .collect()
    }

    pub async fn get(&self, client_num: usize) -> Option<Arc<ClientEngine>> {
        self.clients.read().await
            .get(&client_num)
            .cloned()
    }

    pub async fn send(&self, client_num: usize, message: &str) -> anyhow::Result<u64> {
        let client = self.get(client_num).await
            .ok_or_else(|| anyhow!("no client with number {}", client_num))?;
        Ok(client.send(message).await?)
    }

    /// Sends `message` from every registered client. A failed send is logged, and does not keep
    ///  the message from going out through the other clients.
    pub async fn broadcast(&self, message: &str) -> usize {
        let clients = self.all().await;

        let mut num_sent = 0;
        for client in clients {
            match client.send(message).await {
                Ok(_) => num_sent += 1,
                Err(e) => warn!("[{}] broadcast failed: {}", client.peer_id(), e),
            }
        }
        num_sent
    }

    pub async fn shutdown(&self) {
        let clients = self.all().await;
        for client in clients {
            client.stop().await;
        }
        info!("all clients stopped");
    }

    /// snapshot of the registered clients, so that the lock is not held across sends
    async fn all(&self) -> Vec<Arc<ClientEngine>> {
        self.clients.read().await
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::net::SocketAddr;
    use tokio::net::UdpSocket;
    use crate::config::ClientConfig;
    use super::*;

    async fn fake_server() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").await.unwrap()
    }

    fn pool_config(server: &UdpSocket, num_clients: usize) -> PoolConfig {
        let mut client = ClientConfig::new("127.0.0.1", server.local_addr().unwrap().port(), "default");
        client.log_dir = None;

        let mut config = PoolConfig::new(num_clients, client);
        config.startup_stagger = Duration::from_millis(10);
        config
    }

    async fn recv_all(socket: &UdpSocket, n: usize) -> Vec<(String, SocketAddr)> {
        let mut result = Vec::new();
        let mut buf = [0u8; 1024];
        for _ in 0..n {
            let (len, from) = time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await
                .expect("timed out waiting for datagram")
                .unwrap();
            result.push((String::from_utf8(buf[..len].to_vec()).unwrap(), from));
        }
        result
    }

    #[tokio::test]
    async fn test_start_and_list() {
        let server = fake_server().await;
        let pool = ClientPool::start(pool_config(&server, 3)).await;

        assert_eq!(pool.len().await, 3);
        assert_eq!(pool.list().await, vec!["client_1", "client_2", "client_3"]);
        for n in 1..=3 {
            assert!(pool.get(n).await.unwrap().is_fec_enabled());
        }
        assert!(pool.get(4).await.is_none());

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_by_number() {
        let server = fake_server().await;
        let pool = ClientPool::start(pool_config(&server, 2)).await;

        assert_eq!(pool.send(2, "hi").await.unwrap(), 1);
        assert_eq!(pool.send(2, "again").await.unwrap(), 2);
        assert!(pool.send(5, "nobody").await.is_err());

        let received = recv_all(&server, 2).await;
        assert_eq!(received[0].0, "[client_2|1] hi");
        assert_eq!(received[1].0, "[client_2|2] again");

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_broadcast_and_shutdown() {
        let server = fake_server().await;
        let pool = ClientPool::start(pool_config(&server, 3)).await;

        assert_eq!(pool.broadcast("all").await, 3);
        let received = recv_all(&server, 3).await
            .into_iter()
            .map(|(msg, _)| msg)
            .collect::<BTreeSet<_>>();
        assert_eq!(received, BTreeSet::from([
            "[client_1|1] all".to_string(),
            "[client_2|1] all".to_string(),
            "[client_3|1] all".to_string(),
        ]));

        pool.shutdown().await;
        let sentinels = recv_all(&server, 3).await;
        assert!(sentinels.iter().all(|(msg, _)| msg == "EXIT"));
        for n in 1..=3 {
            assert!(!pool.get(n).await.unwrap().is_running());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_timeout_starts_after_last_stagger() {
        let server = fake_server().await;
        let mut config = pool_config(&server, 25);
        config.startup_stagger = Duration::from_millis(100);

        let start = time::Instant::now();
        let pool = ClientPool::start(config).await;

        // the last client starts 2.4s in, beyond the 2s readiness timeout
        assert_eq!(pool.len().await, 25);
        assert!(start.elapsed() >= Duration::from_millis(2400));
        assert!(start.elapsed() < Duration::from_millis(4400));

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_failing_clients_are_not_registered() {
        let mut client = ClientConfig::new("not-an-ip", 8080, "default");
        client.log_dir = None;
        let pool = ClientPool::start(PoolConfig::new(2, client)).await;

        assert!(pool.is_empty().await);
        assert_eq!(pool.broadcast("x").await, 0);
    }
}
