use bytes::Bytes;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};
use uuid::Uuid;
use crate::config::ServerConfig;
use crate::csv_log::{CsvLog, ServerJitterRecord, ServerStatsRecord};
use crate::error::{ConstructionError, TransportError};
use crate::packet_framer;
use crate::peer_key::PeerKey;
use crate::send_socket::SendSocket;
use crate::server::congestion_policy::CongestionPolicy;
use crate::server::fec_policy::FecPolicy;
use crate::server::server_stats::ServerStats;
use crate::server::session_registry::SessionRegistry;
use crate::util::random::Random;
use crate::util::time::unix_millis;

pub const SERVER_STATS_FILE_NAME: &str = "server_stats.csv";

/// A recovery packet decided on inside the registry's critical section, to be sent after the
///  lock is released
struct FecEmission {
    /// the peer's sequence number at the moment the packet was emitted, i.e. before the
    ///  triggering datagram was counted
    sequence: u64,
    packet: Vec<u8>,
}

/// The server's receive-process-reply loop.
///
/// Datagrams are processed strictly one at a time, and every datagram stalls the loop for its
///  simulated jitter. This deliberately delays *all* peers' traffic behind a slow packet.
///
/// Per datagram, the engine
/// * looks up or registers the peer's session
/// * logs the jitter record and stores the payload under the peer's current sequence number
/// * optionally replays an older payload as a recovery packet (see [FecPolicy])
/// * counts the datagram for the peer, and then server-wide
/// * acknowledges it with exactly one `Acknowledged` reply
///
/// Replies go through the send path which may delay them to simulate congestion (see
///  [CongestionPolicy]).
pub struct ServerEngine<R: Random> {
    config: Arc<ServerConfig>,
    receive_socket: Arc<UdpSocket>,
    send_socket: Arc<dyn SendSocket>,
    registry: SessionRegistry,
    stats: ServerStats,
    stats_log: Mutex<CsvLog<ServerStatsRecord>>,
    fec_enabled: AtomicBool,
    congestion_enabled: AtomicBool,
    _random: PhantomData<fn() -> R>,
}

impl<R: Random> ServerEngine<R> {
    pub async fn new(config: ServerConfig) -> Result<ServerEngine<R>, ConstructionError> {
        config.validate()?;

        let socket = Arc::new(UdpSocket::bind(config.bind_addr).await?);
        info!("bound server socket to {:?}", socket.local_addr()?);

        Ok(Self::from_parts(config, socket.clone(), Arc::new(socket)))
    }

    pub(crate) fn from_parts(config: ServerConfig, receive_socket: Arc<UdpSocket>, send_socket: Arc<dyn SendSocket>) -> ServerEngine<R> {
        let stats_log = CsvLog::create_in_dir_or_disabled(config.log_dir.as_deref(), SERVER_STATS_FILE_NAME);

        ServerEngine {
            registry: SessionRegistry::new(config.history_capacity, config.log_dir.clone()),
            stats: ServerStats::new(config.stats_interval),
            stats_log: Mutex::new(stats_log),
            fec_enabled: AtomicBool::new(config.fec_enabled),
            congestion_enabled: AtomicBool::new(config.congestion_enabled),
            config: Arc::new(config),
            receive_socket,
            send_socket,
            _random: PhantomData,
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.receive_socket.local_addr()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn enable_fec(&self, enable: bool) {
        self.fec_enabled.store(enable, Ordering::Release);
        info!("FEC {}", if enable { "enabled" } else { "disabled" });
    }

    pub fn enable_congestion_control(&self, enable: bool) {
        self.congestion_enabled.store(enable, Ordering::Release);
        info!("Congestion Control {}", if enable { "enabled" } else { "disabled" });
    }

    fn fec_policy(&self) -> FecPolicy {
        FecPolicy {
            enabled: self.fec_enabled.load(Ordering::Acquire),
            interval: self.config.fec_interval,
            lookback: self.config.fec_lookback,
        }
    }

    fn congestion_policy(&self) -> CongestionPolicy {
        CongestionPolicy {
            enabled: self.congestion_enabled.load(Ordering::Acquire),
            interval: self.config.congestion_interval,
            delay: self.config.congestion_delay,
        }
    }

    /// Runs until the process exits. Receive errors are logged and do not end the loop.
    pub async fn run(&self) {
        info!("RTP server started, waiting for packets");
        loop {
            self.receive_one().await;
        }
    }

    pub async fn receive_one(&self) {
        let mut buf = vec![0u8; self.config.max_datagram_size];

        let (num_read, from) = match self.receive_socket.recv_from(&mut buf).await {
            Ok(x) => x,
            Err(e) => {
                error!("{}", TransportError::Receive(e));
                return;
            }
        };

        let payload = Bytes::copy_from_slice(&buf[..num_read]);

        let correlation_id = Uuid::new_v4();
        let span = span!(Level::TRACE, "datagram_received", ?correlation_id);

        self.on_datagram(from, payload)
            .instrument(span)
            .await
    }

    /// Processes a single datagram that was received from `from`. The payload is stored and
    ///  replayed byte for byte, it is only decoded for logging.
    pub async fn on_datagram(&self, from: SocketAddr, payload: impl Into<Bytes>) {
        let payload = payload.into();
        let timestamp = unix_millis();
        let jitter_ms = R::gen_u64_range(0..=self.config.max_jitter.as_millis() as u64);

        trace!("received datagram from {:?}: {:?}", from, &payload[..]);
        info!("received from {}: {} (jitter: {}ms)", PeerKey::from(from), String::from_utf8_lossy(&payload), jitter_ms);

        let fec_policy = self.fec_policy();
        let congestion_interval = self.config.congestion_interval;
        let delay_penalty_ms = self.config.logged_delay_penalty.as_millis() as u64;

        let fec_emission = self.registry.get_or_create(from, |session| {
            let sequence = session.sequence();

            let delay_ms = jitter_ms + if sequence % congestion_interval == 0 { delay_penalty_ms } else { 0 };
            session.log_jitter(&ServerJitterRecord {
                timestamp,
                packet_id: sequence,
                jitter_ms,
                delay_ms,
            });

            session.store_payload(payload);

            let emission = if fec_policy.should_emit(sequence) {
                match fec_policy.recovery_payload(session.history(), sequence) {
                    Ok(recovered) => Some(FecEmission {
                        sequence,
                        packet: packet_framer::fec_packet(recovered),
                    }),
                    Err(e) => {
                        debug!("suppressing FEC packet for {:?}: {}", session.endpoint(), e);
                        None
                    }
                }
            }
            else {
                None
            };

            session.advance();
            emission
        }).await;

        if let Some(emission) = fec_emission {
            self.send_with_sequence(from, Some(emission.sequence), &emission.packet).await;
        }

        time::sleep(Duration::from_millis(jitter_ms)).await;

        if let Some(total_packets) = self.stats.observe() {
            let record = ServerStatsRecord {
                timestamp,
                total_clients: self.registry.len().await,
                total_packets,
                avg_jitter_ms: jitter_ms,
            };
            debug!("server stats: {:?}", record);
            self.stats_log.lock().await
                .append(&record);
        }

        self.send_to(from, packet_framer::ACKNOWLEDGED.as_bytes()).await;
    }

    /// Sends a message to a peer, delaying it if the peer's current sequence number calls for
    ///  simulated congestion
    pub async fn send_to(&self, to: SocketAddr, message: &[u8]) {
        let sequence = self.registry.sequence_of(&PeerKey::from(to)).await;
        self.send_with_sequence(to, sequence, message).await
    }

    async fn send_with_sequence(&self, to: SocketAddr, sequence: Option<u64>, message: &[u8]) {
        if let Some(delay) = sequence.and_then(|s| self.congestion_policy().delay_for(s)) {
            info!("simulated congestion for {}! introducing delay of {:?}", PeerKey::from(to), delay);
            time::sleep(delay).await;
        }

        match self.send_socket.do_send_packet(to, message).await {
            Ok(()) => info!("sent to {}: {}", PeerKey::from(to), String::from_utf8_lossy(message)),
            Err(e) => warn!("{}", e),
        }
    }
}
