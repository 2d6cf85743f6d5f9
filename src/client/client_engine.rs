use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::{select, time};
use tracing::{debug, error, info, trace, warn};
use crate::client::jitter_buffer::JitterBuffer;
use crate::config::ClientConfig;
use crate::csv_log::{ClientJitterRecord, CsvLog};
use crate::error::{ConstructionError, TransportError};
use crate::packet_framer::{self, ServerMessage, EXIT_SENTINEL};
use crate::send_socket::SendSocket;
use crate::util::time::unix_millis;

/// One simulated media peer: a UDP socket bound to an ephemeral port, an outbound sequence
///  counter, and a supervised background task that feeds received datagrams through the
///  jitter buffer.
///
/// Sending is fire-and-forget: [ClientEngine::send] does not wait for the server's
///  acknowledgement, which arrives on the receive task like any other datagram.
pub struct ClientEngine {
    config: Arc<ClientConfig>,
    server_addr: SocketAddr,
    socket: Arc<UdpSocket>,
    sequence: AtomicU64,
    fec_enabled: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    jitter_buffer: Arc<Mutex<JitterBuffer>>,
    cancel_sender: broadcast::Sender<()>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
}

impl ClientEngine {
    /// Binds the socket, opens the jitter log and starts the receive task. Failure to parse the
    ///  server address or to set up the socket is fatal for this engine.
    pub async fn new(config: ClientConfig) -> Result<ClientEngine, ConstructionError> {
        config.validate()?;

        let server_ip: IpAddr = config.server_host.parse()
            .map_err(|_| ConstructionError::InvalidAddress(config.server_host.clone()))?;
        let server_addr = SocketAddr::new(server_ip, config.server_port);

        let bind_addr = if server_addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        debug!("[{}] bound client socket to {:?}", config.peer_id, socket.local_addr()?);

        let jitter_log = CsvLog::create_in_dir_or_disabled(config.log_dir.as_deref(), &config.log_file_name());

        let config = Arc::new(config);
        let (cancel_sender, cancel_receiver) = broadcast::channel(1);
        let fec_enabled = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let jitter_buffer = Arc::new(Mutex::new(JitterBuffer::new(config.release_threshold)));

        let pipeline = ReceivePipeline {
            config: config.clone(),
            socket: socket.clone(),
            fec_enabled: fec_enabled.clone(),
            running: running.clone(),
            jitter_buffer: jitter_buffer.clone(),
            jitter_log,
            local_packet_id: 0,
        };
        let receive_task = tokio::spawn(pipeline.run(cancel_receiver));

        Ok(ClientEngine {
            config,
            server_addr,
            socket,
            sequence: AtomicU64::new(0),
            fec_enabled,
            running,
            jitter_buffer,
            cancel_sender,
            receive_task: Mutex::new(Some(receive_task)),
        })
    }

    pub fn peer_id(&self) -> &str {
        &self.config.peer_id
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// the sequence number of the most recently sent message, 0 before the first send
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_fec_enabled(&self) -> bool {
        self.fec_enabled.load(Ordering::Acquire)
    }

    pub async fn buffer_depth(&self) -> usize {
        self.jitter_buffer.lock().await.depth()
    }

    /// Advertises FEC support. This is informational only: recovery packets are driven by the
    ///  server, and the client buffers them like any other datagram.
    pub fn enable_fec(&self, enable: bool) {
        self.fec_enabled.store(enable, Ordering::Release);
        info!("[{}] FEC enabled: {}", self.config.peer_id, if enable { "yes" } else { "no" });
    }

    /// Frames and sends a message to the server, returning the sequence number it was sent with
    pub async fn send(&self, payload: &str) -> Result<u64, TransportError> {
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        let packet = packet_framer::encode(&self.config.peer_id, sequence, payload);

        self.socket.do_send_packet(self.server_addr, packet.as_bytes()).await?;
        info!("[{}] sent: {} (ID: {})", self.config.peer_id, payload, sequence);
        Ok(sequence)
    }

    /// Signals the receive task to stop, sends the shutdown sentinel to the server (whose reply
    ///  unblocks a pending receive), and waits for the receive task for at most the configured
    ///  shutdown timeout. A task that does not finish in time is aborted.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            debug!("[{}] already stopped", self.config.peer_id);
            return;
        }
        info!("[{}] client stopping", self.config.peer_id);

        if let Err(e) = self.socket.do_send_packet(self.server_addr, EXIT_SENTINEL.as_bytes()).await {
            warn!("[{}] could not send shutdown sentinel: {}", self.config.peer_id, e);
        }
        if self.cancel_sender.send(()).is_err() {
            debug!("[{}] receive loop is already gone", self.config.peer_id);
        }

        let receive_task = self.receive_task.lock().await.take();
        if let Some(mut receive_task) = receive_task {
            match time::timeout(self.config.shutdown_timeout, &mut receive_task).await {
                Ok(Ok(())) => debug!("[{}] receive loop terminated", self.config.peer_id),
                Ok(Err(e)) => warn!("[{}] receive task failed: {}", self.config.peer_id, e),
                Err(_) => {
                    warn!("[{}] receive loop did not terminate within {:?} - aborting it", self.config.peer_id, self.config.shutdown_timeout);
                    receive_task.abort();
                }
            }
        }
    }
}

impl Drop for ClientEngine {
    fn drop(&mut self) {
        if let Some(receive_task) = self.receive_task.get_mut().take() {
            receive_task.abort();
        }
    }
}

/// ICMP feedback for earlier sends surfaces as an error on the next receive, and says nothing
///  about the socket itself
fn is_transient_receive_error(e: &std::io::Error) -> bool {
    matches!(e.kind(),
        ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused | ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// The state owned by the receive task. Only this task writes the jitter log, so the log needs
///  no lock of its own.
struct ReceivePipeline {
    config: Arc<ClientConfig>,
    socket: Arc<UdpSocket>,
    fec_enabled: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    jitter_buffer: Arc<Mutex<JitterBuffer>>,
    jitter_log: CsvLog<ClientJitterRecord>,
    /// counts received datagrams, independent of the outbound sequence
    local_packet_id: u64,
}

impl ReceivePipeline {
    async fn run(mut self, mut cancel_receiver: broadcast::Receiver<()>) {
        debug!("[{}] starting receive loop", self.config.peer_id);

        let mut buf = vec![0u8; self.config.max_datagram_size];
        let mut consecutive_errors = 0u64;
        loop {
            let received = select! {
                r = self.socket.recv_from(&mut buf) => r,
                _ = cancel_receiver.recv() => break,
            };

            let num_read = match received {
                Ok((num_read, _from)) => {
                    consecutive_errors = 0;
                    num_read
                }
                Err(e) if is_transient_receive_error(&e) => {
                    // logged once per burst
                    consecutive_errors += 1;
                    if consecutive_errors == 1 {
                        warn!("[{}] {}", self.config.peer_id, TransportError::Receive(e));
                    }
                    else {
                        trace!("[{}] receive error #{} in a row: {}", self.config.peer_id, consecutive_errors, e);
                    }
                    continue;
                }
                Err(e) => {
                    error!("[{}] {} - terminating receive loop", self.config.peer_id, TransportError::Receive(e));
                    break;
                }
            };

            if !self.running.load(Ordering::Acquire) {
                debug!("[{}] shutting down - dropping received datagram", self.config.peer_id);
                break;
            }

            let payload = String::from_utf8_lossy(&buf[..num_read]).into_owned();
            self.on_datagram(payload).await;
        }

        debug!("[{}] receive loop finished", self.config.peer_id);
    }

    async fn on_datagram(&mut self, payload: String) {
        let receive_timestamp = unix_millis();

        match ServerMessage::classify(&payload) {
            ServerMessage::Acknowledged => trace!("[{}] received acknowledgement", self.config.peer_id),
            ServerMessage::FecRecovery(recovered) => debug!("[{}] received FEC packet (FEC advertised: {}): {}",
                self.config.peer_id, self.fec_enabled.load(Ordering::Acquire), recovered),
            ServerMessage::Other(raw) => debug!("[{}] received: {}", self.config.peer_id, raw),
        }

        let buffer_depth = self.jitter_buffer.lock().await
            .push(payload);

        // simulated decode cost, growing with the backlog
        let processing_delay = self.config.processing_delay(buffer_depth);
        time::sleep(processing_delay).await;

        self.local_packet_id += 1;
        self.jitter_log.append(&ClientJitterRecord {
            timestamp: receive_timestamp,
            packet_id: self.local_packet_id,
            buffer_size: buffer_depth,
            processing_time_ms: processing_delay.as_millis() as u64,
        });

        let released = self.jitter_buffer.lock().await
            .release();
        if let Some(released) = released {
            info!("[{}] processed from buffer: {}", self.config.peer_id, released);
        }
    }
}
