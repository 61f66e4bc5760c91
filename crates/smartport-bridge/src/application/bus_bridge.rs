//! The bus-facing half of the bridge (the "polling unit").
//!
//! The host bus loop calls [`Bridge::poll_phase`] on every tick.  Each call
//! pops at most one frame from the request queue and turns it into a phase
//! code:
//!
//! | Queue contents                      | Result                                  |
//! |-------------------------------------|-----------------------------------------|
//! | empty                               | `Idle`, mode `Standby`                  |
//! | 4-byte reserved sequence            | run the control action, return its phase |
//! | frame that does not decode          | log, `Idle`, mode `Standby`             |
//! | valid SmartPort request             | stage it, mode `Command`, `Enabled`     |
//!
//! After an `Enabled` the host reads the staged command packet and payload,
//! builds its answer with [`Bridge::encode_response`] and ships it with
//! [`Bridge::send_response_packet`].
//!
//! # Threading model
//!
//! The host bus loop is synchronous and must never stall waiting for the
//! network.  The bridge therefore owns a small Tokio runtime: the connection
//! supervisor runs on it in the background, and the bus-facing methods only
//! touch the network through `block_on` when they have to (sending a
//! response, reconnecting).  Polling itself is a non-blocking `try_recv`.
//!
//! Do not call the blocking methods from inside an async context; they would
//! nest runtimes.
//!
//! # Shutdown
//!
//! A reboot blocks the bus loop until the server accepts a new connection,
//! which may be never.  [`Bridge::shutdown_handle`] returns a handle that
//! another thread or task (a Ctrl+C handler, say) can trigger to abandon that
//! wait.  The bridge is then left disconnected.

use std::net::SocketAddr;
use std::sync::Arc;

use smartport_core::domain::{CommandMode, Phase, SpecialCommand, SpecialCommandTable};
use smartport_core::protocol::messages::{PacketType, Request, Response, COMMAND_PACKET_SIZE};
use smartport_core::protocol::{decode_request, hexdump, serialize_response};
use thiserror::Error;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::application::connection::{Connection, LinkState, RetryPolicy};
use crate::application::request_queue::{request_queue, RequestConsumer};
use crate::application::transport::{Connector, TransportError};

/// Errors returned by the bus-facing API.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// `encode_response` was called with no request in flight.
    #[error("no current request to respond to")]
    NoCurrentRequest,

    /// `send_response_packet` was called before `encode_response`.
    #[error("no response has been encoded")]
    NoResponse,

    /// Writing the response failed.  The transaction has been abandoned.
    #[error("failed to send response: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to start network runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Where and how the bridge connects.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Server address, already resolved.
    pub server_addr: SocketAddr,
    pub retry: RetryPolicy,
}

/// Requests that the bridge stop waiting for the server.
///
/// Cloned handles share one flag; once requested it stays requested.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    pub fn request(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.flag.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.flag.subscribe()
    }
}

/// A SmartPort device whose commands are served by a remote server.
pub struct Bridge {
    runtime: Runtime,
    connector: Arc<dyn Connector>,
    settings: BridgeSettings,
    connection: Option<Connection>,
    queue: RequestConsumer,
    special: SpecialCommandTable,
    command_packet: [u8; COMMAND_PACKET_SIZE],
    mode: CommandMode,
    current_request: Option<Request>,
    current_response: Option<Response>,
    shutdown: ShutdownHandle,
}

impl Bridge {
    /// Starts the bridge and blocks until the first connection is up.
    ///
    /// Connect attempts are retried every `settings.retry.interval` for as
    /// long as it takes.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Runtime`] if the network runtime cannot be created.
    pub fn connect(
        connector: Arc<dyn Connector>,
        settings: BridgeSettings,
    ) -> Result<Self, BridgeError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("smartport-net")
            .enable_all()
            .build()
            .map_err(BridgeError::Runtime)?;

        // Replaced by the real queue in `establish_connection`.
        let (_, queue) = request_queue();

        let mut bridge = Self {
            runtime,
            connector,
            settings,
            connection: None,
            queue,
            special: SpecialCommandTable::standard(),
            command_packet: [0u8; COMMAND_PACKET_SIZE],
            mode: CommandMode::Standby,
            current_request: None,
            current_response: None,
            shutdown: ShutdownHandle::new(),
        };
        bridge.establish_connection();
        Ok(bridge)
    }

    /// Reports the current bus phase, consuming at most one queued request.
    pub fn poll_phase(&mut self) -> Phase {
        let Some(raw) = self.queue.pop_or_empty() else {
            self.mode = CommandMode::Standby;
            return Phase::Idle;
        };

        if let Some(command) = self.special.lookup(&raw) {
            return self.run_special(command);
        }

        // A new frame always ends the previous transaction.
        self.current_request = None;
        self.current_response = None;

        match decode_request(&raw) {
            Ok(request) => {
                debug!(
                    seq = request.sequence(),
                    command = request.command().name(),
                    unit = request.unit(),
                    "request staged"
                );
                self.command_packet = request.command_packet();
                self.current_request = Some(request);
                self.mode = CommandMode::Command;
                Phase::Enabled
            }
            Err(e) => {
                warn!(
                    "discarding malformed request ({} bytes): {e}\n{}",
                    raw.len(),
                    hexdump(&raw)
                );
                self.mode = CommandMode::Standby;
                Phase::Idle
            }
        }
    }

    /// Builds the response to the current request and holds it for
    /// [`Bridge::send_response_packet`].
    ///
    /// `packet_type` is the bus packet the host is answering with; it is
    /// logged but does not change the wire format.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NoCurrentRequest`] if no request is in flight.
    pub fn encode_response(
        &mut self,
        source: u8,
        packet_type: PacketType,
        status: u8,
        data: &[u8],
    ) -> Result<(), BridgeError> {
        let request = self
            .current_request
            .as_ref()
            .ok_or(BridgeError::NoCurrentRequest)?;

        debug!(
            source,
            packet = packet_type.name(),
            status,
            len = data.len(),
            "response encoded"
        );
        self.current_response = Some(request.create_response(source, status, data));
        Ok(())
    }

    /// Sends the held response to the server.
    ///
    /// On a transport failure the error is logged, the request and response
    /// are abandoned and the bridge returns to `Standby`.  The supervisor
    /// reconnects in the background if the link itself went down.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NoResponse`] if nothing was encoded, or
    /// [`BridgeError::Transport`] if the write failed.
    pub fn send_response_packet(&mut self) -> Result<(), BridgeError> {
        let response = self.current_response.take().ok_or(BridgeError::NoResponse)?;
        let bytes = serialize_response(&response);
        debug!("response data:\n{}", hexdump(&bytes));

        let result = match &self.connection {
            Some(connection) => self.runtime.block_on(connection.send(&bytes)),
            None => Err(TransportError::NotConnected),
        };

        if let Err(e) = result {
            error!("error sending response: {e}");
            self.current_request = None;
            self.mode = CommandMode::Standby;
            return Err(e.into());
        }
        Ok(())
    }

    /// Copies the current request's payload into `out`.
    ///
    /// Returns the full payload size, which may exceed `out.len()`; only
    /// `min(size, out.len())` bytes are written.  Returns 0 when no request
    /// is in flight.
    pub fn decode_into(&self, out: &mut [u8]) -> usize {
        match &self.current_request {
            Some(request) => {
                request.copy_payload(out);
                request.payload_size()
            }
            None => 0,
        }
    }

    /// The first [`COMMAND_PACKET_SIZE`] bytes of the last staged request.
    pub fn command_packet(&self) -> [u8; COMMAND_PACKET_SIZE] {
        self.command_packet
    }

    pub fn mode(&self) -> CommandMode {
        self.mode
    }

    pub fn current_request(&self) -> Option<&Request> {
        self.current_request.as_ref()
    }

    pub fn link_state(&self) -> LinkState {
        self.connection
            .as_ref()
            .map_or(LinkState::Disconnected, Connection::state)
    }

    /// Frames received but not yet polled.
    pub fn queued_requests(&self) -> usize {
        self.queue.len()
    }

    /// Handle for abandoning a blocked reconnect from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Handle to the bridge's network runtime, for spawning side tasks such
    /// as signal handlers.
    pub fn runtime_handle(&self) -> Handle {
        self.runtime.handle().clone()
    }

    /// Stops the receiver, closes the link and drops queued requests.
    ///
    /// Safe to call more than once.
    pub fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            self.runtime.block_on(connection.disconnect());
            info!("disconnected from server at {}", self.settings.server_addr);
        }
        let dropped = self.queue.clear();
        if dropped > 0 {
            debug!("dropped {dropped} unprocessed requests");
        }
    }

    /// Tears down the connection and blocks until a fresh one is up or
    /// shutdown is requested through a [`ShutdownHandle`].
    pub fn reconnect(&mut self) {
        self.disconnect();
        self.establish_connection();
    }

    fn run_special(&mut self, command: SpecialCommand) -> Phase {
        match command {
            SpecialCommand::Reboot => {
                info!("reboot requested by server");
                self.current_request = None;
                self.current_response = None;
                self.mode = CommandMode::Standby;
                self.reconnect();
                Phase::Reset
            }
        }
    }

    fn establish_connection(&mut self) {
        let (producer, consumer) = request_queue();
        self.queue = consumer;

        let addr = self.settings.server_addr;
        info!("connecting to server at {addr}");
        let mut connection = Connection::start(
            self.runtime.handle(),
            Arc::clone(&self.connector),
            addr,
            self.settings.retry,
            producer,
        );
        let mut shutdown = self.shutdown.subscribe();
        let connected = self.runtime.block_on(async {
            tokio::select! {
                connected = connection.wait_connected() => Some(connected),
                _ = shutdown.wait_for(|requested| *requested) => None,
            }
        });

        match connected {
            Some(true) => info!("connection to server at {addr} successful"),
            Some(false) => warn!("connection supervisor for {addr} stopped before connecting"),
            None => {
                info!("shutdown requested while connecting to {addr}; giving up");
                self.runtime.block_on(connection.disconnect());
                return;
            }
        }
        self.connection = Some(connection);
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use smartport_core::domain::REBOOT_SEQUENCE;
    use smartport_core::protocol::messages::SmartPortCommand;

    use super::*;
    use crate::infrastructure::network::mock::ScriptedConnector;

    fn start(connector: &Arc<ScriptedConnector>) -> Bridge {
        let settings = BridgeSettings {
            server_addr: "127.0.0.1:1985".parse().unwrap(),
            retry: RetryPolicy::default(),
        };
        Bridge::connect(connector.clone(), settings).expect("bridge starts")
    }

    /// Waits until the receiver has queued at least `count` frames.
    fn wait_for_queued(bridge: &Bridge, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while bridge.queued_requests() < count {
            assert!(Instant::now() < deadline, "frames never arrived");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn deliver(connector: &ScriptedConnector, bridge: &Bridge, frame: &[u8]) {
        let before = bridge.queued_requests();
        assert!(connector.inject(frame.to_vec()));
        wait_for_queued(bridge, before + 1);
    }

    #[test]
    fn test_connect_blocks_until_link_is_up() {
        // Arrange
        let server = Arc::new(ScriptedConnector::failing_first(5));

        // Act
        let bridge = start(&server);

        // Assert
        assert_eq!(bridge.link_state(), LinkState::Connected);
        assert_eq!(server.attempts(), 6);
        assert_eq!(server.session_count(), 1);
    }

    #[test]
    fn test_empty_queue_is_idle_standby() {
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);

        assert_eq!(bridge.poll_phase(), Phase::Idle);
        assert_eq!(bridge.mode(), CommandMode::Standby);
        assert!(bridge.current_request().is_none());
    }

    #[test]
    fn test_four_byte_request_is_enabled_with_padded_command_packet() {
        // Arrange
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &[0x01, 0x02, 0x03, 0x04]);

        // Act
        let phase = bridge.poll_phase();

        // Assert
        assert_eq!(phase, Phase::Enabled);
        assert_eq!(u8::from(phase), 0b1010);
        assert_eq!(bridge.mode(), CommandMode::Command);
        assert_eq!(bridge.command_packet(), [0x01, 0x02, 0x03, 0x04, 0, 0, 0, 0]);
        let request = bridge.current_request().expect("request staged");
        assert_eq!(request.command(), SmartPortCommand::WriteBlock);
    }

    #[test]
    fn test_requests_are_polled_in_arrival_order() {
        // Arrange
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        let first = [0x01, 0x01, 0x01, 0x00, 0x00, 0x00];
        let second = [0x02, 0x00, 0x02, 0x03];
        deliver(&server, &bridge, &first);
        deliver(&server, &bridge, &second);

        // Act / Assert
        assert_eq!(bridge.poll_phase(), Phase::Enabled);
        assert_eq!(bridge.current_request().unwrap().sequence(), 0x01);
        assert_eq!(bridge.poll_phase(), Phase::Enabled);
        assert_eq!(bridge.current_request().unwrap().sequence(), 0x02);
        assert_eq!(bridge.poll_phase(), Phase::Idle);
    }

    #[test]
    fn test_malformed_request_is_discarded() {
        // Arrange: too short, then an unknown command
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &[0x01, 0x00]);
        deliver(&server, &bridge, &[0x01, 0x7F, 0x01, 0x00, 0x00]);

        // Act / Assert
        assert_eq!(bridge.poll_phase(), Phase::Idle);
        assert_eq!(bridge.mode(), CommandMode::Standby);
        assert_eq!(bridge.poll_phase(), Phase::Idle);
        assert!(bridge.current_request().is_none());
        assert_eq!(bridge.queued_requests(), 0);
    }

    #[test]
    fn test_response_round_trip_reaches_server() {
        // Arrange: a ReadBlock for block 2 on unit 1
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &[0x2A, 0x01, 0x01, 0x02, 0x00, 0x00]);
        assert_eq!(bridge.poll_phase(), Phase::Enabled);

        // Act
        bridge
            .encode_response(0x01, PacketType::Data, 0x00, &[0xDE, 0xAD])
            .expect("encode");
        bridge.send_response_packet().expect("send");

        // Assert
        assert_eq!(
            server.sent_frames(),
            vec![vec![0x2A, 0x01, 0x01, 0x00, 0xDE, 0xAD]]
        );
    }

    #[test]
    fn test_decode_into_copies_payload_and_reports_full_size() {
        // Arrange: a Control request carrying a 6-byte list
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &[0x03, 0x04, 0x01, 0x05, 1, 2, 3, 4, 5, 6]);
        assert_eq!(bridge.poll_phase(), Phase::Enabled);
        let mut out = [0u8; 4];

        // Act
        let size = bridge.decode_into(&mut out);

        // Assert
        assert_eq!(size, 6);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_into_without_request_is_zero() {
        let server = Arc::new(ScriptedConnector::new());
        let bridge = start(&server);
        let mut out = [0xFFu8; 2];
        assert_eq!(bridge.decode_into(&mut out), 0);
        assert_eq!(out, [0xFF, 0xFF]);
    }

    #[test]
    fn test_encode_without_request_is_rejected() {
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);

        let result = bridge.encode_response(0x01, PacketType::Status, 0x00, &[]);

        assert!(matches!(result, Err(BridgeError::NoCurrentRequest)));
    }

    #[test]
    fn test_send_without_encode_is_rejected() {
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &[0x01, 0x00, 0x01, 0x00]);
        bridge.poll_phase();

        assert!(matches!(
            bridge.send_response_packet(),
            Err(BridgeError::NoResponse)
        ));
        assert!(server.sent_frames().is_empty());
    }

    #[test]
    fn test_send_failure_abandons_transaction() {
        // Arrange
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &[0x01, 0x00, 0x01, 0x00]);
        assert_eq!(bridge.poll_phase(), Phase::Enabled);
        bridge
            .encode_response(0x01, PacketType::Status, 0x00, &[])
            .unwrap();
        server.set_fail_writes(true);

        // Act
        let result = bridge.send_response_packet();

        // Assert
        assert!(matches!(result, Err(BridgeError::Transport(_))));
        assert!(bridge.current_request().is_none());
        assert_eq!(bridge.mode(), CommandMode::Standby);
        assert_eq!(bridge.poll_phase(), Phase::Idle);
    }

    #[test]
    fn test_send_after_server_hangup_reports_closed() {
        // Arrange
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &[0x01, 0x00, 0x01, 0x00]);
        assert_eq!(bridge.poll_phase(), Phase::Enabled);
        bridge
            .encode_response(0x01, PacketType::Status, 0x00, &[])
            .unwrap();
        server.refuse_next(usize::MAX);
        server.close_session();
        let deadline = Instant::now() + Duration::from_secs(5);
        while bridge.link_state() != LinkState::AwaitingConnection {
            assert!(Instant::now() < deadline, "link loss never noticed");
            std::thread::sleep(Duration::from_millis(1));
        }

        // Act
        let result = bridge.send_response_packet();

        // Assert
        assert!(matches!(
            result,
            Err(BridgeError::Transport(TransportError::Closed))
        ));
        assert!(bridge.current_request().is_none());
        assert_eq!(bridge.mode(), CommandMode::Standby);
    }

    #[test]
    fn test_new_request_discards_unsent_response() {
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &[0x01, 0x00, 0x01, 0x00]);
        deliver(&server, &bridge, &[0x02, 0x00, 0x01, 0x00]);
        bridge.poll_phase();
        bridge
            .encode_response(0x01, PacketType::Status, 0x00, &[])
            .unwrap();

        bridge.poll_phase();

        assert!(matches!(
            bridge.send_response_packet(),
            Err(BridgeError::NoResponse)
        ));
    }

    #[test]
    fn test_reboot_sequence_reconnects_and_resets() {
        // Arrange
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(bridge.poll_phase(), Phase::Enabled);
        deliver(&server, &bridge, &REBOOT_SEQUENCE);

        // Act
        let phase = bridge.poll_phase();

        // Assert
        assert_eq!(phase, Phase::Reset);
        assert_eq!(u8::from(phase), 0b0101);
        assert_eq!(server.session_count(), 2);
        assert_eq!(bridge.link_state(), LinkState::Connected);
        assert!(bridge.current_request().is_none());
        assert_eq!(bridge.mode(), CommandMode::Standby);
    }

    #[test]
    fn test_reboot_leaves_staged_command_packet_alone() {
        // Arrange
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &[0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(bridge.poll_phase(), Phase::Enabled);
        deliver(&server, &bridge, &REBOOT_SEQUENCE);

        // Act
        assert_eq!(bridge.poll_phase(), Phase::Reset);

        // Assert
        assert_eq!(bridge.command_packet(), [0x01, 0x02, 0x03, 0x04, 0x05, 0, 0, 0]);
    }

    #[test]
    fn test_reboot_sequence_wins_over_status_request_decode() {
        // Arrange: FF 00 00 FF is also a well-formed Status request for unit 0
        let as_request = decode_request(&REBOOT_SEQUENCE).expect("decodes as a request");
        assert_eq!(as_request.command(), SmartPortCommand::Status);
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &REBOOT_SEQUENCE);

        // Act
        let phase = bridge.poll_phase();

        // Assert
        assert_eq!(phase, Phase::Reset);
        assert!(bridge.current_request().is_none());
        assert_eq!(server.session_count(), 2);
    }

    #[test]
    fn test_shutdown_request_abandons_blocked_reboot() {
        // Arrange: after the reboot the server refuses every attempt
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &REBOOT_SEQUENCE);
        server.refuse_next(usize::MAX);
        let shutdown = bridge.shutdown_handle();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            shutdown.request();
        });

        // Act: returns only because shutdown was requested
        let phase = bridge.poll_phase();
        canceller.join().expect("canceller thread panicked");

        // Assert
        assert_eq!(phase, Phase::Reset);
        assert!(bridge.shutdown_handle().is_requested());
        assert_eq!(bridge.link_state(), LinkState::Disconnected);
        assert_eq!(server.session_count(), 1);
        assert!(matches!(
            bridge.encode_response(0x01, PacketType::Status, 0x00, &[]),
            Err(BridgeError::NoCurrentRequest)
        ));
    }

    #[test]
    fn test_shutdown_handle_starts_unrequested_and_is_shared() {
        let server = Arc::new(ScriptedConnector::new());
        let bridge = start(&server);
        let first = bridge.shutdown_handle();
        let second = first.clone();

        assert!(!first.is_requested());
        second.request();

        assert!(first.is_requested());
        assert!(bridge.shutdown_handle().is_requested());
    }

    #[test]
    fn test_reboot_drops_requests_queued_behind_it() {
        // Arrange
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &REBOOT_SEQUENCE);
        deliver(&server, &bridge, &[0x09, 0x00, 0x01, 0x00]);

        // Act
        assert_eq!(bridge.poll_phase(), Phase::Reset);

        // Assert
        assert_eq!(bridge.queued_requests(), 0);
        assert_eq!(bridge.poll_phase(), Phase::Idle);
    }

    #[test]
    fn test_frames_after_reboot_come_from_new_session() {
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &REBOOT_SEQUENCE);
        assert_eq!(bridge.poll_phase(), Phase::Reset);

        deliver(&server, &bridge, &[0x10, 0x05, 0x01]);

        assert_eq!(bridge.poll_phase(), Phase::Enabled);
        assert_eq!(bridge.current_request().unwrap().command(), SmartPortCommand::Init);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        // Arrange
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &[0x01, 0x00, 0x01, 0x00]);

        // Act
        bridge.disconnect();
        bridge.disconnect();

        // Assert
        assert_eq!(bridge.link_state(), LinkState::Disconnected);
        assert_eq!(bridge.queued_requests(), 0);
        assert_eq!(bridge.poll_phase(), Phase::Idle);
    }

    #[test]
    fn test_send_after_disconnect_is_not_connected() {
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);
        deliver(&server, &bridge, &[0x01, 0x00, 0x01, 0x00]);
        bridge.poll_phase();
        bridge
            .encode_response(0x01, PacketType::Status, 0x00, &[])
            .unwrap();

        bridge.disconnect();
        let result = bridge.send_response_packet();

        assert!(matches!(
            result,
            Err(BridgeError::Transport(TransportError::NotConnected))
        ));
    }

    #[test]
    fn test_link_is_restored_after_server_hangs_up() {
        // Arrange
        let server = Arc::new(ScriptedConnector::new());
        let mut bridge = start(&server);

        // Act
        server.close_session();
        let deadline = Instant::now() + Duration::from_secs(5);
        while server.session_count() < 2 || bridge.link_state() != LinkState::Connected {
            assert!(Instant::now() < deadline, "never reconnected");
            std::thread::sleep(Duration::from_millis(1));
        }
        deliver(&server, &bridge, &[0x07, 0x00, 0x01, 0x00]);

        // Assert
        assert_eq!(bridge.poll_phase(), Phase::Enabled);
        assert_eq!(bridge.current_request().unwrap().sequence(), 0x07);
    }
}
