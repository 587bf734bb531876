// Copyright 2024 The uartcoap Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn, Level};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};

use uartcoap::message::{self, ObserveReply};
use uartcoap::{slip, Error, PortTracker};

use crate::serial::SerialTransport;
use crate::suppress::SuppressedLog;

/// First CoAP "port" reserved for resources the bridge interprets locally.
/// These ports ride inside CoAP tracking tokens, never on the wire as UDP.
pub const INTERNAL_PORT_MIN: u16 = 900;
/// Last locally-interpreted port.
pub const INTERNAL_PORT_MAX: u16 = 1100;

const BIND_RETRY: Duration = Duration::from_secs(5);
const SWEEP_PERIOD: Duration = Duration::from_secs(1);
const FLUSH_PERIOD: Duration = Duration::from_millis(100);

/// Addressing for the bridge's two sides.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Serial device path, e.g. `/dev/ttyACM0`.
    pub serial_path: String,

    /// Local address the UDP socket binds to.
    pub local_addr: IpAddr,

    /// Local UDP port.
    pub local_port: u16,

    /// The only peer datagrams are accepted from and forwarded to.
    pub remote_addr: IpAddr,

    /// The remote's canonical CoAP server port; also the port-tracker
    /// fallback for unknown exchanges.
    pub remote_port: u16,
}

/// Callback receiving observe notifications addressed to internal ports.
pub type InternalHandler = Box<dyn FnMut(u16, ObserveReply) + Send>;

struct Command {
    message: Vec<u8>,
    port: u16,
}

/// Cloneable handle for submitting CoAP requests to the serial side from any
/// thread. Requests travel through the port tracker, so the SRC's responses
/// route back to `internal_port`.
#[derive(Clone)]
pub struct BridgeHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl BridgeHandle {
    /// Queues `message` for transmission to the SRC, tagged so responses
    /// come back to `internal_port`.
    pub fn send_src_request(&self, message: Vec<u8>, internal_port: u16) {
        let command = Command {
            message,
            port: internal_port,
        };
        if self.commands.send(command).is_err() {
            warn!(
                "Bridge loop is gone, dropping request for internal port {}",
                internal_port
            );
        }
    }
}

/// The UDP↔serial CoAP bridge.
///
/// One instance owns the serial transport, the UDP socket, and the port
/// tracker, and drives all of them from a single cooperative event loop.
/// See the crate documentation for the threading model.
pub struct UartCoapBridge {
    config: BridgeConfig,
    tracker: PortTracker,
    commands: mpsc::UnboundedReceiver<Command>,
    // Keeps `commands.recv()` pending (instead of resolving to `None`) even
    // if the application drops every handle.
    _commands_tx: mpsc::UnboundedSender<Command>,
    handler: InternalHandler,
    console_flush: Option<Box<dyn FnMut() + Send>>,
    bind_failures: SuppressedLog,
    serial_send_failures: SuppressedLog,
    remote_send_failures: HashMap<u16, SuppressedLog>,
}

impl UartCoapBridge {
    /// Creates a bridge and a handle for submitting SRC requests.
    ///
    /// `handler` receives every observe notification whose tracked port
    /// falls in the internal range. The serial device is opened when
    /// [`run`](UartCoapBridge::run) starts.
    pub fn new(config: BridgeConfig, handler: InternalHandler) -> (UartCoapBridge, BridgeHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let tracker = PortTracker::new(config.remote_port);

        let bridge = UartCoapBridge {
            config,
            tracker,
            commands,
            _commands_tx: commands_tx.clone(),
            handler,
            console_flush: None,
            bind_failures: SuppressedLog::new(Level::Error),
            serial_send_failures: SuppressedLog::new(Level::Warn),
            remote_send_failures: HashMap::new(),
        };
        let handle = BridgeHandle {
            commands: commands_tx,
        };

        (bridge, handle)
    }

    /// Installs a callback drained by the 100 ms console-flush timer.
    pub fn set_console_flush(&mut self, flush: Box<dyn FnMut() + Send>) {
        self.console_flush = Some(flush);
    }

    /// Runs the bridge until the serial transport faults.
    ///
    /// Binding the UDP socket is retried every five seconds forever; serial
    /// faults are fatal and returned to the caller, which decides whether to
    /// exit the process.
    pub async fn run(mut self) -> Result<(), Error> {
        let mut serial = SerialTransport::open(&self.config.serial_path)?;
        let mut socket = self.bind_local().await;

        info!(
            "Bridging {} <-> {}:{}",
            self.config.serial_path, self.config.remote_addr, self.config.remote_port
        );

        let mut sweep = interval(SWEEP_PERIOD);
        let mut flush = interval(FLUSH_PERIOD);
        let mut dgram = [0u8; slip::MAX_FRAME];

        loop {
            tokio::select! {
                received = socket.recv_from(&mut dgram) => {
                    match received {
                        Ok((len, from)) => {
                            self.handle_datagram(&mut serial, &dgram[..len], from);
                        }
                        Err(err) => {
                            warn!("Bound socket receive failed: {}", err);
                            socket = self.bind_local().await;
                        }
                    }
                }
                frames = serial.read_frames() => {
                    for frame in frames? {
                        self.handle_serial_frame(&socket, frame).await;
                    }
                }
                command = self.commands.recv() => {
                    if let Some(command) = command {
                        self.handle_command(&mut serial, command);
                    }
                }
                _ = sweep.tick() => {
                    self.tracker.remove_expired(Instant::now());
                }
                _ = flush.tick() => {
                    if let Some(flush_fn) = self.console_flush.as_mut() {
                        flush_fn();
                    }
                }
            }

            // Handlers only queue serial data; the single in-flight write
            // happens here, keeping outbound frames ordered.
            serial.write_pending().await?;
        }
    }

    async fn bind_local(&mut self) -> UdpSocket {
        let endpoint = SocketAddr::new(self.config.local_addr, self.config.local_port);
        loop {
            match UdpSocket::bind(endpoint).await {
                Ok(socket) => {
                    info!("Successfully bound to {}", endpoint);
                    self.bind_failures.clear();
                    return socket;
                }
                Err(err) => {
                    self.bind_failures
                        .log(&format!("Failed to bind to {}: {}", endpoint, err));
                    sleep(BIND_RETRY).await;
                }
            }
        }
    }

    /// One datagram from the UDP side: filter by source address, run the
    /// tracker outbound path, and queue the result for the serial port.
    fn handle_datagram(&mut self, serial: &mut SerialTransport, data: &[u8], from: SocketAddr) {
        if from.ip() != self.config.remote_addr {
            trace!(
                "Received traffic from {} and not the desired remote {}",
                from.ip(),
                self.config.remote_addr
            );
            return;
        }

        let port = from.port();
        let mut buf = data.to_vec();
        match self
            .tracker
            .udp_to_serial(port, &mut buf, slip::MAX_FRAME + 3, Instant::now())
        {
            Ok(()) => {
                if serial.send_message(&buf) {
                    self.serial_send_failures.clear();
                } else {
                    self.serial_send_failures
                        .log("Failed to send message to serial");
                }
            }
            Err(err) => {
                self.serial_send_failures
                    .log(&format!("Failed to send message to serial: {}", err));
            }
        }
    }

    /// One deframed CoAP message from the serial side: recover the port,
    /// then either dispatch locally or forward to the remote peer.
    async fn handle_serial_frame(&mut self, socket: &UdpSocket, frame: Vec<u8>) {
        let mut buf = frame;
        let port = match self.tracker.serial_to_udp(&mut buf) {
            Ok(port) => port,
            Err(err) => {
                warn!("Failed to forward received serial data: {}", err);
                return;
            }
        };

        if is_internal_port(port) {
            match message::parse_observe_reply(&buf) {
                Ok(reply) => {
                    debug!(
                        "Internal notification: MID {:#06x} -> port {}, {} byte payload",
                        reply.mid,
                        port,
                        reply.payload.len()
                    );
                    (self.handler)(port, reply);
                }
                Err(err) => warn!("Bad notification for internal port {}: {}", port, err),
            }
            return;
        }

        let to = SocketAddr::new(self.config.remote_addr, port);
        match socket.send_to(&buf, to).await {
            Ok(_) => {
                self.remote_send_failures.remove(&port);
            }
            Err(err) => {
                self.remote_send_failures
                    .entry(port)
                    .or_insert_with(|| SuppressedLog::new(Level::Error))
                    .log(&format!("Got error when sending to {}: {}", to, err));
            }
        }
    }

    /// One application-issued request: tag it through the tracker so SRC
    /// responses route back to the internal port, then queue it for serial.
    fn handle_command(&mut self, serial: &mut SerialTransport, command: Command) {
        let mut buf = command.message;
        let max_len = buf.len() + uartcoap::tracker::TRACKING_TOKEN_LEN;
        match self
            .tracker
            .udp_to_serial(command.port, &mut buf, max_len, Instant::now())
        {
            Ok(()) => {
                debug!(
                    "Sending request: MID {:#06x} -> internal port {}",
                    message::msg_id(&buf),
                    command.port
                );
                if !serial.send_message(&buf) {
                    self.serial_send_failures
                        .log("Failed to send request to serial");
                }
            }
            Err(err) => {
                warn!(
                    "Dropping request for internal port {}: {}",
                    command.port, err
                );
            }
        }
    }
}

fn is_internal_port(port: u16) -> bool {
    (INTERNAL_PORT_MIN..=INTERNAL_PORT_MAX).contains(&port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_port_range() {
        assert!(is_internal_port(900));
        assert!(is_internal_port(1000));
        assert!(is_internal_port(1100));
        assert!(!is_internal_port(899));
        assert!(!is_internal_port(1101));
        assert!(!is_internal_port(5683));
    }
}
