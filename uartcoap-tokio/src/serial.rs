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

use std::collections::VecDeque;

use log::{debug, error, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use uartcoap::slip;
use uartcoap::Error;

/// Line rate of the SRC serial link.
pub const BAUD_RATE: u32 = 115_200;

/// Capacity of the receive and transmit rings.
const RING_CAPACITY: usize = slip::MAX_FRAME;

/// Lifecycle of the serial transport.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TransportState {
    /// Device is being opened and configured.
    Resetting,

    /// Open and exchanging data.
    Operational,

    /// A read or write failed; no further data is accepted. The owner
    /// decides whether to tear the process down.
    OperationalError,
}

/// SLIP-framed serial transport.
///
/// Owns the device, a bounded receive ring feeding the SLIP decoder, and a
/// bounded transmit ring drained by a single in-flight write. All methods
/// are driven from the bridge's event loop; nothing here spawns tasks.
pub struct SerialTransport {
    stream: SerialStream,
    state: TransportState,
    rx_ring: VecDeque<u8>,
    tx_ring: VecDeque<u8>,
    decoder: slip::Decoder,
}

impl SerialTransport {
    /// Opens `path` at 115 200 8N1 with no flow control.
    ///
    /// Must be called within a Tokio runtime (the stream registers with the
    /// reactor on open).
    pub fn open(path: &str) -> Result<SerialTransport, Error> {
        let stream = tokio_serial::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|err| {
                error!("Failed to open serial port {}: {}", path, err);
                Error::SerialFault
            })?;

        info!("Serial port {} configured and accepting data", path);

        Ok(SerialTransport {
            stream,
            state: TransportState::Operational,
            rx_ring: VecDeque::with_capacity(RING_CAPACITY),
            tx_ring: VecDeque::with_capacity(RING_CAPACITY),
            decoder: slip::Decoder::new(),
        })
    }

    /// Current transport state.
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// True when encoded bytes are waiting to be written.
    pub fn has_pending_tx(&self) -> bool {
        !self.tx_ring.is_empty()
    }

    /// Queues a message for transmission, SLIP-encoding it into the transmit
    /// ring. Returns `false` (queuing nothing) when the transport is not
    /// operational or the ring lacks room for the whole message.
    pub fn send_message(&mut self, bytes: &[u8]) -> bool {
        if self.state != TransportState::Operational {
            error!("Failed sending message, transport state is {:?}", self.state);
            return false;
        }

        let free = RING_CAPACITY.saturating_sub(self.tx_ring.len());
        if free < bytes.len() {
            error!("Can't send message: not enough free write buffer space");
            return false;
        }

        // Larger payloads are split into frame-sized pieces.
        for chunk in bytes.chunks(slip::MAX_FRAME) {
            match slip::encode(chunk) {
                Ok(framed) => self.tx_ring.extend(framed),
                Err(err) => {
                    error!("Can't send message: SLIP encode failed: {}", err);
                    return false;
                }
            }
        }

        true
    }

    /// Writes the transmit ring out to the device, one contiguous region at
    /// a time. Completes when the ring is empty.
    pub async fn write_pending(&mut self) -> Result<(), Error> {
        while !self.tx_ring.is_empty() {
            let written = {
                let (head, _) = self.tx_ring.as_slices();
                self.stream.write(head).await
            };
            match written {
                Ok(n) => {
                    self.tx_ring.drain(..n);
                }
                Err(err) => {
                    return Err(self.operational_failure("write", err));
                }
            }
        }
        Ok(())
    }

    /// Performs one async read and drives every received byte through the
    /// ring into the SLIP decoder. Returns the complete frames this read
    /// produced, in arrival order.
    pub async fn read_frames(&mut self) -> Result<Vec<Vec<u8>>, Error> {
        let mut scratch = [0u8; RING_CAPACITY];
        let received = match self.stream.read(&mut scratch).await {
            Ok(0) => {
                let err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "serial EOF");
                return Err(self.operational_failure("read", err));
            }
            Ok(n) => n,
            Err(err) => return Err(self.operational_failure("read", err)),
        };

        for &byte in &scratch[..received] {
            if self.rx_ring.len() >= RING_CAPACITY {
                warn!("Serial receive ring full, dropping byte");
                continue;
            }
            self.rx_ring.push_back(byte);
        }

        let mut frames = Vec::new();
        while let Some(byte) = self.rx_ring.pop_front() {
            match self.decoder.feed(byte) {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => {}
                Err(err) => {
                    // Framer already reset itself; the stream recovers at
                    // the next END byte.
                    warn!("SLIP decode error: {}", err);
                }
            }
        }

        Ok(frames)
    }

    fn operational_failure(&mut self, what: &str, err: std::io::Error) -> Error {
        if err.kind() == std::io::ErrorKind::Interrupted {
            debug!("Serial {} interrupted", what);
            return Error::SerialFault;
        }
        self.state = TransportState::OperationalError;
        error!("Error on serial {}: {}", what, err);
        Error::SerialFault
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("state", &self.state)
            .field("rx_pending", &self.rx_ring.len())
            .field("tx_pending", &self.tx_ring.len())
            .finish()
    }
}
