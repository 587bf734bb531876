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

//! Port tracking across the serial link.
//!
//! CoAP responses coming back over the serial stream carry no UDP port, so
//! the tracker records where each exchange came from. Two mechanisms, in
//! preference order:
//!
//! 1. **Tracking tokens**: a three-byte prefix `[marker, port_lo, port_hi]`
//!    prepended to the CoAP token of outbound requests when the token has
//!    room. The marker is a CRC-8 of the two port bytes, so an inbound
//!    response can be recognized as tagged without any state.
//! 2. **MID map**: when the token has no room (or for confirmable responses
//!    and Empty messages), an expiring `MID → port` entry. Entries live for
//!    the CoAP maximum exchange lifetime.
//!
//! All mutation happens on the bridge's event-loop thread, so the map needs
//! no internal locking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::message;
use crate::Error;

/// How long a MID→port mapping stays alive. RFC 7252 §4.8.2 puts the maximum
/// exchange lifetime at 247 s; rounded up.
pub const MID_TIMEOUT: Duration = Duration::from_secs(250);

/// Size of the tracking-token prefix.
pub const TRACKING_TOKEN_LEN: usize = 3;

// Requests with tokens longer than this are never tagged; they fall back to
// MID tracking.
const MAX_TAGGABLE_TOKEN_LEN: usize = 4;

/// CRC-8, polynomial 0x07, no init, no reflection, no final xor.
fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ 0x07;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[derive(Debug, Copy, Clone)]
struct MidEntry {
    port: u16,
    created_at: Instant,
}

/// Maps serial-side CoAP responses back to the UDP port their request came
/// from. See the [module documentation](self) for the tracking rules.
///
/// Message routing rules:
///   Outbound (UDP → serial):
///     Request: insert tracking tokens when possible, track MID when CON
///     Response: track MID when CON
///     Empty: track MID
///     Other: reject
///   Inbound (serial → UDP):
///     Request: don't modify, route to the default port
///     Response: extract tracking tokens if present, else tracked MID,
///       else the default port
///     Empty: tracked MID if present, else the default port
///     Other: reject
#[derive(Debug)]
pub struct PortTracker {
    default_port: u16,
    mids: HashMap<u16, MidEntry>,
}

impl PortTracker {
    /// Creates a tracker that falls back to `default_port` (the remote's
    /// canonical CoAP server port) for unknown exchanges.
    pub fn new(default_port: u16) -> PortTracker {
        PortTracker {
            default_port,
            mids: HashMap::new(),
        }
    }

    /// Prepares an outbound (UDP → serial) message originating from UDP port
    /// `port`.
    ///
    /// `max_len` is the capacity the caller can tolerate `buf` growing to;
    /// tracking tokens are only inserted when at least three bytes of
    /// headroom exist. Fails with [`Error::BufferTooSmall`] when `max_len`
    /// is smaller than the message and [`Error::InvalidCoap`] for buffers
    /// that are not CoAP or carry an unroutable code class.
    pub fn udp_to_serial(
        &mut self,
        port: u16,
        buf: &mut Vec<u8>,
        max_len: usize,
        now: Instant,
    ) -> Result<(), Error> {
        if max_len < buf.len() {
            return Err(Error::BufferTooSmall);
        }
        if !message::looks_like_coap(buf) {
            return Err(Error::InvalidCoap);
        }

        let token_len = message::token_len(buf);
        let mid = message::msg_id(buf);

        if message::is_request(buf) {
            if token_len <= MAX_TAGGABLE_TOKEN_LEN
                && max_len - buf.len() >= TRACKING_TOKEN_LEN
            {
                self.insert_tracking_token(port, buf)?;

                // CON exchanges also get a MID record so the ACK routes even
                // if the peer echoes a bare token.
                if message::msg_type(buf).is_con() {
                    self.track_mid(port, mid, now);
                    debug!(
                        "UDP: added tracking tokens for port {} and tracking MID {:#06x}",
                        port, mid
                    );
                } else {
                    debug!("UDP: added tracking tokens for port {}", port);
                }
            } else {
                self.track_mid(port, mid, now);
                debug!("UDP: tracking MID {:#06x} -> port {}", mid, port);
            }
            Ok(())
        } else if message::is_response(buf) {
            if message::msg_type(buf).is_con() {
                self.track_mid(port, mid, now);
                debug!("UDP: tracking response MID {:#06x} -> port {}", mid, port);
            }
            Ok(())
        } else if message::is_empty(buf) {
            self.track_mid(port, mid, now);
            debug!("UDP: tracking empty MID {:#06x} -> port {}", mid, port);
            Ok(())
        } else {
            warn!(
                "UDP: rejecting message from port {}: not request/response/empty",
                port
            );
            Err(Error::InvalidCoap)
        }
    }

    /// Routes an inbound (serial → UDP) message, returning the UDP port it
    /// should be forwarded to. Tracking tokens, when present, are stripped
    /// from the buffer.
    pub fn serial_to_udp(&mut self, buf: &mut Vec<u8>) -> Result<u16, Error> {
        if !message::looks_like_coap(buf) {
            return Err(Error::InvalidCoap);
        }

        let token_len = message::token_len(buf);
        let mid = message::msg_id(buf);

        if message::is_request(buf) {
            debug!(
                "Serial: forwarding request MID {:#06x} to port {}",
                mid, self.default_port
            );
            Ok(self.default_port)
        } else if message::is_response(buf) {
            if token_len >= TRACKING_TOKEN_LEN && has_tracking_token(buf) {
                let port = self.extract_tracking_token(buf)?;
                debug!("Serial: extracted port {} from tracking tokens", port);
                Ok(port)
            } else {
                Ok(self.lookup_mid(mid))
            }
        } else if message::is_empty(buf) {
            Ok(self.lookup_mid(mid))
        } else {
            warn!("Serial: rejecting message: not request/response/empty");
            Err(Error::InvalidCoap)
        }
    }

    /// Drops every mapping whose age is at least [`MID_TIMEOUT`]. Called
    /// from the bridge's periodic sweep timer.
    pub fn remove_expired(&mut self, now: Instant) {
        self.mids.retain(|mid, entry| {
            let live = now.duration_since(entry.created_at) < MID_TIMEOUT;
            if !live {
                debug!("Erasing old tracked MID {:#06x} : port {}", mid, entry.port);
            }
            live
        });
    }

    /// Forgets every tracked exchange.
    pub fn clear(&mut self) {
        self.mids.clear();
    }

    fn track_mid(&mut self, port: u16, mid: u16, now: Instant) {
        match self.mids.get_mut(&mid) {
            None => {
                self.mids.insert(
                    mid,
                    MidEntry {
                        port,
                        created_at: now,
                    },
                );
            }
            Some(entry) if entry.port == port => {
                entry.created_at = now;
            }
            Some(entry) => {
                debug!(
                    "Overwriting existing association of MID {:#06x} : port {} with new port {}",
                    mid, entry.port, port
                );
                *entry = MidEntry {
                    port,
                    created_at: now,
                };
            }
        }
    }

    fn lookup_mid(&self, mid: u16) -> u16 {
        match self.mids.get(&mid) {
            Some(entry) => {
                debug!(
                    "Serial: got mapping for MID {:#06x}, sending to port {}",
                    mid, entry.port
                );
                entry.port
            }
            None => {
                debug!(
                    "Serial: no mapping for MID {:#06x}, sending to port {}",
                    mid, self.default_port
                );
                self.default_port
            }
        }
    }

    fn insert_tracking_token(&self, port: u16, buf: &mut Vec<u8>) -> Result<(), Error> {
        let token_len = message::token_len(buf);
        let port_bytes = port.to_le_bytes();
        let prefix = [crc8(&port_bytes), port_bytes[0], port_bytes[1]];

        buf.splice(
            message::TOKEN_OFFSET..message::TOKEN_OFFSET,
            prefix.iter().copied(),
        );
        message::set_token_len(buf, token_len + TRACKING_TOKEN_LEN)
    }

    fn extract_tracking_token(&self, buf: &mut Vec<u8>) -> Result<u16, Error> {
        let token_len = message::token_len(buf);
        let port = u16::from_le_bytes([
            buf[message::TOKEN_OFFSET + 1],
            buf[message::TOKEN_OFFSET + 2],
        ]);

        buf.drain(message::TOKEN_OFFSET..message::TOKEN_OFFSET + TRACKING_TOKEN_LEN);
        message::set_token_len(buf, token_len - TRACKING_TOKEN_LEN)?;
        Ok(port)
    }
}

/// True when the first token byte is the CRC-8 marker of the next two.
fn has_tracking_token(buf: &[u8]) -> bool {
    let t = message::TOKEN_OFFSET;
    buf[t] == crc8(&buf[t + 1..t + 3])
}
