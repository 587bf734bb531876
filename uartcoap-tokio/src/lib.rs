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

//! [Tokio][]-based transport layer for [`uartcoap`]: a SLIP-framed serial
//! transport and the UDP↔serial CoAP bridge that ties it to a bound UDP
//! socket through the port tracker.
//!
//! Everything here runs on a single-threaded, cooperative event loop: the
//! bridge owns the serial port, the UDP socket, and all timers, and drives
//! them from one `select!` loop. Handlers run to completion and never block
//! on I/O. The one concession to the outside world is a command channel, so
//! other threads (such as a vehicle-control worker) can submit requests for
//! the serial side without touching the loop's state.
//!
//! [Tokio]: https://tokio.rs/

mod bridge;
mod serial;
mod suppress;

pub use bridge::{BridgeConfig, BridgeHandle, InternalHandler, UartCoapBridge};
pub use bridge::{INTERNAL_PORT_MAX, INTERNAL_PORT_MIN};
pub use serial::{SerialTransport, TransportState, BAUD_RATE};
pub use suppress::SuppressedLog;
