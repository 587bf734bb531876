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

//! Protocol plumbing for bridging serial-attached CoAP devices to UDP networks.
//!
//! A UDP endpoint has a port, but a serial stream does not. When CoAP traffic
//! for several UDP clients is multiplexed over a single serial link, something
//! has to remember which response belongs to which client. This crate provides
//! the three pieces that make that possible:
//!
//! * [`slip`]: [RFC 1055] byte-stuffed framing, so message boundaries survive
//!   the byte stream.
//! * [`message`]: an [RFC 7252] subset with constant-time header
//!   introspection over raw buffers, a request builder with Observe support,
//!   and tolerant parsing of observe notifications.
//! * [`tracker`]: the [`PortTracker`], which smuggles the originating UDP
//!   port across the serial link inside the CoAP token (falling back to an
//!   expiring message-ID map when the token has no room).
//!
//! The crate performs no I/O of its own; see `uartcoap-tokio` for the serial
//! transport and the UDP↔serial bridge built on top of these primitives.
//!
//! [RFC 1055]: https://tools.ietf.org/html/rfc1055
//! [RFC 7252]: https://tools.ietf.org/html/rfc7252

mod error;

pub mod message;
pub mod slip;
pub mod tracker;

pub use error::Error;
pub use tracker::PortTracker;
