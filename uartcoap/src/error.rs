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

use std::fmt::{Display, Formatter};

/// Type for errors encountered while framing, parsing, or routing CoAP
/// traffic across the serial link.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub enum Error {
    /// The buffer does not hold a well-formed CoAP message, or holds a code
    /// class the router has no rule for.
    InvalidCoap,

    /// The destination buffer cannot hold the result of the operation.
    BufferTooSmall,

    /// The frame handed to the SLIP encoder exceeds the maximum frame size.
    OversizeFrame,

    /// The SLIP decode accumulator filled up before the frame terminated.
    BufferOverflow,

    /// SLIP decode encountered an invalid escape sequence.
    UnknownEscape,

    /// A serial open, read, or write failed for a reason other than
    /// cancellation.
    SerialFault,

    /// The local UDP socket could not be bound.
    BindFailure,

    /// A payload failed its CRC check.
    CrcMismatch,

    /// A payload could not be decoded (CBOR or fixed-layout).
    PayloadCodec,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let desc = match self {
            Error::InvalidCoap => "not a valid CoAP message",
            Error::BufferTooSmall => "destination buffer too small",
            Error::OversizeFrame => "frame exceeds maximum frame size",
            Error::BufferOverflow => "decode buffer overflow",
            Error::UnknownEscape => "unknown SLIP escape sequence",
            Error::SerialFault => "serial port failure",
            Error::BindFailure => "failed to bind local socket",
            Error::CrcMismatch => "payload CRC mismatch",
            Error::PayloadCodec => "payload decode failure",
        };
        f.write_str(desc)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(_: std::io::Error) -> Self {
        Error::SerialFault
    }
}
