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

//! CoAP message introspection, building, and parsing ([RFC 7252] subset).
//!
//! The bridge mostly treats CoAP messages as opaque byte buffers and only
//! needs constant-time access to the fixed header, so the read-side API here
//! operates directly on `&[u8]` rather than deserializing into an owned
//! message type.
//!
//! [RFC 7252]: https://tools.ietf.org/html/rfc7252

mod build;
mod parse;

pub use build::RequestBuilder;
pub use parse::{parse_observe_reply, uri_path, ObserveReply};

use crate::Error;

/// Length of the fixed CoAP header.
pub const HEADER_LEN: usize = 4;
/// Offset of the first token byte.
pub const TOKEN_OFFSET: usize = 4;
/// Maximum token length permitted by RFC 7252.
pub const MAX_TOKEN_LEN: usize = 8;
/// End-of-options / start-of-payload marker.
pub const PAYLOAD_MARKER: u8 = 0xFF;

/// Observe option number (RFC 7641).
pub const OPT_OBSERVE: u16 = 6;
/// Uri-Path option number.
pub const OPT_URI_PATH: u16 = 11;
/// Content-Format option number.
pub const OPT_CONTENT_FORMAT: u16 = 12;
/// Uri-Query option number.
pub const OPT_URI_QUERY: u16 = 15;

/// Observe option value registering a subscription.
pub const OBSERVE_REGISTER: u32 = 0;
/// Observe option value cancelling a subscription.
pub const OBSERVE_DEREGISTER: u32 = 1;

/// Enum representing the CoAP message type: `CON`, `NON`, `ACK`, and `RST`.
#[derive(Debug, Copy, Eq, PartialEq, Clone)]
pub enum MsgType {
    /// Variant for confirmable CoAP messages.
    Con = 0,

    /// Variant for non-confirmable CoAP messages.
    Non = 1,

    /// Variant for CoAP message acknowledgements.
    Ack = 2,

    /// Variant for CoAP reset messages.
    Rst = 3,
}

impl MsgType {
    /// Creates a `MsgType` from the two type bits of a header byte.
    pub fn from_bits(bits: u8) -> MsgType {
        match bits & 0x3 {
            0 => MsgType::Con,
            1 => MsgType::Non,
            2 => MsgType::Ack,
            _ => MsgType::Rst,
        }
    }

    /// Returns true if this message type is confirmable (CON).
    pub fn is_con(self) -> bool {
        self == MsgType::Con
    }
}

impl Default for MsgType {
    fn default() -> Self {
        MsgType::Con
    }
}

/// Request methods the bridge originates. Proxied traffic may carry any code;
/// self-issued requests are only ever GET or POST.
#[derive(Debug, Copy, Eq, PartialEq, Clone)]
pub enum Method {
    /// CoAP GET method.
    Get = 0x01,

    /// CoAP POST method.
    Post = 0x02,
}

/// A CoAP Content-Format value.
#[derive(Debug, Copy, Eq, PartialEq, Clone, Hash)]
pub struct ContentFormat(pub u16);

impl ContentFormat {
    /// `text/plain;charset=utf-8`
    pub const TEXT_PLAIN: ContentFormat = ContentFormat(0);

    /// `application/octet-stream`
    pub const OCTET_STREAM: ContentFormat = ContentFormat(42);

    /// `application/cbor`
    pub const CBOR: ContentFormat = ContentFormat(60);
}

/// Returns the message type encoded in the header.
///
/// Like the rest of the read-side accessors, this expects a buffer that has
/// already passed [`looks_like_coap`].
pub fn msg_type(buf: &[u8]) -> MsgType {
    MsgType::from_bits(buf[0] >> 4)
}

/// Returns the token length nibble.
pub fn token_len(buf: &[u8]) -> usize {
    (buf[0] & 0x0F) as usize
}

/// Rewrites the token length nibble in place.
///
/// Fails with [`Error::InvalidCoap`] for lengths greater than
/// [`MAX_TOKEN_LEN`].
pub fn set_token_len(buf: &mut [u8], len: usize) -> Result<(), Error> {
    if len > MAX_TOKEN_LEN {
        return Err(Error::InvalidCoap);
    }
    buf[0] = (buf[0] & 0xF0) | (len as u8 & 0x0F);
    Ok(())
}

/// Returns the raw code byte.
pub fn code(buf: &[u8]) -> u8 {
    buf[1]
}

/// Returns the code class (high three bits of the code byte).
pub fn code_class(buf: &[u8]) -> u8 {
    (buf[1] >> 5) & 0x7
}

/// Returns the code detail (low five bits of the code byte).
pub fn code_detail(buf: &[u8]) -> u8 {
    buf[1] & 0x1F
}

/// Returns the message ID in host order.
pub fn msg_id(buf: &[u8]) -> u16 {
    (u16::from(buf[2]) << 8) | u16::from(buf[3])
}

/* Code value ranges: class 0-7, detail 0-31
 *   0.00       Empty
 *   0.01-0.31  Request
 *   1.00-1.31  reserved
 *   2.00-5.31  Response
 *   6.00-7.31  reserved
 */

/// Returns true for the Empty code (0.00).
pub fn is_empty(buf: &[u8]) -> bool {
    code(buf) == 0
}

/// Returns true for request codes (0.01-0.31).
pub fn is_request(buf: &[u8]) -> bool {
    code_class(buf) == 0 && code_detail(buf) >= 1
}

/// Returns true for response codes (2.00-5.31).
pub fn is_response(buf: &[u8]) -> bool {
    let class = code_class(buf);
    (2..=5).contains(&class)
}

/// Cheap plausibility check: version field is 01, the token length is legal,
/// and the buffer is long enough to hold the header plus token.
pub fn looks_like_coap(buf: &[u8]) -> bool {
    if buf.len() < HEADER_LEN {
        return false;
    }
    let tkl = token_len(buf);
    buf.len() >= HEADER_LEN + tkl && (buf[0] & 0xC0) == 0x40 && tkl <= MAX_TOKEN_LEN
}

/// Builds an RST message for the given message ID.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |Ver| T |  TKL  |      Code     |          Message ID           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  01   3     0          0.00            network byte order
/// ```
pub fn reset_message(mid: u16) -> [u8; 4] {
    [0x70, 0x00, (mid >> 8) as u8, mid as u8]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_accessors() {
        // CON GET, MID 0x1234, TKL 2.
        let buf = [0x42u8, 0x01, 0x12, 0x34, 0xAA, 0xBB];
        assert_eq!(msg_type(&buf), MsgType::Con);
        assert_eq!(token_len(&buf), 2);
        assert_eq!(msg_id(&buf), 0x1234);
        assert!(is_request(&buf));
        assert!(!is_response(&buf));
        assert!(!is_empty(&buf));
        assert!(looks_like_coap(&buf));
    }

    #[test]
    fn response_and_empty_classification() {
        let mut buf = [0x60u8, 0x45, 0x00, 0x01];
        assert!(is_response(&buf));
        buf[1] = 0x00;
        assert!(is_empty(&buf));
        assert!(!is_request(&buf));
    }

    #[test]
    fn looks_like_coap_rejects_bad_version_and_short_buffers() {
        let ok = [0x40u8, 0x01, 0x00, 0x01];
        assert!(looks_like_coap(&ok));

        let bad_version = [0x00u8, 0x01, 0x00, 0x01];
        assert!(!looks_like_coap(&bad_version));

        // TKL says 5 but only the header is present.
        let truncated = [0x45u8, 0x01, 0x00, 0x01];
        assert!(!looks_like_coap(&truncated));

        assert!(!looks_like_coap(&[0x40, 0x01, 0x00]));
    }

    #[test]
    fn set_token_len_rejects_values_greater_than_eight() {
        let mut buf = [0x40u8, 0x01, 0x00, 0x00];
        assert_eq!(set_token_len(&mut buf, 9), Err(Error::InvalidCoap));
        assert_eq!(set_token_len(&mut buf, 3), Ok(()));
        assert_eq!(token_len(&buf), 3);
    }

    #[test]
    fn reset_message_layout() {
        assert_eq!(reset_message(0xA1B2), [0x70, 0x00, 0xA1, 0xB2]);
    }
}
