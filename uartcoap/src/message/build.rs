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

use super::*;

/// Builder for the CoAP requests the bridge originates itself (observe
/// registrations, display updates, vibration commands, and the rest of the
/// SRC resource catalog).
///
/// Options are emitted in strict numeric order: Observe (6), Uri-Path (11,
/// repeated), Content-Format (12), Uri-Query (15, repeated). Payloads are
/// only emitted for POST requests.
///
/// ```
/// use uartcoap::message::{Method, RequestBuilder};
///
/// let msg = RequestBuilder::new(Method::Get, 0x1234)
///     .path(&["st", "joystick", "combined"])
///     .observe(0)
///     .build();
/// assert_eq!(msg[0], 0x40); // version 1, CON, empty token
/// ```
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    msg_type: MsgType,
    method: Method,
    mid: u16,
    token: Vec<u8>,
    uri_path: Vec<String>,
    uri_query: Vec<String>,
    content_format: Option<ContentFormat>,
    observe: Option<u32>,
    payload: Vec<u8>,
}

impl RequestBuilder {
    /// Creates a builder for a confirmable request with the given method and
    /// message ID.
    pub fn new(method: Method, mid: u16) -> RequestBuilder {
        RequestBuilder {
            msg_type: MsgType::Con,
            method,
            mid,
            token: Vec::new(),
            uri_path: Vec::new(),
            uri_query: Vec::new(),
            content_format: None,
            observe: None,
            payload: Vec::new(),
        }
    }

    /// Overrides the message type (defaults to CON).
    pub fn msg_type(mut self, msg_type: MsgType) -> Self {
        self.msg_type = msg_type;
        self
    }

    /// Sets the message token.
    ///
    /// # Panics
    ///
    /// Panics if the token is longer than [`MAX_TOKEN_LEN`]; token lengths
    /// are fixed at the call site, so this is a programming error rather
    /// than a runtime condition.
    pub fn token(mut self, token: &[u8]) -> Self {
        assert!(token.len() <= MAX_TOKEN_LEN, "token too long");
        self.token = token.to_vec();
        self
    }

    /// Appends Uri-Path segments.
    pub fn path(mut self, segments: &[&str]) -> Self {
        self.uri_path.extend(segments.iter().map(|s| s.to_string()));
        self
    }

    /// Appends a Uri-Query argument.
    pub fn query(mut self, query: &str) -> Self {
        self.uri_query.push(query.to_string());
        self
    }

    /// Sets the Content-Format option.
    pub fn content_format(mut self, format: ContentFormat) -> Self {
        self.content_format = Some(format);
        self
    }

    /// Adds an Observe option with the given value (0 registers, 1
    /// deregisters).
    pub fn observe(mut self, value: u32) -> Self {
        self.observe = Some(value);
        self
    }

    /// Sets the request payload. Ignored unless the method is POST.
    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    /// Serializes the request.
    pub fn build(self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(
            HEADER_LEN + self.token.len() + self.payload.len() + 16,
        );

        msg.push(0x40 | ((self.msg_type as u8) << 4) | self.token.len() as u8);
        msg.push(self.method as u8);
        msg.push((self.mid >> 8) as u8);
        msg.push(self.mid as u8);
        msg.extend_from_slice(&self.token);

        let mut options = OptionWriter::new(&mut msg);
        if let Some(value) = self.observe {
            options.insert_uint(OPT_OBSERVE, value);
        }
        for segment in &self.uri_path {
            options.insert(OPT_URI_PATH, segment.as_bytes());
        }
        if let Some(format) = self.content_format {
            options.insert_uint(OPT_CONTENT_FORMAT, u32::from(format.0));
        }
        for query in &self.uri_query {
            options.insert(OPT_URI_QUERY, query.as_bytes());
        }

        if self.method == Method::Post && !self.payload.is_empty() {
            msg.push(PAYLOAD_MARKER);
            msg.extend_from_slice(&self.payload);
        }

        msg
    }
}

/// Serializes options with delta encoding. Options must be inserted in
/// non-decreasing numeric order.
struct OptionWriter<'a> {
    out: &'a mut Vec<u8>,
    last_number: u16,
}

impl<'a> OptionWriter<'a> {
    fn new(out: &'a mut Vec<u8>) -> OptionWriter<'a> {
        OptionWriter {
            out,
            last_number: 0,
        }
    }

    fn insert(&mut self, number: u16, value: &[u8]) {
        debug_assert!(number >= self.last_number, "options must be ordered");
        let delta = number - self.last_number;
        self.last_number = number;

        let len = value.len() as u16;
        self.out.push((nibble(delta) << 4) | nibble(len));
        push_extended(self.out, delta);
        push_extended(self.out, len);
        self.out.extend_from_slice(value);
    }

    /// Inserts an option carrying a uint value in its shortest big-endian
    /// form (0, 1, 2, or 4 bytes).
    fn insert_uint(&mut self, number: u16, value: u32) {
        let mut scratch = [0u8; 4];
        self.insert(number, uint_bytes(value, &mut scratch));
    }
}

fn nibble(x: u16) -> u8 {
    if x < 13 {
        x as u8
    } else if x < 269 {
        13
    } else {
        14
    }
}

fn push_extended(out: &mut Vec<u8>, x: u16) {
    if x >= 269 {
        let rest = x - 269;
        out.push((rest >> 8) as u8);
        out.push(rest as u8);
    } else if x >= 13 {
        out.push((x - 13) as u8);
    }
}

fn uint_bytes(value: u32, scratch: &mut [u8; 4]) -> &[u8] {
    *scratch = value.to_be_bytes();
    if value == 0 {
        &scratch[..0]
    } else if value <= 0xFF {
        &scratch[3..]
    } else if value <= 0xFFFF {
        &scratch[2..]
    } else {
        &scratch[..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_header_options_and_payload() {
        let msg = RequestBuilder::new(Method::Post, 0x1234)
            .token(&[0xAA, 0xBB])
            .path(&["foo", "bar"])
            .content_format(ContentFormat::CBOR)
            .observe(1)
            .payload(&[0xDE, 0xAD])
            .build();

        assert_eq!(msg[0], 0x40 | (0 << 4) | 2);
        assert_eq!(msg[1], Method::Post as u8);
        assert_eq!(&msg[2..4], &[0x12, 0x34]);
        assert_eq!(&msg[4..6], &[0xAA, 0xBB]);

        let expected_options = [
            0x61, 0x01, // Observe, value 1
            0x53, b'f', b'o', b'o', // Uri-Path "foo"
            0x03, b'b', b'a', b'r', // Uri-Path "bar"
            0x11, 60, // Content-Format application/cbor
        ];
        assert_eq!(&msg[6..6 + expected_options.len()], &expected_options[..]);

        let marker = 6 + expected_options.len();
        assert_eq!(msg[marker], PAYLOAD_MARKER);
        assert_eq!(&msg[marker + 1..], &[0xDE, 0xAD]);
    }

    #[test]
    fn get_requests_never_carry_payload() {
        let msg = RequestBuilder::new(Method::Get, 0x0101)
            .path(&["alpha"])
            .payload(&[0x01])
            .build();

        assert_eq!(token_len(&msg), 0);
        assert!(!msg.contains(&PAYLOAD_MARKER));
    }

    #[test]
    fn query_options_follow_uri_path() {
        let msg = RequestBuilder::new(Method::Get, 0x0001)
            .path(&["deviceInfo"])
            .query("radioMode")
            .build();

        // Uri-Path delta 11, then Uri-Query delta 4.
        assert_eq!(msg[4], 0xBA);
        let query_at = 4 + 1 + "deviceInfo".len();
        assert_eq!(msg[query_at], 0x49);
        assert_eq!(&msg[query_at + 1..query_at + 10], b"radioMode");
    }

    #[test]
    fn long_values_use_nibble_extensions() {
        let long = "x".repeat(20);
        let msg = RequestBuilder::new(Method::Get, 0x0001)
            .path(&[long.as_str()])
            .build();

        // Delta 11, length 13 + extension byte of 20 - 13.
        assert_eq!(msg[4], 0xBD);
        assert_eq!(msg[5], 7);
        assert_eq!(&msg[6..26], long.as_bytes());
    }

    #[test]
    fn uint_values_use_shortest_encoding() {
        let mut scratch = [0u8; 4];
        assert_eq!(uint_bytes(0, &mut scratch), &[] as &[u8]);
        let mut scratch = [0u8; 4];
        assert_eq!(uint_bytes(0x2A, &mut scratch), &[0x2A]);
        let mut scratch = [0u8; 4];
        assert_eq!(uint_bytes(0x0102, &mut scratch), &[0x01, 0x02]);
        let mut scratch = [0u8; 4];
        assert_eq!(uint_bytes(0x00010000, &mut scratch), &[0x00, 0x01, 0x00, 0x00]);
    }
}
