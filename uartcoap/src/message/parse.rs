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
use log::warn;

/// Iterator over the options region of a CoAP message, yielding
/// `(option number, value)` pairs. Stops at the payload marker or the end of
/// the buffer; a malformed option yields one `Err` and then terminates.
pub(crate) struct OptionWalker<'a> {
    buf: &'a [u8],
    pos: usize,
    number: u16,
    failed: bool,
}

impl<'a> OptionWalker<'a> {
    /// `buf` is the options region: everything after the token, up to the
    /// end of the message.
    pub(crate) fn new(buf: &'a [u8]) -> OptionWalker<'a> {
        OptionWalker {
            buf,
            pos: 0,
            number: 0,
            failed: false,
        }
    }

    /// Offset of the first byte not consumed by options (the payload marker,
    /// or the end of the buffer).
    pub(crate) fn offset(&self) -> usize {
        self.pos
    }

    fn extended(&mut self, nibble: u8) -> Result<u16, Error> {
        match nibble {
            13 => {
                let byte = *self.buf.get(self.pos).ok_or(Error::InvalidCoap)?;
                self.pos += 1;
                Ok(13 + u16::from(byte))
            }
            14 => {
                if self.pos + 2 > self.buf.len() {
                    return Err(Error::InvalidCoap);
                }
                let value =
                    (u16::from(self.buf[self.pos]) << 8) | u16::from(self.buf[self.pos + 1]);
                self.pos += 2;
                Ok(269 + value)
            }
            15 => Err(Error::InvalidCoap),
            n => Ok(u16::from(n)),
        }
    }
}

impl<'a> Iterator for OptionWalker<'a> {
    type Item = Result<(u16, &'a [u8]), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.buf.len() || self.buf[self.pos] == PAYLOAD_MARKER {
            return None;
        }

        let header = self.buf[self.pos];
        self.pos += 1;

        let result = (|| {
            let delta = self.extended(header >> 4)?;
            let len = self.extended(header & 0x0F)? as usize;
            let start = self.pos;
            if start + len > self.buf.len() {
                return Err(Error::InvalidCoap);
            }
            self.pos = start + len;
            self.number += delta;
            Ok((self.number, &self.buf[start..start + len]))
        })();

        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Extracts the Uri-Path of a message as a `/`-joined string
/// (e.g. `st/joystick/combined`).
///
/// Malformed option bytes truncate the walk with a warning; this never
/// panics on hostile input.
pub fn uri_path(buf: &[u8]) -> String {
    if !looks_like_coap(buf) {
        return String::new();
    }

    let mut segments = Vec::new();
    for item in OptionWalker::new(&buf[HEADER_LEN + token_len(buf)..]) {
        match item {
            Ok((OPT_URI_PATH, value)) => {
                segments.push(String::from_utf8_lossy(value).into_owned());
            }
            Ok(_) => {}
            Err(_) => {
                warn!("Malformed option while extracting Uri-Path, truncating");
                break;
            }
        }
    }

    segments.join("/")
}

/// The pieces of an observe notification the bridge cares about.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ObserveReply {
    /// Message ID.
    pub mid: u16,

    /// Message token (tracking tokens already stripped by the port tracker).
    pub token: Vec<u8>,

    /// Payload bytes following the `0xFF` marker, empty when absent.
    pub payload: Vec<u8>,
}

/// Parses an inbound notification, recovering MID, token, and payload.
///
/// Options are skipped, not interpreted. A malformed option region truncates
/// the payload (with a warning) rather than failing the whole message.
pub fn parse_observe_reply(buf: &[u8]) -> Result<ObserveReply, Error> {
    if !looks_like_coap(buf) {
        return Err(Error::InvalidCoap);
    }

    let tkl = token_len(buf);
    let mut reply = ObserveReply {
        mid: msg_id(buf),
        token: buf[TOKEN_OFFSET..TOKEN_OFFSET + tkl].to_vec(),
        payload: Vec::new(),
    };

    let options = &buf[HEADER_LEN + tkl..];
    let mut walker = OptionWalker::new(options);
    for item in &mut walker {
        if item.is_err() {
            warn!("Malformed option in observe reply, truncating payload");
            return Ok(reply);
        }
    }

    let offset = walker.offset();
    if offset < options.len() && options[offset] == PAYLOAD_MARKER {
        reply.payload.extend_from_slice(&options[offset + 1..]);
    }

    Ok(reply)
}
