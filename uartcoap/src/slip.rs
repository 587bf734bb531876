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

//! SLIP framing and deframing ([RFC 1055]).
//!
//! [RFC 1055]: https://tools.ietf.org/html/rfc1055

use crate::Error;

/// Frame delimiter.
pub const END: u8 = 0xC0;
/// Escape introducer.
pub const ESC: u8 = 0xDB;
/// Escaped form of [`END`].
pub const ESC_END: u8 = 0xDC;
/// Escaped form of [`ESC`].
pub const ESC_ESC: u8 = 0xDD;

/// Largest unencoded frame accepted by [`encode`] and accumulated by
/// [`Decoder`]. Sized for a full CoAP message plus tracking tokens.
pub const MAX_FRAME: usize = 512;

/// Encodes `data` as a single SLIP frame.
///
/// The output starts and ends with [`END`]; occurrences of [`END`] and
/// [`ESC`] in the input are byte-stuffed. Fails with
/// [`Error::OversizeFrame`] when the input exceeds [`MAX_FRAME`].
pub fn encode(data: &[u8]) -> Result<Vec<u8>, Error> {
    if data.len() > MAX_FRAME {
        return Err(Error::OversizeFrame);
    }

    let mut framed = Vec::with_capacity(data.len() + 2);
    framed.push(END);
    for &byte in data {
        match byte {
            END => {
                framed.push(ESC);
                framed.push(ESC_END);
            }
            ESC => {
                framed.push(ESC);
                framed.push(ESC_ESC);
            }
            _ => framed.push(byte),
        }
    }
    framed.push(END);

    Ok(framed)
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum State {
    Normal,
    Escaped,
}

/// Byte-at-a-time SLIP decoder.
///
/// Feed received bytes in order; a completed frame is returned as soon as its
/// terminating [`END`] arrives. Frames of fewer than two bytes are silently
/// discarded (link keep-alives). After any decode error the accumulator is
/// reset and the stream recovers at the next [`END`].
#[derive(Debug)]
pub struct Decoder {
    buf: Vec<u8>,
    state: State,
}

impl Decoder {
    /// Creates a decoder with an empty accumulator.
    pub fn new() -> Decoder {
        Decoder {
            buf: Vec::with_capacity(MAX_FRAME),
            state: State::Normal,
        }
    }

    /// Processes one received byte, returning a completed frame if this byte
    /// terminated one.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Vec<u8>>, Error> {
        match self.state {
            State::Normal => match byte {
                END => {
                    if self.buf.len() >= 2 {
                        let frame = std::mem::replace(
                            &mut self.buf,
                            Vec::with_capacity(MAX_FRAME),
                        );
                        Ok(Some(frame))
                    } else {
                        self.buf.clear();
                        Ok(None)
                    }
                }
                ESC => {
                    self.state = State::Escaped;
                    Ok(None)
                }
                _ => self.push(byte),
            },
            State::Escaped => {
                self.state = State::Normal;
                match byte {
                    ESC_END => self.push(END),
                    ESC_ESC => self.push(ESC),
                    _ => {
                        self.reset();
                        Err(Error::UnknownEscape)
                    }
                }
            }
        }
    }

    fn push(&mut self, byte: u8) -> Result<Option<Vec<u8>>, Error> {
        if self.buf.len() >= MAX_FRAME {
            self.reset();
            return Err(Error::BufferOverflow);
        }
        self.buf.push(byte);
        Ok(None)
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.state = State::Normal;
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new()
    }
}
