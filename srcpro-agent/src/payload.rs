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

//! CBOR payload shapes used by the SRC Pro resource endpoints.
//!
//! The request catalog and telemetry handlers go through these helpers
//! rather than touching the CBOR library directly, so the payload wire
//! shapes live in one place.

use log::debug;
use minicbor::data::Type;
use minicbor::{Decoder, Encoder};

use uartcoap::Error;

/// Display lines are at most 18 characters.
pub const DISPLAY_LINE_LEN: usize = 18;
/// Display segments are at most 6 characters.
pub const DISPLAY_SEGMENT_LEN: usize = 6;

/// Battery metrics reported by `deviceInfo?batteryStatus`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct BatteryStatus {
    /// Remaining charge in percent.
    pub percent: i32,
    /// Pack voltage.
    pub volts: f64,
    /// Pack temperature in Celsius.
    pub temp_c: f64,
    /// Instantaneous current draw.
    pub amps: f64,
}

fn encoded<F>(fill: F) -> Vec<u8>
where
    F: FnOnce(&mut Encoder<Vec<u8>>) -> Result<(), minicbor::encode::Error<std::convert::Infallible>>,
{
    let mut encoder = Encoder::new(Vec::new());
    // Encoding into a Vec cannot fail; the closure only ever returns Ok.
    let _ = fill(&mut encoder);
    encoder.into_writer()
}

/// Encodes a bare unsigned integer.
pub fn encode_uint(value: u64) -> Vec<u8> {
    encoded(|e| e.u64(value).map(|_| ()))
}

/// Encodes a text string.
pub fn encode_text(text: &str) -> Vec<u8> {
    encoded(|e| e.str(text).map(|_| ()))
}

/// Encodes a byte string.
pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    encoded(|e| e.bytes(bytes).map(|_| ()))
}

/// Firmware metadata map: `{ "filename": <text>, "length": <uint>,
/// "crc32": <uint> }`.
pub fn encode_file_metadata(filename: &str, length: u32, crc32: u32) -> Vec<u8> {
    encoded(|e| {
        e.map(3)?
            .str("filename")?
            .str(filename)?
            .str("length")?
            .u32(length)?
            .str("crc32")?
            .u32(crc32)?;
        Ok(())
    })
}

/// Display segment map: `{ "display_text": [ line, segment, <text> ] }`,
/// text truncated to six characters.
pub fn encode_display_segment(line: u8, segment: u8, text: &str) -> Vec<u8> {
    let text = truncated(text, DISPLAY_SEGMENT_LEN);
    encoded(|e| {
        e.map(1)?
            .str("display_text")?
            .array(3)?
            .u8(line)?
            .u8(segment)?
            .str(text)?;
        Ok(())
    })
}

/// Raw two-line display write as a byte string:
/// `line0 (≤18 chars) | line1 (≤18 chars) | half selector`.
pub fn encode_two_lines(line0: &str, line1: &str, upper_half: bool) -> Vec<u8> {
    let line0 = truncated(line0, DISPLAY_LINE_LEN);
    let line1 = truncated(line1, DISPLAY_LINE_LEN);

    let mut raw = Vec::with_capacity(line0.len() + line1.len() + 1);
    raw.extend_from_slice(line0.as_bytes());
    raw.extend_from_slice(line1.as_bytes());
    raw.push(if upper_half { 1 } else { 0 });

    encode_bytes(&raw)
}

/// Decodes the battery-status map `{ percent: int, volts: double,
/// tempC: double, amps: double }`. Unknown keys are skipped.
pub fn decode_battery(payload: &[u8]) -> Result<BatteryStatus, Error> {
    let mut decoder = Decoder::new(payload);
    let entries = decoder.map().map_err(|err| {
        debug!("Battery payload is not a CBOR map: {}", err);
        Error::PayloadCodec
    })?;
    let entries = entries.ok_or(Error::PayloadCodec)?;

    let mut status = BatteryStatus::default();
    for _ in 0..entries {
        let key = decoder.str().map_err(|_| Error::PayloadCodec)?;
        match key {
            "percent" => {
                status.percent =
                    decoder.i64().map_err(|_| Error::PayloadCodec)? as i32;
            }
            "volts" => status.volts = number(&mut decoder)?,
            "tempC" => status.temp_c = number(&mut decoder)?,
            "amps" => status.amps = number(&mut decoder)?,
            _ => {
                decoder.skip().map_err(|_| Error::PayloadCodec)?;
            }
        }
    }

    Ok(status)
}

fn number(decoder: &mut Decoder<'_>) -> Result<f64, Error> {
    let datatype = decoder.datatype().map_err(|_| Error::PayloadCodec)?;
    let value = match datatype {
        Type::F64 => decoder.f64().map_err(|_| Error::PayloadCodec)?,
        Type::F32 => f64::from(decoder.f32().map_err(|_| Error::PayloadCodec)?),
        Type::U8 | Type::U16 | Type::U32 | Type::U64 | Type::I8 | Type::I16 | Type::I32
        | Type::I64 => decoder.i64().map_err(|_| Error::PayloadCodec)? as f64,
        _ => return Err(Error::PayloadCodec),
    };
    Ok(value)
}

fn truncated(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((at, _)) => &text[..at],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_encodings() {
        // Canonical CBOR: 1 is the single byte 0x01, small byte strings get
        // a 0x40-based prefix, short texts a 0x60-based prefix.
        assert_eq!(encode_uint(1), vec![0x01]);
        assert_eq!(encode_bytes(&[1]), vec![0x41, 0x01]);
        assert_eq!(encode_text("ab"), vec![0x62, b'a', b'b']);
    }

    #[test]
    fn two_lines_layout() {
        let payload = encode_two_lines("Ready", "Joystick active", true);
        // Byte string header (0x40 | len) followed by both lines and the
        // half selector.
        let body_len = "Ready".len() + "Joystick active".len() + 1;
        assert_eq!(payload[0], 0x40 | body_len as u8);
        assert_eq!(&payload[1..6], b"Ready");
        assert_eq!(payload[payload.len() - 1], 1);
    }

    #[test]
    fn two_lines_truncates_long_input() {
        let long = "x".repeat(40);
        let payload = encode_two_lines(&long, "", false);
        assert_eq!(payload[0], 0x40 | (DISPLAY_LINE_LEN + 1) as u8);
        assert_eq!(payload[payload.len() - 1], 0);
    }

    #[test]
    fn battery_round_trip() {
        let payload = encoded(|e| {
            e.map(4)?
                .str("percent")?
                .i64(87)?
                .str("volts")?
                .f64(14.8)?
                .str("tempC")?
                .f64(31.5)?
                .str("amps")?
                .f64(-2.25)?;
            Ok(())
        });

        let status = decode_battery(&payload).unwrap();
        assert_eq!(status.percent, 87);
        assert!((status.volts - 14.8).abs() < 1e-9);
        assert!((status.temp_c - 31.5).abs() < 1e-9);
        assert!((status.amps + 2.25).abs() < 1e-9);
    }

    #[test]
    fn battery_tolerates_unknown_keys_and_integer_values() {
        let payload = encoded(|e| {
            e.map(3)?
                .str("percent")?
                .i64(55)?
                .str("health")?
                .str("good")?
                .str("volts")?
                .u8(15)?;
            Ok(())
        });

        let status = decode_battery(&payload).unwrap();
        assert_eq!(status.percent, 55);
        assert!((status.volts - 15.0).abs() < 1e-9);
    }

    #[test]
    fn battery_rejects_non_map_payloads() {
        assert_eq!(decode_battery(&encode_uint(7)), Err(Error::PayloadCodec));
        assert_eq!(decode_battery(&[]), Err(Error::PayloadCodec));
    }

    #[test]
    fn display_segment_structure() {
        let payload = encode_display_segment(2, 1, "STATUS");
        // Map of one entry whose key is "display_text".
        assert_eq!(payload[0], 0xA1);
        assert_eq!(payload[1], 0x60 | "display_text".len() as u8);
        assert_eq!(&payload[2..14], b"display_text");
        // Three-element array: line, segment, text.
        assert_eq!(payload[14], 0x83);
        assert_eq!(payload[15], 0x02);
        assert_eq!(payload[16], 0x01);
    }

    #[test]
    fn file_metadata_contains_all_keys() {
        let payload = encode_file_metadata("firmware.bin", 1024, 0xDEADBEEF);
        let mut decoder = Decoder::new(&payload);
        assert_eq!(decoder.map().unwrap(), Some(3));
        assert_eq!(decoder.str().unwrap(), "filename");
        assert_eq!(decoder.str().unwrap(), "firmware.bin");
        assert_eq!(decoder.str().unwrap(), "length");
        assert_eq!(decoder.u32().unwrap(), 1024);
        assert_eq!(decoder.str().unwrap(), "crc32");
        assert_eq!(decoder.u32().unwrap(), 0xDEADBEEF);
    }
}
