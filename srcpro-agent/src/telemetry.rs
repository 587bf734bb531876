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

//! Decoders for the SRC Pro's fixed-layout telemetry payloads.
//!
//! All multi-byte fields are little-endian. Axis samples pack a 12-bit
//! signed value and a validity flag into a 16-bit word; the layout is
//! decoded with explicit shifts and masks rather than anything resembling a
//! C bit-field.

use log::{debug, warn};

use uartcoap::Error;

/// Size of a keypad block: button bitmap + CRC-16.
pub const KEYPAD_DATA_LEN: usize = 4;
/// Size of a joystick block: six axis words + CRC-16.
pub const JOYSTICK_DATA_LEN: usize = 14;
/// Size of a combined report: keypad block then joystick block.
pub const COMBINED_REPORT_LEN: usize = KEYPAD_DATA_LEN + JOYSTICK_DATA_LEN;

/// Full scale of a calibrated axis sample.
pub const AXIS_FULL_SCALE: i16 = 2047;

/// CRC-16, polynomial 0xA001 (reflected 0x8005), init 0, no final xor.
/// Guards the keypad and joystick blocks.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xA001
            } else {
                crc >> 1
            };
        }
    }
    crc
}

/// One calibrated axis sample: 12-bit signed value plus a validity flag
/// supplied by the controller.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct AxisSample {
    /// Calibrated deflection in `[-2048, 2047]`.
    pub value: i16,

    /// False when the controller flagged the sample invalid.
    pub ok: bool,
}

impl AxisSample {
    /// Decodes a raw 16-bit axis word: value in the low 12 bits
    /// (two's complement), validity flag at bit 12.
    pub fn from_raw(raw: u16) -> AxisSample {
        let twelve = (raw & 0x0FFF) as i16;
        let value = if twelve & 0x0800 != 0 {
            twelve - 0x1000
        } else {
            twelve
        };
        AxisSample {
            value,
            ok: raw & 0x1000 != 0,
        }
    }
}

/// The six calibrated joystick axes.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct JoystickData {
    /// Left stick X axis.
    pub left_x: AxisSample,
    /// Left stick Y axis.
    pub left_y: AxisSample,
    /// Left stick Z axis.
    pub left_z: AxisSample,
    /// Right stick X axis.
    pub right_x: AxisSample,
    /// Right stick Y axis.
    pub right_y: AxisSample,
    /// Right stick Z axis.
    pub right_z: AxisSample,
}

/// Keypad button bitmap.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct KeypadData {
    /// One bit per button, see [`KeypadButton`].
    pub buttons: u16,
}

impl KeypadData {
    /// True when `button` is currently pressed.
    pub fn is_pressed(&self, button: KeypadButton) -> bool {
        self.buttons & button as u16 != 0
    }
}

/// Composite report carrying keypad and joystick blocks back-to-back.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct CombinedReport {
    /// Keypad block.
    pub keypad: KeypadData,
    /// Joystick block.
    pub joystick: JoystickData,
}

/// Bit flags for each keypad button.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u16)]
pub enum KeypadButton {
    Menu = 1 << 0,
    Pause = 1 << 1,
    Power = 1 << 2,
    LDown = 1 << 3,
    LRight = 1 << 4,
    LUp = 1 << 5,
    LLeft = 1 << 6,
    RDown = 1 << 7,
    RRight = 1 << 8,
    RUp = 1 << 9,
    RLeft = 1 << 10,
}

/// Button names in bit order, for status display.
pub const BUTTON_NAMES: [&str; 11] = [
    "Menu", "Pause", "Power", "L-Down", "L-Right", "L-Up", "L-Left", "R-Down", "R-Right", "R-Up",
    "R-Left",
];

/// Controller operating modes reported on `st/mode`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum SrcMode {
    /// Not connected to an output device.
    Local = 0x04,
    /// Connected, but not yet sending joystick/buttons.
    Remote = 0x06,
    /// Connected and streaming joystick/buttons.
    Operational = 0x09,
    /// In a menu; joystick/buttons stream as zero.
    Menu = 0x0A,
    /// Paused; joystick/buttons stream as zero.
    Pause = 0x0B,
    /// Showing the user display-text screen.
    DisplayText = 0x0E,
}

impl SrcMode {
    /// Decodes the first payload byte of a mode notification.
    pub fn from_byte(byte: u8) -> Option<SrcMode> {
        match byte {
            0x04 => Some(SrcMode::Local),
            0x06 => Some(SrcMode::Remote),
            0x09 => Some(SrcMode::Operational),
            0x0A => Some(SrcMode::Menu),
            0x0B => Some(SrcMode::Pause),
            0x0E => Some(SrcMode::DisplayText),
            _ => None,
        }
    }
}

fn word(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn decode_axes(block: &[u8]) -> JoystickData {
    JoystickData {
        left_x: AxisSample::from_raw(word(block, 0)),
        left_y: AxisSample::from_raw(word(block, 2)),
        left_z: AxisSample::from_raw(word(block, 4)),
        right_x: AxisSample::from_raw(word(block, 6)),
        right_y: AxisSample::from_raw(word(block, 8)),
        right_z: AxisSample::from_raw(word(block, 10)),
    }
}

/// Decodes a standalone keypad payload (`st/keypad`), verifying its CRC.
///
/// The CRC guards only the bitmap bytes.
pub fn parse_keypad(data: &[u8]) -> Result<KeypadData, Error> {
    if data.len() < KEYPAD_DATA_LEN {
        warn!("Keypad payload too small ({} bytes)", data.len());
        return Err(Error::PayloadCodec);
    }
    if crc16(&data[..2]) != word(data, 2) {
        debug!("Keypad CRC mismatch");
        return Err(Error::CrcMismatch);
    }
    Ok(KeypadData {
        buttons: word(data, 0),
    })
}

/// Decodes a standalone calibrated-joystick payload
/// (`st/joystick/calibrated`), verifying its CRC.
pub fn parse_joystick(data: &[u8]) -> Result<JoystickData, Error> {
    if data.len() < JOYSTICK_DATA_LEN {
        warn!("Joystick payload too small ({} bytes)", data.len());
        return Err(Error::PayloadCodec);
    }
    if crc16(&data[..12]) != word(data, 12) {
        debug!("Joystick CRC mismatch");
        return Err(Error::CrcMismatch);
    }
    Ok(decode_axes(&data[..12]))
}

/// Decodes a combined joystick + keypad report (`st/joystick/combined`).
///
/// Both embedded CRCs must verify or the report is rejected. Trailing bytes
/// beyond the fixed layout are tolerated and ignored.
pub fn parse_combined(data: &[u8]) -> Result<CombinedReport, Error> {
    if data.len() < COMBINED_REPORT_LEN {
        warn!("Combined payload too small ({} bytes)", data.len());
        return Err(Error::PayloadCodec);
    }
    if data.len() > COMBINED_REPORT_LEN {
        debug!(
            "Combined payload oversized ({} bytes), ignoring trailing bytes",
            data.len()
        );
    }

    if crc16(&data[..2]) != word(data, 2) {
        debug!("Combined keypad CRC mismatch");
        return Err(Error::CrcMismatch);
    }
    if crc16(&data[4..16]) != word(data, 16) {
        debug!("Combined joystick CRC mismatch");
        return Err(Error::CrcMismatch);
    }

    Ok(CombinedReport {
        keypad: KeypadData {
            buttons: word(data, 0),
        },
        joystick: decode_axes(&data[4..16]),
    })
}

/// Maps a calibrated axis value onto a wrench-effort percentage: the full
/// scale `[-2047, 2047]` maps linearly onto `[-100.0, 100.0]`, with values
/// outside clamped.
pub fn normalize_axis(value: i16) -> f64 {
    let clamped = value.max(-AXIS_FULL_SCALE).min(AXIS_FULL_SCALE);
    f64::from(clamped) * 100.0 / f64::from(AXIS_FULL_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a valid combined report on the wire: six raw axis words plus a
    /// button bitmap, with both CRC fields filled in.
    pub(crate) fn encode_combined(buttons: u16, axes: [u16; 6]) -> Vec<u8> {
        let mut data = Vec::with_capacity(COMBINED_REPORT_LEN);
        data.extend_from_slice(&buttons.to_le_bytes());
        data.extend_from_slice(&crc16(&buttons.to_le_bytes()).to_le_bytes());
        for axis in axes.iter() {
            data.extend_from_slice(&axis.to_le_bytes());
        }
        let joystick_crc = crc16(&data[4..16]);
        data.extend_from_slice(&joystick_crc.to_le_bytes());
        data
    }

    #[test]
    fn crc16_matches_known_vectors() {
        // CRC-16/ARC check value.
        assert_eq!(crc16(b"123456789"), 0xBB3D);
        assert_eq!(crc16(&[]), 0x0000);
    }

    #[test]
    fn axis_sample_sign_extension() {
        assert_eq!(AxisSample::from_raw(0x0000), AxisSample { value: 0, ok: false });
        assert_eq!(
            AxisSample::from_raw(0x07FF),
            AxisSample { value: 2047, ok: false }
        );
        assert_eq!(
            AxisSample::from_raw(0x0FFF),
            AxisSample { value: -1, ok: false }
        );
        assert_eq!(
            AxisSample::from_raw(0x1800),
            AxisSample { value: -2048, ok: true }
        );
    }

    #[test]
    fn combined_report_round_trip() {
        let data = encode_combined(
            KeypadButton::RDown as u16,
            [0x17FF, 0x1801, 0x1000, 0x1000, 0x1000, 0x1000],
        );
        assert_eq!(data.len(), COMBINED_REPORT_LEN);

        let report = parse_combined(&data).unwrap();
        assert!(report.keypad.is_pressed(KeypadButton::RDown));
        assert!(!report.keypad.is_pressed(KeypadButton::Menu));
        assert_eq!(report.joystick.left_x.value, 2047);
        assert!(report.joystick.left_x.ok);
        assert_eq!(report.joystick.left_y.value, -2047);
        assert_eq!(report.joystick.left_z.value, 0);
    }

    #[test]
    fn zeroed_keypad_crc_is_rejected() {
        let mut data = encode_combined(0x0001, [0x1000; 6]);
        data[2] = 0;
        data[3] = 0;
        assert_eq!(parse_combined(&data), Err(Error::CrcMismatch));
    }

    #[test]
    fn corrupt_joystick_crc_is_rejected() {
        let mut data = encode_combined(0x0001, [0x1000; 6]);
        data[16] ^= 0xFF;
        assert_eq!(parse_combined(&data), Err(Error::CrcMismatch));
    }

    #[test]
    fn short_payloads_are_rejected() {
        assert_eq!(parse_combined(&[0u8; 4]), Err(Error::PayloadCodec));
        assert_eq!(parse_keypad(&[0u8; 2]), Err(Error::PayloadCodec));
        assert_eq!(parse_joystick(&[0u8; 6]), Err(Error::PayloadCodec));
    }

    #[test]
    fn oversized_combined_payloads_are_tolerated() {
        let mut data = encode_combined(0, [0x1000; 6]);
        data.extend_from_slice(&[0xAA, 0xBB]);
        assert!(parse_combined(&data).is_ok());
    }

    #[test]
    fn standalone_keypad_and_joystick_payloads() {
        let buttons = (KeypadButton::Menu as u16) | (KeypadButton::RLeft as u16);
        let mut keypad = buttons.to_le_bytes().to_vec();
        keypad.extend_from_slice(&crc16(&buttons.to_le_bytes()).to_le_bytes());
        let decoded = parse_keypad(&keypad).unwrap();
        assert!(decoded.is_pressed(KeypadButton::Menu));
        assert!(decoded.is_pressed(KeypadButton::RLeft));

        let mut joystick = Vec::new();
        for axis in [0x1400u16, 0x1C00, 0x1000, 0x1000, 0x1000, 0x1000].iter() {
            joystick.extend_from_slice(&axis.to_le_bytes());
        }
        let crc = crc16(&joystick[..12]);
        joystick.extend_from_slice(&crc.to_le_bytes());
        let decoded = parse_joystick(&joystick).unwrap();
        assert_eq!(decoded.left_x.value, 1024);
        assert_eq!(decoded.left_y.value, -1024);
    }

    #[test]
    fn wrench_effort_normalization_endpoints() {
        assert!((normalize_axis(2047) - 100.0).abs() < f64::EPSILON);
        assert!((normalize_axis(-2047) + 100.0).abs() < f64::EPSILON);
        assert_eq!(normalize_axis(0), 0.0);

        // Out-of-range values clamp.
        assert!((normalize_axis(-2048) + 100.0).abs() < f64::EPSILON);
        assert!((normalize_axis(i16::max_value()) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mode_bytes_decode() {
        assert_eq!(SrcMode::from_byte(0x09), Some(SrcMode::Operational));
        assert_eq!(SrcMode::from_byte(0x0E), Some(SrcMode::DisplayText));
        assert_eq!(SrcMode::from_byte(0x00), None);
    }
}
