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

//! Local handling of SRC notifications.
//!
//! The bridge hands every observe notification addressed to an internal
//! port to [`internal_handler`], which decodes it per resource: joystick
//! telemetry feeds the vehicle queue, the rest is surfaced through logging
//! and the console.

use std::time::{Duration, Instant};

use log::{debug, info, log_enabled, warn, Level};

use uartcoap::message::ObserveReply;

use crate::console::Console;
use crate::payload;
use crate::ports::SrcResource;
use crate::telemetry::{self, CombinedReport, SrcMode, BUTTON_NAMES};
use crate::vehicle::VehicleQueue;

/// Builds the bridge's internal-port dispatch callback.
pub fn internal_handler(
    inputs: VehicleQueue,
    console: Console,
) -> impl FnMut(u16, ObserveReply) + Send {
    let mut status = JoystickStatusPrinter::new(console);

    move |port, reply| {
        let resource = match SrcResource::from_port(port) {
            Some(resource) => resource,
            None => {
                warn!("Unknown internal port {}, cannot handle message", port);
                return;
            }
        };
        dispatch(resource, &reply.payload, &inputs, &mut status);
    }
}

fn dispatch(
    resource: SrcResource,
    payload: &[u8],
    inputs: &VehicleQueue,
    status: &mut JoystickStatusPrinter,
) {
    match resource {
        SrcResource::CombinedJoystickKeypad => match telemetry::parse_combined(payload) {
            Ok(report) => {
                status.print(&report);
                inputs.post_input(report);
            }
            Err(err) => debug!("Dropping combined report: {}", err),
        },
        SrcResource::Keypad => match telemetry::parse_keypad(payload) {
            Ok(keypad) => debug!("Keypad state {:#06x}", keypad.buttons),
            Err(err) => debug!("Dropping keypad report: {}", err),
        },
        SrcResource::CalibratedJoystick => match telemetry::parse_joystick(payload) {
            Ok(joystick) => debug!(
                "Calibrated joystick L({}, {}, {}) R({}, {}, {})",
                joystick.left_x.value,
                joystick.left_y.value,
                joystick.left_z.value,
                joystick.right_x.value,
                joystick.right_y.value,
                joystick.right_z.value
            ),
            Err(err) => debug!("Dropping calibrated joystick report: {}", err),
        },
        SrcResource::ControllerMode => match payload.first().copied().map(SrcMode::from_byte) {
            Some(Some(mode)) => info!("SRC mode: {:?}", mode),
            Some(None) => warn!("SRC reported an unknown mode byte {:#04x}", payload[0]),
            None => warn!("Empty SRC mode notification"),
        },
        SrcResource::BatteryStatus => match payload::decode_battery(payload) {
            Ok(battery) => debug!(
                "Battery: {}% | {:.2}V | {:.2}C | {:.2}A",
                battery.percent, battery.volts, battery.temp_c, battery.amps
            ),
            Err(err) => debug!("Dropping battery status: {}", err),
        },
        SrcResource::FirmwareVersion
        | SrcResource::SerialNumber
        | SrcResource::ModelNumber
        | SrcResource::DeviceMac
        | SrcResource::DeviceUid
        | SrcResource::DeviceRev
        | SrcResource::SystemStatus => {
            if payload.is_empty() {
                debug!("Empty {:?} notification", resource);
            } else {
                info!("{:?}: {}", resource, String::from_utf8_lossy(payload));
            }
        }
        SrcResource::CpuTemp
        | SrcResource::DeviceTemp
        | SrcResource::GaugeTemp
        | SrcResource::GyroTemp => {
            debug!("{:?}: {}", resource, String::from_utf8_lossy(payload));
        }
        SrcResource::DisplayText
        | SrcResource::DisplayMode
        | SrcResource::VibrateLeft
        | SrcResource::VibrateRight
        | SrcResource::VibrateBoth => {
            debug!("{:?} acknowledged ({} bytes)", resource, payload.len());
        }
        _ => {
            debug!(
                "No local handling for {:?} ({} byte payload)",
                resource,
                payload.len()
            );
        }
    }
}

/// Pretty-prints joystick status frames to the console: at most one frame
/// per 100 ms, and only when the report changed.
struct JoystickStatusPrinter {
    console: Console,
    last: Option<CombinedReport>,
    last_print: Option<Instant>,
}

impl JoystickStatusPrinter {
    fn new(console: Console) -> JoystickStatusPrinter {
        JoystickStatusPrinter {
            console,
            last: None,
            last_print: None,
        }
    }

    fn print(&mut self, report: &CombinedReport) {
        if !log_enabled!(Level::Info) {
            return;
        }

        let now = Instant::now();
        if let Some(last_print) = self.last_print {
            if now.duration_since(last_print) < Duration::from_millis(100) {
                return;
            }
        }
        if self.last.as_ref() == Some(report) {
            return;
        }
        self.last_print = Some(now);
        self.last = Some(*report);

        let mut frame = String::new();
        frame.push_str("Joystick Status\n");
        frame.push_str("---------------\n");
        let axes = [
            ("Left  X", report.joystick.left_x),
            ("Left  Y", report.joystick.left_y),
            ("Left  Z", report.joystick.left_z),
            ("Right X", report.joystick.right_x),
            ("Right Y", report.joystick.right_y),
            ("Right Z", report.joystick.right_z),
        ];
        for (name, sample) in axes.iter() {
            let flag = if sample.ok { "[OK]" } else { "[--]" };
            frame.push_str(&format!("{}: {} {}\n", name, flag, sample.value));
        }
        frame.push_str("---------------\n");
        for (bit, name) in BUTTON_NAMES.iter().enumerate() {
            let pressed = report.keypad.buttons & (1 << bit) != 0;
            frame.push_str(&format!(
                "{:<10}: {}\n",
                name,
                if pressed { "Pressed" } else { "Released" }
            ));
        }
        frame.push_str("---------------\n");

        self.console.push(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{crc16, KeypadButton, COMBINED_REPORT_LEN};

    fn encode_combined(buttons: u16, axes: [u16; 6]) -> Vec<u8> {
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

    fn reply(payload: Vec<u8>) -> ObserveReply {
        ObserveReply {
            mid: 0x1000,
            token: Vec::new(),
            payload,
        }
    }

    #[test]
    fn valid_combined_frames_reach_the_vehicle_queue() {
        let inputs = VehicleQueue::new();
        let mut handler = internal_handler(inputs.clone(), Console::new());

        let frame = encode_combined(KeypadButton::RDown as u16, [0x1000; 6]);
        handler(
            SrcResource::CombinedJoystickKeypad.port(),
            reply(frame.clone()),
        );
        assert_eq!(inputs.pending(), 1);

        // The identical follow-up frame coalesces away.
        handler(SrcResource::CombinedJoystickKeypad.port(), reply(frame));
        assert_eq!(inputs.pending(), 1);
    }

    #[test]
    fn corrupt_combined_frames_are_dropped() {
        let inputs = VehicleQueue::new();
        let mut handler = internal_handler(inputs.clone(), Console::new());

        let mut frame = encode_combined(KeypadButton::RDown as u16, [0x1000; 6]);
        frame[2] = 0;
        frame[3] = 0;
        handler(SrcResource::CombinedJoystickKeypad.port(), reply(frame));
        assert_eq!(inputs.pending(), 0);
    }

    #[test]
    fn unknown_ports_and_odd_payloads_do_not_panic() {
        let inputs = VehicleQueue::new();
        let mut handler = internal_handler(inputs.clone(), Console::new());

        handler(999, reply(vec![0xFF; 3]));
        handler(SrcResource::ControllerMode.port(), reply(vec![]));
        handler(SrcResource::ControllerMode.port(), reply(vec![0x09]));
        handler(SrcResource::BatteryStatus.port(), reply(vec![0x01, 0x02]));
        handler(SrcResource::FirmwareVersion.port(), reply(b"1.2.3".to_vec()));
        assert_eq!(inputs.pending(), 0);
    }
}
