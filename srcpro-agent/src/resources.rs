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

//! Request catalog for the SRC Pro's CoAP resources.
//!
//! Every function composes one confirmable request as raw bytes, paired
//! with the internal port its response should route back to. Tokens are
//! left empty; the port tracker adds its own on the way out. Observable
//! resources additionally get `subscribe_*` / `unsubscribe_*` wrappers.

use std::sync::atomic::{AtomicU16, Ordering};

use rand::Rng;

use uartcoap::message::{
    ContentFormat, Method, RequestBuilder, OBSERVE_DEREGISTER, OBSERVE_REGISTER,
};

use crate::payload;
use crate::ports::SrcResource;

/// Allocates message IDs for self-issued requests: randomly seeded, then
/// sequential.
#[derive(Debug)]
pub struct MidGen {
    next: AtomicU16,
}

impl MidGen {
    /// Creates a generator seeded from the thread RNG.
    pub fn new() -> MidGen {
        MidGen {
            next: AtomicU16::new(rand::thread_rng().gen()),
        }
    }

    /// Returns the next message ID.
    pub fn next(&self) -> u16 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MidGen {
    fn default() -> Self {
        MidGen::new()
    }
}

/// A composed request and the internal port its responses route back to.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    /// The resource this request addresses.
    pub resource: SrcResource,

    /// The serialized CoAP request.
    pub message: Vec<u8>,
}

impl ResourceRequest {
    /// Internal port for the port tracker.
    pub fn port(&self) -> u16 {
        self.resource.port()
    }
}

fn compose(resource: SrcResource, builder: RequestBuilder) -> ResourceRequest {
    ResourceRequest {
        resource,
        message: builder.build(),
    }
}

fn with_observe(builder: RequestBuilder, observe: Option<u32>) -> RequestBuilder {
    match observe {
        Some(value) => builder.observe(value),
        None => builder,
    }
}

/// Declares `subscribe_*` / `unsubscribe_*` wrappers for an observable
/// resource getter.
macro_rules! observe_methods {
    ($($(#[$meta:meta])* ($subscribe:ident, $unsubscribe:ident, $get:ident)),* $(,)?) => {
        $(
            $(#[$meta])*
            /// Registers for notifications.
            pub fn $subscribe(mid: u16) -> ResourceRequest {
                $get(mid, Some(OBSERVE_REGISTER))
            }

            $(#[$meta])*
            /// Cancels an earlier registration.
            pub fn $unsubscribe(mid: u16) -> ResourceRequest {
                $get(mid, Some(OBSERVE_DEREGISTER))
            }
        )*
    };
}

observe_methods!(
    (
        subscribe_combined_joystick_keypad,
        unsubscribe_combined_joystick_keypad,
        get_combined_joystick_keypad
    ),
    (subscribe_cpu_temp_c, unsubscribe_cpu_temp_c, get_cpu_temp_c),
    (subscribe_device_temp_c, unsubscribe_device_temp_c, get_device_temp_c),
    (subscribe_gauge_temp_c, unsubscribe_gauge_temp_c, get_gauge_temp_c),
    (subscribe_gyro_temp_c, unsubscribe_gyro_temp_c, get_gyro_temp_c),
    (subscribe_battery_status, unsubscribe_battery_status, get_battery_status),
    (subscribe_firmware_version, unsubscribe_firmware_version, get_firmware_version),
    (subscribe_serial_number, unsubscribe_serial_number, get_serial_number),
    (subscribe_model_number, unsubscribe_model_number, get_model_number),
    (subscribe_device_mac, unsubscribe_device_mac, get_device_mac),
    (subscribe_controller_mode, unsubscribe_controller_mode, get_mode),
);

// ---------- Safety domain (sf) ----------

/// Requests the raw SMCU safety block for one slot.
pub fn get_smcu_safety(smcu_index: u32, mid: u16, observe: Option<u32>) -> ResourceRequest {
    let builder = RequestBuilder::new(Method::Get, mid)
        .path(&["sf", &smcu_index.to_string(), "s"])
        .content_format(ContentFormat::OCTET_STREAM);
    compose(SrcResource::SmcuSafety, with_observe(builder, observe))
}

/// Pushes raw safety block bytes back to an SMCU slot.
pub fn post_smcu_safety(smcu_index: u32, mid: u16, raw: &[u8]) -> ResourceRequest {
    compose(
        SrcResource::SmcuSafety,
        RequestBuilder::new(Method::Post, mid)
            .path(&["sf", &smcu_index.to_string(), "s"])
            .content_format(ContentFormat::OCTET_STREAM)
            .payload(raw),
    )
}

/// Fetches CBOR safety diagnostics for one SMCU slot.
pub fn get_smcu_safety_diagnostics(
    smcu_index: u32,
    mid: u16,
    observe: Option<u32>,
) -> ResourceRequest {
    let builder = RequestBuilder::new(Method::Get, mid)
        .path(&["sf", &smcu_index.to_string(), "s", "safety_diagnostics"])
        .content_format(ContentFormat::CBOR);
    compose(
        SrcResource::SmcuSafetyDiagnostics,
        with_observe(builder, observe),
    )
}

/// Fetches CBOR system diagnostics for one SMCU slot.
pub fn get_smcu_system_diagnostics(
    smcu_index: u32,
    mid: u16,
    observe: Option<u32>,
) -> ResourceRequest {
    let builder = RequestBuilder::new(Method::Get, mid)
        .path(&["sf", &smcu_index.to_string(), "s", "system_diagnostics"])
        .content_format(ContentFormat::CBOR);
    compose(
        SrcResource::SmcuSystemDiagnostics,
        with_observe(builder, observe),
    )
}

/// Streams the shared combined transmitter safety block.
pub fn get_smcu_combined_safety(mid: u16, observe: Option<u32>) -> ResourceRequest {
    let builder = RequestBuilder::new(Method::Get, mid)
        .path(&["sf", "transmitter", "combined"])
        .content_format(ContentFormat::OCTET_STREAM);
    compose(SrcResource::SmcuCombinedSafety, with_observe(builder, observe))
}

// ---------- Device-info domain (deviceInfo) ----------

fn device_info(mid: u16, query: &str) -> RequestBuilder {
    RequestBuilder::new(Method::Get, mid)
        .path(&["deviceInfo"])
        .query(query)
        .content_format(ContentFormat::TEXT_PLAIN)
}

/// Queries the current radio operating mode.
pub fn get_radio_mode(mid: u16) -> ResourceRequest {
    compose(
        SrcResource::RadioMode,
        device_info(mid, "radioMode"),
    )
}

/// Queries the configured radio output power in dB.
pub fn get_radio_power_db(mid: u16) -> ResourceRequest {
    compose(
        SrcResource::RadioPower,
        device_info(mid, "radioPowerDB"),
    )
}

/// Queries the selected radio channel.
pub fn get_radio_channel(mid: u16) -> ResourceRequest {
    compose(
        SrcResource::RadioChannel,
        device_info(mid, "radioChannel"),
    )
}

/// Queries the radio health/status flags.
pub fn get_radio_status(mid: u16) -> ResourceRequest {
    compose(
        SrcResource::RadioStatus,
        RequestBuilder::new(Method::Get, mid)
            .path(&["deviceInfo"])
            .query("radioStatus")
            .content_format(ContentFormat::CBOR),
    )
}

/// Queries whether the radio link is currently in use.
pub fn get_radio_used(mid: u16) -> ResourceRequest {
    compose(
        SrcResource::RadioUsed,
        device_info(mid, "radioUsed"),
    )
}

/// Fetches the firmware version string.
pub fn get_firmware_version(mid: u16, observe: Option<u32>) -> ResourceRequest {
    compose(
        SrcResource::FirmwareVersion,
        with_observe(device_info(mid, "fwVersion"), observe),
    )
}

/// Fetches the CPU temperature in Celsius.
pub fn get_cpu_temp_c(mid: u16, observe: Option<u32>) -> ResourceRequest {
    compose(
        SrcResource::CpuTemp,
        with_observe(device_info(mid, "cpuTempC"), observe),
    )
}

/// Fetches the chassis temperature in Celsius.
pub fn get_device_temp_c(mid: u16, observe: Option<u32>) -> ResourceRequest {
    compose(
        SrcResource::DeviceTemp,
        with_observe(device_info(mid, "deviceTempC"), observe),
    )
}

/// Fetches the gauge temperature in Celsius.
pub fn get_gauge_temp_c(mid: u16, observe: Option<u32>) -> ResourceRequest {
    compose(
        SrcResource::GaugeTemp,
        with_observe(device_info(mid, "gaugeTempC"), observe),
    )
}

/// Fetches the gyro temperature in Celsius.
pub fn get_gyro_temp_c(mid: u16, observe: Option<u32>) -> ResourceRequest {
    compose(
        SrcResource::GyroTemp,
        with_observe(device_info(mid, "gyroTempC"), observe),
    )
}

/// Fetches the aggregated battery status structure.
///
/// The advertised Content-Format tracks the device's resource table
/// (text/plain); the reply body is CBOR regardless.
pub fn get_battery_status(mid: u16, observe: Option<u32>) -> ResourceRequest {
    compose(
        SrcResource::BatteryStatus,
        with_observe(
            device_info(mid, "batteryStatus"),
            observe,
        ),
    )
}

/// Queries the global system status bitfield.
pub fn get_system_status(mid: u16) -> ResourceRequest {
    compose(
        SrcResource::SystemStatus,
        RequestBuilder::new(Method::Get, mid)
            .path(&["deviceInfo"])
            .query("sys1")
            .content_format(ContentFormat::OCTET_STREAM),
    )
}

/// Provisioning helper reporting the lockdown state.
pub fn get_lockdown_status(mid: u16) -> ResourceRequest {
    compose(
        SrcResource::LockdownStatus,
        RequestBuilder::new(Method::Get, mid)
            .path(&["deviceInfo"])
            .query("lockdownStatus")
            .content_format(ContentFormat::OCTET_STREAM),
    )
}

// ---------- Config domain (cfg/setup) ----------

fn setup_text(mid: u16, leaf: &str) -> RequestBuilder {
    RequestBuilder::new(Method::Get, mid)
        .path(&["cfg", "setup", leaf])
        .content_format(ContentFormat::TEXT_PLAIN)
}

/// Fetches the configured serial number string.
pub fn get_serial_number(mid: u16, observe: Option<u32>) -> ResourceRequest {
    compose(
        SrcResource::SerialNumber,
        with_observe(setup_text(mid, "serialNumber"), observe),
    )
}

/// Updates the device serial number field.
pub fn post_serial_number(mid: u16, serial: &str) -> ResourceRequest {
    compose(
        SrcResource::SerialNumber,
        RequestBuilder::new(Method::Post, mid)
            .path(&["cfg", "setup", "serialNumber"])
            .content_format(ContentFormat::TEXT_PLAIN)
            .payload(serial.as_bytes()),
    )
}

/// Fetches the configured model number string.
pub fn get_model_number(mid: u16, observe: Option<u32>) -> ResourceRequest {
    compose(
        SrcResource::ModelNumber,
        with_observe(setup_text(mid, "modelNumber"), observe),
    )
}

/// Updates the model number field.
pub fn post_model_number(mid: u16, model: &str) -> ResourceRequest {
    compose(
        SrcResource::ModelNumber,
        RequestBuilder::new(Method::Post, mid)
            .path(&["cfg", "setup", "modelNumber"])
            .content_format(ContentFormat::TEXT_PLAIN)
            .payload(model.as_bytes()),
    )
}

/// Fetches the device MAC address string.
pub fn get_device_mac(mid: u16, observe: Option<u32>) -> ResourceRequest {
    compose(
        SrcResource::DeviceMac,
        with_observe(setup_text(mid, "deviceMac"), observe),
    )
}

/// Retrieves the unique device identifier (factory only).
pub fn get_device_uid(mid: u16) -> ResourceRequest {
    compose(
        SrcResource::DeviceUid,
        RequestBuilder::new(Method::Get, mid)
            .path(&["cfg", "setup", "deviceUID"])
            .content_format(ContentFormat::OCTET_STREAM),
    )
}

/// Retrieves the device hardware revision string.
pub fn get_device_rev(mid: u16) -> ResourceRequest {
    compose(
        SrcResource::DeviceRev,
        RequestBuilder::new(Method::Get, mid)
            .path(&["cfg", "setup", "deviceRev"])
            .content_format(ContentFormat::OCTET_STREAM),
    )
}

/// Reset flavors accepted by the system-reset endpoint.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResetMode {
    /// Normal reboot, wire byte `'n'`.
    Normal,
    /// Reboot into the bootloader, wire byte `'b'`.
    Bootloader,
}

impl ResetMode {
    fn byte(self) -> u8 {
        match self {
            ResetMode::Normal => b'n',
            ResetMode::Bootloader => b'b',
        }
    }
}

/// Issues a system reset.
pub fn post_system_reset(mid: u16, mode: ResetMode) -> ResourceRequest {
    compose(
        SrcResource::SystemReset,
        RequestBuilder::new(Method::Post, mid)
            .path(&["cfg", "setup", "systemReset"])
            .content_format(ContentFormat::TEXT_PLAIN)
            .payload(&[mode.byte()]),
    )
}

/// Reads the current user display mode.
pub fn get_display_mode(mid: u16) -> ResourceRequest {
    compose(
        SrcResource::DisplayMode,
        RequestBuilder::new(Method::Get, mid)
            .path(&["cfg", "setup", "userSettings"])
            .query("99")
            .content_format(ContentFormat::CBOR),
    )
}

/// Sets the user display mode (0 = normal, 1 = alternate).
pub fn post_display_mode(mid: u16, mode: u8) -> ResourceRequest {
    compose(
        SrcResource::DisplayMode,
        RequestBuilder::new(Method::Post, mid)
            .path(&["cfg", "setup", "userSettings"])
            .query("99")
            .content_format(ContentFormat::CBOR)
            .payload(&payload::encode_bytes(&[mode])),
    )
}

fn vibrate(resource: SrcResource, mid: u16, setting: &str) -> ResourceRequest {
    compose(
        resource,
        RequestBuilder::new(Method::Post, mid)
            .path(&["cfg", "setup", "userSettings"])
            .query(setting)
            .content_format(ContentFormat::CBOR)
            .payload(&payload::encode_bytes(&[1])),
    )
}

/// Vibrates only the left motor.
pub fn post_vibrate_left(mid: u16) -> ResourceRequest {
    vibrate(SrcResource::VibrateLeft, mid, "10")
}

/// Vibrates only the right motor.
pub fn post_vibrate_right(mid: u16) -> ResourceRequest {
    vibrate(SrcResource::VibrateRight, mid, "11")
}

/// Vibrates both motors simultaneously.
pub fn post_vibrate_both(mid: u16) -> ResourceRequest {
    vibrate(SrcResource::VibrateBoth, mid, "12")
}

// ---------- File endpoints (fs) ----------

/// Starts a firmware file read; the filename rides in the query.
pub fn get_firmware_file_data(mid: u16, filename: &str) -> ResourceRequest {
    compose(
        SrcResource::FirmwareFileData,
        RequestBuilder::new(Method::Get, mid)
            .path(&["fs", "data"])
            .query(filename)
            .content_format(ContentFormat::CBOR),
    )
}

/// Uploads firmware file chunk data.
pub fn post_firmware_file_data(mid: u16, filename: &str, data: &[u8]) -> ResourceRequest {
    compose(
        SrcResource::FirmwareFileData,
        RequestBuilder::new(Method::Post, mid)
            .path(&["fs", "data"])
            .query(filename)
            .content_format(ContentFormat::CBOR)
            .payload(data),
    )
}

/// Retrieves metadata describing the current firmware file.
pub fn get_firmware_file_metadata(mid: u16) -> ResourceRequest {
    compose(
        SrcResource::FirmwareFileMetadata,
        RequestBuilder::new(Method::Get, mid)
            .path(&["fs", "metadata"])
            .content_format(ContentFormat::CBOR),
    )
}

/// Uploads firmware metadata (filename, length, CRC32).
pub fn post_firmware_file_metadata(
    mid: u16,
    filename: &str,
    length: u32,
    crc32: u32,
) -> ResourceRequest {
    compose(
        SrcResource::FirmwareFileMetadata,
        RequestBuilder::new(Method::Post, mid)
            .path(&["fs", "metadata"])
            .content_format(ContentFormat::CBOR)
            .payload(&payload::encode_file_metadata(filename, length, crc32)),
    )
}

// ---------- State endpoints (st) ----------

/// Fetches the joystick calibration status.
pub fn get_joystick_calibrated(mid: u16, observe: Option<u32>) -> ResourceRequest {
    let builder = RequestBuilder::new(Method::Get, mid)
        .path(&["st", "joystick", "calibrated"])
        .content_format(ContentFormat::OCTET_STREAM);
    compose(SrcResource::CalibratedJoystick, with_observe(builder, observe))
}

/// Fetches the keypad button payload.
pub fn get_keypad(mid: u16, observe: Option<u32>) -> ResourceRequest {
    let builder = RequestBuilder::new(Method::Get, mid)
        .path(&["st", "keypad"])
        .content_format(ContentFormat::OCTET_STREAM);
    compose(SrcResource::Keypad, with_observe(builder, observe))
}

/// Fetches the combined joystick and keypad snapshot.
pub fn get_combined_joystick_keypad(mid: u16, observe: Option<u32>) -> ResourceRequest {
    let builder = RequestBuilder::new(Method::Get, mid)
        .path(&["st", "joystick", "combined"])
        .content_format(ContentFormat::OCTET_STREAM);
    compose(SrcResource::CombinedJoystickKeypad, with_observe(builder, observe))
}

/// Fetches the current SRC operating mode.
pub fn get_mode(mid: u16, observe: Option<u32>) -> ResourceRequest {
    let builder = RequestBuilder::new(Method::Get, mid)
        .path(&["st", "mode"])
        .content_format(ContentFormat::TEXT_PLAIN);
    compose(SrcResource::ControllerMode, with_observe(builder, observe))
}

/// Writes both 18-character display lines of one half of the user display.
pub fn post_display_lines(
    mid: u16,
    line0: &str,
    line1: &str,
    upper_half: bool,
) -> ResourceRequest {
    compose(
        SrcResource::DisplayText,
        RequestBuilder::new(Method::Post, mid)
            .path(&["st", "display", "text"])
            .content_format(ContentFormat::CBOR)
            .payload(&payload::encode_two_lines(line0, line1, upper_half)),
    )
}

/// Writes a single 6-character segment within a display quadrant.
pub fn post_display_segment(
    mid: u16,
    line: u8,
    segment: u8,
    text: &str,
) -> ResourceRequest {
    compose(
        SrcResource::DisplayText,
        RequestBuilder::new(Method::Post, mid)
            .path(&["st", "display", "text"])
            .content_format(ContentFormat::CBOR)
            .payload(&payload::encode_display_segment(line, segment, text)),
    )
}

// ---------- Security endpoints (sec) ----------

fn sec_get(resource: SrcResource, mid: u16, segments: &[&str]) -> ResourceRequest {
    compose(
        resource,
        RequestBuilder::new(Method::Get, mid)
            .path(segments)
            .content_format(ContentFormat::TEXT_PLAIN),
    )
}

fn sec_post(resource: SrcResource, mid: u16, segments: &[&str], body: &[u8]) -> ResourceRequest {
    compose(
        resource,
        RequestBuilder::new(Method::Post, mid)
            .path(segments)
            .content_format(ContentFormat::TEXT_PLAIN)
            .payload(body),
    )
}

/// Queries the secure element unique identifier (ASCII hex).
pub fn get_secure_element_id(mid: u16) -> ResourceRequest {
    sec_get(SrcResource::SecureElementId, mid, &["sec", "dev", "seuid"])
}

/// Selects the factory secure object for subsequent requests.
pub fn post_fso_id(mid: u16, id: &str) -> ResourceRequest {
    sec_post(SrcResource::FsoId, mid, &["sec", "dev", "fso", "id"], id.as_bytes())
}

/// Retrieves the selected FSO length in bytes.
pub fn get_fso_length(mid: u16) -> ResourceRequest {
    sec_get(SrcResource::FsoLength, mid, &["sec", "dev", "fso", "length"])
}

/// Retrieves the selected FSO CRC32.
pub fn get_fso_crc(mid: u16) -> ResourceRequest {
    sec_get(SrcResource::FsoCrc, mid, &["sec", "dev", "fso", "crc"])
}

/// Triggers an FSO erase.
pub fn get_fso_erase(mid: u16) -> ResourceRequest {
    sec_get(SrcResource::FsoErase, mid, &["sec", "dev", "fso", "erase"])
}

/// Downloads the FSO DER data.
pub fn get_fso_data(mid: u16) -> ResourceRequest {
    sec_get(SrcResource::FsoData, mid, &["sec", "dev", "fso", "data"])
}

/// Uploads an FSO DER payload.
pub fn post_fso_data(mid: u16, der: &[u8]) -> ResourceRequest {
    sec_post(SrcResource::FsoData, mid, &["sec", "dev", "fso", "data"], der)
}

/// Retrieves OTP key material (factory only).
pub fn get_otp_key(mid: u16) -> ResourceRequest {
    sec_get(SrcResource::OtpKey, mid, &["sec", "lockdown", "otp"])
}

/// Finalizes OTP provisioning; phrase and seed packed as `<phrase> <seed>`.
pub fn post_otp_commit(mid: u16, phrase: &str, seed_hex: &str) -> ResourceRequest {
    let body = format!("{} {}", phrase, seed_hex);
    sec_post(
        SrcResource::OtpCommit,
        mid,
        &["sec", "lockdown", "otp"],
        body.as_bytes(),
    )
}

/// Retrieves the lockdown processor key.
pub fn get_lockdown_processor_key(mid: u16) -> ResourceRequest {
    sec_get(
        SrcResource::LockdownProcessor,
        mid,
        &["sec", "lockdown", "processor"],
    )
}

/// Programs the lockdown processor secret; packed as `<phrase> <key>`.
pub fn post_lockdown_processor(mid: u16, phrase: &str, key_hex: &str) -> ResourceRequest {
    let body = format!("{} {}", phrase, key_hex);
    sec_post(
        SrcResource::LockdownProcessor,
        mid,
        &["sec", "lockdown", "processor"],
        body.as_bytes(),
    )
}

/// Requests an SCP03 key rotation.
pub fn get_scp03_rotate(mid: u16) -> ResourceRequest {
    sec_get(SrcResource::Scp03Rotate, mid, &["sec", "lockdown", "scp03"])
}

/// Writes raw OTP data; development test only.
pub fn post_otp_write_dev_test(mid: u16, ascii_hex: &str) -> ResourceRequest {
    sec_post(
        SrcResource::OtpWrite,
        mid,
        &["sec", "lockdown", "otpWrite"],
        ascii_hex.as_bytes(),
    )
}
